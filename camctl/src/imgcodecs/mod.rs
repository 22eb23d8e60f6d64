//! 静态帧的解码与 JPEG 编码
//!
//! 硬件交付的 `SampleBuffer` 统一转成 RGBA (`StillImage`)，写入相册前再编码成 JPEG。
//! 硬件直接给出 JPEG 时原样透传，不做二次压缩。

use camctl_core::error::CameraError;
use camctl_core::frame::{Orientation, SampleBuffer, SampleMetadata};
use camctl_core::pixel_format::{FourCC, PixelFormat};
use camctl_core::traits::EncodedImage;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, ImageFormat, RgbaImage};
use thiserror::Error;

/// 编解码错误
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unsupported pixel format {0:?}")]
    Unsupported(PixelFormat),

    #[error("Sample buffer too short: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("Invalid stride {stride} for a {width}px row")]
    Stride { stride: usize, width: u32 },

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl From<CodecError> for CameraError {
    fn from(e: CodecError) -> Self {
        CameraError::CaptureFailed(e.to_string())
    }
}

/// 一张解码后的静态照片
#[derive(Debug, Clone, PartialEq)]
pub struct StillImage {
    pixels: RgbaImage,
    metadata: SampleMetadata,
}

impl StillImage {
    pub fn new(pixels: RgbaImage, metadata: SampleMetadata) -> Self {
        Self { pixels, metadata }
    }

    /// 解码硬件样本
    pub fn from_sample(sample: &SampleBuffer) -> Result<Self, CodecError> {
        Ok(Self::new(decode_sample(sample)?, sample.metadata.clone()))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    /// 显示方向 (EXIF Orientation)
    pub fn orientation(&self) -> Orientation {
        self.metadata.orientation
    }

    pub fn metadata(&self) -> &SampleMetadata {
        &self.metadata
    }

    pub fn to_jpeg(&self, quality: u8) -> Result<EncodedImage, CodecError> {
        encode_jpeg(&self.pixels, quality)
    }
}

/// 把任意支持的样本格式转成 RGBA
pub fn decode_sample(sample: &SampleBuffer) -> Result<RgbaImage, CodecError> {
    let cc = match sample.format {
        PixelFormat::Known(cc) => cc,
        other => return Err(CodecError::Unsupported(other)),
    };

    if cc == FourCC::JPEG {
        let img = image::load_from_memory_with_format(&sample.data, ImageFormat::Jpeg)?;
        return Ok(img.to_rgba8());
    }

    let bpp = sample
        .format
        .bytes_per_pixel()
        .ok_or(CodecError::Unsupported(sample.format))?;
    if cc == FourCC::YUYV && sample.width % 2 != 0 {
        // YUYV 两个像素共享一组 UV，奇数宽度没法拆
        return Err(CodecError::Unsupported(sample.format));
    }

    let width = sample.width as usize;
    let height = sample.height as usize;
    let row_len = width * bpp;
    let stride = if sample.stride == 0 {
        row_len
    } else {
        sample.stride
    };
    if stride < row_len {
        return Err(CodecError::Stride {
            stride,
            width: sample.width,
        });
    }

    let needed = match height {
        0 => 0,
        h => stride * (h - 1) + row_len,
    };
    if sample.data.len() < needed {
        return Err(CodecError::Truncated {
            needed,
            actual: sample.data.len(),
        });
    }

    let mut rgba = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        let row = &sample.data[y * stride..y * stride + row_len];
        match cc {
            FourCC::RGBA => rgba.extend_from_slice(row),
            FourCC::BGRA => {
                for px in row.chunks_exact(4) {
                    rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
                }
            }
            FourCC::RGB3 => {
                for px in row.chunks_exact(3) {
                    rgba.extend_from_slice(&[px[0], px[1], px[2], 0xff]);
                }
            }
            FourCC::BGR3 => {
                for px in row.chunks_exact(3) {
                    rgba.extend_from_slice(&[px[2], px[1], px[0], 0xff]);
                }
            }
            FourCC::YUYV => {
                for px in row.chunks_exact(4) {
                    let (y0, u, y1, v) = (px[0], px[1], px[2], px[3]);
                    rgba.extend_from_slice(&yuv_to_rgba(y0, u, v));
                    rgba.extend_from_slice(&yuv_to_rgba(y1, u, v));
                }
            }
            _ => return Err(CodecError::Unsupported(sample.format)),
        }
    }

    RgbaImage::from_raw(sample.width, sample.height, rgba).ok_or(CodecError::Truncated {
        needed: width * height * 4,
        actual: 0,
    })
}

/// BT.601 整数近似
fn yuv_to_rgba(y: u8, u: u8, v: u8) -> [u8; 4] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let clip = |val: i32| val.clamp(0, 255) as u8;
    [
        clip((298 * c + 409 * e + 128) >> 8),
        clip((298 * c - 100 * d - 208 * e + 128) >> 8),
        clip((298 * c + 516 * d + 128) >> 8),
        0xff,
    ]
}

/// RGBA -> JPEG (JPEG 没有 alpha，先丢掉透明通道)
pub fn encode_jpeg(pixels: &RgbaImage, quality: u8) -> Result<EncodedImage, CodecError> {
    let rgb = image::DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, quality.clamp(1, 100)).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8,
    )?;

    Ok(EncodedImage {
        data,
        format: FourCC::JPEG.into(),
        width: pixels.width(),
        height: pixels.height(),
    })
}

/// 写入相册用的编码结果：JPEG 样本原样透传，其余格式解码后重新编码
pub fn encode_sample(sample: &SampleBuffer, quality: u8) -> Result<EncodedImage, CodecError> {
    if sample.format == FourCC::JPEG {
        return Ok(EncodedImage {
            data: sample.data.clone(),
            format: sample.format,
            width: sample.width,
            height: sample.height,
        });
    }
    encode_jpeg(&decode_sample(sample)?, quality)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(format: FourCC, pixel: &[u8], width: u32, height: u32) -> SampleBuffer {
        let data = pixel.repeat((width * height) as usize);
        SampleBuffer::packed(data, width, height, format.into())
    }

    #[test]
    fn bgra_swaps_red_and_blue() {
        let img = decode_sample(&solid(FourCC::BGRA, &[10, 20, 30, 40], 2, 2)).unwrap();
        assert_eq!(img.get_pixel(1, 1).0, [30, 20, 10, 40]);
    }

    #[test]
    fn rgb24_gets_opaque_alpha() {
        let img = decode_sample(&solid(FourCC::RGB3, &[1, 2, 3], 3, 1)).unwrap();
        assert_eq!(img.get_pixel(2, 0).0, [1, 2, 3, 255]);
        let img = decode_sample(&solid(FourCC::BGR3, &[1, 2, 3], 3, 1)).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [3, 2, 1, 255]);
    }

    #[test]
    fn yuyv_mid_gray() {
        // Y=126 U=V=128 约等于 RGB(128,128,128)
        let img = decode_sample(&solid(FourCC::YUYV, &[126, 128, 126, 128], 2, 1)).unwrap();
        let [r, g, b, a] = img.get_pixel(0, 0).0;
        assert_eq!((r, g, b, a), (128, 128, 128, 255));
    }

    #[test]
    fn padded_stride_is_skipped() {
        // 每行 2 像素 RGBA + 4 字节 padding
        let mut sample = SampleBuffer::packed(Vec::new(), 2, 2, FourCC::RGBA.into());
        sample.stride = 12;
        sample.data = vec![9u8; 8];
        sample.data.extend([0u8; 4]);
        sample.data.extend([7u8; 8]);
        let img = decode_sample(&sample).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [9; 4]);
        assert_eq!(img.get_pixel(1, 1).0, [7; 4]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        let mut sample = solid(FourCC::RGBA, &[0, 0, 0, 0], 4, 4);
        sample.data.truncate(10);
        assert!(matches!(
            decode_sample(&sample),
            Err(CodecError::Truncated { needed: 64, actual: 10 })
        ));
    }

    #[test]
    fn unknown_format_is_unsupported() {
        let sample = SampleBuffer::packed(vec![0; 16], 2, 2, PixelFormat::Unknown(0xdead));
        let err: CameraError = decode_sample(&sample).unwrap_err().into();
        assert!(matches!(err, CameraError::CaptureFailed(_)));
    }

    #[test]
    fn jpeg_samples_pass_through_and_decode() {
        let pixels = RgbaImage::from_pixel(8, 8, image::Rgba([200, 10, 10, 255]));
        let jpeg = encode_jpeg(&pixels, 95).unwrap();
        assert_eq!(&jpeg.data[..2], &[0xff, 0xd8]);

        let sample = SampleBuffer::packed(jpeg.data.clone(), 8, 8, FourCC::JPEG.into());
        let encoded = encode_sample(&sample, 50).unwrap();
        assert_eq!(encoded.data, jpeg.data);

        let decoded = StillImage::from_sample(&sample).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
        let [r, _, _, _] = decoded.pixels().get_pixel(4, 4).0;
        assert!(r > 150, "red channel survived compression: {r}");
    }
}
