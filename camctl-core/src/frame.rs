use crate::pixel_format::PixelFormat;
use std::collections::BTreeMap;

/// 硬件静态输出交付的一帧
///
/// 与流式采集不同，拍照结果需要跨线程交付给调用方，所以数据是 owned 的。
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    /// 原始图像数据 (JPEG 时为完整的编码数据)
    pub data: Vec<u8>,

    /// 图像宽度 (Pixels)
    pub width: u32,

    /// 图像高度 (Pixels)
    pub height: u32,

    /// 跨距/步长 (Bytes per line)，压缩格式为 0
    pub stride: usize,

    pub format: PixelFormat,

    /// 方向与 EXIF 附件
    pub metadata: SampleMetadata,
}

impl SampleBuffer {
    /// 紧密排列 (stride = width * bpp) 的未压缩帧
    pub fn packed(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        let stride = format.bytes_per_pixel().unwrap_or(0) * width as usize;
        Self {
            data,
            width,
            height,
            stride,
            format,
            metadata: SampleMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: SampleMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// 帧级元数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleMetadata {
    pub orientation: Orientation,
    /// EXIF 字典 (Tag 名 -> 文本值)，保存相册时原样写入
    pub exif: BTreeMap<String, String>,
    /// 实际曝光时间
    pub exposure_us: Option<u32>,
    pub iso: Option<f32>,
    /// 闪光灯是否点亮
    pub flash_fired: bool,
}

impl SampleMetadata {
    pub fn exif_tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.exif.insert(key.into(), value.into());
        self
    }
}

/// EXIF 方向 (取值 1-8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    LeftMirrored,
    Right,
    RightMirrored,
    Left,
}

impl Orientation {
    pub fn exif_value(self) -> u8 {
        match self {
            Self::Up => 1,
            Self::UpMirrored => 2,
            Self::Down => 3,
            Self::DownMirrored => 4,
            Self::LeftMirrored => 5,
            Self::Right => 6,
            Self::RightMirrored => 7,
            Self::Left => 8,
        }
    }

    pub fn from_exif(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Up,
            2 => Self::UpMirrored,
            3 => Self::Down,
            4 => Self::DownMirrored,
            5 => Self::LeftMirrored,
            6 => Self::Right,
            7 => Self::RightMirrored,
            8 => Self::Left,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel_format::FourCC;

    #[test]
    fn packed_stride_follows_format() {
        let buf = SampleBuffer::packed(vec![0; 4 * 3 * 2], 3, 2, FourCC::RGBA.into());
        assert_eq!(buf.stride, 12);

        let jpeg = SampleBuffer::packed(vec![0xff, 0xd8], 10, 10, FourCC::JPEG.into());
        assert_eq!(jpeg.stride, 0);
    }

    #[test]
    fn exif_orientation_values() {
        for v in 1..=8 {
            assert_eq!(Orientation::from_exif(v).unwrap().exif_value(), v);
        }
        assert_eq!(Orientation::from_exif(0), None);
    }
}
