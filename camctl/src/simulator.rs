//! 模拟器替身
//!
//! 在没有摄像头的环境 (模拟器、CI) 里，拍照结果可以由一段图片数据或一个纯色合成，
//! 完全绕过硬件。覆盖项在每次拍照时只读取一次快照。

use crate::imgcodecs::StillImage;
use camctl_core::error::{CameraError, Result};
use camctl_core::frame::SampleMetadata;
use image::{Rgba, RgbaImage};
use once_cell::sync::Lazy;
use std::sync::{Arc, PoisonError, RwLock};

/// 纯色替身的输出尺寸
pub const FAKE_COLOR_SIZE: (u32, u32) = (640, 480);

/// 分量取值 [0,1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let quantize = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [
            quantize(self.r),
            quantize(self.g),
            quantize(self.b),
            quantize(self.a),
        ]
    }
}

/// 当前生效的替身
#[derive(Debug, Clone, PartialEq)]
pub enum FakeImage {
    /// 编码后的图片数据 (JPEG/PNG)
    Data(Vec<u8>),
    Color(Color),
}

impl FakeImage {
    /// 合成一张照片
    pub fn render(&self) -> Result<StillImage> {
        let metadata = SampleMetadata::default().exif_tag("Model", "Simulator");
        let pixels = match self {
            Self::Data(bytes) => image::load_from_memory(bytes)
                .map_err(|e| CameraError::CaptureFailed(format!("fake image data: {e}")))?
                .to_rgba8(),
            Self::Color(color) => {
                let (w, h) = FAKE_COLOR_SIZE;
                RgbaImage::from_pixel(w, h, Rgba(color.to_rgba8()))
            }
        };
        Ok(StillImage::new(pixels, metadata))
    }
}

static GLOBAL: Lazy<SimulatorOverrides> = Lazy::new(SimulatorOverrides::new);

/// 可在任意线程修改的替身设置
///
/// `Clone` 共享同一份状态。设置一种表示会替换掉另一种。
#[derive(Debug, Clone, Default)]
pub struct SimulatorOverrides {
    slot: Arc<RwLock<Option<FakeImage>>>,
}

impl SimulatorOverrides {
    /// 进程级共享实例，没有注入覆盖项的控制器都读它
    pub fn global() -> &'static SimulatorOverrides {
        &GLOBAL
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn fake_image_data(&self) -> Option<Vec<u8>> {
        match self.snapshot() {
            Some(FakeImage::Data(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// 传 None 只清除图片数据，不影响已设置的颜色
    pub fn set_fake_image_data(&self, data: Option<Vec<u8>>) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        match data {
            Some(bytes) => *slot = Some(FakeImage::Data(bytes)),
            None if matches!(*slot, Some(FakeImage::Data(_))) => *slot = None,
            None => {}
        }
    }

    pub fn fake_image_color(&self) -> Option<Color> {
        match self.snapshot() {
            Some(FakeImage::Color(color)) => Some(color),
            _ => None,
        }
    }

    /// 传 None 只清除颜色，不影响已设置的图片数据
    pub fn set_fake_image_color(&self, color: Option<Color>) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        match color {
            Some(color) => *slot = Some(FakeImage::Color(color)),
            None if matches!(*slot, Some(FakeImage::Color(_))) => *slot = None,
            None => {}
        }
    }

    pub fn set_fake_image_color_rgba(&self, r: f32, g: f32, b: f32, a: f32) {
        self.set_fake_image_color(Some(Color::new(r, g, b, a)));
    }

    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn snapshot(&self) -> Option<FakeImage> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_active(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn one_representation_replaces_the_other() {
        let overrides = SimulatorOverrides::new();
        overrides.set_fake_image_data(Some(vec![1, 2, 3]));
        overrides.set_fake_image_color_rgba(1.0, 0.0, 0.0, 1.0);
        assert_eq!(overrides.fake_image_data(), None);
        assert_eq!(
            overrides.fake_image_color(),
            Some(Color::new(1.0, 0.0, 0.0, 1.0))
        );

        overrides.set_fake_image_data(Some(vec![4]));
        assert_eq!(overrides.fake_image_color(), None);
        assert_eq!(overrides.fake_image_data(), Some(vec![4]));
    }

    #[test]
    fn clearing_the_inactive_representation_is_a_no_op() {
        let overrides = SimulatorOverrides::new();
        overrides.set_fake_image_color_rgba(0.0, 1.0, 0.0, 1.0);
        overrides.set_fake_image_data(None);
        assert!(overrides.is_active());

        overrides.set_fake_image_color(None);
        assert!(!overrides.is_active());
    }

    #[test]
    fn clones_share_state() {
        let a = SimulatorOverrides::new();
        let b = a.clone();
        a.set_fake_image_color_rgba(0.0, 0.0, 1.0, 1.0);
        assert!(b.is_active());
        b.clear();
        assert_eq!(a.snapshot(), None);
    }

    #[test]
    fn color_renders_as_solid_image() {
        let still = FakeImage::Color(Color::new(1.0, 0.5, 0.0, 1.0)).render().unwrap();
        assert_eq!((still.width(), still.height()), FAKE_COLOR_SIZE);
        assert_eq!(still.pixels().get_pixel(10, 10).0, [255, 128, 0, 255]);
    }

    #[test]
    fn data_is_decoded() {
        let png = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        let mut bytes = Vec::new();
        png.write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();

        let still = FakeImage::Data(bytes).render().unwrap();
        assert_eq!(still.pixels().get_pixel(2, 1).0, [1, 2, 3, 255]);
    }

    #[test]
    fn garbage_data_fails_the_capture() {
        let err = FakeImage::Data(vec![0, 1, 2]).render().unwrap_err();
        assert!(matches!(err, CameraError::CaptureFailed(_)));
    }
}
