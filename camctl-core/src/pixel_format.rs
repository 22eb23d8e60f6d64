use std::fmt::{self, Display};

/// 四字符代码 (Four Character Code)，视频工业标准
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct FourCC(pub u32);

impl FourCC {
    /// 从 ASCII 字符创建 FourCC
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self((a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24))
    }
}

impl Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_le_bytes();
        write!(f, "{}", String::from_utf8_lossy(&bytes))
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({})", self)
    }
}

/// 静态拍照常见的输出格式
impl FourCC {
    /// 32BGRA - 手机相机静态输出的默认格式
    pub const BGRA: Self = Self::new(b'B', b'G', b'R', b'A');
    pub const RGBA: Self = Self::new(b'R', b'G', b'B', b'A');
    /// RGB24 (Big Endian: R-G-B)
    pub const RGB3: Self = Self::new(b'R', b'G', b'B', b'3');
    /// RGB24 (Little Endian: B-G-R)
    pub const BGR3: Self = Self::new(b'B', b'G', b'R', b'3');
    /// YUYV 4:2:2
    pub const YUYV: Self = Self::new(b'Y', b'U', b'Y', b'V');
    /// JPEG 编码后的静态图 (带 EXIF)
    pub const JPEG: Self = Self::new(b'J', b'P', b'E', b'G');
}

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 已知的标准格式
    Known(FourCC),
    /// 驱动返回了库不认识的私有格式
    Unknown(u32),
}

impl PixelFormat {
    /// 压缩格式需要先解码
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Known(FourCC::JPEG))
    }

    /// 未压缩格式的每像素字节数，压缩或未知格式返回 None
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            Self::Known(cc) => match *cc {
                FourCC::BGRA | FourCC::RGBA => Some(4),
                FourCC::RGB3 | FourCC::BGR3 => Some(3),
                FourCC::YUYV => Some(2),
                _ => None,
            },
            Self::Unknown(_) => None,
        }
    }
}

impl From<u32> for PixelFormat {
    fn from(val: u32) -> Self {
        let cc = FourCC(val);
        match cc {
            FourCC::BGRA
            | FourCC::RGBA
            | FourCC::RGB3
            | FourCC::BGR3
            | FourCC::YUYV
            | FourCC::JPEG => Self::Known(cc),
            _ => Self::Unknown(val),
        }
    }
}

impl From<FourCC> for PixelFormat {
    fn from(cc: FourCC) -> Self {
        Self::Known(cc)
    }
}

impl PartialEq<FourCC> for PixelFormat {
    fn eq(&self, other: &FourCC) -> bool {
        match self {
            PixelFormat::Known(cc) => cc == other,
            PixelFormat::Unknown(val) => *val == other.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_displays_ascii() {
        assert_eq!(FourCC::BGRA.to_string(), "BGRA");
        assert_eq!(format!("{:?}", FourCC::JPEG), "FourCC(JPEG)");
    }

    #[test]
    fn raw_values_map_to_known_formats() {
        assert_eq!(PixelFormat::from(FourCC::YUYV.0), PixelFormat::Known(FourCC::YUYV));
        assert!(matches!(PixelFormat::from(0xdead_beef), PixelFormat::Unknown(_)));
    }

    #[test]
    fn bytes_per_pixel_only_for_packed_formats() {
        assert_eq!(PixelFormat::from(FourCC::BGRA).bytes_per_pixel(), Some(4));
        assert_eq!(PixelFormat::from(FourCC::JPEG).bytes_per_pixel(), None);
        assert!(PixelFormat::from(FourCC::JPEG).is_compressed());
    }
}
