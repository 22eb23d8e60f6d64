use bitflags::bitflags;
use std::fmt;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// 镜头位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum DevicePosition {
    Front,
    #[default]
    Back,
}

impl DevicePosition {
    /// 前后互换
    pub fn opposite(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }
}

impl fmt::Display for DevicePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Front => write!(f, "front"),
            Self::Back => write!(f, "back"),
        }
    }
}

/// 需要授权的媒体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum MediaType {
    Video,
    Audio,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// 系统权限状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum AuthorizationStatus {
    /// 用户还没被询问过
    #[default]
    NotDetermined,
    /// 家长控制等策略限制
    Restricted,
    Denied,
    Authorized,
}

impl AuthorizationStatus {
    pub fn is_authorized(self) -> bool {
        self == Self::Authorized
    }
}

bitflags! {
    /// 设备能力集合
    ///
    /// 对焦/曝光/白平衡的每一种模式、兴趣点支持、闪光灯模式各占一位。
    /// 不支持的能力不会报错，控制器会直接跳过。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const FOCUS_POINT_OF_INTEREST    = 1 << 0;
        const FOCUS_LOCKED               = 1 << 1;
        const FOCUS_AUTO                 = 1 << 2;
        const FOCUS_CONTINUOUS           = 1 << 3;

        const EXPOSURE_POINT_OF_INTEREST = 1 << 4;
        const EXPOSURE_LOCKED            = 1 << 5;
        const EXPOSURE_AUTO              = 1 << 6;
        const EXPOSURE_CONTINUOUS        = 1 << 7;
        const EXPOSURE_CUSTOM            = 1 << 8;

        const WHITE_BALANCE_LOCKED       = 1 << 9;
        const WHITE_BALANCE_AUTO         = 1 << 10;
        const WHITE_BALANCE_CONTINUOUS   = 1 << 11;

        const FLASH_OFF                  = 1 << 12;
        const FLASH_ON                   = 1 << 13;
        const FLASH_AUTO                 = 1 << 14;

        const SUBJECT_AREA_MONITORING    = 1 << 15;

        /// 真正能闪光的位 (Off 不算)
        const FLASH = Self::FLASH_ON.bits() | Self::FLASH_AUTO.bits();
    }
}

impl Capabilities {
    /// 当前设备是否具备闪光灯
    pub fn is_flash_capable(self) -> bool {
        self.intersects(Self::FLASH)
    }
}

/// 闪光灯模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum FlashMode {
    #[default]
    Off,
    On,
    Auto,
}

impl FlashMode {
    /// 固定的循环顺序
    pub const CYCLE: [FlashMode; 3] = [FlashMode::Off, FlashMode::On, FlashMode::Auto];

    pub fn capability(self) -> Capabilities {
        match self {
            Self::Off => Capabilities::FLASH_OFF,
            Self::On => Capabilities::FLASH_ON,
            Self::Auto => Capabilities::FLASH_AUTO,
        }
    }

    /// 在给定设备能力下参与循环的模式
    ///
    /// 没有闪光灯时返回空集合；否则 `Off` 永远在集合里，
    /// `Auto` 只有在 `auto_enabled` 且设备支持时才出现。
    pub fn cycle_set(supported: Capabilities, auto_enabled: bool) -> Vec<FlashMode> {
        if !supported.is_flash_capable() {
            return Vec::new();
        }
        Self::CYCLE
            .into_iter()
            .filter(|mode| match mode {
                Self::Off => true,
                Self::On => supported.contains(Capabilities::FLASH_ON),
                Self::Auto => auto_enabled && supported.contains(Capabilities::FLASH_AUTO),
            })
            .collect()
    }

    /// 状态转移函数：按 {Off, On, Auto} 顺序找到下一个可用模式
    ///
    /// 设备没有闪光灯时返回 `None`。
    pub fn next_in(self, supported: Capabilities, auto_enabled: bool) -> Option<FlashMode> {
        let allowed = Self::cycle_set(supported, auto_enabled);
        if allowed.is_empty() {
            return None;
        }

        let start = Self::CYCLE.iter().position(|m| *m == self).unwrap_or(0);
        (1..=Self::CYCLE.len())
            .map(|step| Self::CYCLE[(start + step) % Self::CYCLE.len()])
            .find(|candidate| allowed.contains(candidate))
    }

    /// 切换设备后把模式收敛到新设备支持的集合内
    pub fn normalized(self, supported: Capabilities, auto_enabled: bool) -> FlashMode {
        if Self::cycle_set(supported, auto_enabled).contains(&self) {
            self
        } else {
            Self::Off
        }
    }
}

/// 对焦模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum FocusMode {
    Locked,
    #[default]
    AutoFocus,
    ContinuousAutoFocus,
}

impl FocusMode {
    pub fn capability(self) -> Capabilities {
        match self {
            Self::Locked => Capabilities::FOCUS_LOCKED,
            Self::AutoFocus => Capabilities::FOCUS_AUTO,
            Self::ContinuousAutoFocus => Capabilities::FOCUS_CONTINUOUS,
        }
    }
}

/// 曝光模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ExposureMode {
    Locked,
    AutoExpose,
    #[default]
    ContinuousAutoExposure,
    Custom,
}

impl ExposureMode {
    pub fn capability(self) -> Capabilities {
        match self {
            Self::Locked => Capabilities::EXPOSURE_LOCKED,
            Self::AutoExpose => Capabilities::EXPOSURE_AUTO,
            Self::ContinuousAutoExposure => Capabilities::EXPOSURE_CONTINUOUS,
            Self::Custom => Capabilities::EXPOSURE_CUSTOM,
        }
    }
}

/// 白平衡模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum WhiteBalanceMode {
    Locked,
    AutoWhiteBalance,
    #[default]
    ContinuousAutoWhiteBalance,
}

impl WhiteBalanceMode {
    pub fn capability(self) -> Capabilities {
        match self {
            Self::Locked => Capabilities::WHITE_BALANCE_LOCKED,
            Self::AutoWhiteBalance => Capabilities::WHITE_BALANCE_AUTO,
            Self::ContinuousAutoWhiteBalance => Capabilities::WHITE_BALANCE_CONTINUOUS,
        }
    }
}

/// 会话质量预设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum SessionPreset {
    /// 全分辨率静态照片
    #[default]
    Photo,
    High,
    Medium,
    Low,
    Vga640x480,
    Hd1280x720,
    Hd1920x1080,
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_FLASH: Capabilities = Capabilities::FLASH_OFF
        .union(Capabilities::FLASH_ON)
        .union(Capabilities::FLASH_AUTO);

    #[test]
    fn flash_cycle_skips_auto_when_disabled() {
        let mut mode = FlashMode::Off;
        let mut seen = Vec::new();
        for _ in 0..4 {
            mode = mode.next_in(FULL_FLASH, false).unwrap();
            seen.push(mode);
        }
        assert_eq!(
            seen,
            vec![FlashMode::On, FlashMode::Off, FlashMode::On, FlashMode::Off]
        );
    }

    #[test]
    fn flash_cycle_returns_to_start_after_full_loop() {
        for auto in [false, true] {
            let set = FlashMode::cycle_set(FULL_FLASH, auto);
            for start in &set {
                let mut mode = *start;
                for _ in 0..set.len() {
                    mode = mode.next_in(FULL_FLASH, auto).unwrap();
                }
                assert_eq!(mode, *start, "auto_enabled={auto}");
            }
        }
    }

    #[test]
    fn flash_cycle_skips_unsupported_modes() {
        let caps = Capabilities::FLASH_OFF | Capabilities::FLASH_AUTO;
        assert_eq!(FlashMode::Off.next_in(caps, true), Some(FlashMode::Auto));
        assert_eq!(FlashMode::Auto.next_in(caps, true), Some(FlashMode::Off));
        // On 不受支持时从 On 出发也能落回合法模式
        assert_eq!(FlashMode::On.next_in(caps, true), Some(FlashMode::Auto));
    }

    #[test]
    fn no_flash_means_no_transition() {
        let caps = Capabilities::FLASH_OFF | Capabilities::FOCUS_AUTO;
        assert!(!caps.is_flash_capable());
        assert_eq!(FlashMode::Off.next_in(caps, true), None);
        assert_eq!(FlashMode::On.normalized(caps, true), FlashMode::Off);
    }

    #[test]
    fn normalized_keeps_supported_mode() {
        assert_eq!(FlashMode::On.normalized(FULL_FLASH, false), FlashMode::On);
        assert_eq!(FlashMode::Auto.normalized(FULL_FLASH, false), FlashMode::Off);
    }

    #[test]
    fn position_opposite_round_trips() {
        assert_eq!(DevicePosition::Back.opposite(), DevicePosition::Front);
        assert_eq!(DevicePosition::Front.opposite().opposite(), DevicePosition::Front);
    }
}
