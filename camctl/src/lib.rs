pub mod completion;
pub mod controller;
pub mod delegate;
pub mod imgcodecs;
pub(crate) mod internal; // 内部模块，不对外暴露
pub mod simulator;
pub mod video;

// Re-export 核心类型，方便 prelude 使用
pub use completion::Completion;
pub use controller::{CameraController, ControllerOptions, ControllerState, CycleOutcome};
pub use video::{MovieCapture, VideoController};

/// 预置模块，用户可以通过 `use camctl::prelude::*;` 导入常用项
pub mod prelude {
    pub use crate::completion::Completion;
    pub use crate::controller::{
        CameraController, ControllerOptions, ControllerState, CycleOutcome, RecordingStatus,
    };
    pub use crate::delegate::{ControllerDelegate, ControllerEvent};
    pub use crate::imgcodecs::StillImage;
    pub use crate::simulator::{Color, FakeImage, SimulatorOverrides};
    pub use crate::video::{MovieCapture, VideoController};
    pub use camctl_core::prelude::*;
}
