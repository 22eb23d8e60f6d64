#![allow(dead_code)]

use camctl::delegate::{ControllerDelegate, ControllerEvent};
use camctl::prelude::*;
use camctl_simulation::SimDriver;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

/// 按顺序记录所有 delegate 回调
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<ControllerEvent>>,
}

impl Recorder {
    pub fn attach(controller: &CameraController) -> Arc<Self> {
        let recorder = Arc::new(Self::default());
        controller.set_delegate(&recorder);
        recorder
    }

    fn push(&self, event: ControllerEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<ControllerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &ControllerEvent) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    /// 轮询直到条件满足
    pub async fn wait_for(&self, predicate: impl Fn(&[ControllerEvent]) -> bool) {
        within(async {
            loop {
                if predicate(&self.events()) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
    }

    pub async fn wait_for_event(&self, event: ControllerEvent) {
        self.wait_for(|events| events.contains(&event)).await
    }
}

impl ControllerDelegate for Recorder {
    fn will_cycle_position(&self) {
        self.push(ControllerEvent::WillCyclePosition);
    }

    fn did_cycle_position(&self, position: DevicePosition) {
        self.push(ControllerEvent::DidCyclePosition(position));
    }

    fn subject_area_did_change(&self) {
        self.push(ControllerEvent::SubjectAreaDidChange);
    }

    fn session_did_start_running(&self) {
        self.push(ControllerEvent::SessionDidStartRunning);
    }

    fn session_did_stop_running(&self) {
        self.push(ControllerEvent::SessionDidStopRunning);
    }

    fn session_did_error(&self, error: &CameraError) {
        self.push(ControllerEvent::SessionDidError(error.clone()));
    }

    fn session_was_interrupted(&self) {
        self.push(ControllerEvent::SessionWasInterrupted);
    }

    fn session_interruption_ended(&self) {
        self.push(ControllerEvent::SessionInterruptionEnded);
    }

    fn did_start_recording(&self) {
        self.push(ControllerEvent::DidStartRecording);
    }

    fn did_stop_recording(&self) {
        self.push(ControllerEvent::DidStopRecording);
    }
}

pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(TIMEOUT, future)
        .await
        .expect("timed out waiting for the controller")
}

/// 轮询任意条件
pub async fn eventually(condition: impl Fn() -> bool) {
    within(async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

/// 使用独立的模拟器覆盖项，避免测试之间互相影响
pub fn isolated() -> (ControllerOptions, SimulatorOverrides) {
    let overrides = SimulatorOverrides::new();
    (ControllerOptions::new().simulator(overrides.clone()), overrides)
}

pub fn camera(sim: &SimDriver, config: ControllerConfig) -> CameraController {
    let (options, _) = isolated();
    CameraController::with_options(Arc::new(sim.clone()), config, options)
}

pub fn device_id(sim: &SimDriver, position: DevicePosition) -> String {
    sim.device_for_position(position).unwrap().unwrap().id
}
