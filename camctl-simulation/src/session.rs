use crate::{synthetic_sample, CaptureMode, Shared};
use camctl_core::error::{CameraError, Result};
use camctl_core::settings::SessionPreset;
use camctl_core::traits::{
    CaptureSession, DeviceInfo, OutputKind, PendingMovie, PendingSample, SessionHandle,
    StillRequest,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;

/// 模拟会话
///
/// 只允许挂一个 Input，Output 不允许重复安装，方便测试抓出控制器的配置错误。
pub(crate) struct SimSession {
    id: u64,
    preset: SessionPreset,
    outputs: Vec<OutputKind>,
    shared: Arc<Shared>,
}

impl SimSession {
    pub(crate) fn new(id: u64, preset: SessionPreset, shared: Arc<Shared>) -> Self {
        Self {
            id,
            preset,
            outputs: Vec::new(),
            shared,
        }
    }

    fn require_output(&self, output: OutputKind) -> Result<()> {
        if self.outputs.contains(&output) {
            Ok(())
        } else {
            Err(CameraError::Configuration(format!(
                "{output:?} output is not installed"
            )))
        }
    }
}

impl CaptureSession for SimSession {
    fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id,
            preset: self.preset,
        }
    }

    fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    fn start_running(&mut self) -> Result<()> {
        let mut inner = self.shared.lock();
        inner.log.start_calls += 1;
        if let Some(err) = inner.start_failure.take() {
            tracing::warn!("Session #{} failed to start: {}", self.id, err);
            return Err(err);
        }
        inner.running = true;
        tracing::info!("Session #{} running", self.id);
        Ok(())
    }

    fn stop_running(&mut self) {
        let mut inner = self.shared.lock();
        inner.log.stop_calls += 1;
        inner.running = false;
        tracing::info!("Session #{} stopped", self.id);
    }

    fn begin_configuration(&mut self) {
        // 测试可以在这里卡住 worker 线程
        self.shared.wait_for_gate();
    }

    fn commit_configuration(&mut self) {
        self.shared.lock().log.configurations_committed += 1;
    }

    fn add_input(&mut self, device: &DeviceInfo) -> Result<()> {
        let mut inner = self.shared.lock();
        if let Some(existing) = inner.log.attached_inputs.first() {
            return Err(CameraError::Configuration(format!(
                "session already has input {existing}"
            )));
        }
        inner.log.attached_inputs.push(device.id.clone());
        tracing::debug!("Input attached: {}", device.id);
        Ok(())
    }

    fn remove_input(&mut self, device_id: &str) {
        self.shared
            .lock()
            .log
            .attached_inputs
            .retain(|id| id != device_id);
    }

    fn add_output(&mut self, output: OutputKind) -> Result<()> {
        if self.outputs.contains(&output) {
            return Err(CameraError::Configuration(format!(
                "{output:?} output is already installed"
            )));
        }
        self.outputs.push(output);
        self.shared.lock().log.outputs.push(output);
        Ok(())
    }

    fn capture_still(&mut self, request: StillRequest) -> Result<PendingSample> {
        self.require_output(request.output)?;

        let mut inner = self.shared.lock();
        if !inner.running {
            return Err(CameraError::SessionNotRunning);
        }
        inner.log.still_captures += 1;

        let (tx, rx) = oneshot::channel();
        if let Some(err) = inner.capture_failure.take() {
            let _ = tx.send(Err(err));
            return Ok(rx);
        }

        match inner.capture_mode() {
            CaptureMode::Immediate => {
                let _ = tx.send(Ok(synthetic_sample(request)));
            }
            CaptureMode::Manual => inner.pending_stills.push_back((request, tx)),
        }
        Ok(rx)
    }

    fn start_recording(&mut self, destination: PathBuf) -> Result<PendingMovie> {
        self.require_output(OutputKind::Movie)?;

        let mut inner = self.shared.lock();
        if !inner.running {
            return Err(CameraError::SessionNotRunning);
        }
        if inner.pending_movie.is_some() {
            return Err(CameraError::DeviceBusy);
        }
        inner.log.recordings_started += 1;

        let (tx, rx) = oneshot::channel();
        tracing::info!("Recording to {}", destination.display());
        inner.pending_movie = Some((destination, tx));
        Ok(rx)
    }

    fn stop_recording(&mut self) {
        let mut inner = self.shared.lock();
        if inner.capture_mode() == CaptureMode::Immediate {
            if let Some((path, tx)) = inner.pending_movie.take() {
                let _ = tx.send(Ok(path));
            }
        }
    }
}

impl Drop for SimSession {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        inner.log.attached_inputs.clear();
        inner.running = false;
        tracing::debug!("Session #{} released", self.id);
    }
}
