mod common;

use camctl::delegate::ControllerEvent;
use camctl::prelude::*;
use camctl_core::traits::OutputKind;
use camctl_simulation::{CaptureMode, SimDriver};
use common::{eventually, isolated, within, Recorder};
use std::sync::Arc;

fn video(sim: &SimDriver, thumbnails: bool) -> VideoController {
    let config = ControllerConfig::new()
        .preset(SessionPreset::High)
        .thumbnail_capture(thumbnails);
    let (options, _) = isolated();
    VideoController::with_options(Arc::new(sim.clone()), config, options)
}

fn manual() -> SimDriver {
    SimDriver::builder()
        .device("Back Camera", DevicePosition::Back, Capabilities::all())
        .capture_mode(CaptureMode::Manual)
        .build()
}

#[tokio::test]
async fn new_uses_the_video_preset() {
    let sim = SimDriver::phone();
    let controller = VideoController::new(Arc::new(sim.clone()), DevicePosition::Back, true, false);
    assert!(controller.thumbnail_capture_enabled());
    assert!(!controller.is_recording());

    controller.start_capture_session().await.unwrap();
    let handle = controller.session_handle().unwrap();
    assert_eq!(handle.preset, SessionPreset::High);
    assert_eq!(
        sim.log().outputs,
        vec![OutputKind::Still, OutputKind::Movie, OutputKind::Thumbnail]
    );
}

#[tokio::test]
async fn records_a_movie_with_thumbnail() {
    let sim = SimDriver::phone();
    let controller = video(&sim, true);
    let recorder = Recorder::attach(&controller);
    controller.start_capture_session().await.unwrap();

    let capture = controller.capture_with_thumbnail();
    let thumbnail = within(capture.thumbnail.expect("thumbnails are enabled"))
        .await
        .unwrap();
    assert_eq!(thumbnail.pixels().get_pixel(0, 0).0, [0x40; 4]);
    assert!(controller.is_recording());

    controller.stop_recording().await.unwrap();
    let path = within(capture.movie).await.unwrap();
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mov"));

    recorder
        .wait_for_event(ControllerEvent::DidStopRecording)
        .await;
    let events = recorder.events();
    let started = events
        .iter()
        .position(|e| *e == ControllerEvent::DidStartRecording);
    let stopped = events
        .iter()
        .position(|e| *e == ControllerEvent::DidStopRecording);
    assert!(started < stopped);

    eventually(|| !controller.is_recording()).await;
    assert_eq!(sim.log().recordings_started, 1);
}

#[tokio::test]
async fn without_thumbnails_only_the_movie_is_delivered() {
    let sim = SimDriver::phone();
    let controller = video(&sim, false);
    controller.start_capture_session().await.unwrap();
    assert_eq!(sim.log().outputs, vec![OutputKind::Still, OutputKind::Movie]);

    let capture = controller.capture_with_thumbnail();
    assert!(capture.thumbnail.is_none());
    controller.stop_recording().await.unwrap();
    assert!(within(capture.movie).await.is_ok());
    assert_eq!(sim.log().still_captures, 0);
}

#[tokio::test]
async fn second_recording_is_busy() {
    let sim = manual();
    let controller = video(&sim, true);
    controller.start_capture_session().await.unwrap();

    let first = controller.capture_with_thumbnail();
    let second = controller.capture_with_thumbnail();
    assert_eq!(
        within(second.thumbnail.unwrap()).await,
        Err(CameraError::DeviceBusy)
    );
    assert_eq!(within(second.movie).await, Err(CameraError::DeviceBusy));
    assert_eq!(controller.state().recording, RecordingStatus::Recording);

    assert_eq!(sim.complete_pending_stills(), 1);
    assert!(within(first.thumbnail.unwrap()).await.is_ok());

    // finalize 完成之前一直是 Stopping
    controller.stop_recording().await.unwrap();
    assert_eq!(controller.state().recording, RecordingStatus::Stopping);
    assert!(controller.is_recording());

    assert!(sim.finish_recording());
    assert!(within(first.movie).await.is_ok());
    eventually(|| controller.state().recording == RecordingStatus::Idle).await;

    // 空闲时 stop 什么也不做
    controller.stop_recording().await.unwrap();
    assert!(!controller.is_recording());
}

#[tokio::test]
async fn thumbnail_failure_does_not_abort_recording() {
    let sim = SimDriver::phone();
    let controller = video(&sim, true);
    controller.start_capture_session().await.unwrap();

    sim.fail_next_capture(CameraError::CaptureFailed("thumbnail output stalled".into()));
    let capture = controller.capture_with_thumbnail();
    assert_eq!(
        within(capture.thumbnail.unwrap()).await,
        Err(CameraError::CaptureFailed("thumbnail output stalled".into()))
    );

    controller.stop_recording().await.unwrap();
    assert!(within(capture.movie).await.is_ok());
}

#[tokio::test]
async fn stopping_the_session_ends_the_recording() {
    let sim = SimDriver::phone();
    let controller = video(&sim, false);
    let recorder = Recorder::attach(&controller);
    controller.start_capture_session().await.unwrap();

    let capture = controller.capture_with_thumbnail();
    recorder
        .wait_for_event(ControllerEvent::DidStartRecording)
        .await;

    controller.stop_capture_session().await.unwrap();
    assert!(!controller.is_recording());
    assert_eq!(
        within(capture.movie).await,
        Err(CameraError::SessionNotRunning)
    );
    recorder
        .wait_for_event(ControllerEvent::DidStopRecording)
        .await;
    assert_eq!(recorder.count(&ControllerEvent::DidStopRecording), 1);
}

#[tokio::test]
async fn recording_needs_a_running_session() {
    let sim = SimDriver::phone();
    let controller = video(&sim, true);

    let capture = controller.capture_with_thumbnail();
    assert_eq!(
        within(capture.thumbnail.unwrap()).await,
        Err(CameraError::SessionNotRunning)
    );
    assert_eq!(
        within(capture.movie).await,
        Err(CameraError::SessionNotRunning)
    );
    assert!(!controller.is_recording());
    assert_eq!(sim.log().recordings_started, 0);
}

#[tokio::test]
async fn video_needs_microphone_access() {
    let sim = SimDriver::phone();
    sim.set_authorization(MediaType::Audio, AuthorizationStatus::Denied);

    let controller = video(&sim, true);
    assert_eq!(
        controller.start_capture_session().await,
        Err(CameraError::Unauthorized(MediaType::Audio))
    );

    // 拍照控制器不需要麦克风
    let (options, _) = isolated();
    let camera =
        CameraController::with_options(Arc::new(sim.clone()), ControllerConfig::new(), options);
    camera.start_capture_session().await.unwrap();
}

#[tokio::test]
async fn movies_land_in_the_configured_directory() {
    let sim = SimDriver::phone();
    let dir = std::env::temp_dir().join("camctl-movies");
    let config = ControllerConfig::new()
        .preset(SessionPreset::High)
        .movie_directory(&dir);
    let (options, _) = isolated();
    let controller = VideoController::with_options(Arc::new(sim.clone()), config, options);
    controller.start_capture_session().await.unwrap();

    let first = controller.capture_with_thumbnail();
    controller.stop_recording().await.unwrap();
    let first = within(first.movie).await.unwrap();
    eventually(|| !controller.is_recording()).await;

    let second = controller.capture_with_thumbnail();
    controller.stop_recording().await.unwrap();
    let second = within(second.movie).await.unwrap();

    assert_eq!(first.parent(), Some(dir.as_path()));
    assert_eq!(second.parent(), Some(dir.as_path()));
    assert_ne!(first, second);
}
