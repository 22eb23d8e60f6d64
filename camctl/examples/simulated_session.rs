// camctl/examples/simulated_session.rs

use anyhow::Result;
use camctl::prelude::*;
use camctl_simulation::SimDriver;
use std::sync::Arc;

/// 把 delegate 回调打印出来
struct Printer;

impl ControllerDelegate for Printer {
    fn did_cycle_position(&self, position: DevicePosition) {
        println!("[delegate] now using the {} camera", position);
    }

    fn session_did_start_running(&self) {
        println!("[delegate] session started");
    }

    fn session_did_stop_running(&self) {
        println!("[delegate] session stopped");
    }

    fn session_did_error(&self, error: &CameraError) {
        println!("[delegate] error: {}", error);
    }

    fn did_start_recording(&self) {
        println!("[delegate] recording...");
    }

    fn did_stop_recording(&self) {
        println!("[delegate] recording finished");
    }
}

fn main() -> Result<()> {
    // RUST_LOG=debug 可以看到 worker 线程内部的日志
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 1. 一台模拟手机：后置镜头带闪光灯，前置没有
    let sim = SimDriver::phone();
    let driver: Arc<dyn Driver> = Arc::new(sim.clone());

    // 没有 tokio runtime 时，completion 在后台 runtime 上交付，可以直接 wait()
    let camera = CameraController::new(driver.clone(), ControllerConfig::new().auto_flash(true));
    let printer = Arc::new(Printer);
    camera.set_delegate(&printer);

    camera.start_capture_session().wait()?;

    // 2. 闪光灯循环 Off -> On -> Auto -> Off
    for _ in 0..3 {
        let mode = camera.cycle_flash_mode().wait()?;
        println!("Flash mode: {:?}", mode);
    }

    // 3. 点一下预览中心做对焦
    camera.set_preview_geometry(Some(PreviewGeometry::new(
        Size::new(390.0, 844.0),
        Size::new(4032.0, 3024.0),
        VideoGravity::ResizeAspectFill,
    )));
    camera.auto_adjust_to_point(Point::new(195.0, 422.0)).wait()?;

    // 4. 拍照：一张解码成像素，一张写入相册
    let still = camera.capture_sample().wait()?;
    println!(
        "Sample: {}x{} orientation {:?}",
        still.width(),
        still.height(),
        still.orientation()
    );
    let asset = camera.capture_asset().wait()?;
    println!("Saved asset {}", asset);

    // 5. 切到前置镜头，闪光灯随之关闭
    let outcome = camera.cycle_position().wait()?;
    println!(
        "Cycle: {:?}, flash capable: {}",
        outcome,
        camera.flash_capable()
    );
    camera.stop_capture_session().wait()?;

    // 6. 模拟器覆盖：不经过硬件直接返回纯色图
    SimulatorOverrides::global().set_fake_image_color_rgba(0.0, 0.6, 1.0, 1.0);
    let fake = camera.capture_sample().wait()?;
    println!("Fake image: {}x{}", fake.width(), fake.height());
    SimulatorOverrides::global().clear();

    // 7. 录像
    let video = VideoController::new(driver, DevicePosition::Back, true, false);
    video.set_delegate(&printer);
    video.start_capture_session().wait()?;

    let capture = video.capture_with_thumbnail();
    if let Some(thumbnail) = capture.thumbnail {
        let thumbnail = thumbnail.wait()?;
        println!("Thumbnail: {}x{}", thumbnail.width(), thumbnail.height());
    }
    video.stop_recording().wait()?;
    let movie = capture.movie.wait()?;
    println!("Movie written to {}", movie.display());

    video.stop_capture_session().wait()?;
    println!("Hardware log: {:#?}", sim.log());
    Ok(())
}
