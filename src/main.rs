//! Vigil camera node: registers with the coordinator and runs the frame
//! pipeline until interrupted.

use std::sync::Arc;

use color_eyre::Result;
use tokio::net::UdpSocket;
use tracing::info;

use vigil::pipeline::Pipeline;
use vigil::sensor::V4l2Sensor;
use vigil::storage::DiskStore;
use vigil::transport::HttpUploader;
use vigil::{trigger, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter("vigil=debug")
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Vigil launching...");

    let config = Config::load()?;
    vigil::CONFIG.store(Arc::new(config.clone()));

    info!("Device name:      {}", config.device.name);
    info!("Coordinator:      {}", config.upload.coordinator);
    info!("Trigger listener: {}", config.events.bind);
    info!(
        "Capture:          {} fps, {}s window, 1/{} streamed live",
        config.capture.frame_rate, config.capture.window_secs, config.capture.stream_downsample
    );

    let store = Arc::new(DiskStore::open(&config.storage.root).await?);

    let transport = Arc::new(HttpUploader::new(&config.upload, &config.device.name)?);
    transport.register().await;

    let mut sensor = V4l2Sensor::open(&config.sensor)?;
    sensor.start()?;

    let (sink, triggers) = trigger::channel();
    let socket = UdpSocket::bind(&config.events.bind).await?;
    tokio::spawn(trigger::listen(socket, sink));

    let pipeline = Pipeline::spawn(
        Box::new(sensor),
        store,
        transport,
        triggers,
        &config.capture,
    );

    tokio::signal::ctrl_c().await?;
    info!("Vigil shutting down");
    pipeline.shutdown();
    Ok(())
}
