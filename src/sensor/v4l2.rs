//! V4L2-backed sensor driver feeding the fixed buffer pool

use tracing::info;
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::sensor::{BufferPool, FrameBuffer, SensorDriver, SensorError};
use crate::SensorConfig;

/// V4L2 capture device producing MJPEG payloads into pool buffers
pub struct V4l2Sensor {
    device: Box<Device>,
    stream: Option<MmapStream<'static>>,
    pool: BufferPool,
    buffer_count: u32,
}

impl V4l2Sensor {
    pub fn open(config: &SensorConfig) -> Result<Self, SensorError> {
        let path = if config.device.is_empty() {
            detect_device()?
        } else {
            config.device.clone()
        };

        info!("Initializing V4L2 sensor: {}", path);
        let device = Device::with_path(&path)?;

        let caps = device.query_caps()?;
        info!("Device: {} ({})", caps.card, caps.driver);
        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(SensorError::Unsupported);
        }

        let mut fmt = device.format()?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = FourCC::new(b"MJPG");
        device.set_format(&fmt)?;

        // Worst-case JPEG size for the configured resolution; the encoded
        // payloads are far smaller in practice.
        let capacity = (config.width * config.height * 3) as usize;
        let pool = BufferPool::with_buffers(config.buffer_count as usize, capacity);

        Ok(Self {
            device: Box::new(device),
            stream: None,
            pool,
            buffer_count: config.buffer_count,
        })
    }

    /// Start streaming with memory-mapped buffers
    pub fn start(&mut self) -> Result<(), SensorError> {
        let stream = MmapStream::with_buffers(&self.device, Type::VideoCapture, self.buffer_count)?;
        self.stream = Some(stream);
        info!("Sensor stream started with {} buffers", self.buffer_count);
        Ok(())
    }
}

impl SensorDriver for V4l2Sensor {
    fn capture(&mut self) -> Result<FrameBuffer, SensorError> {
        let stream = self.stream.as_mut().ok_or(SensorError::NotStreaming)?;
        let mut frame = self.pool.acquire().ok_or(SensorError::NoFrame)?;

        let (buf, meta) = stream.next()?;
        let used = meta.bytesused as usize;
        if used == 0 || used > buf.len() {
            frame.fill(buf);
        } else {
            frame.fill(&buf[..used]);
        }
        Ok(frame)
    }
}

/// Scan /dev/video* for the first device advertising MJPEG capture
fn detect_device() -> Result<String, SensorError> {
    use std::path::Path;

    info!("Auto-detecting capture devices...");
    for i in 0..10 {
        let path = format!("/dev/video{}", i);
        if !Path::new(&path).exists() {
            continue;
        }

        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            continue;
        }
        if let Ok(formats) = dev.enum_formats() {
            if formats.iter().any(|f| f.fourcc == FourCC::new(b"MJPG")) {
                info!("Found MJPEG device: {} - {}", path, caps.card);
                return Ok(path);
            }
        }
    }

    Err(SensorError::NoDevice)
}
