use crate::camera::{Frame, FrameSource, VideoDevice};
use crate::common::{Config, MoodFitError, Result};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma};
use std::fs;

pub struct Camera {
    device: Device,
    index: u32,
    config: Config,
}

pub struct CameraSession<'a> {
    stream: v4l::io::mmap::Stream<'a>,
    format: v4l::Format,
}

impl Camera {
    pub fn new(config: &Config) -> Result<Self> {
        Self::new_with_device(config.camera.device_index, config.clone())
    }

    /// List all available cameras as (index, card name, supported formats)
    pub fn list_all_cameras() -> Result<Vec<(u32, String, Vec<String>)>> {
        let mut cameras = Vec::new();

        for entry in fs::read_dir("/dev")? {
            let entry = entry?;
            let path = entry.path();
            let filename = path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("");

            let Some(index) = filename.strip_prefix("video").and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };

            let Ok(device) = Device::new(index as usize) else { continue };
            let Ok(caps) = device.query_caps() else { continue };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }

            let formats = device.enum_formats()
                .unwrap_or_default()
                .iter()
                .map(|fmt| fmt.fourcc.str().unwrap_or("UNKNOWN").to_string())
                .collect();

            cameras.push((index, caps.card.clone(), formats));
        }

        cameras.sort_by_key(|c| c.0);
        Ok(cameras)
    }

    pub fn new_with_device(index: u32, config: Config) -> Result<Self> {
        tracing::debug!("Opening camera device {}", index);

        let device = Device::new(index as usize)
            .map_err(|e| MoodFitError::DeviceError(format!("Failed to open camera {}: {}", index, e)))?;

        let caps = device.query_caps()
            .map_err(|e| MoodFitError::DeviceError(format!("Failed to query capabilities: {}", e)))?;

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            tracing::warn!("Device {} may not support standard video capture ({:?})", index, caps.capabilities);
        }

        let mut fmt = device.format()
            .map_err(|e| MoodFitError::DeviceError(format!("Failed to get format: {}", e)))?;

        fmt.width = config.camera.width;
        fmt.height = config.camera.height;

        // Webcams usually offer MJPG; keep raw formats we can decode directly
        if !is_raw_format(&fmt.fourcc) {
            fmt.fourcc = FourCC::new(b"MJPG");
        }

        if let Err(e) = device.set_format(&fmt) {
            tracing::warn!("Could not set exact format: {}. Using device defaults.", e);
        }

        let final_fmt = device.format()
            .map_err(|e| MoodFitError::DeviceError(format!("Failed to get final format: {}", e)))?;

        if final_fmt.width != config.camera.width || final_fmt.height != config.camera.height {
            tracing::warn!(
                "Camera resolution {}x{} differs from requested {}x{}",
                final_fmt.width, final_fmt.height,
                config.camera.width, config.camera.height
            );
        }

        tracing::debug!(
            "Camera {} ready: {}x{} {}",
            index, final_fmt.width, final_fmt.height,
            final_fmt.fourcc.str().unwrap_or("????")
        );

        Ok(Self { device, index, config })
    }

    /// Start a streaming session for multiple captures
    pub fn start_session(&mut self) -> Result<CameraSession<'_>> {
        let format = self.device.format()
            .map_err(|e| MoodFitError::DeviceError(format!("Failed to get format: {}", e)))?;

        let mut stream = v4l::io::mmap::Stream::with_buffers(&mut self.device, Type::VideoCapture, 4)
            .map_err(|e| MoodFitError::DeviceError(format!("Failed to create stream: {}", e)))?;

        for i in 0..self.config.camera.warmup_frames {
            stream.next()
                .map_err(|e| MoodFitError::DeviceError(format!("Failed to capture warmup frame {}: {}", i, e)))?;
            std::thread::sleep(std::time::Duration::from_millis(self.config.camera.warmup_delay_ms));
        }

        Ok(CameraSession { stream, format })
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        tracing::debug!("Released camera device {}", self.index);
    }
}

impl VideoDevice for Camera {
    fn start_stream(&mut self) -> Result<Box<dyn FrameSource + '_>> {
        Ok(Box::new(self.start_session()?))
    }
}

impl FrameSource for CameraSession<'_> {
    fn next_frame(&mut self) -> Result<Frame> {
        let (buf, _meta) = self.stream.next()
            .map_err(|e| MoodFitError::DeviceError(format!("Failed to capture: {}", e)))?;

        decode_frame(&self.format.fourcc.repr, buf, self.format.width, self.format.height)
    }
}

fn is_raw_format(fourcc: &FourCC) -> bool {
    matches!(&fourcc.repr, b"GREY" | b"YUYV")
}

pub fn decode_frame(fourcc: &[u8; 4], data: &[u8], width: u32, height: u32) -> Result<Frame> {
    match fourcc {
        b"GREY" => grey_to_image(data, width, height),
        b"YUYV" => yuyv_to_image(data, width, height),
        b"MJPG" => Ok(image::load_from_memory_with_format(data, ImageFormat::Jpeg)?),
        other => Err(MoodFitError::DeviceError(format!(
            "Unsupported pixel format {}", String::from_utf8_lossy(other)
        ))),
    }
}

fn grey_to_image(data: &[u8], width: u32, height: u32) -> Result<Frame> {
    let pixels = (width * height) as usize;
    let img_buffer = ImageBuffer::<Luma<u8>, _>::from_raw(width, height, data.get(..pixels).unwrap_or(data).to_vec())
        .ok_or_else(|| MoodFitError::DeviceError("Failed to create grayscale image buffer".into()))?;

    Ok(DynamicImage::ImageLuma8(img_buffer))
}

// Keep the luma plane only: Y0 U Y1 V
fn yuyv_to_image(data: &[u8], width: u32, height: u32) -> Result<Frame> {
    let luma: Vec<u8> = data.iter().step_by(2).copied().collect();
    grey_to_image(&luma, width, height)
}
