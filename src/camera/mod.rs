//! Camera access as a scoped resource.
//!
//! A [`DeviceOpener`] acquires the device at the start of an operation and the
//! returned [`VideoDevice`] releases it when dropped, so every exit path of a
//! capture loop gives the camera back. Frames are pulled through
//! [`BoundedFrames`], a lazy sequence that ends at a wall-clock deadline.

pub mod v4l2;

use crate::common::{Config, Result};
use image::DynamicImage;
use std::time::{Duration, Instant};

pub use v4l2::{Camera, CameraSession};

pub type Frame = DynamicImage;

/// Anything that yields camera frames one at a time.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame>;
}

/// An opened camera. Dropping it releases the device.
pub trait VideoDevice {
    fn start_stream(&mut self) -> Result<Box<dyn FrameSource + '_>>;
}

pub trait DeviceOpener {
    fn open(&self) -> Result<Box<dyn VideoDevice>>;
}

/// Opens the V4L2 device named in the camera config.
pub struct V4lOpener {
    config: Config,
}

impl V4lOpener {
    pub fn new(config: &Config) -> Self {
        Self { config: config.clone() }
    }
}

impl DeviceOpener for V4lOpener {
    fn open(&self) -> Result<Box<dyn VideoDevice>> {
        let camera = Camera::new(&self.config)?;
        Ok(Box::new(camera))
    }
}

/// Frames from `source` until `deadline`; checked before every pull.
pub struct BoundedFrames<'a> {
    source: &'a mut dyn FrameSource,
    deadline: Instant,
    pulled: u32,
}

impl<'a> BoundedFrames<'a> {
    pub fn new(source: &'a mut dyn FrameSource, budget: Duration) -> Self {
        Self {
            source,
            deadline: Instant::now() + budget,
            pulled: 0,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn frames_pulled(&self) -> u32 {
        self.pulled
    }
}

impl Iterator for BoundedFrames<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.expired() {
            return None;
        }
        self.pulled += 1;
        Some(self.source.next_frame())
    }
}
