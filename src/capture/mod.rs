//! Image and video capture collaborators
//!
//! Both run their work off the protocol loop. Image capture reports each
//! shot through a callback; video capture is polled for status.

mod image;
mod video;

pub use image::{FrameFileShutter, IntervalImageCapture, Shutter};
pub use video::{FrameFileRecorder, Recorder, RecordingVideoCapture};

use thiserror::Error;

use crate::camera::status::{ImageCaptureStatus, VideoCaptureStatus};
use crate::camera::DeviceError;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture needs a positive interval or a count")]
    InvalidArguments,

    #[error("no async runtime available for the capture worker")]
    NoRuntime,

    #[error("capture already running")]
    AlreadyRunning,

    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("capture worker failed: {0}")]
    Worker(String),
}

/// Receives the outcome and 1-based sequence number of each shot
pub type CaptureCallback = Box<dyn FnMut(Result<(), CaptureError>, u32) + Send + 'static>;

pub trait ImageCapture: Send {
    /// Starts a capture of `count` shots (0 = until stopped) spaced
    /// `interval` seconds apart, replacing any capture in progress
    fn start(
        &mut self,
        interval: f32,
        count: u32,
        callback: CaptureCallback,
    ) -> Result<(), CaptureError>;

    /// Cancels the capture; a no-op when idle
    fn stop(&mut self);

    fn status(&self) -> ImageCaptureStatus;
}

pub trait VideoCapture: Send {
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Ends the recording; a no-op when idle
    fn stop(&mut self) -> Result<(), CaptureError>;

    fn status(&self) -> VideoCaptureStatus;
}
