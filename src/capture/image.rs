//! Interval still capture

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{CaptureCallback, CaptureError, ImageCapture};
use crate::camera::device_file_prefix;
use crate::camera::status::{CaptureState, ImageCaptureStatus};
use crate::camera::SharedDevice;

/// Takes a single picture. May block; it runs on the blocking pool.
pub trait Shutter: Send + Sync + 'static {
    fn click(&self, seq: u32) -> Result<PathBuf, CaptureError>;
}

/// Writes the device's next raw frame to `<location>/<device>_img_<ms>_<seq>.raw`
pub struct FrameFileShutter {
    device: SharedDevice,
    location: PathBuf,
    prefix: String,
}

impl FrameFileShutter {
    pub fn new(device: SharedDevice, location: impl Into<PathBuf>) -> Self {
        let prefix = device_file_prefix(device.lock().device_id()).to_string();
        Self {
            device,
            location: location.into(),
            prefix,
        }
    }
}

impl Shutter for FrameFileShutter {
    fn click(&self, seq: u32) -> Result<PathBuf, CaptureError> {
        let frame = self.device.lock().read_frame()?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let path = self
            .location
            .join(format!("{}_img_{}_{}.raw", self.prefix, stamp, seq));
        std::fs::write(&path, frame)?;
        Ok(path)
    }
}

/// Still capture worker with IDLE / INIT / RUN / ERROR states
pub struct IntervalImageCapture<S: Shutter> {
    shutter: Arc<S>,
    state: Arc<AtomicU8>,
    interval: f32,
    images_captured: Arc<AtomicU32>,
    worker: Option<JoinHandle<()>>,
}

impl<S: Shutter> IntervalImageCapture<S> {
    pub fn new(shutter: S) -> Self {
        Self {
            shutter: Arc::new(shutter),
            state: Arc::new(AtomicU8::new(CaptureState::Init as u8)),
            interval: 0.0,
            images_captured: Arc::new(AtomicU32::new(0)),
            worker: None,
        }
    }

    fn set_state(&self, state: CaptureState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

impl<S: Shutter> ImageCapture for IntervalImageCapture<S> {
    fn start(
        &mut self,
        interval: f32,
        count: u32,
        mut callback: CaptureCallback,
    ) -> Result<(), CaptureError> {
        let period = if interval > 0.0 {
            Some(Duration::try_from_secs_f32(interval).map_err(|_| CaptureError::InvalidArguments)?)
        } else {
            None
        };
        if period.is_none() && count == 0 {
            return Err(CaptureError::InvalidArguments);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| CaptureError::NoRuntime)?;

        self.stop();

        // per-run state: an aborted worker may still write to the previous one
        self.interval = interval.max(0.0);
        self.images_captured = Arc::new(AtomicU32::new(0));
        self.state = Arc::new(AtomicU8::new(CaptureState::Running as u8));
        info!(interval, count, "image capture started");

        let shutter = self.shutter.clone();
        let state = self.state.clone();
        let captured = self.images_captured.clone();

        self.worker = Some(runtime.spawn(async move {
            let mut seq = 0u32;
            loop {
                seq += 1;
                let shot = shutter.clone();
                let result = match tokio::task::spawn_blocking(move || shot.click(seq)).await {
                    Ok(Ok(path)) => {
                        debug!(seq, path = %path.display(), "image captured");
                        Ok(())
                    }
                    Ok(Err(e)) => Err(e),
                    Err(e) => Err(CaptureError::Worker(e.to_string())),
                };

                if let Err(e) = &result {
                    warn!(seq, error = %e, "image capture failed");
                    state.store(CaptureState::Error as u8, Ordering::SeqCst);
                    callback(result, seq);
                    return;
                }

                captured.fetch_add(1, Ordering::SeqCst);
                callback(result, seq);

                if count > 0 && seq >= count {
                    break;
                }
                if let Some(period) = period {
                    tokio::time::sleep(period).await;
                }
            }
            state.store(CaptureState::Init as u8, Ordering::SeqCst);
        }));

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
            debug!("image capture stopped");
        }
        self.set_state(CaptureState::Idle);
    }

    fn status(&self) -> ImageCaptureStatus {
        ImageCaptureStatus {
            state: CaptureState::from_u8(self.state.load(Ordering::SeqCst)),
            interval: self.interval,
            images_captured: self.images_captured.load(Ordering::SeqCst),
        }
    }
}

impl<S: Shutter> Drop for IntervalImageCapture<S> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}
