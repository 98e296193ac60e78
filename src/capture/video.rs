//! Continuous video capture

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use super::{CaptureError, VideoCapture};
use crate::camera::device_file_prefix;
use crate::camera::status::{CaptureState, VideoCaptureStatus};
use crate::camera::SharedDevice;

/// Produces a recording between `begin` and `end`
pub trait Recorder: Send + 'static {
    /// Starts recording. A recording that dies on its own stores
    /// [`CaptureState::Error`] into `state`.
    fn begin(&mut self, state: Arc<AtomicU8>) -> Result<(), CaptureError>;

    /// Asks the recording to stop. Must not wait for it.
    fn end(&mut self) -> Result<(), CaptureError>;
}

/// Appends raw device frames to `<location>/<device>_vid_<ms>.raw` at a fixed rate
pub struct FrameFileRecorder {
    device: SharedDevice,
    location: PathBuf,
    prefix: String,
    framerate: u32,
    running: Option<Arc<AtomicBool>>,
}

impl FrameFileRecorder {
    pub fn new(device: SharedDevice, location: impl Into<PathBuf>, framerate: u32) -> Self {
        let prefix = device_file_prefix(device.lock().device_id()).to_string();
        Self {
            device,
            location: location.into(),
            prefix,
            framerate: framerate.max(1),
            running: None,
        }
    }
}

impl Recorder for FrameFileRecorder {
    fn begin(&mut self, state: Arc<AtomicU8>) -> Result<(), CaptureError> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let path = self
            .location
            .join(format!("{}_vid_{}.raw", self.prefix, stamp));
        let mut file = File::create(&path)?;

        // per-run flag: a thread still finishing an old run must not see a new one
        let running = Arc::new(AtomicBool::new(true));
        let device = self.device.clone();
        let period = Duration::from_secs(1) / self.framerate;

        info!(path = %path.display(), framerate = self.framerate, "recording started");
        let flag = running.clone();
        std::thread::Builder::new()
            .name(format!("{}-recorder", self.prefix))
            .spawn(move || {
                let mut frames = 0u64;
                while flag.load(Ordering::SeqCst) {
                    let written = device
                        .lock()
                        .read_frame()
                        .map_err(CaptureError::from)
                        .and_then(|frame| Ok(file.write_all(&frame)?));
                    if let Err(e) = written {
                        warn!(frames, error = %e, "recording failed");
                        state.store(CaptureState::Error as u8, Ordering::SeqCst);
                        return;
                    }
                    frames += 1;
                    std::thread::sleep(period);
                }
                debug!(frames, "recorder finished");
            })?;
        self.running = Some(running);
        Ok(())
    }

    fn end(&mut self) -> Result<(), CaptureError> {
        if let Some(running) = self.running.take() {
            running.store(false, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for FrameFileRecorder {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.store(false, Ordering::SeqCst);
        }
    }
}

/// Video capture state around a [`Recorder`]
pub struct RecordingVideoCapture<R: Recorder> {
    recorder: R,
    state: Arc<AtomicU8>,
    started: Option<Instant>,
}

impl<R: Recorder> RecordingVideoCapture<R> {
    pub fn new(recorder: R) -> Self {
        Self {
            recorder,
            state: Arc::new(AtomicU8::new(CaptureState::Init as u8)),
            started: None,
        }
    }

    fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

impl<R: Recorder> VideoCapture for RecordingVideoCapture<R> {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.state() == CaptureState::Running {
            return Err(CaptureError::AlreadyRunning);
        }

        // per-run state, as for still capture
        self.state = Arc::new(AtomicU8::new(CaptureState::Running as u8));
        match self.recorder.begin(self.state.clone()) {
            Ok(()) => {
                self.started = Some(Instant::now());
                Ok(())
            }
            Err(e) => {
                self.state.store(CaptureState::Error as u8, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        match self.state() {
            CaptureState::Running | CaptureState::Error => {
                self.started = None;
                self.state.store(CaptureState::Init as u8, Ordering::SeqCst);
                self.recorder.end()
            }
            _ => Ok(()),
        }
    }

    fn status(&self) -> VideoCaptureStatus {
        let state = self.state();
        let recording_time_ms = match (state, self.started) {
            (CaptureState::Running, Some(t)) => {
                u32::try_from(t.elapsed().as_millis()).unwrap_or(u32::MAX)
            }
            _ => 0,
        };
        VideoCaptureStatus {
            state,
            recording_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraDevice, CameraParameters, CustomDevice};
    use crate::stream::FrameSize;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FakeRecorder {
        begins: u32,
        ends: u32,
        fail: bool,
        state: Option<Arc<AtomicU8>>,
    }

    impl Recorder for FakeRecorder {
        fn begin(&mut self, state: Arc<AtomicU8>) -> Result<(), CaptureError> {
            if self.fail {
                return Err(CaptureError::Worker("no space".into()));
            }
            self.begins += 1;
            self.state = Some(state);
            Ok(())
        }

        fn end(&mut self) -> Result<(), CaptureError> {
            self.ends += 1;
            Ok(())
        }
    }

    fn shared(device: CustomDevice) -> SharedDevice {
        Arc::new(Mutex::new(device))
    }

    fn wait_for_state<R: Recorder>(video: &RecordingVideoCapture<R>, want: CaptureState) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while video.status().state != want && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(video.status().state, want);
    }

    #[test]
    fn test_start_stop_cycle() {
        let mut video = RecordingVideoCapture::new(FakeRecorder::default());
        assert_eq!(video.status().state, CaptureState::Init);

        video.start().unwrap();
        assert_eq!(video.status().state, CaptureState::Running);
        assert!(matches!(video.start(), Err(CaptureError::AlreadyRunning)));

        video.stop().unwrap();
        video.stop().unwrap();
        assert_eq!(video.status().state, CaptureState::Init);
        assert_eq!(video.status().recording_time_ms, 0);
        assert_eq!(video.recorder.begins, 1);
        assert_eq!(video.recorder.ends, 1);
    }

    #[test]
    fn test_recorder_failure_sets_error() {
        let mut video = RecordingVideoCapture::new(FakeRecorder {
            fail: true,
            ..Default::default()
        });
        assert!(video.start().is_err());
        assert_eq!(video.status().state, CaptureState::Error);
    }

    #[test]
    fn test_late_failure_from_old_run_leaves_new_run_alone() {
        let mut video = RecordingVideoCapture::new(FakeRecorder::default());
        video.start().unwrap();
        let first_run = video.recorder.state.take().unwrap();
        video.stop().unwrap();

        video.start().unwrap();
        first_run.store(CaptureState::Error as u8, Ordering::SeqCst);
        assert_eq!(video.status().state, CaptureState::Running);
    }

    #[test]
    fn test_recording_time_advances() {
        let mut video = RecordingVideoCapture::new(FakeRecorder::default());
        video.start().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(video.status().recording_time_ms >= 20);
    }

    #[test]
    fn test_frame_file_recorder_writes_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut custom = CustomDevice::new().with_size(FrameSize::new(2, 2));
        custom.init(&mut CameraParameters::new()).unwrap();

        let mut video = RecordingVideoCapture::new(FrameFileRecorder::new(shared(custom), dir.path(), 100));
        video.start().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        video.stop().unwrap();
        // let the detached thread see the flag
        std::thread::sleep(Duration::from_millis(50));

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let len = entries[0].as_ref().unwrap().metadata().unwrap().len();
        assert!(len > 0);
        assert_eq!(len % (2 * 2 * 3), 0, "file holds whole frames");
        assert_eq!(video.status().state, CaptureState::Init);
    }

    #[test]
    fn test_device_failure_while_recording_sets_error() {
        let dir = tempfile::tempdir().unwrap();
        // never initialized, so every read fails
        let device = shared(CustomDevice::new());

        let mut video = RecordingVideoCapture::new(FrameFileRecorder::new(device, dir.path(), 25));
        video.start().unwrap();
        wait_for_state(&video, CaptureState::Error);
        assert_eq!(video.status().recording_time_ms, 0);

        // a failed recording can be cleared and started again
        video.stop().unwrap();
        assert_eq!(video.status().state, CaptureState::Init);
        assert!(video.start().is_ok());
        wait_for_state(&video, CaptureState::Error);
    }

    #[test]
    fn test_stop_does_not_wait_for_the_recorder_thread() {
        let dir = tempfile::tempdir().unwrap();
        let mut custom = CustomDevice::new().with_size(FrameSize::new(2, 2));
        custom.init(&mut CameraParameters::new()).unwrap();

        // one frame a second: the thread sleeps right after the first write
        let mut video = RecordingVideoCapture::new(FrameFileRecorder::new(shared(custom), dir.path(), 1));
        video.start().unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let begun = Instant::now();
        video.stop().unwrap();
        assert!(begun.elapsed() < Duration::from_millis(500));
        assert_eq!(video.status().state, CaptureState::Init);
    }
}
