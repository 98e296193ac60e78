//! Capture-status model
//!
//! Capture collaborators report their run-state; this module turns it into
//! the values carried by CAMERA_CAPTURE_STATUS. Nothing here mutates a
//! capture.

use serde::{Deserialize, Serialize};

/// Run-state shared by image and video capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum CaptureState {
    #[default]
    Idle = 0,
    /// Armed, waiting for the next shot or for start
    Init = 1,
    Running = 2,
    Error = 3,
}

impl CaptureState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Init,
            2 => Self::Running,
            3 => Self::Error,
            _ => Self::Idle,
        }
    }
}

/// Wire value of CAMERA_CAPTURE_STATUS.image_status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ImageStatus {
    Idle = 0,
    Capturing = 1,
    IntervalCapturing = 3,
}

/// Wire value of CAMERA_CAPTURE_STATUS.video_status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VideoStatus {
    Idle = 0,
    Capturing = 1,
}

/// Snapshot of an image capture collaborator
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageCaptureStatus {
    pub state: CaptureState,
    /// Seconds between shots; zero or less means single-shot
    pub interval: f32,
    pub images_captured: u32,
}

impl ImageCaptureStatus {
    pub fn image_status(&self) -> ImageStatus {
        match self.state {
            CaptureState::Running if self.interval > 0.0 => ImageStatus::IntervalCapturing,
            CaptureState::Running => ImageStatus::Capturing,
            CaptureState::Idle | CaptureState::Init | CaptureState::Error => ImageStatus::Idle,
        }
    }
}

/// Snapshot of a video capture collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoCaptureStatus {
    pub state: CaptureState,
    pub recording_time_ms: u32,
}

impl VideoCaptureStatus {
    pub fn video_status(&self) -> VideoStatus {
        match self.state {
            CaptureState::Running => VideoStatus::Capturing,
            _ => VideoStatus::Idle,
        }
    }
}

/// Combined status as reported to peers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureStatus {
    pub image: ImageStatus,
    pub video: VideoStatus,
    /// Interval reported with the image status, zero when not interval capturing
    pub interval: f32,
    pub recording_time_ms: u32,
}

impl CaptureStatus {
    pub fn derive(image: &ImageCaptureStatus, video: &VideoCaptureStatus) -> Self {
        let image_status = image.image_status();
        let interval = match image_status {
            ImageStatus::IntervalCapturing => image.interval,
            _ => 0.0,
        };
        Self {
            image: image_status,
            video: video.video_status(),
            interval,
            recording_time_ms: video.recording_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CaptureState::Idle, 5.0, ImageStatus::Idle)]
    #[case(CaptureState::Init, 5.0, ImageStatus::Idle)]
    #[case(CaptureState::Error, 5.0, ImageStatus::Idle)]
    #[case(CaptureState::Running, 5.0, ImageStatus::IntervalCapturing)]
    #[case(CaptureState::Running, 0.0, ImageStatus::Capturing)]
    #[case(CaptureState::Running, -1.0, ImageStatus::Capturing)]
    fn test_image_status_derivation(
        #[case] state: CaptureState,
        #[case] interval: f32,
        #[case] expected: ImageStatus,
    ) {
        let status = ImageCaptureStatus {
            state,
            interval,
            images_captured: 0,
        };
        assert_eq!(status.image_status(), expected);
    }

    #[rstest]
    #[case(CaptureState::Running, VideoStatus::Capturing)]
    #[case(CaptureState::Idle, VideoStatus::Idle)]
    #[case(CaptureState::Init, VideoStatus::Idle)]
    #[case(CaptureState::Error, VideoStatus::Idle)]
    fn test_video_status_derivation(#[case] state: CaptureState, #[case] expected: VideoStatus) {
        let status = VideoCaptureStatus {
            state,
            recording_time_ms: 0,
        };
        assert_eq!(status.video_status(), expected);
    }

    #[test]
    fn test_combined_status_reports_interval_only_while_interval_capturing() {
        let video = VideoCaptureStatus {
            state: CaptureState::Running,
            recording_time_ms: 1500,
        };
        let armed = ImageCaptureStatus {
            state: CaptureState::Init,
            interval: 2.0,
            images_captured: 1,
        };

        let status = CaptureStatus::derive(&armed, &video);
        assert_eq!(status.image, ImageStatus::Idle);
        assert_eq!(status.interval, 0.0);
        assert_eq!(status.video, VideoStatus::Capturing);
        assert_eq!(status.recording_time_ms, 1500);

        let running = ImageCaptureStatus {
            state: CaptureState::Running,
            ..armed
        };
        let status = CaptureStatus::derive(&running, &video);
        assert_eq!(status.image as u8, 3);
        assert_eq!(status.interval, 2.0);
    }
}
