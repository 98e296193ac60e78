//! Video streams exposed to peers and their frame-size catalogs

mod negotiator;
mod uri;

pub use negotiator::find_best_frame_size;
pub use uri::{size_query, RtspUriResolver, UriResolver, DEFAULT_RTSP_PORT};

use serde::{Deserialize, Serialize};

/// A discrete resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A pixel format and the frame sizes a device offers for it (unsorted)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFormat {
    pub fourcc: String,
    pub frame_sizes: Vec<FrameSize>,
}

/// Position of a frame size inside a stream's catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSizeRef {
    pub format: usize,
    pub size: usize,
}

/// A stream served for one camera device
///
/// The catalog is fixed at construction. Only the selected frame size
/// changes afterwards, and it is always a position into the catalog.
#[derive(Debug, Clone)]
pub struct Stream {
    name: String,
    path: String,
    device_id: String,
    framerate: f32,
    formats: Vec<PixelFormat>,
    selected: Option<FrameSizeRef>,
}

impl Stream {
    pub fn new(
        name: impl Into<String>,
        device_id: impl Into<String>,
        framerate: f32,
        formats: Vec<PixelFormat>,
    ) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            device_id: device_id.into(),
            framerate,
            formats,
            selected: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// URI path the stream is served under
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn framerate(&self) -> f32 {
        self.framerate
    }

    pub fn formats(&self) -> &[PixelFormat] {
        &self.formats
    }

    pub fn frame_size(&self, at: FrameSizeRef) -> Option<FrameSize> {
        self.formats
            .get(at.format)
            .and_then(|f| f.frame_sizes.get(at.size))
            .copied()
    }

    /// Frame size chosen by a peer, `None` meaning device default
    pub fn selected_frame_size(&self) -> Option<FrameSize> {
        self.selected.and_then(|at| self.frame_size(at))
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Negotiates against the catalog and remembers the result
    pub fn select_frame_size(&mut self, width: u32, height: u32) -> Option<FrameSize> {
        self.selected = find_best_frame_size(&self.formats, width, height);
        self.selected_frame_size()
    }

    /// Size reported to peers: the selection if any, else the best fit for
    /// the device's current size
    pub fn reported_frame_size(&self, current: FrameSize) -> Option<FrameSize> {
        self.selected_frame_size().or_else(|| {
            find_best_frame_size(&self.formats, current.width, current.height)
                .and_then(|at| self.frame_size(at))
        })
    }
}
