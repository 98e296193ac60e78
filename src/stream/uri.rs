//! Playable URIs for streams

use super::{FrameSize, Stream};

pub const DEFAULT_RTSP_PORT: u16 = 8554;

/// Turns a server address, a stream and a query into a URI a peer can open
pub trait UriResolver: Send {
    fn resolve(&self, server_addr: &str, stream: &Stream, query: &str) -> String;
}

/// `rtsp://<addr>:<port>/<path>[?query]`
#[derive(Debug, Clone)]
pub struct RtspUriResolver {
    port: u16,
}

impl RtspUriResolver {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl Default for RtspUriResolver {
    fn default() -> Self {
        Self::new(DEFAULT_RTSP_PORT)
    }
}

impl UriResolver for RtspUriResolver {
    fn resolve(&self, server_addr: &str, stream: &Stream, query: &str) -> String {
        let mut uri = format!("rtsp://{}:{}/{}", server_addr, self.port, stream.path());
        if !query.is_empty() {
            uri.push('?');
            uri.push_str(query);
        }
        uri
    }
}

/// Query selecting a frame size on the RTSP server
pub fn size_query(size: FrameSize) -> String {
    format!("width={}&height={}", size.width, size.height)
}
