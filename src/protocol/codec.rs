//! Restartable framing around the `mavlink` crate's reader and writer
//!
//! UDP hands us datagrams, not a stream. The parser buffers bytes across
//! calls, cuts out one complete frame at a time and lets
//! [`mavlink::read_versioned_msg`] verify and decode it. Garbage between
//! frames is skipped until the next start byte.

use bytes::Bytes;
use mavlink::error::{MessageReadError, ParserError};
use mavlink::peek_reader::PeekReader;
use mavlink::{MavHeader, MavlinkVersion};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::MavMessage;

const STX_V1: u8 = 0xFE;
const STX_V2: u8 = 0xFD;

/// STX LEN SEQ SYSID COMPID MSGID
const V1_HEADER_LEN: usize = 6;

/// STX LEN INCOMPAT COMPAT SEQ SYSID COMPID MSGID(3)
const V2_HEADER_LEN: usize = 10;

const CHECKSUM_LEN: usize = 2;
const SIGNATURE_LEN: usize = 13;
const INCOMPAT_FLAG_SIGNED: u8 = 0x01;

/// Largest MAVLink 2 frame, signature included
const MAX_FRAME_LEN: usize = V2_HEADER_LEN + 255 + CHECKSUM_LEN + SIGNATURE_LEN;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("frame for message {msg_id} failed its checksum")]
    BadChecksum { msg_id: u32 },

    #[error("unknown message id {0}")]
    UnknownMessage(u32),

    #[error("unsupported incompatibility flags {0:#04x}")]
    UnsupportedFlags(u8),

    #[error("message {msg_id} not decodable: {reason}")]
    Malformed { msg_id: u32, reason: String },
}

#[derive(Error, Debug)]
#[error("failed to encode message {msg_id}: {reason}")]
pub struct EncodeError {
    pub msg_id: u32,
    pub reason: String,
}

/// Parser counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserStats {
    /// Frames that passed the checksum and decoded
    pub frames_received: u64,

    /// Frames rejected by checksum
    pub crc_errors: u64,

    /// Frames with an id outside the dialect
    pub unknown_messages: u64,

    /// Bytes skipped while hunting for a start byte
    pub bytes_dropped: u64,
}

/// Serializes `msg` as a MAVLink 2 frame
pub fn encode(header: MavHeader, msg: &MavMessage) -> Result<Bytes, EncodeError> {
    let mut buf = Vec::with_capacity(MAX_FRAME_LEN);
    mavlink::write_v2_msg(&mut buf, header, msg).map_err(|e| EncodeError {
        msg_id: mavlink::Message::message_id(msg),
        reason: e.to_string(),
    })?;
    Ok(Bytes::from(buf))
}

#[derive(Debug, Default)]
pub struct MavlinkParser {
    buf: Vec<u8>,
    stats: ParserStats,
}

impl MavlinkParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a buffer, returning every frame it completed in order.
    /// A trailing partial frame is kept for the next call.
    pub fn parse(&mut self, data: &[u8]) -> Vec<Result<(MavHeader, MavMessage), ParseError>> {
        self.buf.extend_from_slice(data);
        let mut out = Vec::new();

        loop {
            let Some(start) = self.buf.iter().position(|&b| b == STX_V1 || b == STX_V2) else {
                self.stats.bytes_dropped += self.buf.len() as u64;
                self.buf.clear();
                break;
            };
            if start > 0 {
                self.stats.bytes_dropped += start as u64;
                self.buf.drain(..start);
            }

            let Some(len) = frame_len(&self.buf) else {
                break;
            };
            if self.buf.len() < len {
                break;
            }

            let frame: Vec<u8> = self.buf.drain(..len).collect();
            out.push(self.decode(&frame));
        }
        out
    }

    /// True while a frame is partially buffered
    pub fn in_frame(&self) -> bool {
        !self.buf.is_empty()
    }

    pub fn stats(&self) -> &ParserStats {
        &self.stats
    }

    fn decode(&mut self, frame: &[u8]) -> Result<(MavHeader, MavMessage), ParseError> {
        let (version, msg_id) = if frame[0] == STX_V2 {
            let incompat = frame[2];
            if incompat != 0 {
                return Err(ParseError::UnsupportedFlags(incompat));
            }
            (
                MavlinkVersion::V2,
                u32::from_le_bytes([frame[7], frame[8], frame[9], 0]),
            )
        } else {
            (MavlinkVersion::V1, u32::from(frame[5]))
        };

        let mut reader: PeekReader<&[u8]> = PeekReader::new(frame);
        match mavlink::read_versioned_msg::<MavMessage, _>(&mut reader, version) {
            Ok(decoded) => {
                self.stats.frames_received += 1;
                Ok(decoded)
            }
            // the reader skips a frame whose checksum fails and then runs dry
            Err(MessageReadError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.stats.crc_errors += 1;
                Err(ParseError::BadChecksum { msg_id })
            }
            Err(MessageReadError::Parse(ParserError::UnknownMessage { id })) => {
                self.stats.unknown_messages += 1;
                Err(ParseError::UnknownMessage(id))
            }
            Err(e) => Err(ParseError::Malformed {
                msg_id,
                reason: e.to_string(),
            }),
        }
    }
}

/// Total length of the frame starting at `buf[0]`, once its header says so
fn frame_len(buf: &[u8]) -> Option<usize> {
    match *buf.first()? {
        STX_V2 => {
            let payload = *buf.get(1)? as usize;
            let signature = if buf.get(2)? & INCOMPAT_FLAG_SIGNED != 0 {
                SIGNATURE_LEN
            } else {
                0
            };
            Some(V2_HEADER_LEN + payload + CHECKSUM_LEN + signature)
        }
        _ => Some(V1_HEADER_LEN + *buf.get(1)? as usize + CHECKSUM_LEN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        MavAutopilot, MavCmd, MavModeFlag, MavState, MavType, COMMAND_LONG_DATA, HEARTBEAT_DATA,
    };

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    /// HEARTBEAT from system 1, component 100, sequence 0
    const HEARTBEAT_V2: &str = "fd09000000016400000000000000000800040373f3";

    fn command_frame(sequence: u8) -> Bytes {
        let msg = MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
            param1: 1.0,
            command: MavCmd::MAV_CMD_REQUEST_CAMERA_INFORMATION,
            target_system: 1,
            target_component: 100,
            ..Default::default()
        });
        let header = MavHeader {
            system_id: 255,
            component_id: 190,
            sequence,
        };
        encode(header, &msg).unwrap()
    }

    #[test]
    fn test_encodes_known_heartbeat_bytes() {
        let msg = MavMessage::HEARTBEAT(HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_GENERIC,
            autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
            base_mode: MavModeFlag::empty(),
            system_status: MavState::MAV_STATE_ACTIVE,
            mavlink_version: 3,
        });
        let header = MavHeader {
            system_id: 1,
            component_id: 100,
            sequence: 0,
        };
        assert_eq!(encode(header, &msg).unwrap().to_vec(), hex(HEARTBEAT_V2));
    }

    #[test]
    fn test_decodes_heartbeat() {
        let mut parser = MavlinkParser::new();
        let results = parser.parse(&hex(HEARTBEAT_V2));

        assert_eq!(results.len(), 1);
        let (header, msg) = results[0].as_ref().unwrap();
        assert_eq!((header.system_id, header.component_id), (1, 100));
        match msg {
            MavMessage::HEARTBEAT(hb) => {
                assert_eq!(hb.autopilot, MavAutopilot::MAV_AUTOPILOT_INVALID)
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!parser.in_frame());
    }

    #[test]
    fn test_frame_split_across_buffers() {
        let bytes = command_frame(3);
        let (first, second) = bytes.split_at(11);
        let mut parser = MavlinkParser::new();

        assert!(parser.parse(first).is_empty());
        assert!(parser.in_frame());
        let results = parser.parse(second);
        assert_eq!(results.len(), 1);
        let (header, msg) = results[0].as_ref().unwrap();
        assert_eq!(header.sequence, 3);
        assert!(matches!(msg, MavMessage::COMMAND_LONG(_)));
    }

    #[test]
    fn test_skips_garbage_and_resyncs_after_bad_crc() {
        let mut corrupted = command_frame(0).to_vec();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xFF;

        let mut data = vec![0x00, 0x13, 0x37];
        data.extend_from_slice(&corrupted);
        data.extend_from_slice(&command_frame(1));

        let mut parser = MavlinkParser::new();
        let results = parser.parse(&data);

        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(ParseError::BadChecksum { msg_id: 76 })));
        assert!(results[1].is_ok());
        assert_eq!(parser.stats().bytes_dropped, 3);
        assert_eq!(parser.stats().crc_errors, 1);
        assert_eq!(parser.stats().frames_received, 1);
    }

    #[test]
    fn test_signed_frame_is_refused_whole() {
        let mut signed = command_frame(0).to_vec();
        signed[2] = INCOMPAT_FLAG_SIGNED;
        signed.extend_from_slice(&[0u8; SIGNATURE_LEN]);
        signed.extend_from_slice(&command_frame(1));

        let mut parser = MavlinkParser::new();
        let results = parser.parse(&signed);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0], Err(ParseError::UnsupportedFlags(INCOMPAT_FLAG_SIGNED)));
        assert!(results[1].is_ok());
    }
}
