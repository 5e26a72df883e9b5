//! Frame encoder and byte-at-a-time frame parser.

use std::collections::VecDeque;

use super::crc::frame_checksum;
use super::messages::{MavPayload, MessageKind};
use super::{CRC_LEN, HEADER_LEN, MAVLINK_STX, MAX_FRAME_LEN};
use crate::error::CodecError;

/// A complete, checksum-verified MAVLink v1 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequence: u8,
    pub system_id: u8,
    pub component_id: u8,
    pub message_id: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_id(self.message_id)
    }

    /// Decode the payload as `P`, checking the message id first.
    pub fn decode<P: MavPayload>(&self) -> Result<P, CodecError> {
        if self.message_id != P::KIND.id() {
            return Err(CodecError::UnknownMessageId(self.message_id));
        }
        P::from_payload(&self.payload)
    }
}

/// Serialize a payload into a complete frame.
///
/// Fails with `UnknownMessageId` for ids outside the supported set, and with
/// `PayloadLength` when `payload` does not match the id's fixed length.
pub fn encode(
    message_id: u8,
    payload: &[u8],
    sequence: u8,
    system_id: u8,
    component_id: u8,
) -> Result<Vec<u8>, CodecError> {
    let kind = MessageKind::from_id(message_id).ok_or(CodecError::UnknownMessageId(message_id))?;
    let payload_len = kind.payload_len();
    if payload.len() != payload_len {
        return Err(CodecError::PayloadLength {
            msg_id: message_id,
            expected: payload_len,
            actual: payload.len(),
        });
    }

    let mut buf = Vec::with_capacity(HEADER_LEN + payload_len + CRC_LEN);
    buf.extend_from_slice(&[
        MAVLINK_STX,
        payload_len as u8,
        sequence,
        system_id,
        component_id,
        message_id,
    ]);
    buf.extend_from_slice(payload);

    let checksum = frame_checksum(&buf[1..], kind.crc_extra());
    buf.extend_from_slice(&checksum.to_le_bytes());
    Ok(buf)
}

/// Stateful frame writer holding the system id and a wrapping sequence number.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    system_id: u8,
    sequence: u8,
}

impl FrameEncoder {
    pub fn new(system_id: u8) -> Self {
        Self {
            system_id,
            sequence: 0,
        }
    }

    /// Frame raw payload bytes for `message_id`.
    pub fn encode(
        &mut self,
        message_id: u8,
        payload: &[u8],
        component_id: u8,
    ) -> Result<Vec<u8>, CodecError> {
        let frame = encode(
            message_id,
            payload,
            self.sequence,
            self.system_id,
            component_id,
        )?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }

    /// Serialize and frame a typed payload.
    pub fn encode_message<P: MavPayload>(
        &mut self,
        message: &P,
        component_id: u8,
    ) -> Result<Vec<u8>, CodecError> {
        let payload = message.to_payload()?;
        self.encode(P::KIND.id(), &payload, component_id)
    }

    pub fn sequence(&self) -> u8 {
        self.sequence
    }
}

/// Parser statistics for monitoring and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Frames that passed the checksum.
    pub frames_received: u32,
    /// Candidate frames dropped on checksum mismatch.
    pub crc_errors: u32,
    /// Candidate frames with an id outside the supported set.
    pub unknown_messages: u32,
    /// Candidate frames whose length byte disagrees with the id's layout.
    pub malformed_frames: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    SeekStart,
    ReadHeader,
    ReadPayload,
    ReadCrc,
}

/// Byte-at-a-time MAVLink v1 parser.
///
/// State survives across calls, so a frame split over several datagrams is
/// still recognized. When a candidate frame is rejected, the bytes after its
/// start marker are scanned again, so a valid frame that overlaps a corrupt
/// one is never lost.
#[derive(Debug)]
pub struct FrameParser {
    state: ParserState,
    candidate: Vec<u8>,
    expected_len: usize,
    ready: VecDeque<Frame>,
    stats: ParserStats,
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::SeekStart,
            candidate: Vec::with_capacity(MAX_FRAME_LEN),
            expected_len: 0,
            ready: VecDeque::new(),
            stats: ParserStats::default(),
        }
    }

    /// Advance the parser by one byte.
    ///
    /// Returns a completed, verified frame when one is available. In the rare
    /// case that a rescan completes more than one frame, the rest are handed
    /// out by subsequent calls or by [`FrameParser::feed`].
    pub fn feed_byte(&mut self, byte: u8) -> Option<Frame> {
        self.push(byte);
        self.ready.pop_front()
    }

    /// Feed a chunk of bytes and collect every frame it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        for &byte in bytes {
            self.push(byte);
        }
        self.ready.drain(..).collect()
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ParserStats::default();
    }

    /// Drop any partial frame and start searching for a start marker.
    pub fn reset(&mut self) {
        self.state = ParserState::SeekStart;
        self.candidate.clear();
        self.expected_len = 0;
    }

    fn push(&mut self, byte: u8) {
        match self.state {
            ParserState::SeekStart => {
                if byte == MAVLINK_STX {
                    self.candidate.clear();
                    self.candidate.push(byte);
                    self.state = ParserState::ReadHeader;
                }
            }
            ParserState::ReadHeader => {
                self.candidate.push(byte);
                if self.candidate.len() == HEADER_LEN {
                    self.check_header();
                }
            }
            ParserState::ReadPayload => {
                self.candidate.push(byte);
                if self.candidate.len() == HEADER_LEN + self.expected_len {
                    self.state = ParserState::ReadCrc;
                }
            }
            ParserState::ReadCrc => {
                self.candidate.push(byte);
                if self.candidate.len() == HEADER_LEN + self.expected_len + CRC_LEN {
                    self.finish_frame();
                }
            }
        }
    }

    fn check_header(&mut self) {
        let len = self.candidate[1] as usize;
        let message_id = self.candidate[5];
        let Some(kind) = MessageKind::from_id(message_id) else {
            self.stats.unknown_messages += 1;
            self.resync();
            return;
        };
        if len != kind.payload_len() {
            self.stats.malformed_frames += 1;
            self.resync();
            return;
        }
        self.expected_len = len;
        self.state = if len == 0 {
            ParserState::ReadCrc
        } else {
            ParserState::ReadPayload
        };
    }

    fn finish_frame(&mut self) {
        let payload_end = HEADER_LEN + self.expected_len;
        let message_id = self.candidate[5];
        let Some(kind) = MessageKind::from_id(message_id) else {
            self.resync();
            return;
        };

        let received = u16::from_le_bytes([
            self.candidate[payload_end],
            self.candidate[payload_end + 1],
        ]);
        let computed = frame_checksum(&self.candidate[1..payload_end], kind.crc_extra());
        if received != computed {
            self.stats.crc_errors += 1;
            self.resync();
            return;
        }

        self.stats.frames_received += 1;
        self.ready.push_back(Frame {
            sequence: self.candidate[2],
            system_id: self.candidate[3],
            component_id: self.candidate[4],
            message_id,
            payload: self.candidate[HEADER_LEN..payload_end].to_vec(),
        });
        self.reset();
    }

    /// Reject the current candidate and rescan everything after its marker.
    fn resync(&mut self) {
        let replay: Vec<u8> = self.candidate.drain(1..).collect();
        self.reset();
        for byte in replay {
            self.push(byte);
        }
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}
