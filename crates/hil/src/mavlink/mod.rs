//! MAVLink v1 framing for the three HIL messages the bridge speaks.
//!
//! # Wire format
//!
//! ```text
//! [0xFE][len][seq][sys_id][comp_id][msg_id][payload ...][crc_lo][crc_hi]
//! ```
//!
//! The CRC covers `len` through the end of the payload, followed by a
//! per-message CRC-extra byte.

pub mod crc;
pub mod frame;
pub mod messages;

pub use frame::{Frame, FrameEncoder, FrameParser, ParserStats};
pub use messages::{GpsSample, HilControls, MavPayload, MessageKind, SensorSample};

/// MAVLink v1 start-of-frame marker.
pub const MAVLINK_STX: u8 = 0xFE;

/// Header bytes including the start marker.
pub const HEADER_LEN: usize = 6;

/// Trailing checksum bytes.
pub const CRC_LEN: usize = 2;

/// Largest possible frame on the wire.
pub const MAX_FRAME_LEN: usize = HEADER_LEN + 255 + CRC_LEN;
