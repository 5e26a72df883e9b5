//! X.25 checksum used by MAVLink frames.

use crc::{Crc, CRC_16_MCRF4XX};

/// CRC-16/MCRF4XX (X.25 polynomial 0x1021, init 0xFFFF, reflected).
const X25: Crc<u16> = Crc::<u16>::new(&CRC_16_MCRF4XX);

/// Checksum of `data` followed by the message-specific `crc_extra` seed.
///
/// `data` is the frame from the length byte through the end of the payload.
pub fn frame_checksum(data: &[u8], crc_extra: u8) -> u16 {
    let mut digest = X25.digest();
    digest.update(data);
    digest.update(&[crc_extra]);
    digest.finalize()
}
