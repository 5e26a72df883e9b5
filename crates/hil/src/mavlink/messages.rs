//! Payload layouts for HIL_CONTROLS, HIL_SENSOR and HIL_GPS.
//!
//! Fields are little-endian and ordered by MAVLink v1 rules (largest type
//! first), matching what an unmodified autopilot expects.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// The message kinds this bridge can frame and verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    HilControls,
    HilSensor,
    HilGps,
}

impl MessageKind {
    pub const ALL: [MessageKind; 3] = [Self::HilControls, Self::HilSensor, Self::HilGps];

    pub const fn id(self) -> u8 {
        match self {
            Self::HilControls => 91,
            Self::HilSensor => 107,
            Self::HilGps => 113,
        }
    }

    /// Fixed payload length in bytes.
    pub const fn payload_len(self) -> usize {
        match self {
            Self::HilControls => 42,
            Self::HilSensor => 64,
            Self::HilGps => 36,
        }
    }

    /// Seed byte appended to the checksum, derived from the message definition.
    pub const fn crc_extra(self) -> u8 {
        match self {
            Self::HilControls => 63,
            Self::HilSensor => 108,
            Self::HilGps => 124,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::HilControls => "HIL_CONTROLS",
            Self::HilSensor => "HIL_SENSOR",
            Self::HilGps => "HIL_GPS",
        }
    }
}

/// A typed payload with a fixed wire layout.
pub trait MavPayload: Sized {
    const KIND: MessageKind;

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()>;

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self>;

    fn to_payload(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::with_capacity(Self::KIND.payload_len());
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    fn from_payload(payload: &[u8]) -> Result<Self, CodecError> {
        let expected = Self::KIND.payload_len();
        if payload.len() != expected {
            return Err(CodecError::PayloadLength {
                msg_id: Self::KIND.id(),
                expected,
                actual: payload.len(),
            });
        }
        let mut reader = payload;
        Ok(Self::read_from(&mut reader)?)
    }
}

/// HIL_CONTROLS (id 91): actuator outputs from the autopilot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HilControls {
    pub time_usec: u64,
    pub roll_ailerons: f32,
    pub pitch_elevator: f32,
    pub yaw_rudder: f32,
    pub throttle: f32,
    pub aux1: f32,
    pub aux2: f32,
    pub aux3: f32,
    pub aux4: f32,
    pub mode: u8,
    pub nav_mode: u8,
}

impl MavPayload for HilControls {
    const KIND: MessageKind = MessageKind::HilControls;

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.time_usec)?;
        for value in [
            self.roll_ailerons,
            self.pitch_elevator,
            self.yaw_rudder,
            self.throttle,
            self.aux1,
            self.aux2,
            self.aux3,
            self.aux4,
        ] {
            w.write_f32::<LittleEndian>(value)?;
        }
        w.write_u8(self.mode)?;
        w.write_u8(self.nav_mode)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            time_usec: r.read_u64::<LittleEndian>()?,
            roll_ailerons: r.read_f32::<LittleEndian>()?,
            pitch_elevator: r.read_f32::<LittleEndian>()?,
            yaw_rudder: r.read_f32::<LittleEndian>()?,
            throttle: r.read_f32::<LittleEndian>()?,
            aux1: r.read_f32::<LittleEndian>()?,
            aux2: r.read_f32::<LittleEndian>()?,
            aux3: r.read_f32::<LittleEndian>()?,
            aux4: r.read_f32::<LittleEndian>()?,
            mode: r.read_u8()?,
            nav_mode: r.read_u8()?,
        })
    }
}

/// HIL_SENSOR (id 107): IMU, magnetometer and pressure readings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorSample {
    pub time_usec: u64,
    pub xacc: f32,
    pub yacc: f32,
    pub zacc: f32,
    pub xgyro: f32,
    pub ygyro: f32,
    pub zgyro: f32,
    pub xmag: f32,
    pub ymag: f32,
    pub zmag: f32,
    pub abs_pressure: f32,
    pub diff_pressure: f32,
    pub pressure_alt: f32,
    pub temperature: f32,
    pub fields_updated: u32,
}

impl MavPayload for SensorSample {
    const KIND: MessageKind = MessageKind::HilSensor;

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.time_usec)?;
        for value in [
            self.xacc,
            self.yacc,
            self.zacc,
            self.xgyro,
            self.ygyro,
            self.zgyro,
            self.xmag,
            self.ymag,
            self.zmag,
            self.abs_pressure,
            self.diff_pressure,
            self.pressure_alt,
            self.temperature,
        ] {
            w.write_f32::<LittleEndian>(value)?;
        }
        w.write_u32::<LittleEndian>(self.fields_updated)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            time_usec: r.read_u64::<LittleEndian>()?,
            xacc: r.read_f32::<LittleEndian>()?,
            yacc: r.read_f32::<LittleEndian>()?,
            zacc: r.read_f32::<LittleEndian>()?,
            xgyro: r.read_f32::<LittleEndian>()?,
            ygyro: r.read_f32::<LittleEndian>()?,
            zgyro: r.read_f32::<LittleEndian>()?,
            xmag: r.read_f32::<LittleEndian>()?,
            ymag: r.read_f32::<LittleEndian>()?,
            zmag: r.read_f32::<LittleEndian>()?,
            abs_pressure: r.read_f32::<LittleEndian>()?,
            diff_pressure: r.read_f32::<LittleEndian>()?,
            pressure_alt: r.read_f32::<LittleEndian>()?,
            temperature: r.read_f32::<LittleEndian>()?,
            fields_updated: r.read_u32::<LittleEndian>()?,
        })
    }
}

/// HIL_GPS (id 113): position fix and velocity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GpsSample {
    pub time_usec: u64,
    /// Latitude in degrees * 1E7.
    pub lat: i32,
    /// Longitude in degrees * 1E7.
    pub lon: i32,
    /// Altitude in millimeters, positive up.
    pub alt: i32,
    /// Horizontal dilution of position * 100.
    pub eph: u16,
    /// Vertical dilution of position * 100.
    pub epv: u16,
    /// Ground speed in cm/s.
    pub vel: u16,
    /// North velocity in cm/s.
    pub vn: i16,
    /// East velocity in cm/s.
    pub ve: i16,
    /// Down velocity in cm/s.
    pub vd: i16,
    /// Course over ground in centidegrees, [0, 36000).
    pub cog: u16,
    pub fix_type: u8,
    pub satellites_visible: u8,
}

impl MavPayload for GpsSample {
    const KIND: MessageKind = MessageKind::HilGps;

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.time_usec)?;
        w.write_i32::<LittleEndian>(self.lat)?;
        w.write_i32::<LittleEndian>(self.lon)?;
        w.write_i32::<LittleEndian>(self.alt)?;
        w.write_u16::<LittleEndian>(self.eph)?;
        w.write_u16::<LittleEndian>(self.epv)?;
        w.write_u16::<LittleEndian>(self.vel)?;
        w.write_i16::<LittleEndian>(self.vn)?;
        w.write_i16::<LittleEndian>(self.ve)?;
        w.write_i16::<LittleEndian>(self.vd)?;
        w.write_u16::<LittleEndian>(self.cog)?;
        w.write_u8(self.fix_type)?;
        w.write_u8(self.satellites_visible)
    }

    fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            time_usec: r.read_u64::<LittleEndian>()?,
            lat: r.read_i32::<LittleEndian>()?,
            lon: r.read_i32::<LittleEndian>()?,
            alt: r.read_i32::<LittleEndian>()?,
            eph: r.read_u16::<LittleEndian>()?,
            epv: r.read_u16::<LittleEndian>()?,
            vel: r.read_u16::<LittleEndian>()?,
            vn: r.read_i16::<LittleEndian>()?,
            ve: r.read_i16::<LittleEndian>()?,
            vd: r.read_i16::<LittleEndian>()?,
            cog: r.read_u16::<LittleEndian>()?,
            fix_type: r.read_u8()?,
            satellites_visible: r.read_u8()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_controls() -> HilControls {
        HilControls {
            time_usec: 1_234_567,
            roll_ailerons: 0.1,
            pitch_elevator: -0.2,
            yaw_rudder: 0.3,
            throttle: 0.5,
            aux1: 1.0,
            aux2: -1.0,
            aux3: 0.0,
            aux4: 0.25,
            mode: 4,
            nav_mode: 2,
        }
    }

    #[test]
    fn test_kind_lookup() {
        assert_eq!(MessageKind::from_id(91), Some(MessageKind::HilControls));
        assert_eq!(MessageKind::from_id(107), Some(MessageKind::HilSensor));
        assert_eq!(MessageKind::from_id(113), Some(MessageKind::HilGps));
        assert_eq!(MessageKind::from_id(0), None);
    }

    #[test]
    fn test_table_matches_mavlink_definitions() {
        use mavlink::common::{MavMessage, HIL_CONTROLS_DATA};
        use mavlink::Message;

        for kind in MessageKind::ALL {
            let id = MavMessage::message_id_from_name(kind.name()).unwrap();
            assert_eq!(id, kind.id() as u32, "{}", kind.name());
            assert_eq!(
                MavMessage::extra_crc(id),
                kind.crc_extra(),
                "{}",
                kind.name()
            );
        }
        // HIL_SENSOR and HIL_GPS carry MAVLink 2 extension fields past the
        // v1 payload, so only HIL_CONTROLS has a directly comparable length.
        assert_eq!(
            HIL_CONTROLS_DATA::ENCODED_LEN,
            MessageKind::HilControls.payload_len()
        );
    }

    #[test]
    fn test_serialized_lengths_match_table() {
        assert_eq!(sample_controls().to_payload().unwrap().len(), 42);
        assert_eq!(SensorSample::default().to_payload().unwrap().len(), 64);
        assert_eq!(GpsSample::default().to_payload().unwrap().len(), 36);
    }

    #[test]
    fn test_controls_layout() {
        let bytes = sample_controls().to_payload().unwrap();
        assert_eq!(&bytes[0..8], &1_234_567u64.to_le_bytes());
        assert_eq!(&bytes[8..12], &0.1f32.to_le_bytes());
        assert_eq!(&bytes[20..24], &0.5f32.to_le_bytes());
        assert_eq!(bytes[40], 4);
        assert_eq!(bytes[41], 2);
    }

    #[test]
    fn test_gps_layout() {
        let gps = GpsSample {
            time_usec: 7,
            lat: -1,
            cog: 0xABCD,
            fix_type: 3,
            satellites_visible: 10,
            ..Default::default()
        };
        let bytes = gps.to_payload().unwrap();
        assert_eq!(&bytes[8..12], &(-1i32).to_le_bytes());
        assert_eq!(&bytes[32..34], &[0xCD, 0xAB]);
        assert_eq!(bytes[34], 3);
        assert_eq!(bytes[35], 10);
    }

    #[test]
    fn test_controls_roundtrip() {
        let controls = sample_controls();
        let bytes = controls.to_payload().unwrap();
        assert_eq!(HilControls::from_payload(&bytes).unwrap(), controls);
    }

    #[test]
    fn test_from_payload_rejects_wrong_length() {
        let result = SensorSample::from_payload(&[0u8; 10]);
        match result {
            Err(CodecError::PayloadLength {
                msg_id,
                expected,
                actual,
            }) => {
                assert_eq!(msg_id, 107);
                assert_eq!(expected, 64);
                assert_eq!(actual, 10);
            }
            other => panic!("Expected PayloadLength, got: {other:?}"),
        }
    }
}
