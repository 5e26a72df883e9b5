//! Wire compatibility with the `mavlink` crate's MAVLink v1 codec.

use std::io::Cursor;

use gazebo_hil_bridge::mavlink::{FrameEncoder, FrameParser, MessageKind};
use gazebo_hil_bridge::{control, GpsSample, HilControls, SensorSample};
use mavlink::common::{MavMessage, MavMode, HIL_CONTROLS_DATA};
use mavlink::peek_reader::PeekReader;
use mavlink::MavHeader;

fn read_v1(bytes: &[u8]) -> (MavHeader, MavMessage) {
    let mut reader = PeekReader::new(Cursor::new(bytes));
    mavlink::read_v1_msg::<MavMessage, _>(&mut reader).unwrap()
}

#[test]
fn mavlink_crate_reads_hil_sensor() {
    let sample = SensorSample {
        time_usec: 123_456_789,
        xacc: 0.5,
        yacc: -0.25,
        zacc: 9.81,
        zgyro: 0.1,
        xmag: 0.21523,
        diff_pressure: 1.5,
        pressure_alt: 12.0,
        fields_updated: 4095,
        ..Default::default()
    };
    let mut encoder = FrameEncoder::new(7);
    encoder.encode_message(&SensorSample::default(), 200).unwrap();
    let bytes = encoder.encode_message(&sample, 200).unwrap();

    let (header, message) = read_v1(&bytes);
    assert_eq!(header.system_id, 7);
    assert_eq!(header.component_id, 200);
    assert_eq!(header.sequence, 1);
    match message {
        MavMessage::HIL_SENSOR(data) => {
            assert_eq!(data.time_usec, 123_456_789);
            assert_eq!(data.xacc, 0.5);
            assert_eq!(data.yacc, -0.25);
            assert_eq!(data.zacc, 9.81);
            assert_eq!(data.zgyro, 0.1);
            assert_eq!(data.xmag, 0.21523);
            assert_eq!(data.diff_pressure, 1.5);
            assert_eq!(data.pressure_alt, 12.0);
        }
        other => panic!("Expected HIL_SENSOR, got: {other:?}"),
    }
}

#[test]
fn mavlink_crate_reads_hil_gps() {
    let sample = GpsSample {
        time_usec: 5_000_000,
        lat: 473_667_000,
        lon: 85_500_000,
        alt: 10_000,
        eph: 100,
        epv: 100,
        vel: 250,
        vn: 150,
        ve: -200,
        vd: 10,
        cog: 30_687,
        fix_type: 3,
        satellites_visible: 10,
    };
    let mut encoder = FrameEncoder::new(1);
    let bytes = encoder.encode_message(&sample, 1).unwrap();

    let (_, message) = read_v1(&bytes);
    match message {
        MavMessage::HIL_GPS(data) => {
            assert_eq!(data.time_usec, 5_000_000);
            assert_eq!(data.lat, 473_667_000);
            assert_eq!(data.lon, 85_500_000);
            assert_eq!(data.alt, 10_000);
            assert_eq!(data.vel, 250);
            assert_eq!(data.vn, 150);
            assert_eq!(data.ve, -200);
            assert_eq!(data.vd, 10);
            assert_eq!(data.cog, 30_687);
            assert_eq!(data.satellites_visible, 10);
        }
        other => panic!("Expected HIL_GPS, got: {other:?}"),
    }
}

#[test]
fn parser_reads_mavlink_crate_hil_controls() {
    let header = MavHeader {
        system_id: 1,
        component_id: 1,
        sequence: 42,
    };
    let message = MavMessage::HIL_CONTROLS(HIL_CONTROLS_DATA {
        time_usec: 1_000,
        roll_ailerons: 0.1,
        pitch_elevator: 0.0,
        yaw_rudder: 0.0,
        throttle: 0.5,
        aux1: 0.0,
        aux2: 0.0,
        aux3: 0.0,
        aux4: 0.0,
        mode: MavMode::MAV_MODE_GUIDED_ARMED,
        nav_mode: 1,
    });
    let mut bytes = Vec::new();
    mavlink::write_v1_msg(&mut bytes, header, &message).unwrap();

    // Leading noise must not hide the frame.
    let mut stream = vec![0x00, 0xFE, 0x13];
    stream.extend_from_slice(&bytes);

    let mut parser = FrameParser::new();
    let frames = parser.feed(&stream);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].sequence, 42);
    assert_eq!(frames[0].kind(), Some(MessageKind::HilControls));

    let controls: HilControls = frames[0].decode().unwrap();
    assert_eq!(controls.time_usec, 1_000);
    assert_eq!(controls.nav_mode, 1);

    let command = control::to_actuator_command(&control::decode(&controls), 4, 150.0, 600.0);
    let expected = [615.0, 600.0, 600.0, 675.0];
    for (speed, want) in command.speeds().iter().zip(expected) {
        assert!((speed - want).abs() < 1e-3);
    }
}
