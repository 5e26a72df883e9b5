//! Closes the HIL loop in-process: a scripted "autopilot" publishes
//! HilControl messages on an in-memory bus and reads back the sensor and
//! GPS messages the bridge produces.
//!
//!   cargo run -p gazebo_hil_bridge --example bus_loopback

use gazebo_hil_bridge::transport::bus::{BusMessage, HilControl};
use gazebo_hil_bridge::transport::{InMemoryBus, MessageBus, Topics};
use gazebo_hil_bridge::{
    BridgeConfig, HilBridge, LightweightConfig, LightweightEngine, SimulationEngine,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = BridgeConfig {
        use_mavlink_udp: false,
        namespace: "demo".into(),
        ..Default::default()
    };
    let topics = Topics::from_config(&config);
    let mut autopilot = InMemoryBus::new();
    let mut bridge = HilBridge::with_bus(&config, autopilot.clone());
    let mut engine = LightweightEngine::new(LightweightConfig {
        seed: Some(1),
        ..Default::default()
    });

    let mut sensor_count = 0;
    let mut gps_count = 0;
    for step in 0..1_000u32 {
        // Every rotor channel at full scale for the first second, then idle.
        let level = if step < 250 { 1.0 } else { 0.0 };
        let controls = HilControl {
            roll_ailerons: level,
            pitch_elevator: level,
            yaw_rudder: level,
            throttle: level,
            ..Default::default()
        };
        if let Err(e) = autopilot.publish(&topics.hil_control, BusMessage::HilControl(controls)) {
            eprintln!("publish failed: {e}");
            return;
        }

        bridge.step(&mut engine);
        engine.step();

        sensor_count += autopilot.take(&topics.hil_sensor).len();
        for message in autopilot.take(&topics.hil_gps) {
            if let BusMessage::HilGps(gps) = message {
                gps_count += 1;
                println!(
                    "t={:>5} ms  lat={} lon={} alt={} mm vd={} cm/s",
                    gps.time_usec / 1000,
                    gps.lat,
                    gps.lon,
                    gps.alt,
                    gps.vd
                );
            }
        }
        autopilot.take(&topics.motor_speed);
    }

    println!(
        "{sensor_count} HIL_SENSOR and {gps_count} HIL_GPS messages, final altitude {:.2} m",
        engine.world_position().z
    );
}
