//! Bridge configuration.

use std::fs;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;

use log::warn;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::control::{
    ActuatorTransform, DEFAULT_CONTROL_OFFSET, DEFAULT_CONTROL_SCALE, DEFAULT_ROTOR_COUNT,
};
use crate::error::ConfigError;
use crate::telemetry::{GeoReference, DEFAULT_MAGNETIC_FIELD};
use crate::transport::udp::DEFAULT_UDP_PORT;
use crate::types::CONTROL_CHANNELS;

/// Port the JSON datagram bus listens on by default.
pub const DEFAULT_BUS_PORT: u16 = 14561;

pub const DEFAULT_GPS_INTERVAL_MS: u64 = 200;

/// MAVLink-over-UDP endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpConfig {
    pub bind_addr: SocketAddr,
    /// Static peer. When unset, the first datagram's source is used.
    pub remote_addr: Option<SocketAddr>,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_UDP_PORT)),
            remote_addr: None,
        }
    }
}

/// JSON datagram bus endpoint, used when `use_mavlink_udp` is off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub bind_addr: SocketAddr,
    pub remote_addr: Option<SocketAddr>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_BUS_PORT)),
            remote_addr: None,
        }
    }
}

/// Everything the bridge needs to know at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Prefix for every topic name. Empty means no prefix.
    pub namespace: String,
    pub motor_speed_topic: String,
    pub hil_control_topic: String,
    pub imu_topic: String,
    pub hil_sensor_topic: String,
    pub hil_gps_topic: String,
    /// MAVLink frames over UDP when true, structured bus messages otherwise.
    pub use_mavlink_udp: bool,
    pub udp: UdpConfig,
    pub bus: BusConfig,
    pub rotor_count: usize,
    pub gps_interval_ms: u64,
    pub control_scale: f64,
    pub control_offset: f64,
    pub reference: GeoReference,
    /// World magnetic field in gauss (north, east, down).
    pub magnetic_field_world: [f64; 3],
    pub system_id: u8,
    pub component_id: u8,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            motor_speed_topic: "gazebo/command/motor_speed".to_string(),
            hil_control_topic: "hil_controls".to_string(),
            imu_topic: "imu".to_string(),
            hil_sensor_topic: "hil_sensor".to_string(),
            hil_gps_topic: "hil_gps".to_string(),
            use_mavlink_udp: true,
            udp: UdpConfig::default(),
            bus: BusConfig::default(),
            rotor_count: DEFAULT_ROTOR_COUNT,
            gps_interval_ms: DEFAULT_GPS_INTERVAL_MS,
            control_scale: DEFAULT_CONTROL_SCALE,
            control_offset: DEFAULT_CONTROL_OFFSET,
            reference: GeoReference::default(),
            magnetic_field_world: DEFAULT_MAGNETIC_FIELD,
            system_id: 0,
            component_id: 0,
        }
    }
}

impl BridgeConfig {
    /// Load and validate a JSON configuration file. Missing keys take their
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rotor_count == 0 {
            return Err(ConfigError::Invalid("rotor_count must be at least 1".into()));
        }
        if self.gps_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "gps_interval_ms must be at least 1".into(),
            ));
        }
        if self.rotor_count > CONTROL_CHANNELS {
            warn!(
                "rotor_count {} exceeds the {CONTROL_CHANNELS} decoded control channels",
                self.rotor_count
            );
        }
        Ok(())
    }

    /// `"/{namespace}/{topic}"`, or `"/{topic}"` without a namespace.
    pub fn resolve_topic(&self, topic: &str) -> String {
        let topic = topic.trim_start_matches('/');
        let namespace = self.namespace.trim_matches('/');
        if namespace.is_empty() {
            format!("/{topic}")
        } else {
            format!("/{namespace}/{topic}")
        }
    }

    pub fn gps_interval(&self) -> Duration {
        Duration::from_millis(self.gps_interval_ms)
    }

    pub fn magnetic_field(&self) -> Vector3<f64> {
        Vector3::from(self.magnetic_field_world)
    }

    pub fn actuator_transform(&self) -> ActuatorTransform {
        ActuatorTransform::new(self.rotor_count, self.control_scale, self.control_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert!(config.use_mavlink_udp);
        assert_eq!(config.rotor_count, 4);
        assert_eq!(config.gps_interval(), Duration::from_millis(200));
        assert_eq!(config.udp.bind_addr.port(), 14560);
        assert_eq!(config.udp.remote_addr, None);
        assert_eq!(config.bus.bind_addr.port(), 14561);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_topic() {
        let mut config = BridgeConfig::default();
        assert_eq!(config.resolve_topic("hil_gps"), "/hil_gps");
        config.namespace = "iris".into();
        assert_eq!(
            config.resolve_topic(&config.motor_speed_topic),
            "/iris/gazebo/command/motor_speed"
        );
        config.namespace = "/iris/".into();
        assert_eq!(config.resolve_topic("/imu"), "/iris/imu");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = BridgeConfig::from_json_str(
            r#"{
                "namespace": "quad",
                "rotor_count": 6,
                "udp": { "remote_addr": "127.0.0.1:14570" },
                "reference": { "lat_deg": 10.0 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.namespace, "quad");
        assert_eq!(config.rotor_count, 6);
        assert_eq!(config.udp.bind_addr.port(), 14560);
        assert_eq!(
            config.udp.remote_addr,
            Some("127.0.0.1:14570".parse().unwrap())
        );
        assert_eq!(config.reference.lat_deg, 10.0);
        assert_eq!(config.reference.lon_deg, 8.55);
        assert_eq!(config.gps_interval_ms, 200);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            BridgeConfig::from_json_str(r#"{"rotor_count": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            BridgeConfig::from_json_str(r#"{"gps_interval_ms": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            BridgeConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_too_many_rotors_is_accepted() {
        let config = BridgeConfig {
            rotor_count: 12,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.actuator_transform().rotor_count, 12);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            BridgeConfig::load("/nonexistent/hil_bridge.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
