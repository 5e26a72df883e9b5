//! Telemetry encoding: simulator state to HIL_SENSOR / HIL_GPS payloads.

use std::time::Duration;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::mavlink::{GpsSample, SensorSample};
use crate::types::{ImuReading, KinematicState};

/// Air density at sea level in kg/m³, used for differential pressure.
pub const AIR_DENSITY: f64 = 1.2754;

/// `fields_updated` bitmask announcing that every HIL_SENSOR field is fresh.
pub const FIELDS_UPDATED_ALL: u32 = 4095;

/// 3D fix.
pub const GPS_FIX_TYPE_3D: u8 = 3;

pub const GPS_SATELLITES_VISIBLE: u8 = 10;

/// Reported eph/epv, in cm.
pub const GPS_ACCURACY_CM: u16 = 100;

/// Magnetic field for Zurich from WMM2015, in gauss (north, east, down).
pub const DEFAULT_MAGNETIC_FIELD: [f64; 3] = [0.21523, 0.00771, 0.42741];

/// Anchor for the flat-Earth local-to-geodetic conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoReference {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f64,
    pub earth_radius_m: f64,
}

impl Default for GeoReference {
    fn default() -> Self {
        Self {
            lat_deg: 47.3667,
            lon_deg: 8.5500,
            alt_m: 0.0,
            earth_radius_m: 6_353_000.0,
        }
    }
}

impl GeoReference {
    /// Latitude and longitude in degrees for a local offset in meters.
    ///
    /// Small-area approximation: x maps to latitude, -y to longitude, with
    /// no cos(latitude) correction.
    pub fn local_to_geodetic(&self, position: &Vector3<f64>) -> (f64, f64) {
        let lat = self.lat_deg + (position.x / self.earth_radius_m).to_degrees();
        let lon = self.lon_deg + (-position.y / self.earth_radius_m).to_degrees();
        (lat, lon)
    }
}

/// Build a HIL_SENSOR payload from the current IMU reading.
///
/// The world magnetic field is rotated into the body frame with the inverse
/// of the IMU orientation. Differential pressure comes from the body-frame
/// forward velocity.
pub fn encode_sensor(
    time_usec: u64,
    imu: &ImuReading,
    kinematics: &KinematicState,
    magnetic_field_world: &Vector3<f64>,
) -> SensorSample {
    let mag_body = imu.orientation.inverse_transform_vector(magnetic_field_world);
    let body_velocity = imu
        .orientation
        .inverse_transform_vector(&kinematics.linear_velocity);
    let diff_pressure = 0.5 * AIR_DENSITY * body_velocity.x * body_velocity.x;

    SensorSample {
        time_usec,
        xacc: imu.linear_acceleration.x as f32,
        yacc: imu.linear_acceleration.y as f32,
        zacc: imu.linear_acceleration.z as f32,
        xgyro: imu.angular_velocity.x as f32,
        ygyro: imu.angular_velocity.y as f32,
        zgyro: imu.angular_velocity.z as f32,
        xmag: mag_body.x as f32,
        ymag: mag_body.y as f32,
        zmag: mag_body.z as f32,
        abs_pressure: 0.0,
        diff_pressure: diff_pressure as f32,
        pressure_alt: kinematics.position.z as f32,
        temperature: 0.0,
        fields_updated: FIELDS_UPDATED_ALL,
    }
}

/// Build a HIL_GPS payload from world position and velocity.
///
/// Performs no rate limiting; see [`GpsGate`].
pub fn encode_gps(
    time_usec: u64,
    reference: &GeoReference,
    position: &Vector3<f64>,
    velocity: &Vector3<f64>,
) -> GpsSample {
    let (lat_deg, lon_deg) = reference.local_to_geodetic(position);

    let vn = velocity.x * 100.0;
    let ve = -velocity.y * 100.0;
    let vd = -velocity.z * 100.0;
    let ground_speed = velocity.x.hypot(velocity.y) * 100.0;

    GpsSample {
        time_usec,
        lat: (lat_deg * 1e7).round() as i32,
        lon: (lon_deg * 1e7).round() as i32,
        alt: ((position.z + reference.alt_m) * 1000.0).round() as i32,
        eph: GPS_ACCURACY_CM,
        epv: GPS_ACCURACY_CM,
        vel: ground_speed as u16,
        vn: vn as i16,
        ve: ve as i16,
        vd: vd as i16,
        cog: course_over_ground_cdeg(vn, ve),
        fix_type: GPS_FIX_TYPE_3D,
        satellites_visible: GPS_SATELLITES_VISIBLE,
    }
}

/// Course over ground in centidegrees, normalized to [0, 36000).
fn course_over_ground_cdeg(vn: f64, ve: f64) -> u16 {
    let cdeg = (ve.atan2(vn).to_degrees() * 100.0)
        .round()
        .rem_euclid(36_000.0);
    (cdeg as u32 % 36_000) as u16
}

/// Minimum-interval policy for HIL_GPS emission.
///
/// The first observed time becomes the baseline and does not emit. A GPS
/// payload is due once `now - last_sent >= period`.
#[derive(Debug, Clone)]
pub struct GpsGate {
    period_us: u64,
    last_sent_us: Option<u64>,
}

impl GpsGate {
    pub fn new(period: Duration) -> Self {
        Self {
            period_us: period.as_micros() as u64,
            last_sent_us: None,
        }
    }

    /// Record the current simulation time.
    ///
    /// Sets the baseline on first use and rebases if simulation time moved
    /// backwards (world reset).
    pub fn observe(&mut self, now_us: u64) {
        match self.last_sent_us {
            None => self.last_sent_us = Some(now_us),
            Some(last) if now_us < last => self.last_sent_us = Some(now_us),
            Some(_) => {}
        }
    }

    pub fn is_due(&self, now_us: u64) -> bool {
        match self.last_sent_us {
            Some(last) => now_us.saturating_sub(last) >= self.period_us,
            None => false,
        }
    }

    /// Call only after the GPS payload was actually sent.
    pub fn mark_sent(&mut self, now_us: u64) {
        self.last_sent_us = Some(now_us);
    }

    pub fn period_us(&self) -> u64 {
        self.period_us
    }

    pub fn last_sent_us(&self) -> Option<u64> {
        self.last_sent_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;
    use std::f64::consts::FRAC_PI_2;

    fn mag() -> Vector3<f64> {
        Vector3::from(DEFAULT_MAGNETIC_FIELD)
    }

    #[test]
    fn test_gps_at_reference_point() {
        let gps = encode_gps(
            0,
            &GeoReference::default(),
            &Vector3::new(0.0, 0.0, 10.0),
            &Vector3::zeros(),
        );
        assert!((gps.lat - 473_667_000).abs() <= 1);
        assert!((gps.lon - 85_500_000).abs() <= 1);
        assert_eq!(gps.alt, 10_000);
        assert_eq!(gps.fix_type, 3);
        assert_eq!(gps.satellites_visible, 10);
        assert_eq!(gps.eph, 100);
        assert_eq!(gps.epv, 100);
    }

    #[test]
    fn test_gps_flat_earth_offsets() {
        let reference = GeoReference::default();
        let gps = encode_gps(
            0,
            &reference,
            &Vector3::new(1000.0, 1000.0, 0.0),
            &Vector3::zeros(),
        );
        let delta = (1000.0 / reference.earth_radius_m).to_degrees() * 1e7;
        assert!((gps.lat as f64 - (473_667_000.0 + delta)).abs() <= 1.0);
        // Positive y moves west.
        assert!((gps.lon as f64 - (85_500_000.0 - delta)).abs() <= 1.0);
    }

    #[test]
    fn test_gps_reference_altitude_is_added() {
        let reference = GeoReference {
            alt_m: 488.0,
            ..Default::default()
        };
        let gps = encode_gps(0, &reference, &Vector3::new(0.0, 0.0, 2.0), &Vector3::zeros());
        assert_eq!(gps.alt, 490_000);
    }

    #[test]
    fn test_gps_velocity_fields() {
        let gps = encode_gps(
            0,
            &GeoReference::default(),
            &Vector3::zeros(),
            &Vector3::new(3.0, -4.0, 1.5),
        );
        assert_eq!(gps.vn, 300);
        assert_eq!(gps.ve, 400);
        assert_eq!(gps.vd, -150);
        assert_eq!(gps.vel, 500);
        // atan2(400, 300) = 53.13 degrees
        assert!((gps.cog as i32 - 5313).abs() <= 1);
    }

    #[test]
    fn test_course_is_normalized() {
        // Heading west: ve < 0, vn = 0 -> 270 degrees.
        let gps = encode_gps(
            0,
            &GeoReference::default(),
            &Vector3::zeros(),
            &Vector3::new(0.0, 2.0, 0.0),
        );
        assert_eq!(gps.cog, 27_000);

        assert_eq!(course_over_ground_cdeg(1.0, -1e-12), 0);
        assert!(course_over_ground_cdeg(-1.0, -1e-9) < 36_000);
    }

    #[test]
    fn test_sensor_identity_orientation() {
        let imu = ImuReading {
            orientation: UnitQuaternion::identity(),
            linear_acceleration: Vector3::new(0.1, 0.2, 9.81),
            angular_velocity: Vector3::new(0.01, 0.02, 0.03),
        };
        let kinematics = KinematicState {
            position: Vector3::new(0.0, 0.0, 12.5),
            linear_velocity: Vector3::new(10.0, 0.0, 0.0),
        };
        let sample = encode_sensor(5_000, &imu, &kinematics, &mag());

        assert_eq!(sample.time_usec, 5_000);
        assert!((sample.zacc - 9.81).abs() < 1e-6);
        assert!((sample.ygyro - 0.02).abs() < 1e-6);
        assert!((sample.xmag - 0.21523).abs() < 1e-6);
        assert!((sample.zmag - 0.42741).abs() < 1e-6);
        // 0.5 * 1.2754 * 10^2
        assert!((sample.diff_pressure - 63.77).abs() < 1e-4);
        assert!((sample.pressure_alt - 12.5).abs() < 1e-6);
        assert_eq!(sample.abs_pressure, 0.0);
        assert_eq!(sample.temperature, 0.0);
        assert_eq!(sample.fields_updated, FIELDS_UPDATED_ALL);
    }

    #[test]
    fn test_sensor_rotates_into_body_frame() {
        // Yawed 90 degrees: world x appears along body -y.
        let imu = ImuReading {
            orientation: UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2),
            ..Default::default()
        };
        let kinematics = KinematicState {
            linear_velocity: Vector3::new(0.0, 4.0, 0.0),
            ..Default::default()
        };
        let sample = encode_sensor(0, &imu, &kinematics, &Vector3::new(1.0, 0.0, 0.0));
        assert!(sample.xmag.abs() < 1e-6);
        assert!((sample.ymag + 1.0).abs() < 1e-6);
        // World +y velocity is body forward after a 90 degree yaw.
        assert!((sample.diff_pressure - (0.5 * 1.2754 * 16.0) as f32).abs() < 1e-4);
    }

    #[test]
    fn test_gps_gate_baseline_then_period() {
        let period = Duration::from_millis(200);
        let p = period.as_micros() as u64;
        let t0 = 1_000_000;
        let mut gate = GpsGate::new(period);

        let mut emitted = Vec::new();
        for now in [t0, t0 + p / 2, t0 + p] {
            gate.observe(now);
            if gate.is_due(now) {
                gate.mark_sent(now);
                emitted.push(now);
            }
        }
        assert_eq!(emitted, vec![t0 + p]);
    }

    #[test]
    fn test_gps_gate_waits_until_marked() {
        let mut gate = GpsGate::new(Duration::from_millis(200));
        gate.observe(0);
        assert!(gate.is_due(200_000));
        // Not marked (send failed): still due on the next step.
        assert!(gate.is_due(204_000));
        gate.mark_sent(204_000);
        assert!(!gate.is_due(300_000));
        assert!(gate.is_due(404_000));
    }

    #[test]
    fn test_gps_gate_rebases_on_time_reset() {
        let mut gate = GpsGate::new(Duration::from_millis(200));
        gate.observe(5_000_000);
        gate.observe(1_000);
        assert_eq!(gate.last_sent_us(), Some(1_000));
        assert!(gate.is_due(201_000));
    }
}
