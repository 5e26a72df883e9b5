use nalgebra::{UnitQuaternion, Vector3};

/// Number of control channels carried by `HIL_CONTROLS`.
pub const CONTROL_CHANNELS: usize = 8;

/// Logical control channel, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlChannel {
    Roll = 0,
    Pitch = 1,
    Yaw = 2,
    Throttle = 3,
    Aux1 = 4,
    Aux2 = 5,
    Aux3 = 6,
    Aux4 = 7,
}

/// IMU reading in the body frame, as produced by the simulator's IMU sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuReading {
    /// Body-to-world orientation.
    pub orientation: UnitQuaternion<f64>,
    /// Specific force in m/s².
    pub linear_acceleration: Vector3<f64>,
    /// Angular rate in rad/s.
    pub angular_velocity: Vector3<f64>,
}

impl Default for ImuReading {
    fn default() -> Self {
        Self {
            orientation: UnitQuaternion::identity(),
            linear_acceleration: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }
}

/// World-frame position and linear velocity of the simulated model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicState {
    /// Position in meters (z up).
    pub position: Vector3<f64>,
    /// Linear velocity in m/s.
    pub linear_velocity: Vector3<f64>,
}

impl Default for KinematicState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            linear_velocity: Vector3::zeros(),
        }
    }
}

/// Normalized control inputs decoded from the autopilot.
///
/// Values are passed through exactly as received; nothing is clamped.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawControlInputs {
    pub channels: [f64; CONTROL_CHANNELS],
}

impl RawControlInputs {
    pub fn new(channels: [f64; CONTROL_CHANNELS]) -> Self {
        Self { channels }
    }

    pub fn get(&self, channel: ControlChannel) -> f64 {
        self.channels[channel as usize]
    }

    pub fn roll(&self) -> f64 {
        self.get(ControlChannel::Roll)
    }

    pub fn pitch(&self) -> f64 {
        self.get(ControlChannel::Pitch)
    }

    pub fn yaw(&self) -> f64 {
        self.get(ControlChannel::Yaw)
    }

    pub fn throttle(&self) -> f64 {
        self.get(ControlChannel::Throttle)
    }
}

/// Per-rotor speed commands handed to the simulator once armed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActuatorCommand {
    speeds: Vec<f64>,
}

impl ActuatorCommand {
    pub fn new(speeds: Vec<f64>) -> Self {
        Self { speeds }
    }

    pub fn speeds(&self) -> &[f64] {
        &self.speeds
    }

    pub fn rotor_count(&self) -> usize {
        self.speeds.len()
    }
}
