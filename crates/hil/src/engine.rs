use nalgebra::{UnitQuaternion, Vector3};

use crate::types::{ActuatorCommand, ImuReading, KinematicState};

/// The physics simulator as seen by the bridge.
///
/// Implementations wrap whatever engine drives the world; the bridge only
/// reads model state and writes rotor speed commands.
pub trait SimulationEngine {
    /// Current simulation time in microseconds.
    fn sim_time_us(&self) -> u64;

    /// Model position in the world frame, meters, z up.
    fn world_position(&self) -> Vector3<f64>;

    /// Model linear velocity in the world frame, m/s.
    fn world_linear_velocity(&self) -> Vector3<f64>;

    /// Model attitude, body to world.
    fn orientation(&self) -> UnitQuaternion<f64>;

    /// World gravity vector, m/s².
    fn gravity(&self) -> Vector3<f64>;

    /// Latest IMU reading, if the IMU has produced one.
    fn imu_reading(&self) -> Option<ImuReading>;

    /// Command rotor speeds. Called every step once the bridge is armed.
    fn apply_motor_speeds(&mut self, command: &ActuatorCommand);

    /// IMU reading to report, falling back to a noiseless at-rest sample
    /// built from orientation and gravity when the IMU has none yet.
    fn imu_or_static(&self) -> ImuReading {
        self.imu_reading().unwrap_or_else(|| {
            let orientation = self.orientation();
            ImuReading {
                orientation,
                linear_acceleration: orientation.inverse_transform_vector(&-self.gravity()),
                angular_velocity: Vector3::zeros(),
            }
        })
    }

    fn kinematics(&self) -> KinematicState {
        KinematicState {
            position: self.world_position(),
            linear_velocity: self.world_linear_velocity(),
        }
    }
}
