//! Lightweight multirotor point-mass simulator.
//!
//! No attitude dynamics: the body keeps its initial attitude and rotor
//! thrust always acts along body z. Good enough to close the HIL loop in CI
//! without an external physics engine.

use nalgebra::{UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::SimulationEngine;
use crate::types::{ActuatorCommand, ImuReading};

/// Configuration for the lightweight simulator.
#[derive(Debug, Clone)]
pub struct LightweightConfig {
    /// Vehicle mass in kg.
    pub mass_kg: f64,
    /// Thrust per rotor is `motor_constant * speed²` (N per (rad/s)²).
    pub motor_constant: f64,
    /// Linear drag coefficient in N·s/m.
    pub drag_coefficient: f64,
    /// World gravity vector, m/s², z up.
    pub gravity: Vector3<f64>,
    /// Heading of the body about world z, radians.
    pub initial_yaw_rad: f64,
    /// Accelerometer noise standard deviation in m/s².
    pub accel_noise_mss: f64,
    /// Gyroscope noise standard deviation in rad/s.
    pub gyro_noise_rads: f64,
    /// RNG seed for deterministic mode. None = random.
    pub seed: Option<u64>,
    /// Simulation step size in microseconds.
    pub step_size_us: u64,
}

impl Default for LightweightConfig {
    fn default() -> Self {
        Self {
            mass_kg: 1.5,
            motor_constant: 8.54858e-6,
            drag_coefficient: 0.1,
            gravity: Vector3::new(0.0, 0.0, -9.81),
            initial_yaw_rad: 0.0,
            accel_noise_mss: 0.05,
            gyro_noise_rads: 0.005,
            seed: None,
            step_size_us: 4_000, // 250 Hz
        }
    }
}

/// Point-mass multirotor with noisy IMU synthesis.
pub struct LightweightEngine {
    config: LightweightConfig,
    orientation: UnitQuaternion<f64>,
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    motor_speeds: Vec<f64>,
    imu: Option<ImuReading>,
    rng: StdRng,
    sim_time_us: u64,
    step_count: u64,
}

impl LightweightEngine {
    pub fn new(config: LightweightConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let orientation = UnitQuaternion::from_euler_angles(0.0, 0.0, config.initial_yaw_rad);
        Self {
            config,
            orientation,
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            motor_speeds: Vec::new(),
            imu: None,
            rng,
            sim_time_us: 0,
            step_count: 0,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(LightweightConfig::default())
    }

    /// Advance the simulation by one step.
    pub fn step(&mut self) {
        let dt = self.config.step_size_us as f64 / 1_000_000.0;
        let acceleration = self.integrate(dt);
        self.imu = Some(self.synthesize_imu(&acceleration));
        self.sim_time_us += self.config.step_size_us;
        self.step_count += 1;
    }

    /// Back to rest at the origin, time zero.
    pub fn reset(&mut self) {
        self.position = Vector3::zeros();
        self.velocity = Vector3::zeros();
        self.motor_speeds.clear();
        self.imu = None;
        self.sim_time_us = 0;
        self.step_count = 0;
    }

    /// Total rotor thrust in newtons.
    pub fn thrust(&self) -> f64 {
        self.motor_speeds
            .iter()
            .map(|speed| self.config.motor_constant * speed * speed)
            .sum()
    }

    pub fn motor_speeds(&self) -> &[f64] {
        &self.motor_speeds
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn config(&self) -> &LightweightConfig {
        &self.config
    }

    /// Semi-implicit Euler step. Returns the world acceleration actually
    /// applied, after ground contact.
    fn integrate(&mut self, dt: f64) -> Vector3<f64> {
        let thrust_world = self.orientation * Vector3::new(0.0, 0.0, self.thrust());
        let drag = -self.config.drag_coefficient * self.velocity;
        let mut acceleration = (thrust_world + drag) / self.config.mass_kg + self.config.gravity;

        let on_ground = self.position.z <= 0.0;
        if on_ground && acceleration.z < 0.0 {
            // Ground reaction cancels the downward push.
            acceleration.z = 0.0;
            if self.velocity.z < 0.0 {
                self.velocity.z = 0.0;
            }
        }

        self.velocity += acceleration * dt;
        self.position += self.velocity * dt;

        if self.position.z < 0.0 {
            self.position.z = 0.0;
            self.velocity.z = self.velocity.z.max(0.0);
        }
        acceleration
    }

    /// Specific force and rates in the body frame, with noise.
    fn synthesize_imu(&mut self, acceleration: &Vector3<f64>) -> ImuReading {
        let specific_force = self
            .orientation
            .inverse_transform_vector(&(acceleration - self.config.gravity));

        let accel_noise = self.config.accel_noise_mss;
        let gyro_noise = self.config.gyro_noise_rads;
        let linear_acceleration = specific_force
            + Vector3::new(
                self.gaussian_noise(accel_noise),
                self.gaussian_noise(accel_noise),
                self.gaussian_noise(accel_noise),
            );
        let angular_velocity = Vector3::new(
            self.gaussian_noise(gyro_noise),
            self.gaussian_noise(gyro_noise),
            self.gaussian_noise(gyro_noise),
        );

        ImuReading {
            orientation: self.orientation,
            linear_acceleration,
            angular_velocity,
        }
    }

    /// Generate Gaussian noise using Box-Muller transform.
    fn gaussian_noise(&mut self, stddev: f64) -> f64 {
        if stddev == 0.0 {
            return 0.0;
        }
        let u1: f64 = self.rng.gen::<f64>().max(f64::EPSILON);
        let u2: f64 = self.rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        z * stddev
    }
}

impl std::fmt::Debug for LightweightEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightweightEngine")
            .field("sim_time_us", &self.sim_time_us)
            .field("position", &self.position)
            .field("velocity", &self.velocity)
            .field("motor_speeds", &self.motor_speeds)
            .finish()
    }
}

impl SimulationEngine for LightweightEngine {
    fn sim_time_us(&self) -> u64 {
        self.sim_time_us
    }

    fn world_position(&self) -> Vector3<f64> {
        self.position
    }

    fn world_linear_velocity(&self) -> Vector3<f64> {
        self.velocity
    }

    fn orientation(&self) -> UnitQuaternion<f64> {
        self.orientation
    }

    fn gravity(&self) -> Vector3<f64> {
        self.config.gravity
    }

    fn imu_reading(&self) -> Option<ImuReading> {
        self.imu
    }

    fn apply_motor_speeds(&mut self, command: &ActuatorCommand) {
        self.motor_speeds.clear();
        self.motor_speeds.extend_from_slice(command.speeds());
    }
}
