//! Hardware-in-the-loop bridge between a physics simulator and an external
//! autopilot.
//!
//! Simulated IMU and GPS state is encoded as MAVLink v1 `HIL_SENSOR` and
//! `HIL_GPS` frames (or equivalent structured messages) and sent to the
//! autopilot; `HIL_CONTROLS` replies are decoded into per-rotor speed
//! commands for the simulator.

pub mod bridge;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod mavlink;
pub mod sim;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use bridge::{BridgeState, BridgeStats, HilBridge, StepReport};
pub use config::BridgeConfig;
pub use control::ControlState;
pub use engine::SimulationEngine;
pub use error::{CodecError, ConfigError, TransportError};
pub use mavlink::{Frame, FrameEncoder, FrameParser, GpsSample, HilControls, SensorSample};
pub use sim::{LightweightConfig, LightweightEngine};
pub use telemetry::{GeoReference, GpsGate};
pub use transport::{HilLink, Inbound};
pub use types::{ActuatorCommand, ImuReading, KinematicState, RawControlInputs};
