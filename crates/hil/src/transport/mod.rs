//! Transports between the bridge and the autopilot.
//!
//! Two implementations of [`HilLink`] exist and one is chosen when the
//! bridge is built:
//!
//! - [`udp::MavlinkUdpLink`]: MAVLink v1 frames over a non-blocking UDP socket
//! - [`bus::BusLink`]: structured messages over a publish/subscribe bus

pub mod bus;
pub mod udp;

pub use bus::{BusLink, BusMessage, InMemoryBus, MessageBus, Topics, UdpJsonBus};
pub use udp::{MavlinkUdpLink, UdpTransport};

use crate::error::TransportError;
use crate::mavlink::{GpsSample, SensorSample};
use crate::types::{ActuatorCommand, ImuReading, RawControlInputs};

/// Upper bound on datagrams drained per poll so a flood cannot stall a step.
pub const MAX_DATAGRAMS_PER_POLL: usize = 64;

/// Something the autopilot side delivered to the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Controls(RawControlInputs),
    Imu(ImuReading),
}

/// Link to the autopilot.
///
/// Every method must return promptly; the bridge calls them from inside a
/// simulation step and a blocked call stalls the simulation.
pub trait HilLink: Send {
    /// Short identifier for logs (e.g. "mavlink_udp", "bus").
    fn kind(&self) -> &'static str;

    /// Drain everything currently available without blocking.
    fn poll_inbound(&mut self) -> Vec<Inbound>;

    fn send_sensor(&mut self, sample: &SensorSample) -> Result<(), TransportError>;

    fn send_gps(&mut self, sample: &GpsSample) -> Result<(), TransportError>;

    /// Publish the rotor speed command to listeners other than the engine.
    fn publish_motor_speeds(&mut self, command: &ActuatorCommand) -> Result<(), TransportError>;

    /// Release sockets and subscriptions. Later calls become no-ops.
    fn close(&mut self);
}
