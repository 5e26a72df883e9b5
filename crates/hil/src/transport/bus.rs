//! Structured-message transport.
//!
//! Used instead of MAVLink framing when the autopilot side talks through a
//! publish/subscribe bus. Messages carry the same fields as the wire format.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};

use log::{debug, info};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::{HilLink, Inbound, MAX_DATAGRAMS_PER_POLL};
use crate::config::BridgeConfig;
use crate::control;
use crate::error::TransportError;
use crate::mavlink::{GpsSample, SensorSample};
use crate::types::{ActuatorCommand, ImuReading};

/// Actuator outputs from the autopilot, one field per control channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HilControl {
    pub roll_ailerons: f32,
    pub pitch_elevator: f32,
    pub yaw_rudder: f32,
    pub throttle: f32,
    pub aux1: f32,
    pub aux2: f32,
    pub aux3: f32,
    pub aux4: f32,
}

/// IMU sample published by the simulator's IMU sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuMessage {
    /// Orientation quaternion as `[w, x, y, z]`.
    pub orientation: [f64; 4],
    pub linear_acceleration: [f64; 3],
    pub angular_velocity: [f64; 3],
}

impl ImuMessage {
    pub fn from_reading(reading: &ImuReading) -> Self {
        let q = reading.orientation.quaternion();
        Self {
            orientation: [q.w, q.i, q.j, q.k],
            linear_acceleration: reading.linear_acceleration.into(),
            angular_velocity: reading.angular_velocity.into(),
        }
    }

    /// Convert to an [`ImuReading`], normalizing the quaternion.
    ///
    /// A degenerate (zero) quaternion is read as the identity.
    pub fn to_reading(&self) -> ImuReading {
        let [w, x, y, z] = self.orientation;
        let q = Quaternion::new(w, x, y, z);
        let orientation = UnitQuaternion::try_new(q, f64::EPSILON)
            .unwrap_or_else(UnitQuaternion::identity);
        ImuReading {
            orientation,
            linear_acceleration: Vector3::from(self.linear_acceleration),
            angular_velocity: Vector3::from(self.angular_velocity),
        }
    }
}

/// Rotor speed command for motor model listeners.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MotorSpeed {
    pub motor_speed: Vec<f64>,
}

/// Every message kind that travels on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMessage {
    HilControl(HilControl),
    Imu(ImuMessage),
    MotorSpeed(MotorSpeed),
    HilSensor(SensorSample),
    HilGps(GpsSample),
}

/// Minimal publish/subscribe interface.
///
/// `take` drains the messages queued on a topic; it must not block.
pub trait MessageBus: Send {
    fn publish(&mut self, topic: &str, message: BusMessage) -> Result<(), TransportError>;

    /// Declare interest in `topic`. Buses that receive from the network may
    /// discard traffic on topics nobody subscribed to.
    fn subscribe(&mut self, _topic: &str) {}

    fn take(&mut self, topic: &str) -> Vec<BusMessage>;

    fn close(&mut self) {}
}

/// In-process bus. Clones share the same queues.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBus {
    topics: Arc<Mutex<HashMap<String, VecDeque<BusMessage>>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages waiting on `topic`.
    pub fn pending(&self, topic: &str) -> usize {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.get(topic).map_or(0, VecDeque::len)
    }
}

impl MessageBus for InMemoryBus {
    fn publish(&mut self, topic: &str, message: BusMessage) -> Result<(), TransportError> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.entry(topic.to_string()).or_default().push_back(message);
        Ok(())
    }

    fn take(&mut self, topic: &str) -> Vec<BusMessage> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics
            .get_mut(topic)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    topic: String,
    message: BusMessage,
}

/// Messages kept per subscribed topic before the oldest are dropped.
pub const MAX_PENDING_PER_TOPIC: usize = 256;

/// Bus carried as JSON datagrams (`{"topic": ..., "message": {...}}`).
///
/// Like [`super::UdpTransport`], the peer is learned from the first datagram
/// unless configured. Only subscribed topics are queued; anything else is
/// dropped on arrival.
pub struct UdpJsonBus {
    socket: Option<UdpSocket>,
    peer: Option<SocketAddr>,
    recv_buf: Vec<u8>,
    subscribed: HashSet<String>,
    pending: HashMap<String, VecDeque<BusMessage>>,
    dropped: u64,
}

impl UdpJsonBus {
    pub fn bind(
        bind_addr: SocketAddr,
        remote_addr: Option<SocketAddr>,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;
        info!(
            "JSON bus listening on {}",
            socket.local_addr().unwrap_or(bind_addr)
        );
        Ok(Self {
            socket: Some(socket),
            peer: remote_addr,
            recv_buf: vec![0u8; 65_536],
            subscribed: HashSet::new(),
            pending: HashMap::new(),
            dropped: 0,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Messages queued on `topic` and not yet taken.
    pub fn pending_len(&self, topic: &str) -> usize {
        self.pending.get(topic).map_or(0, VecDeque::len)
    }

    /// Envelopes discarded for an unsubscribed topic or a full queue.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn enqueue(&mut self, topic: String, message: BusMessage) {
        if !self.subscribed.contains(&topic) {
            debug!("Dropping bus message on unsubscribed topic {topic}");
            self.dropped += 1;
            return;
        }
        let queue = self.pending.entry(topic).or_default();
        if queue.len() >= MAX_PENDING_PER_TOPIC {
            queue.pop_front();
            self.dropped += 1;
        }
        queue.push_back(message);
    }

    fn drain_socket(&mut self) {
        let Some(socket) = self.socket.as_ref() else {
            return;
        };
        let mut received = Vec::new();
        for _ in 0..MAX_DATAGRAMS_PER_POLL {
            match socket.recv_from(&mut self.recv_buf) {
                Ok((len, addr)) => {
                    if self.peer.is_none() {
                        info!("Bus peer discovered at {addr}");
                        self.peer = Some(addr);
                    }
                    match serde_json::from_slice::<Envelope>(&self.recv_buf[..len]) {
                        Ok(envelope) => received.push(envelope),
                        Err(e) => debug!("Dropping malformed bus datagram: {e}"),
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!("Bus receive failed: {e}");
                    break;
                }
            }
        }
        for envelope in received {
            self.enqueue(envelope.topic, envelope.message);
        }
    }
}

impl MessageBus for UdpJsonBus {
    fn publish(&mut self, topic: &str, message: BusMessage) -> Result<(), TransportError> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "socket closed",
            )));
        };
        let addr = self.peer.ok_or(TransportError::PeerUnknown)?;
        let envelope = Envelope {
            topic: topic.to_string(),
            message,
        };
        let bytes =
            serde_json::to_vec(&envelope).map_err(|e| TransportError::Serialize(e.to_string()))?;
        socket.send_to(&bytes, addr)?;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) {
        self.subscribed.insert(topic.to_string());
    }

    fn take(&mut self, topic: &str) -> Vec<BusMessage> {
        self.subscribe(topic);
        self.drain_socket();
        self.pending
            .remove(topic)
            .map(Vec::from)
            .unwrap_or_default()
    }

    fn close(&mut self) {
        self.socket = None;
        self.pending.clear();
    }
}

/// Fully resolved topic names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub motor_speed: String,
    pub hil_control: String,
    pub imu: String,
    pub hil_sensor: String,
    pub hil_gps: String,
}

impl Topics {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            motor_speed: config.resolve_topic(&config.motor_speed_topic),
            hil_control: config.resolve_topic(&config.hil_control_topic),
            imu: config.resolve_topic(&config.imu_topic),
            hil_sensor: config.resolve_topic(&config.hil_sensor_topic),
            hil_gps: config.resolve_topic(&config.hil_gps_topic),
        }
    }
}

/// [`HilLink`] over a [`MessageBus`].
#[derive(Debug)]
pub struct BusLink<B> {
    bus: B,
    topics: Topics,
}

impl<B: MessageBus> BusLink<B> {
    pub fn new(mut bus: B, topics: Topics) -> Self {
        bus.subscribe(&topics.hil_control);
        bus.subscribe(&topics.imu);
        Self { bus, topics }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }
}

impl<B: MessageBus> HilLink for BusLink<B> {
    fn kind(&self) -> &'static str {
        "bus"
    }

    fn poll_inbound(&mut self) -> Vec<Inbound> {
        let mut inbound = Vec::new();
        for message in self.bus.take(&self.topics.hil_control) {
            match message {
                BusMessage::HilControl(controls) => {
                    inbound.push(Inbound::Controls(control::decode_structured(&controls)))
                }
                other => debug!("Unexpected message on {}: {other:?}", self.topics.hil_control),
            }
        }
        for message in self.bus.take(&self.topics.imu) {
            match message {
                BusMessage::Imu(imu) => inbound.push(Inbound::Imu(imu.to_reading())),
                other => debug!("Unexpected message on {}: {other:?}", self.topics.imu),
            }
        }
        inbound
    }

    fn send_sensor(&mut self, sample: &SensorSample) -> Result<(), TransportError> {
        self.bus
            .publish(&self.topics.hil_sensor, BusMessage::HilSensor(*sample))
    }

    fn send_gps(&mut self, sample: &GpsSample) -> Result<(), TransportError> {
        self.bus
            .publish(&self.topics.hil_gps, BusMessage::HilGps(*sample))
    }

    fn publish_motor_speeds(&mut self, command: &ActuatorCommand) -> Result<(), TransportError> {
        let message = BusMessage::MotorSpeed(MotorSpeed {
            motor_speed: command.speeds().to_vec(),
        });
        self.bus.publish(&self.topics.motor_speed, message)
    }

    fn close(&mut self) {
        self.bus.close();
    }
}
