//! Per-step orchestration between the simulation engine and the autopilot.

use log::{error, info, warn};
use nalgebra::Vector3;

use crate::config::BridgeConfig;
use crate::control::ControlState;
use crate::engine::SimulationEngine;
use crate::error::TransportError;
use crate::telemetry::{encode_gps, encode_sensor, GeoReference, GpsGate};
use crate::transport::{
    BusLink, HilLink, Inbound, MavlinkUdpLink, MessageBus, Topics, UdpJsonBus,
};
use crate::types::{ActuatorCommand, ImuReading};

/// Lifecycle of the bridge. There is no way back to `Unarmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Unarmed,
    Armed,
}

/// What a single [`HilBridge::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    pub armed: bool,
    /// Control inputs decoded this step.
    pub controls_applied: usize,
    /// Rotor speeds were handed to the engine.
    pub motors_applied: bool,
    pub sensor_sent: bool,
    pub gps_sent: bool,
}

/// Running counters since construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeStats {
    pub steps: u64,
    pub controls_received: u64,
    pub imu_received: u64,
    pub motor_commands: u64,
    pub sensor_sent: u64,
    pub gps_sent: u64,
    pub send_failures: u64,
}

/// Collapses a run of send failures into one warning and one recovery
/// notice. Each outbound message kind keeps its own streak.
#[derive(Debug, Default)]
struct FailureStreak {
    length: u64,
}

impl FailureStreak {
    fn record(&mut self, link: &str, what: &str, result: Result<(), TransportError>) -> bool {
        match result {
            Ok(()) => {
                if self.length > 0 {
                    info!(
                        "{link}: {what} sending recovered after {} failed attempts",
                        self.length
                    );
                    self.length = 0;
                }
                true
            }
            Err(e) => {
                if self.length == 0 {
                    warn!("{link}: {what} send failed: {e} (further failures suppressed)");
                }
                self.length += 1;
                false
            }
        }
    }

    fn is_failing(&self) -> bool {
        self.length > 0
    }
}

/// Hardware-in-the-loop bridge.
///
/// Call [`step`](Self::step) once per simulation tick. Without a link the
/// bridge is inert: steps do nothing and never fail.
pub struct HilBridge {
    link: Option<Box<dyn HilLink>>,
    controls: ControlState,
    gps_gate: GpsGate,
    reference: GeoReference,
    magnetic_field: Vector3<f64>,
    imu_override: Option<ImuReading>,
    stats: BridgeStats,
    motor_streak: FailureStreak,
    gps_streak: FailureStreak,
    sensor_streak: FailureStreak,
}

impl HilBridge {
    pub fn new(config: &BridgeConfig, link: Option<Box<dyn HilLink>>) -> Self {
        match &link {
            Some(link) => info!("HIL bridge using {} link", link.kind()),
            None => warn!("HIL bridge has no link; running inert"),
        }
        Self {
            link,
            controls: ControlState::new(config.actuator_transform()),
            gps_gate: GpsGate::new(config.gps_interval()),
            reference: config.reference,
            magnetic_field: config.magnetic_field(),
            imu_override: None,
            stats: BridgeStats::default(),
            motor_streak: FailureStreak::default(),
            gps_streak: FailureStreak::default(),
            sensor_streak: FailureStreak::default(),
        }
    }

    /// Open the transport selected by `use_mavlink_udp`.
    ///
    /// A socket that cannot be opened is reported once and leaves the
    /// bridge inert.
    pub fn from_config(config: &BridgeConfig) -> Self {
        let link: Result<Box<dyn HilLink>, TransportError> = if config.use_mavlink_udp {
            MavlinkUdpLink::bind(&config.udp, config.system_id, config.component_id)
                .map(|link| Box::new(link) as Box<dyn HilLink>)
        } else {
            UdpJsonBus::bind(config.bus.bind_addr, config.bus.remote_addr).map(|bus| {
                Box::new(BusLink::new(bus, Topics::from_config(config))) as Box<dyn HilLink>
            })
        };

        match link {
            Ok(link) => Self::new(config, Some(link)),
            Err(e) => {
                error!("Failed to open HIL transport: {e}");
                Self::new(config, None)
            }
        }
    }

    /// Structured transport over a caller-supplied bus.
    pub fn with_bus<B: MessageBus + 'static>(config: &BridgeConfig, bus: B) -> Self {
        let link = BusLink::new(bus, Topics::from_config(config));
        Self::new(config, Some(Box::new(link)))
    }

    /// Run one simulation tick.
    ///
    /// Inbound traffic is drained first. Until the first control input
    /// arrives nothing is sent and the engine is left alone. Once armed,
    /// rotor speeds go to the engine every step, HIL_SENSOR is sent every
    /// step and HIL_GPS whenever the GPS period has elapsed.
    pub fn step<E: SimulationEngine + ?Sized>(&mut self, engine: &mut E) -> StepReport {
        self.stats.steps += 1;
        let mut report = StepReport::default();

        let Some(link) = self.link.as_mut() else {
            return report;
        };

        for inbound in link.poll_inbound() {
            match inbound {
                Inbound::Controls(inputs) => {
                    if !self.controls.is_armed() {
                        info!("First control input received; bridge armed");
                    }
                    self.controls.apply(&inputs);
                    self.stats.controls_received += 1;
                    report.controls_applied += 1;
                }
                Inbound::Imu(reading) => {
                    self.imu_override = Some(reading);
                    self.stats.imu_received += 1;
                }
            }
        }

        let now_us = engine.sim_time_us();
        self.gps_gate.observe(now_us);

        report.armed = self.controls.is_armed();
        let Some(command) = self.controls.command().cloned() else {
            return report;
        };
        let link_kind = link.kind();

        engine.apply_motor_speeds(&command);
        self.stats.motor_commands += 1;
        report.motors_applied = true;
        let published = link.publish_motor_speeds(&command);
        if !self.motor_streak.record(link_kind, "motor speed", published) {
            self.stats.send_failures += 1;
        }

        let kinematics = engine.kinematics();

        if self.gps_gate.is_due(now_us) {
            let sample = encode_gps(
                now_us,
                &self.reference,
                &kinematics.position,
                &kinematics.linear_velocity,
            );
            let result = link.send_gps(&sample);
            if self.gps_streak.record(link_kind, "HIL_GPS", result) {
                self.gps_gate.mark_sent(now_us);
                self.stats.gps_sent += 1;
                report.gps_sent = true;
            } else {
                self.stats.send_failures += 1;
            }
        }

        let imu = self
            .imu_override
            .unwrap_or_else(|| engine.imu_or_static());
        let sample = encode_sensor(now_us, &imu, &kinematics, &self.magnetic_field);
        let result = link.send_sensor(&sample);
        if self.sensor_streak.record(link_kind, "HIL_SENSOR", result) {
            self.stats.sensor_sent += 1;
            report.sensor_sent = true;
        } else {
            self.stats.send_failures += 1;
        }

        report
    }

    /// Close the link. The bridge is inert afterwards.
    pub fn shutdown(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close();
            info!(
                "HIL bridge shut down after {} steps ({} sensor, {} GPS sent, {} send failures)",
                self.stats.steps, self.stats.sensor_sent, self.stats.gps_sent, self.stats.send_failures
            );
        }
    }

    pub fn state(&self) -> BridgeState {
        if self.controls.is_armed() {
            BridgeState::Armed
        } else {
            BridgeState::Unarmed
        }
    }

    pub fn is_armed(&self) -> bool {
        self.controls.is_armed()
    }

    pub fn is_inert(&self) -> bool {
        self.link.is_none()
    }

    /// Latest actuator command, `None` until armed.
    pub fn command(&self) -> Option<&ActuatorCommand> {
        self.controls.command()
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// True while the latest send of any message kind failed.
    pub fn is_send_failing(&self) -> bool {
        self.motor_streak.is_failing()
            || self.gps_streak.is_failing()
            || self.sensor_streak.is_failing()
    }

    pub fn link_kind(&self) -> Option<&'static str> {
        self.link.as_ref().map(|link| link.kind())
    }
}

impl Drop for HilBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for HilBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HilBridge")
            .field("link", &self.link_kind())
            .field("state", &self.state())
            .field("stats", &self.stats)
            .finish()
    }
}
