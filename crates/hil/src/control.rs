//! Control decoding: HIL_CONTROLS (or the structured equivalent) to rotor
//! speed commands.

use log::warn;

use crate::mavlink::HilControls;
use crate::transport::bus::HilControl;
use crate::types::{ActuatorCommand, RawControlInputs, CONTROL_CHANNELS};

pub const DEFAULT_CONTROL_SCALE: f64 = 150.0;
pub const DEFAULT_CONTROL_OFFSET: f64 = 600.0;
pub const DEFAULT_ROTOR_COUNT: usize = 4;

/// Read the eight control channels of a HIL_CONTROLS payload in wire order.
pub fn decode(controls: &HilControls) -> RawControlInputs {
    RawControlInputs::new([
        controls.roll_ailerons as f64,
        controls.pitch_elevator as f64,
        controls.yaw_rudder as f64,
        controls.throttle as f64,
        controls.aux1 as f64,
        controls.aux2 as f64,
        controls.aux3 as f64,
        controls.aux4 as f64,
    ])
}

/// Same as [`decode`] for a control message delivered over the message bus.
pub fn decode_structured(message: &HilControl) -> RawControlInputs {
    RawControlInputs::new([
        message.roll_ailerons as f64,
        message.pitch_elevator as f64,
        message.yaw_rudder as f64,
        message.throttle as f64,
        message.aux1 as f64,
        message.aux2 as f64,
        message.aux3 as f64,
        message.aux4 as f64,
    ])
}

/// Apply `speed = control * scale + offset` to the first `rotor_count`
/// channels. Channels past `rotor_count` are dropped, and a `rotor_count`
/// above the channel count yields only as many speeds as there are channels.
pub fn to_actuator_command(
    inputs: &RawControlInputs,
    rotor_count: usize,
    scale: f64,
    offset: f64,
) -> ActuatorCommand {
    let speeds = inputs
        .channels
        .iter()
        .take(rotor_count)
        .map(|control| control * scale + offset)
        .collect();
    ActuatorCommand::new(speeds)
}

/// Parameters of the control-to-speed mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorTransform {
    pub rotor_count: usize,
    pub scale: f64,
    pub offset: f64,
}

impl ActuatorTransform {
    pub fn new(rotor_count: usize, scale: f64, offset: f64) -> Self {
        if rotor_count > CONTROL_CHANNELS {
            warn!(
                "rotor_count {rotor_count} exceeds the {CONTROL_CHANNELS} control channels; \
                 only {CONTROL_CHANNELS} rotors will be driven"
            );
        }
        Self {
            rotor_count,
            scale,
            offset,
        }
    }

    pub fn apply(&self, inputs: &RawControlInputs) -> ActuatorCommand {
        to_actuator_command(inputs, self.rotor_count, self.scale, self.offset)
    }
}

impl Default for ActuatorTransform {
    fn default() -> Self {
        Self {
            rotor_count: DEFAULT_ROTOR_COUNT,
            scale: DEFAULT_CONTROL_SCALE,
            offset: DEFAULT_CONTROL_OFFSET,
        }
    }
}

/// Current actuator command and the one-way armed flag.
///
/// The command is overwritten wholesale by every accepted control input.
/// `armed` turns true on the first one and never turns false again.
#[derive(Debug, Clone)]
pub struct ControlState {
    transform: ActuatorTransform,
    command: ActuatorCommand,
    armed: bool,
    accepted: u64,
}

impl ControlState {
    pub fn new(transform: ActuatorTransform) -> Self {
        Self {
            transform,
            command: ActuatorCommand::default(),
            armed: false,
            accepted: 0,
        }
    }

    /// Derive a new command from `inputs` and arm.
    pub fn apply(&mut self, inputs: &RawControlInputs) {
        self.command = self.transform.apply(inputs);
        self.accepted += 1;
        self.armed = true;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// The command to hand to the simulator, or `None` before arming.
    pub fn command(&self) -> Option<&ActuatorCommand> {
        self.armed.then_some(&self.command)
    }

    /// Number of control inputs accepted so far.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn transform(&self) -> &ActuatorTransform {
        &self.transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_speeds(command: &ActuatorCommand, expected: &[f64]) {
        assert_eq!(command.rotor_count(), expected.len());
        for (actual, expected) in command.speeds().iter().zip(expected) {
            assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
        }
    }

    #[test]
    fn test_example_vector() {
        let inputs = RawControlInputs::new([0.1, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.0]);
        let command = to_actuator_command(&inputs, 4, 150.0, 600.0);
        assert_speeds(&command, &[615.0, 600.0, 600.0, 675.0]);
    }

    #[test]
    fn test_decode_field_order() {
        let controls = HilControls {
            roll_ailerons: 1.0,
            pitch_elevator: 2.0,
            yaw_rudder: 3.0,
            throttle: 4.0,
            aux1: 5.0,
            aux2: 6.0,
            aux3: 7.0,
            aux4: 8.0,
            ..Default::default()
        };
        assert_eq!(
            decode(&controls).channels,
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]
        );
    }

    #[test]
    fn test_decode_does_not_clamp() {
        let controls = HilControls {
            roll_ailerons: 3.5,
            throttle: -2.0,
            ..Default::default()
        };
        let inputs = decode(&controls);
        assert_eq!(inputs.roll(), 3.5);
        assert_eq!(inputs.throttle(), -2.0);
        let command = to_actuator_command(&inputs, 4, 150.0, 600.0);
        assert_speeds(&command, &[1125.0, 600.0, 600.0, 300.0]);
    }

    #[test]
    fn test_decode_structured_matches_wire() {
        let message = HilControl {
            roll_ailerons: 0.1,
            throttle: 0.5,
            aux4: -0.25,
            ..Default::default()
        };
        let inputs = decode_structured(&message);
        assert_eq!(inputs.channels[0], 0.1f32 as f64);
        assert_eq!(inputs.channels[3], 0.5);
        assert_eq!(inputs.channels[7], -0.25);
    }

    #[test]
    fn test_extra_channels_are_dropped() {
        let inputs = RawControlInputs::new([0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        let command = to_actuator_command(&inputs, 4, 150.0, 600.0);
        assert_speeds(&command, &[600.0; 4]);
    }

    #[test]
    fn test_rotor_count_beyond_channels_is_bounded() {
        let inputs = RawControlInputs::new([0.0; CONTROL_CHANNELS]);
        let command = to_actuator_command(&inputs, 12, 150.0, 600.0);
        assert_eq!(command.rotor_count(), CONTROL_CHANNELS);
    }

    #[test]
    fn test_hexacopter_uses_six_channels() {
        let inputs = RawControlInputs::new([1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        let command = to_actuator_command(&inputs, 6, 150.0, 600.0);
        assert_speeds(&command, &[750.0; 6]);
    }

    #[test]
    fn test_control_state_arms_once_and_stays_armed() {
        let mut state = ControlState::new(ActuatorTransform::default());
        assert!(!state.is_armed());
        assert!(state.command().is_none());

        state.apply(&RawControlInputs::new([0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.0]));
        assert!(state.is_armed());
        assert_speeds(state.command().unwrap(), &[600.0, 600.0, 600.0, 675.0]);

        state.apply(&RawControlInputs::default());
        assert!(state.is_armed());
        assert_speeds(state.command().unwrap(), &[600.0; 4]);
        assert_eq!(state.accepted(), 2);
    }
}
