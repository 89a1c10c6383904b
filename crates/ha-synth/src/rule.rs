//! Action rules
//!
//! A rule is the handler of one operation on one entity: an ordered list of
//! steps that dispatch raw commands, update synthetic state, branch on the
//! request or the remembered state, or hand the operation to another
//! entity. Dispatches are symbolic; a runtime resolves them into actual
//! transmissions.

use ha_core::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::state_model::StateValue;

/// Operations an entity can handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    TurnOn,
    TurnOff,
    Toggle,
    SetSpeed,
    SetDirection,
    Oscillate,
    SetBrightness,
    SetColorTemperature,
    Open,
    Close,
    Stop,
    OpenTilt,
    CloseTilt,
    SetPosition,
    VolumeUp,
    VolumeDown,
    Mute,
    Play,
    Pause,
    PlayPause,
    NextTrack,
    PreviousTrack,
    ChannelUp,
    ChannelDown,
    SelectSource,
    Press,
}

impl Operation {
    pub const ALL: [Operation; 26] = [
        Operation::TurnOn,
        Operation::TurnOff,
        Operation::Toggle,
        Operation::SetSpeed,
        Operation::SetDirection,
        Operation::Oscillate,
        Operation::SetBrightness,
        Operation::SetColorTemperature,
        Operation::Open,
        Operation::Close,
        Operation::Stop,
        Operation::OpenTilt,
        Operation::CloseTilt,
        Operation::SetPosition,
        Operation::VolumeUp,
        Operation::VolumeDown,
        Operation::Mute,
        Operation::Play,
        Operation::Pause,
        Operation::PlayPause,
        Operation::NextTrack,
        Operation::PreviousTrack,
        Operation::ChannelUp,
        Operation::ChannelDown,
        Operation::SelectSource,
        Operation::Press,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::TurnOn => "turn_on",
            Operation::TurnOff => "turn_off",
            Operation::Toggle => "toggle",
            Operation::SetSpeed => "set_speed",
            Operation::SetDirection => "set_direction",
            Operation::Oscillate => "oscillate",
            Operation::SetBrightness => "set_brightness",
            Operation::SetColorTemperature => "set_color_temperature",
            Operation::Open => "open",
            Operation::Close => "close",
            Operation::Stop => "stop",
            Operation::OpenTilt => "open_tilt",
            Operation::CloseTilt => "close_tilt",
            Operation::SetPosition => "set_position",
            Operation::VolumeUp => "volume_up",
            Operation::VolumeDown => "volume_down",
            Operation::Mute => "mute",
            Operation::Play => "play",
            Operation::Pause => "pause",
            Operation::PlayPause => "play_pause",
            Operation::NextTrack => "next_track",
            Operation::PreviousTrack => "previous_track",
            Operation::ChannelUp => "channel_up",
            Operation::ChannelDown => "channel_down",
            Operation::SelectSource => "select_source",
            Operation::Press => "press",
        }
    }

    /// Name of the requested value the operation takes, if any
    pub fn parameter(self) -> Option<&'static str> {
        match self {
            Operation::SetSpeed => Some("percentage"),
            Operation::SetBrightness => Some("brightness"),
            Operation::SetColorTemperature => Some("color_temp"),
            Operation::SetPosition => Some("position"),
            Operation::SelectSource => Some("source"),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operation '{s}'"))
    }
}

/// Symbolic "send this learned command through this transmitter"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandRef {
    pub controller: EntityId,
    pub device: String,
    pub command: String,
}

impl fmt::Display for CommandRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} via {}", self.device, self.command, self.controller)
    }
}

/// New value of a state update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum ValueExpr {
    Literal { value: StateValue },
    /// The operation's requested value
    Parameter { name: String },
    /// `second` when the variable holds `first`, otherwise `first`
    Flip {
        variable: EntityId,
        first: StateValue,
        second: StateValue,
    },
}

impl ValueExpr {
    pub fn literal(value: impl Into<StateValue>) -> Self {
        ValueExpr::Literal {
            value: value.into(),
        }
    }

    pub fn parameter(name: &str) -> Self {
        ValueExpr::Parameter {
            name: name.to_string(),
        }
    }
}

/// Guard of a choose option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum Condition {
    /// The variable currently holds the value
    StateIs { variable: EntityId, value: StateValue },
    /// The requested value is at most the threshold
    ParameterAtMost { parameter: String, threshold: f64 },
    /// The requested value is above the variable's current value
    ParameterAbove { parameter: String, variable: EntityId },
    /// The requested value is below the variable's current value
    ParameterBelow { parameter: String, variable: EntityId },
    /// The requested value equals the value
    ParameterIs { parameter: String, value: StateValue },
}

impl Condition {
    pub fn state_is(variable: &EntityId, value: impl Into<StateValue>) -> Self {
        Condition::StateIs {
            variable: variable.clone(),
            value: value.into(),
        }
    }

    fn variable(&self) -> Option<&EntityId> {
        match self {
            Condition::StateIs { variable, .. }
            | Condition::ParameterAbove { variable, .. }
            | Condition::ParameterBelow { variable, .. } => Some(variable),
            Condition::ParameterAtMost { .. } | Condition::ParameterIs { .. } => None,
        }
    }
}

/// Set a state variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub variable: EntityId,
    pub value: ValueExpr,
}

/// One branch of a choose step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChooseOption {
    /// All must hold
    pub conditions: Vec<Condition>,
    pub sequence: Vec<Step>,
}

/// Run the first option whose conditions hold, else the default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChooseStep {
    pub choose: Vec<ChooseOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default: Vec<Step>,
}

/// Hand the operation to another entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegateStep {
    pub entity_id: EntityId,
    pub operation: Operation,
}

/// One step of a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Dispatch(CommandRef),
    StateUpdate(StateUpdate),
    Choose(ChooseStep),
    Delegate(DelegateStep),
}

impl Step {
    pub fn dispatch(command: CommandRef) -> Self {
        Step::Dispatch(command)
    }

    pub fn update(variable: &EntityId, value: ValueExpr) -> Self {
        Step::StateUpdate(StateUpdate {
            variable: variable.clone(),
            value,
        })
    }

    pub fn set(variable: &EntityId, value: impl Into<StateValue>) -> Self {
        Self::update(variable, ValueExpr::literal(value))
    }

    pub fn choose(choose: Vec<ChooseOption>, default: Vec<Step>) -> Self {
        Step::Choose(ChooseStep { choose, default })
    }

    pub fn delegate(entity_id: &EntityId, operation: Operation) -> Self {
        Step::Delegate(DelegateStep {
            entity_id: entity_id.clone(),
            operation,
        })
    }

    /// Visit this step and every nested step, depth first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Step)) {
        visit(self);
        if let Step::Choose(choose) = self {
            for option in &choose.choose {
                for step in &option.sequence {
                    step.walk(visit);
                }
            }
            for step in &choose.default {
                step.walk(visit);
            }
        }
    }
}

impl ChooseOption {
    pub fn when(conditions: Vec<Condition>, sequence: Vec<Step>) -> Self {
        Self {
            conditions,
            sequence,
        }
    }
}

/// Handler of one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRule {
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    pub steps: Vec<Step>,
}

impl ActionRule {
    pub fn new(operation: Operation, steps: Vec<Step>) -> Self {
        Self {
            operation,
            parameter: operation.parameter().map(str::to_string),
            steps,
        }
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Step)) {
        for step in &self.steps {
            step.walk(visit);
        }
    }

    /// Every state variable the rule reads or writes
    pub fn referenced_variables(&self) -> BTreeSet<&EntityId> {
        let mut out = BTreeSet::new();
        self.walk(&mut |step| match step {
            Step::StateUpdate(update) => {
                out.insert(&update.variable);
                if let ValueExpr::Flip { variable, .. } = &update.value {
                    out.insert(variable);
                }
            }
            Step::Choose(choose) => {
                out.extend(
                    choose
                        .choose
                        .iter()
                        .flat_map(|option| &option.conditions)
                        .filter_map(Condition::variable),
                );
            }
            Step::Dispatch(_) | Step::Delegate(_) => {}
        });
        out
    }

    /// Every command the rule may dispatch, in step order
    pub fn dispatched_commands(&self) -> Vec<&CommandRef> {
        let mut out = Vec::new();
        self.walk(&mut |step| {
            if let Step::Dispatch(command) = step {
                out.push(command);
            }
        });
        out
    }

    /// Every entity the rule hands work to
    pub fn delegates(&self) -> Vec<&DelegateStep> {
        let mut out = Vec::new();
        self.walk(&mut |step| {
            if let Step::Delegate(delegate) = step {
                out.push(delegate);
            }
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    fn command(name: &str) -> CommandRef {
        CommandRef {
            controller: id("remote.rm4"),
            device: "office_fan".to_string(),
            command: name.to_string(),
        }
    }

    #[test]
    fn test_operation_round_trip_names() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        assert!("fly".parse::<Operation>().is_err());
        assert_eq!(Operation::SetSpeed.parameter(), Some("percentage"));
        assert_eq!(Operation::Toggle.parameter(), None);
    }

    #[test]
    fn test_step_serialization() {
        let speed = id("input_select.office_fan_speed");
        let step = Step::choose(
            vec![ChooseOption::when(
                vec![Condition::ParameterAtMost {
                    parameter: "percentage".to_string(),
                    threshold: 50.0,
                }],
                vec![Step::dispatch(command("fan_speed_1")), Step::set(&speed, "1")],
            )],
            vec![],
        );

        assert_eq!(
            serde_json::to_value(&step).unwrap(),
            json!({
                "step": "choose",
                "choose": [{
                    "conditions": [{
                        "condition": "parameter_at_most",
                        "parameter": "percentage",
                        "threshold": 50.0
                    }],
                    "sequence": [
                        {
                            "step": "dispatch",
                            "controller": "remote.rm4",
                            "device": "office_fan",
                            "command": "fan_speed_1"
                        },
                        {
                            "step": "state_update",
                            "variable": "input_select.office_fan_speed",
                            "value": {"expr": "literal", "value": "1"}
                        }
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_step_deserialization() {
        let step: Step = serde_json::from_value(json!({
            "step": "delegate",
            "entity_id": "switch.den_tv_power",
            "operation": "turn_on"
        }))
        .unwrap();
        assert_eq!(step, Step::delegate(&id("switch.den_tv_power"), Operation::TurnOn));
    }

    #[test]
    fn test_referenced_variables() {
        let state = id("input_boolean.lamp_state");
        let direction = id("input_select.fan_direction");
        let rule = ActionRule::new(
            Operation::Toggle,
            vec![Step::choose(
                vec![ChooseOption::when(
                    vec![Condition::state_is(&state, false)],
                    vec![Step::set(&state, true)],
                )],
                vec![Step::update(
                    &state,
                    ValueExpr::Flip {
                        variable: direction.clone(),
                        first: "forward".into(),
                        second: "reverse".into(),
                    },
                )],
            )],
        );
        let vars: Vec<&EntityId> = rule.referenced_variables().into_iter().collect();
        assert_eq!(vars, vec![&state, &direction]);
    }

    #[test]
    fn test_dispatched_commands_in_order() {
        let rule = ActionRule::new(
            Operation::SetSpeed,
            vec![Step::choose(
                vec![ChooseOption::when(vec![], vec![Step::dispatch(command("a"))])],
                vec![Step::dispatch(command("b"))],
            )],
        );
        let names: Vec<&str> = rule
            .dispatched_commands()
            .iter()
            .map(|c| c.command.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(rule.parameter.as_deref(), Some("percentage"));
    }
}
