//! Synthetic state
//!
//! IR and RF hardware never reports back, so every stateful entity carries
//! helper variables that remember what was last asked of it. Each entity
//! type has a fixed set of variables that always exists, plus optional ones
//! gated on detected roles:
//!
//! | type | always | when |
//! |---|---|---|
//! | light | `state` | `brightness` with brightness roles, `color_temp` with cooler/warmer |
//! | switch | `state` | |
//! | fan | `speed`, `direction` | |
//! | media_player | | `source` with source roles |
//! | cover | `position` (enum) | numeric `position` with position roles |
//!
//! The fan `direction` variable exists whether or not a reverse command was
//! learned; `set_direction` always writes it.

use ha_core::{EntityId, EntityType, StateKind};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SynthResult;
use crate::ladder::SpeedLadder;
use crate::role;
use crate::synthesizer::CandidateEntity;

pub const SPEED_OFF: &str = "off";
pub const DIRECTION_FORWARD: &str = "forward";
pub const DIRECTION_REVERSE: &str = "reverse";
pub const POSITION_OPEN: &str = "open";
pub const POSITION_CLOSED: &str = "closed";
pub const POSITION_PARTIAL: &str = "partial";

pub const BRIGHTNESS_RANGE: (f64, f64) = (0.0, 100.0);
/// Color temperature in mireds
pub const COLOR_TEMP_RANGE: (f64, f64) = (153.0, 500.0);
pub const POSITION_RANGE: (f64, f64) = (0.0, 100.0);

/// Which variable of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarName {
    State,
    Brightness,
    ColorTemp,
    Speed,
    Direction,
    Source,
    Position,
    PositionLevel,
}

impl VarName {
    pub fn kind(self) -> StateKind {
        match self {
            VarName::State => StateKind::Boolean,
            VarName::Speed | VarName::Direction | VarName::Source | VarName::Position => {
                StateKind::Enum
            }
            VarName::Brightness | VarName::ColorTemp | VarName::PositionLevel => {
                StateKind::Numeric
            }
        }
    }

    /// Suffix of the helper id; the two position variables share one and
    /// are told apart by their helper domain
    pub fn short(self) -> &'static str {
        match self {
            VarName::State => "state",
            VarName::Brightness => "brightness",
            VarName::ColorTemp => "color_temp",
            VarName::Speed => "speed",
            VarName::Direction => "direction",
            VarName::Source => "source",
            VarName::Position | VarName::PositionLevel => "position",
        }
    }

    fn title(self) -> &'static str {
        match self {
            VarName::State => "State",
            VarName::Brightness => "Brightness",
            VarName::ColorTemp => "Color Temperature",
            VarName::Speed => "Speed",
            VarName::Direction => "Direction",
            VarName::Source => "Source",
            VarName::Position => "Position",
            VarName::PositionLevel => "Position Level",
        }
    }
}

/// A remembered value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl StateValue {
    pub fn text(value: impl Into<String>) -> Self {
        StateValue::Text(value.into())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StateValue::Number(n) => Some(*n),
            StateValue::Text(s) => s.parse().ok(),
            StateValue::Bool(_) => None,
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Bool(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        StateValue::Number(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::Text(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::Text(value)
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Bool(true) => f.write_str("on"),
            StateValue::Bool(false) => f.write_str("off"),
            StateValue::Number(n) => write!(f, "{n}"),
            StateValue::Text(s) => f.write_str(s),
        }
    }
}

/// Values a variable may hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VariableDomain {
    Flag,
    Options { options: Vec<String> },
    Range { min: f64, max: f64, step: f64 },
}

impl VariableDomain {
    fn range((min, max): (f64, f64)) -> Self {
        VariableDomain::Range { min, max, step: 1.0 }
    }

    fn options<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        VariableDomain::Options {
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a value lies in the domain
    pub fn admits(&self, value: &StateValue) -> bool {
        match (self, value) {
            (VariableDomain::Flag, StateValue::Bool(_)) => true,
            (VariableDomain::Options { options }, StateValue::Text(s)) => options.contains(s),
            (VariableDomain::Range { min, max, .. }, value) => value
                .as_f64()
                .is_some_and(|n| n >= *min && n <= *max),
            _ => false,
        }
    }
}

/// One helper entity holding synthetic state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVariable {
    pub id: EntityId,
    pub name: String,
    /// Entity the memory belongs to
    pub owner: EntityId,
    pub variable: VarName,
    pub kind: StateKind,
    pub domain: VariableDomain,
    pub initial: StateValue,
}

/// Every variable of one entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateModel {
    variables: Vec<StateVariable>,
}

impl StateModel {
    pub fn get(&self, name: VarName) -> Option<&StateVariable> {
        self.variables.iter().find(|v| v.variable == name)
    }

    pub fn id(&self, name: VarName) -> Option<&EntityId> {
        self.get(name).map(|v| &v.id)
    }

    pub fn variables(&self) -> &[StateVariable] {
        &self.variables
    }

    pub fn into_variables(self) -> Vec<StateVariable> {
        self.variables
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// Helper id for one variable of an entity
pub fn variable_id(owner: &EntityId, name: VarName) -> SynthResult<EntityId> {
    Ok(EntityId::new(
        name.kind().helper_domain(),
        format!("{}_{}", owner.object_id(), name.short()),
    )?)
}

fn variable(
    entity: &CandidateEntity,
    name: VarName,
    domain: VariableDomain,
    initial: StateValue,
) -> SynthResult<StateVariable> {
    Ok(StateVariable {
        id: variable_id(&entity.entity_id, name)?,
        name: format!("{} {}", entity.friendly_name, name.title()),
        owner: entity.entity_id.clone(),
        variable: name,
        kind: name.kind(),
        domain,
        initial,
    })
}

/// Options of a fan's speed variable: `off` then each configured rank
pub fn speed_options(ladder: &SpeedLadder) -> Vec<String> {
    std::iter::once(SPEED_OFF.to_string())
        .chain(ladder.steps().iter().map(|step| step.rank.to_string()))
        .collect()
}

/// Decide which variables an entity needs
pub fn generate(entity: &CandidateEntity) -> SynthResult<StateModel> {
    let has = |r: &str| entity.has_role(r);
    let mut variables = Vec::new();

    match entity.entity_type {
        EntityType::Light => {
            variables.push(variable(entity, VarName::State, VariableDomain::Flag, StateValue::Bool(false))?);
            if has(role::BRIGHTNESS_UP) || has(role::BRIGHTNESS_DOWN) {
                variables.push(variable(
                    entity,
                    VarName::Brightness,
                    VariableDomain::range(BRIGHTNESS_RANGE),
                    StateValue::Number(BRIGHTNESS_RANGE.0),
                )?);
            }
            if has(role::COOLER) || has(role::WARMER) {
                variables.push(variable(
                    entity,
                    VarName::ColorTemp,
                    VariableDomain::range(COLOR_TEMP_RANGE),
                    StateValue::Number(COLOR_TEMP_RANGE.0),
                )?);
            }
        }
        EntityType::Switch => {
            variables.push(variable(entity, VarName::State, VariableDomain::Flag, StateValue::Bool(false))?);
        }
        EntityType::Fan => {
            let ladder = SpeedLadder::from_entity(entity);
            variables.push(variable(
                entity,
                VarName::Speed,
                VariableDomain::options(speed_options(&ladder)),
                StateValue::text(SPEED_OFF),
            )?);
            variables.push(variable(
                entity,
                VarName::Direction,
                VariableDomain::options([DIRECTION_FORWARD, DIRECTION_REVERSE]),
                StateValue::text(DIRECTION_FORWARD),
            )?);
        }
        EntityType::MediaPlayer => {
            let sources: Vec<&str> = entity
                .roles
                .keys()
                .filter_map(|r| role::source_name(r))
                .collect();
            if !sources.is_empty() {
                let initial = StateValue::text(sources[0]);
                variables.push(variable(
                    entity,
                    VarName::Source,
                    VariableDomain::options(sources),
                    initial,
                )?);
            }
        }
        EntityType::Cover => {
            variables.push(variable(
                entity,
                VarName::Position,
                VariableDomain::options([POSITION_OPEN, POSITION_CLOSED, POSITION_PARTIAL]),
                StateValue::text(POSITION_CLOSED),
            )?);
            if entity.roles_with_prefix(role::POSITION_PREFIX).next().is_some() {
                variables.push(variable(
                    entity,
                    VarName::PositionLevel,
                    VariableDomain::range(POSITION_RANGE),
                    StateValue::Number(POSITION_RANGE.0),
                )?);
            }
        }
        EntityType::Button => {}
    }

    Ok(StateModel { variables })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn entity(entity_type: EntityType, object_id: &str, roles: &[&str]) -> CandidateEntity {
        CandidateEntity {
            entity_id: EntityId::new(entity_type.as_str(), object_id).unwrap(),
            entity_type,
            device_name: object_id.to_string(),
            roles: roles
                .iter()
                .map(|r| (r.to_string(), r.to_string()))
                .collect::<BTreeMap<_, _>>(),
            friendly_name: "Test".to_string(),
            area: None,
            icon: None,
            controller: None,
            enabled: true,
        }
    }

    fn ids(model: &StateModel) -> Vec<String> {
        model.variables().iter().map(|v| v.id.to_string()).collect()
    }

    #[test]
    fn test_switch_has_state_only() {
        let model = generate(&entity(EntityType::Switch, "heater", &["toggle"])).unwrap();
        assert_eq!(ids(&model), vec!["input_boolean.heater_state"]);
        assert_eq!(model.get(VarName::State).unwrap().initial, StateValue::Bool(false));
    }

    #[test]
    fn test_light_levels_follow_roles() {
        let plain = generate(&entity(EntityType::Light, "lamp", &["turn_on", "turn_off"])).unwrap();
        assert_eq!(ids(&plain), vec!["input_boolean.lamp_state"]);

        let full = generate(&entity(
            EntityType::Light,
            "lamp",
            &["toggle", "brightness_down", "warmer"],
        ))
        .unwrap();
        assert_eq!(
            ids(&full),
            vec![
                "input_boolean.lamp_state",
                "input_number.lamp_brightness",
                "input_number.lamp_color_temp",
            ]
        );
        let color = full.get(VarName::ColorTemp).unwrap();
        assert_eq!(
            color.domain,
            VariableDomain::Range { min: 153.0, max: 500.0, step: 1.0 }
        );
    }

    #[test]
    fn test_fan_always_has_direction() {
        let model = generate(&entity(EntityType::Fan, "office_fan", &["turn_off", "speed_1", "speed_3"])).unwrap();
        assert_eq!(
            ids(&model),
            vec!["input_select.office_fan_speed", "input_select.office_fan_direction"]
        );
        assert_eq!(
            model.get(VarName::Speed).unwrap().domain,
            VariableDomain::Options {
                options: vec!["off".to_string(), "1".to_string(), "3".to_string()]
            }
        );
        assert_eq!(
            model.get(VarName::Direction).unwrap().initial,
            StateValue::text("forward")
        );
    }

    #[test]
    fn test_media_source_only_with_sources() {
        let bare = generate(&entity(EntityType::MediaPlayer, "tv", &["power", "volume_up"])).unwrap();
        assert!(bare.is_empty());

        let model = generate(&entity(
            EntityType::MediaPlayer,
            "tv",
            &["power", "source_tv", "source_hdmi1"],
        ))
        .unwrap();
        let source = model.get(VarName::Source).unwrap();
        assert_eq!(
            source.domain,
            VariableDomain::Options {
                options: vec!["hdmi1".to_string(), "tv".to_string()]
            }
        );
        assert_eq!(source.initial, StateValue::text("hdmi1"));
    }

    #[test]
    fn test_cover_position_variables() {
        let model = generate(&entity(EntityType::Cover, "blinds", &["open", "close", "position_50"])).unwrap();
        assert_eq!(
            ids(&model),
            vec!["input_select.blinds_position", "input_number.blinds_position"]
        );
        let plain = generate(&entity(EntityType::Cover, "blinds", &["open"])).unwrap();
        assert_eq!(ids(&plain), vec!["input_select.blinds_position"]);
    }

    #[test]
    fn test_domain_admits() {
        let range = VariableDomain::range(BRIGHTNESS_RANGE);
        assert!(range.admits(&StateValue::Number(40.0)));
        assert!(!range.admits(&StateValue::Number(140.0)));
        let options = VariableDomain::options(["a", "b"]);
        assert!(options.admits(&StateValue::text("a")));
        assert!(!options.admits(&StateValue::text("c")));
        assert!(VariableDomain::Flag.admits(&StateValue::Bool(true)));
    }

    #[test]
    fn test_variable_serialization() {
        let model = generate(&entity(EntityType::Switch, "heater", &["toggle"])).unwrap();
        let value = serde_json::to_value(&model.variables()[0]).unwrap();
        assert_eq!(value["kind"], "boolean");
        assert_eq!(value["domain"]["type"], "flag");
        assert_eq!(value["initial"], false);
        assert_eq!(value["owner"], "switch.heater");
    }
}
