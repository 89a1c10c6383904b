//! Action rule compiler
//!
//! Compiles each candidate entity into its operation handlers. Media
//! players with power commands are split first: a companion switch owns the
//! power commands and the power state, and the player delegates its power
//! operations to it. After that split every entity takes the same path
//! through [`compile_entity`].

use ha_core::{slugify, EntityId, EntityType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SynthError, SynthResult};
use crate::ladder::{PositionLadder, SpeedLadder, SpeedStep};
use crate::naming::{display_name, Vocabulary};
use crate::role;
use crate::rule::{ActionRule, ChooseOption, CommandRef, Condition, Operation, Step, ValueExpr};
use crate::state_model::{
    generate, variable_id, StateModel, StateVariable, VarName, DIRECTION_FORWARD,
    DIRECTION_REVERSE, POSITION_CLOSED, POSITION_OPEN, POSITION_PARTIAL, SPEED_OFF,
};
use crate::synthesizer::{default_icon, is_valid, CandidateEntity};

/// Icon of a media player's companion power switch
pub const COMPANION_ICON: &str = "mdi:power";

/// Media operations that only dispatch their command
const MEDIA_DISPATCH: &[(Operation, &str)] = &[
    (Operation::VolumeUp, role::VOLUME_UP),
    (Operation::VolumeDown, role::VOLUME_DOWN),
    (Operation::Mute, role::MUTE),
    (Operation::Play, role::PLAY),
    (Operation::Pause, role::PAUSE),
    (Operation::PlayPause, role::PLAY_PAUSE),
    (Operation::Stop, role::STOP),
    (Operation::NextTrack, role::NEXT_TRACK),
    (Operation::PreviousTrack, role::PREVIOUS_TRACK),
    (Operation::ChannelUp, role::CHANNEL_UP),
    (Operation::ChannelDown, role::CHANNEL_DOWN),
];

/// How an entity relates to the others in the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityShape {
    Standalone,
    /// Media player whose power operations go to `companion`
    PowerDelegated { companion: EntityId },
    /// Switch holding the power state of `primary`
    PowerCompanion { primary: EntityId },
    /// Stateless push action for an otherwise unused command
    Button,
}

/// An entity with its state and handlers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledEntity {
    #[serde(flatten)]
    pub entity: CandidateEntity,
    pub shape: EntityShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_count: Option<usize>,
    /// Ids of the variables this entity owns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub state_variables: Vec<EntityId>,
    pub rules: Vec<ActionRule>,
}

impl CompiledEntity {
    pub fn entity_id(&self) -> &EntityId {
        &self.entity.entity_id
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity.entity_type
    }

    pub fn rule(&self, operation: Operation) -> Option<&ActionRule> {
        self.rules.iter().find(|r| r.operation == operation)
    }

    pub fn operations(&self) -> impl Iterator<Item = Operation> + '_ {
        self.rules.iter().map(|r| r.operation)
    }
}

/// What one candidate turns into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityPlan {
    Standalone(CandidateEntity),
    PowerDelegated {
        primary: CandidateEntity,
        companion: CandidateEntity,
    },
}

/// Entities and variables produced from one candidate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledUnit {
    pub entities: Vec<CompiledEntity>,
    pub variables: Vec<StateVariable>,
}

/// Id of a media player's companion switch
pub fn companion_id(primary: &EntityId) -> SynthResult<EntityId> {
    let suffix = format!("_{}", EntityType::MediaPlayer.as_str());
    let base = primary
        .object_id()
        .strip_suffix(suffix.as_str())
        .filter(|base| !base.is_empty())
        .unwrap_or(primary.object_id());
    Ok(EntityId::new(EntityType::Switch.as_str(), format!("{base}_power"))?)
}

/// Split a media player with power commands into player and companion
pub fn plan(candidate: CandidateEntity) -> SynthResult<EntityPlan> {
    if candidate.entity_type != EntityType::MediaPlayer {
        return Ok(EntityPlan::Standalone(candidate));
    }

    let companion_roles = [
        (role::TURN_ON, role::TURN_ON),
        (role::TURN_OFF, role::TURN_OFF),
        (role::POWER, role::TOGGLE),
    ]
    .into_iter()
    .filter_map(|(from, to)| {
        candidate
            .command(from)
            .map(|command| (to.to_string(), command.to_string()))
    })
    .collect();

    if !is_valid(EntityType::Switch, &companion_roles) {
        return Ok(EntityPlan::Standalone(candidate));
    }

    let companion = CandidateEntity {
        entity_id: companion_id(&candidate.entity_id)?,
        entity_type: EntityType::Switch,
        device_name: candidate.device_name.clone(),
        roles: companion_roles,
        friendly_name: format!("{} Power", candidate.friendly_name),
        area: candidate.area.clone(),
        icon: Some(COMPANION_ICON.to_string()),
        controller: candidate.controller.clone(),
        enabled: candidate.enabled,
    };
    Ok(EntityPlan::PowerDelegated {
        primary: candidate,
        companion,
    })
}

/// Everything a rule builder needs about one entity
struct Ctx<'a> {
    entity: &'a CandidateEntity,
    controller: &'a EntityId,
    model: &'a StateModel,
}

impl<'a> Ctx<'a> {
    fn send(&self, command: &str) -> Step {
        Step::dispatch(CommandRef {
            controller: self.controller.clone(),
            device: self.entity.device_name.clone(),
            command: command.to_string(),
        })
    }

    /// Dispatch of the command mapped to a role
    fn dispatch(&self, role_name: &str) -> Option<Step> {
        self.entity.command(role_name).map(|command| self.send(command))
    }

    fn var(&self, name: VarName) -> SynthResult<&'a EntityId> {
        match self.model.id(name) {
            Some(id) => Ok(id),
            None => Err(SynthError::DanglingVariable {
                entity: self.entity.entity_id.clone(),
                variable: variable_id(&self.entity.entity_id, name)?,
            }),
        }
    }

    fn optional_var(&self, name: VarName) -> Option<&'a EntityId> {
        self.model.id(name)
    }
}

fn when(conditions: Vec<Condition>, sequence: Vec<Step>) -> ChooseOption {
    ChooseOption::when(conditions, sequence)
}

fn at_most(parameter: &str, threshold: f64) -> Condition {
    Condition::ParameterAtMost {
        parameter: parameter.to_string(),
        threshold,
    }
}

fn param(operation: Operation) -> &'static str {
    operation.parameter().unwrap_or_default()
}

/// Rules that only dispatch a single command, for the roles present
fn dispatch_rules(ctx: &Ctx<'_>, table: &[(Operation, &str)]) -> Vec<ActionRule> {
    table
        .iter()
        .filter_map(|(operation, role_name)| {
            ctx.dispatch(role_name)
                .map(|step| ActionRule::new(*operation, vec![step]))
        })
        .collect()
}

/// turn_on, turn_off and toggle over a boolean `state`.
///
/// Missing direct commands fall back to a state-guarded toggle, a missing
/// toggle to a state-guarded on/off.
fn power_rules(ctx: &Ctx<'_>) -> SynthResult<Vec<ActionRule>> {
    let state = ctx.var(VarName::State)?;
    let toggle = ctx.dispatch(role::TOGGLE);

    let switch_to = |target: bool, direct: Option<Step>| -> Vec<Step> {
        let mut steps = Vec::new();
        match (direct, &toggle) {
            (Some(step), _) => steps.push(step),
            (None, Some(toggle)) => steps.push(Step::choose(
                vec![when(
                    vec![Condition::state_is(state, !target)],
                    vec![toggle.clone()],
                )],
                vec![],
            )),
            (None, None) => {}
        }
        steps.push(Step::set(state, target));
        steps
    };

    let turn_on = switch_to(true, ctx.dispatch(role::TURN_ON));
    let turn_off = switch_to(false, ctx.dispatch(role::TURN_OFF));
    let toggle_steps = match &toggle {
        Some(step) => vec![
            step.clone(),
            Step::update(
                state,
                ValueExpr::Flip {
                    variable: state.clone(),
                    first: true.into(),
                    second: false.into(),
                },
            ),
        ],
        None => vec![Step::choose(
            vec![when(vec![Condition::state_is(state, true)], turn_off.clone())],
            turn_on.clone(),
        )],
    };

    Ok(vec![
        ActionRule::new(Operation::TurnOn, turn_on),
        ActionRule::new(Operation::TurnOff, turn_off),
        ActionRule::new(Operation::Toggle, toggle_steps),
    ])
}

/// Step a stored level toward a requested value with up/down commands
fn level_rule(
    ctx: &Ctx<'_>,
    operation: Operation,
    variable: &EntityId,
    raise: &str,
    lower: &str,
) -> ActionRule {
    let parameter = param(operation);
    let mut options = Vec::new();
    if let Some(step) = ctx.dispatch(raise) {
        options.push(when(
            vec![Condition::ParameterAbove {
                parameter: parameter.to_string(),
                variable: variable.clone(),
            }],
            vec![step],
        ));
    }
    if let Some(step) = ctx.dispatch(lower) {
        options.push(when(
            vec![Condition::ParameterBelow {
                parameter: parameter.to_string(),
                variable: variable.clone(),
            }],
            vec![step],
        ));
    }
    ActionRule::new(
        operation,
        vec![
            Step::choose(options, vec![]),
            Step::update(variable, ValueExpr::parameter(parameter)),
        ],
    )
}

fn light_rules(ctx: &Ctx<'_>) -> SynthResult<Vec<ActionRule>> {
    let mut rules = power_rules(ctx)?;
    if let Some(brightness) = ctx.optional_var(VarName::Brightness) {
        rules.push(level_rule(
            ctx,
            Operation::SetBrightness,
            brightness,
            role::BRIGHTNESS_UP,
            role::BRIGHTNESS_DOWN,
        ));
    }
    // Mireds grow toward warm light
    if let Some(color_temp) = ctx.optional_var(VarName::ColorTemp) {
        rules.push(level_rule(
            ctx,
            Operation::SetColorTemperature,
            color_temp,
            role::WARMER,
            role::COOLER,
        ));
    }
    Ok(rules)
}

fn fan_rules(ctx: &Ctx<'_>, ladder: &SpeedLadder) -> SynthResult<Vec<ActionRule>> {
    let speed = ctx.var(VarName::Speed)?;
    let direction = ctx.var(VarName::Direction)?;
    let lowest_rank = ladder
        .lowest()
        .map(|step| step.rank.to_string())
        .unwrap_or_else(|| SPEED_OFF.to_string());

    let speed_steps = |step: &SpeedStep| -> Vec<Step> {
        let mut steps: Vec<Step> = step.command.as_deref().map(|c| ctx.send(c)).into_iter().collect();
        steps.push(Step::set(speed, step.rank.to_string()));
        steps
    };

    // Without an off command the lowest speed command stands in for it
    let off_dispatch = ctx.dispatch(role::TURN_OFF).or_else(|| {
        ladder
            .lowest()
            .and_then(|step| step.command.as_deref())
            .map(|command| ctx.send(command))
    });
    let off_steps: Vec<Step> = off_dispatch
        .into_iter()
        .chain(std::iter::once(Step::set(speed, SPEED_OFF)))
        .collect();

    let resume_lowest = || {
        Step::choose(
            vec![when(
                vec![Condition::state_is(speed, SPEED_OFF)],
                vec![Step::set(speed, lowest_rank.clone())],
            )],
            vec![],
        )
    };

    let on_steps = match ctx.dispatch(role::TURN_ON) {
        Some(step) => vec![step, resume_lowest()],
        None => ladder.lowest().map(|step| speed_steps(step)).unwrap_or_default(),
    };

    let toggle_steps = match ctx.dispatch(role::TOGGLE) {
        Some(step) => vec![
            step,
            Step::choose(
                vec![when(
                    vec![Condition::state_is(speed, SPEED_OFF)],
                    vec![Step::set(speed, lowest_rank.clone())],
                )],
                vec![Step::set(speed, SPEED_OFF)],
            ),
        ],
        None => vec![Step::choose(
            vec![when(
                vec![Condition::state_is(speed, SPEED_OFF)],
                on_steps.clone(),
            )],
            off_steps.clone(),
        )],
    };

    let percentage = param(Operation::SetSpeed);
    let mut options = vec![when(vec![at_most(percentage, 0.0)], off_steps.clone())];
    let rungs: Vec<(f64, &SpeedStep)> = ladder.thresholds().collect();
    let default = match rungs.split_last() {
        Some(((_, last), rest)) => {
            options.extend(
                rest.iter()
                    .map(|(threshold, step)| when(vec![at_most(percentage, *threshold)], speed_steps(*step))),
            );
            speed_steps(*last)
        }
        None => Vec::new(),
    };

    let direction_steps: Vec<Step> = ctx
        .dispatch(role::REVERSE)
        .into_iter()
        .chain(std::iter::once(Step::update(
            direction,
            ValueExpr::Flip {
                variable: direction.clone(),
                first: DIRECTION_FORWARD.into(),
                second: DIRECTION_REVERSE.into(),
            },
        )))
        .collect();

    let mut rules = vec![
        ActionRule::new(Operation::TurnOn, on_steps),
        ActionRule::new(Operation::TurnOff, off_steps),
        ActionRule::new(Operation::Toggle, toggle_steps),
        ActionRule::new(Operation::SetSpeed, vec![Step::choose(options, default)]),
        ActionRule::new(Operation::SetDirection, direction_steps),
    ];
    rules.extend(dispatch_rules(ctx, &[(Operation::Oscillate, role::OSCILLATE)]));
    Ok(rules)
}

fn media_rules(ctx: &Ctx<'_>, companion: Option<&EntityId>) -> SynthResult<Vec<ActionRule>> {
    let mut rules: Vec<ActionRule> = match companion {
        Some(companion) => [Operation::TurnOn, Operation::TurnOff, Operation::Toggle]
            .into_iter()
            .map(|op| ActionRule::new(op, vec![Step::delegate(companion, op)]))
            .collect(),
        None => dispatch_rules(
            ctx,
            &[
                (Operation::TurnOn, role::TURN_ON),
                (Operation::TurnOff, role::TURN_OFF),
                (Operation::Toggle, role::POWER),
            ],
        ),
    };
    rules.extend(dispatch_rules(ctx, MEDIA_DISPATCH));

    if let Some(source) = ctx.optional_var(VarName::Source) {
        let parameter = param(Operation::SelectSource);
        let options = ctx
            .entity
            .roles_with_prefix(role::SOURCE_PREFIX)
            .filter_map(|(role_name, command)| {
                role::source_name(role_name).map(|name| {
                    when(
                        vec![Condition::ParameterIs {
                            parameter: parameter.to_string(),
                            value: name.into(),
                        }],
                        vec![ctx.send(command), Step::set(source, name)],
                    )
                })
            })
            .collect();
        rules.push(ActionRule::new(
            Operation::SelectSource,
            vec![Step::choose(options, vec![])],
        ));
    }
    Ok(rules)
}

fn position_name(value: u8) -> &'static str {
    match value {
        0 => POSITION_CLOSED,
        100 => POSITION_OPEN,
        _ => POSITION_PARTIAL,
    }
}

fn cover_rules(ctx: &Ctx<'_>) -> SynthResult<Vec<ActionRule>> {
    let position = ctx.var(VarName::Position)?;
    let level = ctx.optional_var(VarName::PositionLevel);

    let move_to = |value: u8| -> Vec<Step> {
        let mut steps = vec![Step::set(position, position_name(value))];
        if let Some(level) = level {
            steps.push(Step::set(level, f64::from(value)));
        }
        steps
    };

    let mut rules = Vec::new();
    for (operation, role_name, value) in [
        (Operation::Open, role::OPEN, 100),
        (Operation::Close, role::CLOSE, 0),
    ] {
        if let Some(step) = ctx.dispatch(role_name) {
            let mut steps = vec![step];
            steps.extend(move_to(value));
            rules.push(ActionRule::new(operation, steps));
        }
    }
    rules.extend(dispatch_rules(
        ctx,
        &[
            (Operation::Stop, role::STOP),
            (Operation::OpenTilt, role::OPEN_TILT),
            (Operation::CloseTilt, role::CLOSE_TILT),
        ],
    ));

    if level.is_some() {
        let ladder = PositionLadder::from_entity(ctx.entity);
        let parameter = param(Operation::SetPosition);
        let stop_steps = |(value, command): &(u8, String)| -> Vec<Step> {
            let mut steps = vec![ctx.send(command)];
            steps.extend(move_to(*value));
            steps
        };
        if let Some((last, rest)) = ladder.stops().split_last() {
            let options = rest
                .iter()
                .map(|stop| when(vec![at_most(parameter, f64::from(stop.0))], stop_steps(stop)))
                .collect();
            rules.push(ActionRule::new(
                Operation::SetPosition,
                vec![Step::choose(options, stop_steps(last))],
            ));
        }
    }
    Ok(rules)
}

fn button_rules(ctx: &Ctx<'_>) -> Vec<ActionRule> {
    dispatch_rules(ctx, &[(Operation::Press, role::PRESS)])
}

fn compile_one(
    entity: CandidateEntity,
    shape: EntityShape,
) -> SynthResult<(CompiledEntity, Vec<StateVariable>)> {
    let controller = entity
        .controller
        .clone()
        .ok_or_else(|| SynthError::MissingController(entity.entity_id.clone()))?;
    let model = generate(&entity)?;
    let ctx = Ctx {
        entity: &entity,
        controller: &controller,
        model: &model,
    };

    let mut speed_count = None;
    let rules = match (entity.entity_type, &shape) {
        (EntityType::Light, _) => light_rules(&ctx)?,
        (EntityType::Switch, _) => power_rules(&ctx)?,
        (EntityType::Fan, _) => {
            let ladder = SpeedLadder::from_entity(&entity);
            speed_count = Some(ladder.speed_count());
            fan_rules(&ctx, &ladder)?
        }
        (EntityType::MediaPlayer, EntityShape::PowerDelegated { companion }) => {
            media_rules(&ctx, Some(companion))?
        }
        (EntityType::MediaPlayer, _) => media_rules(&ctx, None)?,
        (EntityType::Cover, _) => cover_rules(&ctx)?,
        (EntityType::Button, _) => button_rules(&ctx),
    };
    let rules: Vec<ActionRule> = rules.into_iter().filter(|r| !r.steps.is_empty()).collect();

    debug!(
        "Compiled {} with {} rules and {} state variables",
        entity.entity_id,
        rules.len(),
        model.variables().len()
    );

    let state_variables = model.variables().iter().map(|v| v.id.clone()).collect();
    let compiled = CompiledEntity {
        entity,
        shape,
        speed_count,
        state_variables,
        rules,
    };
    Ok((compiled, model.into_variables()))
}

/// Compile one candidate into its entities and state variables
pub fn compile_entity(candidate: CandidateEntity) -> SynthResult<CompiledUnit> {
    let parts = match plan(candidate)? {
        EntityPlan::Standalone(entity) => vec![compile_one(entity, EntityShape::Standalone)?],
        EntityPlan::PowerDelegated { primary, companion } => {
            let primary_shape = EntityShape::PowerDelegated {
                companion: companion.entity_id.clone(),
            };
            let companion_shape = EntityShape::PowerCompanion {
                primary: primary.entity_id.clone(),
            };
            vec![
                compile_one(primary, primary_shape)?,
                compile_one(companion, companion_shape)?,
            ]
        }
    };

    Ok(parts.into_iter().fold(
        CompiledUnit::default(),
        |mut unit, (entity, variables)| {
            unit.entities.push(entity);
            unit.variables.extend(variables);
            unit
        },
    ))
}

/// Id of the button exposing one raw command
pub fn button_id(device: &str, command: &str) -> SynthResult<EntityId> {
    Ok(EntityId::new(
        EntityType::Button.as_str(),
        slugify(&format!("{device}_{command}")),
    )?)
}

/// A stateless button that dispatches one raw command
pub fn compile_button(
    device: &str,
    command: &str,
    controller: EntityId,
    area: Option<String>,
    vocabulary: &Vocabulary,
) -> SynthResult<CompiledEntity> {
    let entity = CandidateEntity {
        entity_id: button_id(device, command)?,
        entity_type: EntityType::Button,
        device_name: device.to_string(),
        roles: [(role::PRESS.to_string(), command.to_string())].into_iter().collect(),
        friendly_name: format!(
            "{} {}",
            display_name(device, vocabulary),
            display_name(command, vocabulary)
        ),
        area,
        icon: Some(default_icon(EntityType::Button).to_string()),
        controller: Some(controller),
        enabled: true,
    };
    let (button, _) = compile_one(entity, EntityShape::Button)?;
    Ok(button)
}
