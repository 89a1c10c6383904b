//! Reference evaluator for compiled rules
//!
//! Runs an operation against an in-memory copy of the synthetic state and
//! returns the commands a runtime would transmit. Delegation is followed
//! into the target entity.

use ha_core::EntityId;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::trace;

use crate::assembler::OutputDocument;
use crate::rule::{CommandRef, Condition, Operation, Step, ValueExpr};
use crate::state_model::StateValue;

/// Delegation chains longer than this are treated as a loop
const MAX_DELEGATION_DEPTH: usize = 4;

/// Errors raised while evaluating a rule
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    #[error("{entity} has no handler for {operation}")]
    UnknownOperation { entity: EntityId, operation: Operation },

    #[error("{operation} needs a value for '{parameter}'")]
    MissingParameter { operation: Operation, parameter: String },

    #[error("unknown state variable {0}")]
    UnknownVariable(EntityId),

    #[error("delegation from {0} does not terminate")]
    DelegationLoop(EntityId),
}

/// Current values of every state variable in a document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityState {
    values: BTreeMap<EntityId, StateValue>,
}

impl EntityState {
    /// Every variable at its declared initial value
    pub fn initial(document: &OutputDocument) -> Self {
        Self {
            values: document
                .variables()
                .map(|v| (v.id.clone(), v.initial.clone()))
                .collect(),
        }
    }

    pub fn get(&self, variable: &EntityId) -> Option<&StateValue> {
        self.values.get(variable)
    }

    fn current(&self, variable: &EntityId) -> Result<&StateValue, EvalError> {
        self.values
            .get(variable)
            .ok_or_else(|| EvalError::UnknownVariable(variable.clone()))
    }

    fn number(&self, variable: &EntityId) -> Result<f64, EvalError> {
        self.current(variable)?
            .as_f64()
            .ok_or_else(|| EvalError::UnknownVariable(variable.clone()))
    }
}

/// One invocation being evaluated
struct Call<'a> {
    document: &'a OutputDocument,
    operation: Operation,
    parameter: Option<&'a StateValue>,
}

impl Call<'_> {
    fn parameter(&self) -> Result<&StateValue, EvalError> {
        self.parameter.ok_or_else(|| EvalError::MissingParameter {
            operation: self.operation,
            parameter: self.operation.parameter().unwrap_or("value").to_string(),
        })
    }

    fn parameter_number(&self) -> Result<f64, EvalError> {
        self.parameter()?
            .as_f64()
            .ok_or_else(|| EvalError::MissingParameter {
                operation: self.operation,
                parameter: self.operation.parameter().unwrap_or("value").to_string(),
            })
    }

    fn holds(&self, condition: &Condition, state: &EntityState) -> Result<bool, EvalError> {
        Ok(match condition {
            Condition::StateIs { variable, value } => state.current(variable)? == value,
            Condition::ParameterAtMost { threshold, .. } => self.parameter_number()? <= *threshold,
            Condition::ParameterAbove { variable, .. } => {
                self.parameter_number()? > state.number(variable)?
            }
            Condition::ParameterBelow { variable, .. } => {
                self.parameter_number()? < state.number(variable)?
            }
            Condition::ParameterIs { value, .. } => self.parameter()? == value,
        })
    }

    fn value(&self, expr: &ValueExpr, state: &EntityState) -> Result<StateValue, EvalError> {
        match expr {
            ValueExpr::Literal { value } => Ok(value.clone()),
            ValueExpr::Parameter { .. } => self.parameter().cloned(),
            ValueExpr::Flip {
                variable,
                first,
                second,
            } => Ok(if state.current(variable)? == first {
                second.clone()
            } else {
                first.clone()
            }),
        }
    }

    fn run(
        &self,
        steps: &[Step],
        state: &mut EntityState,
        sent: &mut Vec<CommandRef>,
        depth: usize,
    ) -> Result<(), EvalError> {
        for step in steps {
            match step {
                Step::Dispatch(command) => {
                    trace!("dispatch {}", command);
                    sent.push(command.clone());
                }
                Step::StateUpdate(update) => {
                    let value = self.value(&update.value, state)?;
                    state.current(&update.variable)?;
                    state.values.insert(update.variable.clone(), value);
                }
                Step::Choose(choose) => {
                    let mut chosen = None;
                    for option in &choose.choose {
                        let mut all = true;
                        for condition in &option.conditions {
                            if !self.holds(condition, state)? {
                                all = false;
                                break;
                            }
                        }
                        if all {
                            chosen = Some(&option.sequence);
                            break;
                        }
                    }
                    self.run(chosen.unwrap_or(&choose.default), state, sent, depth)?;
                }
                Step::Delegate(delegate) => {
                    if depth >= MAX_DELEGATION_DEPTH {
                        return Err(EvalError::DelegationLoop(delegate.entity_id.clone()));
                    }
                    let call = Call {
                        document: self.document,
                        operation: delegate.operation,
                        parameter: self.parameter,
                    };
                    let target = rule_steps(self.document, &delegate.entity_id, delegate.operation)?;
                    call.run(target, state, sent, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

fn rule_steps<'a>(
    document: &'a OutputDocument,
    entity_id: &EntityId,
    operation: Operation,
) -> Result<&'a [Step], EvalError> {
    let entity = document
        .entity(entity_id)
        .ok_or_else(|| EvalError::UnknownEntity(entity_id.clone()))?;
    entity
        .rule(operation)
        .map(|rule| rule.steps.as_slice())
        .ok_or_else(|| EvalError::UnknownOperation {
            entity: entity_id.clone(),
            operation,
        })
}

/// Run one operation, applying its state updates and returning the
/// commands it dispatches in order
pub fn execute(
    document: &OutputDocument,
    state: &mut EntityState,
    entity_id: &EntityId,
    operation: Operation,
    parameter: Option<StateValue>,
) -> Result<Vec<CommandRef>, EvalError> {
    let steps = rule_steps(document, entity_id, operation)?;
    let call = Call {
        document,
        operation,
        parameter: parameter.as_ref(),
    };
    let mut sent = Vec::new();
    call.run(steps, state, &mut sent, 0)?;
    Ok(sent)
}
