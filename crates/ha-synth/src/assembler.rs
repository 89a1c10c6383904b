//! Output assembly
//!
//! Collects compiled entities into one group per type and state variables
//! into one group per kind. Groups are ordered by id so a document
//! serializes identically for identical input.

use ha_core::{EntityId, EntityType, StateKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::compiler::CompiledEntity;
use crate::error::{SynthError, SynthResult};
use crate::report::GenerationReport;
use crate::state_model::StateVariable;

/// The generated entity set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputDocument {
    pub entities_by_type: BTreeMap<EntityType, Vec<CompiledEntity>>,
    pub state_variables_by_kind: BTreeMap<StateKind, Vec<StateVariable>>,
}

impl OutputDocument {
    /// Group entities and variables. Order of the inputs does not matter.
    pub fn assemble(
        entities: impl IntoIterator<Item = CompiledEntity>,
        variables: impl IntoIterator<Item = StateVariable>,
    ) -> Self {
        let mut entities_by_type: BTreeMap<EntityType, Vec<CompiledEntity>> = BTreeMap::new();
        for entity in entities {
            entities_by_type
                .entry(entity.entity_type())
                .or_default()
                .push(entity);
        }
        for group in entities_by_type.values_mut() {
            group.sort_by(|a, b| a.entity_id().cmp(b.entity_id()));
        }

        let mut state_variables_by_kind: BTreeMap<StateKind, Vec<StateVariable>> = BTreeMap::new();
        for variable in variables {
            state_variables_by_kind
                .entry(variable.kind)
                .or_default()
                .push(variable);
        }
        for group in state_variables_by_kind.values_mut() {
            group.sort_by(|a, b| a.id.cmp(&b.id));
        }

        Self {
            entities_by_type,
            state_variables_by_kind,
        }
    }

    /// Every entity, grouped by type then ordered by id
    pub fn entities(&self) -> impl Iterator<Item = &CompiledEntity> {
        self.entities_by_type.values().flatten()
    }

    /// Every state variable, grouped by kind then ordered by id
    pub fn variables(&self) -> impl Iterator<Item = &StateVariable> {
        self.state_variables_by_kind.values().flatten()
    }

    pub fn entity(&self, entity_id: &EntityId) -> Option<&CompiledEntity> {
        self.entities_by_type
            .get(&entity_type_of(entity_id)?)?
            .iter()
            .find(|e| e.entity_id() == entity_id)
    }

    pub fn variable(&self, id: &EntityId) -> Option<&StateVariable> {
        self.variables().find(|v| &v.id == id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities_by_type.values().map(Vec::len).sum()
    }

    pub fn variable_count(&self) -> usize {
        self.state_variables_by_kind.values().map(Vec::len).sum()
    }

    /// Check that ids are unique and that every rule reference resolves
    pub fn verify(&self) -> SynthResult<()> {
        let mut entity_ids = BTreeSet::new();
        for entity in self.entities() {
            if !entity_ids.insert(entity.entity_id()) {
                return Err(SynthError::DuplicateEntity(entity.entity_id().clone()));
            }
        }

        let mut variable_ids = BTreeSet::new();
        for variable in self.variables() {
            if !variable_ids.insert(&variable.id) {
                return Err(SynthError::DuplicateVariable(variable.id.clone()));
            }
        }

        for entity in self.entities() {
            for rule in &entity.rules {
                if let Some(variable) = rule
                    .referenced_variables()
                    .into_iter()
                    .find(|v| !variable_ids.contains(v))
                {
                    return Err(SynthError::DanglingVariable {
                        entity: entity.entity_id().clone(),
                        variable: variable.clone(),
                    });
                }
                if let Some(delegate) = rule
                    .delegates()
                    .into_iter()
                    .find(|d| !entity_ids.contains(&d.entity_id))
                {
                    return Err(SynthError::DanglingDelegate {
                        entity: entity.entity_id().clone(),
                        target: delegate.entity_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Counts for the report
    pub fn summarize(&self, report: &mut GenerationReport) {
        report.total_entities = self.entity_count();
        report.per_type = self
            .entities_by_type
            .iter()
            .map(|(ty, group)| (*ty, group.len()))
            .collect();
        report.state_variables = self
            .state_variables_by_kind
            .iter()
            .map(|(kind, group)| (*kind, group.len()))
            .collect();
    }
}

fn entity_type_of(entity_id: &EntityId) -> Option<EntityType> {
    entity_id.domain().parse().ok()
}
