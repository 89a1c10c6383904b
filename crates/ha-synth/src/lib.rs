//! Virtual entity synthesis for learned IR/RF remotes
//!
//! Learned remote commands carry nothing but a name and an opaque code. This
//! crate turns a table of them into typed entities (lights, fans, switches,
//! media players, covers and buttons), gives each one synthetic state to
//! remember what was last asked of it, and compiles every operation the
//! entity supports into a rule that dispatches raw commands and updates that
//! state.
//!
//! A pass runs in five stages:
//!
//! 1. [`classifier`] maps each command name to an entity type and role
//! 2. [`synthesizer`] groups classified commands per device into candidates
//! 3. [`state_model`] decides the helper variables each candidate needs
//! 4. [`compiler`] turns each candidate into action rules
//! 5. [`assembler`] groups the result into one [`OutputDocument`]
//!
//! Commands no entity consumed become stateless buttons.
//!
//! # Example
//!
//! ```ignore
//! use ha_config::SynthConfig;
//! use ha_synth::{compile, CompileInput};
//!
//! let input = CompileInput::new(load_document("codes.json")?);
//! let compilation = compile(&input, &SynthConfig::load("synth.yaml")?)?;
//! println!("{} entities", compilation.report.total_entities);
//! ```

pub mod assembler;
pub mod classifier;
pub mod compiler;
mod error;
pub mod eval;
mod input;
pub mod ladder;
pub mod naming;
pub mod report;
pub mod role;
pub mod rule;
pub mod state_model;
pub mod synthesizer;

pub use assembler::OutputDocument;
pub use classifier::{classify, ClassifiedCommand};
pub use compiler::{CompiledEntity, EntityShape};
pub use error::{SynthError, SynthResult};
pub use eval::{execute, EntityState, EvalError};
pub use input::{CommandTable, CompileInput, EntityMetadata, RawCommand};
pub use naming::Vocabulary;
pub use report::{GenerationReport, SkipReason, SkippedEntity};
pub use rule::{ActionRule, CommandRef, Operation, Step};
pub use state_model::{StateValue, StateVariable};
pub use synthesizer::CandidateEntity;

use ha_config::SynthConfig;
use ha_core::{EntityId, EntityType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::compiler::{button_id, compile_button, compile_entity};
use crate::naming::derive_area;
use crate::synthesizer::{resolve_controller, synthesize};

/// Result of a generation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compilation {
    pub document: OutputDocument,
    pub report: GenerationReport,
}

/// Run a full generation pass.
///
/// Entities that cannot be built are skipped and listed in the report. An
/// error means the assembled document broke one of its own invariants.
pub fn compile(input: &CompileInput, config: &SynthConfig) -> SynthResult<Compilation> {
    let vocabulary = Vocabulary::from_config(config);
    let synthesis = synthesize(input, config, &vocabulary);

    let mut report = GenerationReport {
        skipped: synthesis.skipped,
        warnings: synthesis.warnings,
        ..GenerationReport::default()
    };

    // Companions and helper variables derive their ids from the owner, so two
    // candidates can still land on the same id. The later one is dropped and
    // its commands fall through to buttons.
    let mut taken: BTreeSet<EntityId> = synthesis
        .candidates
        .iter()
        .map(|c| c.entity_id.clone())
        .collect();
    let mut variable_ids: BTreeSet<EntityId> = BTreeSet::new();
    let mut entities = Vec::new();
    let mut variables = Vec::new();
    for candidate in synthesis.candidates {
        let primary = candidate.entity_id.clone();
        let device = candidate.device_name.clone();
        let entity_type = candidate.entity_type;
        let unit = compile_entity(candidate)?;

        let clash = unit
            .entities
            .iter()
            .map(CompiledEntity::entity_id)
            .find(|id| **id != primary && taken.contains(*id))
            .or_else(|| {
                unit.variables
                    .iter()
                    .map(|v| &v.id)
                    .find(|id| variable_ids.contains(*id))
            });
        if let Some(id) = clash {
            warn!("Skipping {}: {} is already taken", primary, id);
            report
                .warnings
                .push(format!("{primary}: {id} is already taken"));
            report.skipped.push(
                SkippedEntity::new(device, SkipReason::DuplicateId)
                    .with_entity(Some(primary), entity_type),
            );
            continue;
        }

        taken.extend(unit.entities.iter().map(|e| e.entity_id().clone()));
        variable_ids.extend(unit.variables.iter().map(|v| v.id.clone()));
        entities.extend(unit.entities);
        variables.extend(unit.variables);
    }

    let mut consumed = synthesis.reserved;
    consumed.extend(entities.iter().flat_map(|entity| {
        entity
            .rules
            .iter()
            .flat_map(|rule| rule.dispatched_commands())
            .map(|command| (command.device.clone(), command.command.clone()))
    }));

    if config.emit_buttons {
        for raw in input.raw_commands() {
            if consumed.contains(&(raw.device.to_string(), raw.command.to_string())) {
                continue;
            }
            let skip = |reason: SkipReason, id: Option<EntityId>| {
                SkippedEntity::new(raw.device, reason).with_entity(id, EntityType::Button)
            };

            let id = match button_id(raw.device, raw.command) {
                Ok(id) => id,
                Err(e) => {
                    report.skipped.push(skip(
                        SkipReason::InvalidId {
                            message: e.to_string(),
                        },
                        None,
                    ));
                    continue;
                }
            };
            if !taken.insert(id.clone()) {
                warn!("Skipping button {}: id already taken", id);
                report.skipped.push(skip(SkipReason::DuplicateId, Some(id)));
                continue;
            }

            let requested = input
                .metadata_for_device(raw.device)
                .find_map(|(_, meta)| meta.controller.as_deref());
            let controller = match resolve_controller(requested, raw.device, config) {
                Ok(controller) => controller,
                Err(reason) => {
                    warn!("Skipping button {}: {}", id, reason);
                    report.skipped.push(skip(reason, Some(id)));
                    continue;
                }
            };
            let area = input
                .metadata_for_device(raw.device)
                .find_map(|(_, meta)| meta.area.clone())
                .or_else(|| derive_area(raw.device, &vocabulary));

            debug!("Exposing {}/{} as {}", raw.device, raw.command, id);
            entities.push(compile_button(
                raw.device,
                raw.command,
                controller,
                area,
                &vocabulary,
            )?);
        }
    }

    let document = OutputDocument::assemble(entities, variables);
    document.verify()?;
    document.summarize(&mut report);

    info!(
        "Generated {} entities and {} state variables from {} devices ({} skipped)",
        report.total_entities,
        document.variable_count(),
        input.commands.len(),
        report.skipped.len()
    );
    Ok(Compilation { document, report })
}
