//! Entity synthesis
//!
//! Turns a device's classified commands into candidate entities. [`group`]
//! handles one device with no outside knowledge; [`synthesize`] runs it
//! over the whole command table and merges in stored metadata, resolves
//! controllers and records every skipped entity.

use ha_config::SynthConfig;
use ha_core::{slugify, EntityId, EntityType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::classifier::{classify, ClassifiedCommand};
use crate::input::{CompileInput, EntityMetadata};
use crate::naming::{derive_area, friendly_name, Vocabulary};
use crate::report::{SkipReason, SkippedEntity};
use crate::role;

/// An entity before its state model and rules are compiled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEntity {
    pub entity_id: EntityId,
    pub entity_type: EntityType,
    pub device_name: String,
    /// Role to command name
    pub roles: BTreeMap<String, String>,
    pub friendly_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Transmitter the commands go through, resolved by [`synthesize`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<EntityId>,
    pub enabled: bool,
}

impl CandidateEntity {
    /// Command mapped to a role
    pub fn command(&self, role: &str) -> Option<&str> {
        self.roles.get(role).map(String::as_str)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }

    /// Roles whose name starts with a prefix, in role order
    pub fn roles_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.roles
            .iter()
            .filter(move |(role, _)| role.starts_with(prefix))
            .map(|(role, command)| (role.as_str(), command.as_str()))
    }
}

/// Default icon for an entity type
pub fn default_icon(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Light => "mdi:lightbulb",
        EntityType::Fan => "mdi:fan",
        EntityType::Switch => "mdi:toggle-switch",
        EntityType::MediaPlayer => "mdi:television",
        EntityType::Cover => "mdi:window-shutter",
        EntityType::Button => "mdi:remote",
    }
}

/// Whether a role set satisfies the minimum roles of its type
pub fn is_valid(entity_type: EntityType, roles: &BTreeMap<String, String>) -> bool {
    let has = |role: &str| roles.contains_key(role);
    let on_off = has(role::TURN_ON) && has(role::TURN_OFF);
    match entity_type {
        EntityType::Light | EntityType::Switch => on_off || has(role::TOGGLE),
        EntityType::Fan => {
            has(role::TURN_OFF) || roles.keys().any(|r| role::speed_rank(r).is_some())
        }
        EntityType::MediaPlayer => {
            has(role::POWER) || on_off || has(role::VOLUME_UP) || has(role::VOLUME_DOWN)
        }
        EntityType::Cover => has(role::OPEN) || has(role::CLOSE),
        EntityType::Button => has(role::PRESS),
    }
}

/// Object id for a device's entity of one type. The type name is appended
/// unless the device slug already contains it.
pub fn entity_slug(device_name: &str, entity_type: EntityType) -> String {
    let slug = slugify(device_name);
    let type_name = entity_type.as_str();
    if slug.contains(type_name) {
        slug
    } else {
        format!("{slug}_{type_name}")
    }
}

/// Two commands of one device mapped to the same role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRole {
    pub entity_type: EntityType,
    pub role: String,
    pub kept: String,
    pub dropped: String,
}

/// Result of grouping one device's commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grouping {
    pub entities: BTreeMap<EntityId, CandidateEntity>,
    /// Type buckets that failed the minimum-role check
    pub rejected: Vec<SkippedEntity>,
    pub duplicates: Vec<DuplicateRole>,
    /// Commands no rule matched, in name order
    pub unclassified: Vec<String>,
}

/// Per-type role maps built up one command at a time.
///
/// Each step consumes the accumulator and returns the next one.
#[derive(Debug, Clone, Default)]
struct RoleBuckets {
    buckets: BTreeMap<EntityType, BTreeMap<String, String>>,
    duplicates: Vec<DuplicateRole>,
    unclassified: Vec<String>,
}

impl RoleBuckets {
    fn with(mut self, entity_type: EntityType, role: String, command: &str) -> Self {
        let bucket = self.buckets.entry(entity_type).or_default();
        match bucket.get(&role) {
            Some(kept) => self.duplicates.push(DuplicateRole {
                entity_type,
                role,
                kept: kept.clone(),
                dropped: command.to_string(),
            }),
            None => {
                bucket.insert(role, command.to_string());
            }
        }
        self
    }

    fn with_unclassified(mut self, command: &str) -> Self {
        self.unclassified.push(command.to_string());
        self
    }
}

/// Type a generic command lands on for a device whose primary type is known
fn retarget(classified: ClassifiedCommand, primary: Option<EntityType>) -> (EntityType, String) {
    let ClassifiedCommand {
        entity_type,
        role: role_name,
        generic,
    } = classified;
    let Some(primary) = primary.filter(|_| generic) else {
        return (entity_type, role_name);
    };

    let mapped = if primary == EntityType::MediaPlayer && role_name == role::TOGGLE {
        role::POWER.to_string()
    } else {
        role_name.clone()
    };
    if role::is_known(primary, &mapped) {
        (primary, mapped)
    } else {
        (entity_type, role_name)
    }
}

/// Primary type of a device: a typed word in its name, else the one
/// specific type its commands classified into
fn primary_type(
    device_name: &str,
    classified: &[(&str, ClassifiedCommand)],
    vocabulary: &Vocabulary,
) -> Option<EntityType> {
    if let Some(ty) = vocabulary.primary_type(device_name) {
        return Some(ty);
    }
    let specific: BTreeSet<EntityType> = classified
        .iter()
        .filter(|(_, c)| !c.generic)
        .map(|(_, c)| c.entity_type)
        .collect();
    match specific.len() {
        1 => specific.into_iter().next(),
        _ => None,
    }
}

/// Group one device's commands into candidate entities.
///
/// Commands are visited in name order, so when two commands map to the same
/// role the lexicographically first one is kept. `area` overrides the area
/// derived from the device name. Controllers are left unresolved.
pub fn group<'a>(
    device_name: &str,
    commands: impl IntoIterator<Item = &'a str>,
    area: Option<&str>,
    vocabulary: &Vocabulary,
) -> Grouping {
    let names: BTreeSet<&str> = commands.into_iter().collect();
    let classified: Vec<(&str, ClassifiedCommand)> = names
        .iter()
        .filter_map(|name| classify(name).map(|c| (*name, c)))
        .collect();
    let primary = primary_type(device_name, &classified, vocabulary);

    let buckets = names.iter().fold(RoleBuckets::default(), |acc, name| {
        match classified.iter().find(|(n, _)| n == name) {
            Some((_, c)) => {
                let (ty, role) = retarget(c.clone(), primary);
                acc.with(ty, role, name)
            }
            None => acc.with_unclassified(name),
        }
    });

    let area = area
        .map(str::to_string)
        .or_else(|| derive_area(device_name, vocabulary));

    let mut grouping = Grouping {
        duplicates: buckets.duplicates,
        unclassified: buckets.unclassified,
        ..Grouping::default()
    };

    for (entity_type, roles) in buckets.buckets {
        if !is_valid(entity_type, &roles) {
            debug!(
                "Dropping {} bucket of {}: roles {:?} miss the minimum set",
                entity_type,
                device_name,
                roles.keys().collect::<Vec<_>>()
            );
            grouping.rejected.push(
                SkippedEntity::new(
                    device_name,
                    SkipReason::MissingRoles {
                        roles: roles.into_keys().collect(),
                    },
                )
                .with_entity(None, entity_type),
            );
            continue;
        }

        let entity_id = match EntityId::new(entity_type.as_str(), entity_slug(device_name, entity_type)) {
            Ok(id) => id,
            Err(e) => {
                grouping.rejected.push(
                    SkippedEntity::new(device_name, SkipReason::InvalidId { message: e.to_string() })
                        .with_entity(None, entity_type),
                );
                continue;
            }
        };

        let candidate = CandidateEntity {
            entity_id: entity_id.clone(),
            entity_type,
            device_name: device_name.to_string(),
            roles,
            friendly_name: friendly_name(device_name, entity_type, vocabulary),
            area: area.clone(),
            icon: Some(default_icon(entity_type).to_string()),
            controller: None,
            enabled: true,
        };
        grouping.entities.insert(entity_id, candidate);
    }

    grouping
}

/// Candidates for a whole pass, ready for compilation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Synthesis {
    /// Entities with a resolved controller, ordered by id
    pub candidates: Vec<CandidateEntity>,
    /// `(device, command)` pairs owned by skipped disabled entities
    pub reserved: BTreeSet<(String, String)>,
    pub skipped: Vec<SkippedEntity>,
    pub warnings: Vec<String>,
}

/// A candidate plus the controller its metadata asked for
struct Pending {
    candidate: CandidateEntity,
    controller: Option<String>,
}

/// Id a metadata key refers to for a given type.
///
/// Keys may be full ids (`fan.office_fan`) or bare object ids (`office_fan`).
fn metadata_id(key: &str, entity_type: EntityType) -> Result<EntityId, SkipReason> {
    if key.contains('.') {
        let id: EntityId = key.parse().map_err(|e: ha_core::EntityIdError| SkipReason::InvalidId {
            message: e.to_string(),
        })?;
        if id.domain() != entity_type.as_str() {
            return Err(SkipReason::InvalidId {
                message: format!("'{}' is not a {} id", key, entity_type),
            });
        }
        Ok(id)
    } else {
        EntityId::new(entity_type.as_str(), slugify(key)).map_err(|e| SkipReason::InvalidId {
            message: e.to_string(),
        })
    }
}

fn metadata_matches(key: &str, meta: &EntityMetadata, candidate: &CandidateEntity) -> bool {
    if meta.entity_type.is_some_and(|ty| ty != candidate.entity_type) {
        return false;
    }
    if key.contains('.') {
        key.parse::<EntityId>()
            .is_ok_and(|id| id == candidate.entity_id)
    } else {
        slugify(key) == candidate.entity_id.object_id()
    }
}

/// Build an entity defined outright by metadata
fn explicit_candidate(
    key: &str,
    meta: &EntityMetadata,
    entity_type: EntityType,
    input: &CompileInput,
    vocabulary: &Vocabulary,
    warnings: &mut Vec<String>,
) -> Result<CandidateEntity, SkipReason> {
    let learned = input
        .commands
        .get(&meta.device)
        .ok_or(SkipReason::UnknownDevice)?;

    let mut roles = BTreeMap::new();
    for (role_name, command) in &meta.commands {
        if !learned.contains_key(command) {
            return Err(SkipReason::UnknownCommand {
                command: command.clone(),
            });
        }
        if role::is_known(entity_type, role_name) {
            roles.insert(role_name.clone(), command.clone());
        } else {
            warnings.push(format!(
                "{}: ignoring role '{}', not a {} role",
                key, role_name, entity_type
            ));
        }
    }

    if !is_valid(entity_type, &roles) {
        return Err(SkipReason::MissingRoles {
            roles: roles.into_keys().collect(),
        });
    }

    Ok(CandidateEntity {
        entity_id: metadata_id(key, entity_type)?,
        entity_type,
        device_name: meta.device.clone(),
        roles,
        friendly_name: meta
            .friendly_name
            .clone()
            .unwrap_or_else(|| friendly_name(&meta.device, entity_type, vocabulary)),
        area: meta
            .area
            .clone()
            .or_else(|| derive_area(&meta.device, vocabulary)),
        icon: meta
            .icon
            .clone()
            .or_else(|| Some(default_icon(entity_type).to_string())),
        controller: None,
        enabled: meta.enabled,
    })
}

/// Apply an override record to an auto-detected candidate
fn apply_override(candidate: &mut CandidateEntity, meta: &EntityMetadata) {
    if let Some(name) = &meta.friendly_name {
        candidate.friendly_name = name.clone();
    }
    if let Some(icon) = &meta.icon {
        candidate.icon = Some(icon.clone());
    }
    if let Some(area) = &meta.area {
        candidate.area = Some(area.clone());
    }
    candidate.enabled = meta.enabled;
}

/// Transmitter for an entity: metadata, then per-device settings, then default
pub fn resolve_controller(
    requested: Option<&str>,
    device: &str,
    config: &SynthConfig,
) -> Result<EntityId, SkipReason> {
    let reference = requested
        .or_else(|| config.controller_for(device))
        .ok_or(SkipReason::NoController)?;
    reference
        .parse()
        .map_err(|_| SkipReason::InvalidController {
            controller: reference.to_string(),
        })
}

/// Synthesize candidates for every device in the command table.
///
/// Metadata records with a type and commands define entities directly and
/// claim their commands first. The remaining commands of each device are
/// grouped automatically; a type the metadata already defines for a device
/// is not synthesized again.
pub fn synthesize(input: &CompileInput, config: &SynthConfig, vocabulary: &Vocabulary) -> Synthesis {
    let mut skipped = Vec::new();
    let mut warnings = Vec::new();
    let mut pending: Vec<Pending> = Vec::new();
    let mut claimed: BTreeSet<(String, String)> = BTreeSet::new();
    let mut declared: BTreeSet<(String, EntityType)> = BTreeSet::new();

    for (key, meta) in &input.entities {
        let Some(entity_type) = meta.entity_type.filter(|_| meta.is_explicit()) else {
            continue;
        };
        declared.insert((meta.device.clone(), entity_type));
        match explicit_candidate(key, meta, entity_type, input, vocabulary, &mut warnings) {
            Ok(candidate) => {
                debug!("Defined {} from metadata '{}'", candidate.entity_id, key);
                claimed.extend(
                    candidate
                        .roles
                        .values()
                        .map(|command| (meta.device.clone(), command.clone())),
                );
                pending.push(Pending {
                    candidate,
                    controller: meta.controller.clone(),
                });
            }
            Err(reason) => {
                warn!("Skipping metadata entity '{}': {}", key, reason);
                skipped.push(
                    SkippedEntity::new(&meta.device, reason)
                        .with_entity(metadata_id(key, entity_type).ok(), entity_type),
                );
            }
        }
    }

    for (device, commands) in &input.commands {
        let remaining = commands
            .keys()
            .filter(|command| !claimed.contains(&(device.clone(), (*command).clone())))
            .map(String::as_str);
        let area_hint = input
            .metadata_for_device(device)
            .find_map(|(_, meta)| meta.area.as_deref());

        let grouping = group(device, remaining, area_hint, vocabulary);
        for duplicate in &grouping.duplicates {
            warnings.push(format!(
                "{}: commands '{}' and '{}' both map to {} role {}; keeping '{}'",
                device,
                duplicate.kept,
                duplicate.dropped,
                duplicate.entity_type,
                duplicate.role,
                duplicate.kept
            ));
        }
        if !grouping.unclassified.is_empty() {
            debug!("{}: unclassified commands {:?}", device, grouping.unclassified);
        }
        skipped.extend(grouping.rejected);

        for (_, mut candidate) in grouping.entities {
            if declared.contains(&(device.clone(), candidate.entity_type)) {
                debug!(
                    "{}: {} already defined by metadata, not synthesizing {}",
                    device, candidate.entity_type, candidate.entity_id
                );
                continue;
            }
            let record = input
                .metadata_for_device(device)
                .find(|(key, meta)| !meta.is_explicit() && metadata_matches(key, meta, &candidate));
            let controller = record.and_then(|(_, meta)| meta.controller.clone());
            if let Some((key, meta)) = record {
                debug!("Applying metadata '{}' to {}", key, candidate.entity_id);
                apply_override(&mut candidate, meta);
            }
            pending.push(Pending {
                candidate,
                controller,
            });
        }
    }

    let mut seen: BTreeSet<EntityId> = BTreeSet::new();
    let mut reserved = BTreeSet::new();
    let mut candidates = Vec::new();

    for Pending {
        mut candidate,
        controller,
    } in pending
    {
        let skip = |reason: SkipReason, candidate: &CandidateEntity| {
            SkippedEntity::new(&candidate.device_name, reason)
                .with_entity(Some(candidate.entity_id.clone()), candidate.entity_type)
        };

        if !seen.insert(candidate.entity_id.clone()) {
            warn!("Skipping {}: id already taken", candidate.entity_id);
            skipped.push(skip(SkipReason::DuplicateId, &candidate));
            continue;
        }

        if !candidate.enabled && !config.include_disabled {
            debug!("Skipping disabled entity {}", candidate.entity_id);
            reserved.extend(
                candidate
                    .roles
                    .values()
                    .map(|command| (candidate.device_name.clone(), command.clone())),
            );
            skipped.push(skip(SkipReason::Disabled, &candidate));
            continue;
        }

        match resolve_controller(controller.as_deref(), &candidate.device_name, config) {
            Ok(id) => {
                candidate.controller = Some(id);
                candidates.push(candidate);
            }
            Err(reason) => {
                warn!("Skipping {}: {}", candidate.entity_id, reason);
                skipped.push(skip(reason, &candidate));
            }
        }
    }

    candidates.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

    Synthesis {
        candidates,
        reserved,
        skipped,
        warnings,
    }
}
