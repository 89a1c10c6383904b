//! Discrete ladders for percentage requests
//!
//! Remotes know a handful of fixed speeds or positions while the entity
//! model asks for a percentage. A ladder maps one onto the other: a request
//! picks the lowest rung at or above it.

use crate::role;
use crate::synthesizer::CandidateEntity;

/// One configured fan speed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedStep {
    pub rank: u32,
    pub role: String,
    /// `None` for the implicit speed of a fan without speed commands and
    /// without `turn_on`
    pub command: Option<String>,
}

/// What a percentage request resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedSelection<'a> {
    Off,
    Step(&'a SpeedStep),
}

/// Fan speeds in ascending rank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedLadder {
    steps: Vec<SpeedStep>,
}

impl SpeedLadder {
    /// Collapse the fan's `speed_*` roles into ranks.
    ///
    /// Named speeds share ranks with numeric ones (`speed_medium` is 3); when
    /// two roles collapse to one rank the first role in name order keeps it.
    /// A fan with no ranked speed gets a single implicit speed driven by
    /// `turn_on`.
    pub fn from_entity(entity: &CandidateEntity) -> Self {
        let mut steps: Vec<SpeedStep> = Vec::new();
        for (role_name, command) in entity.roles_with_prefix(role::SPEED_PREFIX) {
            let Some(rank) = role::speed_rank(role_name) else {
                continue;
            };
            if steps.iter().any(|s| s.rank == rank) {
                continue;
            }
            steps.push(SpeedStep {
                rank,
                role: role_name.to_string(),
                command: Some(command.to_string()),
            });
        }
        steps.sort_by_key(|s| s.rank);

        if steps.is_empty() {
            steps.push(SpeedStep {
                rank: 1,
                role: role::TURN_ON.to_string(),
                command: entity.command(role::TURN_ON).map(str::to_string),
            });
        }
        Self { steps }
    }

    pub fn steps(&self) -> &[SpeedStep] {
        &self.steps
    }

    pub fn speed_count(&self) -> usize {
        self.steps.len()
    }

    pub fn lowest(&self) -> Option<&SpeedStep> {
        self.steps.first()
    }

    /// Upper percentage bound of the rung at `index`
    pub fn threshold(&self, index: usize) -> f64 {
        100.0 * (index + 1) as f64 / self.steps.len() as f64
    }

    /// Rungs with the percentage bound each one covers, lowest first
    pub fn thresholds(&self) -> impl Iterator<Item = (f64, &SpeedStep)> {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| (self.threshold(i), step))
    }

    /// Pick the rung for a requested percentage: zero or below is off,
    /// anything else the lowest rung whose bound covers it
    pub fn resolve(&self, percentage: f64) -> SpeedSelection<'_> {
        if percentage <= 0.0 || self.steps.is_empty() {
            return SpeedSelection::Off;
        }
        let n = self.steps.len();
        let index = ((percentage * n as f64 / 100.0).ceil() as usize).clamp(1, n) - 1;
        SpeedSelection::Step(&self.steps[index])
    }
}

/// Cover positions reachable with a single command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionLadder {
    /// `(position, command)` in ascending position
    stops: Vec<(u8, String)>,
}

impl PositionLadder {
    /// Stops from `position_<N>` roles, with 0 bound to `close` and 100 to
    /// `open` when those exist
    pub fn from_entity(entity: &CandidateEntity) -> Self {
        let mut stops: Vec<(u8, String)> = entity
            .roles_with_prefix(role::POSITION_PREFIX)
            .filter_map(|(role_name, command)| {
                role::position_value(role_name).map(|value| (value, command.to_string()))
            })
            .collect();

        for (value, role_name) in [(0, role::CLOSE), (100, role::OPEN)] {
            if let Some(command) = entity.command(role_name) {
                stops.retain(|(v, _)| *v != value);
                stops.push((value, command.to_string()));
            }
        }
        stops.sort_by_key(|(value, _)| *value);
        stops.dedup_by_key(|(value, _)| *value);
        Self { stops }
    }

    pub fn stops(&self) -> &[(u8, String)] {
        &self.stops
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Smallest stop at or above the request, else the highest stop
    pub fn resolve(&self, position: f64) -> Option<&(u8, String)> {
        self.stops
            .iter()
            .find(|(value, _)| f64::from(*value) >= position)
            .or_else(|| self.stops.last())
    }
}
