//! Command classifier
//!
//! Maps a learned command name to the entity type and role it most likely
//! serves, using an ordered table of anchored patterns.
//!
//! # Ordering invariant
//!
//! [`RULES`] is scanned top to bottom and the first match wins, so a rule must
//! appear before every rule that would also match the names it is meant to
//! catch:
//!
//! 1. Device-qualified power commands (`fan_off`, `light_on`, `tv_power`)
//!    before the bare catch-alls (`off`, `power`), otherwise every fan or
//!    light command would land on the generic switch.
//! 2. `power_on` / `power_off` before the bare `power` toggle.
//! 3. Device-qualified `*_stop` forms before the bare `stop`.
//! 4. Numeric speed forms before named speed forms, so `speed_3` is never
//!    read as a name.
//!
//! The table is a slice, never a map: reordering it changes behavior and is
//! covered by tests.

use ha_core::EntityType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{trace, warn};

use crate::role;

/// Where a rule sends the commands it matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget {
    /// The command names its device type
    Specific(EntityType),
    /// The command names no device type. The synthesizer re-homes it onto the
    /// device's primary type; the contained type is the fallback.
    Generic(EntityType),
}

/// One row of the classification table
#[derive(Debug, Clone, Copy)]
pub struct ClassifierRule {
    /// Anchored pattern matched against the normalized command name
    pub pattern: &'static str,
    pub target: RuleTarget,
    /// Role template; `${1}` expands to the first capture group
    pub role: &'static str,
}

const fn specific(pattern: &'static str, ty: EntityType, role: &'static str) -> ClassifierRule {
    ClassifierRule {
        pattern,
        target: RuleTarget::Specific(ty),
        role,
    }
}

const fn generic(pattern: &'static str, fallback: EntityType, role: &'static str) -> ClassifierRule {
    ClassifierRule {
        pattern,
        target: RuleTarget::Generic(fallback),
        role,
    }
}

use EntityType::{Cover, Fan, Light, MediaPlayer, Switch};

/// The ordered classification table. See the module docs for the ordering rules.
pub const RULES: &[ClassifierRule] = &[
    // Device-qualified power
    specific(r"^(?:light|lights|lamp)_(?:on|turn_on|power_on)$", Light, role::TURN_ON),
    specific(r"^(?:light|lights|lamp)_(?:off|turn_off|power_off)$", Light, role::TURN_OFF),
    specific(r"^(?:light|lights|lamp)_(?:toggle|power)$", Light, role::TOGGLE),
    specific(r"^fan_(?:on|turn_on|power_on)$", Fan, role::TURN_ON),
    specific(r"^fan_(?:off|turn_off|power_off|stop)$", Fan, role::TURN_OFF),
    specific(r"^fan_(?:toggle|power)$", Fan, role::TOGGLE),
    specific(r"^switch_(?:on|turn_on|power_on)$", Switch, role::TURN_ON),
    specific(r"^switch_(?:off|turn_off|power_off)$", Switch, role::TURN_OFF),
    specific(r"^switch_(?:toggle|power)$", Switch, role::TOGGLE),
    specific(r"^(?:tv|media|receiver|soundbar|amp)_(?:on|turn_on|power_on)$", MediaPlayer, role::TURN_ON),
    specific(r"^(?:tv|media|receiver|soundbar|amp)_(?:off|turn_off|power_off)$", MediaPlayer, role::TURN_OFF),
    specific(r"^(?:tv|media|receiver|soundbar|amp)_(?:power|toggle)$", MediaPlayer, role::POWER),
    // Fan speeds, numeric before named
    specific(r"^(?:fan_)?speed_?(\d+)$", Fan, "speed_${1}"),
    specific(r"^fan_(\d+)$", Fan, "speed_${1}"),
    specific(
        r"^(?:fan_)?(?:speed_)?(lowmedium|mediumhigh|low|medium|med|high|quiet|auto)(?:_speed)?$",
        Fan,
        "speed_${1}",
    ),
    specific(r"^(?:fan_)?(?:reverse|direction|rotate)$", Fan, role::REVERSE),
    specific(r"^(?:fan_)?(?:oscillate|oscillation|swing)$", Fan, role::OSCILLATE),
    // Light level and color temperature
    specific(r"^(?:light_|lamp_)?(?:brightness_up|bright|brighter|brightness_plus)$", Light, role::BRIGHTNESS_UP),
    specific(r"^(?:light_|lamp_)?(?:brightness_down|dim|dimmer|brightness_minus)$", Light, role::BRIGHTNESS_DOWN),
    specific(r"^(?:light_|lamp_)?(?:cooler|colder|cool_white)$", Light, role::COOLER),
    specific(r"^(?:light_|lamp_)?(?:warmer|warm_white)$", Light, role::WARMER),
    // Covers
    specific(r"^(?:cover|blind|blinds|curtain|curtains|shade|shades|shutter|garage)_(?:open|up)$", Cover, role::OPEN),
    specific(r"^(?:cover|blind|blinds|curtain|curtains|shade|shades|shutter|garage)_(?:close|down)$", Cover, role::CLOSE),
    specific(r"^(?:cover|blind|blinds|curtain|curtains|shade|shades|shutter|garage)_stop$", Cover, role::STOP),
    specific(r"^(?:cover_)?(?:tilt_open|open_tilt)$", Cover, role::OPEN_TILT),
    specific(r"^(?:cover_)?(?:tilt_close|close_tilt)$", Cover, role::CLOSE_TILT),
    specific(r"^(?:cover_)?position_(\d+)$", Cover, "position_${1}"),
    specific(r"^open$", Cover, role::OPEN),
    specific(r"^close$", Cover, role::CLOSE),
    // Media transport, volume and sources
    specific(r"^(?:vol|volume)_?(?:up|plus|\+)$", MediaPlayer, role::VOLUME_UP),
    specific(r"^(?:vol|volume)_?(?:down|minus|-)$", MediaPlayer, role::VOLUME_DOWN),
    specific(r"^(?:mute|vol_mute|volume_mute)$", MediaPlayer, role::MUTE),
    specific(r"^(?:play_pause|playpause|play_or_pause)$", MediaPlayer, role::PLAY_PAUSE),
    specific(r"^(?:media_)?play$", MediaPlayer, role::PLAY),
    specific(r"^(?:media_)?pause$", MediaPlayer, role::PAUSE),
    specific(r"^media_stop$", MediaPlayer, role::STOP),
    specific(r"^(?:next|next_track|skip|skip_forward)$", MediaPlayer, role::NEXT_TRACK),
    specific(r"^(?:prev|previous|previous_track|skip_back)$", MediaPlayer, role::PREVIOUS_TRACK),
    specific(r"^(?:channel|ch)_?(?:up|plus|\+)$", MediaPlayer, role::CHANNEL_UP),
    specific(r"^(?:channel|ch)_?(?:down|minus|-)$", MediaPlayer, role::CHANNEL_DOWN),
    specific(r"^(?:source|input)_([a-z0-9_]+)$", MediaPlayer, "source_${1}"),
    specific(r"^(hdmi_?\d+|av_?\d+|usb|optical|aux|bluetooth)$", MediaPlayer, "source_${1}"),
    // Catch-alls; must stay last
    generic(r"^(?:turn_on|on|power_on)$", Switch, role::TURN_ON),
    generic(r"^(?:turn_off|off|power_off)$", Switch, role::TURN_OFF),
    generic(r"^toggle$", Switch, role::TOGGLE),
    generic(r"^power$", Switch, role::TOGGLE),
    generic(r"^stop$", MediaPlayer, role::STOP),
];

/// Result of classifying one command name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedCommand {
    pub entity_type: EntityType,
    pub role: String,
    /// Matched a catch-all; `entity_type` is only the fallback
    #[serde(default)]
    pub generic: bool,
}

fn compiled_rules() -> &'static [(Regex, ClassifierRule)] {
    static COMPILED: OnceLock<Vec<(Regex, ClassifierRule)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|rule| match Regex::new(rule.pattern) {
                Ok(re) => Some((re, *rule)),
                Err(e) => {
                    warn!("Skipping invalid classifier pattern '{}': {}", rule.pattern, e);
                    None
                }
            })
            .collect()
    })
}

/// Lowercase, trim, and join inner whitespace with underscores
pub fn normalize(command_name: &str) -> String {
    command_name
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Classify a command name. `None` means no rule matched, which is not an error.
pub fn classify(command_name: &str) -> Option<ClassifiedCommand> {
    let name = normalize(command_name);
    if name.is_empty() {
        return None;
    }

    for (re, rule) in compiled_rules() {
        let Some(caps) = re.captures(&name) else {
            continue;
        };

        let mut role = String::new();
        caps.expand(rule.role, &mut role);

        let (entity_type, generic) = match rule.target {
            RuleTarget::Specific(ty) => (ty, false),
            RuleTarget::Generic(ty) => (ty, true),
        };
        trace!("Classified '{}' as {}/{} via {}", command_name, entity_type, role, rule.pattern);
        return Some(ClassifiedCommand {
            entity_type,
            role,
            generic,
        });
    }

    trace!("No classifier rule matched '{}'", command_name);
    None
}
