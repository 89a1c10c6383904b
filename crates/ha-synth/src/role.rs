//! Canonical role tokens
//!
//! A role is what a command does for the entity that owns it. Parameterized
//! roles carry their argument after a fixed prefix (`speed_3`,
//! `position_50`, `source_hdmi1`).

use ha_core::EntityType;

pub const TURN_ON: &str = "turn_on";
pub const TURN_OFF: &str = "turn_off";
pub const TOGGLE: &str = "toggle";
/// Media player power toggle
pub const POWER: &str = "power";

pub const REVERSE: &str = "reverse";
pub const OSCILLATE: &str = "oscillate";

pub const BRIGHTNESS_UP: &str = "brightness_up";
pub const BRIGHTNESS_DOWN: &str = "brightness_down";
pub const COOLER: &str = "cooler";
pub const WARMER: &str = "warmer";

pub const OPEN: &str = "open";
pub const CLOSE: &str = "close";
pub const STOP: &str = "stop";
pub const OPEN_TILT: &str = "open_tilt";
pub const CLOSE_TILT: &str = "close_tilt";

pub const VOLUME_UP: &str = "volume_up";
pub const VOLUME_DOWN: &str = "volume_down";
pub const MUTE: &str = "mute";
pub const PLAY: &str = "play";
pub const PAUSE: &str = "pause";
pub const PLAY_PAUSE: &str = "play_pause";
pub const NEXT_TRACK: &str = "next_track";
pub const PREVIOUS_TRACK: &str = "previous_track";
pub const CHANNEL_UP: &str = "channel_up";
pub const CHANNEL_DOWN: &str = "channel_down";

/// Role of a button's single command
pub const PRESS: &str = "press";

pub const SPEED_PREFIX: &str = "speed_";
pub const POSITION_PREFIX: &str = "position_";
pub const SOURCE_PREFIX: &str = "source_";

/// Named fan speeds and the rank they collapse to. Rank 0 is not a speed.
pub const NAMED_SPEEDS: &[(&str, u32)] = &[
    ("quiet", 1),
    ("low", 1),
    ("lowmedium", 2),
    ("med", 3),
    ("medium", 3),
    ("mediumhigh", 4),
    ("high", 5),
    ("auto", 0),
];

/// Rank of a `speed_*` role; `None` for other roles and for rank 0
pub fn speed_rank(role: &str) -> Option<u32> {
    let suffix = role.strip_prefix(SPEED_PREFIX)?;
    let rank = match suffix.parse::<u32>() {
        Ok(rank) => rank,
        Err(_) => NAMED_SPEEDS
            .iter()
            .find(|(name, _)| *name == suffix)
            .map(|(_, rank)| *rank)?,
    };
    (rank > 0).then_some(rank)
}

/// Percentage of a `position_*` role, if within 0..=100
pub fn position_value(role: &str) -> Option<u8> {
    role.strip_prefix(POSITION_PREFIX)?
        .parse::<u8>()
        .ok()
        .filter(|value| *value <= 100)
}

/// Source name of a `source_*` role
pub fn source_name(role: &str) -> Option<&str> {
    role.strip_prefix(SOURCE_PREFIX)
        .filter(|name| !name.is_empty())
}

/// Whether a role belongs to the set an entity type understands
pub fn is_known(entity_type: EntityType, role: &str) -> bool {
    match entity_type {
        EntityType::Light => matches!(
            role,
            TURN_ON | TURN_OFF | TOGGLE | BRIGHTNESS_UP | BRIGHTNESS_DOWN | COOLER | WARMER
        ),
        EntityType::Switch => matches!(role, TURN_ON | TURN_OFF | TOGGLE),
        EntityType::Fan => {
            matches!(role, TURN_ON | TURN_OFF | TOGGLE | REVERSE | OSCILLATE)
                || role.starts_with(SPEED_PREFIX)
        }
        EntityType::MediaPlayer => {
            matches!(
                role,
                TURN_ON
                    | TURN_OFF
                    | POWER
                    | VOLUME_UP
                    | VOLUME_DOWN
                    | MUTE
                    | PLAY
                    | PAUSE
                    | PLAY_PAUSE
                    | STOP
                    | NEXT_TRACK
                    | PREVIOUS_TRACK
                    | CHANNEL_UP
                    | CHANNEL_DOWN
            ) || source_name(role).is_some()
        }
        EntityType::Cover => {
            matches!(role, OPEN | CLOSE | STOP | OPEN_TILT | CLOSE_TILT)
                || position_value(role).is_some()
        }
        EntityType::Button => role == PRESS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_speed_rank() {
        assert_eq!(speed_rank("speed_3"), Some(3));
        assert_eq!(speed_rank("speed_12"), Some(12));
        assert_eq!(speed_rank("speed_0"), None);
    }

    #[test]
    fn test_named_speed_rank() {
        assert_eq!(speed_rank("speed_low"), Some(1));
        assert_eq!(speed_rank("speed_medium"), Some(3));
        assert_eq!(speed_rank("speed_med"), Some(3));
        assert_eq!(speed_rank("speed_high"), Some(5));
        assert_eq!(speed_rank("speed_auto"), None);
        assert_eq!(speed_rank("speed_turbo"), None);
        assert_eq!(speed_rank("turn_on"), None);
    }

    #[test]
    fn test_position_value() {
        assert_eq!(position_value("position_50"), Some(50));
        assert_eq!(position_value("position_100"), Some(100));
        assert_eq!(position_value("position_150"), None);
        assert_eq!(position_value("position_x"), None);
    }

    #[test]
    fn test_source_name() {
        assert_eq!(source_name("source_hdmi1"), Some("hdmi1"));
        assert_eq!(source_name("source_"), None);
        assert_eq!(source_name("volume_up"), None);
    }

    #[test]
    fn test_is_known() {
        assert!(is_known(EntityType::Fan, "speed_3"));
        assert!(is_known(EntityType::MediaPlayer, POWER));
        assert!(!is_known(EntityType::Light, POWER));
        assert!(is_known(EntityType::Cover, "position_25"));
        assert!(!is_known(EntityType::Switch, BRIGHTNESS_UP));
    }
}
