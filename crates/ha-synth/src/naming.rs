//! Friendly names and areas derived from device names
//!
//! Device names are free-form (`tonys_office_ceiling_fan`). Two heuristics
//! turn them into display text:
//!
//! - **Possessives**: a token followed by a lone `s` token (`tony`, `s`)
//!   becomes `Tony's`. So does a token ending in `s` that is directly
//!   followed by a room word (`tonys`, `office`).
//! - **Areas**: the tokens before the first device-type word form the area.
//!   Without any device-type word, every token but the last does.
//!
//! Both are best-effort. Names outside the vocabularies fall back to the
//! plain rules rather than guessing.

use ha_config::SynthConfig;
use ha_core::EntityType;
use std::collections::{BTreeMap, BTreeSet};

/// Device-type words, with the entity type they imply when they name one
const DEVICE_WORDS: &[(&str, Option<EntityType>)] = &[
    ("fan", Some(EntityType::Fan)),
    ("ceiling", None),
    ("light", Some(EntityType::Light)),
    ("lights", Some(EntityType::Light)),
    ("lamp", Some(EntityType::Light)),
    ("bulb", Some(EntityType::Light)),
    ("led", Some(EntityType::Light)),
    ("strip", Some(EntityType::Light)),
    ("chandelier", Some(EntityType::Light)),
    ("sconce", Some(EntityType::Light)),
    ("tv", Some(EntityType::MediaPlayer)),
    ("television", Some(EntityType::MediaPlayer)),
    ("projector", Some(EntityType::MediaPlayer)),
    ("receiver", Some(EntityType::MediaPlayer)),
    ("soundbar", Some(EntityType::MediaPlayer)),
    ("speaker", Some(EntityType::MediaPlayer)),
    ("speakers", Some(EntityType::MediaPlayer)),
    ("stereo", Some(EntityType::MediaPlayer)),
    ("amp", Some(EntityType::MediaPlayer)),
    ("amplifier", Some(EntityType::MediaPlayer)),
    ("blind", Some(EntityType::Cover)),
    ("blinds", Some(EntityType::Cover)),
    ("curtain", Some(EntityType::Cover)),
    ("curtains", Some(EntityType::Cover)),
    ("shade", Some(EntityType::Cover)),
    ("shades", Some(EntityType::Cover)),
    ("shutter", Some(EntityType::Cover)),
    ("shutters", Some(EntityType::Cover)),
    ("awning", Some(EntityType::Cover)),
    ("heater", Some(EntityType::Switch)),
    ("purifier", Some(EntityType::Switch)),
    ("humidifier", Some(EntityType::Switch)),
    ("dehumidifier", Some(EntityType::Switch)),
    ("plug", Some(EntityType::Switch)),
    ("outlet", Some(EntityType::Switch)),
    ("desk", None),
    ("monitor", None),
    ("screen", None),
    ("ac", None),
    ("aircon", None),
];

/// Words that name a room; a preceding `...s` token reads as a possessive
const ROOM_WORDS: &[&str] = &[
    "office", "room", "bedroom", "kitchen", "den", "study", "bathroom", "closet", "garage",
    "lounge", "nursery", "studio", "basement", "attic", "loft", "porch", "patio", "suite",
];

/// Lookup tables for the naming heuristics
#[derive(Debug, Clone)]
pub struct Vocabulary {
    device_words: BTreeMap<String, Option<EntityType>>,
    room_words: BTreeSet<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

impl Vocabulary {
    /// The built-in word lists
    pub fn standard() -> Self {
        Self {
            device_words: DEVICE_WORDS
                .iter()
                .map(|(word, ty)| (word.to_string(), *ty))
                .collect(),
            room_words: ROOM_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Built-in lists extended with the words from the generator settings
    pub fn from_config(config: &SynthConfig) -> Self {
        let mut vocabulary = Self::standard();
        for word in &config.area_vocabulary {
            vocabulary
                .device_words
                .entry(word.trim().to_lowercase())
                .or_insert(None);
        }
        vocabulary.room_words.extend(
            config
                .room_words
                .iter()
                .map(|word| word.trim().to_lowercase()),
        );
        vocabulary
    }

    pub fn is_device_word(&self, token: &str) -> bool {
        self.device_words.contains_key(token)
    }

    /// Entity type a device-type word implies, if any
    pub fn implied_type(&self, token: &str) -> Option<EntityType> {
        self.device_words.get(token).copied().flatten()
    }

    pub fn is_room_word(&self, token: &str) -> bool {
        self.room_words.contains(token)
    }

    /// Entity type implied by the last typed word of a device name
    /// (`ceiling_fan_light` is a light)
    pub fn primary_type(&self, device_name: &str) -> Option<EntityType> {
        tokens(device_name)
            .iter()
            .rev()
            .find_map(|token| self.implied_type(token))
    }
}

/// One display word; possessive words render with a trailing `'s`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Word {
    text: String,
    possessive: bool,
}

impl Word {
    fn render(&self) -> String {
        let mut out = title_case(&self.text);
        if self.possessive {
            out.push_str("'s");
        }
        out
    }
}

/// Split on underscores and whitespace, lowercased, empties dropped
fn tokens(name: &str) -> Vec<String> {
    name.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn words(name: &str, vocabulary: &Vocabulary) -> Vec<Word> {
    let tokens = tokens(name);
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        let next = tokens.get(i + 1).map(String::as_str);

        if next == Some("s") {
            out.push(Word {
                text: token.clone(),
                possessive: true,
            });
            i += 2;
            continue;
        }

        let fused = token.len() >= 4
            && token.ends_with('s')
            && !token.ends_with("ss")
            && !vocabulary.is_device_word(token)
            && next.is_some_and(|n| vocabulary.is_room_word(n));
        if fused {
            out.push(Word {
                text: token[..token.len() - 1].to_string(),
                possessive: true,
            });
        } else {
            out.push(Word {
                text: token.clone(),
                possessive: false,
            });
        }
        i += 1;
    }
    out
}

fn render(words: &[Word]) -> String {
    words
        .iter()
        .map(Word::render)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Display form of a device name without any type suffix
pub fn display_name(device_name: &str, vocabulary: &Vocabulary) -> String {
    render(&words(device_name, vocabulary))
}

/// Friendly name for an entity: the device name in title case, with the
/// entity type appended unless the name already mentions it
pub fn friendly_name(device_name: &str, entity_type: EntityType, vocabulary: &Vocabulary) -> String {
    let base = display_name(device_name, vocabulary);
    let title = entity_type.title();
    if base.is_empty() {
        return title.to_string();
    }
    if base.to_lowercase().contains(&title.to_lowercase()) {
        base
    } else {
        format!("{base} {title}")
    }
}

/// Area derived from the device name, `None` when no tokens remain
pub fn derive_area(device_name: &str, vocabulary: &Vocabulary) -> Option<String> {
    let words = words(device_name, vocabulary);
    let cut = words
        .iter()
        .position(|w| !w.possessive && vocabulary.is_device_word(&w.text))
        .unwrap_or_else(|| words.len().saturating_sub(1));

    (cut > 0).then(|| render(&words[..cut]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        Vocabulary::standard()
    }

    #[test]
    fn test_fused_possessive_before_room_word() {
        assert_eq!(
            derive_area("tonys_office_ceiling_fan", &vocab()),
            Some("Tony's Office".to_string())
        );
        assert_eq!(
            friendly_name("tonys_office_ceiling_fan", EntityType::Fan, &vocab()),
            "Tony's Office Ceiling Fan"
        );
    }

    #[test]
    fn test_split_possessive() {
        assert_eq!(
            display_name("tony_s_desk_lamp", &vocab()),
            "Tony's Desk Lamp"
        );
        assert_eq!(derive_area("tony_s_desk_lamp", &vocab()), Some("Tony's".to_string()));
    }

    #[test]
    fn test_plural_device_word_is_not_possessive() {
        assert_eq!(display_name("blinds_room", &vocab()), "Blinds Room");
        assert_eq!(display_name("glass_office", &vocab()), "Glass Office");
    }

    #[test]
    fn test_type_appended_when_missing() {
        assert_eq!(
            friendly_name("living_room_tv", EntityType::MediaPlayer, &vocab()),
            "Living Room Tv Media Player"
        );
        assert_eq!(
            friendly_name("bedroom_lamp", EntityType::Light, &vocab()),
            "Bedroom Lamp Light"
        );
        assert_eq!(
            friendly_name("Porch Light", EntityType::Light, &vocab()),
            "Porch Light"
        );
    }

    #[test]
    fn test_area_fallback_all_but_last() {
        assert_eq!(
            derive_area("kitchen_thing", &vocab()),
            Some("Kitchen".to_string())
        );
        assert_eq!(
            derive_area("upstairs_hall_gizmo", &vocab()),
            Some("Upstairs Hall".to_string())
        );
    }

    #[test]
    fn test_area_none_when_nothing_precedes() {
        assert_eq!(derive_area("fan", &vocab()), None);
        assert_eq!(derive_area("gizmo", &vocab()), None);
        assert_eq!(derive_area("tv_den", &vocab()), None);
    }

    #[test]
    fn test_primary_type_uses_last_typed_word() {
        assert_eq!(vocab().primary_type("ceiling_fan_light"), Some(EntityType::Light));
        assert_eq!(vocab().primary_type("office_fan"), Some(EntityType::Fan));
        assert_eq!(vocab().primary_type("office_desk"), None);
    }

    #[test]
    fn test_config_extends_vocabulary() {
        let config = SynthConfig {
            area_vocabulary: vec!["Gizmo".to_string()],
            room_words: vec!["workshop".to_string()],
            ..SynthConfig::default()
        };
        let vocabulary = Vocabulary::from_config(&config);
        assert_eq!(derive_area("upstairs_hall_gizmo", &vocabulary), Some("Upstairs Hall".to_string()));
        assert_eq!(display_name("dads_workshop_gizmo", &vocabulary), "Dad's Workshop Gizmo");
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(friendly_name("", EntityType::Switch, &vocab()), "Switch");
        assert_eq!(derive_area("___", &vocab()), None);
    }
}
