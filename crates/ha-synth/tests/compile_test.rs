//! End-to-end generation tests
//!
//! Each test feeds a learned command table (and sometimes entity metadata)
//! through a full pass and checks the assembled document.

use ha_config::SynthConfig;
use ha_core::{EntityId, EntityType, StateKind};
use ha_synth::{
    classify, compile, execute, CompileInput, Compilation, EntityMetadata, EntityShape,
    EntityState, Operation, SkipReason, StateValue, Step,
};
use serde_json::json;
use std::collections::BTreeMap;

fn id(s: &str) -> EntityId {
    s.parse().unwrap()
}

fn config() -> SynthConfig {
    SynthConfig {
        default_controller: Some("remote.broadlink_rm4".to_string()),
        ..SynthConfig::default()
    }
}

fn run(commands: serde_json::Value) -> Compilation {
    let input = CompileInput::new(serde_json::from_value(commands).unwrap());
    compile(&input, &config()).unwrap()
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn test_classify_common_names() {
    let cases = [
        ("fan_off", EntityType::Fan, "turn_off"),
        ("fan_speed_3", EntityType::Fan, "speed_3"),
        ("light_on", EntityType::Light, "turn_on"),
        ("dim", EntityType::Light, "brightness_down"),
        ("volume_up", EntityType::MediaPlayer, "volume_up"),
        ("hdmi1", EntityType::MediaPlayer, "source_hdmi1"),
        ("blinds_open", EntityType::Cover, "open"),
    ];
    for (name, entity_type, role) in cases {
        let classified = classify(name).unwrap_or_else(|| panic!("{name} did not classify"));
        assert_eq!(classified.entity_type, entity_type, "{name}");
        assert_eq!(classified.role, role, "{name}");
    }
    assert!(classify("mystery_mode").is_none());
}

// ============================================================================
// Whole-pass properties
// ============================================================================

#[test]
fn test_identical_input_gives_identical_output() {
    let commands = json!({
        "den_tv": {"tv_power": "a", "volume_up": "b", "volume_down": "c", "hdmi1": "d"},
        "office_fan": {"fan_off": "e", "fan_speed_1": "f", "fan_speed_2": "g", "fan_reverse": "h"},
        "porch_light": {"light_on": "i", "light_off": "j", "mystery_mode": "k"}
    });
    let first = run(commands.clone());
    let second = run(commands);

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first.document).unwrap(),
        serde_json::to_string(&second.document).unwrap()
    );
}

#[test]
fn test_reverse_alone_is_not_a_fan() {
    let compilation = run(json!({"office_fan": {"fan_reverse": "a"}}));
    assert_eq!(compilation.report.count(EntityType::Fan), 0);
    assert!(compilation
        .report
        .skipped
        .iter()
        .any(|s| matches!(s.reason, SkipReason::MissingRoles { .. })));
    // The command is still reachable
    assert_eq!(compilation.report.count(EntityType::Button), 1);
}

#[test]
fn test_possessive_area_and_name() {
    let compilation = run(json!({
        "tonys_office_ceiling_fan": {"fan_off": "a", "fan_speed_1": "b"}
    }));
    let fan = compilation
        .document
        .entity(&id("fan.tonys_office_ceiling_fan"))
        .unwrap();
    assert_eq!(fan.entity.area.as_deref(), Some("Tony's Office"));
    assert_eq!(fan.entity.friendly_name, "Tony's Office Ceiling Fan");
}

#[test]
fn test_fan_speed_resolution() {
    let compilation = run(json!({
        "office_fan": {
            "fan_off": "a",
            "fan_speed_1": "b",
            "fan_speed_3": "c",
            "fan_speed_5": "d"
        }
    }));
    let doc = &compilation.document;
    let fan_id = id("fan.office_fan");
    assert_eq!(doc.entity(&fan_id).unwrap().speed_count, Some(3));

    let mut state = EntityState::initial(doc);
    let sent = execute(doc, &mut state, &fan_id, Operation::SetSpeed, Some(50.0.into())).unwrap();
    let commands: Vec<&str> = sent.iter().map(|c| c.command.as_str()).collect();
    assert_eq!(commands, vec!["fan_speed_3"]);
    assert_eq!(sent[0].controller, id("remote.broadlink_rm4"));
    assert_eq!(
        state.get(&id("input_select.office_fan_speed")),
        Some(&StateValue::text("3"))
    );
}

#[test]
fn test_lights_share_one_group() {
    let compilation = run(json!({
        "porch_light": {"light_on": "a", "light_off": "b"},
        "desk_lamp": {"lamp_toggle": "c"}
    }));
    let doc = &compilation.document;
    assert_eq!(doc.entities_by_type.len(), 1);
    assert_eq!(doc.entities_by_type[&EntityType::Light].len(), 2);
    assert_eq!(doc.state_variables_by_kind[&StateKind::Boolean].len(), 2);
}

#[test]
fn test_every_reference_resolves() {
    let compilation = run(json!({
        "den_tv": {"tv_power": "a", "volume_up": "b", "source_hdmi1": "c", "source_tv": "d"},
        "office_fan": {"fan_speed_1": "e", "fan_speed_2": "f"},
        "bedroom_light": {"light_toggle": "g", "brighter": "h", "dim": "i", "warmer": "j"},
        "living_room_blinds": {"blinds_open": "k", "blinds_close": "l", "position_50": "m"}
    }));
    let doc = &compilation.document;
    assert!(doc.verify().is_ok());

    for entity in doc.entities() {
        for rule in &entity.rules {
            for variable in rule.referenced_variables() {
                assert!(
                    doc.variable(variable).is_some(),
                    "{} references {}",
                    entity.entity_id(),
                    variable
                );
            }
        }
    }

    // No reverse command was learned but set_direction still has a home
    let fan = doc.entity(&id("fan.office_fan")).unwrap();
    assert!(fan.rule(Operation::SetDirection).is_some());
    assert!(doc
        .variable(&id("input_select.office_fan_direction"))
        .is_some());
}

#[test]
fn test_unknown_command_becomes_stateless_button() {
    let compilation = run(json!({"den_tv": {"mystery_mode": "a"}}));
    let doc = &compilation.document;
    assert_eq!(doc.entity_count(), 1);
    assert_eq!(doc.variable_count(), 0);

    let button = doc.entity(&id("button.den_tv_mystery_mode")).unwrap();
    assert_eq!(button.shape, EntityShape::Button);
    assert_eq!(button.entity.icon.as_deref(), Some("mdi:remote"));
    let press = button.rule(Operation::Press).unwrap();
    assert!(matches!(press.steps.as_slice(), [Step::Dispatch(c)] if c.command == "mystery_mode"));
}

#[test]
fn test_media_power_goes_through_companion() {
    let compilation = run(json!({
        "den_tv": {"tv_power": "a", "volume_up": "b", "volume_down": "c"}
    }));
    let doc = &compilation.document;
    let player_id = id("media_player.den_tv_media_player");
    let companion_id = id("switch.den_tv_power");

    let player = doc.entity(&player_id).unwrap();
    assert_eq!(
        player.shape,
        EntityShape::PowerDelegated {
            companion: companion_id.clone()
        }
    );
    let companion = doc.entity(&companion_id).unwrap();
    assert_eq!(
        companion.shape,
        EntityShape::PowerCompanion {
            primary: player_id.clone()
        }
    );

    let mut state = EntityState::initial(doc);
    let first = execute(doc, &mut state, &player_id, Operation::TurnOn, None).unwrap();
    let again = execute(doc, &mut state, &player_id, Operation::TurnOn, None).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].command, "tv_power");
    assert!(again.is_empty());
}

// ============================================================================
// Metadata
// ============================================================================

#[test]
fn test_explicit_metadata_entity() {
    let commands = serde_json::from_value(json!({
        "desk_lamp": {"on_button": "a", "off_button": "b"}
    }))
    .unwrap();
    let mut meta = EntityMetadata::for_device("desk_lamp");
    meta.entity_type = Some(EntityType::Light);
    meta.commands = BTreeMap::from([
        ("turn_on".to_string(), "on_button".to_string()),
        ("turn_off".to_string(), "off_button".to_string()),
    ]);
    meta.controller = Some("remote.rm_mini".to_string());
    meta.area = Some("Study".to_string());
    let input = CompileInput::new(commands)
        .with_entities(BTreeMap::from([("light.desk_lamp".to_string(), meta)]));

    let compilation = compile(&input, &config()).unwrap();
    let doc = &compilation.document;
    assert_eq!(doc.entity_count(), 1);

    let lamp = doc.entity(&id("light.desk_lamp")).unwrap();
    assert_eq!(lamp.entity.area.as_deref(), Some("Study"));
    assert_eq!(lamp.entity.controller, Some(id("remote.rm_mini")));
}

#[test]
fn test_disabled_entity_keeps_its_commands() {
    let commands = serde_json::from_value(json!({
        "porch_light": {"light_on": "a", "light_off": "b"}
    }))
    .unwrap();
    let mut meta = EntityMetadata::for_device("porch_light");
    meta.enabled = false;
    let input = CompileInput::new(commands)
        .with_entities(BTreeMap::from([("light.porch_light".to_string(), meta)]));

    let compilation = compile(&input, &config()).unwrap();
    assert_eq!(compilation.report.total_entities, 0);
    assert_eq!(compilation.report.skipped[0].reason, SkipReason::Disabled);
}

// ============================================================================
// Id conflicts
// ============================================================================

fn duplicate_ids(compilation: &Compilation) -> Vec<EntityId> {
    compilation
        .report
        .skipped
        .iter()
        .filter(|s| s.reason == SkipReason::DuplicateId)
        .filter_map(|s| s.entity_id.clone())
        .collect()
}

#[test]
fn test_shared_state_variable_skips_later_entity() {
    let compilation = run(json!({
        "light_switch": {"light_toggle": "a", "switch_toggle": "b"},
        "porch_fan": {"fan_off": "c", "fan_speed_1": "d"}
    }));
    let doc = &compilation.document;

    assert!(doc.entity(&id("light.light_switch")).is_some());
    assert!(doc.entity(&id("switch.light_switch")).is_none());
    assert!(doc.entity(&id("fan.porch_fan")).is_some());
    assert!(doc.entity(&id("button.light_switch_switch_toggle")).is_some());
    assert_eq!(duplicate_ids(&compilation), vec![id("switch.light_switch")]);
    assert!(compilation
        .report
        .warnings
        .iter()
        .any(|w| w.contains("input_boolean.light_switch_state")));
}

#[test]
fn test_metadata_entities_sharing_an_object_id() {
    let commands = serde_json::from_value(json!({
        "den": {"a": "x", "b": "y"},
        "porch_fan": {"fan_off": "c", "fan_speed_1": "d"}
    }))
    .unwrap();
    let mut light = EntityMetadata::for_device("den");
    light.entity_type = Some(EntityType::Light);
    light.commands = BTreeMap::from([("toggle".to_string(), "a".to_string())]);
    let mut switch = EntityMetadata::for_device("den");
    switch.entity_type = Some(EntityType::Switch);
    switch.commands = BTreeMap::from([("toggle".to_string(), "b".to_string())]);
    let input = CompileInput::new(commands).with_entities(BTreeMap::from([
        ("light.den".to_string(), light),
        ("switch.den".to_string(), switch),
    ]));

    let compilation = compile(&input, &config()).unwrap();
    let doc = &compilation.document;
    assert!(doc.entity(&id("light.den")).is_some());
    assert!(doc.entity(&id("switch.den")).is_none());
    assert!(doc.entity(&id("fan.porch_fan")).is_some());
    assert_eq!(duplicate_ids(&compilation), vec![id("switch.den")]);
}

#[test]
fn test_companion_clashing_with_metadata_switch() {
    let commands = serde_json::from_value(json!({
        "den_tv": {"tv_power": "a", "volume_up": "b", "switch_toggle": "c"},
        "porch_fan": {"fan_off": "d", "fan_speed_1": "e"}
    }))
    .unwrap();
    let mut meta = EntityMetadata::for_device("den_tv");
    meta.entity_type = Some(EntityType::Switch);
    meta.commands = BTreeMap::from([("toggle".to_string(), "switch_toggle".to_string())]);
    let input = CompileInput::new(commands)
        .with_entities(BTreeMap::from([("switch.den_tv_power".to_string(), meta)]));

    let compilation = compile(&input, &config()).unwrap();
    let doc = &compilation.document;

    let switch = doc.entity(&id("switch.den_tv_power")).unwrap();
    assert_eq!(switch.shape, EntityShape::Standalone);
    assert!(doc.entity(&id("media_player.den_tv_media_player")).is_none());
    assert!(doc.entity(&id("fan.porch_fan")).is_some());
    assert!(doc.entity(&id("button.den_tv_tv_power")).is_some());
    assert_eq!(
        duplicate_ids(&compilation),
        vec![id("media_player.den_tv_media_player")]
    );
}

#[test]
fn test_yaml_settings_drive_controllers() {
    let config: SynthConfig = serde_yaml::from_str(
        r#"
controllers:
  office_fan: remote.office_rm
emit_buttons: false
"#,
    )
    .unwrap();
    let input = CompileInput::new(
        serde_json::from_value(json!({
            "office_fan": {"fan_off": "a", "mystery_mode": "b"},
            "porch_light": {"light_toggle": "c"}
        }))
        .unwrap(),
    );
    let compilation = compile(&input, &config).unwrap();

    let fan = compilation.document.entity(&id("fan.office_fan")).unwrap();
    assert_eq!(fan.entity.controller, Some(id("remote.office_rm")));
    assert_eq!(compilation.report.count(EntityType::Button), 0);
    let skipped: Vec<&SkipReason> = compilation
        .report
        .skipped
        .iter()
        .map(|s| &s.reason)
        .collect();
    assert_eq!(skipped, vec![&SkipReason::NoController]);
}
