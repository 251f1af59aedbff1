//! Integration tests for commands, MQTT routing and persistence.
//!
//! Run with: cargo test --package doorman-controller --test commands

mod common;

use common::{TestDoor, ms, secs};
use doorman_controller::{Command, CommandReply, ControllerError, SystemRequest};
use doorman_core::{AuthorizedUser, Origin, Rule, RuleAction, Trigger, WiegandMode};
use doorman_storage::{SettingsDocument, SettingsPatch};
use rstest::{fixture, rstest};

fn log_rule(name: &str) -> Rule {
    Rule::new(name, Trigger::HttpEvent, name, RuleAction::Log, format!("{name} ran"))
}

#[fixture]
fn three_rules() -> TestDoor {
    let mut document = SettingsDocument::default();
    document.rules = vec![log_rule("a"), log_rule("b"), log_rule("c")];
    TestDoor::with_document(document)
}

#[rstest]
fn test_delete_middle_rule_shifts_indices(mut three_rules: TestDoor) {
    let door = &mut three_rules;
    let now = door.now;

    let reply = door
        .controller
        .execute(Command::DeleteRule { index: 1 }, Origin::Web, now)
        .unwrap();
    assert_eq!(reply, CommandReply::Done);

    assert_eq!(door.controller.rules(), &[log_rule("a"), log_rule("c")]);
    assert_eq!(door.store.document().unwrap().rules, vec![log_rule("a"), log_rule("c")]);

    door.controller
        .execute(Command::UpdateRule { index: 1, rule: log_rule("d") }, Origin::Web, now)
        .unwrap();
    assert_eq!(door.controller.rules()[1].name, "d");

    let missing = door
        .controller
        .execute(Command::DeleteRule { index: 2 }, Origin::Web, now);
    assert!(matches!(missing, Err(ControllerError::NotFound(_))));
}

#[rstest]
fn test_added_rule_applies_immediately(mut three_rules: TestDoor) {
    let door = &mut three_rules;
    let now = door.now;

    let reply = door
        .controller
        .execute(Command::AddRule(log_rule("bell")), Origin::Web, now)
        .unwrap();
    assert_eq!(reply, CommandReply::RuleIndex(3));

    door.controller
        .execute(Command::Event { name: "bell".to_string() }, Origin::Web, now)
        .unwrap();
    assert!(door.logged("bell ran"));
}

#[test]
fn test_user_mutations_are_persisted() {
    let mut door = TestDoor::new();
    let now = door.now;

    door.controller
        .execute(Command::AddUser(AuthorizedUser::new("alice", "12345")), Origin::Web, now)
        .unwrap();
    door.controller
        .execute(Command::AddUser(AuthorizedUser::new("alice", "555")), Origin::Mqtt, now)
        .unwrap();
    assert_eq!(door.store.save_count(), 2);
    assert_eq!(door.count("User alice added (Web)"), 1);
    assert_eq!(door.count("User alice added (MQTT)"), 1);

    let reply = door
        .controller
        .execute(Command::DeleteUser { name: "alice".to_string() }, Origin::Web, now)
        .unwrap();
    assert_eq!(reply, CommandReply::Removed(2));
    assert!(door.store.document().unwrap().access.is_empty());
    assert_eq!(door.count("User alice deleted (Web)"), 1);

    let again = door
        .controller
        .execute(Command::DeleteUser { name: "alice".to_string() }, Origin::Web, now);
    assert!(matches!(again, Err(ControllerError::NotFound(_))));
}

#[rstest]
#[case(AuthorizedUser::new("", "12345"))]
#[case(AuthorizedUser::new("alice", ""))]
fn test_incomplete_user_is_rejected(#[case] user: AuthorizedUser) {
    let mut door = TestDoor::new();
    let now = door.now;
    let result = door.controller.execute(Command::AddUser(user), Origin::Web, now);

    assert!(matches!(result, Err(ControllerError::Validation(_))));
    assert!(door.controller.users().is_empty());
    assert_eq!(door.store.save_count(), 0);
}

#[test]
fn test_failed_save_is_not_fatal() {
    let mut door = TestDoor::new();
    let now = door.now;
    door.store.set_failing(true);

    door.controller
        .execute(Command::AddUser(AuthorizedUser::new("bob", "1")), Origin::Web, now)
        .unwrap();

    assert_eq!(door.controller.users().len(), 1);
    assert!(door.log().iter().any(|line| line.contains("Settings save failed")));
}

#[test]
fn test_settings_update_saves_and_restarts() {
    let mut door = TestDoor::new();
    let now = door.now;

    let patch = SettingsPatch {
        relay_ms: Some(1500),
        wiegand_mode: Some(WiegandMode::Fixed(34)),
        ..SettingsPatch::default()
    };
    let reply = door
        .controller
        .execute(Command::UpdateSettings(patch), Origin::Web, now)
        .unwrap();
    assert_eq!(reply, CommandReply::Restarting);

    let saved = door.store.document().unwrap();
    assert_eq!(saved.device.relay_ms, 1500);
    assert_eq!(saved.device.wiegand_mode, WiegandMode::Fixed(34));
    assert!(door.logged("Settings updated"));

    assert_eq!(door.tick(), Some(SystemRequest::Restart));
    assert_eq!(door.tick(), None);
}

#[test]
fn test_invalid_settings_change_nothing() {
    let mut door = TestDoor::new();
    let now = door.now;

    let patch = SettingsPatch {
        relay_ms: Some(0),
        ssid: Some("office".to_string()),
        ..SettingsPatch::default()
    };
    let result = door.controller.execute(Command::UpdateSettings(patch), Origin::Web, now);

    assert!(matches!(result, Err(ControllerError::Validation(_))));
    assert_eq!(door.controller.settings().ssid, "");
    assert_eq!(door.tick(), None);
}

#[test]
fn test_open_and_lock() {
    let mut door = TestDoor::new();
    let now = door.now;

    let reply = door
        .controller
        .execute(Command::Open { pulse_ms: Some(5000) }, Origin::Web, now)
        .unwrap();
    assert!(matches!(reply, CommandReply::Pulse(_)));
    assert!(door.relay.level());

    let busy = door
        .controller
        .execute(Command::Open { pulse_ms: None }, Origin::Web, now);
    assert!(matches!(busy, Err(ControllerError::RelayBusy)));

    door.advance(ms(100));
    door.controller
        .execute(Command::Lock, Origin::Mqtt, door.now)
        .unwrap();
    assert!(!door.relay.level());
    assert!(!door.led.level());
    assert_eq!(door.count("Locked"), 1);

    // No stray release later.
    door.advance(secs(6));
    assert!(!door.logged("Relay OFF"));
}

#[test]
fn test_mqtt_messages_are_routed_and_logged() {
    let mut door = TestDoor::new();
    let now = door.now;

    let reply = door
        .controller
        .mqtt("doors/door/addaccess/bob/777", "", now)
        .unwrap();
    assert_eq!(reply, Some(CommandReply::Done));
    assert_eq!(door.controller.users(), &[AuthorizedUser::new("bob", "777")]);
    assert!(door.logged("MQTT [doors/door/addaccess/bob/777]: "));
    assert!(door.logged("User bob added (MQTT)"));

    let reply = door.controller.mqtt("doors/door/open", "1200", now).unwrap();
    assert!(matches!(reply, Some(CommandReply::Pulse(_))));

    assert_eq!(door.controller.mqtt("doors/other/open", "", now).unwrap(), None);
    assert_eq!(door.relay.activation_count(), 1);

    door.controller.mqtt("doors/door/deleteaccess/bob", "", now).unwrap();
    assert!(door.controller.users().is_empty());
    assert!(door.logged("User bob deleted (MQTT)"));
}

#[test]
fn test_schedule_rule_fires_on_interval() {
    let mut document = SettingsDocument::default();
    document.rules = vec![
        Rule::new("beat", Trigger::Schedule, "2", RuleAction::Log, "heartbeat"),
        Rule::new("bad", Trigger::Schedule, "often", RuleAction::Log, "never"),
    ];
    let mut door = TestDoor::with_document(document);

    assert_eq!(door.count("Schedule 'often': invalid interval"), 1);

    door.advance(ms(1990));
    assert!(!door.logged("heartbeat"));
    door.advance(ms(10));
    assert_eq!(door.count("heartbeat"), 1);
    door.advance(secs(4));
    assert_eq!(door.count("heartbeat"), 3);
}

#[test]
fn test_reload_after_restart_keeps_tables() {
    let mut door = TestDoor::new();
    let now = door.now;
    door.controller
        .execute(Command::AddUser(AuthorizedUser::new("alice", "12345")), Origin::Web, now)
        .unwrap();
    door.controller
        .execute(Command::AddRule(log_rule("a")), Origin::Web, now)
        .unwrap();

    let config = *door.controller.config();
    let restarted = TestDoor::build(config, door.store.clone());
    assert_eq!(restarted.controller.users(), door.controller.users());
    assert_eq!(restarted.controller.rules(), door.controller.rules());
}

#[test]
fn test_out_of_range_schedule_is_rejected_and_survives_reboot() {
    let mut door = TestDoor::new();
    let now = door.now;
    let huge = Rule::new("never", Trigger::Schedule, "18446744073709551615", RuleAction::Log, "");

    let reply = door
        .controller
        .execute(Command::AddRule(huge.clone()), Origin::Web, now)
        .unwrap();
    assert_eq!(reply, CommandReply::RuleIndex(0));
    assert_eq!(door.count("Schedule '18446744073709551615': invalid interval"), 1);
    assert!(door.advance(secs(2)).is_empty());

    // The stored rule loads again without taking the controller down.
    let config = *door.controller.config();
    let rebooted = TestDoor::build(config, door.store.clone());
    assert_eq!(rebooted.controller.rules(), &[huge]);
    assert_eq!(rebooted.count("Schedule '18446744073709551615': invalid interval"), 1);
}

#[test]
fn test_deleted_invalid_schedule_is_reported_when_added_again() {
    let mut door = TestDoor::new();
    let now = door.now;
    let rule = Rule::new("bad", Trigger::Schedule, "often", RuleAction::Log, "");

    door.controller
        .execute(Command::AddRule(rule.clone()), Origin::Web, now)
        .unwrap();
    door.controller
        .execute(Command::DeleteRule { index: 0 }, Origin::Web, now)
        .unwrap();
    door.controller
        .execute(Command::AddRule(rule), Origin::Web, now)
        .unwrap();

    assert_eq!(door.count("Schedule 'often': invalid interval"), 2);
}
