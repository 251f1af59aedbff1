//! Integration tests for the reset button hold thresholds.
//!
//! Run with: cargo test --package doorman-controller --test reset_button

mod common;

use common::{TestDoor, ms, secs};
use doorman_controller::SystemRequest;
use doorman_core::AuthorizedUser;
use doorman_storage::SettingsDocument;

fn press(door: &mut TestDoor) {
    door.reset.set_level(false);
    assert_eq!(door.tick(), None);
}

fn release(door: &mut TestDoor) -> Vec<SystemRequest> {
    door.reset.set_level(true);
    door.advance(ms(100))
}

#[test]
fn test_release_before_short_threshold_does_nothing() {
    let mut door = TestDoor::new();
    press(&mut door);

    assert!(door.advance(ms(4000)).is_empty());
    assert!(release(&mut door).is_empty());
    assert!(!door.logged("Manual reboot"));
    assert!(!door.logged("Factory reset (settings cleared)"));
}

#[test]
fn test_short_hold_requests_reboot_on_release() {
    let mut door = TestDoor::new();
    press(&mut door);

    assert!(door.advance(ms(4990)).is_empty());
    assert!(!door.logged("Manual reboot"));

    assert!(door.advance(ms(10)).is_empty());
    assert_eq!(door.count("Manual reboot"), 1);

    assert!(door.advance(ms(1000)).is_empty());
    assert_eq!(release(&mut door), vec![SystemRequest::Reboot]);
    assert_eq!(door.count("Manual reboot"), 1);
}

#[test]
fn test_long_hold_factory_resets_once() {
    let mut document = SettingsDocument::default();
    document.access = vec![AuthorizedUser::new("alice", "12345")];
    let mut door = TestDoor::with_document(document);
    press(&mut door);

    assert!(door.advance(secs(5)).is_empty());
    assert_eq!(door.count("Manual reboot"), 1);

    let requests = door.advance(secs(25));
    assert_eq!(requests, vec![SystemRequest::FactoryReset]);
    assert_eq!(door.count("Factory reset (settings cleared)"), 1);
    assert_eq!(door.count("Manual reboot"), 1);
    assert!(door.store.document().is_none());

    // Releasing after the long hold requests nothing further.
    assert!(release(&mut door).is_empty());
}

#[test]
fn test_each_press_rearms_thresholds() {
    let mut door = TestDoor::new();

    press(&mut door);
    door.advance(secs(5));
    assert_eq!(release(&mut door), vec![SystemRequest::Reboot]);

    press(&mut door);
    door.advance(secs(5));
    assert_eq!(release(&mut door), vec![SystemRequest::Reboot]);
    assert_eq!(door.count("Manual reboot"), 2);
}
