use super::at;
use crate::clock::{Clock, ManualClock};
use crate::debounce::Debouncer;

#[test]
fn fires_once_after_a_quiet_window() {
    let mut debouncer = Debouncer::new(1000);
    assert!(!debouncer.fire_if_due(at(5_000)));

    debouncer.schedule(at(0));
    assert!(debouncer.is_pending());
    assert!(!debouncer.fire_if_due(at(999)));
    assert!(debouncer.fire_if_due(at(1000)));
    assert!(!debouncer.is_pending());
    assert!(!debouncer.fire_if_due(at(2000)));
}

#[test]
fn later_edits_push_the_deadline_back() {
    let mut debouncer = Debouncer::new(1000);
    debouncer.schedule(at(0));
    debouncer.schedule(at(600));
    assert!(!debouncer.fire_if_due(at(1000)));
    assert_eq!(debouncer.deadline(), Some(at(1600)));
    assert!(debouncer.fire_if_due(at(1600)));
}

#[test]
fn cancel_drops_the_pending_save() {
    let mut debouncer = Debouncer::new(500);
    debouncer.schedule(at(0));
    debouncer.cancel();
    assert!(!debouncer.fire_if_due(at(10_000)));
}

#[test]
fn manual_clock_clones_share_time() {
    let clock = ManualClock::new(1_000);
    let other = clock.clone();
    clock.advance_ms(250);
    assert_eq!(other.now(), at(1_250));
    other.set_ms(0);
    assert_eq!(clock.now_ms(), 0);
}
