use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::event::{EventBus, EventKind, StageAction, StageEvent, ValidationEvent};
use crate::schema::{InstanceId, StageLocation};

fn stage_event(action: StageAction) -> ValidationEvent {
    ValidationEvent::Stage(StageEvent {
        instance: InstanceId::next(),
        location: StageLocation::GroupCheck(0),
        plugin: "mock".to_string(),
        action,
        success: true,
        message: "ok".to_string(),
    })
}

#[test]
fn test_subscribe_receives_every_event() {
    let bus = EventBus::new();
    let names = Arc::new(Mutex::new(Vec::new()));
    let names_clone = names.clone();
    let _sub = bus.subscribe(move |event| names_clone.lock().unwrap().push(event.name()));

    bus.emit(&ValidationEvent::RunStarted);
    bus.emit(&ValidationEvent::Progress(12.5));
    bus.emit(&ValidationEvent::RunStopped);

    assert_eq!(
        *names.lock().unwrap(),
        vec!["run.started", "run.progress", "run.stopped"]
    );
}

#[test]
fn test_kind_filter() {
    let bus = EventBus::new();
    let count = Arc::new(AtomicU32::new(0));
    let count_clone = count.clone();
    let _sub = bus.subscribe_kind(EventKind::RunPaused, move |_| {
        count_clone.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(&ValidationEvent::RunStarted);
    bus.emit(&ValidationEvent::RunPaused(true));
    bus.emit(&ValidationEvent::RunPaused(false));

    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_typed_helpers() {
    let bus = EventBus::new();
    let finished = Arc::new(Mutex::new(Vec::new()));
    let progress = Arc::new(Mutex::new(Vec::new()));

    let finished_clone = finished.clone();
    let _finished_sub = bus.subscribe_run_finished(move |success, message| {
        finished_clone
            .lock()
            .unwrap()
            .push((success, message.map(str::to_string)));
    });
    let progress_clone = progress.clone();
    let _progress_sub = bus.subscribe_progress(move |value| progress_clone.lock().unwrap().push(value));

    bus.emit(&ValidationEvent::Progress(50.0));
    bus.emit(&ValidationEvent::RunFinished { success: false, message: Some("boom".into()) });

    assert_eq!(*progress.lock().unwrap(), vec![50.0]);
    assert_eq!(*finished.lock().unwrap(), vec![(false, Some("boom".to_string()))]);
}

#[test]
fn test_stage_helpers_filter_by_action() {
    let bus = EventBus::new();
    let fixes = Arc::new(AtomicU32::new(0));
    let fixes_clone = fixes.clone();
    let _sub = bus.subscribe_fix(move |event| {
        assert_eq!(event.action, StageAction::Fix);
        fixes_clone.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(&stage_event(StageAction::Check));
    bus.emit(&stage_event(StageAction::Fix));
    bus.emit(&stage_event(StageAction::Select));

    assert_eq!(fixes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_subscription_drop_unsubscribes() {
    let bus = EventBus::new();
    let count = Arc::new(AtomicU32::new(0));
    let count_clone = count.clone();
    let sub = bus.subscribe_run_started(move || {
        count_clone.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(bus.handler_count(), 1);

    bus.emit(&ValidationEvent::RunStarted);
    drop(sub);
    bus.emit(&ValidationEvent::RunStarted);

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(bus.handler_count(), 0);
}

#[test]
fn test_explicit_unsubscribe_and_detach() {
    let bus = EventBus::new();
    let sub = bus.subscribe(|_| {});
    let id = sub.id();
    sub.detach();
    assert_eq!(bus.handler_count(), 1);

    assert!(bus.unsubscribe(id));
    assert!(!bus.unsubscribe(id));

    let sub = bus.subscribe(|_| {});
    sub.unsubscribe();
    assert_eq!(bus.handler_count(), 0);
}

#[test]
fn test_handler_may_unsubscribe_reentrantly() {
    let bus = EventBus::new();
    let slot: Arc<Mutex<Option<crate::event::Subscription>>> = Arc::new(Mutex::new(None));
    let slot_clone = slot.clone();
    let sub = bus.subscribe(move |_| {
        // Dropping our own guard from inside the handler must not deadlock
        slot_clone.lock().unwrap().take();
    });
    *slot.lock().unwrap() = Some(sub);

    bus.emit(&ValidationEvent::RunStarted);
    assert_eq!(bus.handler_count(), 0);
}

#[test]
fn test_clear_drops_all_handlers() {
    let bus = EventBus::new();
    let _a = bus.subscribe(|_| {});
    let _b = bus.subscribe_run_stopped(|| {});
    bus.clear();
    assert_eq!(bus.handler_count(), 0);
}
