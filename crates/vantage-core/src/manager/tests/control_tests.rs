use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::sync::Notify;

use crate::error::Error;
use crate::manager::RunMode;
use crate::tests::common::{Fixture, group, schema, set};

fn pausing_group(id: &str) -> serde_json::Value {
    let document = set(group(id, 0), &["data", "check"], json!(["fail", "pass"]));
    let document = set(document, &["data", "fix"], json!("fail"));
    set(document, &["pause_if_fix_failed"], json!(true))
}

#[tokio::test]
async fn test_failed_fix_pauses_and_retries_check() {
    let fixture = Fixture::new();
    let mut manager = fixture.manager(schema(vec![pausing_group("g1"), group("g2", 0)], 0));
    let control = manager.control();

    let paused = Arc::new(Mutex::new(Vec::new()));
    let paused_clone = paused.clone();
    let _sub = manager.events().subscribe_run_paused(move |is_paused| {
        paused_clone.lock().unwrap().push(is_paused);
        if is_paused {
            control.resume();
        }
    });

    assert!(manager.run_all().await.unwrap());

    assert_eq!(*paused.lock().unwrap(), vec![true, false]);
    assert_eq!(fixture.tracker.count("g1.check"), 2);
    assert_eq!(fixture.tracker.count("g1.fix"), 1);
    // Selectors run for the check, the fix and the retried check
    assert_eq!(fixture.tracker.count("g1_sel.select"), 3);
    assert_eq!(fixture.tracker.count("g2.check"), 1);
    assert!(!manager.is_paused());
}

#[tokio::test]
async fn test_resume_from_another_task() {
    let fixture = Fixture::new();
    let mut manager = fixture.manager(schema(vec![pausing_group("g1")], 0));
    let control = manager.control();

    let paused = Arc::new(Notify::new());
    let paused_clone = paused.clone();
    let _sub = manager.events().subscribe_run_paused(move |is_paused| {
        if is_paused {
            paused_clone.notify_one();
        }
    });

    let run = tokio::spawn(async move { manager.run_all().await });

    paused.notified().await;
    assert!(control.is_paused());
    assert!(control.is_running());
    assert_eq!(fixture.tracker.count("g1.check"), 1);

    control.resume();
    assert!(run.await.unwrap().unwrap());
    assert_eq!(fixture.tracker.count("g1.check"), 2);
    assert!(!control.is_running());
}

#[tokio::test]
async fn test_stop_while_paused() {
    let fixture = Fixture::new();
    let mut manager = fixture.manager(schema(vec![pausing_group("g1"), group("g2", 0)], 0));
    let control = manager.control();

    let stopped = Arc::new(AtomicU32::new(0));
    let stopped_clone = stopped.clone();
    let _stopped_sub = manager.events().subscribe_run_stopped(move || {
        stopped_clone.fetch_add(1, Ordering::SeqCst);
    });
    let paused = Arc::new(Mutex::new(Vec::new()));
    let paused_clone = paused.clone();
    let stop_control = control.clone();
    let _paused_sub = manager.events().subscribe_run_paused(move |is_paused| {
        paused_clone.lock().unwrap().push(is_paused);
        if is_paused {
            stop_control.stop();
        }
    });

    let err = manager.run_all().await.unwrap_err();

    assert!(err.is_stopped());
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
    // The run ends unpaused and observers hear about it
    assert!(!manager.is_paused());
    assert!(!control.is_paused());
    assert_eq!(*paused.lock().unwrap(), vec![true, false]);
    assert_eq!(fixture.tracker.count("g1.check"), 1);
    assert_eq!(fixture.tracker.count("g2.check"), 0);
    assert_eq!(manager.schema().finished(), (false, "Stopped validation"));
}

#[tokio::test]
async fn test_stop_mid_stage_skips_later_stages() {
    let fixture = Fixture::new();
    let waiting = set(group("g1", 1), &["data", "wait"], json!(true));
    let mut manager = fixture.manager(schema(vec![waiting, group("g2", 0)], 1));
    let control = manager.control();

    let stopped = Arc::new(AtomicU32::new(0));
    let stopped_clone = stopped.clone();
    let _stopped_sub = manager.events().subscribe_run_stopped(move || {
        stopped_clone.fetch_add(1, Ordering::SeqCst);
    });
    let finished = Arc::new(Mutex::new(Vec::new()));
    let finished_clone = finished.clone();
    let _finished_sub = manager.events().subscribe_run_finished(move |success, _| {
        finished_clone.lock().unwrap().push(success);
    });

    let run = tokio::spawn(async move { manager.run_all().await });

    fixture.gate.entered.notified().await;
    control.stop();
    fixture.gate.release.notify_one();

    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(err.is_stopped());
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
    assert_eq!(*finished.lock().unwrap(), vec![false]);
    assert_eq!(fixture.tracker.count("g1.check"), 1);
    assert_eq!(fixture.tracker.count("g1_ctx.on_exit"), 0);
    assert_eq!(fixture.tracker.count("g1_res0.result"), 0);
    assert_eq!(fixture.tracker.count("g2.check"), 0);
    assert_eq!(fixture.tracker.count("top_res0.result"), 0);
}

#[tokio::test]
async fn test_new_run_takes_over_abandoned_run() {
    let fixture = Fixture::new();
    let waiting = set(group("g3", 0), &["data", "wait"], json!(true));
    let mut manager = fixture.manager(schema(vec![group("g1", 0), group("g2", 0), waiting], 0));
    let target = manager.schema().resolve("check[2]").unwrap();

    // Abandon a run while it waits inside g3's check
    let targets = [target];
    tokio::select! {
        _ = manager.run(RunMode::OnlySelected, &targets) => panic!("run should still be waiting"),
        _ = fixture.gate.entered.notified() => {}
    }
    assert!(manager.is_running());

    // The mode-modified flags of the abandoned run do not leak into the next one
    fixture.gate.release.notify_one();
    assert!(manager.run_all().await.unwrap());

    assert_eq!(fixture.tracker.count("g1.check"), 1);
    assert_eq!(fixture.tracker.count("g2.check"), 1);
    assert_eq!(fixture.tracker.count("g3.check"), 2);
    assert!(!manager.is_running());
    assert!(!manager.control().is_stop_requested());
}

#[tokio::test]
async fn test_abandoned_run_leaves_declared_flags() {
    let fixture = Fixture::new();
    let waiting = set(group("g3", 0), &["data", "wait"], json!(true));
    let document = schema(vec![group("g1", 0), group("g2", 0), waiting], 0);
    let mut manager = fixture.manager(document.clone());
    let target = manager.schema().resolve("check[2]").unwrap();

    let targets = [target];
    tokio::select! {
        _ = manager.run(RunMode::OnlySelected, &targets) => panic!("run should still be waiting"),
        _ = fixture.gate.entered.notified() => {}
    }

    // Between runs the schema shows its declared flags, not the mode's
    assert!(manager.schema().check_groups[0].is_enabled());
    assert!(manager.document().check_plugins[1].enabled);

    let partial = set(document, &["check_plugins", "0", "enabled"], json!(false));
    manager.update(&partial).unwrap();
    assert!(!manager.schema().check_groups[0].is_enabled());

    fixture.gate.release.notify_one();
    assert!(manager.run_all().await.unwrap());

    // The update survives the next run
    assert_eq!(fixture.tracker.count("g1.check"), 0);
    assert_eq!(fixture.tracker.count("g2.check"), 1);
    assert_eq!(fixture.tracker.count("g3.check"), 2);
    assert!(!manager.schema().check_groups[0].is_enabled());
    assert!(!manager.document().check_plugins[0].enabled);
}

#[tokio::test]
async fn test_pause_and_resume_fire_only_on_change() {
    let fixture = Fixture::new();
    let manager = fixture.manager(schema(vec![group("g1", 0)], 0));

    let paused = Arc::new(Mutex::new(Vec::new()));
    let paused_clone = paused.clone();
    let _sub = manager
        .events()
        .subscribe_run_paused(move |is_paused| paused_clone.lock().unwrap().push(is_paused));

    manager.pause();
    manager.pause();
    assert!(manager.is_paused());
    manager.resume();
    manager.resume();

    assert_eq!(*paused.lock().unwrap(), vec![true, false]);
}
