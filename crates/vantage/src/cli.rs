use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vantage_core::event::StageAction;
use vantage_core::{ManagerCore, Subscription};

/// Console front end of a run.
///
/// Prints progress and failed stages while the manager runs, and turns a
/// pause into a prompt on stdin: a line resumes the run, end of input stops it.
#[derive(Debug)]
pub struct CliReporter {
    _subscriptions: Vec<Subscription>,
    prompt: JoinHandle<()>,
}

impl CliReporter {
    pub fn attach(manager: &ManagerCore, print_progress: bool) -> Self {
        let events = manager.events();
        let mut subscriptions = Vec::new();

        if print_progress {
            subscriptions.push(events.subscribe_progress(|progress| {
                println!("Progress: {:.1}%", progress);
            }));
        }
        for action in [StageAction::Check, StageAction::Fix] {
            subscriptions.push(events.subscribe_stage(action, |stage| {
                if !stage.success {
                    println!("  {} {} at {}: {}", stage.plugin, stage.action, stage.location, stage.message);
                }
            }));
        }

        let (paused_tx, mut paused_rx) = mpsc::unbounded_channel();
        subscriptions.push(events.subscribe_run_paused(move |paused| {
            if paused {
                // The receiver only goes away once the run is over
                let _ = paused_tx.send(());
            }
        }));

        let control = manager.control();
        let prompt = tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while paused_rx.recv().await.is_some() {
                println!("Run paused after a failed fix. Press Enter to retry the check.");
                match lines.next_line().await {
                    Ok(Some(_)) => control.resume(),
                    Ok(None) => {
                        log::warn!("No more input, stopping validation");
                        control.stop();
                    }
                    Err(e) => {
                        log::error!("Failed to read from stdin: {}", e);
                        control.stop();
                    }
                }
            }
        });

        Self {
            _subscriptions: subscriptions,
            prompt,
        }
    }
}

impl Drop for CliReporter {
    fn drop(&mut self) {
        self.prompt.abort();
    }
}
