use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use recursion_core::pipeline::{Stage, StageEvent, StageStatus};
use tokio::sync::mpsc::UnboundedReceiver;

/// Draws one spinner per pipeline stage until every sender is dropped.
pub async fn render(mut events: UnboundedReceiver<StageEvent>) {
    let multi = MultiProgress::new();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let mut spinners: HashMap<Stage, ProgressBar> = HashMap::new();

    while let Some(StageEvent { stage, status }) = events.recv().await {
        match status {
            StageStatus::Pending => {
                let spinner = multi.add(ProgressBar::new_spinner());
                spinner.set_style(style.clone());
                spinner.set_message(format!("{stage}..."));
                spinner.enable_steady_tick(Duration::from_millis(100));
                spinners.insert(stage, spinner);
            }
            terminal => {
                let message = match terminal {
                    StageStatus::Succeeded => format!("{stage} succeeded"),
                    StageStatus::Rejected => format!("{stage}: proof did not verify"),
                    StageStatus::Failed(reason) => format!("{stage} failed: {reason}"),
                    StageStatus::Pending => continue,
                };
                match spinners.remove(&stage) {
                    Some(spinner) => spinner.finish_with_message(message),
                    None => {
                        let _ = multi.println(message);
                    }
                }
            }
        }
    }

    for spinner in spinners.into_values() {
        spinner.abandon();
    }
}
