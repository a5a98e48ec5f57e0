use serde_json::json;

use crate::autosave;
use crate::cli::open_app;
use crate::error::LifelockError;
use crate::output;

pub async fn run(json_output: bool) -> i32 {
    output::finish(run_inner(json_output).await, json_output)
}

async fn run_inner(json_output: bool) -> Result<i32, LifelockError> {
    let app = open_app()?;
    let interval = app.config().autosave_interval();
    if !json_output {
        println!(
            "Watching {} task(s), auto-save every {}s. Press Ctrl-C to stop.",
            app.tasks().len(),
            interval.as_secs()
        );
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C, stopping");
        }
    };
    // Ctrl-C is this process's page-hide: the runner saves once more on the way out.
    let saves = autosave::run(&app, interval, shutdown).await;
    let report = app.sync_engine().dispose().await;

    if json_output {
        output::print_json(&output::json::success(json!({
            "autosaves": saves,
            "sync": output::json::sync_report(&report)
        })));
    } else {
        println!("Stopped after {saves} auto-save(s).");
        output::text::print_sync_report(&report);
    }
    Ok(0)
}
