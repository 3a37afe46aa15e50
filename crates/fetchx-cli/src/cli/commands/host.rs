//! Foreground hosting of a job loop: progress output, control socket, Ctrl-C.

use anyhow::Result;
use fetchx_core::controller::{JobController, RunHandle};
use fetchx_core::events::JobEvent;
use fetchx_core::orchestrator::RunExit;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

use crate::cli::control_socket::ControlSocket;

const PROGRESS_INTERVAL_MS: u128 = 500;

/// Runs until the job loop exits, then reports how it ended. `socket` is
/// bound before the loop starts and released on return.
pub(super) async fn host_job(
    controller: Arc<JobController>,
    handle: RunHandle,
    mut events: broadcast::Receiver<JobEvent>,
    socket: ControlSocket,
) -> Result<()> {
    let interrupt = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("\nPausing after the current item...");
                if let Err(e) = controller.pause().await {
                    tracing::warn!("pause on interrupt: {}", e);
                }
            }
        })
    };

    let progress = tokio::spawn(async move {
        let mut last_print: Option<Instant> = None;
        loop {
            match events.recv().await {
                Ok(JobEvent::Progress(stats)) => {
                    let due = last_print.map_or(true, |t| t.elapsed().as_millis() >= PROGRESS_INTERVAL_MS);
                    if due || stats.downloaded >= stats.target {
                        println!(
                            "  {}/{} ({:.1}%)",
                            stats.downloaded,
                            stats.target,
                            stats.fraction() * 100.0
                        );
                        last_print = Some(Instant::now());
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => tracing::debug!("progress output skipped {} events", n),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let exit = handle.finished().await;

    interrupt.abort();
    progress.abort();
    drop(socket);

    let job = controller.status().await?;
    match exit {
        RunExit::Done(reason) => {
            let (downloaded, target) = job.map(|j| (j.total_downloaded, j.target_count)).unwrap_or_default();
            println!("Done: {downloaded}/{target} downloaded ({reason}).");
            if !reason.target_met() {
                println!("Fewer assets were available than requested.");
            }
            println!("Run `fetchx ack` to clear the job.");
        }
        RunExit::Paused(reason) => {
            println!("Paused: {reason}. Run `fetchx resume` to continue.");
        }
        RunExit::Stopped => println!("Stopped; job discarded."),
    }
    Ok(())
}
