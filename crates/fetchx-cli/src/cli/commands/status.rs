//! `fetchx status` – show the active job.

use anyhow::Result;
use fetchx_core::control::default_control_socket_path;
use fetchx_core::controller::JobController;
use fetchx_core::events::ProgressStats;
use fetchx_core::job::{unix_timestamp, JobState, JobStatus};
use std::fmt::Write;

use crate::cli::control_socket;

pub async fn run_status(controller: &JobController) -> Result<()> {
    // A job marked running with nobody hosting it was interrupted.
    let socket = default_control_socket_path()?;
    if !control_socket::is_live(&socket).await {
        controller.recover_stranded().await?;
    }
    match controller.status().await? {
        Some(job) => {
            let age = controller
                .last_saved()
                .await?
                .map(|saved| unix_timestamp().saturating_sub(saved).max(0));
            print!("{}", render(&job, age));
        }
        None => println!("No active job."),
    }
    Ok(())
}

/// `saved_secs_ago` is the age of the last checkpoint, when known.
pub(crate) fn render(job: &JobState, saved_secs_ago: Option<i64>) -> String {
    let stats = ProgressStats::from_job(job);
    let state = match (job.status, job.pause_reason, job.done_reason) {
        (JobStatus::Paused, Some(reason), _) => format!("paused ({reason})"),
        (JobStatus::Done, _, Some(reason)) => format!("done ({reason})"),
        (status, _, _) => status.to_string(),
    };
    let mut out = String::new();
    let _ = writeln!(out, "{:<10} \"{}\" ({})", "QUERY", job.query, job.media_type);
    let _ = writeln!(out, "{:<10} {}", "STATE", state);
    let _ = writeln!(
        out,
        "{:<10} {}/{} ({:.1}%), {} to go",
        "PROGRESS",
        stats.downloaded,
        stats.target,
        stats.fraction() * 100.0,
        job.remaining()
    );
    if let Some(age) = saved_secs_ago {
        let _ = writeln!(out, "{:<10} {}s ago", "UPDATED", age);
    }
    let _ = writeln!(out, "{:<10} {:<6} {:<11} {}", "PROVIDER", "PAGE", "DOWNLOADED", "STATE");
    for (provider, p) in &job.providers {
        let state = if !provider.supports(job.media_type) {
            "unsupported"
        } else if p.exhausted {
            "exhausted"
        } else {
            "active"
        };
        let _ = writeln!(out, "{:<10} {:<6} {:<11} {}", provider.as_str(), p.page, p.downloaded, state);
    }
    out
}
