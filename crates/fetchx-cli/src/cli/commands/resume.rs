//! `fetchx resume` – continue the paused job in the foreground.

use anyhow::{bail, Context, Result};
use fetchx_core::control::default_control_socket_path;
use fetchx_core::controller::JobController;
use std::sync::Arc;

use super::host::host_job;
use crate::cli::control_socket::{self, ControlSocket};

pub async fn run_resume(controller: Arc<JobController>) -> Result<()> {
    let socket = default_control_socket_path()?;
    if control_socket::is_live(&socket).await {
        bail!("the job is already running in another fetchx process");
    }
    let listener = ControlSocket::bind(Arc::clone(&controller), &socket).context("control socket")?;
    let events = controller.events();
    let handle = controller.resume().await?;
    if let Some(job) = controller.status().await? {
        println!(
            "Resuming \"{}\" at {}/{}",
            job.query, job.total_downloaded, job.target_count
        );
    }
    host_job(controller, handle, events, listener).await
}
