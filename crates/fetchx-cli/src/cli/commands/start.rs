//! `fetchx start <query> --count N` – create a job and host it in the foreground.

use anyhow::{bail, Context, Result};
use fetchx_core::control::default_control_socket_path;
use fetchx_core::controller::JobController;
use std::sync::Arc;

use super::host::host_job;
use crate::cli::control_socket::{self, ControlSocket};

pub async fn run_start(controller: Arc<JobController>, query: &str, media_type: &str, count: u64) -> Result<()> {
    let socket = default_control_socket_path()?;
    if control_socket::is_live(&socket).await {
        bail!("a job is already running in another fetchx process; use `fetchx status`");
    }
    if let Some(job) = controller.recover_stranded().await? {
        tracing::info!(query = %job.query, "previous job was interrupted");
    }

    // A hosted job always has a live socket.
    let listener = ControlSocket::bind(Arc::clone(&controller), &socket).context("control socket")?;
    let events = controller.events();
    let handle = controller.start(query, media_type, count).await?;
    println!("Downloading {count} {} for \"{}\"", media_type_label(media_type), query.trim());
    host_job(controller, handle, events, listener).await
}

fn media_type_label(input: &str) -> &'static str {
    fetchx_core::provider::MediaType::normalize(input).as_str()
}
