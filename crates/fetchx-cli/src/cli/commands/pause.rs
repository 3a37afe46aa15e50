//! `fetchx pause` – pause the job. If a foreground process hosts it, signals that process.

use anyhow::Result;
use fetchx_core::control::default_control_socket_path;
use fetchx_core::controller::JobController;

use crate::cli::control_socket::{self, SocketCommand};

pub async fn run_pause(controller: &JobController) -> Result<()> {
    let socket = default_control_socket_path()?;
    if control_socket::send_command(&socket, SocketCommand::Pause).await? {
        println!("Pause requested; the job stops after the current item.");
        return Ok(());
    }
    let job = controller.pause().await?;
    println!("Paused \"{}\" at {}/{}", job.query, job.total_downloaded, job.target_count);
    Ok(())
}
