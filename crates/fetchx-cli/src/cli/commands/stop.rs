//! `fetchx stop` – stop the job and discard its state.

use anyhow::Result;
use fetchx_core::control::default_control_socket_path;
use fetchx_core::controller::JobController;

use crate::cli::control_socket::{self, SocketCommand};

pub async fn run_stop(controller: &JobController) -> Result<()> {
    let socket = default_control_socket_path()?;
    if control_socket::send_command(&socket, SocketCommand::Stop).await? {
        println!("Stop requested.");
        return Ok(());
    }
    if controller.stop().await? {
        println!("Job stopped and discarded.");
    } else {
        println!("No active job.");
    }
    Ok(())
}
