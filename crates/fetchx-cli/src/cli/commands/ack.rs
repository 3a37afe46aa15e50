//! `fetchx ack` – clear a finished job so a new one can start.

use anyhow::Result;
use fetchx_core::controller::JobController;

pub async fn run_ack(controller: &JobController) -> Result<()> {
    let job = controller.acknowledge().await?;
    println!(
        "Cleared finished job \"{}\" ({}/{})",
        job.query, job.total_downloaded, job.target_count
    );
    Ok(())
}
