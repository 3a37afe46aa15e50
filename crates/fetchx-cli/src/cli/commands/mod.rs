//! CLI command handlers, one file per command.

mod ack;
mod docs;
mod host;
mod pause;
mod resume;
mod start;
mod status;
mod stop;

pub use ack::run_ack;
pub use docs::{run_completions, run_man};
pub use pause::run_pause;
pub use resume::run_resume;
pub use start::run_start;
pub use status::run_status;
pub use stop::run_stop;

#[cfg(test)]
pub(crate) use status::render as render_status;
