//! Cooperative job control: a shared run/pause/stop signal.
//!
//! The controller holds a [`JobControl`] for the running loop; the loop holds
//! the matching [`ControlToken`] and checks it at every suspension point.
//! Nothing is interrupted forcibly: an in-flight transfer always finishes (or
//! times out) before the loop honors a request.

use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;

/// Requested state of the job loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Run,
    /// Stop cleanly and keep the job persisted as paused.
    Pause,
    /// Stop and discard; the loop must not persist anything more.
    Stop,
}

/// Sending side, owned by the controller.
#[derive(Debug)]
pub struct JobControl {
    tx: watch::Sender<Signal>,
}

impl Default for JobControl {
    fn default() -> Self {
        Self::new()
    }
}

impl JobControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Signal::Run);
        Self { tx }
    }

    /// Token for the loop. Create it before launching so no request is missed.
    pub fn subscribe(&self) -> ControlToken {
        ControlToken {
            rx: self.tx.subscribe(),
        }
    }

    pub fn request_pause(&self) {
        // Stop wins over a later pause.
        self.tx.send_if_modified(|s| {
            if *s == Signal::Run {
                *s = Signal::Pause;
                true
            } else {
                false
            }
        });
    }

    pub fn request_stop(&self) {
        self.tx.send_replace(Signal::Stop);
    }

    pub fn current(&self) -> Signal {
        *self.tx.borrow()
    }
}

/// Receiving side, owned by the job loop.
#[derive(Debug, Clone)]
pub struct ControlToken {
    rx: watch::Receiver<Signal>,
}

impl ControlToken {
    pub fn current(&self) -> Signal {
        *self.rx.borrow()
    }

    pub fn is_run(&self) -> bool {
        self.current() == Signal::Run
    }

    /// Sleep for `d`, waking early if a pause or stop arrives. Returns the signal in force.
    pub async fn sleep(&mut self, d: Duration) -> Signal {
        if d.is_zero() || !self.is_run() {
            return self.current();
        }
        let rx = &mut self.rx;
        tokio::select! {
            _ = tokio::time::sleep(d) => {}
            // A dropped controller leaves only the timer.
            Ok(_) = rx.wait_for(|s| *s != Signal::Run) => {}
        }
        self.current()
    }
}

/// Default path for the control socket of a foreground job process.
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("fetchx")?.get_state_home();
    Ok(dir.join("control.sock"))
}
