//! Control socket: server (while `fetchx start`/`resume` hosts a job) and
//! client (for `fetchx pause`/`stop` from another shell).
//! Protocol: one command per line, "pause" or "stop".

use anyhow::{Context, Result};
use fetchx_core::controller::JobController;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Command accepted on the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketCommand {
    Pause,
    Stop,
}

impl SocketCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "pause" => Some(SocketCommand::Pause),
            "stop" => Some(SocketCommand::Stop),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SocketCommand::Pause => "pause",
            SocketCommand::Stop => "stop",
        }
    }
}

/// Listening control socket of a foreground job. Dropping it stops the
/// listener and removes the socket file.
#[derive(Debug)]
pub struct ControlSocket {
    path: PathBuf,
    listener: tokio::task::JoinHandle<()>,
}

impl ControlSocket {
    /// Binds `path` and forwards each command to the controller. Ignores
    /// malformed lines.
    pub fn bind(controller: Arc<JobController>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).with_context(|| format!("bind {}", path.display()))?;
        let listener = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        let controller = Arc::clone(&controller);
                        tokio::spawn(async move {
                            let mut reader = BufReader::new(stream).lines();
                            while let Ok(Some(line)) = reader.next_line().await {
                                let Some(cmd) = SocketCommand::parse(&line) else {
                                    tracing::debug!("control socket: ignoring {:?}", line);
                                    continue;
                                };
                                tracing::info!("control socket: {}", cmd.as_str());
                                let result = match cmd {
                                    SocketCommand::Pause => controller.pause().await.map(|_| ()),
                                    SocketCommand::Stop => controller.stop().await.map(|_| ()),
                                };
                                if let Err(e) = result {
                                    tracing::warn!("control socket {}: {}", cmd.as_str(), e);
                                }
                            }
                        });
                    }
                    Err(e) => tracing::debug!("control socket accept: {}", e),
                }
            }
        });
        tracing::debug!(path = %path.display(), "control socket listening");
        Ok(Self { path, listener })
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        self.listener.abort();
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Sends one command line. Returns false when no process is listening.
pub async fn send_command(socket_path: &Path, cmd: SocketCommand) -> Result<bool> {
    if !socket_path.exists() {
        return Ok(false);
    }
    let mut stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(path = %socket_path.display(), "stale control socket: {}", e);
            return Ok(false);
        }
    };
    stream.write_all(format!("{}\n", cmd.as_str()).as_bytes()).await?;
    stream.shutdown().await?;
    Ok(true)
}

/// True if a foreground process is hosting a job.
pub async fn is_live(socket_path: &Path) -> bool {
    socket_path.exists() && UnixStream::connect(socket_path).await.is_ok()
}
