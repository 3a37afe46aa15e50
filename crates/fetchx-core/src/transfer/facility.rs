//! libcurl-backed transfer facility.
//!
//! Each transfer runs on its own OS thread, streams into `<dest>.<id>.part`
//! and renames to the final name on success. Completion is reported on the
//! handle's one-shot channel. A transfer outlives its executor timeout and
//! runs to completion in the background.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

use super::{ConflictPolicy, TransferError, TransferEvent, TransferFacility, TransferHandle, TransferRequest};

/// Downloads assets under a root directory.
#[derive(Debug)]
pub struct CurlTransfers {
    root: PathBuf,
    connect_timeout: Duration,
    next_id: AtomicU64,
}

impl CurlTransfers {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            connect_timeout: Duration::from_secs(15),
            next_id: AtomicU64::new(1),
        }
    }
}

impl TransferFacility for CurlTransfers {
    fn start(&self, request: TransferRequest) -> Result<TransferHandle, TransferError> {
        let url = url::Url::parse(&request.url).map_err(|e| TransferError::Rejected(format!("{}: {}", request.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransferError::Rejected(format!("unsupported scheme: {}", url.scheme())));
        }
        if request.destination.is_absolute() {
            return Err(TransferError::Rejected(format!(
                "destination must be relative: {}",
                request.destination.display()
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let dest = self.root.join(&request.destination);
        let conflict = request.conflict;
        let connect_timeout = self.connect_timeout;
        let (tx, rx) = oneshot::channel();

        std::thread::Builder::new()
            .name(format!("fetchx-transfer-{id}"))
            .spawn(move || {
                let event = match download_to(url.as_str(), &dest, id, conflict, connect_timeout) {
                    Ok(path) => TransferEvent::Completed { path: Some(path) },
                    Err(e) => {
                        tracing::debug!(transfer_id = id, "transfer failed: {:#}", e);
                        TransferEvent::Interrupted {
                            reason: format!("{:#}", e),
                        }
                    }
                };
                // The executor gave up at its timeout and counted this one already.
                if tx.is_closed() {
                    tracing::info!(transfer_id = id, ?event, "transfer finished after its timeout");
                }
                let _ = tx.send(event);
            })
            .map_err(|e| TransferError::Rejected(format!("spawn transfer thread: {}", e)))?;

        Ok(TransferHandle { id, completion: rx })
    }
}

/// First free path among `path`, `stem (1).ext`, `stem (2).ext`, ...
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let mut n = 1u32;
    loop {
        let name = match &ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = path.with_file_name(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

fn part_path(dest: &Path, id: u64) -> PathBuf {
    let mut o = dest.as_os_str().to_owned();
    o.push(format!(".{id}.part"));
    PathBuf::from(o)
}

/// Blocking GET of `url` into `dest`. Returns the final path.
fn download_to(
    url: &str,
    dest: &Path,
    id: u64,
    conflict: ConflictPolicy,
    connect_timeout: Duration,
) -> Result<PathBuf> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let part = part_path(dest, id);
    let result = fetch_into(url, &part, connect_timeout).and_then(|()| {
        let final_path = match conflict {
            ConflictPolicy::Uniquify => unique_path(dest),
        };
        fs::rename(&part, &final_path).with_context(|| format!("rename to {}", final_path.display()))?;
        Ok(final_path)
    });
    if result.is_err() {
        let _ = fs::remove_file(&part);
    }
    result
}

fn fetch_into(url: &str, part: &Path, connect_timeout: Duration) -> Result<()> {
    let mut file = fs::File::create(part).with_context(|| format!("create {}", part.display()))?;
    let mut write_err: Option<std::io::Error> = None;

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(connect_timeout)?;
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| match file.write_all(data) {
            Ok(()) => Ok(data.len()),
            Err(e) => {
                write_err = Some(e);
                Ok(0) // abort transfer
            }
        })?;
        let performed = transfer.perform();
        drop(transfer);
        if let Some(e) = write_err.take() {
            return Err(e).context("write asset");
        }
        performed.context("GET request failed")?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        anyhow::bail!("GET {} returned HTTP {}", url, code);
    }
    file.flush()?;
    Ok(())
}
