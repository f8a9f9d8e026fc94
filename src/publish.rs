//! Publishing: push a finished artifact to the remote file store.
//!
//! The store is addressed by a relative path `<root>/<DDMMYYYY>/<doc>.<ext>`.
//! Every directory segment is entered if it exists and created otherwise,
//! so concurrent publishes into the same day directory both succeed.
//!
//! [`Publisher`] is synchronous; the orchestrator drives it on the blocking
//! pool through [`publish_blocking`], which also applies the optional
//! whole-operation timeout.

use crate::config::FtpConfig;
use crate::error::PublishError;
use chrono::NaiveDate;
use std::fs::File;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use suppaftp::types::FileType;
use suppaftp::FtpStream;
use tracing::{debug, info, warn};

/// A remote store that accepts one file at a relative path.
pub trait Publisher: Send + Sync {
    /// Store the file at `local` under `remote_path`, creating missing directories.
    fn publish(&self, local: &Path, remote_path: &str) -> Result<(), PublishError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Remote path for an artifact published on `date`.
///
/// ```rust
/// use chrono::NaiveDate;
/// use slides_export::publish::remote_path;
///
/// let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
/// assert_eq!(remote_path("SS_DL", date, "my-deck", "pdf"), "SS_DL/07032025/my-deck.pdf");
/// ```
pub fn remote_path(root: &str, date: NaiveDate, doc_short_name: &str, extension: &str) -> String {
    format!(
        "{}/{}/{}.{}",
        root.trim_matches('/'),
        date.format("%d%m%Y"),
        doc_short_name,
        extension
    )
}

/// Split `remote_path` into its directory segments and file name.
fn split_remote(remote_path: &str) -> Result<(Vec<&str>, &str), PublishError> {
    let mut segments: Vec<&str> = remote_path.split('/').filter(|s| !s.is_empty()).collect();
    let file_name = segments.pop().ok_or_else(|| PublishError::Store {
        remote_path: remote_path.to_string(),
        reason: "empty remote path".to_string(),
    })?;
    if let Some(bad) = segments
        .iter()
        .chain(std::iter::once(&file_name))
        .find(|s| **s == "." || **s == "..")
    {
        return Err(PublishError::CreateDir {
            dir: bad.to_string(),
            reason: "relative segment not allowed".to_string(),
        });
    }
    Ok((segments, file_name))
}

/// Run `publisher` on the blocking pool, optionally bounded by `timeout_secs`.
///
/// On timeout the transfer thread is left to finish on its own; only the
/// caller stops waiting.
pub async fn publish_blocking(
    publisher: Arc<dyn Publisher>,
    local: PathBuf,
    remote_path: String,
    timeout_secs: Option<u64>,
) -> Result<(), PublishError> {
    let target = remote_path.clone();
    let name = publisher.name();
    let task = tokio::task::spawn_blocking(move || publisher.publish(&local, &remote_path));

    let joined = match timeout_secs {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("{} publish of {} timed out after {}s", name, target, secs);
                return Err(PublishError::Timeout { secs });
            }
        },
        None => task.await,
    };

    joined.map_err(|e| PublishError::Store {
        remote_path: target,
        reason: format!("publish task panicked: {e}"),
    })?
}

// ── FTP ──────────────────────────────────────────────────────────────────

/// Push-upload to an FTP server.
#[derive(Debug, Clone)]
pub struct FtpPublisher {
    config: FtpConfig,
    connect_timeout: Duration,
}

impl FtpPublisher {
    pub fn new(config: FtpConfig, connect_timeout: Duration) -> Self {
        Self {
            config,
            connect_timeout,
        }
    }

    /// Resolve the host and open the control connection.
    ///
    /// Name resolution and the TCP connect share one `connect_timeout`
    /// budget. A lookup that outlives it is abandoned on its helper thread.
    fn connect(&self) -> Result<(FtpStream, SocketAddr), PublishError> {
        if self.config.host.trim().is_empty() {
            return Err(PublishError::NotConfigured("FTP_HOST is not set".to_string()));
        }
        let target = format!("{}:{}", self.config.host, self.config.port);
        let deadline = Instant::now() + self.connect_timeout;

        let addr = resolve_within(&target, self.connect_timeout)?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(PublishError::Connect {
                addr: target,
                reason: "connection phase timed out".to_string(),
            });
        }

        let stream = FtpStream::connect_timeout(addr, remaining).map_err(|e| {
            PublishError::Connect {
                addr: addr.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok((stream, addr))
    }

    fn upload(
        &self,
        ftp: &mut FtpStream,
        local: &Path,
        remote_path: &str,
    ) -> Result<(), PublishError> {
        let (dirs, file_name) = split_remote(remote_path)?;

        ftp.cwd("/").map_err(|e| PublishError::CreateDir {
            dir: "/".to_string(),
            reason: e.to_string(),
        })?;
        for dir in dirs {
            if ftp.cwd(dir).is_err() {
                debug!("Creating remote directory {}", dir);
                ftp.mkdir(dir)
                    .and_then(|_| ftp.cwd(dir))
                    .map_err(|e| PublishError::CreateDir {
                        dir: dir.to_string(),
                        reason: e.to_string(),
                    })?;
            }
        }

        let store_err = |reason: String| PublishError::Store {
            remote_path: remote_path.to_string(),
            reason,
        };
        ftp.transfer_type(FileType::Binary)
            .map_err(|e| store_err(e.to_string()))?;
        let mut file = File::open(local).map_err(|source| PublishError::LocalRead {
            path: local.to_path_buf(),
            source,
        })?;
        let written = ftp
            .put_file(file_name, &mut file)
            .map_err(|e| store_err(e.to_string()))?;
        debug!("Stored {} bytes at {}", written, remote_path);
        Ok(())
    }
}

impl Publisher for FtpPublisher {
    fn publish(&self, local: &Path, remote_path: &str) -> Result<(), PublishError> {
        let (mut ftp, addr) = self.connect()?;
        info!("Uploading {} → ftp://{}/{}", local.display(), addr, remote_path);

        ftp.login(self.config.user.as_str(), self.config.password.as_str())
            .map_err(|e| PublishError::Login {
                user: self.config.user.clone(),
                reason: e.to_string(),
            })?;

        let result = self.upload(&mut ftp, local, remote_path);
        if let Err(e) = ftp.quit() {
            debug!("FTP quit failed: {}", e);
        }
        result
    }

    fn name(&self) -> &'static str {
        "ftp"
    }
}

/// Resolve `target` (`host:port`) to its first address within `budget`.
///
/// IP literals skip the lookup.
fn resolve_within(target: &str, budget: Duration) -> Result<SocketAddr, PublishError> {
    if let Ok(addr) = target.parse::<SocketAddr>() {
        return Ok(addr);
    }

    let (tx, rx) = mpsc::channel();
    let lookup = target.to_string();
    std::thread::spawn(move || {
        let _ = tx.send(lookup.to_socket_addrs().map(|mut addrs| addrs.next()));
    });

    let connect_err = |reason: String| PublishError::Connect {
        addr: target.to_string(),
        reason,
    };
    match rx.recv_timeout(budget) {
        Ok(Ok(Some(addr))) => Ok(addr),
        Ok(Ok(None)) => Err(connect_err("host did not resolve".to_string())),
        Ok(Err(e)) => Err(connect_err(e.to_string())),
        Err(RecvTimeoutError::Timeout) => Err(connect_err(format!(
            "name resolution exceeded {}s",
            budget.as_secs_f32()
        ))),
        Err(RecvTimeoutError::Disconnected) => {
            Err(connect_err("name resolution thread exited".to_string()))
        }
    }
}

// ── Local directory ──────────────────────────────────────────────────────

/// Store artifacts under a local directory with the same path layout.
#[derive(Debug, Clone)]
pub struct LocalDirPublisher {
    root: PathBuf,
}

impl LocalDirPublisher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Publisher for LocalDirPublisher {
    fn publish(&self, local: &Path, remote_path: &str) -> Result<(), PublishError> {
        let (dirs, file_name) = split_remote(remote_path)?;

        let mut source = File::open(local).map_err(|source| PublishError::LocalRead {
            path: local.to_path_buf(),
            source,
        })?;

        let mut dir = self.root.clone();
        for segment in dirs {
            dir.push(segment);
            if !dir.is_dir() {
                std::fs::create_dir(&dir)
                    .or_else(|e| if dir.is_dir() { Ok(()) } else { Err(e) })
                    .map_err(|e| PublishError::CreateDir {
                        dir: segment.to_string(),
                        reason: e.to_string(),
                    })?;
            }
        }

        let target = dir.join(file_name);
        let store_err = |e: std::io::Error| PublishError::Store {
            remote_path: remote_path.to_string(),
            reason: e.to_string(),
        };
        let mut dest = File::create(&target).map_err(store_err)?;
        let written = std::io::copy(&mut source, &mut dest).map_err(store_err)?;
        info!("Stored {} bytes at {}", written, target.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
