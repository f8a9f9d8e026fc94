//! Service configuration.
//!
//! All service behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`] or read once from the environment with
//! [`ServiceConfig::from_env`]. The resulting value is shared by reference
//! (`Arc<ServiceConfig>`) with the publisher and the orchestrator; nothing
//! deeper in the pipeline reads process environment.

use crate::error::PipelineError;
use crate::output::ConversionType;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Connection settings for the legacy push-upload store.
#[derive(Clone, Default)]
pub struct FtpConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    /// Default: 21.
    pub port: u16,
}

impl fmt::Debug for FtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .finish()
    }
}

/// Configuration for the conversion service.
///
/// # Example
/// ```rust
/// use slides_export::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .base_url("https://files.example.com")
///     .fetch_timeout_secs(20)
///     .build()
///     .unwrap();
/// assert_eq!(config.remote_root, "SS_DL");
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address the HTTP service listens on. Default: `0.0.0.0:9002`.
    pub bind_addr: SocketAddr,

    /// Public base URL prepended to the remote path in download links.
    pub base_url: String,

    /// Remote store credentials.
    pub ftp: FtpConfig,

    /// Fixed root directory on the remote store. Default: `SS_DL`.
    pub remote_root: String,

    /// Only source URLs on this host are accepted. Default: `www.slideshare.net`.
    pub allowed_host: String,

    /// Per-image GET timeout in seconds. Default: 20.
    pub fetch_timeout_secs: u64,

    /// Presentation page GET timeout in seconds. Default: 30.
    pub page_timeout_secs: u64,

    /// Connection-phase timeout for the remote store in seconds. Default: 10.
    pub publish_connect_timeout_secs: u64,

    /// Bound on the whole publish call. Default: `None` (transfer phase unbounded).
    pub publish_timeout_secs: Option<u64>,

    /// Fetch ceiling when building a PDF. Default: 25000.
    pub pdf_concurrency: usize,

    /// Fetch ceiling when building a slide deck. Default: 10.
    pub deck_concurrency: usize,

    /// Fetch ceiling when building an image archive. Default: 10.
    pub archive_concurrency: usize,

    /// Directory for temporary slide images and artifacts.
    /// `None` uses the system temp directory.
    pub work_dir: Option<PathBuf>,

    /// User-Agent sent with page and image requests.
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9002)),
            base_url: String::new(),
            ftp: FtpConfig {
                port: 21,
                ..FtpConfig::default()
            },
            remote_root: "SS_DL".to_string(),
            allowed_host: "www.slideshare.net".to_string(),
            fetch_timeout_secs: 20,
            page_timeout_secs: 30,
            publish_connect_timeout_secs: 10,
            publish_timeout_secs: None,
            pdf_concurrency: 25_000,
            deck_concurrency: 10,
            archive_concurrency: 10,
            work_dir: None,
            user_agent: concat!("slides-export/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read configuration from the process environment.
    ///
    /// Call once at startup. Recognised variables: `BASE_URL`, `FTP_HOST`,
    /// `FTP_USER`, `FTP_PASS`, `FTP_PORT` (default 21), `BIND_ADDR`,
    /// `REMOTE_ROOT`, `SOURCE_HOST`, `WORK_DIR`.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut builder = Self::builder();

        if let Some(v) = get("BASE_URL") {
            builder = builder.base_url(v);
        }
        if let Some(v) = get("FTP_HOST") {
            builder.config.ftp.host = v;
        }
        if let Some(v) = get("FTP_USER") {
            builder.config.ftp.user = v;
        }
        if let Some(v) = get("FTP_PASS") {
            builder.config.ftp.password = v;
        }
        if let Some(v) = get("FTP_PORT") {
            let port = v.trim().parse::<u16>().map_err(|e| {
                PipelineError::InvalidConfig(format!("FTP_PORT '{v}' is not a port: {e}"))
            })?;
            builder.config.ftp.port = port;
        }
        if let Some(v) = get("BIND_ADDR") {
            let addr = v.trim().parse::<SocketAddr>().map_err(|e| {
                PipelineError::InvalidConfig(format!("BIND_ADDR '{v}' is not an address: {e}"))
            })?;
            builder = builder.bind_addr(addr);
        }
        if let Some(v) = get("REMOTE_ROOT") {
            builder = builder.remote_root(v);
        }
        if let Some(v) = get("SOURCE_HOST") {
            builder = builder.allowed_host(v);
        }
        if let Some(v) = get("WORK_DIR") {
            builder = builder.work_dir(v);
        }

        builder.build()
    }

    /// Fetch ceiling for the given conversion type.
    pub fn concurrency_for(&self, kind: ConversionType) -> usize {
        match kind {
            ConversionType::Pdf => self.pdf_concurrency,
            ConversionType::SlideDeck => self.deck_concurrency,
            ConversionType::Archive => self.archive_concurrency,
        }
    }

    /// Directory temporary files are created in.
    pub fn temp_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn ftp(mut self, ftp: FtpConfig) -> Self {
        self.config.ftp = ftp;
        self
    }

    pub fn remote_root(mut self, root: impl Into<String>) -> Self {
        self.config.remote_root = root.into().trim_matches('/').to_string();
        self
    }

    pub fn allowed_host(mut self, host: impl Into<String>) -> Self {
        self.config.allowed_host = host.into();
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = secs;
        self
    }

    pub fn publish_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.publish_connect_timeout_secs = secs;
        self
    }

    pub fn publish_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.publish_timeout_secs = secs;
        self
    }

    pub fn pdf_concurrency(mut self, n: usize) -> Self {
        self.config.pdf_concurrency = n;
        self
    }

    pub fn deck_concurrency(mut self, n: usize) -> Self {
        self.config.deck_concurrency = n;
        self
    }

    pub fn archive_concurrency(mut self, n: usize) -> Self {
        self.config.archive_concurrency = n;
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, PipelineError> {
        let c = &self.config;
        if c.pdf_concurrency == 0 || c.deck_concurrency == 0 || c.archive_concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "Fetch concurrency must be ≥ 1".into(),
            ));
        }
        if c.remote_root.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "Remote root must not be empty".into(),
            ));
        }
        if c.fetch_timeout_secs == 0 || c.page_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.publish_timeout_secs == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "Publish timeout must be ≥ 1 second when set".into(),
            ));
        }
        Ok(self.config)
    }
}
