//! Pipeline orchestrator: one conversion request from URL to download link.
//!
//! Stages run strictly in order and the first failure short-circuits:
//!
//! ```text
//! validate → resolve → select → fetch → export → publish → respond
//! ```
//!
//! Every temporary file is owned by a [`tempfile::TempPath`] (directly or via
//! [`FetchedImage`]), so it is deleted when its owner goes out of scope no
//! matter which later stage fails. Fetched images are released as soon as
//! the exporter returns; the artifact after the publish attempt.

use crate::config::ServiceConfig;
use crate::error::PipelineError;
use crate::output::{
    ConversionData, ConversionResponse, ConversionType, ExportResult, FetchedImage, QualityTier,
};
use crate::pipeline::fetch::{self, FetchOptions};
use crate::pipeline::{archive, deck, input, manifest, pdf, select};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::publish::{self, FtpPublisher, Publisher};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempPath;
use tracing::{debug, info, warn};

/// Runs conversions against one configuration, HTTP client and publisher.
///
/// Cheap to clone; the HTTP service keeps one in its shared state.
#[derive(Clone)]
pub struct Converter {
    config: Arc<ServiceConfig>,
    client: reqwest::Client,
    publisher: Arc<dyn Publisher>,
    progress: ProgressCallback,
}

impl Converter {
    /// Build a converter that publishes through `publisher`.
    pub fn new(
        config: Arc<ServiceConfig>,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| PipelineError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            client,
            publisher,
            progress: Arc::new(NoopProgressCallback),
        })
    }

    /// Build a converter that publishes to the configured FTP server.
    pub fn with_ftp(config: Arc<ServiceConfig>) -> Result<Self, PipelineError> {
        let publisher = FtpPublisher::new(
            config.ftp.clone(),
            Duration::from_secs(config.publish_connect_timeout_secs),
        );
        Self::new(config, Arc::new(publisher))
    }

    /// Receive per-image fetch events.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Run the whole pipeline for one source URL.
    ///
    /// # Errors
    /// The first failing stage's [`PipelineError`]; its
    /// [`status_class`](PipelineError::status_class) decides the HTTP status.
    pub async fn convert(
        &self,
        url: &str,
        kind: ConversionType,
        quality: QualityTier,
    ) -> Result<ConversionResponse, PipelineError> {
        let start = Instant::now();
        info!("Starting {} conversion ({}): {}", kind, quality, url);

        // ── Validate ─────────────────────────────────────────────────────
        let source = input::validate_url(url, &self.config.allowed_host)?;

        // ── Resolve ──────────────────────────────────────────────────────
        let manifest = manifest::resolve(
            &self.client,
            source.url.as_str(),
            self.config.page_timeout_secs,
        )
        .await?;

        // ── Select ───────────────────────────────────────────────────────
        let selection = select::select(&manifest.slides, quality)?;

        // ── Fetch ────────────────────────────────────────────────────────
        let options = FetchOptions {
            max_concurrency: self.config.concurrency_for(kind),
            timeout_secs: self.config.fetch_timeout_secs,
            work_dir: self.config.temp_dir(),
        };
        let images =
            fetch::fetch_all(&self.client, &selection.urls, &options, &self.progress).await?;

        // ── Export ───────────────────────────────────────────────────────
        let artifact = export(kind, images, options.work_dir).await?;

        // ── Publish ──────────────────────────────────────────────────────
        let result = self
            .publish(artifact, &source.doc_short_name, kind)
            .await?;

        let response = assemble_response(
            kind,
            quality,
            selection.thumbnail,
            manifest.title,
            &result,
            &self.config.base_url,
        );
        info!(
            "Conversion complete: {} ({} bytes) in {}ms",
            result.remote_path,
            result.size_bytes,
            start.elapsed().as_millis()
        );
        Ok(response)
    }

    /// Publish `artifact` and delete it locally whatever the outcome.
    async fn publish(
        &self,
        artifact: TempPath,
        doc_short_name: &str,
        kind: ConversionType,
    ) -> Result<ExportResult, PipelineError> {
        let size_bytes = match tokio::fs::metadata(&artifact).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                discard_artifact(artifact);
                return Err(PipelineError::Internal(format!(
                    "Cannot stat exported file: {e}"
                )));
            }
        };
        let remote_path = publish::remote_path(
            &self.config.remote_root,
            chrono::Local::now().date_naive(),
            doc_short_name,
            kind.extension(),
        );
        info!(
            "Publishing {} bytes via {} → {}",
            size_bytes,
            self.publisher.name(),
            remote_path
        );

        let outcome = publish::publish_blocking(
            Arc::clone(&self.publisher),
            artifact.to_path_buf(),
            remote_path.clone(),
            self.config.publish_timeout_secs,
        )
        .await;
        discard_artifact(artifact);
        outcome?;

        Ok(ExportResult {
            remote_path,
            size_bytes,
        })
    }
}

/// Build the artifact for `kind` on the blocking pool.
///
/// `images` are consumed and deleted before this returns, on success and on
/// failure alike.
async fn export(
    kind: ConversionType,
    images: Vec<FetchedImage>,
    work_dir: PathBuf,
) -> Result<TempPath, PipelineError> {
    let count = images.len();
    let built = tokio::task::spawn_blocking(move || {
        let artifact = tempfile::Builder::new()
            .prefix("slides-")
            .suffix(&format!(".{}", kind.extension()))
            .tempfile_in(&work_dir)
            .map_err(|e| PipelineError::Internal(format!("Cannot create output file: {e}")))?
            .into_temp_path();

        let paths: Vec<&Path> = images.iter().map(FetchedImage::path).collect();
        let result = match kind {
            ConversionType::Pdf => pdf::build_pdf(&paths, &artifact),
            ConversionType::SlideDeck => deck::build_deck(&paths, &artifact),
            ConversionType::Archive => archive::build_archive(&paths, &artifact),
        };
        drop(paths);
        release_images(images);
        result.map(|_| artifact)
    })
    .await
    .map_err(|e| PipelineError::Internal(format!("Export task panicked: {e}")))??;

    debug!("Exported {} images → {}", count, built.display());
    Ok(built)
}

fn release_images(images: Vec<FetchedImage>) {
    for image in images {
        let path = image.path().to_path_buf();
        if let Err(e) = image.close() {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

fn discard_artifact(artifact: TempPath) {
    let path = artifact.to_path_buf();
    if let Err(e) = artifact.close() {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}

/// Characters escaped in each segment of the download link.
const LINK_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Success envelope for a published artifact.
///
/// `file_name` is the plain name; the link percent-encodes every segment of
/// the remote path.
pub fn assemble_response(
    kind: ConversionType,
    quality: QualityTier,
    thumbnail: String,
    title: String,
    result: &ExportResult,
    base_url: &str,
) -> ConversionResponse {
    let file_name = result
        .remote_path
        .rsplit('/')
        .next()
        .unwrap_or(&result.remote_path)
        .to_string();
    let link_path = result
        .remote_path
        .split('/')
        .map(|segment| utf8_percent_encode(segment, LINK_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/");
    ConversionResponse {
        success: true,
        message: kind.success_message().to_string(),
        data: ConversionData {
            thumbnail,
            quality,
            conversion_type: kind,
            slides_download_link: format!("{}/{}", base_url.trim_end_matches('/'), link_path),
            file_name,
            size: result.size_bytes,
            title,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use crate::publish::LocalDirPublisher;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png(width: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, 9, Rgb([0, 80, 160])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    /// Serve a page with `slides` slides at 638 and 2048 px, plus their images.
    async fn deck_server(slides: usize) -> (MockServer, String) {
        let server = MockServer::start().await;
        let mut body = String::from("<html><head><title>Test Deck</title></head><body>");
        for i in 0..slides {
            body.push_str(&format!(
                r#"<img data-testid="vertical-slide-image" srcset="{u}/img/{i}-638.png 638w, {u}/img/{i}-2048.png 2048w">"#,
                u = server.uri()
            ));
            for width in [638u32, 2048] {
                Mock::given(method("GET"))
                    .and(path(format!("/img/{i}-{width}.png")))
                    .respond_with(ResponseTemplate::new(200).set_body_bytes(png(16 + i as u32)))
                    .mount(&server)
                    .await;
            }
        }
        body.push_str("</body></html>");
        Mock::given(method("GET"))
            .and(path("/someone/test-deck/42"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        let page = format!("{}/someone/test-deck/42", server.uri());
        (server, page)
    }

    fn config(work: &TempDir) -> Arc<ServiceConfig> {
        Arc::new(
            ServiceConfig::builder()
                .allowed_host("127.0.0.1")
                .base_url("https://files.example.com/")
                .work_dir(work.path())
                .fetch_timeout_secs(5)
                .build()
                .unwrap(),
        )
    }

    fn files_in(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    fn find_published(root: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in std::fs::read_dir(&dir).unwrap() {
                let p = entry.unwrap().path();
                if p.is_dir() {
                    stack.push(p);
                } else {
                    out.push(p);
                }
            }
        }
        out
    }

    #[test]
    fn response_links_base_url_and_remote_path() {
        let result = ExportResult {
            remote_path: "SS_DL/07032025/deck.pptx".into(),
            size_bytes: 1234,
        };
        let resp = assemble_response(
            ConversionType::SlideDeck,
            QualityTier::Sd,
            "https://img/0.jpg".into(),
            "Deck".into(),
            &result,
            "https://files.example.com/",
        );
        assert!(resp.success);
        assert_eq!(resp.message, "PPTX generated successfully.");
        assert_eq!(
            resp.data.slides_download_link,
            "https://files.example.com/SS_DL/07032025/deck.pptx"
        );
        assert_eq!(resp.data.file_name, "deck.pptx");
        assert_eq!(resp.data.size, 1234);
        assert_eq!(resp.data.quality, QualityTier::Sd);
    }

    #[test]
    fn response_link_percent_encodes_non_ascii_name() {
        let result = ExportResult {
            remote_path: "SS_DL/07032025/café deck.pdf".into(),
            size_bytes: 1,
        };
        let resp = assemble_response(
            ConversionType::Pdf,
            QualityTier::Hd,
            String::new(),
            String::new(),
            &result,
            "https://files.example.com",
        );
        assert_eq!(
            resp.data.slides_download_link,
            "https://files.example.com/SS_DL/07032025/caf%C3%A9%20deck.pdf"
        );
        assert_eq!(resp.data.file_name, "café deck.pdf");
    }

    #[tokio::test]
    async fn archive_conversion_publishes_and_cleans_up() {
        let (_server, page) = deck_server(3).await;
        let work = TempDir::new().unwrap();
        let store = TempDir::new().unwrap();
        let converter =
            Converter::new(config(&work), Arc::new(LocalDirPublisher::new(store.path()))).unwrap();

        let resp = converter
            .convert(&page, ConversionType::Archive, QualityTier::Hd)
            .await
            .unwrap();

        assert_eq!(resp.data.conversion_type, ConversionType::Archive);
        assert_eq!(resp.data.title, "Test Deck");
        assert!(resp.data.thumbnail.ends_with("/img/0-2048.png"));
        assert_eq!(resp.data.file_name, "test-deck.zip");
        assert!(resp.data.slides_download_link.starts_with("https://files.example.com/SS_DL/"));

        let published = find_published(store.path());
        assert_eq!(published.len(), 1);
        assert_eq!(
            std::fs::metadata(&published[0]).unwrap().len(),
            resp.data.size
        );
        let zip = zip::ZipArchive::new(std::fs::File::open(&published[0]).unwrap()).unwrap();
        assert_eq!(zip.len(), 3);
        assert_eq!(files_in(work.path()), 0, "work dir must be empty");
    }

    #[tokio::test]
    async fn deck_conversion_has_one_slide_per_image() {
        let (_server, page) = deck_server(2).await;
        let work = TempDir::new().unwrap();
        let store = TempDir::new().unwrap();
        let converter =
            Converter::new(config(&work), Arc::new(LocalDirPublisher::new(store.path()))).unwrap();

        let resp = converter
            .convert(&page, ConversionType::SlideDeck, QualityTier::Sd)
            .await
            .unwrap();
        assert_eq!(resp.message, "PPTX generated successfully.");

        let published = find_published(store.path());
        let mut zip = zip::ZipArchive::new(std::fs::File::open(&published[0]).unwrap()).unwrap();
        assert!(zip.by_name("ppt/slides/slide2.xml").is_ok());
        assert!(zip.by_name("ppt/slides/slide3.xml").is_err());
        assert_eq!(files_in(work.path()), 0);
    }

    struct RejectingPublisher;

    impl Publisher for RejectingPublisher {
        fn publish(&self, local: &Path, remote_path: &str) -> Result<(), PublishError> {
            assert!(local.exists(), "artifact must exist while publishing");
            Err(PublishError::Store {
                remote_path: remote_path.to_string(),
                reason: "550 permission denied".into(),
            })
        }

        fn name(&self) -> &'static str {
            "rejecting"
        }
    }

    #[tokio::test]
    async fn publish_failure_still_removes_artifact() {
        let (_server, page) = deck_server(2).await;
        let work = TempDir::new().unwrap();
        let converter = Converter::new(config(&work), Arc::new(RejectingPublisher)).unwrap();

        let err = converter
            .convert(&page, ConversionType::Pdf, QualityTier::Hd)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::PublishFailed(_)), "got {err:?}");
        assert_eq!(err.status_code(), 500);
        assert_eq!(files_in(work.path()), 0, "artifact leaked after publish failure");
    }

    /// Overwrites every fetched file with bytes no exporter can read.
    struct CorruptFetched(PathBuf);

    impl crate::progress::FetchProgressCallback for CorruptFetched {
        fn on_fetch_complete(&self, _total: usize, _succeeded: usize) {
            for entry in std::fs::read_dir(&self.0).unwrap() {
                std::fs::write(entry.unwrap().path(), b"not a jpeg").unwrap();
            }
        }
    }

    #[tokio::test]
    async fn export_failure_removes_fetched_images_and_artifact() {
        let (_server, page) = deck_server(3).await;
        let work = TempDir::new().unwrap();
        let store = TempDir::new().unwrap();
        let converter =
            Converter::new(config(&work), Arc::new(LocalDirPublisher::new(store.path())))
                .unwrap()
                .with_progress(Arc::new(CorruptFetched(work.path().to_path_buf())));

        let err = converter
            .convert(&page, ConversionType::SlideDeck, QualityTier::Hd)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ExportFailed { format: "PPTX", .. }), "got {err:?}");
        assert_eq!(err.status_code(), 500);
        assert_eq!(files_in(work.path()), 0, "temporary files leaked after export failure");
        assert!(find_published(store.path()).is_empty());
    }

    #[tokio::test]
    async fn foreign_host_is_rejected_before_any_request() {
        let work = TempDir::new().unwrap();
        let converter = Converter::new(config(&work), Arc::new(RejectingPublisher)).unwrap();
        let err = converter
            .convert(
                "https://example.com/a/b/1",
                ConversionType::Pdf,
                QualityTier::Hd,
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.detail(), "Invalid SlideShare URL");
    }

    #[tokio::test]
    async fn missing_width_is_not_found() {
        let server = MockServer::start().await;
        let body = format!(
            r#"<title>T</title><img data-testid="vertical-slide-image" srcset="{}/a.png 320w">"#,
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/u/doc/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        let work = TempDir::new().unwrap();
        let converter = Converter::new(config(&work), Arc::new(RejectingPublisher)).unwrap();

        let err = converter
            .convert(
                &format!("{}/u/doc/1", server.uri()),
                ConversionType::Archive,
                QualityTier::Hd,
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert!(err.detail().contains("2048px"));
    }
}
