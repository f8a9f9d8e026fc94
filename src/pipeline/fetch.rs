//! Bounded fetcher: N image URLs → N normalised JPEG temp files, or nothing.
//!
//! ## Concurrency
//!
//! Exactly one task is spawned per URL into a [`JoinSet`]; each must take a
//! permit from a shared [`Semaphore`] before it issues its request, so at
//! most `max_concurrency` fetches are in flight. The ceiling is chosen per
//! conversion type by the caller and is the only backpressure control.
//! Decode and JPEG re-encode are CPU-bound and run on the blocking pool.
//!
//! ## All-or-nothing
//!
//! Every task is joined before the batch result is decided. Results land in
//! a pre-sized slot vector indexed by input position, so output order never
//! depends on completion order. If any task failed, every file that did get
//! written is deleted and a single [`PipelineError::FetchFailed`] carrying
//! the lowest-index failure is returned.

use crate::error::{FetchError, PipelineError};
use crate::output::FetchedImage;
use crate::pipeline::encode;
use crate::progress::ProgressCallback;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Knobs for one [`fetch_all`] call.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Maximum simultaneously in-flight fetches (clamped to ≥ 1).
    pub max_concurrency: usize,
    /// Per-image timeout covering connect, headers and body.
    pub timeout_secs: u64,
    /// Directory the temporary JPEGs are created in.
    pub work_dir: PathBuf,
}

/// Fetch every URL under the concurrency ceiling.
///
/// # Returns
/// One [`FetchedImage`] per input URL, `output[i]` ↔ `urls[i]`.
///
/// # Errors
/// [`PipelineError::FetchFailed`] if any single fetch, decode or store
/// failed; no temporary file from this call survives in that case.
pub async fn fetch_all(
    client: &reqwest::Client,
    urls: &[String],
    options: &FetchOptions,
    progress: &ProgressCallback,
) -> Result<Vec<FetchedImage>, PipelineError> {
    let total = urls.len();
    let permits = options.max_concurrency.clamp(1, Semaphore::MAX_PERMITS);
    info!(
        "Fetching {} images (concurrency ceiling {})",
        total, permits
    );
    progress.on_fetch_start(total);

    let semaphore = Arc::new(Semaphore::new(permits));
    let mut tasks = JoinSet::new();

    for (index, url) in urls.iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let client = client.clone();
        let url = url.clone();
        let timeout_secs = options.timeout_secs;
        let work_dir = options.work_dir.clone();
        let progress = Arc::clone(progress);

        tasks.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => fetch_one(&client, &url, timeout_secs, &work_dir).await,
                Err(_) => Err(FetchError::Aborted {
                    reason: "concurrency gate closed".to_string(),
                }),
            };
            match &result {
                Ok(image) => {
                    let bytes = std::fs::metadata(image.path()).map(|m| m.len()).unwrap_or(0);
                    progress.on_image_complete(index, total, bytes);
                }
                Err(e) => progress.on_image_error(index, total, &e.to_string()),
            }
            (index, result)
        });
    }

    let mut slots: Vec<Option<FetchedImage>> = (0..total).map(|_| None).collect();
    let mut failures: Vec<(usize, FetchError)> = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(image))) => slots[index] = Some(image),
            Ok((index, Err(e))) => {
                warn!("Image {}/{} failed: {}", index + 1, total, e);
                failures.push((index, e));
            }
            Err(e) => {
                warn!("Fetch task aborted: {}", e);
                failures.push((
                    usize::MAX,
                    FetchError::Aborted {
                        reason: e.to_string(),
                    },
                ));
            }
        }
    }

    let succeeded = slots.iter().filter(|s| s.is_some()).count();
    progress.on_fetch_complete(total, succeeded);

    if !failures.is_empty() {
        discard(slots);
        failures.sort_by_key(|(index, _)| *index);
        let failed = failures.len();
        let (_, first_error) = failures.swap_remove(0);
        return Err(PipelineError::FetchFailed {
            total,
            failed,
            first_error,
        });
    }

    let images: Option<Vec<FetchedImage>> = slots.into_iter().collect();
    let images = images.ok_or_else(|| {
        PipelineError::Internal("fetch slot left empty without a recorded failure".into())
    })?;
    info!("Fetched {} images", images.len());
    Ok(images)
}

/// Delete every file that made it to disk before a sibling failed.
fn discard(slots: Vec<Option<FetchedImage>>) {
    let mut removed = 0usize;
    for image in slots.into_iter().flatten() {
        let path = image.path().to_path_buf();
        match image.close() {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
    debug!("Removed {} partially fetched images", removed);
}

/// Single attempt: GET, check status, normalise, persist.
async fn fetch_one(
    client: &reqwest::Client,
    url: &str,
    timeout_secs: u64,
    work_dir: &Path,
) -> Result<FetchedImage, FetchError> {
    let map_transport = |e: reqwest::Error| {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client
        .get(url)
        .timeout(Duration::from_secs(timeout_secs))
        .send()
        .await
        .map_err(map_transport)?;

    if !response.status().is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let body = response.bytes().await.map_err(map_transport)?;
    debug!("Downloaded {} ({} bytes)", url, body.len());

    let owned_url = url.to_string();
    let work_dir = work_dir.to_path_buf();
    let local = tokio::task::spawn_blocking(move || store_normalised(&body, &work_dir, &owned_url))
        .await
        .map_err(|e| FetchError::Aborted {
            reason: format!("normalise task panicked: {e}"),
        })??;

    Ok(FetchedImage::new(url.to_string(), local))
}

/// Decode `bytes`, re-encode as JPEG, write to a fresh uniquely named file.
fn store_normalised(bytes: &[u8], work_dir: &Path, url: &str) -> Result<TempPath, FetchError> {
    let image = encode::decode(bytes).map_err(|e| FetchError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let jpeg = encode::encode_jpeg(&image).map_err(|e| FetchError::Store {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let store_err = |e: std::io::Error| FetchError::Store {
        url: url.to_string(),
        reason: e.to_string(),
    };
    let mut file = tempfile::Builder::new()
        .prefix("slide-")
        .suffix(".jpg")
        .tempfile_in(work_dir)
        .map_err(store_err)?;
    file.write_all(&jpeg).map_err(store_err)?;
    file.flush().map_err(store_err)?;

    Ok(file.into_temp_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{FetchProgressCallback, NoopProgressCallback};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// PNG whose width encodes its index, so order can be checked after decode.
    fn png(width: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, 4, Rgb([200, 10, 10])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn options(dir: &TempDir, max_concurrency: usize, timeout_secs: u64) -> FetchOptions {
        FetchOptions {
            max_concurrency,
            timeout_secs,
            work_dir: dir.path().to_path_buf(),
        }
    }

    fn noop() -> ProgressCallback {
        Arc::new(NoopProgressCallback)
    }

    fn files_in(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[tokio::test]
    async fn output_order_matches_input_despite_shuffled_delays() {
        let server = MockServer::start().await;
        // Earlier slides answer slower, so completion order is reversed.
        let delays_ms = [400u64, 50, 300, 0, 200, 100];
        for (i, delay) in delays_ms.iter().enumerate() {
            Mock::given(method("GET"))
                .and(path(format!("/slide/{i}.png")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_bytes(png(10 + i as u32))
                        .set_delay(Duration::from_millis(*delay)),
                )
                .mount(&server)
                .await;
        }

        let urls: Vec<String> = (0..delays_ms.len())
            .map(|i| format!("{}/slide/{i}.png", server.uri()))
            .collect();
        let dir = TempDir::new().unwrap();

        let images = fetch_all(&reqwest::Client::new(), &urls, &options(&dir, 8, 5), &noop())
            .await
            .expect("all fetches succeed");

        assert_eq!(images.len(), urls.len());
        for (i, image) in images.iter().enumerate() {
            assert_eq!(image.source_url, urls[i]);
            let (w, _) = image::image_dimensions(image.path()).unwrap();
            assert_eq!(w, 10 + i as u32, "slot {i} holds the wrong image");
            assert_eq!(
                image::ImageFormat::from_path(image.path()).unwrap(),
                ImageFormat::Jpeg
            );
        }
        assert_eq!(files_in(&dir), urls.len());

        drop(images);
        assert_eq!(files_in(&dir), 0, "dropping the batch removes its files");
    }

    #[tokio::test]
    async fn ceiling_of_one_still_completes_in_order() {
        let server = MockServer::start().await;
        for i in 0..4u32 {
            Mock::given(method("GET"))
                .and(path(format!("/s{i}")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(png(20 + i)))
                .mount(&server)
                .await;
        }
        let urls: Vec<String> = (0..4).map(|i| format!("{}/s{i}", server.uri())).collect();
        let dir = TempDir::new().unwrap();

        let images = fetch_all(&reqwest::Client::new(), &urls, &options(&dir, 1, 5), &noop())
            .await
            .unwrap();
        let widths: Vec<u32> = images
            .iter()
            .map(|i| image::image_dimensions(i.path()).unwrap().0)
            .collect();
        assert_eq!(widths, vec![20, 21, 22, 23]);
    }

    #[tokio::test]
    async fn one_failure_removes_every_sibling_file() {
        let server = MockServer::start().await;
        for i in 0..5u32 {
            let template = if i == 3 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(200).set_body_bytes(png(8))
            };
            Mock::given(method("GET"))
                .and(path(format!("/img/{i}")))
                .respond_with(template)
                .mount(&server)
                .await;
        }
        let urls: Vec<String> = (0..5).map(|i| format!("{}/img/{i}", server.uri())).collect();
        let dir = TempDir::new().unwrap();

        let err = fetch_all(&reqwest::Client::new(), &urls, &options(&dir, 10, 5), &noop())
            .await
            .unwrap_err();

        match err {
            PipelineError::FetchFailed {
                total,
                failed,
                first_error: FetchError::Status { status, .. },
            } => {
                assert_eq!(total, 5);
                assert_eq!(failed, 1);
                assert_eq!(status, 503);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(files_in(&dir), 0, "no temporary file may survive");
    }

    #[tokio::test]
    async fn timeout_fails_the_batch_without_leaks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fast"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(8)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(png(8))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let urls = vec![
            format!("{}/fast", server.uri()),
            format!("{}/slow", server.uri()),
            format!("{}/fast", server.uri()),
        ];
        let dir = TempDir::new().unwrap();

        let err = fetch_all(&reqwest::Client::new(), &urls, &options(&dir, 10, 1), &noop())
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                PipelineError::FetchFailed {
                    first_error: FetchError::Timeout { secs: 1, .. },
                    ..
                }
            ),
            "got: {err:?}"
        );
        assert_eq!(files_in(&dir), 0);
    }

    #[tokio::test]
    async fn undecodable_body_is_a_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;
        let urls = vec![format!("{}/html", server.uri())];
        let dir = TempDir::new().unwrap();

        let err = fetch_all(&reqwest::Client::new(), &urls, &options(&dir, 1, 5), &noop())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to decode image"), "got: {err}");
        assert_eq!(err.status_code(), 500);
        assert_eq!(files_in(&dir), 0);
    }

    #[tokio::test]
    async fn progress_sees_every_image() {
        #[derive(Default)]
        struct Counter {
            ok: AtomicUsize,
            total: AtomicUsize,
        }
        impl FetchProgressCallback for Counter {
            fn on_image_complete(&self, _index: usize, _total: usize, bytes: u64) {
                assert!(bytes > 0);
                self.ok.fetch_add(1, Ordering::SeqCst);
            }
            fn on_fetch_complete(&self, total: usize, _succeeded: usize) {
                self.total.store(total, Ordering::SeqCst);
            }
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(8)))
            .mount(&server)
            .await;
        let urls: Vec<String> = (0..3).map(|i| format!("{}/{i}", server.uri())).collect();
        let dir = TempDir::new().unwrap();
        let counter = Arc::new(Counter::default());
        let progress: ProgressCallback = counter.clone();

        fetch_all(&reqwest::Client::new(), &urls, &options(&dir, 2, 5), &progress)
            .await
            .unwrap();
        assert_eq!(counter.ok.load(Ordering::SeqCst), 3);
        assert_eq!(counter.total.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_input_is_empty_output() {
        let dir = TempDir::new().unwrap();
        let images = fetch_all(&reqwest::Client::new(), &[], &options(&dir, 4, 5), &noop())
            .await
            .unwrap();
        assert!(images.is_empty());
    }
}
