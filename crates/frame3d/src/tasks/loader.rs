use std::io::Cursor;
use std::path::PathBuf;

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use thiserror::Error;
use tokio::select;
use tokio::sync::mpsc::{Sender, UnboundedReceiver};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::LoaderConfig;
use crate::events::{DecodedImage, LoadCompleted, LoadRequest};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported url scheme {0:?}")]
    UnsupportedScheme(String),
    #[error("request for {url} failed")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image")]
    Decode(#[from] image::ImageError),
    #[error("decode task aborted: {0}")]
    Join(String),
}

/// Where the bytes of an image URL come from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Remote(Url),
    File(PathBuf),
}

fn resolve_source(url: &str) -> Result<Source, LoadError> {
    match Url::parse(url) {
        Ok(parsed) => match parsed.scheme() {
            "http" | "https" => Ok(Source::Remote(parsed)),
            "file" => parsed
                .to_file_path()
                .map(Source::File)
                .map_err(|_| LoadError::UnsupportedScheme(url.to_string())),
            // Windows drive letters parse as a one-letter scheme.
            scheme if scheme.len() == 1 => Ok(Source::File(PathBuf::from(url))),
            scheme => Err(LoadError::UnsupportedScheme(scheme.to_string())),
        },
        Err(_) => Ok(Source::File(PathBuf::from(url))),
    }
}

async fn fetch_bytes(http: &Client, url: &str) -> Result<Vec<u8>, LoadError> {
    match resolve_source(url)? {
        Source::Remote(remote) => {
            let fetch_err = |source| LoadError::Fetch {
                url: url.to_string(),
                source,
            };
            let response = http.get(remote).send().await.map_err(fetch_err)?;
            let status = response.status();
            if !status.is_success() {
                return Err(LoadError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            let bytes = response.bytes().await.map_err(fetch_err)?;
            Ok(bytes.to_vec())
        }
        Source::File(path) => tokio::task::spawn_blocking(move || {
            std::fs::read(&path).map_err(|source| LoadError::Io { path, source })
        })
        .await
        .map_err(|err| LoadError::Join(err.to_string()))?,
    }
}

// Decodes to RGBA8 and applies the EXIF orientation when present.
fn decode_rgba8_apply_exif(bytes: &[u8]) -> Result<image::RgbaImage, LoadError> {
    let img = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| LoadError::Decode(image::ImageError::IoError(err)))?
        .decode()?;
    let img = img.to_rgba8();

    let orientation = read_orientation(bytes).unwrap_or(1);
    Ok(apply_orientation(img, orientation))
}

fn apply_orientation(img: image::RgbaImage, orientation: u16) -> image::RgbaImage {
    use image::imageops::{flip_horizontal, flip_vertical, rotate90, rotate180, rotate270};
    match orientation {
        2 => flip_horizontal(&img),
        3 => rotate180(&img),
        4 => flip_vertical(&img),
        // transpose
        5 => flip_horizontal(&rotate90(&img)),
        6 => rotate90(&img),
        // transverse
        7 => flip_horizontal(&rotate270(&img)),
        8 => rotate270(&img),
        _ => img,
    }
}

fn read_orientation(bytes: &[u8]) -> Option<u16> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let orientation = field.value.get_uint(0)? as u16;
    debug!(orientation, "exif_orientation");
    Some(orientation)
}

async fn load(http: Client, url: String) -> Result<DecodedImage, LoadError> {
    let bytes = fetch_bytes(&http, &url).await?;
    let rgba = tokio::task::spawn_blocking(move || decode_rgba8_apply_exif(&bytes))
        .await
        .map_err(|err| LoadError::Join(err.to_string()))??;
    let (width, height) = rgba.dimensions();
    Ok(DecodedImage {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

pub fn build_client(cfg: &LoaderConfig) -> Result<Client> {
    Client::builder()
        .user_agent(cfg.user_agent.clone())
        .build()
        .context("failed to build http client")
}

/// Fetches and decodes requests off the render thread, at most
/// `max-concurrent-decodes` at a time. Every request yields exactly one
/// completion; deciding whether it is still wanted is up to the receiver.
pub async fn run(
    mut load_rx: UnboundedReceiver<LoadRequest>,
    completed_tx: Sender<LoadCompleted>,
    cancel: CancellationToken,
    cfg: LoaderConfig,
) -> Result<()> {
    let http = build_client(&cfg)?;
    let max_in_flight = cfg.max_concurrent_decodes.max(1);
    let mut tasks: JoinSet<LoadCompleted> = JoinSet::new();

    loop {
        select! {
            _ = cancel.cancelled() => break,

            Some(LoadRequest { url, generation }) = load_rx.recv(), if tasks.len() < max_in_flight => {
                debug!(%url, %generation, "load_started");
                let http = http.clone();
                tasks.spawn(async move {
                    let outcome = load(http, url.clone()).await;
                    LoadCompleted { url, generation, outcome }
                });
            }

            Some(join_res) = tasks.join_next() => {
                match join_res {
                    Ok(done) => {
                        debug!(url = %done.url, generation = %done.generation, ok = done.outcome.is_ok(), "load_finished");
                        if completed_tx.send(done).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => tracing::warn!("loader task join error: {err}"),
                }
            }

            else => break,
        }
    }
    tasks.abort_all();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use tokio::sync::mpsc;

    use crate::frame::LoadSequence;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    fn orient6_bytes() -> Vec<u8> {
        base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap()
    }

    #[test]
    fn applies_orientation_six() {
        let img = decode_rgba8_apply_exif(&orient6_bytes()).unwrap();
        assert_eq!(img.dimensions(), (1, 2));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode_rgba8_apply_exif(b"definitely not an image").unwrap_err();
        assert!(matches!(err, LoadError::Decode(_)));
    }

    #[test]
    fn resolves_sources_by_scheme() {
        assert!(matches!(
            resolve_source("https://example.com/a.jpg"),
            Ok(Source::Remote(_))
        ));
        assert_eq!(
            resolve_source("/srv/art/a.jpg").unwrap(),
            Source::File(PathBuf::from("/srv/art/a.jpg"))
        );
        assert_eq!(
            resolve_source("file:///srv/art/a.jpg").unwrap(),
            Source::File(PathBuf::from("/srv/art/a.jpg"))
        );
        assert!(matches!(
            resolve_source("ftp://example.com/a.jpg"),
            Err(LoadError::UnsupportedScheme(s)) if s == "ftp"
        ));
    }

    #[tokio::test]
    async fn completes_requests_with_their_generation() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("orient6.jpg");
        std::fs::write(&good, orient6_bytes()).unwrap();
        let missing = dir.path().join("missing.jpg");

        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (done_tx, mut done_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(req_rx, done_tx, cancel.clone(), LoaderConfig::default()));

        let mut seq = LoadSequence::new();
        let first = seq.issue();
        let second = seq.issue();
        req_tx
            .send(LoadRequest {
                url: good.display().to_string(),
                generation: first,
            })
            .unwrap();
        req_tx
            .send(LoadRequest {
                url: missing.display().to_string(),
                generation: second,
            })
            .unwrap();

        let mut results = vec![done_rx.recv().await.unwrap(), done_rx.recv().await.unwrap()];
        results.sort_by_key(|done| done.generation);

        let decoded = results[0].outcome.as_ref().unwrap();
        assert_eq!((decoded.width, decoded.height), (1, 2));
        assert_eq!(decoded.pixels.len(), 8);
        assert!(matches!(results[1].outcome, Err(LoadError::Io { .. })));

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
