// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Fetching and decoding of the source sample.
//!
//! The engine only sees the [`SampleFetcher`] trait: given a locator it eventually yields a
//! decoded [`SampleBuffer`] or a [`SampleLoadError`].

use std::future::Future;
use std::path::PathBuf;

use tracing::info;

use crate::audio::SampleBuffer;

mod decode;
mod error;

pub use decode::decode_file;
pub use error::SampleLoadError;

const FILE_SCHEME: &str = "file://";

/// Fetches and decodes a sample from a locator.
pub trait SampleFetcher: Send + Sync {
    fn fetch(
        &self,
        locator: &str,
    ) -> impl Future<Output = Result<SampleBuffer, SampleLoadError>> + Send;
}

/// Loads samples from the local filesystem. Decoding runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    /// Target sample rate for transcoding (matches audio output).
    target_sample_rate: u32,
}

impl FileFetcher {
    /// Creates a new file fetcher.
    pub fn new(target_sample_rate: u32) -> FileFetcher {
        FileFetcher { target_sample_rate }
    }
}

impl SampleFetcher for FileFetcher {
    fn fetch(
        &self,
        locator: &str,
    ) -> impl Future<Output = Result<SampleBuffer, SampleLoadError>> + Send {
        let locator = locator.to_string();
        let target_sample_rate = self.target_sample_rate;
        async move {
            let path = resolve_locator(&locator)?;
            info!(path = ?path, "Loading sample into memory");

            let buffer = tokio::task::spawn_blocking(move || decode_file(&path, target_sample_rate))
                .await
                .map_err(|e| SampleLoadError::Interrupted(e.to_string()))??;

            info!(
                locator,
                channels = buffer.channel_count(),
                sample_rate = buffer.sample_rate(),
                duration_ms = buffer.duration().as_millis(),
                memory_kb = buffer.memory_size() / 1024,
                "Sample loaded"
            );
            Ok(buffer)
        }
    }
}

/// Resolves a `file://` URI or plain path to a filesystem path.
pub fn resolve_locator(locator: &str) -> Result<PathBuf, SampleLoadError> {
    if let Some(path) = locator.strip_prefix(FILE_SCHEME) {
        if path.is_empty() {
            return Err(SampleLoadError::UnsupportedLocator(locator.to_string()));
        }
        return Ok(PathBuf::from(path));
    }
    if locator.is_empty() || locator.contains("://") {
        return Err(SampleLoadError::UnsupportedLocator(locator.to_string()));
    }
    Ok(PathBuf::from(locator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_locator() {
        assert_eq!(
            resolve_locator("audio/note.wav").unwrap(),
            PathBuf::from("audio/note.wav")
        );
        assert_eq!(
            resolve_locator("file:///tmp/note.wav").unwrap(),
            PathBuf::from("/tmp/note.wav")
        );
        assert!(matches!(
            resolve_locator("https://example.com/note.wav"),
            Err(SampleLoadError::UnsupportedLocator(_))
        ));
        assert!(resolve_locator("").is_err());
        assert!(resolve_locator("file://").is_err());
    }

    #[tokio::test]
    async fn test_file_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.wav");
        let mut writer = hound::WavWriter::create(
            &path,
            hound::WavSpec {
                channels: 1,
                sample_rate: 48000,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            },
        )
        .unwrap();
        for i in 0..4800 {
            writer.write_sample((i as f32 / 4800.0) - 0.5).unwrap();
        }
        writer.finalize().unwrap();

        let fetcher = FileFetcher::new(48000);
        let locator = format!("file://{}", path.display());
        let buffer = fetcher.fetch(&locator).await.unwrap();
        assert_eq!(buffer.frame_count(), 4800);
        assert_eq!(buffer.sample_rate(), 48000);
    }

    #[tokio::test]
    async fn test_file_fetcher_missing() {
        let fetcher = FileFetcher::new(44100);
        assert!(matches!(
            fetcher.fetch("/definitely/not/here.wav").await,
            Err(SampleLoadError::IoError(_))
        ));
    }
}
