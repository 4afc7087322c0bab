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
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::EngineConfig;

pub mod buffer;
pub mod cpal;
pub mod error;
pub mod mixer;
pub mod mock;
pub mod source;

pub use buffer::SampleBuffer;
pub use error::SinkError;

/// Global source ID counter.
static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a process-unique ID for a new playback source.
pub fn next_source_id() -> u64 {
    NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// An audible destination that can create playback voices over a shared sample.
pub trait OutputSink: fmt::Display + Send + Sync {
    /// Creates a voice that plays `buffer` at `rate`, looping if requested. The voice is
    /// silent until started.
    fn create_voice(
        &self,
        buffer: &SampleBuffer,
        rate: f64,
        looping: bool,
    ) -> Result<Box<dyn VoiceHandle>, SinkError>;
}

/// A controllable handle to one playing voice.
pub trait VoiceHandle: Send {
    /// Starts playback.
    fn start(&mut self) -> Result<(), SinkError>;

    /// Stops playback and releases the output. Stopping twice is a no-op.
    fn stop(&mut self);

    /// Returns true once the voice is no longer producing audio, either because it was
    /// stopped or because a non-looping voice played to the end of its sample.
    fn is_finished(&self) -> bool;
}

/// Lists the output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, SinkError> {
    cpal::Sink::list()
}

/// Gets the output sink selected by the configuration.
pub fn get_sink(config: &EngineConfig) -> Result<Arc<dyn OutputSink>, SinkError> {
    match config.device() {
        Some(device) if device.starts_with("mock") => Ok(Arc::new(mock::Sink::get(device))),
        _ => Ok(Arc::new(cpal::Sink::get(config)?)),
    }
}
