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
//! Voice management for per-key sample playback.
//!
//! Each key owns at most one voice. Voices release their output handle when stopped or
//! dropped, so every exit path silences the sink.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::audio::{SinkError, VoiceHandle};
use crate::pitch::{KeyNumber, KEY_COUNT};

/// Represents a sounding key.
pub struct Voice {
    /// The key this voice sounds for.
    key: KeyNumber,
    /// The playback rate the voice was started with.
    rate: f64,
    /// When this voice started playing.
    start_time: Instant,
    /// The sink handle producing the audio.
    handle: Box<dyn VoiceHandle>,
    /// Set once the handle has been stopped.
    stopped: bool,
}

impl Voice {
    /// Starts the handle and wraps it in a voice. A handle that fails to start is stopped
    /// before the error is returned.
    pub fn start(
        key: KeyNumber,
        rate: f64,
        mut handle: Box<dyn VoiceHandle>,
    ) -> Result<Voice, SinkError> {
        if let Err(e) = handle.start() {
            handle.stop();
            return Err(e);
        }
        Ok(Voice {
            key,
            rate,
            start_time: Instant::now(),
            handle,
            stopped: false,
        })
    }

    pub fn key(&self) -> KeyNumber {
        self.key
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// How long the voice has been sounding.
    pub fn age(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns true once the voice has stopped producing audio.
    pub fn is_finished(&self) -> bool {
        self.stopped || self.handle.is_finished()
    }

    /// Stops the voice. Returns false if it was already stopped.
    pub fn stop(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.handle.stop();
        self.stopped = true;
        true
    }
}

impl Drop for Voice {
    fn drop(&mut self) {
        if self.stop() {
            debug!(key = self.key.get(), "Voice released on drop");
        }
    }
}

impl std::fmt::Debug for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Voice")
            .field("key", &self.key.get())
            .field("rate", &self.rate)
            .field("stopped", &self.stopped)
            .finish()
    }
}

/// Fixed table of voice slots, one per key, indexed by key number - 1.
pub struct VoiceManager {
    slots: Vec<Option<Voice>>,
}

impl VoiceManager {
    /// Creates a voice manager with every key silent.
    pub fn new() -> Self {
        Self {
            slots: (0..KEY_COUNT).map(|_| None).collect(),
        }
    }

    /// Adds a voice for its key. Returns the voice it displaced, if the key was already
    /// sounding; the caller decides when to stop it.
    pub fn add_voice(&mut self, voice: Voice) -> Option<Voice> {
        let index = voice.key().index();
        self.slots[index].replace(voice)
    }

    /// Removes and returns the voice for a key.
    pub fn remove(&mut self, key: KeyNumber) -> Option<Voice> {
        self.slots[key.index()].take()
    }

    /// Returns true if the key has a live voice.
    pub fn is_playing(&self, key: KeyNumber) -> bool {
        self.slots[key.index()].is_some()
    }

    /// Returns the current number of active voices.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Removes voices that have played out on their own, returning them.
    pub fn reap_finished(&mut self) -> Vec<Voice> {
        self.slots
            .iter_mut()
            .filter_map(|slot| {
                if slot.as_ref().is_some_and(Voice::is_finished) {
                    slot.take()
                } else {
                    None
                }
            })
            .collect()
    }

    /// Clears all voices.
    /// Returns the voices that were sounding so the caller can stop them.
    pub fn clear(&mut self) -> Vec<Voice> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}

impl Default for VoiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VoiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceManager")
            .field("active_voices", &self.active_count())
            .finish()
    }
}
