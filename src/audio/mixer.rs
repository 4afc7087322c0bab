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
// Core voice mixing logic shared by the cpal output and the tests.
use parking_lot::Mutex;
use std::sync::Arc;

use super::source::RateShiftedSource;
use crate::playsync::CancelHandle;

/// Sums every active voice into interleaved output blocks.
#[derive(Clone)]
pub struct AudioMixer {
    /// Active audio sources currently playing
    active_sources: Arc<Mutex<Vec<ActiveSource>>>,
    /// Number of output channels
    num_channels: u16,
    /// Sample rate
    sample_rate: u32,
}

/// Represents an active audio source in the mixer
pub struct ActiveSource {
    /// The rate-shifted reader over the shared sample
    pub source: RateShiftedSource,
    /// Cancel handle for this source
    pub cancel_handle: CancelHandle,
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        Self {
            active_sources: Arc::new(Mutex::new(Vec::new())),
            num_channels,
            sample_rate,
        }
    }

    /// Adds a new audio source to the mixer
    pub fn add_source(&self, source: ActiveSource) {
        self.active_sources.lock().push(source);
    }

    /// Removes every source, returning how many were playing.
    pub fn clear(&self) -> usize {
        let mut sources = self.active_sources.lock();
        let count = sources.len();
        sources.clear();
        count
    }

    /// Returns the number of sources that have not been cancelled or run out.
    pub fn active_count(&self) -> usize {
        self.active_sources.lock().len()
    }

    /// Mixes all active sources into `output`, which is overwritten. Cancelled and finished
    /// sources are dropped from the mixer; finished sources are cancelled on the way out so
    /// their voices can tell they have gone quiet.
    pub fn process_into_output(&self, output: &mut [f32]) {
        output.fill(0.0);
        let channels = self.num_channels as usize;

        let mut sources = self.active_sources.lock();
        sources.retain_mut(|active_source| {
            if active_source.cancel_handle.is_cancelled() {
                return false;
            }
            active_source.source.mix_into(output, channels);
            if active_source.source.is_finished() {
                active_source.cancel_handle.cancel();
                return false;
            }
            true
        });
    }

    /// Returns the number of output channels.
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Returns the output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
