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

//! The decoded sample shared by every voice.

use std::sync::Arc;
use std::time::Duration;

/// Decoded PCM audio, interleaved f32. Cloning is cheap: the samples are stored in an Arc and
/// never mutated after construction, so any number of voices can read them concurrently.
#[derive(Clone)]
pub struct SampleBuffer {
    data: Arc<Vec<f32>>,
    channel_count: u16,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Creates a buffer from interleaved samples. Trailing samples that do not form a full
    /// frame are discarded.
    pub fn new(mut interleaved: Vec<f32>, channel_count: u16, sample_rate: u32) -> SampleBuffer {
        let channels = channel_count.max(1) as usize;
        interleaved.truncate(interleaved.len() - interleaved.len() % channels);
        SampleBuffer {
            data: Arc::new(interleaved),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Returns the sample rate of the audio data.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the samples of one frame, one per channel.
    pub fn frame(&self, index: usize) -> &[f32] {
        let channels = self.channel_count as usize;
        &self.data[index * channels..(index + 1) * channels]
    }

    /// Returns the playback duration at the buffer's own sample rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Returns true if both buffers share the same underlying samples.
    pub fn shares_data_with(&self, other: &SampleBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Transcodes to another sample rate using linear interpolation.
    pub fn transcode(&self, target_rate: u32) -> SampleBuffer {
        if target_rate == self.sample_rate || self.sample_rate == 0 || self.is_empty() {
            return self.clone();
        }

        let ratio = target_rate as f64 / self.sample_rate as f64;
        let channels = self.channel_count as usize;
        let source_frames = self.frame_count();
        let target_frames = (source_frames as f64 * ratio).ceil() as usize;

        let mut output = Vec::with_capacity(target_frames * channels);
        for target_frame in 0..target_frames {
            let source_pos = target_frame as f64 / ratio;
            let source_frame = source_pos.floor() as usize;
            let frac = source_pos.fract() as f32;

            for channel in 0..channels {
                let idx0 = source_frame * channels + channel;
                let idx1 = (source_frame + 1) * channels + channel;

                let s0 = self.data.get(idx0).copied().unwrap_or(0.0);
                let s1 = self.data.get(idx1).copied().unwrap_or(s0);
                output.push(s0 + (s1 - s0) * frac);
            }
        }

        SampleBuffer::new(output, self.channel_count, target_rate)
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frame_count())
            .field("memory_kb", &(self.memory_size() / 1024))
            .finish()
    }
}
