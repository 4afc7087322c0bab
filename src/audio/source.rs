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

//! Pitch shifting by playback rate: reads the shared sample at a fractional step per output
//! frame, interpolating between neighbouring frames.

use super::buffer::SampleBuffer;

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// A cursor over a shared sample buffer that advances `rate` source frames per output frame.
pub struct RateShiftedSource {
    buffer: SampleBuffer,
    /// Fractional read position in source frames.
    position: f64,
    /// Source frames consumed per output frame, including any sample rate difference.
    step: f64,
    rate: f64,
    looping: bool,
    finished: bool,
}

impl RateShiftedSource {
    /// Creates a source that plays `buffer` at `rate` on an output running at
    /// `output_sample_rate`.
    pub fn new(
        buffer: SampleBuffer,
        rate: f64,
        output_sample_rate: u32,
        looping: bool,
    ) -> RateShiftedSource {
        let step = if output_sample_rate == 0 {
            rate
        } else {
            rate * buffer.sample_rate() as f64 / output_sample_rate as f64
        };
        let finished = buffer.is_empty();
        RateShiftedSource {
            buffer,
            position: 0.0,
            step,
            rate,
            looping,
            finished,
        }
    }

    /// The playback rate this source was created with.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Returns true once a non-looping source has played past the end of the sample.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Adds up to `output.len() / output_channels` frames into the interleaved `output`.
    /// Mono samples are spread across every output channel; wider samples are mapped
    /// channel-for-channel, wrapping when the output has more channels than the sample.
    /// Returns the number of frames written.
    pub fn mix_into(&mut self, output: &mut [f32], output_channels: usize) -> usize {
        if self.finished || output_channels == 0 {
            return 0;
        }

        let frames = self.buffer.frame_count();
        let source_channels = self.buffer.channel_count() as usize;
        let mut written = 0;

        for out_frame in output.chunks_exact_mut(output_channels) {
            let index = self.position as usize;
            let frac = (self.position - index as f64) as f32;
            let next = if index + 1 < frames {
                index + 1
            } else if self.looping {
                0
            } else {
                index
            };

            let current = self.buffer.frame(index);
            let following = self.buffer.frame(next);
            for (channel, sample) in out_frame.iter_mut().enumerate() {
                let source_channel = channel % source_channels;
                *sample += lerp(current[source_channel], following[source_channel], frac);
            }
            written += 1;

            self.position += self.step;
            if self.position >= frames as f64 {
                if self.looping {
                    self.position %= frames as f64;
                } else {
                    self.finished = true;
                    break;
                }
            }
        }

        written
    }
}

impl std::fmt::Debug for RateShiftedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateShiftedSource")
            .field("rate", &self.rate)
            .field("position", &self.position)
            .field("looping", &self.looping)
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> SampleBuffer {
        SampleBuffer::new((0..frames).map(|i| i as f32).collect(), 1, 44100)
    }

    #[test]
    fn test_unity_rate_reproduces_sample() {
        let mut source = RateShiftedSource::new(ramp(4), 1.0, 44100, false);
        let mut output = vec![0.0; 4];
        assert_eq!(source.mix_into(&mut output, 1), 4);
        assert_eq!(output, vec![0.0, 1.0, 2.0, 3.0]);
        assert!(source.is_finished());
    }

    #[test]
    fn test_double_rate_skips_frames() {
        let mut source = RateShiftedSource::new(ramp(8), 2.0, 44100, false);
        let mut output = vec![0.0; 8];
        assert_eq!(source.mix_into(&mut output, 1), 4);
        assert_eq!(&output[..4], &[0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_half_rate_interpolates() {
        let mut source = RateShiftedSource::new(ramp(4), 0.5, 44100, false);
        let mut output = vec![0.0; 4];
        source.mix_into(&mut output, 1);
        assert_eq!(output, vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_looping_wraps_and_never_finishes() {
        let mut source = RateShiftedSource::new(ramp(3), 1.0, 44100, true);
        let mut output = vec![0.0; 7];
        assert_eq!(source.mix_into(&mut output, 1), 7);
        assert_eq!(output, vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0]);
        assert!(!source.is_finished());
    }

    #[test]
    fn test_mono_spreads_to_stereo_and_mixes() {
        let mut source = RateShiftedSource::new(ramp(2), 1.0, 44100, true);
        let mut output = vec![1.0; 4];
        source.mix_into(&mut output, 2);
        assert_eq!(output, vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_output_rate_difference_adjusts_step() {
        let buffer = SampleBuffer::new((0..8).map(|i| i as f32).collect(), 1, 48000);
        let mut source = RateShiftedSource::new(buffer, 1.0, 24000, false);
        let mut output = vec![0.0; 4];
        source.mix_into(&mut output, 1);
        assert_eq!(output, vec![0.0, 2.0, 4.0, 6.0]);
        assert_eq!(source.rate(), 1.0);
    }

    #[test]
    fn test_empty_buffer_is_finished() {
        let mut source = RateShiftedSource::new(SampleBuffer::new(Vec::new(), 1, 44100), 1.0, 44100, true);
        let mut output = vec![0.0; 4];
        assert_eq!(source.mix_into(&mut output, 1), 0);
        assert!(source.is_finished());
    }
}
