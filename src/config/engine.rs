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
use serde::Deserialize;

use super::ConfigError;
use crate::pitch::DEFAULT_REFERENCE_FREQUENCY;

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNELS: u16 = 2;

/// A YAML representation of the engine configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct EngineConfig {
    /// The frequency of key 49 (A4) in Hz (default: 440).
    reference_frequency: Option<f64>,

    /// The sample to load at startup.
    sample: Option<String>,

    /// The output device. Names starting with "mock" select the mock sink.
    device: Option<String>,

    /// Output sample rate in Hz (default: 44100). Loaded samples are transcoded to it.
    sample_rate: Option<u32>,

    /// Output channel count (default: 2).
    channels: Option<u16>,

    /// Whether voices loop until stopped (default: true).
    looping: Option<bool>,
}

impl EngineConfig {
    /// Returns the reference frequency (default: 440 Hz).
    pub fn reference_frequency(&self) -> f64 {
        self.reference_frequency
            .unwrap_or(DEFAULT_REFERENCE_FREQUENCY)
    }

    /// Returns the sample locator, if one is configured.
    pub fn sample(&self) -> Option<&str> {
        self.sample.as_deref()
    }

    /// Returns the output device name, or None for the system default.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Returns the output sample rate (default: 44100).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the output channel count (default: 2).
    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    /// Returns whether voices loop (default: true).
    pub fn looping(&self) -> bool {
        self.looping.unwrap_or(true)
    }

    pub fn with_reference_frequency(mut self, reference_frequency: f64) -> Self {
        self.reference_frequency = Some(reference_frequency);
        self
    }

    pub fn with_sample(mut self, sample: &str) -> Self {
        self.sample = Some(sample.to_string());
        self
    }

    pub fn with_device(mut self, device: &str) -> Self {
        self.device = Some(device.to_string());
        self
    }

    /// Checks that every configured value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let reference_frequency = self.reference_frequency();
        if !reference_frequency.is_finite() || reference_frequency <= 0.0 {
            return Err(ConfigError::InvalidReferenceFrequency(reference_frequency));
        }
        if self.sample_rate() == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }
        if self.channels() == 0 {
            return Err(ConfigError::InvalidChannels);
        }
        Ok(())
    }
}
