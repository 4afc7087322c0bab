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
use crate::audio::SinkError;
use crate::loader::SampleLoadError;
use crate::pitch::{InvalidKeyError, InvalidReferenceFrequencyError};

/// Errors reported by the voice engine. None of them leave the engine unusable.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidKey(#[from] InvalidKeyError),

    #[error(transparent)]
    InvalidReferenceFrequency(#[from] InvalidReferenceFrequencyError),

    #[error("Cannot play - sample not loaded")]
    SampleNotLoaded,

    #[error("Failed to load audio sample: {0}")]
    SampleLoad(#[from] SampleLoadError),

    #[error("Output error: {0}")]
    Sink(#[from] SinkError),
}
