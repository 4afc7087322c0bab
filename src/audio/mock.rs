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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{next_source_id, OutputSink, SampleBuffer, SinkError, VoiceHandle};

/// A mock sink. Doesn't actually play anything, but records every voice it creates.
#[derive(Clone)]
pub struct Sink {
    name: String,
    voices: Arc<Mutex<Vec<Arc<VoiceRecord>>>>,
    unavailable: Arc<AtomicBool>,
}

/// What the mock sink knows about a voice it created.
#[derive(Debug)]
pub struct VoiceRecord {
    id: u64,
    rate: f64,
    looping: bool,
    frames: usize,
    started: AtomicBool,
    stopped: AtomicBool,
    finished: AtomicBool,
}

impl VoiceRecord {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Number of frames in the buffer the voice was bound to.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// True once the voice has played to the end of its sample.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    /// Ends playback as a non-looping voice does when it runs out of sample.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }

    /// True while the voice would be audible.
    pub fn is_live(&self) -> bool {
        self.is_started() && !self.is_stopped() && !self.is_finished()
    }
}

impl Sink {
    /// Gets the given mock sink.
    pub fn get(name: &str) -> Sink {
        Sink {
            name: name.to_string(),
            voices: Arc::new(Mutex::new(Vec::new())),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes voice creation fail, as if the device had gone away.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Returns every voice created so far, in creation order.
    pub fn voices(&self) -> Vec<Arc<VoiceRecord>> {
        self.voices.lock().clone()
    }

    /// Returns the number of voices that are started and not yet stopped.
    pub fn live_count(&self) -> usize {
        self.voices.lock().iter().filter(|v| v.is_live()).count()
    }

    /// Returns the rates of all live voices.
    pub fn live_rates(&self) -> Vec<f64> {
        self.voices
            .lock()
            .iter()
            .filter(|v| v.is_live())
            .map(|v| v.rate)
            .collect()
    }
}

impl OutputSink for Sink {
    fn create_voice(
        &self,
        buffer: &SampleBuffer,
        rate: f64,
        looping: bool,
    ) -> Result<Box<dyn VoiceHandle>, SinkError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(SinkError::StreamClosed);
        }

        let record = Arc::new(VoiceRecord {
            id: next_source_id(),
            rate,
            looping,
            frames: buffer.frame_count(),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        });
        self.voices.lock().push(record.clone());
        debug!(sink = self.name, id = record.id, rate, "Created voice (mock)");

        Ok(Box::new(Voice { record }))
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

/// A mock voice handle.
struct Voice {
    record: Arc<VoiceRecord>,
}

impl VoiceHandle for Voice {
    fn start(&mut self) -> Result<(), SinkError> {
        if self.record.is_stopped() {
            return Err(SinkError::StreamClosed);
        }
        self.record.started.store(true, Ordering::Relaxed);
        info!(
            id = self.record.id,
            rate = format!("{:.4}", self.record.rate),
            "Playing voice (mock)."
        );
        Ok(())
    }

    fn stop(&mut self) {
        if !self.record.stopped.swap(true, Ordering::Relaxed) {
            debug!(id = self.record.id, "Stopped voice (mock)");
        }
    }

    fn is_finished(&self) -> bool {
        self.record.is_stopped() || self.record.is_finished()
    }
}
