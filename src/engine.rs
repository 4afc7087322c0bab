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
//! The voice engine: one shared sample played back across all 88 keys.
//!
//! The engine moves from uninitialized, through sample loading, to ready. Playback is only
//! possible once a sample has been loaded; every other query is available at any time.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::audio::{OutputSink, SampleBuffer};
use crate::config::EngineConfig;
use crate::loader::SampleFetcher;
use crate::pitch::{KeyNumber, NoteName, PitchTable, KEY_COUNT};

mod error;
mod voice;

pub use error::EngineError;
pub use voice::{Voice, VoiceManager};

/// Highest octave number on the keyboard (C8).
const MAX_OCTAVE: u8 = 8;

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No sample has been requested yet, or every request so far has failed.
    Uninitialized,
    /// A sample load is in flight and no sample is available yet.
    SampleLoading,
    /// A sample is loaded and keys can be played.
    Ready,
}

/// Snapshot of a single key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyInfo {
    key: KeyNumber,
    note_name: NoteName,
    frequency: f64,
    playback_rate: f64,
    is_playing: bool,
}

impl KeyInfo {
    pub fn key(&self) -> KeyNumber {
        self.key
    }

    pub fn note_name(&self) -> NoteName {
        self.note_name
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }
}

impl fmt::Display for KeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<3} | Key {:>2} | {:>7.2} Hz | Rate: {:>6.4} | {}",
            self.note_name,
            self.key.get(),
            self.frequency,
            self.playback_rate,
            if self.is_playing { "PLAYING" } else { "silent" }
        )
    }
}

/// Per-key outcome of a chord. A chord is not atomic: members succeed or fail on their own.
#[derive(Debug)]
pub struct ChordReport {
    results: Vec<(i64, Result<(), EngineError>)>,
}

impl ChordReport {
    /// Every member in the order it was played.
    pub fn results(&self) -> &[(i64, Result<(), EngineError>)] {
        &self.results
    }

    /// The keys that started playing.
    pub fn played(&self) -> Vec<i64> {
        self.results
            .iter()
            .filter(|(_, result)| result.is_ok())
            .map(|(key, _)| *key)
            .collect()
    }

    /// The keys that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (i64, &EngineError)> {
        self.results
            .iter()
            .filter_map(|(key, result)| result.as_ref().err().map(|e| (*key, e)))
    }

    /// True if every member played.
    pub fn is_complete(&self) -> bool {
        self.results.iter().all(|(_, result)| result.is_ok())
    }
}

struct EngineInner {
    /// The loaded sample, shared by every voice created from it.
    buffer: Option<SampleBuffer>,
    voices: VoiceManager,
    loads_in_flight: usize,
    /// Generation handed to the most recently issued load.
    issued_generation: u64,
    /// Generation of the load that produced the current buffer.
    applied_generation: u64,
}

impl EngineInner {
    fn state(&self) -> EngineState {
        if self.buffer.is_some() {
            EngineState::Ready
        } else if self.loads_in_flight > 0 {
            EngineState::SampleLoading
        } else {
            EngineState::Uninitialized
        }
    }

    /// Drops voices that played to the end of a non-looping sample, leaving only the
    /// sounding ones.
    fn live_voices(&mut self) -> &mut VoiceManager {
        for voice in self.voices.reap_finished() {
            debug!(
                key = voice.key().get(),
                held_ms = voice.age().as_millis(),
                "Voice played out"
            );
        }
        &mut self.voices
    }
}

/// Tracks a load in flight. Dropping it without finishing, e.g. when the load future is
/// abandoned, still takes the load off the books.
struct PendingLoad<'a> {
    inner: &'a Mutex<EngineInner>,
    generation: u64,
    finished: bool,
}

impl<'a> PendingLoad<'a> {
    fn begin(inner: &'a Mutex<EngineInner>) -> PendingLoad<'a> {
        let mut guard = inner.lock();
        guard.loads_in_flight += 1;
        guard.issued_generation += 1;
        let generation = guard.issued_generation;
        drop(guard);

        PendingLoad {
            inner,
            generation,
            finished: false,
        }
    }

    fn finish(mut self) -> MutexGuard<'a, EngineInner> {
        let mutex = self.inner;
        let mut guard = mutex.lock();
        guard.loads_in_flight -= 1;
        self.finished = true;
        guard
    }
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.inner.lock().loads_in_flight -= 1;
            debug!(generation = self.generation, "Sample load abandoned");
        }
    }
}

/// Plays a single sample across all 88 keys by shifting its playback rate.
pub struct VoiceEngine<F: SampleFetcher> {
    pitch: PitchTable,
    fetcher: F,
    sink: Arc<dyn OutputSink>,
    looping: bool,
    inner: Mutex<EngineInner>,
}

impl<F: SampleFetcher> VoiceEngine<F> {
    /// Creates an engine with looping voices.
    pub fn new(pitch: PitchTable, fetcher: F, sink: Arc<dyn OutputSink>) -> VoiceEngine<F> {
        info!(
            keys = KEY_COUNT,
            reference_frequency = pitch.reference_frequency(),
            sink = %sink,
            "Virtual piano initialized"
        );
        VoiceEngine {
            pitch,
            fetcher,
            sink,
            looping: true,
            inner: Mutex::new(EngineInner {
                buffer: None,
                voices: VoiceManager::new(),
                loads_in_flight: 0,
                issued_generation: 0,
                applied_generation: 0,
            }),
        }
    }

    /// Creates an engine tuned and configured from the given configuration.
    pub fn from_config(
        config: &EngineConfig,
        fetcher: F,
        sink: Arc<dyn OutputSink>,
    ) -> Result<Self, EngineError> {
        let pitch = PitchTable::new(config.reference_frequency())?;
        Ok(Self::new(pitch, fetcher, sink).with_looping(config.looping()))
    }

    /// Sets whether newly started voices loop.
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn pitch_table(&self) -> &PitchTable {
        &self.pitch
    }

    pub fn state(&self) -> EngineState {
        self.inner.lock().state()
    }

    /// The currently loaded sample, if any.
    pub fn sample(&self) -> Option<SampleBuffer> {
        self.inner.lock().buffer.clone()
    }

    /// Loads the sample every key plays from.
    ///
    /// Other operations are not blocked while the load is in flight; playback fails fast
    /// until a sample is available. Reloading replaces the sample for voices started
    /// afterwards, while sounding voices keep the sample they started with. When loads
    /// overlap, the one issued last wins.
    pub async fn load_sample(&self, locator: &str) -> Result<(), EngineError> {
        let pending = PendingLoad::begin(&self.inner);
        let generation = pending.generation;
        debug!(locator, generation, "Loading sample");

        let result = self.fetcher.fetch(locator).await;

        let mut inner = pending.finish();
        match result {
            Ok(buffer) => {
                if generation < inner.applied_generation {
                    info!(
                        locator,
                        generation,
                        current = inner.applied_generation,
                        "Discarding sample superseded by a newer load"
                    );
                    return Ok(());
                }
                info!(
                    locator,
                    channels = buffer.channel_count(),
                    sample_rate = buffer.sample_rate(),
                    duration_ms = buffer.duration().as_millis(),
                    "Sample ready"
                );
                inner.buffer = Some(buffer);
                inner.applied_generation = generation;
                Ok(())
            }
            Err(e) => {
                error!(locator, error = %e, state = ?inner.state(), "Failed to load audio sample");
                Err(e.into())
            }
        }
    }

    /// Starts the given key, stopping its previous voice first if it was already sounding.
    pub fn play_key(&self, key: i64) -> Result<(), EngineError> {
        let result = self.start_voice(key);
        if let Err(e) = &result {
            warn!(key, error = %e, "Cannot play key");
        }
        result
    }

    fn start_voice(&self, key: i64) -> Result<(), EngineError> {
        let descriptor = *self.pitch.lookup(key)?;
        let mut inner = self.inner.lock();
        let Some(buffer) = inner.buffer.clone() else {
            return Err(EngineError::SampleNotLoaded);
        };

        if let Some(mut previous) = inner.voices.remove(descriptor.key()) {
            previous.stop();
            debug!(key, "Retriggering key");
        }

        let rate = descriptor.playback_rate();
        let handle = self.sink.create_voice(&buffer, rate, self.looping)?;
        inner
            .voices
            .add_voice(Voice::start(descriptor.key(), rate, handle)?);

        info!(
            note = %descriptor.note_name(),
            key,
            frequency = format!("{:.2}", descriptor.frequency()),
            rate = format!("{:.4}", rate),
            "Playing key"
        );
        Ok(())
    }

    /// Stops the given key. Returns false if the key was already silent.
    pub fn stop_key(&self, key: i64) -> Result<bool, EngineError> {
        let key = KeyNumber::new(key)?;
        let voice = self.inner.lock().live_voices().remove(key);
        match voice {
            Some(mut voice) => {
                voice.stop();
                debug!(
                    note = %key.note_name(),
                    key = key.get(),
                    rate = format!("{:.4}", voice.rate()),
                    held_ms = voice.age().as_millis(),
                    "Stopped key"
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stops every sounding key. Returns how many were stopped.
    pub fn stop_all_keys(&self) -> usize {
        let voices = self.inner.lock().live_voices().clear();
        let stopped = voices.len();
        for mut voice in voices {
            voice.stop();
        }
        info!(stopped, "All keys stopped");
        stopped
    }

    /// Plays each key in order. A key that fails does not prevent the others from playing.
    pub fn play_chord(&self, keys: &[i64]) -> ChordReport {
        let notes: Vec<String> = keys
            .iter()
            .map(|&key| match self.pitch.note_name_for(key) {
                Ok(note) => note.to_string(),
                Err(_) => format!("?{}", key),
            })
            .collect();
        info!(chord = notes.join(", "), "Playing chord");

        let report = ChordReport {
            results: keys.iter().map(|&key| (key, self.play_key(key))).collect(),
        };
        if !report.is_complete() {
            warn!(
                failed = report.failures().count(),
                total = keys.len(),
                "Chord only partially played"
            );
        }
        report
    }

    /// Returns true if the key is sounding.
    pub fn is_playing(&self, key: i64) -> Result<bool, EngineError> {
        let key = KeyNumber::new(key)?;
        Ok(self.inner.lock().live_voices().is_playing(key))
    }

    /// Returns the number of sounding keys.
    pub fn active_voice_count(&self) -> usize {
        self.inner.lock().live_voices().active_count()
    }

    /// Snapshot of all 88 keys, ordered by key number.
    pub fn all_key_info(&self) -> Vec<KeyInfo> {
        let mut inner = self.inner.lock();
        let voices = inner.live_voices();
        self.pitch
            .keys()
            .iter()
            .map(|descriptor| KeyInfo {
                key: descriptor.key(),
                note_name: descriptor.note_name(),
                frequency: descriptor.frequency(),
                playback_rate: descriptor.playback_rate(),
                is_playing: voices.is_playing(descriptor.key()),
            })
            .collect()
    }

    /// Renders the keyboard grouped by octave, one line per key.
    pub fn keyboard_status(&self) -> String {
        let keys = self.all_key_info();
        let mut status = format!("Virtual Piano - {} Keys Status:\n", KEY_COUNT);
        for octave in 0..=MAX_OCTAVE {
            let rows: Vec<String> = keys
                .iter()
                .filter(|info| info.note_name().octave() == octave)
                .map(KeyInfo::to_string)
                .collect();
            if rows.is_empty() {
                continue;
            }
            status.push_str(&format!("\nOctave {}:\n", octave));
            for row in rows {
                status.push_str(&row);
                status.push('\n');
            }
        }
        status
    }

    /// Logs the keyboard status report.
    pub fn log_keyboard_status(&self) {
        for line in self.keyboard_status().lines() {
            info!("{}", line);
        }
    }
}

impl<F: SampleFetcher> Drop for VoiceEngine<F> {
    fn drop(&mut self) {
        let voices = self.inner.get_mut().voices.clear();
        if !voices.is_empty() {
            info!(stopped = voices.len(), "Engine shutting down, stopping voices");
        }
    }
}

impl<F: SampleFetcher> fmt::Debug for VoiceEngine<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut inner = self.inner.lock();
        let active_voices = inner.live_voices().active_count();
        f.debug_struct("VoiceEngine")
            .field("state", &inner.state())
            .field("reference_frequency", &self.pitch.reference_frequency())
            .field("sink", &self.sink.to_string())
            .field("active_voices", &active_voices)
            .field(
                "memory_kb",
                &(inner.buffer.as_ref().map_or(0, SampleBuffer::memory_size) / 1024),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::oneshot;

    use super::*;
    use crate::audio::mock;
    use crate::loader::SampleLoadError;

    type LoadResult = Result<SampleBuffer, SampleLoadError>;

    enum Scripted {
        Ready(LoadResult),
        Gated(oneshot::Receiver<LoadResult>),
    }

    /// Answers fetches from a script, in order.
    struct ScriptedFetcher {
        script: parking_lot::Mutex<VecDeque<Scripted>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Scripted>) -> ScriptedFetcher {
            ScriptedFetcher {
                script: parking_lot::Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SampleFetcher for ScriptedFetcher {
        fn fetch(&self, locator: &str) -> impl Future<Output = LoadResult> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().pop_front();
            let locator = locator.to_string();
            async move {
                match next {
                    Some(Scripted::Ready(result)) => result,
                    Some(Scripted::Gated(rx)) => rx
                        .await
                        .unwrap_or_else(|_| Err(SampleLoadError::Interrupted(locator))),
                    None => Err(SampleLoadError::UnsupportedLocator(locator)),
                }
            }
        }
    }

    fn buffer(frames: usize) -> SampleBuffer {
        SampleBuffer::new(vec![0.25; frames * 2], 2, 44100)
    }

    fn load_error() -> SampleLoadError {
        SampleLoadError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such sample",
        ))
    }

    fn engine_with(script: Vec<Scripted>) -> (VoiceEngine<ScriptedFetcher>, mock::Sink) {
        let sink = mock::Sink::get("mock-engine");
        let engine = VoiceEngine::new(
            PitchTable::default(),
            ScriptedFetcher::new(script),
            Arc::new(sink.clone()),
        );
        (engine, sink)
    }

    async fn ready_engine() -> (VoiceEngine<ScriptedFetcher>, mock::Sink) {
        let (engine, sink) = engine_with(vec![Scripted::Ready(Ok(buffer(100)))]);
        engine.load_sample("piano.wav").await.unwrap();
        (engine, sink)
    }

    #[tokio::test]
    async fn test_load_transitions_to_ready() {
        let (engine, _sink) = engine_with(vec![Scripted::Ready(Ok(buffer(100)))]);
        assert_eq!(engine.state(), EngineState::Uninitialized);

        engine.load_sample("piano.wav").await.unwrap();
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.sample().unwrap().frame_count(), 100);
    }

    #[test]
    fn test_play_before_load_fails() {
        let (engine, sink) = engine_with(vec![]);
        assert!(matches!(
            engine.play_key(40),
            Err(EngineError::SampleNotLoaded)
        ));
        assert!(sink.voices().is_empty());
        assert_eq!(engine.active_voice_count(), 0);
    }

    #[tokio::test]
    async fn test_play_while_loading_fails_fast() {
        let (tx, rx) = oneshot::channel();
        let (engine, sink) = engine_with(vec![Scripted::Gated(rx)]);

        let observe = async {
            while engine.state() != EngineState::SampleLoading {
                tokio::task::yield_now().await;
            }
            assert!(matches!(
                engine.play_key(49),
                Err(EngineError::SampleNotLoaded)
            ));
            assert!(sink.voices().is_empty());
            tx.send(Ok(buffer(10))).unwrap();
        };

        let (loaded, ()) = tokio::join!(engine.load_sample("piano.wav"), observe);
        loaded.unwrap();
        assert_eq!(engine.state(), EngineState::Ready);
        engine.play_key(49).unwrap();
        assert_eq!(sink.live_count(), 1);
    }

    #[tokio::test]
    async fn test_load_failure_then_retry() {
        let (engine, sink) = engine_with(vec![
            Scripted::Ready(Err(load_error())),
            Scripted::Ready(Ok(buffer(100))),
        ]);

        let err = engine.load_sample("piano.wav").await.unwrap_err();
        assert!(matches!(err, EngineError::SampleLoad(_)));
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(matches!(
            engine.play_key(49),
            Err(EngineError::SampleNotLoaded)
        ));

        engine.load_sample("piano.wav").await.unwrap();
        assert_eq!(engine.state(), EngineState::Ready);
        engine.play_key(49).unwrap();
        assert_eq!(sink.live_count(), 1);
        assert_eq!(engine.fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_sample() {
        let (engine, _sink) = engine_with(vec![
            Scripted::Ready(Ok(buffer(100))),
            Scripted::Ready(Err(load_error())),
        ]);
        engine.load_sample("piano.wav").await.unwrap();
        assert!(engine.load_sample("other.wav").await.is_err());

        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.sample().unwrap().frame_count(), 100);
        engine.play_key(40).unwrap();
    }

    #[tokio::test]
    async fn test_reload_applies_to_new_voices_only() {
        let (engine, sink) = engine_with(vec![
            Scripted::Ready(Ok(buffer(100))),
            Scripted::Ready(Ok(buffer(250))),
        ]);
        engine.load_sample("first.wav").await.unwrap();
        engine.play_key(40).unwrap();

        engine.load_sample("second.wav").await.unwrap();
        engine.play_key(44).unwrap();

        let voices = sink.voices();
        assert_eq!(voices[0].frames(), 100);
        assert!(voices[0].is_live());
        assert_eq!(voices[1].frames(), 250);
    }

    #[tokio::test]
    async fn test_newest_load_wins() {
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        let (engine, _sink) = engine_with(vec![
            Scripted::Gated(first_rx),
            Scripted::Gated(second_rx),
        ]);
        let first = buffer(100);
        let second = buffer(200);

        let drive = async {
            while engine.fetcher.calls() < 2 {
                tokio::task::yield_now().await;
            }
            second_tx.send(Ok(second.clone())).unwrap();
            while engine.state() != EngineState::Ready {
                tokio::task::yield_now().await;
            }
            first_tx.send(Ok(first.clone())).unwrap();
        };

        let (a, b, ()) = tokio::join!(
            engine.load_sample("first.wav"),
            engine.load_sample("second.wav"),
            drive
        );
        a.unwrap();
        b.unwrap();

        assert!(engine.sample().unwrap().shares_data_with(&second));
    }

    #[tokio::test]
    async fn test_abandoned_load_is_not_left_in_flight() {
        let (_tx, rx) = oneshot::channel();
        let (engine, _sink) = engine_with(vec![Scripted::Gated(rx)]);

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(10),
            engine.load_sample("slow.wav"),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[tokio::test]
    async fn test_invalid_keys_are_rejected() {
        let (engine, sink) = ready_engine().await;
        for key in [0, 89, -5] {
            assert!(matches!(
                engine.play_key(key),
                Err(EngineError::InvalidKey(_))
            ));
            assert!(matches!(
                engine.stop_key(key),
                Err(EngineError::InvalidKey(_))
            ));
        }
        assert!(sink.voices().is_empty());
    }

    #[test]
    fn test_invalid_key_checked_before_state() {
        let (engine, _sink) = engine_with(vec![]);
        assert!(matches!(
            engine.play_key(89),
            Err(EngineError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_play_key_uses_key_rate() {
        let (engine, sink) = ready_engine().await;
        engine.play_key(49).unwrap();
        engine.play_key(61).unwrap();

        let voices = sink.voices();
        assert_eq!(voices[0].rate(), 1.0);
        assert!((voices[1].rate() - 2.0).abs() < 1e-12);
        assert!(voices.iter().all(|v| v.is_looping()));
        assert!(engine.is_playing(49).unwrap());
        assert!(engine.is_playing(61).unwrap());
    }

    #[tokio::test]
    async fn test_non_looping_config() {
        let sink = mock::Sink::get("mock-engine");
        let config = EngineConfig::default();
        let engine = VoiceEngine::from_config(
            &config,
            ScriptedFetcher::new(vec![Scripted::Ready(Ok(buffer(10)))]),
            Arc::new(sink.clone()),
        )
        .unwrap()
        .with_looping(false);
        engine.load_sample("piano.wav").await.unwrap();
        engine.play_key(49).unwrap();
        assert!(!sink.voices()[0].is_looping());
    }

    #[test]
    fn test_from_config_rejects_bad_reference_frequency() {
        for frequency in [0.0, -440.0, f64::NAN] {
            let config = EngineConfig::default().with_reference_frequency(frequency);
            let result = VoiceEngine::from_config(
                &config,
                ScriptedFetcher::new(vec![]),
                Arc::new(mock::Sink::get("mock-engine")),
            );
            assert!(matches!(
                result,
                Err(EngineError::InvalidReferenceFrequency(_))
            ));
        }

        let config = EngineConfig::default().with_reference_frequency(432.0);
        let engine = VoiceEngine::from_config(
            &config,
            ScriptedFetcher::new(vec![]),
            Arc::new(mock::Sink::get("mock-engine")),
        )
        .unwrap();
        assert_eq!(engine.pitch_table().rate_for(49).unwrap(), 1.0);
        assert_eq!(engine.pitch_table().frequency_for(49).unwrap(), 432.0);
    }

    #[tokio::test]
    async fn test_played_out_voice_is_silent() {
        let (engine, sink) = engine_with(vec![Scripted::Ready(Ok(buffer(10)))]);
        let engine = engine.with_looping(false);
        engine.load_sample("piano.wav").await.unwrap();
        engine.play_chord(&[40, 49]);
        assert_eq!(engine.active_voice_count(), 2);

        // Key 49 reaches the end of its sample.
        sink.voices()[1].finish();

        assert!(!engine.is_playing(49).unwrap());
        assert!(engine.is_playing(40).unwrap());
        assert_eq!(engine.active_voice_count(), 1);
        let playing: Vec<u8> = engine
            .all_key_info()
            .iter()
            .filter(|info| info.is_playing())
            .map(|info| info.key().get())
            .collect();
        assert_eq!(playing, vec![40]);
        assert!(engine.keyboard_status().contains("A4  | Key 49 |  440.00 Hz | Rate: 1.0000 | silent"));
        assert!(!engine.stop_key(49).unwrap());

        engine.play_key(49).unwrap();
        assert!(engine.is_playing(49).unwrap());
        assert_eq!(engine.stop_all_keys(), 2);
    }

    #[tokio::test]
    async fn test_retrigger_never_overlaps() {
        let (engine, sink) = ready_engine().await;
        engine.play_key(40).unwrap();
        engine.play_key(40).unwrap();

        let voices = sink.voices();
        assert_eq!(voices.len(), 2);
        assert!(voices[0].is_stopped());
        assert!(voices[1].is_live());
        assert_eq!(sink.live_count(), 1);
        assert_eq!(engine.active_voice_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_key_is_idempotent() {
        let (engine, sink) = ready_engine().await;
        assert!(!engine.stop_key(40).unwrap());
        assert!(!engine.stop_key(40).unwrap());

        engine.play_key(40).unwrap();
        assert!(engine.stop_key(40).unwrap());
        assert!(!engine.stop_key(40).unwrap());
        assert_eq!(sink.live_count(), 0);
        assert!(!engine.is_playing(40).unwrap());
    }

    #[tokio::test]
    async fn test_chord_partial_failure() {
        let (engine, sink) = ready_engine().await;
        let report = engine.play_chord(&[40, 0, 44]);

        assert_eq!(report.played(), vec![40, 44]);
        assert!(!report.is_complete());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 0);
        assert!(matches!(failures[0].1, EngineError::InvalidKey(_)));

        assert!(engine.is_playing(40).unwrap());
        assert!(engine.is_playing(44).unwrap());
        assert_eq!(sink.live_count(), 2);
    }

    #[tokio::test]
    async fn test_stop_all_keys() {
        let (engine, sink) = ready_engine().await;
        assert!(engine.play_chord(&[40, 44, 47]).is_complete());
        assert_eq!(engine.stop_all_keys(), 3);

        assert!(engine.all_key_info().iter().all(|info| !info.is_playing()));
        assert_eq!(sink.live_count(), 0);
        assert_eq!(engine.stop_all_keys(), 0);
    }

    #[tokio::test]
    async fn test_sink_failure_is_reported() {
        let (engine, sink) = ready_engine().await;
        sink.set_unavailable(true);
        assert!(matches!(engine.play_key(40), Err(EngineError::Sink(_))));
        assert!(!engine.is_playing(40).unwrap());

        sink.set_unavailable(false);
        engine.play_key(40).unwrap();
    }

    #[tokio::test]
    async fn test_drop_releases_all_voices() {
        let (engine, sink) = ready_engine().await;
        engine.play_chord(&[1, 49, 88]);
        assert_eq!(sink.live_count(), 3);

        drop(engine);
        assert_eq!(sink.live_count(), 0);
        assert!(sink.voices().iter().all(|v| v.is_stopped()));
    }

    #[test]
    fn test_key_info_before_load() {
        let (engine, _sink) = engine_with(vec![]);
        let info = engine.all_key_info();
        assert_eq!(info.len(), KEY_COUNT);
        assert_eq!(info[48].note_name().to_string(), "A4");
        assert_eq!(info[48].playback_rate(), 1.0);
        assert!(info.iter().all(|i| !i.is_playing()));
    }

    #[test]
    fn test_key_info_display() {
        let (engine, _sink) = engine_with(vec![]);
        let info = engine.all_key_info();
        assert_eq!(
            info[48].to_string(),
            "A4  | Key 49 |  440.00 Hz | Rate: 1.0000 | silent"
        );
        assert_eq!(
            info[0].to_string(),
            "A0  | Key  1 |   27.50 Hz | Rate: 0.0625 | silent"
        );
    }

    #[tokio::test]
    async fn test_keyboard_status() {
        let (engine, _sink) = ready_engine().await;
        engine.play_key(40).unwrap();
        let status = engine.keyboard_status();

        assert!(status.starts_with("Virtual Piano - 88 Keys Status:\n"));
        for octave in 0..=8 {
            assert!(status.contains(&format!("\nOctave {}:\n", octave)));
        }
        assert!(status.contains("C4  | Key 40 |  261.63 Hz | Rate: 0.5946 | PLAYING"));
        assert!(status.contains("C8  | Key 88 | 4186.01 Hz | Rate: 9.5137 | silent"));
        // Header, 9 blank separator lines, 9 octave headers and one row per key.
        assert_eq!(status.lines().count(), 1 + 9 + 9 + KEY_COUNT);
    }
}
