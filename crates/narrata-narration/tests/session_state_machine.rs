//! Integration tests for the narration pipeline.
//!
//! These drive the session, playback controller, and pre-fetch worker with
//! mock collaborators. No audio hardware, TTS backend, or chapter files are
//! required — the mocks return canned audio instantly (or on demand through
//! a gate, for the supersession tests).
//!
//! # What is tested
//!
//! - Session state machine guards (idle, already-started, not-active)
//! - Chapter validation at `start` / `jump_to`
//! - Cache-hit playback without touching the synthesizer
//! - Pre-fetch supersession (stale requests are dropped, not queued)
//! - Pause/resume suspending the same audio rather than reloading it
//! - Skip responsiveness while audio is in flight
//! - Chapter rollover across gaps and the natural end of content
//! - The 3-paragraph stop scenario
//! - Voice changes invalidating previously pre-fetched audio

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

use narrata_core::{
    Chapter, ChapterStore, SpeechAudio, SpeechSynthesizer, StoreError, SynthesisError,
};
use narrata_narration::{
    AudioOutput, Controls, Fingerprint, NarrationError, NarrationEvent, NarrationParams,
    NarrationSession, PlaybackController, PrefetchRequest, PrefetchWorker, SessionConfig,
    SessionState, SpeakOutcome, SpeechCache,
};

// ── Mock chapter store ─────────────────────────────────────────────

struct MapStore {
    chapters: Vec<Chapter>,
}

impl MapStore {
    fn new(chapters: &[(u32, &[&str])]) -> Arc<Self> {
        Arc::new(Self {
            chapters: chapters
                .iter()
                .map(|(number, paragraphs)| Chapter {
                    number: *number,
                    title: format!("Chapter {number}"),
                    paragraphs: paragraphs.iter().map(ToString::to_string).collect(),
                })
                .collect(),
        })
    }
}

impl ChapterStore for MapStore {
    fn available_chapters(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self.chapters.iter().map(|c| c.number).collect();
        numbers.sort_unstable();
        numbers
    }

    fn load_chapter(&self, number: u32) -> Result<Option<Chapter>, StoreError> {
        Ok(self.chapters.iter().find(|c| c.number == number).cloned())
    }
}

// ── Mock synthesizer ───────────────────────────────────────────────

/// Counting semaphore so a test can hold the synthesizer mid-call.
struct Gate {
    permits: Mutex<usize>,
    cv: Condvar,
}

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            permits: Mutex::new(0),
            cv: Condvar::new(),
        })
    }

    fn release(&self, n: usize) {
        *self.permits.lock().unwrap() += n;
        self.cv.notify_all();
    }

    fn acquire(&self) {
        let mut permits = self.permits.lock().unwrap();
        while *permits == 0 {
            permits = self.cv.wait(permits).unwrap();
        }
        *permits -= 1;
    }
}

/// Synthesizer returning a short burst of silence, recording every request.
struct RecordingSynth {
    started: AtomicUsize,
    texts: Mutex<Vec<String>>,
    gate: Option<Arc<Gate>>,
}

impl RecordingSynth {
    fn instant() -> Arc<Self> {
        Arc::new(Self {
            started: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    fn gated(gate: Arc<Gate>) -> Arc<Self> {
        Arc::new(Self {
            started: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
            gate: Some(gate),
        })
    }

    fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    fn calls_started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

impl SpeechSynthesizer for RecordingSynth {
    fn synthesize(
        &self,
        text: &str,
        _voice_id: &str,
        _rate_percent: i32,
    ) -> Result<SpeechAudio, SynthesisError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(ref gate) = self.gate {
            gate.acquire();
        }
        self.texts.lock().unwrap().push(text.to_string());
        Ok(SpeechAudio {
            samples: vec![0.0f32; 160], // 10 ms of silence at 16 kHz
            sample_rate: 16_000,
            duration: Duration::from_millis(10),
        })
    }
}

// ── Mock audio output ──────────────────────────────────────────────

#[derive(Default)]
struct FakeChannel {
    loaded: bool,
    remaining: Duration,
    started_at: Option<Instant>,
}

/// Audio output that "plays" each asset for a fixed wall-clock duration,
/// honouring pause (position held) and stop (content discarded).
struct FakeOutput {
    channel: Mutex<FakeChannel>,
    play_duration: Duration,
    loads: AtomicUsize,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    loaded_assets: Mutex<Vec<Arc<SpeechAudio>>>,
}

impl FakeOutput {
    fn new(play_duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            channel: Mutex::new(FakeChannel::default()),
            play_duration,
            loads: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
            loaded_assets: Mutex::new(Vec::new()),
        })
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl AudioOutput for FakeOutput {
    fn load(&self, audio: Arc<SpeechAudio>) -> Result<(), NarrationError> {
        let mut ch = self.channel.lock().unwrap();
        ch.loaded = true;
        ch.remaining = self.play_duration;
        ch.started_at = None;
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.loaded_assets.lock().unwrap().push(audio);
        Ok(())
    }

    fn play(&self) {
        let mut ch = self.channel.lock().unwrap();
        if ch.loaded && ch.started_at.is_none() {
            ch.started_at = Some(Instant::now());
        }
    }

    fn pause(&self) {
        let mut ch = self.channel.lock().unwrap();
        if let Some(t0) = ch.started_at.take() {
            ch.remaining = ch.remaining.saturating_sub(t0.elapsed());
        }
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self) {
        let mut ch = self.channel.lock().unwrap();
        if ch.loaded && ch.started_at.is_none() {
            ch.started_at = Some(Instant::now());
        }
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        let mut ch = self.channel.lock().unwrap();
        ch.loaded = false;
        ch.started_at = None;
        ch.remaining = Duration::ZERO;
    }

    fn is_playing(&self) -> bool {
        let mut ch = self.channel.lock().unwrap();
        if !ch.loaded {
            return false;
        }
        match ch.started_at {
            // Paused or not yet started: audio still present.
            None => true,
            Some(t0) => {
                if t0.elapsed() >= ch.remaining {
                    ch.loaded = false;
                    false
                } else {
                    true
                }
            }
        }
    }

    fn set_volume(&self, _volume: f32) {}
}

// ── Helpers ────────────────────────────────────────────────────────

const EVENT_DEADLINE: Duration = Duration::from_secs(5);

fn wait_for<F>(rx: &mut UnboundedReceiver<NarrationEvent>, mut pred: F) -> Option<NarrationEvent>
where
    F: FnMut(&NarrationEvent) -> bool,
{
    let deadline = Instant::now() + EVENT_DEADLINE;
    loop {
        match rx.try_recv() {
            Ok(event) => {
                if pred(&event) {
                    return Some(event);
                }
            }
            Err(TryRecvError::Empty) => {
                if Instant::now() >= deadline {
                    return None;
                }
                thread::sleep(Duration::from_millis(5));
            }
            Err(TryRecvError::Disconnected) => return None,
        }
    }
}

fn wait_for_paragraph(
    rx: &mut UnboundedReceiver<NarrationEvent>,
    chapter: u32,
    paragraph: usize,
) -> bool {
    wait_for(rx, |e| {
        matches!(
            e,
            NarrationEvent::Paragraph { chapter: c, paragraph: p, .. }
            if *c == chapter && *p == paragraph
        )
    })
    .is_some()
}

/// Poll until `pred` holds, or fail the test after the deadline.
fn eventually(what: &str, mut pred: impl FnMut() -> bool) {
    let deadline = Instant::now() + EVENT_DEADLINE;
    while !pred() {
        assert!(Instant::now() < deadline, "timed out waiting for: {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

fn session_with(
    store: Arc<MapStore>,
    synth: Arc<RecordingSynth>,
    output: Arc<FakeOutput>,
) -> (NarrationSession, UnboundedReceiver<NarrationEvent>) {
    NarrationSession::new(
        store,
        synth,
        output,
        SessionConfig {
            voice_id: "voice-a".to_string(),
            ..SessionConfig::default()
        },
    )
}

fn test_params() -> NarrationParams {
    NarrationParams {
        voice_id: "voice-a".to_string(),
        rate_percent: 0,
        volume: 1.0,
    }
}

fn silence() -> Arc<SpeechAudio> {
    Arc::new(SpeechAudio {
        samples: vec![0.0f32; 160],
        sample_rate: 16_000,
        duration: Duration::from_millis(10),
    })
}

// ── State machine guards ───────────────────────────────────────────

#[test]
fn initial_state_is_idle() {
    let (session, _rx) = session_with(
        MapStore::new(&[(1, &["a"])]),
        RecordingSynth::instant(),
        FakeOutput::new(Duration::from_millis(20)),
    );
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.is_active());
}

#[test]
fn commands_require_an_active_session() {
    let (session, _rx) = session_with(
        MapStore::new(&[(1, &["a"])]),
        RecordingSynth::instant(),
        FakeOutput::new(Duration::from_millis(20)),
    );
    assert!(matches!(session.pause(), Err(NarrationError::NotActive)));
    assert!(matches!(session.skip_forward(), Err(NarrationError::NotActive)));
    assert!(matches!(session.jump_to(1, 1), Err(NarrationError::NotActive)));
}

#[test]
fn start_rejects_unknown_chapter_and_stays_idle() {
    let (mut session, _rx) = session_with(
        MapStore::new(&[(1, &["a"])]),
        RecordingSynth::instant(),
        FakeOutput::new(Duration::from_millis(20)),
    );
    let err = session.start(42, 1).unwrap_err();
    assert!(matches!(err, NarrationError::ChapterNotFound { chapter: 42 }));
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn start_rejects_empty_chapter() {
    let (mut session, _rx) = session_with(
        MapStore::new(&[(3, &[])]),
        RecordingSynth::instant(),
        FakeOutput::new(Duration::from_millis(20)),
    );
    assert!(matches!(
        session.start(3, 1),
        Err(NarrationError::EmptyChapter { chapter: 3 })
    ));
}

#[test]
fn a_session_cannot_be_started_twice() {
    let (mut session, _rx) = session_with(
        MapStore::new(&[(1, &["a", "b"])]),
        RecordingSynth::instant(),
        FakeOutput::new(Duration::from_secs(2)),
    );
    session.start(1, 1).unwrap();
    assert!(matches!(session.start(1, 1), Err(NarrationError::AlreadyStarted)));
    session.stop().unwrap();

    // Stopped is terminal — a fresh session is needed to narrate again.
    assert!(matches!(session.start(1, 1), Err(NarrationError::AlreadyStarted)));
}

#[test]
fn pause_and_resume_move_between_states() {
    let (mut session, mut rx) = session_with(
        MapStore::new(&[(1, &["a", "b", "c"])]),
        RecordingSynth::instant(),
        FakeOutput::new(Duration::from_secs(2)),
    );
    session.start(1, 1).unwrap();
    assert!(wait_for_paragraph(&mut rx, 1, 1));

    session.pause().unwrap();
    assert_eq!(session.state(), SessionState::Paused);
    assert!(
        wait_for(&mut rx, |e| matches!(
            e,
            NarrationEvent::StateChanged(SessionState::Paused)
        ))
        .is_some()
    );

    session.resume().unwrap();
    assert_eq!(session.state(), SessionState::Running);

    session.stop().unwrap();
    assert_eq!(session.state(), SessionState::Stopped);
}

#[test]
fn jump_to_unknown_chapter_fails_but_narration_continues() {
    let (mut session, mut rx) = session_with(
        MapStore::new(&[(1, &["a", "b"])]),
        RecordingSynth::instant(),
        FakeOutput::new(Duration::from_secs(2)),
    );
    session.start(1, 1).unwrap();
    assert!(wait_for_paragraph(&mut rx, 1, 1));

    assert!(matches!(
        session.jump_to(9, 1),
        Err(NarrationError::ChapterNotFound { chapter: 9 })
    ));
    assert!(session.is_active());
    session.stop().unwrap();
}

#[test]
fn jump_reseats_the_cursor_mid_playback() {
    let (mut session, mut rx) = session_with(
        MapStore::new(&[(1, &["a", "b", "c", "d"])]),
        RecordingSynth::instant(),
        FakeOutput::new(Duration::from_secs(5)),
    );
    session.start(1, 1).unwrap();
    assert!(wait_for_paragraph(&mut rx, 1, 1));
    thread::sleep(Duration::from_millis(50));

    session.jump_to(1, 4).unwrap();
    assert!(wait_for_paragraph(&mut rx, 1, 4), "expected paragraph 4 after jump");
    session.stop().unwrap();
}

// ── Cache-hit playback (no synthesizer involvement) ────────────────

#[test]
fn cached_paragraph_plays_without_synthesis() {
    let cache = Arc::new(SpeechCache::new(4));
    let synth = RecordingSynth::instant();
    let output = FakeOutput::new(Duration::from_millis(30));
    let controls = Controls::new(test_params());

    let fingerprint = Fingerprint::compute("hello world", "voice-a", 0);
    cache.put(fingerprint, silence());

    let controller = PlaybackController::new(
        Arc::clone(&cache),
        Arc::clone(&synth) as Arc<dyn SpeechSynthesizer>,
        Arc::clone(&output) as Arc<dyn AudioOutput>,
        controls,
    );

    let outcome = controller.speak("hello world");
    assert_eq!(outcome, SpeakOutcome::Completed);
    assert_eq!(synth.calls_started(), 0, "cache hit must not synthesize");
    assert_eq!(output.loads(), 1);
}

#[test]
fn cache_miss_synthesizes_inline_and_caches() {
    let cache = Arc::new(SpeechCache::new(4));
    let synth = RecordingSynth::instant();
    let output = FakeOutput::new(Duration::from_millis(30));
    let controls = Controls::new(test_params());

    let controller = PlaybackController::new(
        Arc::clone(&cache),
        Arc::clone(&synth) as Arc<dyn SpeechSynthesizer>,
        Arc::clone(&output) as Arc<dyn AudioOutput>,
        controls,
    );

    assert_eq!(controller.speak("fresh text"), SpeakOutcome::Completed);
    assert_eq!(synth.calls_started(), 1);
    assert_eq!(cache.len(), 1, "fallback synthesis must populate the cache");

    // Second time around it is a hit.
    assert_eq!(controller.speak("fresh text"), SpeakOutcome::Completed);
    assert_eq!(synth.calls_started(), 1);
}

// ── Pre-fetch supersession ─────────────────────────────────────────

#[test]
fn superseded_prefetch_requests_are_dropped() {
    let cache = Arc::new(SpeechCache::new(10));
    let gate = Gate::new();
    let synth = RecordingSynth::gated(Arc::clone(&gate));

    let worker = PrefetchWorker::spawn(
        Arc::clone(&cache),
        Arc::clone(&synth) as Arc<dyn SpeechSynthesizer>,
    )
    .unwrap();
    let handle = worker.handle();

    let request = |text: &str| PrefetchRequest {
        text: text.to_string(),
        voice_id: "voice-a".to_string(),
        rate_percent: 0,
    };

    // A is picked up and blocks inside the synthesizer.
    handle.request(request("alpha"));
    eventually("worker to start on alpha", || synth.calls_started() == 1);

    // B then C queue up while A is in flight; C supersedes B.
    handle.request(request("bravo"));
    handle.request(request("charlie"));

    gate.release(2);
    eventually("alpha and charlie to be synthesized", || {
        synth.texts().len() == 2
    });

    assert_eq!(synth.texts(), vec!["alpha", "charlie"], "bravo must be dropped");
    assert_eq!(cache.len(), 2);

    worker.stop(Duration::from_secs(2)).unwrap();
}

#[test]
fn prefetch_skips_already_cached_text() {
    let cache = Arc::new(SpeechCache::new(10));
    let synth = RecordingSynth::instant();

    let fingerprint = Fingerprint::compute("known", "voice-a", 0);
    cache.put(fingerprint, silence());

    let worker = PrefetchWorker::spawn(
        Arc::clone(&cache),
        Arc::clone(&synth) as Arc<dyn SpeechSynthesizer>,
    )
    .unwrap();

    worker.handle().request(PrefetchRequest {
        text: "known".to_string(),
        voice_id: "voice-a".to_string(),
        rate_percent: 0,
    });

    // Give the worker a moment; it must not re-synthesize a cached entry.
    thread::sleep(Duration::from_millis(100));
    assert_eq!(synth.calls_started(), 0);

    worker.stop(Duration::from_secs(2)).unwrap();
}

// ── Pause preserves position ───────────────────────────────────────

#[test]
fn pause_suspends_the_same_audio_instead_of_reloading() {
    let output = FakeOutput::new(Duration::from_millis(300));
    let (mut session, mut rx) = session_with(
        MapStore::new(&[(1, &["only paragraph"])]),
        RecordingSynth::instant(),
        Arc::clone(&output),
    );
    session.start(1, 1).unwrap();
    assert!(wait_for_paragraph(&mut rx, 1, 1));

    // Let playback begin, then pause mid-audio.
    eventually("audio to start", || output.loads() == 1);
    thread::sleep(Duration::from_millis(50));
    session.pause().unwrap();
    eventually("channel to pause", || {
        output.pauses.load(Ordering::SeqCst) >= 1
    });

    // While paused the channel still holds the audio.
    thread::sleep(Duration::from_millis(100));
    assert_eq!(output.loads(), 1, "pause must not reload the asset");

    session.resume().unwrap();
    assert!(
        wait_for(&mut rx, |e| matches!(e, NarrationEvent::Finished)).is_some(),
        "resumed audio should run to completion"
    );

    assert_eq!(output.loads(), 1, "the same asset must play to the end");
    assert!(output.resumes.load(Ordering::SeqCst) >= 1);
    assert_eq!(output.loaded_assets.lock().unwrap().len(), 1);

    session.stop().unwrap();
}

// ── Skip responsiveness ────────────────────────────────────────────

#[test]
fn skip_interrupts_playback_promptly() {
    let output = FakeOutput::new(Duration::from_secs(5));
    let (mut session, mut rx) = session_with(
        MapStore::new(&[(1, &["a", "b", "c"])]),
        RecordingSynth::instant(),
        Arc::clone(&output),
    );
    session.start(1, 1).unwrap();
    assert!(wait_for_paragraph(&mut rx, 1, 1));
    thread::sleep(Duration::from_millis(100));

    let issued = Instant::now();
    session.skip_forward().unwrap();
    assert!(wait_for_paragraph(&mut rx, 1, 2), "expected paragraph 2 after skip");
    assert!(
        issued.elapsed() < Duration::from_secs(1),
        "skip took {:?}, natural completion would be ~5 s",
        issued.elapsed()
    );

    session.stop().unwrap();
}

#[test]
fn skip_back_replays_the_previous_paragraph() {
    let output = FakeOutput::new(Duration::from_secs(5));
    let (mut session, mut rx) = session_with(
        MapStore::new(&[(1, &["a", "b", "c"])]),
        RecordingSynth::instant(),
        Arc::clone(&output),
    );
    session.start(1, 2).unwrap();
    assert!(wait_for_paragraph(&mut rx, 1, 2));
    thread::sleep(Duration::from_millis(100));

    session.skip_back().unwrap();
    assert!(wait_for_paragraph(&mut rx, 1, 1), "expected paragraph 1 after rewind");

    session.stop().unwrap();
}

// ── Chapter rollover ───────────────────────────────────────────────

#[test]
fn rollover_crosses_chapter_gaps_and_finishes_at_the_end() {
    let output = FakeOutput::new(Duration::from_millis(30));
    let (mut session, mut rx) = session_with(
        MapStore::new(&[(1, &["a", "b"]), (5, &["c"])]),
        RecordingSynth::instant(),
        Arc::clone(&output),
    );
    session.start(1, 1).unwrap();

    assert!(wait_for_paragraph(&mut rx, 1, 1));
    assert!(wait_for_paragraph(&mut rx, 1, 2));
    assert!(
        wait_for(&mut rx, |e| matches!(
            e,
            NarrationEvent::ChapterStarted { chapter: 5, .. }
        ))
        .is_some(),
        "expected rollover into chapter 5"
    );
    assert!(wait_for_paragraph(&mut rx, 5, 1));
    assert!(wait_for(&mut rx, |e| matches!(e, NarrationEvent::Finished)).is_some());

    eventually("session to reach Stopped", || {
        session.state() == SessionState::Stopped
    });
    session.stop().unwrap();
}

// ── End-to-end stop scenario ───────────────────────────────────────

#[test]
fn stop_after_two_paragraphs_never_plays_the_third() {
    let output = FakeOutput::new(Duration::from_millis(150));
    let (mut session, mut rx) = session_with(
        MapStore::new(&[(1, &["A", "B", "C"])]),
        RecordingSynth::instant(),
        Arc::clone(&output),
    );
    session.start(1, 1).unwrap();

    assert!(wait_for_paragraph(&mut rx, 1, 1));
    assert!(wait_for_paragraph(&mut rx, 1, 2));
    session.stop().unwrap();

    // No further paragraph events, and paragraph C's audio never loaded.
    assert!(
        wait_for(&mut rx, |e| matches!(
            e,
            NarrationEvent::Paragraph { paragraph: 3, .. }
        ))
        .is_none(),
        "paragraph 3 must not be narrated after stop"
    );
    assert!(output.loads() <= 2, "only paragraphs A and B may reach the channel");
}

// ── Voice change invalidation ──────────────────────────────────────

#[test]
fn voice_change_invalidates_prefetched_audio() {
    let output = FakeOutput::new(Duration::from_millis(500));
    let synth = RecordingSynth::instant();
    let (mut session, mut rx) = session_with(
        MapStore::new(&[(1, &["first text", "second text", "third text"])]),
        Arc::clone(&synth),
        Arc::clone(&output),
    );
    session.start(1, 1).unwrap();
    assert!(wait_for_paragraph(&mut rx, 1, 1));

    // The worker pre-fetches paragraph 2 while paragraph 1 plays.
    eventually("paragraph 2 to be pre-fetched", || {
        synth.texts().iter().filter(|t| *t == "second text").count() == 1
    });

    // Switch voice away and back: fingerprints match again, but the cache
    // was cleared, so the pre-fetched entry must be gone.
    session.set_voice("voice-b");
    session.set_voice("voice-a");

    assert!(wait_for_paragraph(&mut rx, 1, 2));
    eventually("paragraph 2 to be re-synthesized after voice change", || {
        synth.texts().iter().filter(|t| *t == "second text").count() >= 2
    });

    session.stop().unwrap();
}
