//! Pooled transcription worker.
//!
//! Each worker owns one engine instance (built lazily on its background
//! thread, reused across sessions) and one detector instance. The thread
//! cycles Idle → Streaming → Produced for the process lifetime: it blocks on
//! the job channel, streams chunks into the engine until the end-of-stream
//! sentinel, and delivers the transcript on the job's one-shot channel.

use crate::asr::detector::EndpointDetector;
use crate::asr::transcriber::{StreamTranscriber, Transcript};
use crate::audio::format::AudioProfile;
use crate::error::{AsrHubError, Result};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Builds one engine instance per worker, on the worker's thread.
pub type TranscriberFactory = Arc<dyn Fn() -> Box<dyn StreamTranscriber> + Send + Sync>;

/// Builds one detector instance per worker.
pub type DetectorFactory = Arc<dyn Fn() -> Box<dyn EndpointDetector> + Send + Sync>;

/// Items on a worker's chunk queue. `EndOfStream` is the sentinel: it is
/// enqueued exactly once per session and is always the last item the engine
/// sees for that session.
enum ChunkMessage {
    Audio(Vec<u8>),
    EndOfStream,
}

/// One transcription cycle: the worker streams until the sentinel, then
/// sends the transcript on `result_tx` (bounded(1), used as a one-shot).
struct TranscribeJob {
    result_tx: Sender<Transcript>,
}

/// A pooled transcription worker.
///
/// Owned by the registry; assigned to at most one session at a time.
pub struct Worker {
    chunk_tx: Sender<ChunkMessage>,
    job_tx: Sender<TranscribeJob>,
    detector: Box<dyn EndpointDetector>,
    result_rx: Option<Receiver<Transcript>>,
    result_delivered: AtomicBool,
    broken: bool,
    _thread: JoinHandle<()>,
}

impl Worker {
    /// Spawns a worker with its background thread.
    ///
    /// The engine is NOT constructed here: the factory runs on the worker
    /// thread when the first job arrives, and the instance is reused for
    /// every later session on this worker.
    pub fn spawn(
        transcriber_factory: TranscriberFactory,
        detector: Box<dyn EndpointDetector>,
        profile: AudioProfile,
    ) -> Self {
        let (chunk_tx, chunk_rx) = unbounded();
        let (job_tx, job_rx) = unbounded();

        let thread = thread::spawn(move || {
            run_worker(job_rx, chunk_rx, transcriber_factory, profile);
        });

        Self {
            chunk_tx,
            job_tx,
            detector,
            result_rx: None,
            result_delivered: AtomicBool::new(false),
            broken: false,
            _thread: thread,
        }
    }

    /// Arms the worker for a new session: sends a transcribe job with a
    /// fresh one-shot result channel and (re)starts the detector.
    pub fn begin_session(&mut self) -> Result<()> {
        self.result_delivered.store(false, Ordering::SeqCst);
        let (result_tx, result_rx) = bounded(1);
        if self.job_tx.send(TranscribeJob { result_tx }).is_err() {
            self.broken = true;
            return Err(AsrHubError::Session {
                message: "worker thread is gone".to_string(),
            });
        }
        self.result_rx = Some(result_rx);
        self.detector.start();
        Ok(())
    }

    /// Enqueues one chunk and feeds it to the detector.
    ///
    /// Returns true when the detector reports end-of-command. Once the
    /// session result has been delivered the chunk is dropped: nothing may
    /// follow the sentinel on the queue.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Result<bool> {
        if self.is_finalized() {
            return Ok(false);
        }
        if self.chunk_tx.send(ChunkMessage::Audio(chunk.to_vec())).is_err() {
            self.broken = true;
            return Err(AsrHubError::Session {
                message: "worker thread is gone".to_string(),
            });
        }
        self.detector.process_chunk(chunk)
    }

    /// Finalizes the session: exactly-once result delivery.
    ///
    /// Stops the detector, then atomically claims the result-delivered flag.
    /// A caller that loses the race gets `None` (nothing to emit). The
    /// winner enqueues the sentinel and waits up to `timeout` for the
    /// engine's transcript; a timeout or a dead worker degrades to the
    /// canonical empty transcript, never an error.
    pub fn finalize(&mut self, timeout: Duration) -> Option<Transcript> {
        self.detector.stop();

        if self.result_delivered.swap(true, Ordering::SeqCst) {
            return None;
        }

        if self.chunk_tx.send(ChunkMessage::EndOfStream).is_err() {
            self.broken = true;
            return Some(Transcript::empty());
        }

        let transcript = self
            .result_rx
            .as_ref()
            .and_then(|rx| rx.recv_timeout(timeout).ok())
            .unwrap_or_else(Transcript::empty);
        Some(transcript)
    }

    /// Clears per-session state before the worker goes back to the pool.
    pub fn reset(&mut self) {
        // Dropping the receiver discards a transcript that arrives after the
        // wait timed out; the worker's send fails silently.
        self.result_rx = None;
        self.result_delivered.store(false, Ordering::SeqCst);
    }

    /// True once the session's result has been delivered.
    pub fn is_finalized(&self) -> bool {
        self.result_delivered.load(Ordering::SeqCst)
    }

    /// False if the background thread is gone; such a worker is retired
    /// instead of pooled.
    pub fn is_healthy(&self) -> bool {
        !self.broken
    }
}

/// Pulls chunks off the queue for the engine, stopping at the sentinel.
struct ChunkStream<'a> {
    rx: &'a Receiver<ChunkMessage>,
    ended: bool,
}

impl<'a> ChunkStream<'a> {
    fn new(rx: &'a Receiver<ChunkMessage>) -> Self {
        Self { rx, ended: false }
    }

    /// Consumes through the sentinel so the queue is clean for the next
    /// session. No-op if the stream already ended.
    fn drain(&mut self) {
        while self.next().is_some() {}
    }
}

impl Iterator for ChunkStream<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        if self.ended {
            return None;
        }
        match self.rx.recv() {
            Ok(ChunkMessage::Audio(bytes)) => Some(bytes),
            Ok(ChunkMessage::EndOfStream) | Err(_) => {
                self.ended = true;
                None
            }
        }
    }
}

/// Worker background loop: Idle (job recv) → Streaming (chunk pull) →
/// Produced (result send) → Idle, for the process lifetime.
fn run_worker(
    job_rx: Receiver<TranscribeJob>,
    chunk_rx: Receiver<ChunkMessage>,
    transcriber_factory: TranscriberFactory,
    profile: AudioProfile,
) {
    let mut engine: Option<Box<dyn StreamTranscriber>> = None;

    while let Ok(job) = job_rx.recv() {
        let engine_ref = engine.get_or_insert_with(|| transcriber_factory());
        let mut chunks = ChunkStream::new(&chunk_rx);

        match engine_ref.transcribe_stream(&mut chunks, &profile) {
            Ok(transcript) => {
                // The receiver is gone when the finalize wait timed out; the
                // session already emitted the empty transcript.
                let _ = job.result_tx.send(transcript);
            }
            Err(e) => {
                eprintln!("asrhub: worker transcription failed: {e}");
                // Queue hygiene: eat everything up to this session's
                // sentinel, then discard the engine so the next session gets
                // a fresh one instead of a possibly wedged instance.
                chunks.drain();
                engine = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::detector::MockDetector;
    use crate::asr::transcriber::MockStreamTranscriber;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn counting_factory(
        counter: Arc<AtomicUsize>,
        build: impl Fn() -> MockStreamTranscriber + Send + Sync + 'static,
    ) -> TranscriberFactory {
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(build())
        })
    }

    fn echo_worker(counter: Arc<AtomicUsize>) -> Worker {
        Worker::spawn(
            counting_factory(counter, || MockStreamTranscriber::new().with_echo()),
            Box::new(MockDetector::new()),
            AudioProfile::default(),
        )
    }

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[test]
    fn test_full_session_cycle() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut worker = echo_worker(Arc::clone(&counter));

        worker.begin_session().unwrap();
        worker.push_chunk(b"hello ").unwrap();
        worker.push_chunk(b"world").unwrap();

        let transcript = worker.finalize(TIMEOUT).expect("first finalize emits");
        assert_eq!(transcript.text, "hello world");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut worker = echo_worker(counter);

        worker.begin_session().unwrap();
        worker.push_chunk(b"once").unwrap();

        assert!(worker.finalize(TIMEOUT).is_some());
        assert!(worker.finalize(TIMEOUT).is_none());
        assert!(worker.finalize(TIMEOUT).is_none());
    }

    #[test]
    fn test_chunks_after_finalize_are_dropped() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut worker = echo_worker(Arc::clone(&counter));

        worker.begin_session().unwrap();
        worker.push_chunk(b"kept").unwrap();
        let transcript = worker.finalize(TIMEOUT).unwrap();
        assert_eq!(transcript.text, "kept");

        // Late frames must not reach the queue
        assert!(!worker.push_chunk(b"stale").unwrap());

        // Next session on the same worker sees none of the stale bytes
        worker.reset();
        worker.begin_session().unwrap();
        worker.push_chunk(b"fresh").unwrap();
        let transcript = worker.finalize(TIMEOUT).unwrap();
        assert_eq!(transcript.text, "fresh");
        assert_eq!(
            counter.load(Ordering::SeqCst),
            1,
            "engine is constructed once per worker"
        );
    }

    #[test]
    fn test_slow_engine_times_out_to_empty() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut worker = Worker::spawn(
            counting_factory(counter, || {
                MockStreamTranscriber::new()
                    .with_response("too late")
                    .with_delay(Duration::from_millis(300))
            }),
            Box::new(MockDetector::new()),
            AudioProfile::default(),
        );

        worker.begin_session().unwrap();
        worker.push_chunk(b"audio").unwrap();

        let transcript = worker.finalize(Duration::from_millis(30)).unwrap();
        assert_eq!(transcript, Transcript::empty());
    }

    #[test]
    fn test_engine_failure_respawns_engine() {
        let counter = Arc::new(AtomicUsize::new(0));
        let fail_first = Arc::new(AtomicBool::new(true));

        let fail_flag = Arc::clone(&fail_first);
        let factory: TranscriberFactory = {
            let counter = Arc::clone(&counter);
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                if fail_flag.swap(false, Ordering::SeqCst) {
                    Box::new(MockStreamTranscriber::new().with_failure())
                } else {
                    Box::new(MockStreamTranscriber::new().with_echo())
                }
            })
        };

        let mut worker = Worker::spawn(
            factory,
            Box::new(MockDetector::new()),
            AudioProfile::default(),
        );

        // First session: engine fails → empty result after timeout
        worker.begin_session().unwrap();
        worker.push_chunk(b"boom").unwrap();
        let transcript = worker.finalize(Duration::from_millis(100)).unwrap();
        assert_eq!(transcript, Transcript::empty());

        // Second session: fresh engine, normal result
        worker.reset();
        worker.begin_session().unwrap();
        worker.push_chunk(b"recovered").unwrap();
        let transcript = worker.finalize(TIMEOUT).unwrap();
        assert_eq!(transcript.text, "recovered");

        assert_eq!(
            counter.load(Ordering::SeqCst),
            2,
            "failed engine must be replaced with a fresh instance"
        );
    }

    #[test]
    fn test_detector_end_signal_propagates() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut worker = Worker::spawn(
            counting_factory(counter, || MockStreamTranscriber::new().with_echo()),
            Box::new(MockDetector::new().end_after(2)),
            AudioProfile::default(),
        );

        worker.begin_session().unwrap();
        assert!(!worker.push_chunk(b"a").unwrap());
        assert!(worker.push_chunk(b"b").unwrap());
    }

    #[test]
    fn test_worker_reuse_preserves_engine() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut worker = echo_worker(Arc::clone(&counter));

        for round in 0..3 {
            worker.begin_session().unwrap();
            let text = format!("round {round}");
            worker.push_chunk(text.as_bytes()).unwrap();
            let transcript = worker.finalize(TIMEOUT).unwrap();
            assert_eq!(transcript.text, text);
            worker.reset();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_finalize_without_session_is_empty() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut worker = echo_worker(counter);

        // No begin_session: no armed result channel
        let transcript = worker.finalize(Duration::from_millis(20)).unwrap();
        assert_eq!(transcript, Transcript::empty());
    }

    #[test]
    fn test_chunk_ordering_is_fifo() {
        let counter = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        let factory: TranscriberFactory = {
            let counter = Arc::clone(&counter);
            let log = Arc::clone(&log);
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::new(
                    MockStreamTranscriber::new()
                        .with_echo()
                        .with_chunk_log(Arc::clone(&log)),
                )
            })
        };
        let mut worker = Worker::spawn(
            factory,
            Box::new(MockDetector::new()),
            AudioProfile::default(),
        );

        worker.begin_session().unwrap();
        for i in 0u8..10 {
            worker.push_chunk(&[i]).unwrap();
        }
        worker.finalize(TIMEOUT).unwrap();

        let received = log.lock().unwrap();
        let expected: Vec<Vec<u8>> = (0u8..10).map(|i| vec![i]).collect();
        assert_eq!(*received, expected);
    }
}
