//! Session registry: active sessions, the free worker pool, and the frame
//! router.

use crate::audio::format::AudioProfile;
use crate::messages::AsrEvent;
use crate::session::worker::{DetectorFactory, TranscriberFactory, Worker};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// One active listening session.
struct Session {
    site_id: String,
    worker: Worker,
}

/// Tracks active sessions and recycles workers between them.
///
/// Free and assigned workers are disjoint: a worker is either in the free
/// pool or bound to exactly one session in the map.
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    free_workers: Vec<Worker>,
    transcriber_factory: TranscriberFactory,
    detector_factory: DetectorFactory,
    profile: AudioProfile,
    result_timeout: Duration,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new(
        transcriber_factory: TranscriberFactory,
        detector_factory: DetectorFactory,
        profile: AudioProfile,
        result_timeout: Duration,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            free_workers: Vec::new(),
            transcriber_factory,
            detector_factory,
            profile,
            result_timeout,
        }
    }

    /// Opens a session, restarting it if the id is already active.
    ///
    /// A restart finalizes the existing session first, so its result event
    /// (possibly empty) is emitted before the new session begins.
    pub fn start(&mut self, session_id: &str, site_id: &str) -> Vec<AsrEvent> {
        let mut events = Vec::new();

        if self.sessions.contains_key(session_id) {
            events.extend(self.stop(session_id, site_id));
        }

        match self.acquire_worker() {
            Ok(worker) => {
                self.sessions.insert(
                    session_id.to_string(),
                    Session {
                        site_id: site_id.to_string(),
                        worker,
                    },
                );
            }
            Err(e) => {
                events.push(AsrEvent::error(
                    e.to_string(),
                    "start_listening",
                    session_id,
                    site_id,
                ));
            }
        }

        events
    }

    /// Closes a session: finalize, emit its result, recycle the worker.
    ///
    /// A no-op for unknown ids. Workers whose background thread has died are
    /// retired instead of pooled, so a wedged worker can never serve a later
    /// session.
    pub fn stop(&mut self, session_id: &str, site_id: &str) -> Vec<AsrEvent> {
        let Some(mut session) = self.sessions.remove(session_id) else {
            return Vec::new();
        };

        let mut events = Vec::new();
        if let Some(transcript) = session.worker.finalize(self.result_timeout) {
            events.push(AsrEvent::text_captured(&transcript, session_id, site_id));
        }

        session.worker.reset();
        if session.worker.is_healthy() {
            self.free_workers.push(session.worker);
        }

        events
    }

    /// Routes one normalized chunk to every active session on the frame's
    /// site, feeding each session's detector along the way.
    ///
    /// Detector-signaled ends finalize the session immediately; the session
    /// entry stays registered until its explicit stop arrives (its result is
    /// already delivered, so the stop emits nothing more). Per-session
    /// failures become error events without disturbing other sessions.
    pub fn route_chunk(&mut self, chunk: &[u8], site_id: &str) -> Vec<AsrEvent> {
        let mut events = Vec::new();
        let mut ended = Vec::new();

        for (session_id, session) in &mut self.sessions {
            if session.site_id != site_id {
                continue;
            }
            match session.worker.push_chunk(chunk) {
                Ok(true) => ended.push(session_id.clone()),
                Ok(false) => {}
                Err(e) => events.push(AsrEvent::error(
                    e.to_string(),
                    "audio_frame",
                    session_id,
                    &session.site_id,
                )),
            }
        }

        for session_id in ended {
            if let Some(session) = self.sessions.get_mut(&session_id)
                && let Some(transcript) = session.worker.finalize(self.result_timeout)
            {
                events.push(AsrEvent::text_captured(&transcript, &session_id, site_id));
            }
        }

        events
    }

    /// Number of active sessions.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Number of idle workers in the pool.
    pub fn free_workers(&self) -> usize {
        self.free_workers.len()
    }

    /// True when no session is active.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn acquire_worker(&mut self) -> crate::error::Result<Worker> {
        // Pooled workers are healthy by invariant, but a thread can die while
        // idle; skip any that fail to arm.
        while let Some(mut worker) = self.free_workers.pop() {
            if worker.begin_session().is_ok() {
                return Ok(worker);
            }
        }

        let mut worker = Worker::spawn(
            Arc::clone(&self.transcriber_factory),
            (self.detector_factory)(),
            self.profile,
        );
        worker.begin_session()?;
        Ok(worker)
    }
}
