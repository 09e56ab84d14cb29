//! Process-wide session state: one config, one running simulation worker,
//! and one event stream per client id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use crate::error::{BonkError, Result};
use crate::sim::{SimEngine, SimParams, SimState};

use super::event::Event;
use super::queue::EventStream;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Per-client-id state: the last config PUT, a handle to stop the
/// currently-running sim worker (if any), and the shared event stream.
pub struct Session {
    config: Mutex<Option<SimParams>>,
    stop_flag: Mutex<Option<Arc<AtomicBool>>>,
    heartbeat_started: AtomicBool,
    pub event_stream: Arc<EventStream>,
}

impl Session {
    fn new() -> Self {
        Self {
            config: Mutex::new(None),
            stop_flag: Mutex::new(None),
            heartbeat_started: AtomicBool::new(false),
            event_stream: Arc::new(EventStream::new()),
        }
    }
}

/// Process-wide map from client id to [`Session`]. Callers (HTTP handlers)
/// are responsible for serializing their own access; the registry itself
/// only guards its internal map.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn get_or_create(&self, id: &str) -> Arc<Session> {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Session::new()))
            .clone()
    }

    /// Returns the id's event stream, creating the session if absent, and
    /// starts its heartbeat emitter the first time this is called. The
    /// heartbeat thread holds only a weak reference, so it exits on its own
    /// once every strong holder (HTTP chunker, sim worker) has dropped.
    pub fn stream_for(&self, id: &str) -> Arc<EventStream> {
        let session = self.get_or_create(id);

        if session
            .heartbeat_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let weak: Weak<EventStream> = Arc::downgrade(&session.event_stream);
            thread::spawn(move || loop {
                thread::sleep(HEARTBEAT_INTERVAL);
                let Some(stream) = weak.upgrade() else {
                    break;
                };
                stream.send(Event::heartbeat());
            });
        }

        session.event_stream.clone()
    }

    /// Stores (or overwrites) `id`'s configuration.
    pub fn set_config(&self, id: &str, params: SimParams) {
        let session = self.get_or_create(id);
        *session.config.lock().unwrap_or_else(|e| e.into_inner()) = Some(params);
    }

    /// Requires a prior config; stops any running worker for `id` and spawns
    /// a new one seeded with `state`, wiring its audio/viz callbacks to send
    /// framed events onto the session's stream.
    pub fn bonk(&self, id: &str, state: SimState) -> Result<()> {
        let session = self.get_or_create(id);

        let Some(params) = *session.config.lock().unwrap_or_else(|e| e.into_inner()) else {
            return Err(BonkError::BadInvocation(format!(
                "no config stored for session {id}"
            )));
        };

        if let Some(prev) = session
            .stop_flag
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            prev.store(true, Ordering::Relaxed);
        }

        let stop_flag = Arc::new(AtomicBool::new(false));
        *session.stop_flag.lock().unwrap_or_else(|e| e.into_inner()) = Some(stop_flag.clone());

        let stream = session.event_stream.clone();
        let dt = 1.0 / f64::from(params.physics_sample_rate);

        thread::spawn(move || {
            let Ok(mut engine) = SimEngine::new(params, state) else {
                return;
            };

            let audio_stream = stream.clone();
            let audio_count = Arc::new(AtomicU64::new(0));
            engine.set_audio_callback(Box::new(move |block| {
                let id = audio_count.fetch_add(block.len() as u64, Ordering::Relaxed);
                audio_stream.send(Event::audio_block(id, block.to_vec()));
            }));

            let viz_stream = stream.clone();
            let viz_count = Arc::new(AtomicU64::new(0));
            engine.set_viz_callback(Box::new(move |block| {
                let id = viz_count.fetch_add(block.len() as u64, Ordering::Relaxed);
                viz_stream.send(Event::viz_block(id, block.to_vec()));
            }));

            while !stop_flag.load(Ordering::Relaxed) && engine.step(dt) {}
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SimParams {
        SimParams {
            physics_sample_rate: 1_000_000,
            physics_block_size: 512,
            audio_sample_rate: 48_000,
            audio_block_size: 128,
            viz_sample_rate: 60,
            viz_block_size: 4,
            mass: 0.005,
            stiffness: 3000.0,
            damping: 0.12,
            area: 1.0,
        }
    }

    #[test]
    fn bonk_without_config_is_bad_invocation() {
        let registry = SessionRegistry::new();
        let err = registry
            .bonk("missing", SimState { x: 1.0, v: 0.0 })
            .unwrap_err();
        assert!(matches!(err, BonkError::BadInvocation(_)));
    }

    #[test]
    fn bonk_after_config_spawns_worker() {
        let registry = SessionRegistry::new();
        registry.set_config("a", params());
        assert!(registry.bonk("a", SimState { x: 1.0, v: 0.0 }).is_ok());
    }
}
