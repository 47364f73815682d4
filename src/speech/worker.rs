//! Background speech worker
//!
//! One thread drains a bounded FIFO of jobs: sanitize, synthesize through the
//! cache, run the effects chain, write `processed_<job id>.wav`. Every job ends
//! in exactly one terminal event and a failing job never stops the loop.

use super::backend::SynthesisBackend;
use super::cache::SynthesisCache;
use super::sanitizer::MarkdownSanitizer;
use crate::audio::{read_wav, write_wav};
use crate::effects::{EffectsConfig, EffectsEngine};
use crate::{Result, VoiceError};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Prefix of finished files handed to the caller
pub const PROCESSED_FILE_PREFIX: &str = "processed_";

/// Builds the synthesis backend on the worker thread
pub type BackendFactory = Box<dyn FnOnce() -> Result<Box<dyn SynthesisBackend>> + Send + 'static>;

/// A request to speak one reply
#[derive(Clone, Debug)]
pub struct SpeechJob {
    pub id: Uuid,
    pub raw_text: String,
    pub submitted_at: DateTime<Utc>,
}

impl SpeechJob {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            raw_text: raw_text.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// What the worker is doing right now
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Received,
    Sanitizing,
    Synthesizing,
    Effects,
    Done,
    Failed,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Received => "received",
            WorkerState::Sanitizing => "sanitizing",
            WorkerState::Synthesizing => "synthesizing",
            WorkerState::Effects => "effects",
            WorkerState::Done => "done",
            WorkerState::Failed => "failed",
        }
    }
}

/// Coarse progress milestones of a job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressStage {
    Accepted,
    Synthesizing,
    ApplyingEffects,
    Complete,
}

impl ProgressStage {
    pub fn percent(&self) -> u8 {
        match self {
            ProgressStage::Accepted => 10,
            ProgressStage::Synthesizing => 20,
            ProgressStage::ApplyingEffects => 60,
            ProgressStage::Complete => 100,
        }
    }
}

/// Event emitted by the speech worker
#[derive(Clone, Debug)]
pub enum SpeechEvent {
    Progress {
        job_id: Uuid,
        stage: ProgressStage,
        percent: u8,
    },

    /// The processed file is ready
    Completed {
        job_id: Uuid,
        path: PathBuf,
        /// Raw audio came from the synthesis cache
        cache_hit: bool,
        elapsed_ms: u64,
    },

    Failed {
        job_id: Uuid,
        error: VoiceError,
    },

    /// Worker has shut down
    Shutdown,
}

impl SpeechEvent {
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            SpeechEvent::Progress { job_id, .. }
            | SpeechEvent::Completed { job_id, .. }
            | SpeechEvent::Failed { job_id, .. } => Some(*job_id),
            SpeechEvent::Shutdown => None,
        }
    }

    /// Whether this event ends a job
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SpeechEvent::Completed { .. } | SpeechEvent::Failed { .. }
        )
    }
}

/// Command sent to the speech worker
pub enum SpeechCommand {
    Synthesize {
        job: SpeechJob,
        /// Per-job channel receiving that job's events
        reply: Sender<SpeechEvent>,
    },

    /// Finish queued jobs, then stop
    Shutdown,
}

/// Settings the worker thread runs with
#[derive(Clone, Debug)]
pub struct WorkerSettings {
    pub temp_dir: PathBuf,
    pub queue_size: usize,
    pub effects: EffectsConfig,
    pub purge_cache_on_shutdown: bool,
}

/// Handle to the running worker thread
pub struct SpeechQueueWorker {
    command_tx: Sender<SpeechCommand>,
    state: Arc<RwLock<WorkerState>>,
    listeners: Arc<Mutex<Vec<Sender<SpeechEvent>>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SpeechQueueWorker {
    /// Start the worker thread
    ///
    /// `factory` runs on the new thread; if it fails, every job fails with its
    /// error while the worker keeps accepting commands.
    pub fn spawn<F>(settings: WorkerSettings, factory: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Box<dyn SynthesisBackend>> + Send + 'static,
    {
        if settings.queue_size == 0 {
            return Err(VoiceError::ConfigError(
                "Queue size must be greater than 0".into(),
            ));
        }
        fs::create_dir_all(&settings.temp_dir).map_err(|e| {
            VoiceError::IOError(format!(
                "Failed to create temp dir {:?}: {}",
                settings.temp_dir, e
            ))
        })?;

        let (command_tx, command_rx) = bounded(settings.queue_size);
        let state = Arc::new(RwLock::new(WorkerState::Idle));
        let listeners: Arc<Mutex<Vec<Sender<SpeechEvent>>>> = Arc::new(Mutex::new(Vec::new()));

        let factory: BackendFactory = Box::new(factory);
        let worker_state = state.clone();
        let worker_listeners = listeners.clone();
        let handle = thread::Builder::new()
            .name("speech-worker".into())
            .spawn(move || {
                run_worker(settings, factory, command_rx, worker_state, worker_listeners)
            })
            .map_err(|e| VoiceError::PipelineError(format!("Failed to spawn worker: {}", e)))?;

        Ok(Self {
            command_tx,
            state,
            listeners,
            handle: Some(handle),
        })
    }

    /// Queue a job without blocking
    pub fn enqueue(&self, job: SpeechJob, reply: Sender<SpeechEvent>) -> Result<()> {
        let job_id = job.id;
        match self
            .command_tx
            .try_send(SpeechCommand::Synthesize { job, reply })
        {
            Ok(()) => {
                debug!("Queued speech job {}", job_id);
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(VoiceError::ChannelError(
                "Speech queue is full".into(),
            )),
            Err(TrySendError::Disconnected(_)) => Err(VoiceError::ChannelError(
                "Speech worker has stopped".into(),
            )),
        }
    }

    /// Receive every event of every job from now on
    pub fn subscribe(&self) -> Receiver<SpeechEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.listeners.lock().push(tx);
        rx
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Send the shutdown sentinel and wait for queued jobs to finish
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        // The worker may already be gone; joining still reports how it ended
        if self.command_tx.send(SpeechCommand::Shutdown).is_err() {
            debug!("Speech worker already stopped");
        }

        handle
            .join()
            .map_err(|_| VoiceError::PipelineError("Speech worker panicked".into()))
    }
}

impl Drop for SpeechQueueWorker {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Speech worker shutdown failed: {}", e);
        }
    }
}

/// Fans events out to the job's reply channel and all subscribers
struct EventSink {
    listeners: Arc<Mutex<Vec<Sender<SpeechEvent>>>>,
    state: Arc<RwLock<WorkerState>>,
}

impl EventSink {
    fn enter(&self, state: WorkerState) {
        *self.state.write() = state;
    }

    fn broadcast(&self, event: &SpeechEvent) {
        self.listeners
            .lock()
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    fn emit(&self, reply: &Sender<SpeechEvent>, event: SpeechEvent) {
        self.broadcast(&event);
        // The session may have been dropped; the job still runs to completion
        let _ = reply.send(event);
    }

    fn progress(&self, reply: &Sender<SpeechEvent>, job_id: Uuid, stage: ProgressStage) {
        self.emit(
            reply,
            SpeechEvent::Progress {
                job_id,
                stage,
                percent: stage.percent(),
            },
        );
    }
}

/// Per-thread processing state: everything a job needs
struct JobRunner {
    sanitizer: MarkdownSanitizer,
    cache: SynthesisCache,
    effects: EffectsEngine,
    output_dir: PathBuf,
}

impl JobRunner {
    fn new(settings: &WorkerSettings, factory: BackendFactory) -> Result<Self> {
        let backend = factory()?;
        info!("Speech backend ready: {}", backend.name());
        Ok(Self {
            sanitizer: MarkdownSanitizer::new(),
            cache: SynthesisCache::new(&settings.temp_dir, backend)?,
            effects: EffectsEngine::new(settings.effects.clone())?,
            output_dir: settings.temp_dir.clone(),
        })
    }

    fn run(
        &mut self,
        job: &SpeechJob,
        sink: &EventSink,
        reply: &Sender<SpeechEvent>,
    ) -> Result<(PathBuf, bool)> {
        sink.enter(WorkerState::Sanitizing);
        let text = self.sanitizer.sanitize(&job.raw_text);
        debug!(
            "Job {} sanitized {} -> {} chars",
            job.id,
            job.raw_text.len(),
            text.len()
        );

        sink.enter(WorkerState::Synthesizing);
        sink.progress(reply, job.id, ProgressStage::Synthesizing);
        let cached = self.cache.get_or_synthesize(&text)?;
        let raw = read_wav(&cached.path).map_err(|e| {
            VoiceError::SynthesisError(format!("Unreadable synthesis output: {}", e))
        })?;

        sink.enter(WorkerState::Effects);
        sink.progress(reply, job.id, ProgressStage::ApplyingEffects);
        let processed = self.effects.process(&raw)?;

        let output = processed_path(&self.output_dir, job.id);
        if let Err(e) = write_wav(&output, &processed) {
            let _ = fs::remove_file(&output);
            return Err(VoiceError::EffectsError(format!(
                "Failed to write processed audio: {}",
                e
            )));
        }

        Ok((output, cached.hit))
    }
}

/// Path of the processed file for a job
pub fn processed_path(dir: &Path, job_id: Uuid) -> PathBuf {
    dir.join(format!("{}{}.wav", PROCESSED_FILE_PREFIX, job_id))
}

fn run_worker(
    settings: WorkerSettings,
    factory: BackendFactory,
    command_rx: Receiver<SpeechCommand>,
    state: Arc<RwLock<WorkerState>>,
    listeners: Arc<Mutex<Vec<Sender<SpeechEvent>>>>,
) {
    info!("Speech worker starting");

    let sink = EventSink { listeners, state };

    let mut runner = match catch_unwind(AssertUnwindSafe(|| JobRunner::new(&settings, factory))) {
        Ok(Ok(runner)) => Ok(runner),
        Ok(Err(e)) => {
            error!("Failed to initialize speech backend: {}", e);
            Err(e)
        }
        Err(payload) => {
            let e = VoiceError::PipelineError(format!(
                "Backend construction panicked: {}",
                panic_message(&*payload)
            ));
            error!("{}", e);
            Err(e)
        }
    };

    info!("Speech worker ready");

    loop {
        match command_rx.recv() {
            Ok(SpeechCommand::Synthesize { job, reply }) => {
                let started = Instant::now();
                sink.enter(WorkerState::Received);
                sink.progress(&reply, job.id, ProgressStage::Accepted);

                let outcome = match runner.as_mut() {
                    Ok(runner) => catch_unwind(AssertUnwindSafe(|| runner.run(&job, &sink, &reply)))
                        .unwrap_or_else(|payload| {
                            Err(VoiceError::PipelineError(format!(
                                "Job panicked: {}",
                                panic_message(&*payload)
                            )))
                        }),
                    Err(e) => Err(e.clone()),
                };

                match outcome {
                    Ok((path, cache_hit)) => {
                        sink.enter(WorkerState::Done);
                        sink.progress(&reply, job.id, ProgressStage::Complete);
                        let elapsed_ms = started.elapsed().as_millis() as u64;
                        info!(
                            "Speech job {} done in {} ms (cache {}): {:?}",
                            job.id,
                            elapsed_ms,
                            if cache_hit { "hit" } else { "miss" },
                            path
                        );
                        sink.emit(
                            &reply,
                            SpeechEvent::Completed {
                                job_id: job.id,
                                path,
                                cache_hit,
                                elapsed_ms,
                            },
                        );
                    }
                    Err(e) => {
                        sink.enter(WorkerState::Failed);
                        warn!("Speech job {} failed: {}", job.id, e);
                        sink.emit(&reply, SpeechEvent::Failed { job_id: job.id, error: e });
                    }
                }

                sink.enter(WorkerState::Idle);
            }

            Ok(SpeechCommand::Shutdown) => {
                info!("Speech worker shutting down");
                break;
            }

            Err(_) => {
                debug!("Command channel closed");
                break;
            }
        }
    }

    if let Ok(runner) = runner.as_mut() {
        info!(
            "Synthesis cache: {} entries, {} hits, {} misses",
            runner.cache.len(),
            runner.cache.hits(),
            runner.cache.misses()
        );
        if settings.purge_cache_on_shutdown {
            runner.cache.purge();
        }
    }

    sink.enter(WorkerState::Idle);
    sink.broadcast(&SpeechEvent::Shutdown);
    info!("Speech worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
