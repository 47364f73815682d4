//! Owned voice pipeline: starts the speech worker and hands out sessions

use super::config::VoiceConfig;
use super::session::VoiceSession;
use crate::llm::context::ConversationContext;
use crate::speech::backend::SynthesisBackend;
use crate::speech::worker::{SpeechEvent, SpeechJob, SpeechQueueWorker, WorkerState};
use crate::Result;
use crossbeam_channel::Receiver;
use std::path::Path;
use tracing::info;

/// Owns the speech worker; construct once at start-up and share by reference
///
/// Dropping the pipeline shuts the worker down after it drains queued jobs.
pub struct VoicePipeline {
    config: VoiceConfig,
    worker: SpeechQueueWorker,
}

impl VoicePipeline {
    /// Start a pipeline with the backend named in `config`
    pub fn new(config: VoiceConfig) -> Result<Self> {
        let backend = config.backend.clone();
        Self::with_backend(config, move || backend.build())
    }

    /// Start a pipeline with a custom backend
    ///
    /// `factory` runs on the worker thread, so the backend itself need not be
    /// `Send`.
    pub fn with_backend<F>(config: VoiceConfig, factory: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Box<dyn SynthesisBackend>> + Send + 'static,
    {
        config.validate()?;
        let worker = SpeechQueueWorker::spawn(config.worker_settings(), factory)?;

        info!(
            "Voice pipeline started; temp dir {:?}, queue size {}",
            config.temp_dir, config.queue_size
        );

        Ok(Self { config, worker })
    }

    /// Queue `text` for speech; never blocks on synthesis
    pub fn submit(&self, text: impl Into<String>) -> Result<VoiceSession> {
        let job = SpeechJob::new(text);
        let job_id = job.id;
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded();

        self.worker.enqueue(job, reply_tx)?;
        Ok(VoiceSession::new(job_id, reply_rx))
    }

    /// Receive every event of every job submitted from now on
    pub fn subscribe(&self) -> Receiver<SpeechEvent> {
        self.worker.subscribe()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    /// Directory processed files are written to
    pub fn output_dir(&self) -> &Path {
        &self.config.temp_dir
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    /// Fresh chat context sized from the configuration
    pub fn conversation(&self) -> ConversationContext {
        ConversationContext::new(self.config.context_lines)
    }

    /// Stop the worker after queued jobs finish
    pub fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down voice pipeline");
        self.worker.shutdown()
    }
}
