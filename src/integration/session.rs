//! Per-utterance handle over one job's progress and outcome

use crate::speech::worker::SpeechEvent;
use crate::{Result, VoiceError};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Handle to one submitted utterance
///
/// Yields progress events and exactly one terminal outcome. Dropping the
/// session does not cancel the job.
pub struct VoiceSession {
    job_id: Uuid,
    events: Receiver<SpeechEvent>,
    percent: u8,
    cache_hit: Option<bool>,
    outcome: Option<Result<PathBuf>>,
}

impl VoiceSession {
    pub(crate) fn new(job_id: Uuid, events: Receiver<SpeechEvent>) -> Self {
        Self {
            job_id,
            events,
            percent: 0,
            cache_hit: None,
            outcome: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.job_id
    }

    /// Last reported progress percentage
    pub fn progress(&self) -> u8 {
        self.percent
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Terminal outcome, once known
    pub fn outcome(&self) -> Option<&Result<PathBuf>> {
        self.outcome.as_ref()
    }

    /// Whether the raw audio came from the synthesis cache (after completion)
    pub fn cache_hit(&self) -> Option<bool> {
        self.cache_hit
    }

    /// Next pending event, without blocking
    pub fn try_next_event(&mut self) -> Option<SpeechEvent> {
        if self.outcome.is_some() {
            return None;
        }
        match self.events.try_recv() {
            Ok(event) => {
                self.observe(&event);
                Some(event)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.worker_gone();
                None
            }
        }
    }

    /// Block until the job finishes
    pub fn wait(&mut self) -> Result<PathBuf> {
        while self.outcome.is_none() {
            match self.events.recv() {
                Ok(event) => self.observe(&event),
                Err(_) => self.worker_gone(),
            }
        }
        self.finished()
    }

    /// Block until the job finishes or `timeout` elapses
    ///
    /// Returns `None` on timeout; the job keeps running and the session can be
    /// waited on again.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<PathBuf>> {
        let deadline = Instant::now() + timeout;
        while self.outcome.is_none() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(event) => self.observe(&event),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => self.worker_gone(),
            }
        }
        Some(self.finished())
    }

    fn observe(&mut self, event: &SpeechEvent) {
        if event.job_id() != Some(self.job_id) {
            return;
        }
        match event {
            SpeechEvent::Progress { percent, .. } => {
                self.percent = self.percent.max(*percent);
            }
            SpeechEvent::Completed {
                path, cache_hit, ..
            } => {
                self.percent = 100;
                self.cache_hit = Some(*cache_hit);
                self.outcome = Some(Ok(path.clone()));
            }
            SpeechEvent::Failed { error, .. } => {
                self.outcome = Some(Err(error.clone()));
            }
            SpeechEvent::Shutdown => {}
        }
    }

    fn worker_gone(&mut self) {
        if self.outcome.is_none() {
            self.outcome = Some(Err(VoiceError::ChannelError(
                "Speech worker stopped before the job finished".into(),
            )));
        }
    }

    fn finished(&self) -> Result<PathBuf> {
        match &self.outcome {
            Some(outcome) => outcome.clone(),
            None => Err(VoiceError::PipelineError("Job has not finished".into())),
        }
    }
}
