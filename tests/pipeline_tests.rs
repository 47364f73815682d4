//! End-to-end tests of the voice pipeline with deterministic backends

mod common;

use avatar_voice::speech::{cache_key, SpeechEvent, SynthesisBackend, WorkerState};
use avatar_voice::{VoiceConfig, VoiceError, VoicePipeline};
use common::{call_log, tone_factory, FailingBackend, ToneBackend, SAMPLES_PER_CHAR};
use std::time::Duration;

const BUDGET: Duration = Duration::from_secs(60);

fn config(dir: &std::path::Path) -> VoiceConfig {
    VoiceConfig::default().with_temp_dir(dir)
}

#[test]
fn test_hello_world_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let calls = call_log();
    let mut pipeline =
        VoicePipeline::with_backend(config(dir.path()), tone_factory(calls.clone())).unwrap();

    let mut session = pipeline.submit("Hello world").unwrap();
    let path = session
        .wait_timeout(BUDGET)
        .expect("job should finish in time")
        .expect("job should succeed");

    // Sanitized text reached the backend unchanged, exactly once
    assert_eq!(*calls.lock(), vec!["Hello world".to_string()]);

    assert!(path.starts_with(dir.path()));
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert_eq!(name, format!("processed_{}.wav", session.id()));

    let reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);
    assert_eq!(spec.sample_rate, common::TONE_SAMPLE_RATE);
    assert_eq!(reader.len() as usize, "Hello world".len() * SAMPLES_PER_CHAR);

    assert_eq!(session.progress(), 100);
    assert_eq!(session.cache_hit(), Some(false));

    pipeline.shutdown().unwrap();
    // Processed files belong to the caller
    assert!(path.exists());
}

#[test]
fn test_markdown_is_sanitized_before_synthesis() {
    let dir = tempfile::tempdir().unwrap();
    let calls = call_log();
    let pipeline =
        VoicePipeline::with_backend(config(dir.path()), tone_factory(calls.clone())).unwrap();

    let mut session = pipeline
        .submit("**Hi** _there_, see [docs](http://x)")
        .unwrap();
    session.wait().unwrap();

    assert_eq!(*calls.lock(), vec!["Hi there, see docs".to_string()]);
}

#[test]
fn test_repeated_text_hits_cache() {
    let dir = tempfile::tempdir().unwrap();
    let calls = call_log();
    let pipeline =
        VoicePipeline::with_backend(config(dir.path()), tone_factory(calls.clone())).unwrap();

    let mut first = pipeline.submit("Same reply").unwrap();
    let mut second = pipeline.submit("**Same reply**").unwrap();

    let first_path = first.wait().unwrap();
    let second_path = second.wait().unwrap();

    assert_eq!(calls.lock().len(), 1);
    assert_eq!(first.cache_hit(), Some(false));
    assert_eq!(second.cache_hit(), Some(true));

    // Each job gets its own processed file; the raw file is shared
    assert_ne!(first_path, second_path);
    assert!(dir
        .path()
        .join(format!("temp_{}.wav", cache_key("Same reply")))
        .exists());
}

#[test]
fn test_completions_arrive_in_submission_order() {
    let dir = tempfile::tempdir().unwrap();
    let calls = call_log();
    let pipeline =
        VoicePipeline::with_backend(config(dir.path()), tone_factory(calls.clone())).unwrap();
    let events = pipeline.subscribe();

    let sessions: Vec<_> = ["First job", "Second", "Third one here"]
        .into_iter()
        .map(|text| pipeline.submit(text).unwrap())
        .collect();
    let expected: Vec<_> = sessions.iter().map(|s| s.id()).collect();

    let mut completed = Vec::new();
    while completed.len() < expected.len() {
        match events.recv_timeout(BUDGET).unwrap() {
            SpeechEvent::Completed { job_id, .. } => completed.push(job_id),
            SpeechEvent::Failed { error, .. } => panic!("job failed: {}", error),
            _ => {}
        }
    }

    assert_eq!(completed, expected);
    assert_eq!(
        *calls.lock(),
        vec!["First job", "Second", "Third one here"]
    );
}

#[test]
fn test_empty_after_sanitization_fails_without_killing_worker() {
    let dir = tempfile::tempdir().unwrap();
    let calls = call_log();
    let pipeline =
        VoicePipeline::with_backend(config(dir.path()), tone_factory(calls.clone())).unwrap();

    let mut empty = pipeline.submit("***\n## []").unwrap();
    let mut next = pipeline.submit("Still here").unwrap();

    assert!(matches!(empty.wait(), Err(VoiceError::SynthesisError(_))));
    assert!(empty.is_finished());
    assert!(next.wait().is_ok());
    assert_eq!(*calls.lock(), vec!["Still here".to_string()]);
}

#[test]
fn test_backend_failure_reported_per_job() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = VoicePipeline::with_backend(config(dir.path()), || {
        Ok(Box::new(FailingBackend) as Box<dyn SynthesisBackend>)
    })
    .unwrap();

    for text in ["one", "two"] {
        let mut session = pipeline.submit(text).unwrap();
        let error = session.wait().unwrap_err();
        assert_eq!(error, VoiceError::SynthesisError("engine unavailable".into()));
        assert!(error.is_recoverable());
        assert!(session.progress() < 100);
    }

    // No processed output is ever produced for a failed job
    let processed = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("processed_"))
        .count();
    assert_eq!(processed, 0);
}

#[test]
fn test_full_queue_rejects_without_blocking() {
    let dir = tempfile::tempdir().unwrap();
    let calls = call_log();
    let (release, gate) = crossbeam_channel::unbounded::<()>();
    let factory_calls = calls.clone();
    let pipeline = VoicePipeline::with_backend(config(dir.path()).with_queue_size(1), move || {
        Ok(Box::new(ToneBackend::gated(factory_calls, gate)) as Box<dyn SynthesisBackend>)
    })
    .unwrap();
    let events = pipeline.subscribe();

    let mut running = pipeline.submit("running").unwrap();

    // Wait until the worker is inside synthesis for the first job
    loop {
        if let SpeechEvent::Progress { percent: 20, .. } = events.recv_timeout(BUDGET).unwrap() {
            break;
        }
    }
    assert_eq!(pipeline.worker_state(), WorkerState::Synthesizing);

    let mut queued = pipeline.submit("queued").unwrap();
    assert!(matches!(
        pipeline.submit("overflow"),
        Err(VoiceError::ChannelError(_))
    ));

    drop(release);
    assert!(running.wait().is_ok());
    assert!(queued.wait().is_ok());
    assert_eq!(*calls.lock(), vec!["running", "queued"]);
}

#[test]
fn test_shutdown_drains_queue_then_rejects() {
    let dir = tempfile::tempdir().unwrap();
    let calls = call_log();
    let mut pipeline =
        VoicePipeline::with_backend(config(dir.path()), tone_factory(calls.clone())).unwrap();
    let events = pipeline.subscribe();

    let mut pending = pipeline.submit("before shutdown").unwrap();
    pipeline.shutdown().unwrap();

    // Jobs queued ahead of the sentinel still complete
    assert!(pending.wait().is_ok());
    assert!(events
        .try_iter()
        .any(|event| matches!(event, SpeechEvent::Shutdown)));

    assert_eq!(pipeline.worker_state(), WorkerState::Idle);
    assert!(matches!(
        pipeline.submit("after shutdown"),
        Err(VoiceError::ChannelError(_))
    ));

    // Raw synthesis files are purged by default
    assert!(!dir
        .path()
        .join(format!("temp_{}.wav", cache_key("before shutdown")))
        .exists());

    // A second shutdown is a no-op
    assert!(pipeline.shutdown().is_ok());
}

#[test]
fn test_keep_cache_retains_raw_files() {
    let dir = tempfile::tempdir().unwrap();
    let calls = call_log();
    let mut pipeline = VoicePipeline::with_backend(
        config(dir.path()).keep_cache(),
        tone_factory(calls),
    )
    .unwrap();

    pipeline.submit("keep").unwrap().wait().unwrap();
    pipeline.shutdown().unwrap();

    assert!(dir
        .path()
        .join(format!("temp_{}.wav", cache_key("keep")))
        .exists());
}

#[test]
fn test_backend_construction_failure_fails_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = VoicePipeline::with_backend(config(dir.path()), || {
        Err(VoiceError::ModelLoadError("Model not found: voice.onnx".into()))
    })
    .unwrap();

    let mut session = pipeline.submit("hello").unwrap();
    assert!(matches!(
        session.wait(),
        Err(VoiceError::ModelLoadError(_))
    ));
}

#[test]
fn test_invalid_config_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let result = VoicePipeline::with_backend(
        config(dir.path()).with_queue_size(0),
        tone_factory(call_log()),
    );
    assert!(matches!(result, Err(VoiceError::ConfigError(_))));
}

#[test]
fn test_conversation_uses_configured_line_count() {
    let dir = tempfile::tempdir().unwrap();
    let mut voice_config = config(dir.path());
    voice_config.context_lines = 4;
    let pipeline = VoicePipeline::with_backend(voice_config, tone_factory(call_log())).unwrap();

    let mut conversation = pipeline.conversation();
    for i in 0..3 {
        conversation.record_exchange(&format!("q{}", i), &format!("a{}", i));
    }
    assert_eq!(conversation.line_count(), 4);
    assert_eq!(pipeline.output_dir(), dir.path());
}
