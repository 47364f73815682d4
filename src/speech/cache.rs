//! Memoized synthesis keyed by the sanitized text
//!
//! Raw backend output is kept on disk as `temp_<key>.wav` for the life of the
//! process so repeated replies skip the TTS engine. The cache belongs to the
//! speech worker thread and is never shared.

use super::backend::SynthesisBackend;
use crate::{Result, VoiceError};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Prefix of raw synthesis files in the temp directory
pub const RAW_FILE_PREFIX: &str = "temp_";

/// Stable content key for a sanitized text: lowercase SHA-256 hex
pub fn cache_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Result of a cache lookup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedAudio {
    pub path: PathBuf,
    /// Whether the backend was skipped
    pub hit: bool,
}

pub struct SynthesisCache {
    dir: PathBuf,
    backend: Box<dyn SynthesisBackend>,
    entries: HashMap<String, PathBuf>,
    hits: u64,
    misses: u64,
}

impl SynthesisCache {
    /// Create a cache writing into `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>, backend: Box<dyn SynthesisBackend>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            VoiceError::IOError(format!("Failed to create cache dir {:?}: {}", dir, e))
        })?;

        Ok(Self {
            dir,
            backend,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        })
    }

    /// Path of the raw file for a given text, whether or not it exists yet
    pub fn path_for(&self, text: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}.wav", RAW_FILE_PREFIX, cache_key(text)))
    }

    /// Return the raw audio file for `text`, synthesizing it on a miss
    pub fn get_or_synthesize(&mut self, text: &str) -> Result<CachedAudio> {
        if text.trim().is_empty() {
            return Err(VoiceError::SynthesisError(
                "Nothing to synthesize: text is empty after sanitization".into(),
            ));
        }

        let key = cache_key(text);
        if let Some(path) = self.entries.get(&key) {
            if path.exists() {
                self.hits += 1;
                debug!("Synthesis cache hit: {}", &key[..12]);
                return Ok(CachedAudio {
                    path: path.clone(),
                    hit: true,
                });
            }
            warn!("Cached audio {:?} disappeared; synthesizing again", path);
        }

        let path = self.path_for(text);
        self.misses += 1;
        debug!(
            "Synthesis cache miss: {} via {}",
            &key[..12],
            self.backend.name()
        );

        if let Err(e) = self.backend.synthesize_to_file(text, &path) {
            // A partial file must not be picked up by a later lookup
            let _ = fs::remove_file(&path);
            self.entries.remove(&key);
            return Err(e);
        }

        self.entries.insert(key, path.clone());
        Ok(CachedAudio { path, hit: false })
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains_key(&cache_key(text))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Delete every cached raw file and forget all entries
    ///
    /// Returns the number of files removed.
    pub fn purge(&mut self) -> usize {
        let mut removed = 0;
        for (_, path) in self.entries.drain() {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove cached audio {:?}: {}", path, e),
            }
        }
        info!("Purged {} cached synthesis files", removed);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Writes the text itself as the "audio" and records each call
    struct RecordingBackend {
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl SynthesisBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        fn synthesize_to_file(&mut self, text: &str, output: &Path) -> Result<()> {
            self.calls.borrow_mut().push(text.to_string());
            fs::write(output, text)?;
            Ok(())
        }
    }

    struct BrokenBackend;

    impl SynthesisBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }

        fn synthesize_to_file(&mut self, _text: &str, output: &Path) -> Result<()> {
            fs::write(output, b"partial")?;
            Err(VoiceError::SynthesisError("engine crashed".into()))
        }
    }

    fn recording_cache(dir: &Path) -> (SynthesisCache, Rc<RefCell<Vec<String>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let backend = RecordingBackend {
            calls: calls.clone(),
        };
        (SynthesisCache::new(dir, Box::new(backend)).unwrap(), calls)
    }

    #[test]
    fn test_cache_key_is_sha256_hex() {
        assert_eq!(
            cache_key(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(cache_key("Hello world"), cache_key("Hello world"));
        assert_ne!(cache_key("Hello world"), cache_key("Hello world!"));
        assert_eq!(cache_key("abc").len(), 64);
    }

    #[test]
    fn test_hit_returns_same_path_without_backend_call() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cache, calls) = recording_cache(dir.path());

        let first = cache.get_or_synthesize("Hello world").unwrap();
        let second = cache.get_or_synthesize("Hello world").unwrap();

        assert!(!first.hit);
        assert!(second.hit);
        assert_eq!(first.path, second.path);
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_raw_file_naming() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cache, _) = recording_cache(dir.path());

        let cached = cache.get_or_synthesize("Hi").unwrap();
        let expected = dir.path().join(format!("temp_{}.wav", cache_key("Hi")));
        assert_eq!(cached.path, expected);
        assert!(expected.exists());
    }

    #[test]
    fn test_empty_text_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cache, calls) = recording_cache(dir.path());

        for text in ["", "   ", "\n\t"] {
            assert!(matches!(
                cache.get_or_synthesize(text),
                Err(VoiceError::SynthesisError(_))
            ));
        }
        assert!(calls.borrow().is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_file_is_resynthesized_to_same_path() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cache, calls) = recording_cache(dir.path());

        let first = cache.get_or_synthesize("again").unwrap();
        fs::remove_file(&first.path).unwrap();

        let second = cache.get_or_synthesize("again").unwrap();
        assert!(!second.hit);
        assert_eq!(first.path, second.path);
        assert!(second.path.exists());
        assert_eq!(calls.borrow().len(), 2);
    }

    #[test]
    fn test_backend_failure_leaves_no_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = SynthesisCache::new(dir.path(), Box::new(BrokenBackend)).unwrap();

        let result = cache.get_or_synthesize("doomed");
        assert!(matches!(result, Err(VoiceError::SynthesisError(_))));
        assert!(!cache.contains("doomed"));
        assert!(!cache.path_for("doomed").exists());
    }

    #[test]
    fn test_purge_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cache, _) = recording_cache(dir.path());

        let a = cache.get_or_synthesize("one").unwrap().path;
        let b = cache.get_or_synthesize("two").unwrap().path;
        assert!(cache.contains("one"));

        assert_eq!(cache.purge(), 2);
        assert!(!a.exists() && !b.exists());
        assert!(cache.is_empty());
        assert!(!cache.contains("one"));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let (cache, _) = recording_cache(&nested);
        assert!(nested.is_dir());
        assert_eq!(cache.dir(), nested.as_path());
        assert_eq!(cache.backend_name(), "recording");
    }
}
