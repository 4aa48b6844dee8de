//! Read-only access to stored voice profiles.
//!
//! The store is owned by another component; the engine only needs a
//! reference recording and a language for a voice id.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analysis::Gender;
use crate::error::Result;

/// A stored voice profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub id: String,
    pub name: String,
    #[serde(default = "unknown_gender")]
    pub gender: Gender,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub description: String,
    /// Reference recording, relative to the store's base directory.
    pub reference_file: PathBuf,
    /// ISO-8601 creation timestamp.
    #[serde(default)]
    pub created_at: String,
}

fn unknown_gender() -> Gender {
    Gender::Unknown
}

fn default_language() -> String {
    "pt".to_string()
}

/// Lookup interface the studio uses to resolve voice ids.
pub trait VoiceStore: Send + Sync {
    fn get(&self, voice_id: &str) -> Result<Option<VoiceProfile>>;

    /// Path of the voice's reference recording, if the voice exists and the
    /// file is present.
    fn reference_audio_path(&self, voice_id: &str) -> Result<Option<PathBuf>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct VoiceIndex {
    #[serde(default)]
    voices: Vec<VoiceProfile>,
}

/// Voice store backed by `data/voices.json` under a base directory.
///
/// The index is re-read on every call so edits by the owning component are
/// picked up immediately.
#[derive(Debug, Clone)]
pub struct JsonVoiceStore {
    base_dir: PathBuf,
    index_path: PathBuf,
}

impl JsonVoiceStore {
    pub const INDEX_FILE: &'static str = "data/voices.json";

    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let index_path = base_dir.join(Self::INDEX_FILE);
        Self {
            base_dir,
            index_path,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn load(&self) -> Result<VoiceIndex> {
        if !self.index_path.exists() {
            return Ok(VoiceIndex::default());
        }
        let content = std::fs::read_to_string(&self.index_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// All voices matching the optional filters, newest first. `"all"` matches anything.
    pub fn list(&self, gender: Option<Gender>, language: Option<&str>) -> Result<Vec<VoiceProfile>> {
        let mut voices: Vec<VoiceProfile> = self
            .load()?
            .voices
            .into_iter()
            .filter(|v| gender.map_or(true, |g| v.gender == g))
            .filter(|v| language.map_or(true, |l| l == "all" || v.language == l))
            .collect();
        voices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(voices)
    }
}

impl VoiceStore for JsonVoiceStore {
    fn get(&self, voice_id: &str) -> Result<Option<VoiceProfile>> {
        Ok(self.load()?.voices.into_iter().find(|v| v.id == voice_id))
    }

    fn reference_audio_path(&self, voice_id: &str) -> Result<Option<PathBuf>> {
        let Some(voice) = self.get(voice_id)? else {
            return Ok(None);
        };
        let path = self.base_dir.join(&voice.reference_file);
        Ok(path.is_file().then_some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(voices: &str) -> (tempfile::TempDir, JsonVoiceStore) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data/references")).unwrap();
        std::fs::write(dir.path().join(JsonVoiceStore::INDEX_FILE), voices).unwrap();
        let store = JsonVoiceStore::new(dir.path());
        (dir, store)
    }

    const INDEX: &str = r#"{ "voices": [
        { "id": "a", "name": "Ana", "gender": "female", "language": "pt",
          "reference_file": "data/references/a.wav", "created_at": "2026-01-01T10:00:00+00:00" },
        { "id": "b", "name": "Bruno", "gender": "male", "language": "en",
          "reference_file": "data/references/b.wav", "created_at": "2026-02-01T10:00:00+00:00" }
    ] }"#;

    #[test]
    fn resolves_existing_reference_files_only() {
        let (dir, store) = store_with(INDEX);
        std::fs::write(dir.path().join("data/references/a.wav"), b"RIFF").unwrap();

        assert_eq!(
            store.reference_audio_path("a").unwrap(),
            Some(dir.path().join("data/references/a.wav"))
        );
        assert_eq!(store.reference_audio_path("b").unwrap(), None);
        assert_eq!(store.reference_audio_path("missing").unwrap(), None);
    }

    #[test]
    fn lists_newest_first_with_filters() {
        let (_dir, store) = store_with(INDEX);
        let all = store.list(None, None).unwrap();
        assert_eq!(all.iter().map(|v| v.id.as_str()).collect::<Vec<_>>(), vec!["b", "a"]);

        let female = store.list(Some(Gender::Female), Some("all")).unwrap();
        assert_eq!(female.len(), 1);
        assert_eq!(female[0].name, "Ana");
        assert!(store.list(None, Some("fr")).unwrap().is_empty());
    }

    #[test]
    fn missing_index_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonVoiceStore::new(dir.path());
        assert!(store.list(None, None).unwrap().is_empty());
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn optional_fields_take_defaults() {
        let (_dir, store) = store_with(
            r#"{ "voices": [ { "id": "c", "name": "Caio", "reference_file": "c.wav" } ] }"#,
        );
        let voice = store.get("c").unwrap().unwrap();
        assert_eq!(voice.gender, Gender::Unknown);
        assert_eq!(voice.language, "pt");
    }
}
