//! File-backed session service
//!
//! Layout: `<base>/<app>/<user>/<session_id>/metadata.json` plus an
//! append-only `history.jsonl` with one event per line.
//!
//! `metadata.json` is always written to a temporary file first and then
//! moved into place, so readers never see a partially written file. A
//! session exists once its `metadata.json` does.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::core::error::FrameworkError;
use crate::core::FrameworkResult;
use crate::llm::Event;

use super::metadata::{SessionKey, SessionMetadata};
use super::service::SessionService;
use super::session::Session;

/// Default directory for session storage
const SESSIONS_DIR: &str = "sessions";

/// Session service persisting to the local filesystem
#[derive(Debug, Clone)]
pub struct FileSessionService {
    base_dir: PathBuf,
}

impl FileSessionService {
    /// Create a new session storage with the default directory
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::from(SESSIONS_DIR),
        }
    }

    /// Create a new session storage with a custom directory
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: dir.into(),
        }
    }

    /// Directory holding all sessions of one user
    fn user_dir(&self, app_name: &str, user_id: &str) -> PathBuf {
        self.base_dir.join(app_name).join(user_id)
    }

    /// Get the directory path for a session
    pub fn session_dir(&self, key: &SessionKey) -> PathBuf {
        self.user_dir(&key.app_name, &key.user_id)
            .join(&key.session_id)
    }

    /// Get the metadata file path for a session
    pub fn metadata_path(&self, key: &SessionKey) -> PathBuf {
        self.session_dir(key).join("metadata.json")
    }

    /// Get the history file path for a session
    pub fn history_path(&self, key: &SessionKey) -> PathBuf {
        self.session_dir(key).join("history.jsonl")
    }

    fn load_metadata(&self, key: &SessionKey) -> FrameworkResult<Option<SessionMetadata>> {
        let file = match File::open(self.metadata_path(key)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let metadata = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(metadata))
    }

    /// Write `metadata` to a fresh temporary file in the session directory
    fn write_temp_metadata(
        &self,
        key: &SessionKey,
        metadata: &SessionMetadata,
    ) -> FrameworkResult<PathBuf> {
        let path = self
            .session_dir(key)
            .join(format!(".metadata.{}.tmp", Uuid::new_v4()));

        let written = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(FrameworkError::from)
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, metadata)?;
                writer.flush()?;
                writer.get_ref().sync_all()?;
                Ok(())
            });

        match written {
            Ok(()) => Ok(path),
            Err(e) => {
                fs::remove_file(&path).ok();
                Err(e)
            }
        }
    }

    /// Remove a temporary metadata file that has been linked or abandoned
    fn discard_temp(path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to remove temporary file {:?}: {}", path, e);
        }
    }

    fn load_events(&self, key: &SessionKey) -> FrameworkResult<Vec<Event>> {
        let path = self.history_path(key);

        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut events = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }

        Ok(events)
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Default for FileSessionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionService for FileSessionService {
    async fn get_session(&self, key: &SessionKey) -> FrameworkResult<Option<Session>> {
        let Some(metadata) = self.load_metadata(key)? else {
            return Ok(None);
        };
        let events = self.load_events(key)?;
        Ok(Some(Session { metadata, events }))
    }

    async fn create_session(
        &self,
        key: &SessionKey,
        state: HashMap<String, Value>,
    ) -> FrameworkResult<Session> {
        fs::create_dir_all(self.session_dir(key))?;

        let metadata = SessionMetadata::new(key, state);
        let temp = self.write_temp_metadata(key, &metadata)?;

        // hard_link never replaces an existing file, so it doubles as the
        // creation lock and metadata.json only ever appears complete
        let linked = fs::hard_link(&temp, self.metadata_path(key));
        Self::discard_temp(&temp);

        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(FrameworkError::SessionExists(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!("Created session {} at {:?}", key, self.session_dir(key));

        Ok(Session::new(metadata))
    }

    async fn append_event(&self, key: &SessionKey, event: &Event) -> FrameworkResult<()> {
        let mut metadata = self
            .load_metadata(key)?
            .ok_or_else(|| FrameworkError::SessionNotFound(key.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_path(key))?;
        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json)?;

        metadata.touch();
        let temp = self.write_temp_metadata(key, &metadata)?;
        if let Err(e) = fs::rename(&temp, self.metadata_path(key)) {
            Self::discard_temp(&temp);
            return Err(e.into());
        }
        Ok(())
    }

    async fn list_sessions(&self, app_name: &str, user_id: &str) -> FrameworkResult<Vec<String>> {
        let dir = self.user_dir(app_name, user_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();

        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.join("metadata.json").exists() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                sessions.push(name.to_string());
            }
        }

        sessions.sort();
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Content;
    use tempfile::TempDir;

    fn create_test_storage() -> (FileSessionService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSessionService::with_dir(temp_dir.path());
        (storage, temp_dir)
    }

    fn key(session_id: &str) -> SessionKey {
        SessionKey::new("agents", "tester", session_id)
    }

    #[tokio::test]
    async fn test_missing_session_is_none() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.get_session(&key("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_and_reload() {
        let (storage, _temp) = create_test_storage();

        let mut state = HashMap::new();
        state.insert("name".to_string(), Value::from("toaster"));
        let created = storage.create_session(&key("s1"), state).await.unwrap();

        let loaded = storage.get_session(&key("s1")).await.unwrap().unwrap();
        assert_eq!(loaded.id(), "s1");
        assert_eq!(loaded.metadata, created.metadata);
        assert_eq!(loaded.state("name"), Some(&Value::from("toaster")));
        assert!(storage.metadata_path(&key("s1")).exists());
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let (storage, _temp) = create_test_storage();
        storage.create_session(&key("s1"), HashMap::new()).await.unwrap();

        let err = storage
            .create_session(&key("s1"), HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::SessionExists(_)));
    }

    #[tokio::test]
    async fn test_append_and_load_events() {
        let (storage, _temp) = create_test_storage();
        storage.create_session(&key("s1"), HashMap::new()).await.unwrap();

        storage
            .append_event(&key("s1"), &Event::user(Content::user_text("Hello")))
            .await
            .unwrap();
        storage
            .append_event(&key("s1"), &Event::model_text("agents", "Hi there"))
            .await
            .unwrap();

        let session = storage.get_session(&key("s1")).await.unwrap().unwrap();
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[0].author, "user");
        assert_eq!(session.history()[1].text(), Some("Hi there"));
        assert!(session.metadata.updated_at >= session.metadata.created_at);
    }

    #[tokio::test]
    async fn test_append_to_missing_session_fails() {
        let (storage, _temp) = create_test_storage();
        let err = storage
            .append_event(&key("ghost"), &Event::model_text("agents", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::SessionNotFound(_)));
    }

    /// File names currently in a session directory
    fn dir_entries(storage: &FileSessionService, key: &SessionKey) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(storage.session_dir(key))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_interrupted_create_is_recoverable() {
        let (storage, _temp) = create_test_storage();
        let key = key("s1");

        // A crash mid-create leaves only a half-written temporary file
        fs::create_dir_all(storage.session_dir(&key)).unwrap();
        fs::write(storage.session_dir(&key).join(".metadata.crashed.tmp"), "{\"app_").unwrap();

        assert!(storage.get_session(&key).await.unwrap().is_none());
        assert!(storage.list_sessions("agents", "tester").await.unwrap().is_empty());

        storage.create_session(&key, HashMap::new()).await.unwrap();
        let session = storage.get_session(&key).await.unwrap().unwrap();
        assert_eq!(session.id(), "s1");
        assert_eq!(
            storage.list_sessions("agents", "tester").await.unwrap(),
            vec!["s1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_metadata_writes_leave_no_temporary_files() {
        let (storage, _temp) = create_test_storage();
        let key = key("s1");
        storage.create_session(&key, HashMap::new()).await.unwrap();
        assert_eq!(dir_entries(&storage, &key), vec!["metadata.json"]);

        storage
            .append_event(&key, &Event::model_text("agents", "hi"))
            .await
            .unwrap();
        assert_eq!(
            dir_entries(&storage, &key),
            vec!["history.jsonl", "metadata.json"]
        );

        let raw = fs::read_to_string(storage.metadata_path(&key)).unwrap();
        let metadata: SessionMetadata = serde_json::from_str(&raw).unwrap();
        assert_eq!(metadata.session_id, "s1");
    }

    #[tokio::test]
    async fn test_list_sessions() {
        let (storage, _temp) = create_test_storage();

        storage.create_session(&key("session2"), HashMap::new()).await.unwrap();
        storage.create_session(&key("session1"), HashMap::new()).await.unwrap();
        storage
            .create_session(&SessionKey::new("other_app", "tester", "x"), HashMap::new())
            .await
            .unwrap();

        let sessions = storage.list_sessions("agents", "tester").await.unwrap();
        assert_eq!(sessions, vec!["session1".to_string(), "session2".to_string()]);
        assert!(storage.list_sessions("agents", "nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sessions_survive_new_service_instance() {
        let (storage, temp) = create_test_storage();
        storage.create_session(&key("s1"), HashMap::new()).await.unwrap();
        storage
            .append_event(&key("s1"), &Event::model_text("agents", "remembered"))
            .await
            .unwrap();

        let reopened = FileSessionService::with_dir(temp.path());
        let session = reopened.get_session(&key("s1")).await.unwrap().unwrap();
        assert_eq!(session.history()[0].text(), Some("remembered"));
    }
}
