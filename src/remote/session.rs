//! The signed-in session, persisted as `session.json` in the config directory.
//!
//! The file holds bearer tokens, so it is written user-only (0600) through a
//! temp file and an atomic rename; a crash mid-write never leaves a truncated
//! session behind.

use super::Session;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SESSION_FILE: &str = "session.json";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to access session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt session file: {0}")]
    Parse(#[from] serde_json::Error),
}

pub fn session_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SESSION_FILE)
}

/// Read the stored session. A missing file means "signed out".
pub fn load(path: &Path) -> Result<Option<Session>, SessionError> {
    let content = match std::fs::read(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let session = serde_json::from_slice(&content)?;
    Ok(Some(session))
}

/// Write the session, replacing any previous one.
pub fn save(path: &Path, session: &Session) -> Result<(), SessionError> {
    let content = serde_json::to_vec_pretty(session)?;

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", nanos));

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let result = (|| {
        let mut file = options.open(&temp_path)?;
        file.write_all(&content)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }

    tracing::debug!(path = %path.display(), "Session saved");
    Ok(())
}

/// Remove the stored session. Removing a missing file succeeds.
pub fn clear(path: &Path) -> Result<(), SessionError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Session cleared");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample() -> Session {
        Session {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            user_id: Some("u1".to_string()),
            email: Some("ana@example.com".to_string()),
        }
    }

    #[test]
    fn test_missing_file_is_signed_out() {
        let dir = std::env::temp_dir().join("apunto_session_test_missing");
        std::fs::create_dir_all(&dir).unwrap();
        let path = session_path(&dir);
        std::fs::remove_file(&path).ok();

        assert!(load(&path).unwrap().is_none());
        clear(&path).unwrap();

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_load_clear() {
        let dir = std::env::temp_dir().join("apunto_session_test_cycle");
        std::fs::create_dir_all(&dir).unwrap();
        let path = session_path(&dir);

        save(&path, &sample()).unwrap();
        assert_eq!(load(&path).unwrap(), Some(sample()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        clear(&path).unwrap();
        assert!(load(&path).unwrap().is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = std::env::temp_dir().join("apunto_session_test_corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        let path = session_path(&dir);
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load(&path), Err(SessionError::Parse(_))));

        std::fs::remove_dir_all(&dir).ok();
    }
}
