use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::model::AccessToken;

/// Сессия оператора.
/// Хранит данные которые нужны между разными запусками приложения.
/// Читается и пишется только явно через [`load`] и [`save`].
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct Session {
    /// Имя пользователя, под которым выполнен вход.
    pub username: Option<String>,

    /// Токен доступа к АПИ.
    pub access_token: Option<AccessToken>,
}

/// В каком состоянии находится сессия.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    SignedOut,

    /// Вход был, но токен протух. Имя пользователя сохраняется, чтобы
    /// подставить его при повторном входе.
    Expired,

    Active,
}

impl Session {
    pub fn status(&self) -> Status {
        match &self.access_token {
            None => Status::SignedOut,
            Some(t) if t.is_expired() => Status::Expired,
            Some(_) => Status::Active,
        }
    }

    /// Токен, если он есть и ещё не протух.
    pub fn valid_token(&self) -> Option<AccessToken> {
        match self.status() {
            Status::Active => self.access_token.clone(),
            _ => None,
        }
    }

    pub fn sign_in(&mut self, username: String, token: AccessToken) {
        self.username = Some(username);
        self.access_token = Some(token);
    }

    /// Забывает токен. Возвращает `false`, если входа и не было.
    pub fn sign_out(&mut self) -> bool {
        let was_signed_in = self.access_token.is_some();

        self.username = None;
        self.access_token = None;

        was_signed_in
    }
}

/// Загружает сессию из указанного файла.
/// Если файла нет, то возвращается пустая сессия.
pub fn load(path: &Path) -> LoadResult {
    if !path.exists() {
        debug!("Файла сессии {:?} нет, начинаем с пустой", path);
        return Ok(Session::default());
    }

    let content = fs::read_to_string(path).map_err(|source| LoadError::ReadFile {
        path: path.to_owned(),
        source,
    })?;

    let session: Session =
        serde_json::from_str(&content).map_err(|source| LoadError::Deserialize {
            path: path.to_owned(),
            source,
        })?;

    if session.status() == Status::Expired {
        warn!(
            "Токен пользователя {} истёк, нужно войти заново",
            session.username.as_deref().unwrap_or("?")
        );
    }

    Ok(session)
}

pub type LoadResult = std::result::Result<Session, LoadError>;

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("read session file {path:?}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("session file {path:?} is corrupted")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Сохраняет сессию в указанный файл.
/// Файл пишется во временный соседний файл и затем переименовывается.
pub fn save(session: &Session, path: &Path) -> SaveResult {
    let content = serde_json::to_string(session)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;

    Ok(())
}

pub type SaveResult = std::result::Result<(), SaveError>;

#[derive(thiserror::Error, Debug)]
pub enum SaveError {
    #[error("write session file")]
    WriteFile(#[from] io::Error),

    #[error("serialize")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn missing_file_gives_empty_session() {
        let dir = tempfile::tempdir().unwrap();

        let session = load(&dir.path().join("nope.json")).unwrap();

        assert_eq!(session.status(), Status::SignedOut);
        assert!(session.username.is_none());
        assert!(session.valid_token().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut session = Session::default();
        session.sign_in(
            "soporte".to_owned(),
            AccessToken::new("abc".to_owned(), None).unwrap(),
        );
        save(&session, &path).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.status(), Status::Active);
        assert_eq!(loaded.username.as_deref(), Some("soporte"));
        assert_eq!(loaded.valid_token().map(|t| t.to_string()), Some("abc".to_owned()));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn expired_token_keeps_username() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let expired = (Utc::now() - Duration::hours(1)).to_rfc3339();
        let content = serde_json::json!({
            "username": "soporte",
            "access_token": {"value": "abc", "expire_at": expired},
        });
        fs::write(&path, content.to_string()).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.status(), Status::Expired);
        assert!(loaded.valid_token().is_none());
        assert_eq!(loaded.username.as_deref(), Some("soporte"));
    }

    #[test]
    fn sign_out_reports_whether_there_was_a_session() {
        let mut session = Session::default();
        assert!(!session.sign_out());

        session.sign_in(
            "soporte".to_owned(),
            AccessToken::new("abc".to_owned(), None).unwrap(),
        );
        assert!(session.sign_out());
        assert_eq!(session.status(), Status::SignedOut);
    }

    #[test]
    fn corrupted_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            load(&path),
            Err(LoadError::Deserialize { path: p, .. }) if p == path
        ));
    }
}
