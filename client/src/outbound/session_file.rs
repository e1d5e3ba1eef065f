//! File-backed [`SessionStore`] that survives process restarts.
//!
//! Each role owns one JSON file named after its storage key
//! (`userToken.json`, `adminToken.json`) inside a capability-scoped
//! directory. Slots are independent files, so clearing one cannot disturb
//! the other.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use tracing::debug;

use super::atomic_io::write_atomic;
use crate::domain::ports::{SessionStore, SessionStoreError, ensure_slot_matches};
use crate::domain::{Role, Session};

/// Durable session store rooted at a directory.
#[derive(Debug)]
pub struct FileSessionStore {
    dir: Dir,
    root: Utf8PathBuf,
}

impl FileSessionStore {
    /// Open (creating if needed) the session directory at `root`.
    pub fn open(root: impl AsRef<Utf8Path>) -> Result<Self, SessionStoreError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|err| io_error(root, &err))?;
        let dir = Dir::open_ambient_dir(root, ambient_authority())
            .map_err(|err| io_error(root, &err))?;
        Ok(Self {
            dir,
            root: root.to_path_buf(),
        })
    }

    /// Directory holding the session files.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn slot(role: Role) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}.json", role.storage_key()))
    }
}

fn io_error(path: &Utf8Path, err: &io::Error) -> SessionStoreError {
    SessionStoreError::io(format!("{path}: {err}"))
}

impl SessionStore for FileSessionStore {
    fn get(&self, role: Role) -> Result<Option<Session>, SessionStoreError> {
        let slot = Self::slot(role);
        let raw = match self.dir.read_to_string(&slot) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&self.root.join(&slot), &err)),
        };
        let session: Session = serde_json::from_str(&raw)
            .map_err(|err| SessionStoreError::corrupt(slot.as_str(), err.to_string()))?;
        if session.role() != role {
            return Err(SessionStoreError::corrupt(
                slot.as_str(),
                format!("slot holds a {} session", session.role()),
            ));
        }
        Ok(Some(session))
    }

    fn set(&self, role: Role, session: &Session) -> Result<(), SessionStoreError> {
        ensure_slot_matches(role, session)?;
        let body = serde_json::to_string(session)
            .map_err(|err| SessionStoreError::io(format!("encoding session failed: {err}")))?;
        write_atomic(&self.dir, &Self::slot(role), &body)?;
        debug!(%role, "session persisted");
        Ok(())
    }

    fn clear(&self, role: Role) -> Result<(), SessionStoreError> {
        let slot = Self::slot(role);
        match self.dir.remove_file(&slot) {
            Ok(()) => {
                debug!(%role, "session cleared");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&self.root.join(&slot), &err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Email, SessionToken};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    fn session(role: Role, token: &str) -> Session {
        Session::new(
            role,
            SessionToken::new(token).expect("token"),
            Email::new("a@x.com").expect("email"),
        )
    }

    #[fixture]
    fn root() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    fn open(root: &TempDir) -> FileSessionStore {
        let path = Utf8Path::from_path(root.path()).expect("utf-8 temp path");
        FileSessionStore::open(path.join("sessions")).expect("open store")
    }

    #[rstest]
    fn sessions_survive_reopening(root: TempDir) {
        let user = session(Role::User, "user-token");
        open(&root).set(Role::User, &user).expect("set");

        let reopened = open(&root);

        assert_eq!(reopened.get(Role::User).expect("get"), Some(user));
        assert_eq!(reopened.get(Role::Admin).expect("get"), None);
    }

    #[rstest]
    fn clearing_user_keeps_admin(root: TempDir) {
        let store = open(&root);
        let admin = session(Role::Admin, "admin-token");
        store.set(Role::User, &session(Role::User, "user-token")).expect("set user");
        store.set(Role::Admin, &admin).expect("set admin");

        store.clear(Role::User).expect("clear");
        store.clear(Role::User).expect("clear again");

        assert_eq!(store.get(Role::User).expect("get"), None);
        assert_eq!(store.get(Role::Admin).expect("get"), Some(admin));
    }

    #[rstest]
    fn slots_use_role_storage_keys(root: TempDir) {
        let store = open(&root);
        store.set(Role::Admin, &session(Role::Admin, "tok")).expect("set");

        assert!(store.root().join("adminToken.json").exists());
    }

    #[rstest]
    fn garbage_in_a_slot_is_reported_as_corrupt(root: TempDir) {
        let store = open(&root);
        std::fs::write(store.root().join("userToken.json"), "not json").expect("write garbage");

        let err = store.get(Role::User).expect_err("corrupt slot");

        assert!(matches!(err, SessionStoreError::Corrupt { .. }));
    }

    #[rstest]
    fn blank_token_in_a_slot_is_reported_as_corrupt(root: TempDir) {
        let store = open(&root);
        let body = r#"{"role":"USER","token":"  ","subjectEmail":"a@x.com"}"#;
        std::fs::write(store.root().join("userToken.json"), body).expect("write slot");

        let err = store.get(Role::User).expect_err("blank token");

        assert!(matches!(err, SessionStoreError::Corrupt { .. }));
    }
}
