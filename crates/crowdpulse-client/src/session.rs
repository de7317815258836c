//! Persisted session: the bearer token and the site it is scoped to

use crowdpulse_core::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Contents of the session file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token from the last successful login
    #[serde(default)]
    pub token: Option<String>,
    /// Site resolved after login
    #[serde(default)]
    pub site_id: Option<String>,
}

/// File-backed session holder
///
/// Every mutation is written through to disk with a write-then-rename so a
/// crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    session: RwLock<Session>,
}

impl SessionStore {
    /// Open the store at `path`
    ///
    /// A missing file is an empty session. A file that cannot be parsed is
    /// logged and treated as empty; it is overwritten on the next mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let session = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable session file");
                Session::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Session::default(),
            Err(e) => {
                return Err(Error::Session(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        Ok(Self {
            path,
            session: RwLock::new(session),
        })
    }

    /// Location of the session file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current session
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.session.read().clone()
    }

    /// Stored bearer token
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.session.read().token.clone()
    }

    /// Stored site id
    #[must_use]
    pub fn site_id(&self) -> Option<String> {
        self.session.read().site_id.clone()
    }

    /// Whether a non-empty token is stored
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session
            .read()
            .token
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }

    /// Store a new token
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be written.
    pub fn set_token(&self, token: impl Into<String>) -> Result<()> {
        let token = token.into();
        self.update(|s| s.token = Some(token))
    }

    /// Store the resolved site id
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be written.
    pub fn set_site_id(&self, site_id: impl Into<String>) -> Result<()> {
        let site_id = site_id.into();
        self.update(|s| s.site_id = Some(site_id))
    }

    /// Forget the stored site id, keeping the token
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be written.
    pub fn clear_site_id(&self) -> Result<()> {
        self.update(|s| s.site_id = None)
    }

    /// Forget token and site id
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be written.
    pub fn clear(&self) -> Result<()> {
        self.update(|s| *s = Session::default())
    }

    fn update(&self, mutate: impl FnOnce(&mut Session)) -> Result<()> {
        let mut session = self.session.write();
        mutate(&mut session);
        persist(&self.path, &session)
    }
}

fn persist(path: &Path, session: &Session) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, serde_json::to_vec_pretty(session)?)?;
    restrict_permissions(&tmp)?;
    std::fs::rename(&tmp, path)?;

    debug!(path = %path.display(), "Session saved");
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
