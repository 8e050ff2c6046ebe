//! Persisted authentication session.
//!
//! A [`Session`] is passed explicitly to whatever needs the bearer token.
//! It is read from a JSON file at start-up, filled in by login or
//! register, and cleared by logout. A missing file means "logged out".

use std::path::{Path, PathBuf};

use taskboard_proto::{AuthGrant, User};

/// Errors reading or writing the session file.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Filesystem failure on the session file or its directory.
    #[error("session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The session file exists but is not a valid session.
    #[error("corrupt session file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serializing the session failed.
    #[error("failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The logged-in user and their token, bound to a file on disk.
#[derive(Debug)]
pub struct Session {
    path: PathBuf,
    grant: Option<AuthGrant>,
}

impl Session {
    /// Reads the session stored at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed. A missing
    /// file yields a logged-out session.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let grant = match std::fs::read(&path) {
            Ok(bytes) => Some(serde_json::from_slice(&bytes).map_err(|source| {
                SessionError::Corrupt {
                    path: path.clone(),
                    source,
                }
            })?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => return Err(SessionError::Io { path, source }),
        };
        tracing::debug!(path = %path.display(), authenticated = grant.is_some(), "session loaded");
        Ok(Self { path, grant })
    }

    /// Stores `grant` as the current session and writes it to disk.
    ///
    /// # Errors
    ///
    /// Fails if the file or its parent directory cannot be written. The
    /// in-memory session is updated either way.
    pub fn establish(&mut self, grant: AuthGrant) -> Result<(), SessionError> {
        let json = serde_json::to_vec_pretty(&grant)?;
        self.grant = Some(grant);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty())
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
            // Owner-only directory; an existing one is left as the user set it.
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))
                    .map_err(|source| self.io_error(source))?;
            }
        }
        self.write_private(&json).map_err(|source| self.io_error(source))?;
        tracing::info!(path = %self.path.display(), "session saved");
        Ok(())
    }

    /// Forgets the session in memory and on disk.
    ///
    /// # Errors
    ///
    /// Fails if an existing session file cannot be removed.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.grant = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(self.io_error(source)),
        }
        tracing::info!(path = %self.path.display(), "session cleared");
        Ok(())
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.grant.as_ref().map(|g| g.token.as_str())
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.grant.as_ref().map(|g| &g.user)
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.grant.is_some()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the session file readable by its owner only. The mode is
    /// also reset on a file that already existed.
    fn write_private(&self, json: &[u8]) -> std::io::Result<()> {
        use std::io::Write;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(json)
    }

    fn io_error(&self, source: std::io::Error) -> SessionError {
        SessionError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
