//! Signed-in session state
//!
//! The session (tokens, user id, level) is an explicit object handed to every
//! network call instead of ambient global storage. `SessionHandle` shares it
//! between concurrent actions and writes changes through to a `SessionStore`.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Stable id the assistant uses to group playground chats
    #[serde(default)]
    pub playground_session_id: Option<String>,
}

impl Session {
    pub fn is_signed_in(&self) -> bool {
        self.access_token.is_some()
    }

    /// Numeric user id, as the submit endpoint expects it.
    pub fn numeric_user_id(&self) -> Option<i64> {
        self.user_id.as_deref().and_then(|id| id.parse().ok())
    }
}

/// Token bundle returned by sign in, sign up and refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub token: String,
    pub refresh_token: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
}

/// Accept `"17"` or `17` for ids the backend is inconsistent about.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// JSON file holding the persisted session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session; a missing file is an empty session.
    pub fn load(&self) -> Result<Session> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Corrupt session file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Session::default()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read session from {}", self.path.display())),
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write session to {}", self.path.display()))?;

        // Owner read/write only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// Shared, cloneable access to the current session.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Session>>,
    store: Option<SessionStore>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
            store: None,
        }
    }

    /// Open the session persisted in `store`.
    pub fn open(store: SessionStore) -> Result<Self> {
        let session = store.load()?;
        debug!(
            path = %store.path().display(),
            signed_in = session.is_signed_in(),
            "Loaded session"
        );
        Ok(Self {
            inner: Arc::new(RwLock::new(session)),
            store: Some(store),
        })
    }

    pub fn snapshot(&self) -> Session {
        self.inner.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner.read().refresh_token.clone()
    }

    /// Store freshly issued tokens.
    ///
    /// `username` is set for a sign in, which replaces the whole identity. A
    /// refresh (`None`) keeps the user id and level the server omitted.
    pub fn apply_tokens(&self, tokens: AuthTokens, username: Option<&str>) {
        {
            let mut session = self.inner.write();
            session.access_token = Some(tokens.token);
            session.refresh_token = Some(tokens.refresh_token);
            match username {
                Some(name) => {
                    session.username = Some(name.to_string());
                    session.user_id = tokens.user_id;
                    session.level = tokens.level;
                }
                None => {
                    if tokens.user_id.is_some() {
                        session.user_id = tokens.user_id;
                    }
                    if tokens.level.is_some() {
                        session.level = tokens.level;
                    }
                }
            }
        }
        self.persist();
    }

    /// Drop credentials. The playground id survives sign out.
    pub fn clear(&self) {
        {
            let mut session = self.inner.write();
            let playground = session.playground_session_id.take();
            *session = Session {
                playground_session_id: playground,
                ..Session::default()
            };
        }
        self.persist();
    }

    /// Playground chat id, generated on first use.
    pub fn playground_session_id(&self) -> String {
        if let Some(id) = self.inner.read().playground_session_id.clone() {
            return id;
        }
        let id = {
            let mut session = self.inner.write();
            session
                .playground_session_id
                .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
                .clone()
        };
        self.persist();
        id
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            let snapshot = self.snapshot();
            if let Err(e) = store.save(&snapshot) {
                warn!("Failed to persist session: {:#}", e);
            }
        }
    }
}
