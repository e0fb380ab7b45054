use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::session_store::{
    ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SessionStore, StoreFingerprint, USER_KEY,
};

/// The identity persisted across runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredUser {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Default)]
pub struct SessionTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Single source of truth for the authenticated session. The in-memory user
/// mirrors the store: it is set on login, cleared on logout, and rebuilt from
/// the store at activation and whenever the store's change signal arrives.
#[derive(Debug)]
pub struct SessionController {
    store: SessionStore,
    user: Option<StoredUser>,
}

impl SessionController {
    /// Reads the store once and settles into the matching state. A stored
    /// session that fails to deserialize is purged and treated as absent,
    /// not surfaced as an error.
    #[tracing::instrument(skip(store))]
    pub fn activate(store: SessionStore) -> anyhow::Result<Self> {
        let mut controller = Self { store, user: None };
        controller.restore()?;
        Ok(controller)
    }

    fn restore(&mut self) -> anyhow::Result<()> {
        let Some(raw) = self.store.get(USER_KEY)? else {
            debug!("no stored session");
            self.user = None;
            return Ok(());
        };

        match serde_json::from_str::<StoredUser>(&raw) {
            Ok(user) => {
                debug!(username = %user.username, "restored stored session");
                self.user = Some(user);
            }
            Err(error) => {
                warn!(%error, "stored session is malformed; clearing session state");
                self.store.clear_session()?;
                self.user = None;
            }
        }
        Ok(())
    }

    /// Persists the session before returning, so a fresh activation recovers
    /// the same user.
    #[tracing::instrument(skip(self, user, tokens), fields(username = %user.username))]
    pub fn login(&mut self, user: StoredUser, tokens: SessionTokens) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(&user)?;
        self.store.set(USER_KEY, &serialized)?;
        if let Some(token) = &tokens.access_token {
            self.store.set(ACCESS_TOKEN_KEY, token)?;
        }
        if let Some(token) = &tokens.refresh_token {
            self.store.set(REFRESH_TOKEN_KEY, token)?;
        }

        info!(user_id = user.user_id, "logged in");
        self.user = Some(user);
        Ok(())
    }

    /// Clears the in-memory and stored session unconditionally. Idempotent.
    #[tracing::instrument(skip(self))]
    pub fn logout(&mut self) -> anyhow::Result<()> {
        self.store.clear_session()?;
        self.user = None;
        info!("logged out");
        Ok(())
    }

    pub fn current_user(&self) -> Option<&StoredUser> {
        self.user.as_ref()
    }

    /// Reads the access token back from the store rather than caching it, so
    /// every authenticated call carries whatever the store currently holds.
    pub fn access_token(&self) -> anyhow::Result<Option<String>> {
        self.store.get(ACCESS_TOKEN_KEY)
    }

    /// Re-reads the store after an external change signal. The controller
    /// never polls; whoever runs the event loop decides when to deliver this.
    #[tracing::instrument(skip(self))]
    pub fn sync_from_store(&mut self) -> anyhow::Result<()> {
        self.restore()
    }

    pub fn fingerprint(&self) -> anyhow::Result<StoreFingerprint> {
        self.store.fingerprint()
    }
}
