use keyring::Entry;
use tracing::{debug, warn};

use super::store::parse_record;
use super::{Session, SessionStore, StoreError};

const SERVICE_NAME: &str = "blogdesk";

/// Keychain account name used when no profile is given
const DEFAULT_ACCOUNT: &str = "session";

/// Session store backed by the OS keychain.
///
/// The whole session is serialized into one keychain secret, so a save is a
/// single write and can never leave half a session behind.
pub struct KeyringSessionStore {
    account: String,
}

impl KeyringSessionStore {
    pub fn new() -> Self {
        Self::for_account(DEFAULT_ACCOUNT)
    }

    /// Use a separate keychain slot, e.g. one per API host.
    pub fn for_account(account: &str) -> Self {
        Self {
            account: account.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry, StoreError> {
        Ok(Entry::new(SERVICE_NAME, &self.account)?)
    }
}

impl Default for KeyringSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for KeyringSessionStore {
    fn load(&self) -> Session {
        let entry = match self.entry() {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Failed to open keychain entry");
                return Session::empty();
            }
        };
        match entry.get_password() {
            Ok(contents) => parse_record(&contents, "keychain"),
            Err(keyring::Error::NoEntry) => Session::empty(),
            Err(e) => {
                warn!(error = %e, "Failed to read session from keychain");
                Session::empty()
            }
        }
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        if !session.is_authenticated() {
            return self.clear();
        }
        let contents = serde_json::to_string(session)?;
        self.entry()?.set_password(&contents)?;
        debug!(account = %self.account, "Session saved to keychain");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
