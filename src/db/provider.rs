//! Connection provisioning from possibly protected descriptors.

use crate::db::connection::DbConnection;
use crate::error::{DbError, DbResult};
use crate::models::ConnectionDescriptor;
use crate::protect;
use tracing::debug;

/// Builds connections from descriptor text that may be wholly or partly
/// protected.
#[derive(Clone, Default)]
pub struct ConnectionProvider {
    key: Option<String>,
}

impl ConnectionProvider {
    /// Create a provider. Without a key only plaintext descriptors resolve.
    pub fn new(key: Option<String>) -> Self {
        Self {
            key: key.filter(|k| !k.is_empty()),
        }
    }

    /// Recover the plaintext descriptor.
    ///
    /// A wholly protected descriptor is unprotected first, then any
    /// protected password fields inside it.
    pub fn resolve(&self, text: &str) -> DbResult<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DbError::invalid_input("Connection descriptor cannot be empty"));
        }

        let plain = if protect::is_encrypted(text) {
            debug!("Unprotecting connection descriptor");
            protect::decrypt(text, self.require_key()?)?
        } else {
            text.to_string()
        };

        if protect::has_protected_password(&plain) {
            debug!("Unprotecting descriptor password");
            return protect::decrypt_password(&plain, self.require_key()?);
        }
        Ok(plain)
    }

    /// Resolve and parse a descriptor.
    pub fn descriptor(&self, text: &str) -> DbResult<ConnectionDescriptor> {
        ConnectionDescriptor::parse(&self.resolve(text)?)
    }

    /// A closed connection for the descriptor; it opens on first use.
    pub fn connection(&self, text: &str) -> DbResult<DbConnection> {
        Ok(DbConnection::new(self.descriptor(text)?))
    }

    /// An opened connection for the descriptor.
    pub async fn open(&self, text: &str) -> DbResult<DbConnection> {
        let mut conn = self.connection(text)?;
        conn.open().await?;
        Ok(conn)
    }

    fn require_key(&self) -> DbResult<&str> {
        self.key.as_deref().ok_or_else(|| {
            DbError::invalid_input("Connection descriptor is protected but no key was supplied")
        })
    }
}

impl std::fmt::Debug for ConnectionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProvider")
            .field("has_key", &self.key.is_some())
            .finish()
    }
}
