//! Connection configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use cassorm_core::MigrateMode;

use crate::error::Error;

/// Contact point used when none is configured.
pub const DEFAULT_CONTACT_POINT: &str = "127.0.0.1";

/// Schema synchronisation mode used when none is configured.
pub const DEFAULT_MIGRATE: MigrateMode = MigrateMode::Safe;

/// Connection configuration as the ORM supplies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Connection identity the ORM addresses this connection by.
    #[serde(default)]
    pub identity: Option<String>,

    /// Node addresses to bootstrap from.
    #[serde(default = "default_contact_points")]
    pub contact_points: Vec<String>,

    /// Keyspace, also accepted as `database`.
    #[serde(default, alias = "database")]
    pub keyspace: Option<String>,

    /// User name for password authentication.
    #[serde(default)]
    pub user: Option<String>,

    /// Password for password authentication.
    #[serde(default)]
    pub password: Option<String>,

    /// Name of a pre-built credential provider.
    #[serde(default)]
    pub auth_provider: Option<String>,

    /// Schema synchronisation mode.
    #[serde(default)]
    pub migrate: MigrateMode,
}

fn default_contact_points() -> Vec<String> {
    vec![DEFAULT_CONTACT_POINT.to_string()]
}

/// How the session authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// No authentication.
    None,
    /// User name and optional password.
    Password {
        /// User name.
        user: String,
        /// Password; absent means an empty password.
        password: Option<String>,
    },
    /// Pre-built credential provider.
    Provider(String),
}

impl ConnectionConfig {
    /// Create a configuration for a connection identity.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            contact_points: default_contact_points(),
            keyspace: None,
            user: None,
            password: None,
            auth_provider: None,
            migrate: DEFAULT_MIGRATE,
        }
    }

    /// Parse a connection object.
    pub fn from_json(value: &Value) -> Result<Self, Error> {
        serde_json::from_value(value.clone()).map_err(|e| Error::Config(e.to_string()))
    }

    /// Set the contact points.
    pub fn with_contact_points<I, S>(mut self, points: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contact_points = points.into_iter().map(Into::into).collect();
        self
    }

    /// Set the keyspace.
    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    /// Set user and password.
    pub fn with_user(mut self, user: impl Into<String>, password: Option<String>) -> Self {
        self.user = Some(user.into());
        self.password = password;
        self
    }

    /// Set a credential provider.
    pub fn with_auth_provider(mut self, provider: impl Into<String>) -> Self {
        self.auth_provider = Some(provider.into());
        self
    }

    /// Set the schema synchronisation mode.
    pub fn with_migrate(mut self, mode: MigrateMode) -> Self {
        self.migrate = mode;
        self
    }

    /// Resolve the authentication settings.
    pub fn credentials(&self) -> Result<Credentials, Error> {
        match (&self.user, &self.auth_provider) {
            (Some(_), Some(_)) => Err(Error::Config(
                "user/password and authProvider are mutually exclusive".to_string(),
            )),
            (Some(user), None) => Ok(Credentials::Password {
                user: user.clone(),
                password: self.password.clone(),
            }),
            (None, Some(provider)) => Ok(Credentials::Provider(provider.clone())),
            (None, None) => Ok(Credentials::None),
        }
    }

    /// Check the configuration before connecting.
    pub fn validate(&self) -> Result<&str, Error> {
        let identity = self
            .identity
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(Error::IdentityMissing)?;
        if self.contact_points.is_empty() {
            return Err(Error::Config(format!(
                "connection '{}' has no contact points",
                identity
            )));
        }
        self.credentials()?;
        Ok(identity)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            identity: None,
            contact_points: default_contact_points(),
            keyspace: None,
            user: None,
            password: None,
            auth_provider: None,
            migrate: DEFAULT_MIGRATE,
        }
    }
}
