//! Per-connection options handed to a [`Dialer`](crate::Dialer).

use std::time::Duration;

/// Default dial timeout.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(1);

/// Connections a dialed client keeps warm.
pub const DEFAULT_MIN_CONNECTIONS: usize = 1;

/// Connections a dialed client may open at most.
pub const DEFAULT_MAX_CONNECTIONS: usize = 4;

/// Block compression negotiated with the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    #[default]
    Disabled,
    Lz4,
    Zstd,
}

/// One protocol setting sent with the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub important: bool,
}

impl Setting {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            important: false,
        }
    }
}

/// TLS parameters for the dialer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsOptions {
    /// Server name to verify; defaults to the dialed host.
    pub server_name: Option<String>,
    pub insecure_skip_verify: bool,
}

/// Effective options for one replica connection.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Replica address, host:port.
    pub address: String,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub quota_key: Option<String>,
    pub compression: Compression,
    pub settings: Vec<Setting>,
    pub dial_timeout: Duration,
    pub tls: Option<TlsOptions>,
    pub min_connections: usize,
    pub max_connections: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:9000".into(),
            database: "default".into(),
            user: None,
            password: None,
            quota_key: None,
            compression: Compression::default(),
            settings: Vec::new(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            tls: None,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl ClientOptions {
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_quota_key(mut self, quota_key: impl Into<String>) -> Self {
        self.quota_key = Some(quota_key.into());
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_setting(mut self, setting: Setting) -> Self {
        self.settings.push(setting);
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_connection_limits(mut self, min: usize, max: usize) -> Self {
        self.min_connections = min;
        self.max_connections = max;
        self
    }
}
