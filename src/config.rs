use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{self, File};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GGError, Result};
use crate::gg::consts::*;
use crate::gg::hash::HashType;
use crate::models::{Status, Uin};

/// Account and connection settings for a [`GGClient`](crate::gg::GGClient).
///
/// Stored as JSON; the password is kept base64-encoded on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub uin: Uin,
    #[serde(with = "encoded_password")]
    pub password: String,
    pub hash_type: HashType,
    /// Explicit `host:port`, skipping server discovery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Port used with a discovered server address.
    pub port: u16,
    pub status: Status,
    pub description: String,
    pub max_frame_len: u32,
    pub ping_interval_secs: u64,
    pub features: u32,
    pub status_flags: u32,
    pub version_string: String,
    pub language: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            uin: 0,
            password: String::new(),
            hash_type: HashType::default(),
            server: None,
            port: GG_DEFAULT_PORT,
            status: Status::Available,
            description: String::new(),
            max_frame_len: GG_DEFAULT_MAX_FRAME_LEN,
            ping_interval_secs: GG_PING_INTERVAL_SECS,
            features: GG_LOGIN_FEATURES_DEFAULT,
            status_flags: GG_STATUS_FLAGS_DEFAULT,
            version_string: GG_DEFAULT_VERSION.to_string(),
            language: GG_LANGUAGE.to_string(),
        }
    }
}

mod encoded_password {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(password: &str, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(password))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let raw = BASE64.decode(encoded.as_bytes()).map_err(D::Error::custom)?;
        String::from_utf8(raw).map_err(D::Error::custom)
    }
}

impl ClientConfig {
    pub fn new(uin: Uin, password: &str) -> Self {
        ClientConfig {
            uin,
            password: password.to_string(),
            ..Default::default()
        }
    }

    /// `<config dir>/gadu/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| GGError::Config("could not determine config directory".to_string()))?;
        Ok(dir.join("gadu").join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config: ClientConfig = serde_json::from_reader(file)
            .map_err(|e| GGError::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration for {} from {}", config.uin, path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| GGError::Config(format!("{}: {}", path.display(), e)))?;
        info!("Configuration for {} saved to {}", self.uin, path.display());
        Ok(())
    }

    /// Override fields from `GG_UIN`, `GG_PASSWORD` and `GG_SERVER`.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(uin) = env::var("GG_UIN") {
            self.uin = uin
                .trim()
                .parse()
                .map_err(|_| GGError::Config(format!("GG_UIN is not a number: {}", uin)))?;
            debug!("Using uin {} from environment", self.uin);
        }
        if let Ok(password) = env::var("GG_PASSWORD") {
            self.password = password;
        }
        if let Ok(server) = env::var("GG_SERVER") {
            if !server.trim().is_empty() {
                self.server = Some(server.trim().to_string());
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.uin == 0 {
            return Err(GGError::Config("uin is not set".to_string()));
        }
        if self.password.is_empty() {
            return Err(GGError::Config("password is not set".to_string()));
        }
        if self.max_frame_len == 0 {
            return Err(GGError::Config("max_frame_len must be positive".to_string()));
        }
        if self.ping_interval_secs == 0 {
            return Err(GGError::Config("ping_interval_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Resolve the explicit server setting; a bare host gets [`Self::port`].
    pub fn server_addr(&self) -> Result<Option<SocketAddr>> {
        let Some(server) = self.server.as_deref() else {
            return Ok(None);
        };
        let with_port = if server.contains(':') {
            server.to_string()
        } else {
            format!("{}:{}", server, self.port)
        };
        let addr = with_port
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| GGError::Config(format!("server {} did not resolve", server)))?;
        Ok(Some(addr))
    }
}
