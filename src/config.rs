use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted upload request body, in bytes
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Blob root; uploads and their trash files live under it
    #[serde(default = "default_storage_root")]
    pub root: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    #[serde(default = "default_page_limit")]
    pub default_limit: i64,
    #[serde(default = "default_max_page_limit")]
    pub max_limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Header carrying the owner name, set by the authenticating front end
    #[serde(default = "default_owner_header")]
    pub owner_header: String,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_size() -> usize {
    1024 * 1024 * 1024
}

fn default_db_path() -> String {
    "data/filestore.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_storage_root() -> String {
    "data/blobs".to_string()
}

fn default_page_limit() -> i64 {
    10
}

fn default_max_page_limit() -> i64 {
    100
}

fn default_owner_header() -> String {
    "x-filestore-user".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_limit: default_page_limit(),
            max_limit: default_max_page_limit(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            owner_header: default_owner_header(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.normalize_listing();
        config.ensure_directories()?;
        tracing::info!(
            "Storage config: root={}, database={}",
            config.storage.root,
            config.database.path
        );
        Ok(config)
    }

    /// Load configuration from filestore.toml or config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = [
            "filestore.toml",
            "config.toml",
            "data/filestore.toml",
            "data/config.toml",
        ];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config = Self::from_toml(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides
    /// Format: FS_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        // Server overrides
        if let Ok(val) = env::var("FS_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = env::var("FS_CONF_SERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = env::var("FS_CONF_SERVER_MAX_UPLOAD_SIZE") {
            if let Ok(size) = val.parse() {
                self.server.max_upload_size = size;
            }
        }

        // Database overrides
        if let Ok(val) = env::var("FS_CONF_DATABASE_PATH") {
            self.database.path = val;
        }
        if let Ok(val) = env::var("FS_CONF_DATABASE_MAX_CONNECTIONS") {
            if let Ok(n) = val.parse() {
                self.database.max_connections = n;
            }
        }

        // Storage overrides
        if let Ok(val) = env::var("FS_CONF_STORAGE_ROOT") {
            self.storage.root = val;
        }

        // Listing overrides
        if let Ok(val) = env::var("FS_CONF_LISTING_DEFAULT_LIMIT") {
            if let Ok(n) = val.parse() {
                self.listing.default_limit = n;
            }
        }
        if let Ok(val) = env::var("FS_CONF_LISTING_MAX_LIMIT") {
            if let Ok(n) = val.parse() {
                self.listing.max_limit = n;
            }
        }

        // Auth overrides
        if let Ok(val) = env::var("FS_CONF_AUTH_OWNER_HEADER") {
            if !val.trim().is_empty() {
                self.auth.owner_header = val.trim().to_lowercase();
            }
        }
    }

    /// Keep page sizes usable even when misconfigured
    fn normalize_listing(&mut self) {
        if self.listing.max_limit <= 0 {
            self.listing.max_limit = default_max_page_limit();
        }
        if self.listing.default_limit <= 0 || self.listing.default_limit > self.listing.max_limit {
            self.listing.default_limit = default_page_limit().min(self.listing.max_limit);
        }
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        // Ensure database directory exists
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }

        // Ensure blob root exists
        fs::create_dir_all(&self.storage.root)?;

        Ok(())
    }
}
