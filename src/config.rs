use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "inkwell", about = "A blog platform API server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, env = "INKWELL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long, env = "INKWELL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite database file
    #[arg(long, env = "DATABASE_PATH")]
    pub database: Option<PathBuf>,

    /// Deployment mode, controls cookie security attributes
    #[arg(long, env = "APP_ENV", value_enum)]
    pub mode: Option<Mode>,

    /// Secret used to sign session tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub token_secret: Option<String>,

    /// Session lifetime, e.g. "7d" or "12h"
    #[arg(long, env = "JWT_EXPIRE")]
    pub token_expiry: Option<String>,

    #[arg(long, env = "CLOUDINARY_CLOUD_NAME")]
    pub cloudinary_cloud_name: Option<String>,

    #[arg(long, env = "CLOUDINARY_API_KEY")]
    pub cloudinary_api_key: Option<String>,

    #[arg(long, env = "CLOUDINARY_API_SECRET", hide_env_values = true)]
    pub cloudinary_api_secret: Option<String>,

    /// Additional allowed CORS origin ("*" allows any)
    #[arg(long, env = "CLIENT_URL")]
    pub client_url: Option<String>,

    /// Public base URL used for locally stored uploads
    #[arg(long, env = "PUBLIC_URL")]
    pub public_url: Option<String>,
}

#[derive(Deserialize, ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    pub fn is_production(self) -> bool {
        self == Mode::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub media: MediaConfig,
    pub cors: CorsConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub mode: Mode,
    /// Base URL clients use to reach this server; defaults to http://localhost:<port>
    pub public_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub token_secret: Option<String>,
    pub token_expiry: String,
    pub bcrypt_cost: u32,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct MediaConfig {
    pub cloudinary: CloudinaryConfig,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct CloudinaryConfig {
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            mode: Mode::Development,
            public_url: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "token".to_string(),
            token_secret: None,
            token_expiry: "7d".to_string(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
        }
    }
}

impl CloudinaryConfig {
    /// Credentials usable for remote uploads. The "demo" cloud is treated as unset.
    pub fn credentials(&self) -> Option<(&str, &str, &str)> {
        let cloud = self.cloud_name.as_deref().filter(|s| !s.is_empty())?;
        let key = self.api_key.as_deref().filter(|s| !s.is_empty())?;
        let secret = self.api_secret.as_deref().filter(|s| !s.is_empty())?;
        if cloud == "demo" {
            return None;
        }
        Some((cloud, key, secret))
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI / environment overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(mode) = cli.mode {
            config.server.mode = mode;
        }
        if let Some(ref url) = cli.public_url {
            config.server.public_url = Some(url.clone());
        }
        if let Some(ref path) = cli.database {
            config.database.path = Some(path.clone());
        }
        if let Some(ref secret) = cli.token_secret {
            config.auth.token_secret = Some(secret.clone());
        }
        if let Some(ref expiry) = cli.token_expiry {
            config.auth.token_expiry = expiry.clone();
        }
        if let Some(ref v) = cli.cloudinary_cloud_name {
            config.media.cloudinary.cloud_name = Some(v.clone());
        }
        if let Some(ref v) = cli.cloudinary_api_key {
            config.media.cloudinary.api_key = Some(v.clone());
        }
        if let Some(ref v) = cli.cloudinary_api_secret {
            config.media.cloudinary.api_secret = Some(v.clone());
        }
        if let Some(ref origin) = cli.client_url {
            if !config.cors.allowed_origins.contains(origin) {
                config.cors.allowed_origins.push(origin.clone());
            }
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("inkwell.db"));
        }
        if config.storage.path.is_none() {
            config.storage.path = Some(data_dir.join("uploads"));
        }

        // Fail early on an unparseable expiry
        crate::auth::token::parse_expiry(&config.auth.token_expiry)?;

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(".inkwell"))
                .unwrap_or_else(|| PathBuf::from(".inkwell"))
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("inkwell.db"))
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("uploads"))
    }

    pub fn public_url(&self) -> String {
        match self.server.public_url {
            Some(ref url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.server.port),
        }
    }
}
