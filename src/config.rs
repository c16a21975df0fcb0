use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "aurora", about = "Mood-tagged photo posts")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub oauth2: OAuth2Config,
    pub posts: PostsConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
    /// Prefix prepended to stored object keys when building public URLs
    pub public_url: String,
    pub namespace: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub token_secret: String,
    pub token_ttl_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct OAuth2Config {
    /// Post-login destinations clients may ask for; matched on host and port only
    pub authorized_redirect_uris: Vec<String>,
    pub default_target_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    /// Where the provider sends the browser back to; must route to `/oauth2/callback`
    pub callback_url: String,
    pub scope: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PostsConfig {
    pub page_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            public_url: "/images".to_string(),
            namespace: "aurora".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "access_token".to_string(),
            token_secret: String::new(),
            token_ttl_secs: 3600,
        }
    }
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            authorized_redirect_uris: vec!["http://localhost:3000/oauth2/redirect".to_string()],
            default_target_url: "/".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            authorization_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_endpoint: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            callback_url: "http://localhost:8080/oauth2/callback".to_string(),
            scope: "openid email profile".to_string(),
        }
    }
}

impl Default for PostsConfig {
    fn default() -> Self {
        Self { page_size: 5 }
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

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("aurora.db"));
        }
        if config.storage.path.is_none() {
            config.storage.path = Some(data_dir.join("images"));
        }

        if config.auth.token_secret.is_empty() {
            tracing::warn!("auth.token_secret not set, generating an ephemeral signing key");
            config.auth.token_secret = crate::auth::token::generate_secret();
        }

        if config.oauth2.client_id.is_empty() {
            tracing::warn!("oauth2.client_id not set, logins will be refused by the provider");
        }

        if config.posts.page_size == 0 {
            anyhow::bail!("posts.page_size must be at least 1");
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".aurora")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("aurora.db"))
    }

    pub fn images_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("images"))
    }
}
