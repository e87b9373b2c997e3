//! Command-line and environment configuration.

use std::path::PathBuf;

use clap::Args;

use obra_core::{Database, GateConfig, PhotoStore};

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:3000";

/// Where data lives and how the progress gate behaves.
#[derive(Debug, Clone, Args)]
pub struct StorageArgs {
    /// SQLite database file (defaults to the platform data directory)
    #[arg(long, env = "OBRA_DB")]
    pub db: Option<PathBuf>,

    /// Directory for uploaded photos (defaults to <data dir>/uploads/fotos)
    #[arg(long, env = "OBRA_UPLOADS")]
    pub uploads: Option<PathBuf>,

    /// Photos required to complete the arrival and completion steps
    #[arg(long, env = "OBRA_MIN_PHOTOS", default_value_t = 2)]
    pub min_photos: u32,

    /// Lifetime of login tokens, in hours
    #[arg(long, env = "OBRA_TOKEN_TTL_HOURS", default_value_t = 24)]
    pub token_ttl_hours: i64,
}

impl StorageArgs {
    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            min_photos: self.min_photos,
            token_ttl: chrono::Duration::hours(self.token_ttl_hours),
        }
    }

    /// Opens and migrates the database, then opens the photo directory.
    pub fn open(&self) -> anyhow::Result<(Database, PhotoStore)> {
        let db = match &self.db {
            Some(path) => Database::open(path)?,
            None => Database::open_default()?,
        }
        .with_config(self.gate_config());
        db.migrate()?;

        let uploads = match &self.uploads {
            Some(dir) => dir.clone(),
            None => data_dir()?.join("uploads").join("fotos"),
        };
        let photos = PhotoStore::open(&uploads)?;
        tracing::debug!("Photo uploads stored in {}", uploads.display());
        Ok((db, photos))
    }
}

fn data_dir() -> anyhow::Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "construccionpro", "obra")
        .ok_or_else(|| anyhow::anyhow!("could not determine a data directory"))?;
    Ok(dirs.data_dir().to_path_buf())
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "OBRA_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port for HTTP API
    #[arg(short, long, env = "OBRA_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Password for the `admin` account created on first start
    #[arg(long, env = "OBRA_ADMIN_PASSWORD", default_value = "admin123", hide_default_value = true)]
    pub admin_password: String,

    #[command(flatten)]
    pub storage: StorageArgs,
}

/// How CLI commands reach a running server.
#[derive(Debug, Clone, Args)]
pub struct RemoteArgs {
    /// Base URL of the Obra server
    #[arg(long, env = "OBRA_SERVER", default_value = DEFAULT_SERVER)]
    pub server: String,

    /// Bearer token from `obra login`
    #[arg(long, env = "OBRA_TOKEN")]
    pub token: Option<String>,

    /// Photos required before offering to complete a photo step
    #[arg(long, env = "OBRA_MIN_PHOTOS", default_value_t = 2)]
    pub min_photos: u32,
}

impl RemoteArgs {
    pub fn client(&self) -> crate::client::ApiClient {
        let client = crate::client::ApiClient::new(&self.server);
        match &self.token {
            Some(token) => client.with_token(token),
            None => client,
        }
    }
}
