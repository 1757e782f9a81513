use color_eyre::eyre::Context;
use db::{cooking::Consolidator, cooking::KeyMode, setup_db_pool, DbConfig, PgPool};
use serde::Serialize;
use tracing::instrument;

const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub grocery_key_mode: KeyMode,
}

impl AppConfig {
    #[instrument(name = "AppConfig::from_env")]
    pub fn from_env() -> color_eyre::Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .wrap_err_with(|| format!("Invalid PORT not parsable: {raw}"))?,
            Err(_) => DEFAULT_PORT,
        };

        let grocery_key_mode = match std::env::var("GROCERY_KEY_MODE") {
            Ok(raw) => raw
                .parse()
                .map_err(color_eyre::eyre::Report::msg)
                .wrap_err("Invalid GROCERY_KEY_MODE")?,
            Err(_) => KeyMode::default(),
        };

        Ok(Self {
            port,
            grocery_key_mode,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            grocery_key_mode: KeyMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
}

impl VersionInfo {
    fn from_env() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AppState {
    pub app: AppConfig,
    pub versions: VersionInfo,
    pub consolidator: Consolidator,
    pub db: PgPool,
}

impl AppState {
    #[instrument(name = "AppState::from_env", err)]
    pub async fn from_env() -> color_eyre::Result<Self> {
        let app = AppConfig::from_env()?;
        let db = setup_db_pool(&DbConfig::from_env()?).await?;

        Ok(Self::new(app, db))
    }

    pub fn new(app: AppConfig, db: PgPool) -> Self {
        Self {
            consolidator: Consolidator::new(app.grocery_key_mode),
            versions: VersionInfo::from_env(),
            app,
            db,
        }
    }

    pub fn db(&self) -> &PgPool {
        &self.db
    }
}
