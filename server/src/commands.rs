use clap::Subcommand;
use color_eyre::Result;
use db::DbConfig;

#[derive(Subcommand, Default)]
pub(crate) enum Command {
    /// Run the HTTP API. Pending migrations are applied on startup.
    #[default]
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
}

impl Command {
    pub(crate) async fn run(&self) -> Result<()> {
        match &self {
            Command::Serve => crate::http_server::cmd::serve().await,
            Command::Migrate => migrate().await,
        }
    }
}

async fn migrate() -> Result<()> {
    let config = DbConfig::from_env()?;
    let pool = db::setup_db_pool(&config).await?;
    pool.close().await;

    tracing::info!("Migrations applied");

    Ok(())
}
