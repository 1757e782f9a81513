use color_eyre::Result;
use tracing::info;

use crate::{http_server::routes, AppState};

pub(crate) async fn serve() -> Result<()> {
    let app_state = AppState::from_env().await?;
    let port = app_state.app.port;

    info!(
        key_mode = %app_state.consolidator.key_mode(),
        "Grocery consolidation configured"
    );

    super::run_server(routes::make_router().with_state(app_state), port).await?;

    info!("Main Returning");

    Ok(())
}
