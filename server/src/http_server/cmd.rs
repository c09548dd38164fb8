use color_eyre::eyre::Context as _;
use tokio::task::JoinError;
use tracing::info;

use crate::{cron::run_cron, http_server::run_server, AppState, Result};

pub(crate) async fn serve() -> Result<()> {
    let app_state = AppState::from_env().await?;

    info!("Spawning Tasks");
    let futures = vec![
        tokio::spawn(run_server(app_state.clone())),
        tokio::spawn(run_cron(app_state.clone())),
    ];
    info!("Tasks Spawned");

    let results = futures::future::join_all(futures).await;
    let results: Result<Vec<Result<()>>, JoinError> = results.into_iter().collect();
    results
        .wrap_err("A server task panicked")?
        .into_iter()
        .collect::<Result<Vec<()>>>()?;

    info!("Main Returning");

    Ok(())
}
