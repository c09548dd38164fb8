use std::{path::PathBuf, time::Duration};

use clap::Args;
use kitchen::sync::{FileBackend, SaveOutcome, SyncedStore, DEFAULT_POLL_INTERVAL};
use url::Url;

use crate::{sync_client::RemoteBackend, Result};

#[derive(Args)]
pub(crate) struct SyncArgs {
    /// Base URL of the meal planner server
    #[arg(long)]
    server: Url,
    /// Session token, as returned by login
    #[arg(long)]
    token: String,
    /// Name of the document to sync
    #[arg(long)]
    key: String,
    /// Local copy of the document
    #[arg(long)]
    file: PathBuf,
    /// Seconds between polls
    #[arg(
        long,
        default_value_t = DEFAULT_POLL_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval_secs: u64,
    /// Upload the local copy before polling
    #[arg(long)]
    push: bool,
}

impl SyncArgs {
    pub(crate) async fn run(&self) -> Result<()> {
        let remote = RemoteBackend::new(reqwest::Client::new(), &self.server, &self.token, &self.key)?;
        let store = SyncedStore::new(FileBackend::new(&self.file), remote);

        let local = store.load_local().await?;

        if self.push {
            if let Some(doc) = local {
                match store.save(doc.payload).await? {
                    SaveOutcome::Synced => tracing::info!("Pushed local copy"),
                    SaveOutcome::LocalOnly => tracing::warn!("Server unreachable, kept local copy"),
                }
            } else {
                tracing::warn!(file = %self.file.display(), "Nothing to push");
            }
        }

        tracing::info!(key = %self.key, "Polling for changes, Ctrl-C to stop");
        store
            .run(Duration::from_secs(self.interval_secs), async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                }
            })
            .await;

        Ok(())
    }
}
