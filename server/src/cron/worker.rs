use std::time::Duration;

use crate::{AppState, Result};

use super::registry::CronRegistry;

pub(super) struct Worker {
    state: AppState,
    registry: CronRegistry,
}

impl Worker {
    pub fn new(state: AppState, registry: CronRegistry) -> Self {
        Self { state, registry }
    }

    pub async fn run(self) -> Result<()> {
        let worker_id = uuid::Uuid::new_v4();

        tracing::debug!("Starting cron loop");
        loop {
            if let Err(error) = self.tick(&worker_id).await {
                tracing::error!(?error, "Cron tick failed");
            }

            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }

    #[tracing::instrument(name = "cron.tick", skip_all, fields(cron_worker.id = %worker_id))]
    async fn tick(&self, worker_id: &uuid::Uuid) -> Result<()> {
        let last_runs = db::crons::last_runs(&self.state.db).await?;

        for job in self.registry.jobs.values() {
            if let Err(error) = job.tick(self.state.clone(), &last_runs).await {
                tracing::error!(cron_job.name = job.name, ?error, "Cron job failed");
            }
        }

        Ok(())
    }
}
