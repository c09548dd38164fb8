use std::time::Duration;

use crate::{AppState, Result};

mod registry;
mod worker;

use registry::{CronFuture, CronRegistry};
use worker::Worker;

fn one_hour() -> Duration {
    Duration::from_secs(60 * 60)
}

fn prune_expired_sessions(app_state: AppState, _context: String) -> CronFuture {
    Box::pin(async move {
        let pruned = db::sessions::Session::prune_expired(&app_state.db).await?;
        tracing::info!(pruned, "Pruned expired sessions");

        Ok(())
    })
}

fn fail_stale_scans(app_state: AppState, _context: String) -> CronFuture {
    Box::pin(async move {
        let failed = db::scans::PantryScan::fail_stale(&app_state.db).await?;
        if failed > 0 {
            tracing::warn!(failed, "Marked stuck pantry scans as failed");
        }

        Ok(())
    })
}

pub(crate) fn cron_registry() -> CronRegistry {
    let mut registry = CronRegistry::new();

    registry.register("PruneExpiredSessions", one_hour(), prune_expired_sessions);
    registry.register("FailStaleScans", one_hour(), fail_stale_scans);

    registry
}

pub(crate) async fn run_cron(app_state: AppState) -> Result<()> {
    Worker::new(app_state, cron_registry()).run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_housekeeping_jobs() {
        let registry = cron_registry();

        let mut names = registry.names();
        names.sort_unstable();
        assert_eq!(names, vec!["FailStaleScans", "PruneExpiredSessions"]);
    }
}
