use std::{collections::HashMap, future::Future, pin::Pin, time::Duration};

use chrono::{DateTime, Utc};

use crate::{AppState, Result};

pub(crate) type CronFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

pub(crate) trait CronFn: Fn(AppState, String) -> CronFuture + Send + Sync {}
impl<T> CronFn for T where T: Fn(AppState, String) -> CronFuture + Send + Sync {}

pub(crate) struct CronJob {
    pub(super) name: &'static str,
    func: Box<dyn CronFn>,
    interval: Duration,
}

impl CronJob {
    /// Due when it has never run, or its interval has passed since the last run.
    pub(super) fn is_due(&self, last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(last_run) = last_run else {
            return true;
        };

        // A last run in the future means clocks disagree, wait it out
        (now - last_run)
            .to_std()
            .is_ok_and(|elapsed| elapsed > self.interval)
    }

    #[tracing::instrument(
        name = "cron_job.tick",
        skip_all,
        fields(
            cron_job.name = self.name,
            cron_job.interval = ?self.interval
        )
    )]
    pub(super) async fn tick(
        &self,
        app_state: AppState,
        last_runs: &HashMap<String, DateTime<Utc>>,
    ) -> Result<()> {
        let now = Utc::now();
        let last_run = last_runs.get(self.name).copied();

        if !self.is_due(last_run, now) {
            return Ok(());
        }

        match last_run {
            Some(last_run) => tracing::info!(
                task_name = self.name,
                time_since_last_run = ?(now - last_run),
                "Running Task"
            ),
            None => tracing::info!(task_name = self.name, "Running Task for first time"),
        }

        let context = format!("Cron@{}", app_state.versions.version);
        (self.func)(app_state.clone(), context).await?;

        db::crons::record_run(&app_state.db, self.name, now).await?;

        Ok(())
    }
}

pub(crate) struct CronRegistry {
    pub(super) jobs: HashMap<&'static str, CronJob>,
}

impl CronRegistry {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    #[tracing::instrument(name = "cron.register", skip_all, fields(cron_job.name = name, cron_job.interval = ?interval))]
    pub fn register(&mut self, name: &'static str, interval: Duration, job: impl CronFn + 'static) {
        let cron_job = CronJob {
            name,
            func: Box::new(job),
            interval,
        };
        self.jobs.insert(name, cron_job);
    }

    #[cfg(test)]
    pub(super) fn names(&self) -> Vec<&'static str> {
        self.jobs.keys().copied().collect()
    }
}

impl Default for CronRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;

    fn noop(_app_state: AppState, _context: String) -> CronFuture {
        Box::pin(async { Ok(()) })
    }

    fn job(interval: Duration) -> CronJob {
        CronJob {
            name: "Test",
            func: Box::new(noop),
            interval,
        }
    }

    #[test]
    fn due_when_never_run_or_interval_passed() {
        let job = job(Duration::from_secs(60 * 60));
        let now = Utc::now();

        assert!(job.is_due(None, now));
        assert!(job.is_due(Some(now - ChronoDuration::minutes(61)), now));
        assert!(!job.is_due(Some(now - ChronoDuration::minutes(59)), now));
        assert!(!job.is_due(Some(now + ChronoDuration::minutes(5)), now));
    }
}
