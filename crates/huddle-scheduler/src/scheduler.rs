//! The minute scheduler.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, error, info};

use crate::{CronError, CronExpr, Engine, truncate_to_minute};

/// When the reconciliation sweep runs: 25 minutes past every hour.
pub const RECONCILE_CRON: &str = "25 * * * *";

/// When the reminder sweep runs: 16:10 on Monday, Wednesday and Friday.
pub const REMIND_CRON: &str = "10 16 * * 1,3,5";

/// Delay before the first tick so team connections can come up.
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_secs(30);

const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Drives the new-round, reconciliation and reminder sweeps.
pub struct Scheduler {
    engine: Engine,
    startup_grace: Duration,
    reconcile: CronExpr,
    remind: CronExpr,
    last_minute: Mutex<Option<DateTime<Local>>>,
}

impl Scheduler {
    pub fn new(engine: Engine) -> Result<Self, CronError> {
        Ok(Self {
            engine,
            startup_grace: DEFAULT_STARTUP_GRACE,
            reconcile: CronExpr::parse(RECONCILE_CRON)?,
            remind: CronExpr::parse(REMIND_CRON)?,
            last_minute: Mutex::new(None),
        })
    }

    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// Run the scheduler loop until shutdown is signalled.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(grace_secs = self.startup_grace.as_secs(), "scheduler starting");

        tokio::select! {
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    info!("scheduler shut down before first tick");
                    return;
                }
            }
            _ = sleep(self.startup_grace) => {}
        }

        let mut ticker = interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                result = shutdown_rx.changed() => {
                    if result.is_err() {
                        break;
                    }
                    if *shutdown_rx.borrow() {
                        info!("scheduler received shutdown signal");
                    }
                }
                _ = ticker.tick() => {
                    self.tick(Local::now());
                }
            }
        }

        info!("scheduler shut down gracefully");
    }

    /// Evaluate every cron against the minute containing `now` and spawn the
    /// due sweeps. A minute that was already evaluated is skipped.
    pub fn tick(&self, now: DateTime<Local>) -> Vec<JoinHandle<()>> {
        let minute = truncate_to_minute(now);

        {
            let mut last = self
                .last_minute
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if last.as_ref().is_some_and(|previous| *previous >= minute) {
                debug!(%minute, "minute already evaluated");
                return Vec::new();
            }
            *last = Some(minute);
        }

        debug!(%minute, "scheduler tick");
        let mut handles = Vec::new();

        let engine = self.engine.clone();
        handles.push(tokio::spawn(async move {
            engine.new_instance_sweep(minute).await;
        }));

        if self.reconcile.is_due(&minute) {
            let engine = self.engine.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = engine.reconcile_all().await {
                    error!(error = %e, "reconciliation sweep failed");
                }
            }));
        }

        if self.remind.is_due(&minute) {
            let engine = self.engine.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = engine.remind_missing(minute.with_timezone(&Utc)).await {
                    error!(error = %e, "reminder sweep failed");
                }
            }));
        }

        handles
    }
}

impl Engine {
    /// Create a round for every active question due at `minute`, concurrently.
    /// Returns the number of rounds created.
    #[tracing::instrument(skip(self))]
    pub async fn new_instance_sweep(&self, minute: DateTime<Local>) -> usize {
        let questions = match self.store().list_questions() {
            Ok(questions) => questions,
            Err(e) => {
                error!(error = %e, "cannot list questions");
                return 0;
            }
        };

        let mut tasks = JoinSet::new();
        for mut question in questions.into_iter().filter(|q| q.active) {
            match CronExpr::parse(&question.cron) {
                Ok(expr) if expr.is_due(&minute) => {}
                Ok(_) => continue,
                Err(e) => {
                    error!(question = question.id, error = %e, "error while checking cron");
                    continue;
                }
            }

            info!(question = question.id, "creating new round");
            let engine = self.clone();
            tasks.spawn(async move {
                let id = question.id;
                match engine.new_instance(&mut question).await {
                    Ok(_) => true,
                    Err(e) => {
                        error!(question = id, error = %e, "could not create new round");
                        false
                    }
                }
            });
        }

        let mut created = 0;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(true) => created += 1,
                Ok(false) => {}
                Err(e) => error!(error = %e, "round creation task failed"),
            }
        }
        created
    }
}
