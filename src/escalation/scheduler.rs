//! Periodic trigger for the escalation engine.
//!
//! One owned scheduler per process. A tick that arrives while a scan is
//! still running is skipped rather than queued, and a failed scan never
//! stops the loop; the next tick retries naturally. `stop` waits (bounded)
//! for an in-flight scan to finish.

use crate::escalation::engine::{EscalationEngine, EscalationReport};
use chrono::Utc;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const STOP_WAIT: Duration = Duration::from_secs(30);

/// The work a tick performs. Boxed behind `Arc<dyn Fn>` so the tick loop
/// and the admin trigger share one callable.
type ScanFn = Arc<dyn Fn() -> EscalationReport + Send + Sync>;

pub struct EscalationScheduler {
    scan: ScanFn,
    interval: Duration,
    scan_lock: Arc<Mutex<()>>,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl EscalationScheduler {
    pub fn new(engine: Arc<EscalationEngine>, interval_minutes: u64) -> Self {
        Self::with_scan(
            Arc::new(move || engine.scan(Utc::now())),
            Duration::from_secs(interval_minutes * 60),
        )
    }

    fn with_scan(scan: ScanFn, interval: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            scan,
            interval,
            scan_lock: Arc::new(Mutex::new(())),
            shutdown_tx,
            handle: Mutex::new(None),
        }
    }

    pub async fn start(&self) {
        let scan = self.scan.clone();
        let scan_lock = self.scan_lock.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = self.interval;

        info!(
            "starting escalation scheduler (interval {}s)",
            period.as_secs()
        );

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval() yields immediately; consume the first tick so the
            // first scan runs one full interval after startup.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!("escalation scheduler stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let guard = match scan_lock.try_lock() {
                            Ok(guard) => guard,
                            Err(_) => {
                                warn!("escalation scan still running, skipping tick");
                                continue;
                            }
                        };
                        let report = scan();
                        log_report(&report);
                        drop(guard);
                    }
                }
            }
        });

        *self.handle.lock().await = Some(handle);
    }

    /// Run a scan outside the schedule (admin trigger). Shares the scan
    /// lock with the tick loop so two scans never overlap.
    pub async fn run_now(&self) -> EscalationReport {
        let _guard = self.scan_lock.lock().await;
        let report = (self.scan)();
        log_report(&report);
        report
    }

    /// Signal shutdown and wait for the loop (and any in-flight scan) to
    /// finish, up to a bounded timeout.
    pub async fn stop(&self) {
        self.shutdown_tx.send(true).ok();
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            match tokio::time::timeout(STOP_WAIT, handle).await {
                Ok(Ok(())) => info!("escalation scheduler stopped"),
                Ok(Err(e)) => error!("escalation scheduler task failed: {e}"),
                Err(_) => warn!("escalation scheduler did not stop within {STOP_WAIT:?}"),
            }
        }
    }
}


fn log_report(report: &EscalationReport) {
    if report.errors.is_empty() {
        info!(
            "escalation scan: {} scanned, {} escalated",
            report.scanned, report.escalated
        );
    } else {
        warn!(
            "escalation scan: {} scanned, {} escalated, {} errors",
            report.scanned,
            report.escalated,
            report.errors.len()
        );
    }
}
