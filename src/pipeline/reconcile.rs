// Reconciler — repair posts that ended up with more than one topic set.
//
// A single pass is one transaction in the store (see
// queries::reconcile_topic_sets). The periodic runner repeats passes on an
// interval until its shutdown future resolves; a failed pass is logged and
// the next tick tries again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::db::models::ReconcileReport;
use crate::db::Database;

/// Run one reconciliation pass.
pub async fn run_once(db: &dyn Database) -> Result<ReconcileReport> {
    let report = db.reconcile_topic_sets().await?;
    if report.posts_repaired > 0 {
        info!(
            posts = report.posts_repaired,
            rows = report.rows_deleted,
            "Removed superseded topic sets"
        );
    }
    Ok(report)
}

/// Run passes every `every` until `shutdown` completes. Returns the totals.
pub async fn run_periodic<S>(db: Arc<dyn Database>, every: Duration, shutdown: S) -> ReconcileReport
where
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut totals = ReconcileReport::default();
    let mut passes = 0usize;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                passes += 1;
                match run_once(db.as_ref()).await {
                    Ok(report) => {
                        totals.posts_repaired += report.posts_repaired;
                        totals.rows_deleted += report.rows_deleted;
                    }
                    Err(e) => warn!(error = %e, "Reconciliation pass failed"),
                }
            }
        }
    }

    info!(
        passes,
        posts = totals.posts_repaired,
        rows = totals.rows_deleted,
        "Reconciler stopped"
    );
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_run_once_on_empty_store() {
        let db = db::in_memory().unwrap();
        assert_eq!(run_once(db.as_ref()).await.unwrap(), ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_periodic_stops_on_shutdown() {
        let db = db::in_memory().unwrap();
        let totals = run_periodic(
            db,
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await;
        assert_eq!(totals, ReconcileReport::default());
    }
}
