use std::time::Duration;

use sqlx::SqlitePool;
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::{db, errors::AppError};

/// Flags every sent or processing invoice that is unpaid past its due date.
pub async fn check_past_due_statements(pool: &SqlitePool) -> Result<u64, AppError> {
    let flagged = db::mark_overdue_invoices(pool, chrono::Utc::now().timestamp()).await?;
    if flagged > 0 {
        log::info!("Flagged {} overdue statement(s)", flagged);
    } else {
        log::debug!("No overdue statements");
    }
    Ok(flagged)
}

/// Runs the overdue check every `period`, starting one period from now.
/// Runs are sequential on one task, and a failed run does not stop the schedule.
pub fn spawn_statement_checker(pool: SqlitePool, period: Duration) -> JoinHandle<()> {
    actix_web::rt::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(e) = check_past_due_statements(&pool).await {
                log::error!("Overdue statement check failed: {}", e);
            }
        }
    })
}
