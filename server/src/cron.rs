use cja::cron::{CronRegistry, Worker};
use tracing::{error, info};

use crate::{state::AppState, user::Session};

/// Sessions expired or inactive for longer than this are deleted
const STALE_SESSION_DAYS: i64 = 30;

fn cron_registry() -> CronRegistry<AppState> {
    let mut registry = CronRegistry::new();

    registry.register(
        "purge_expired_sessions",
        std::time::Duration::from_secs(60 * 60),
        |state: AppState, _job_name: String| {
            Box::pin(async move {
                if let Err(err) = purge_expired_sessions(&state).await {
                    error!("Failed to purge expired sessions: {:?}", err);
                }
                Ok::<_, std::convert::Infallible>(())
            })
        },
    );

    registry
}

pub async fn run_cron(app_state: AppState) -> crate::Result<()> {
    Ok(Worker::new(app_state, cron_registry()).run().await?)
}

async fn purge_expired_sessions(state: &AppState) -> crate::Result<u64> {
    let deleted = Session::purge_stale(&state.db, STALE_SESSION_DAYS).await?;
    info!(deleted, "Purged stale sessions");
    Ok(deleted)
}
