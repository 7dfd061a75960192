use cja::{
    app_state::AppState as _,
    server::run_server,
    setup::{setup_sentry, setup_tracing},
};
use imagic::{cron, routes, AppState};
use tracing::info;

fn main() -> color_eyre::Result<()> {
    let _sentry_guard = setup_sentry();

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()?
        .block_on(async { run_application().await })
}

async fn run_application() -> cja::Result<()> {
    setup_tracing("imagic")?;

    let app_state = AppState::from_env().await?;
    info!(version = app_state.version(), "Imagic starting");

    let futures = spawn_application_tasks(app_state)?;
    futures::future::try_join_all(futures)
        .await?
        .into_iter()
        .collect::<cja::Result<Vec<()>>>()?;

    Ok(())
}

fn spawn_application_tasks(
    app_state: AppState,
) -> cja::Result<Vec<tokio::task::JoinHandle<cja::Result<()>>>> {
    let mut futures = vec![];

    if is_feature_enabled("SERVER") {
        info!("Server Enabled");
        futures.push(tokio::spawn(run_server(routes::routes(app_state.clone()))));
    } else {
        info!("Server Disabled");
    }

    if is_feature_enabled("CRON") {
        info!("Cron Enabled");
        futures.push(tokio::spawn(cron::run_cron(app_state.clone())));
    } else {
        info!("Cron Disabled");
    }

    info!("All application tasks spawned successfully");
    Ok(futures)
}

/// A task runs unless `{FEATURE}_DISABLED=true`
fn is_feature_enabled(feature: &str) -> bool {
    std::env::var(format!("{}_DISABLED", feature)).unwrap_or_else(|_| "false".to_string()) != "true"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_is_feature_enabled_when_env_var_not_set() {
        env::remove_var("IMAGIC_TEST_UNSET_DISABLED");
        assert!(is_feature_enabled("IMAGIC_TEST_UNSET"));
    }

    #[test]
    fn test_is_feature_enabled_when_env_var_is_false() {
        env::set_var("IMAGIC_TEST_FALSE_DISABLED", "false");
        assert!(is_feature_enabled("IMAGIC_TEST_FALSE"));
        env::remove_var("IMAGIC_TEST_FALSE_DISABLED");
    }

    #[test]
    fn test_is_feature_disabled_when_env_var_is_true() {
        env::set_var("IMAGIC_TEST_TRUE_DISABLED", "true");
        assert!(!is_feature_enabled("IMAGIC_TEST_TRUE"));
        env::remove_var("IMAGIC_TEST_TRUE_DISABLED");
    }

    #[test]
    fn test_is_feature_enabled_with_other_values() {
        env::set_var("IMAGIC_TEST_OTHER_DISABLED", "yes");
        assert!(is_feature_enabled("IMAGIC_TEST_OTHER"));
        env::remove_var("IMAGIC_TEST_OTHER_DISABLED");
    }
}
