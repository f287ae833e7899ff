use tracing::warn;

use crate::{
    dto::health::{HealthResponse, HealthStatus},
    state::SharedState,
};

/// Report `ok` when a store is installed and answers its health check, `degraded` otherwise.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let connections = state.hub().connection_count();
    let status = match state.store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => HealthStatus::Ok,
            Err(err) => {
                warn!(error = %err, "lobby store health check failed");
                HealthStatus::Degraded
            }
        },
        None => HealthStatus::Degraded,
    };
    HealthResponse::new(status, connections)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{config::AppConfig, dao::lobby_store::MemoryStore, state::AppState};

    #[tokio::test]
    async fn degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(health_status(&state).await.status, HealthStatus::Degraded);

        state
            .install_store(Arc::new(MemoryStore::new(Duration::from_secs(60))))
            .await;
        let report = health_status(&state).await;
        assert_eq!(report.status, HealthStatus::Ok);
        assert_eq!(report.connections, 0);
    }
}
