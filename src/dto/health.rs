use serde::Serialize;
use utoipa::ToSchema;

/// Coarse service state reported by `/healthcheck`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// A lobby store is installed and answering.
    Ok,
    /// No store, or the store failed its health check. Lobby intents fail until it recovers.
    Degraded,
}

/// Body of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Open lobby sockets on this instance.
    pub connections: usize,
}

impl HealthResponse {
    pub fn new(status: HealthStatus, connections: usize) -> Self {
        Self {
            status,
            connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_lowercase_status() {
        let body = serde_json::to_value(HealthResponse::new(HealthStatus::Degraded, 3)).unwrap();
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["connections"], 3);
    }
}
