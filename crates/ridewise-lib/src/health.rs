//! Health check infrastructure for the prediction service
//!
//! Tracks the model cache and the hourly and daily model artifacts for
//! liveness and readiness probes. A model that fails to load degrades the
//! service without taking it out of rotation; requests surface the error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Usable, but some requests will fail
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentStatus::Healthy => "healthy",
            ComponentStatus::Degraded => "degraded",
            ComponentStatus::Unhealthy => "unhealthy",
        }
    }

    pub fn is_operational(&self) -> bool {
        !matches!(self, ComponentStatus::Unhealthy)
    }

    /// The worse of two statuses
    fn worst(self, other: ComponentStatus) -> ComponentStatus {
        use ComponentStatus::*;
        match (self, other) {
            (Unhealthy, _) | (_, Unhealthy) => Unhealthy,
            (Degraded, _) | (_, Degraded) => Degraded,
            _ => Healthy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    pub fn compute_status(components: &BTreeMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .fold(ComponentStatus::Healthy, |acc, c| acc.worst(c.status))
    }
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const MODEL_CACHE: &str = "model_cache";
    pub const HOURLY_MODEL: &str = "hourly_model";
    pub const DAILY_MODEL: &str = "daily_model";

    pub const ALL: [&str; 3] = [MODEL_CACHE, HOURLY_MODEL, DAILY_MODEL];
}

/// Shared component health table plus the startup readiness flag
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<BTreeMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component as healthy
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Healthy on success, degraded with the error message on failure
    pub async fn record_probe<T, E: std::fmt::Display>(
        &self,
        name: &str,
        outcome: &std::result::Result<T, E>,
    ) {
        match outcome {
            Ok(_) => self.set_healthy(name).await,
            Err(e) => self.set_degraded(name, e.to_string()).await,
        }
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        if !*self.ready.read().await {
            return ReadinessResponse {
                ready: false,
                reason: Some("Service not yet initialized".to_string()),
            };
        }

        let components = self.components.read().await;
        if let Some((name, _)) = components
            .iter()
            .find(|(_, c)| !c.status.is_operational())
        {
            return ReadinessResponse {
                ready: false,
                reason: Some(format!("Component '{}' unhealthy", name)),
            };
        }

        ReadinessResponse {
            ready: true,
            reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_registered_components_start_healthy() {
        let registry = HealthRegistry::new();
        for name in components::ALL {
            registry.register(name).await;
        }
        let health = registry.health().await;
        assert_eq!(health.components.len(), 3);
        assert!(health
            .components
            .values()
            .all(|c| c.status == ComponentStatus::Healthy));
    }

    #[tokio::test]
    async fn test_worst_status_wins() {
        let registry = HealthRegistry::new();
        registry.register(components::MODEL_CACHE).await;
        registry
            .set_degraded(components::HOURLY_MODEL, "Model file not found")
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry
            .set_unhealthy(components::MODEL_CACHE, "Cache unavailable")
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_not_ready_before_startup() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_unhealthy_component_blocks_readiness() {
        let registry = HealthRegistry::new();
        registry.set_ready(true).await;
        registry
            .set_unhealthy(components::MODEL_CACHE, "Cache unavailable")
            .await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("Component 'model_cache' unhealthy")
        );
    }

    #[tokio::test]
    async fn test_failed_model_probe_degrades_but_stays_ready() {
        let registry = HealthRegistry::new();
        for name in components::ALL {
            registry.register(name).await;
        }
        let failed: Result<(), String> = Err("Model file not found at 'x.json'".into());
        registry.record_probe(components::DAILY_MODEL, &failed).await;
        registry
            .record_probe(components::HOURLY_MODEL, &Ok::<_, String>(()))
            .await;
        registry.set_ready(true).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::DAILY_MODEL].message.as_deref(),
            Some("Model file not found at 'x.json'")
        );
        assert!(registry.readiness().await.ready);
    }
}
