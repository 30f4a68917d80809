//! Lifecycle contract for long-running background services.

use std::fmt;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

pub trait Engine: Send + Sync {
    fn start(&self) -> EngineResult<()>;
    fn stop(&self) -> EngineResult<()>;
    fn health(&self) -> EngineHealth;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthStatus {
    Starting,
    Ready,
    Degraded,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineHealth {
    pub status: HealthStatus,
    pub detail: Option<String>,
}

impl EngineHealth {
    pub fn new(status: HealthStatus, detail: Option<String>) -> Self {
        Self { status, detail }
    }

    pub fn is_running(&self) -> bool {
        !matches!(self.status, HealthStatus::Stopped)
    }
}

impl Default for EngineHealth {
    fn default() -> Self {
        Self {
            status: HealthStatus::Stopped,
            detail: None,
        }
    }
}

impl fmt::Display for EngineHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{:?} ({detail})", self.status),
            None => write!(f, "{:?}", self.status),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine already running")]
    AlreadyRunning,
    #[error("engine is not running")]
    NotRunning,
    #[error("engine encountered an error: {source}")]
    Failure {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_health_is_stopped() {
        let health = EngineHealth::default();
        assert!(!health.is_running());
        assert_eq!(health.to_string(), "Stopped");
    }

    #[test]
    fn display_includes_detail() {
        let health = EngineHealth::new(HealthStatus::Degraded, Some("registry down".into()));
        assert!(health.is_running());
        assert_eq!(health.to_string(), "Degraded (registry down)");
    }
}
