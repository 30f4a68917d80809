use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Warnings and errors kept per service; older entries fall off.
const MAX_MESSAGES: usize = 32;

/// Discrete health level exposed by each managed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OverallStatus {
    Ok,
    #[default]
    Warn,
    Crit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusGauge {
    pub label: String,
    pub value: f64,
    pub unit: Option<String>,
}

impl StatusGauge {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ServiceStatus {
    overall: OverallStatus,
    warnings: Vec<String>,
    errors: Vec<String>,
    gauges: Vec<StatusGauge>,
}

/// Immutable copy handed to the metrics exporter and log lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatusSnapshot {
    pub name: String,
    pub overall: OverallStatus,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub gauges: Vec<StatusGauge>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub metric: String,
    pub value: f64,
}

/// Implemented by anything that feeds gauges into the Prometheus exporter.
pub trait ServiceMetricsReporter: Send + Sync {
    fn service_name(&self) -> &'static str;
    fn collect_metrics(&self) -> Vec<MetricSample>;
}

/// Shared handle so a service can publish its own health.
#[derive(Clone)]
pub struct ServiceStatusHandle {
    name: &'static str,
    inner: Arc<RwLock<ServiceStatus>>,
}

impl ServiceStatusHandle {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(RwLock::new(ServiceStatus::default())),
        }
    }

    pub fn service_name(&self) -> &'static str {
        self.name
    }

    pub fn set_overall(&self, status: OverallStatus) {
        self.inner.write().overall = status;
    }

    pub fn overall(&self) -> OverallStatus {
        self.inner.read().overall
    }

    pub fn push_warning(&self, msg: impl Into<String>) {
        push_bounded(&mut self.inner.write().warnings, msg.into());
    }

    pub fn clear_warnings_matching(&self, predicate: impl Fn(&str) -> bool) {
        self.inner.write().warnings.retain(|w| !predicate(w));
    }

    pub fn push_error(&self, msg: impl Into<String>) {
        push_bounded(&mut self.inner.write().errors, msg.into());
    }

    pub fn clear_errors(&self) {
        self.inner.write().errors.clear();
    }

    pub fn set_gauges(&self, gauges: Vec<StatusGauge>) {
        self.inner.write().gauges = gauges;
    }

    pub fn snapshot(&self) -> ServiceStatusSnapshot {
        let guard = self.inner.read();
        ServiceStatusSnapshot {
            name: self.name.to_string(),
            overall: guard.overall,
            warnings: guard.warnings.clone(),
            errors: guard.errors.clone(),
            gauges: guard.gauges.clone(),
        }
    }
}

fn push_bounded(messages: &mut Vec<String>, msg: String) {
    messages.push(msg);
    if messages.len() > MAX_MESSAGES {
        let overflow = messages.len() - MAX_MESSAGES;
        messages.drain(..overflow);
    }
}

impl ServiceMetricsReporter for ServiceStatusHandle {
    fn service_name(&self) -> &'static str {
        self.name
    }

    fn collect_metrics(&self) -> Vec<MetricSample> {
        let guard = self.inner.read();
        let mut samples: Vec<MetricSample> = guard
            .gauges
            .iter()
            .map(|g| MetricSample {
                metric: slugify(&g.label),
                value: g.value,
            })
            .collect();
        let health = match guard.overall {
            OverallStatus::Ok => 0.0,
            OverallStatus::Warn => 1.0,
            OverallStatus::Crit => 2.0,
        };
        samples.push(MetricSample {
            metric: "overall_status".to_string(),
            value: health,
        });
        samples
    }
}

fn slugify(label: &str) -> String {
    label
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
