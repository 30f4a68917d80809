// Copyright (c) James Kassemi, SC, US. All rights reserved.
//! Prometheus exporter for service status gauges. hyper v1.+
use core_types::status::{
    MetricSample, ServiceMetricsReporter, ServiceStatusHandle, ServiceStatusSnapshot,
};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use prometheus::{Encoder, GaugeVec, IntCounter, Opts, Registry, TextEncoder};
use std::error::Error;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::time::{self, Duration};

pub struct Metrics {
    registry: Registry,
    scrapes: IntCounter,
    last_scrape: Mutex<Option<Instant>>,
    service_statuses: Mutex<Vec<ServiceStatusHandle>>,
    service_metrics: RwLock<Vec<Arc<dyn ServiceMetricsReporter>>>,
    service_gauges: GaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let service_gauges = GaugeVec::new(
            Opts::new("service_gauge", "Gauges reported by managed services"),
            &["service", "metric"],
        )?;
        let scrapes = IntCounter::new("metrics_scrapes_total", "Scrapes served")?;
        registry.register(Box::new(service_gauges.clone()))?;
        registry.register(Box::new(scrapes.clone()))?;
        Ok(Self {
            registry,
            scrapes,
            last_scrape: Mutex::new(None),
            service_statuses: Mutex::new(Vec::new()),
            service_metrics: RwLock::new(Vec::new()),
            service_gauges,
        })
    }

    pub fn register_service_status(&self, handle: ServiceStatusHandle) {
        self.service_statuses.lock().push(handle.clone());
        let reporter: Arc<dyn ServiceMetricsReporter> = Arc::new(handle);
        self.register_service_metrics(reporter);
    }

    pub fn service_status_snapshots(&self) -> Vec<ServiceStatusSnapshot> {
        self.service_statuses
            .lock()
            .iter()
            .map(|handle| handle.snapshot())
            .collect()
    }

    pub fn register_service_metrics(&self, reporter: Arc<dyn ServiceMetricsReporter>) {
        self.service_metrics.write().push(reporter);
    }

    /// Time since the exporter was last scraped, if ever.
    pub fn since_last_scrape(&self) -> Option<Duration> {
        self.last_scrape.lock().map(|at| at.elapsed())
    }

    pub fn spawn_service_metric_task(
        self: &Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let metrics = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            loop {
                ticker.tick().await;
                metrics.collect_service_metrics();
            }
        })
    }

    pub fn collect_service_metrics(&self) {
        let reporters = self.service_metrics.read().clone();
        for reporter in reporters {
            let service = reporter.service_name();
            for sample in reporter.collect_metrics() {
                self.record_metric(service, &sample);
            }
        }
    }

    fn record_metric(&self, service: &str, sample: &MetricSample) {
        self.service_gauges
            .with_label_values(&[service, sample.metric.as_str()])
            .set(sample.value);
    }

    /// Text exposition of everything in this exporter's registry.
    pub fn render(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    async fn handle_metrics(
        &self,
        _req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
        *self.last_scrape.lock() = Some(Instant::now());
        self.scrapes.inc();
        self.collect_service_metrics();
        let response = match self.render() {
            Ok(body) => Response::new(Full::new(Bytes::from(body))),
            Err(err) => {
                warn!("metrics encode failed: {err}");
                let mut response = Response::new(Full::new(Bytes::from_static(b"encode failed")));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        };
        Ok(response)
    }

    pub async fn serve(
        self: &Arc<Self>,
        listener: TcpListener,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        loop {
            let (socket, peer) = listener.accept().await?;
            debug!("metrics scrape from {peer}");
            let io = TokioIo::new(socket);
            let metrics = Arc::clone(self);
            let service = service_fn(move |req| {
                let metrics = Arc::clone(&metrics);
                async move { metrics.handle_metrics(req).await }
            });
            tokio::spawn(async move {
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!("error serving metrics connection: {err:?}");
                }
            });
        }
    }
}
