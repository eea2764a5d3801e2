//! Prometheus metrics

use crate::config::MonitoringConfig;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Metrics struct
///
/// Owned by the server and shared by `Arc`; validation never reads it.
pub struct Metrics {
    registry: Registry,

    // Counters
    pub requests: IntCounter,
    pub batches_accepted: IntCounter,
    pub batches_rejected: IntCounterVec,

    // Histograms
    pub records_per_batch: Histogram,
    pub request_duration: Histogram,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests = IntCounter::with_opts(Opts::new(
            "actcheck_requests_total",
            "Total number of /isgood requests",
        ))?;

        let batches_accepted = IntCounter::with_opts(Opts::new(
            "actcheck_batches_accepted_total",
            "Total batches where every record passed validation",
        ))?;

        let batches_rejected = IntCounterVec::new(
            Opts::new(
                "actcheck_batches_rejected_total",
                "Total rejected batches by reason",
            ),
            &["reason"],
        )?;

        let records_per_batch = Histogram::with_opts(
            HistogramOpts::new("actcheck_records_per_batch", "Records in each decoded batch")
                .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 50.0, 100.0, 1000.0]),
        )?;

        let request_duration = Histogram::with_opts(HistogramOpts::new(
            "actcheck_request_duration_seconds",
            "Request duration in seconds",
        ))?;

        // Register metrics
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(batches_accepted.clone()))?;
        registry.register(Box::new(batches_rejected.clone()))?;
        registry.register(Box::new(records_per_batch.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            requests,
            batches_accepted,
            batches_rejected,
            records_per_batch,
            request_duration,
        })
    }

    /// Count a rejected batch under `reason`
    pub fn reject(&self, reason: &str) {
        self.batches_rejected.with_label_values(&[reason]).inc();
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> prometheus::Result<Vec<u8>> {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

/// Start the metrics server
pub fn start_server(config: &MonitoringConfig, metrics: Arc<Metrics>) -> JoinHandle<()> {
    let bind = config.prometheus_bind;
    let enabled = config.prometheus_enabled;

    tokio::spawn(async move {
        if !enabled {
            info!("Prometheus metrics disabled");
            return;
        }

        use bytes::Bytes;
        use http_body_util::Full;
        use hyper::{Response, StatusCode, server::conn::http1, service::service_fn};
        use hyper_util::rt::TokioIo;

        let listener = match tokio::net::TcpListener::bind(bind).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind metrics server: {}", e);
                return;
            }
        };

        info!("Prometheus metrics server listening on {}", bind);

        loop {
            let (stream, _) = match listener.accept().await {
                Ok(r) => r,
                Err(e) => {
                    error!("Metrics accept error: {}", e);
                    continue;
                }
            };

            let io = TokioIo::new(stream);
            let metrics = metrics.clone();

            tokio::spawn(async move {
                let service = service_fn(move |_req| {
                    let metrics = metrics.clone();
                    async move {
                        let response = match metrics.encode() {
                            Ok(buffer) => {
                                let mut response = Response::new(Full::new(Bytes::from(buffer)));
                                response.headers_mut().insert(
                                    hyper::header::CONTENT_TYPE,
                                    hyper::header::HeaderValue::from_static("text/plain"),
                                );
                                response
                            }
                            Err(e) => {
                                error!("Metrics encode error: {}", e);
                                let mut response = Response::new(Full::new(Bytes::new()));
                                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                                response
                            }
                        };
                        Ok::<_, std::convert::Infallible>(response)
                    }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Metrics connection error: {}", e);
                }
            });
        }
    })
}
