use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::{KeyValue, global};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, MetricExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::{logs::SdkLoggerProvider, metrics::SdkMeterProvider};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

pub const SERVICE_NAME: &str = "greentic-airtable";
/// Target of the one-line-per-invocation JSON report events.
pub const REPORT_TARGET: &str = "airtable_node";

pub const LOG_FILE: &str = "logs/greentic-airtable.log";
pub const EVENT_FILE: &str = "logs/greentic-airtable-events.json";

/// Keeps the installed providers alive until the process ends.
pub enum TelemetryGuard {
    Files(FileTelemetry),
    Otlp(Telemetry),
}

impl TelemetryGuard {
    pub fn shutdown(self) {
        if let TelemetryGuard::Otlp(telemetry) = self {
            telemetry.shutdown();
        }
    }
}

/// Installs the global subscriber: rolling files under `<root>/logs` by
/// default, OTLP plus stdout when an endpoint is given.
pub fn init_tracing(root: &Path, log_level: &str, otel_endpoint: Option<&str>) -> Result<TelemetryGuard> {
    match otel_endpoint {
        Some(endpoint) => Ok(TelemetryGuard::Otlp(Telemetry::init(log_level, endpoint)?)),
        None => Ok(TelemetryGuard::Files(FileTelemetry::init_files(
            log_level,
            root.join(LOG_FILE),
            root.join(EVENT_FILE),
        )?)),
    }
}

static RESOURCE: OnceLock<Resource> = OnceLock::new();
fn get_resource() -> Resource {
    RESOURCE
        .get_or_init(|| Resource::builder().with_service_name(SERVICE_NAME).build())
        .clone()
}

fn init_logs(endpoint: &str) -> Result<SdkLoggerProvider> {
    let exporter = LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("could not build OTLP log exporter")?;
    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

fn init_metrics(endpoint: &str) -> Result<SdkMeterProvider> {
    let exporter = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("could not build OTLP metric exporter")?;
    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

pub struct Telemetry {
    /// emits OTel logs from `tracing` events
    pub logger_provider: SdkLoggerProvider,
    pub meter_provider: SdkMeterProvider,
}

impl Telemetry {
    pub fn init(log_level: &str, endpoint: &str) -> Result<Self> {
        let logger_provider = init_logs(endpoint)?;
        let meter_provider = init_metrics(endpoint)?;

        // the exporter's own transport must not feed back into itself
        let otel_filter = EnvFilter::new(log_level)
            .add_directive("hyper=off".parse()?)
            .add_directive("tonic=off".parse()?)
            .add_directive("h2=off".parse()?)
            .add_directive("reqwest=off".parse()?);
        let otel_layer = OpenTelemetryTracingBridge::new(&logger_provider).with_filter(otel_filter);

        let fmt_layer = fmt::layer()
            .with_thread_names(true)
            .with_filter(EnvFilter::new(log_level));

        Registry::default()
            .with(otel_layer)
            .with(fmt_layer)
            .try_init()
            .context("a global tracing subscriber is already installed")?;

        global::set_meter_provider(meter_provider.clone());

        Ok(Telemetry {
            logger_provider,
            meter_provider,
        })
    }

    pub fn shutdown(self) {
        if let Err(e) = self.meter_provider.shutdown() {
            eprintln!("metric provider shutdown failed: {e}");
        }
        if let Err(e) = self.logger_provider.shutdown() {
            eprintln!("log provider shutdown failed: {e}");
        }
    }
}

/// File-only logging: a plain text log plus a JSON report log.
pub struct FileTelemetry {
    pub log_file: PathBuf,
    pub event_file: PathBuf,
}

fn rolling(path: &Path) -> Result<RollingFileAppender> {
    let dir = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    let file = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?;
    std::fs::create_dir_all(dir).with_context(|| format!("could not create {}", dir.display()))?;
    Ok(RollingFileAppender::new(Rotation::DAILY, dir, file))
}

impl FileTelemetry {
    /// - `log_level` is an `EnvFilter` directive (e.g. `"info"`).
    /// - `log_file` receives every event at or above that level.
    /// - `event_file` receives only the per-invocation report events as JSON.
    pub fn init_files(log_level: &str, log_file: PathBuf, event_file: PathBuf) -> Result<Self> {
        // the level applies to the text log only, report events always reach the JSON log
        let txt_layer = fmt::Layer::default()
            .with_writer(rolling(&log_file)?)
            .with_ansi(false)
            .with_filter(EnvFilter::new(log_level));

        let json_layer = fmt::layer()
            .json()
            .with_writer(rolling(&event_file)?)
            .with_target(true)
            .with_filter(EnvFilter::new(format!("{}=info", REPORT_TARGET)));

        Registry::default()
            .with(txt_layer)
            .with(json_layer)
            .try_init()
            .context("a global tracing subscriber is already installed")?;

        Ok(FileTelemetry { log_file, event_file })
    }
}

/// Per-node counters. They record into the global meter, which is a no-op
/// until [`Telemetry::init`] installs a provider.
pub struct NodeMetrics {
    invocations: Counter<u64>,
    failures: Counter<u64>,
    latency_ms: Histogram<f64>,
}

static METRICS: Lazy<NodeMetrics> = Lazy::new(NodeMetrics::new);

impl NodeMetrics {
    fn new() -> Self {
        let meter = global::meter(SERVICE_NAME);
        NodeMetrics {
            invocations: meter
                .u64_counter("airtable_node_invocations")
                .with_description("Airtable node invocations by outcome")
                .build(),
            failures: meter
                .u64_counter("airtable_node_failures")
                .with_description("Airtable calls that ended in an error payload")
                .build(),
            latency_ms: meter
                .f64_histogram("airtable_node_latency_ms")
                .with_unit("ms")
                .build(),
        }
    }

    pub fn global() -> &'static NodeMetrics {
        &METRICS
    }

    pub fn record(&self, node_type: &str, outcome: &str, failed: bool, latency_ms: f64) {
        let node = KeyValue::new("node", node_type.to_string());
        self.invocations
            .add(1, &[node.clone(), KeyValue::new("outcome", outcome.to_string())]);
        if failed {
            self.failures.add(1, &[node.clone()]);
        }
        self.latency_ms.record(latency_ms, &[node]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_record_without_provider() {
        NodeMetrics::global().record("airtable-getall", "success", false, 1.5);
        NodeMetrics::global().record("airtable-getall", "error", true, 2.0);
    }

    #[test]
    fn rolling_creates_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/out.log");
        rolling(&path).unwrap();
        assert!(dir.path().join("nested/logs").is_dir());
    }

    #[test]
    fn rolling_rejects_bare_root() {
        assert!(rolling(Path::new("/")).is_err());
    }
}
