//! Log output for seedpoll
//!
//! Logs go to stderr in compact form; the row dumps own stdout. `RUST_LOG`
//! wins over `--debug` (e.g. `RUST_LOG=seedpoll_db=debug`). Built with the
//! `telemetry` feature, `--otel` also ships spans to
//! `OTEL_EXPORTER_OTLP_ENDPOINT` (default `http://localhost:4317`) under
//! `OTEL_SERVICE_NAME` (default `seedpoll`).

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Debug level unless RUST_LOG says otherwise
    pub debug: bool,
    /// Enable OpenTelemetry OTLP export
    pub otel: bool,
}

fn env_filter(config: &TracingConfig) -> EnvFilter {
    let fallback = if config.debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Console output only
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_target(config.debug)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}

/// Where spans go when `--otel` is set
#[cfg(feature = "telemetry")]
struct OtlpTarget {
    endpoint: String,
    service_name: String,
}

#[cfg(feature = "telemetry")]
impl OtlpTarget {
    fn from_env() -> Self {
        let var = |key: &str, fallback: &str| {
            std::env::var(key)
                .ok()
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };
        Self {
            endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
            service_name: var("OTEL_SERVICE_NAME", "seedpoll"),
        }
    }

    /// Batch exporter driven by the current-thread runtime `main` runs on.
    fn provider(&self) -> Result<opentelemetry_sdk::trace::TracerProvider> {
        use opentelemetry::KeyValue;
        use opentelemetry_otlp::WithExportConfig;
        use opentelemetry_sdk::{runtime::TokioCurrentThread, trace::TracerProvider, Resource};

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&self.endpoint)
            .build()
            .map_err(|err| anyhow!("OTLP exporter for {}: {}", self.endpoint, err))?;

        Ok(TracerProvider::builder()
            .with_batch_exporter(exporter, TokioCurrentThread)
            .with_resource(Resource::new([KeyValue::new(
                "service.name",
                self.service_name.clone(),
            )]))
            .build())
    }
}

/// Console output plus OTLP span export
#[cfg(feature = "telemetry")]
pub fn init_tracing_with_otel(config: &TracingConfig) -> Result<()> {
    use opentelemetry::trace::TracerProvider as _;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let target = OtlpTarget::from_env();
    let provider = target.provider()?;
    let spans = tracing_opentelemetry::layer().with_tracer(provider.tracer("seedpoll"));

    // The global handle keeps the exporter alive until shutdown_otel
    let _ = opentelemetry::global::set_tracer_provider(provider);

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(config.debug)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(spans)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    tracing::info!(
        endpoint = %target.endpoint,
        service = %target.service_name,
        "Exporting spans over OTLP"
    );
    Ok(())
}

/// Flush pending spans
#[cfg(feature = "telemetry")]
pub fn shutdown_otel() {
    opentelemetry::global::shutdown_tracer_provider();
}

#[cfg(not(feature = "telemetry"))]
pub fn shutdown_otel() {}

/// Pick console-only or OTEL based on `config.otel`
pub fn init(config: &TracingConfig) -> Result<()> {
    #[cfg(feature = "telemetry")]
    if config.otel {
        return init_tracing_with_otel(config);
    }

    init_tracing(config)
}
