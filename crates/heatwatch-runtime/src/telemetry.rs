//! Logging and trace export setup for Heatwatch.
//!
//! Call [`init_tracing`] once at process startup, before the serial link is
//! opened, and keep the returned guard alive until exit.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `HEATWATCH_LOG_FORMAT=json` | Newline-delimited JSON logs instead of the compact format. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP/HTTP collector base URL. When set, `tracing` spans (including the per-sample `inference_iteration` span) are exported. |
//!
//! # Example
//!
//! ```rust,no_run
//! let _guard = heatwatch_runtime::telemetry::init_tracing("heatwatch");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "HEATWATCH_LOG_FORMAT";

/// Install the global `tracing` subscriber.
///
/// Output is compact text unless [`LOG_FORMAT_ENV`] is `json`.  An OTLP
/// exporter layer is added only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
/// If a subscriber is already installed (e.g. by a test harness) the call
/// leaves it in place.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = json_requested(std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    let provider = build_provider(service_name);
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("heatwatch")));

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer)
        .with(use_json.then(|| fmt::layer().with_target(true).json()))
        .with((!use_json).then(|| fmt::layer().with_target(true).compact()))
        .try_init();
    if let Err(e) = result {
        eprintln!("[heatwatch] tracing subscriber already installed: {e}");
    }

    TracerProviderGuard(provider)
}

fn json_requested(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.eq_ignore_ascii_case("json"))
}

/// Flushes and shuts down the OTLP exporter when dropped.
///
/// Hold it in `main` for the lifetime of the process.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// `true` when spans are being exported over OTLP.
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[heatwatch] OpenTelemetry provider shutdown error: {e}");
        }
    }
}

/// Build the OTLP tracer provider, or `None` when no endpoint is configured
/// or the exporter cannot be created (reported on stderr).
///
/// Uses the simple exporter: the loop is single-threaded and has no async
/// runtime for a batch exporter to run on.
fn build_provider(service_name: &str) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[heatwatch] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(exporter)
            .build(),
    )
}
