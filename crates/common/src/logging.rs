use std::env;

use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use tracing::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

pub const OTLP_URL_ENVVAR: &str = "TESSERA_OTLP_URL";
pub const SVC_LABEL_ENVVAR: &str = "TESSERA_SVC_LABEL";

pub struct LoggerConfig {
    whoami: String,
    otel_url: Option<String>,
}

impl LoggerConfig {
    /// Creates a new empty instance with whoami set.
    pub fn new(whoami: String) -> Self {
        Self {
            whoami,
            otel_url: None,
        }
    }

    pub fn with_base_name(s: &str) -> Self {
        Self::new(get_whoami_string(s))
    }

    pub fn set_otlp_url(&mut self, url: String) {
        self.otel_url = Some(url);
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::with_base_name("(tessera-service)")
    }
}

/// Initializes the logging subsystem with the provided config.
///
/// Stdout gets a compact formatter filtered by `RUST_LOG`; spans are also
/// exported over OTLP when an endpoint is configured.
pub fn init(config: LoggerConfig) {
    let filt = tracing_subscriber::EnvFilter::from_default_env();
    let stdout_sub = tracing_subscriber::fmt::layer().compact().with_filter(filt);

    let otel_tracer = config.otel_url.as_ref().and_then(|otel_url| {
        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(otel_url);

        match opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .install_batch(opentelemetry_sdk::runtime::Tokio)
        {
            Ok(tp) => Some(tp.tracer("tessera-log")),
            Err(e) => {
                eprintln!("failed to set up OTLP exporter, continuing without it: {e}");
                None
            }
        }
    });

    match otel_tracer {
        Some(tt) => {
            let otel_sub = tracing_opentelemetry::layer().with_tracer(tt);
            tracing_subscriber::registry()
                .with(stdout_sub)
                .with(otel_sub)
                .init();
        }
        None => tracing_subscriber::registry().with(stdout_sub).init(),
    }

    info!(whoami = %config.whoami, "logging started");
}

/// Shuts down the logging subsystem, flushing pending spans.
pub fn finalize() {
    info!("shutting down logging");
    opentelemetry::global::shutdown_tracer_provider();
}

/// Gets the OTLP URL from the standard envvar.
pub fn get_otlp_url_from_env() -> Option<String> {
    env::var(OTLP_URL_ENVVAR).ok()
}

/// Gets the service label from the standard envvar, which should be included
/// in the whoami string.
pub fn get_service_label_from_env() -> Option<String> {
    env::var(SVC_LABEL_ENVVAR).ok()
}

/// Computes a standard whoami string.
pub fn get_whoami_string(base: &str) -> String {
    match get_service_label_from_env() {
        Some(label) => format!("{base}%{label}"),
        None => base.to_string(),
    }
}
