//! # Telemetry Features
//!
//! Console logging through `tracing_subscriber` is always on. OpenTelemetry
//! export is optional:
//!
//! - `trace`: export spans (one per request, plus coordinator spans from
//!   `restq`'s `tracing` feature).
//! - `metrics`: export queue counters and histograms.
//! - `stdout`: print exported data with the `opentelemetry-stdout` exporter.
//!
//! `stdout` requires at least one of `trace` or `metrics`.
//!
//! ```bash
//! cargo run --features trace,metrics,stdout
//! ```
//!
//! ## Metrics
//!
//! - `enqueued`: values accepted, with `delivery` = `handoff` | `buffered`.
//! - `dequeued`: values returned to clients.
//! - `waiters_inflight`: requests currently parked waiting for a value.
//! - `wait_outcomes`: finished waits, with `outcome`.
//! - `wait_duration`: time spent parked, in milliseconds.

#[cfg(all(feature = "stdout", not(any(feature = "trace", feature = "metrics"))))]
compile_error!("The 'stdout' feature requires at least one of 'trace' or 'metrics' to be enabled.");

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "metrics", feature = "trace"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "trace"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "trace"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "trace")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "trace")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "trace")]
use opentelemetry_sdk::trace as sdktrace;

const SERVICE_NAME: &str = "restq";

pub struct TelemetryProviders {
    #[cfg(feature = "trace")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "trace")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "trace")]
    let tracer_provider = init_tracer();

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics();

    #[cfg(any(feature = "metrics", feature = "trace"))]
    let scope = InstrumentationScope::builder(SERVICE_NAME)
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    // Console output is independent of the `opentelemetry_stdout` exporter.
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        );

    #[cfg(feature = "trace")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(&meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.try_init()?;

    Ok(TelemetryProviders {
        #[cfg(feature = "trace")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

/// Flushes and shuts down exporters. A no-op without `trace` or `metrics`.
pub fn shutdown_telemetry(_providers: TelemetryProviders) {
    #[cfg(feature = "trace")]
    {
        if let Err(err) = _providers.tracer_provider.force_flush() {
            eprintln!("Error flushing traces: {err:#?}");
        }
        if let Err(err) = _providers.tracer_provider.shutdown() {
            eprintln!("Error shutting down tracer: {err:#?}");
        }
    }

    #[cfg(feature = "metrics")]
    {
        if let Err(err) = _providers.meter_provider.force_flush() {
            eprintln!("Error flushing metrics: {err:#?}");
        }
        if let Err(err) = _providers.meter_provider.shutdown() {
            eprintln!("Error shutting down meter: {err:#?}");
        }
    }
}

#[cfg(any(feature = "metrics", feature = "trace"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> sdkmetrics::SdkMeterProvider {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    builder.build()
}

#[cfg(feature = "trace")]
fn init_tracer() -> sdktrace::SdkTracerProvider {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::SpanExporter;
        let exporter = SpanExporter::default();
        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(
                sdktrace::BatchConfigBuilder::default()
                    .with_scheduled_delay(std::time::Duration::from_secs(5))
                    .with_max_queue_size(2048)
                    .build(),
            )
            .build();
        builder.with_span_processor(batch)
    };

    builder.build()
}

// Metric handles - only compiled when metrics feature is enabled
#[cfg(feature = "metrics")]
static ENQUEUED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static DEQUEUED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static WAITERS_INFLIGHT: OnceLock<UpDownCounter<i64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static WAIT_OUTCOMES: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static WAIT_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: &Meter) {
    let _ = ENQUEUED.set(
        meter
            .u64_counter("enqueued")
            .with_description("Values accepted by PUT")
            .build(),
    );

    let _ = DEQUEUED.set(
        meter
            .u64_counter("dequeued")
            .with_description("Values returned by GET")
            .build(),
    );

    let _ = WAITERS_INFLIGHT.set(
        meter
            .i64_up_down_counter("waiters_inflight")
            .with_description("Requests parked waiting for a value")
            .build(),
    );

    let _ = WAIT_OUTCOMES.set(
        meter
            .u64_counter("wait_outcomes")
            .with_description("Finished waits by outcome")
            .build(),
    );

    let _ = WAIT_DURATION_MS.set(
        meter
            .f64_histogram("wait_duration")
            .with_unit("ms")
            .with_description("Time spent parked waiting for a value")
            .build(),
    );
}

// Convenience functions that compile to no-ops when metrics are disabled
#[cfg(feature = "metrics")]
pub fn increment_enqueued(handed_off: bool) {
    if let Some(counter) = ENQUEUED.get() {
        let delivery = if handed_off { "handoff" } else { "buffered" };
        counter.add(1, &[KeyValue::new("delivery", delivery)]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_enqueued(_handed_off: bool) {}

#[cfg(feature = "metrics")]
pub fn increment_dequeued() {
    if let Some(counter) = DEQUEUED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_dequeued() {}

#[cfg(feature = "metrics")]
pub fn increment_waiters_inflight() {
    if let Some(counter) = WAITERS_INFLIGHT.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_waiters_inflight() {}

#[cfg(feature = "metrics")]
pub fn decrement_waiters_inflight() {
    if let Some(counter) = WAITERS_INFLIGHT.get() {
        counter.add(-1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn decrement_waiters_inflight() {}

#[cfg(feature = "metrics")]
pub fn record_wait_outcome(outcome: &'static str) {
    if let Some(counter) = WAIT_OUTCOMES.get() {
        counter.add(1, &[KeyValue::new("outcome", outcome)]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_wait_outcome(_outcome: &'static str) {}

#[cfg(feature = "metrics")]
pub fn record_wait_duration(duration_ms: f64) {
    if let Some(histogram) = WAIT_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_wait_duration(_duration_ms: f64) {}
