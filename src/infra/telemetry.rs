use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "taskflow_cache_hit_total",
            Unit::Count,
            "Listed tasks served from a cached entry."
        );
        describe_counter!(
            "taskflow_cache_miss_total",
            Unit::Count,
            "Indexed task ids whose cached entry was absent or expired."
        );
        describe_counter!(
            "taskflow_cache_refill_total",
            Unit::Count,
            "Cache entries rewritten from the read store after a miss."
        );
        describe_counter!(
            "taskflow_cache_index_healed_total",
            Unit::Count,
            "Index members removed because the read store no longer has the task."
        );
        describe_counter!(
            "taskflow_cache_rebuild_total",
            Unit::Count,
            "Full cache rebuilds from the read store."
        );
        describe_counter!(
            "taskflow_cache_degraded_total",
            Unit::Count,
            "Cache operations skipped because the backend failed."
        );
        describe_counter!(
            "taskflow_sync_applied_total",
            Unit::Count,
            "Change events applied to the read model."
        );
        describe_counter!(
            "taskflow_sync_stale_total",
            Unit::Count,
            "Change events rejected because the read model was already newer."
        );
        describe_counter!(
            "taskflow_sync_failed_total",
            Unit::Count,
            "Change events that failed to apply."
        );
        describe_counter!(
            "taskflow_publish_failed_total",
            Unit::Count,
            "Committed mutations whose change event could not be enqueued."
        );
        describe_histogram!(
            "taskflow_list_ms",
            Unit::Milliseconds,
            "List-all query latency in milliseconds."
        );
    });
}
