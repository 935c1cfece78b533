//! Registry metrics on the global OpenTelemetry meter.
//!
//! No-ops unless the host installs a meter provider.

use once_cell::sync::Lazy;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

pub struct RegistryMetrics {
    pub models_registered_total: Counter<u64>,
    pub gradients_submitted_total: Counter<u64>,
    pub evaluations_applied_total: Counter<u64>,
    pub evaluations_ignored_total: Counter<u64>,
    pub rejected_calls_total: Counter<u64>,
    pub deposit_amount: Histogram<f64>,
}

static REGISTRY_METER: Lazy<Meter> = Lazy::new(|| opentelemetry::global::meter("bounty_registry"));

pub static REGISTRY_METRICS: Lazy<RegistryMetrics> = Lazy::new(|| {
    RegistryMetrics {
        models_registered_total: REGISTRY_METER.u64_counter("bounty_models_registered_total").with_description("Models registered with an escrowed bounty").build(),
        gradients_submitted_total: REGISTRY_METER.u64_counter("bounty_gradients_submitted_total").with_description("Gradients submitted against registered models").build(),
        evaluations_applied_total: REGISTRY_METER.u64_counter("bounty_evaluations_applied_total").with_description("Gradient evaluations recorded").build(),
        evaluations_ignored_total: REGISTRY_METER.u64_counter("bounty_evaluations_ignored_total").with_description("Repeated evaluations dropped by the write-once rule").build(),
        rejected_calls_total: REGISTRY_METER.u64_counter("bounty_rejected_calls_total").with_description("Registry calls rejected with a structured error").build(),
        deposit_amount: REGISTRY_METER.f64_histogram("bounty_deposit_amount").with_description("Bounty deposited per model").with_unit("wei").build(),
    }
});

pub(crate) fn record_rejection(reason: &'static str) {
    REGISTRY_METRICS.rejected_calls_total.add(1, &[KeyValue::new("reason", reason)]);
}
