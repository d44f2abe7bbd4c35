use metrics::{Counter, Histogram};
use metrics_derive::Metrics;

/// The metrics for the [`super::StatelessBlockValidator`].
#[derive(Metrics, Clone)]
#[metrics(scope = "stateless_validator")]
pub struct StatelessValidatorMetrics {
    /// A counter on the blocks whose execution reached the expected global state.
    pub validated_blocks: Counter,
    /// A counter on the blocks whose execution diverged from the expected global state.
    pub invalid_blocks: Counter,
    /// A counter on the validations that failed before reaching a verdict.
    pub failed_validations: Counter,
    /// The duration of the preparation of a validation entry.
    pub record_duration: Histogram,
    /// The duration of the execution of a block by a backend.
    pub execution_duration: Histogram,
}
