//! scorebook-types: shared value types for the scorebook evaluation harness.
//! Datasets and examples, evaluation test cases, and the result/aggregation
//! types produced by the experiment runner.

mod dataset;
mod result;
mod test_case;

pub use dataset::{Dataset, Example, ValueMap};
pub use result::{EvalResult, ExperimentResult, ItemResult, RunResult, RunStatus};
pub use test_case::{EvalTestCase, Field};
