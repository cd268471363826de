//! scorebook-core: evaluation harness for LLM-driven applications.
//! Compose a dataset, a task (your application), and evaluators; run one or
//! more passes with bounded concurrency and aggregate cross-run statistics.
//! See `examples/simple.rs` for a quickstart.

pub mod error;
pub mod evaluator;
pub mod judge;
pub mod matching;
pub mod reporter;
pub mod runner;
pub mod task;
pub mod testing;

pub mod evaluators {
    pub mod exact;
    pub mod faithfulness;
    pub mod hallucination;
    pub mod overlap;
    pub mod regex;
    pub mod relevance;
}

pub use error::EvalError;
pub use evaluator::{spawn_evaluate, Evaluator, ScoreDirection};
pub use evaluators::{
    exact::ExactMatch,
    faithfulness::Faithfulness,
    hallucination::Hallucination,
    overlap::{Precision, Recall},
    regex::RegexMatch,
    relevance::ContextualRelevance,
};
pub use judge::{from_judge_fn, strip_code_fences, Judge};
pub use matching::MatchingStrategy;
pub use reporter::{NoopReporter, Reporter, RunHandle};
pub use runner::{Experiment, ExperimentBuilder};
pub use task::{from_async_fn, output_map, Task};
pub use testing::{assert_all_passed, assert_eval, assert_pass_rate};

pub use scorebook_types::{
    Dataset, EvalResult, EvalTestCase, Example, ExperimentResult, Field, ItemResult, RunResult,
    RunStatus, ValueMap,
};
