use scorebook_types::Field;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvalError>;

/// Error taxonomy for evaluator invocations.
///
/// Configuration problems (`MissingField`, `Config`) surface before any
/// scoring or judge call; parse problems (`JudgeParse`) name the pipeline
/// stage that could not make sense of a judge reply. The runner never
/// catches any of these internally.
#[derive(Debug, Error)]
pub enum EvalError {
	#[error("evaluator `{evaluator}`: required field `{field}` is missing")]
	MissingField { evaluator: String, field: Field },

	#[error("evaluator `{evaluator}`: invalid configuration: {message}")]
	Config { evaluator: String, message: String },

	#[error("evaluator `{evaluator}`: judge call failed at stage `{stage}`: {message}")]
	Judge {
		evaluator: String,
		stage: &'static str,
		message: String,
	},

	#[error("evaluator `{evaluator}`: could not parse judge reply at stage `{stage}`: {message}")]
	JudgeParse {
		evaluator: String,
		stage: &'static str,
		message: String,
	},

	#[error(
		"evaluator `{evaluator}` failed: score {score:.3} did not clear threshold {threshold:.3} ({reason})"
	)]
	AssertionFailed {
		evaluator: String,
		score: f64,
		threshold: f64,
		reason: String,
	},
}
