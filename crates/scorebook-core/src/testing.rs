use std::sync::Arc;

use scorebook_types::{EvalTestCase, ExperimentResult};

use crate::error::{EvalError, Result};
use crate::evaluator::Evaluator;

/// Evaluate a test case against an ordered evaluator list and raise on the
/// first unsuccessful one, naming that evaluator with its score, threshold
/// and reason. Not a report of all failures.
///
/// Use this in your `#[tokio::test]` functions:
/// ```ignore
/// assert_eval(&test_case, &[Arc::new(ExactMatch), Arc::new(faithfulness)]).await?;
/// ```
pub async fn assert_eval(
	test_case: &EvalTestCase,
	evaluators: &[Arc<dyn Evaluator>],
) -> Result<()> {
	for evaluator in evaluators {
		let result = evaluator.evaluate(test_case).await?;
		if !result.success {
			return Err(EvalError::AssertionFailed {
				evaluator: result.evaluator,
				score: result.score,
				threshold: evaluator.threshold(),
				reason: result.reason,
			});
		}
	}
	Ok(())
}

/// Assert the experiment's pass rate meets a minimum.
pub fn assert_pass_rate(result: &ExperimentResult, min_pass_rate: f64) -> anyhow::Result<()> {
	if result.pass_rate() < min_pass_rate {
		anyhow::bail!(
			"evaluation failed: pass rate {:.1}% is below threshold {:.1}%\n{}",
			result.pass_rate() * 100.0,
			min_pass_rate * 100.0,
			result.summary_table()
		);
	}
	Ok(())
}

/// Assert every item in every run passed.
pub fn assert_all_passed(result: &ExperimentResult) -> anyhow::Result<()> {
	for run in result.runs() {
		if run.passed() != run.total() {
			anyhow::bail!(
				"evaluation failed: {}/{} items passed\n{}",
				run.passed(),
				run.total(),
				result.summary_table()
			);
		}
	}
	Ok(())
}
