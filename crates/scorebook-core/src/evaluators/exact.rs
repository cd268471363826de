use async_trait::async_trait;

use scorebook_types::{EvalResult, EvalTestCase, Field};

use crate::error::Result;
use crate::evaluator::{require, Evaluator};

/// Score 1.0 iff the actual output structurally equals the expected output.
pub struct ExactMatch;

#[async_trait]
impl Evaluator for ExactMatch {
	fn name(&self) -> &str {
		"exact_match"
	}

	fn required_fields(&self) -> &[Field] {
		&[Field::ActualOutput, Field::ExpectedOutput]
	}

	async fn score(&self, test_case: &EvalTestCase) -> Result<EvalResult> {
		let actual = require(self.name(), test_case, Field::ActualOutput)?;
		let expected = require(self.name(), test_case, Field::ExpectedOutput)?;
		let matched = actual == expected;
		let reason = if matched {
			"actual output equals expected output".to_string()
		} else {
			"actual output differs from expected output".to_string()
		};
		Ok(self.result(if matched { 1.0 } else { 0.0 }, reason, None))
	}
}
