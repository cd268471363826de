use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use scorebook_types::{EvalResult, EvalTestCase, Field};

use crate::error::Result;
use crate::evaluator::{require, text_of, Evaluator, ScoreDirection};
use crate::judge::{ask, Judge};

/// Fraction of the actual output's statements that are unsupported by the
/// context. Lower is better: success is `score <= threshold`.
pub struct Hallucination {
	judge: Arc<dyn Judge>,
	threshold: f64,
}

impl Hallucination {
	pub fn new(judge: Arc<dyn Judge>) -> Self {
		Self {
			judge,
			threshold: 0.5,
		}
	}

	pub fn with_threshold(mut self, threshold: f64) -> Self {
		self.threshold = threshold;
		self
	}
}

#[async_trait]
impl Evaluator for Hallucination {
	fn name(&self) -> &str {
		"hallucination"
	}

	fn threshold(&self) -> f64 {
		self.threshold
	}

	fn direction(&self) -> ScoreDirection {
		ScoreDirection::LowerIsBetter
	}

	fn required_fields(&self) -> &[Field] {
		&[Field::Context, Field::ActualOutput]
	}

	async fn score(&self, test_case: &EvalTestCase) -> Result<EvalResult> {
		let context = text_of(require(self.name(), test_case, Field::Context)?);
		let actual = text_of(require(self.name(), test_case, Field::ActualOutput)?);

		let statements: Vec<String> = ask(
			&self.judge,
			self.name(),
			"statements",
			&statements_prompt(&actual),
		)
		.await?;

		if statements.is_empty() {
			return Ok(self.result(
				0.0,
				"no statements to verify",
				Some(json!({
					"statements": 0,
					"unsupported": 0,
				})),
			));
		}

		// One batched call: a "no" verdict means the statement is not
		// supported by the context.
		let verdicts: Vec<String> = ask(
			&self.judge,
			self.name(),
			"verdicts",
			&verdicts_prompt(&context, &statements),
		)
		.await?;

		let unsupported = verdicts
			.iter()
			.filter(|v| v.trim().eq_ignore_ascii_case("no"))
			.count();
		let score = unsupported as f64 / statements.len() as f64;

		Ok(self.result(
			score,
			format!(
				"{unsupported} of {} statements are unsupported by the context",
				statements.len()
			),
			Some(json!({
				"statements": statements.len(),
				"unsupported": unsupported,
				"verdicts": verdicts,
			})),
		))
	}
}

fn statements_prompt(actual_output: &str) -> String {
	format!(
		"Decompose the following text into atomic statements. Reply with a \
JSON array of strings and nothing else.\n\nText:\n{actual_output}"
	)
}

fn verdicts_prompt(context: &str, statements: &[String]) -> String {
	format!(
		"Given this context:\n{context}\n\nFor each of the following statements, \
answer whether the context supports it. Reply with a JSON array of \"yes\" or \
\"no\" strings, one per statement in order, and nothing else.\n\nStatements:\n{}",
		serde_json::to_string(statements).unwrap_or_default(),
	)
}
