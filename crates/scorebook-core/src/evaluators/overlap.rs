use async_trait::async_trait;
use serde_json::{json, Value};

use scorebook_types::{EvalResult, EvalTestCase, Field};

use crate::error::Result;
use crate::evaluator::{require, Evaluator};
use crate::matching::MatchingStrategy;

/// Treat a single item as a one-element collection.
fn as_items(value: &Value) -> Vec<Value> {
	match value {
		Value::Array(items) => items.clone(),
		other => vec![other.clone()],
	}
}

/// Fraction of retrieved items that match at least one expected item.
///
/// Reads the retrieved set from [`Field::RetrievalContext`] and the
/// ground-truth set from [`Field::ExpectedOutput`]; equivalence is decided
/// by the configured [`MatchingStrategy`].
pub struct Precision {
	strategy: MatchingStrategy,
	threshold: f64,
}

impl Precision {
	pub fn new(strategy: MatchingStrategy) -> Self {
		Self {
			strategy,
			threshold: 0.5,
		}
	}

	pub fn with_threshold(mut self, threshold: f64) -> Self {
		self.threshold = threshold;
		self
	}
}

#[async_trait]
impl Evaluator for Precision {
	fn name(&self) -> &str {
		"precision"
	}

	fn threshold(&self) -> f64 {
		self.threshold
	}

	fn required_fields(&self) -> &[Field] {
		&[Field::RetrievalContext, Field::ExpectedOutput]
	}

	async fn score(&self, test_case: &EvalTestCase) -> Result<EvalResult> {
		let retrieved = as_items(require(self.name(), test_case, Field::RetrievalContext)?);
		let expected = as_items(require(self.name(), test_case, Field::ExpectedOutput)?);

		if retrieved.is_empty() {
			return Ok(self.result(
				1.0,
				"no retrieved items, so no false positives",
				Some(json!({
					"retrieved": 0,
					"expected": expected.len(),
					"true_positives": 0,
				})),
			));
		}

		let true_positives = retrieved
			.iter()
			.filter(|r| expected.iter().any(|e| self.strategy.matches(r, e)))
			.count();
		let score = true_positives as f64 / retrieved.len() as f64;
		Ok(self.result(
			score,
			format!(
				"{true_positives} of {} retrieved items match an expected item",
				retrieved.len()
			),
			Some(json!({
				"retrieved": retrieved.len(),
				"expected": expected.len(),
				"true_positives": true_positives,
			})),
		))
	}
}

/// Fraction of expected items matched by at least one retrieved item.
pub struct Recall {
	strategy: MatchingStrategy,
	threshold: f64,
}

impl Recall {
	pub fn new(strategy: MatchingStrategy) -> Self {
		Self {
			strategy,
			threshold: 0.5,
		}
	}

	pub fn with_threshold(mut self, threshold: f64) -> Self {
		self.threshold = threshold;
		self
	}
}

#[async_trait]
impl Evaluator for Recall {
	fn name(&self) -> &str {
		"recall"
	}

	fn threshold(&self) -> f64 {
		self.threshold
	}

	fn required_fields(&self) -> &[Field] {
		&[Field::RetrievalContext, Field::ExpectedOutput]
	}

	async fn score(&self, test_case: &EvalTestCase) -> Result<EvalResult> {
		let retrieved = as_items(require(self.name(), test_case, Field::RetrievalContext)?);
		let expected = as_items(require(self.name(), test_case, Field::ExpectedOutput)?);

		if expected.is_empty() {
			return Ok(self.result(
				1.0,
				"no expected items, nothing to miss",
				Some(json!({
					"retrieved": retrieved.len(),
					"expected": 0,
					"true_positives": 0,
				})),
			));
		}

		let true_positives = expected
			.iter()
			.filter(|e| retrieved.iter().any(|r| self.strategy.matches(r, e)))
			.count();
		let score = true_positives as f64 / expected.len() as f64;
		Ok(self.result(
			score,
			format!(
				"{true_positives} of {} expected items were retrieved",
				expected.len()
			),
			Some(json!({
				"retrieved": retrieved.len(),
				"expected": expected.len(),
				"true_positives": true_positives,
			})),
		))
	}
}
