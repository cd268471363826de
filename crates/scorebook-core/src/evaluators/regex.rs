use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde_json::json;

use scorebook_types::{EvalResult, EvalTestCase, Field};

use crate::error::{EvalError, Result};
use crate::evaluator::{require, text_of, Evaluator};

/// Score 1.0 iff the actual output contains a match of the pattern
/// (a search, not a full match).
#[derive(Debug)]
pub struct RegexMatch {
	pattern: Regex,
	pattern_str: String,
	case_insensitive: bool,
}

impl RegexMatch {
	pub fn new(pattern: &str) -> Result<Self> {
		Self::build(pattern, false)
	}

	pub fn case_insensitive(pattern: &str) -> Result<Self> {
		Self::build(pattern, true)
	}

	fn build(pattern: &str, case_insensitive: bool) -> Result<Self> {
		let regex = RegexBuilder::new(pattern)
			.case_insensitive(case_insensitive)
			.build()
			.map_err(|err| EvalError::Config {
				evaluator: "regex_match".to_string(),
				message: format!("invalid pattern `{pattern}`: {err}"),
			})?;
		Ok(Self {
			pattern: regex,
			pattern_str: pattern.to_string(),
			case_insensitive,
		})
	}
}

#[async_trait]
impl Evaluator for RegexMatch {
	fn name(&self) -> &str {
		"regex_match"
	}

	fn required_fields(&self) -> &[Field] {
		&[Field::ActualOutput]
	}

	async fn score(&self, test_case: &EvalTestCase) -> Result<EvalResult> {
		let output = text_of(require(self.name(), test_case, Field::ActualOutput)?);
		let matched = self.pattern.is_match(&output);
		let reason = if matched {
			format!("output contains a match of `{}`", self.pattern_str)
		} else {
			format!("output contains no match of `{}`", self.pattern_str)
		};
		Ok(self.result(
			if matched { 1.0 } else { 0.0 },
			reason,
			Some(json!({
				"pattern": self.pattern_str,
				"case_insensitive": self.case_insensitive,
				"matches": matched,
			})),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use scorebook_types::ValueMap;
	use serde_json::{json, Value};

	fn case(actual: Value) -> EvalTestCase {
		let mut actual_outputs = ValueMap::new();
		actual_outputs.insert("output".to_string(), actual);
		EvalTestCase::new(ValueMap::new(), actual_outputs, ValueMap::new(), ValueMap::new())
	}

	#[tokio::test]
	async fn matches_anywhere_in_the_output() {
		let scorer = RegexMatch::new(r"capital.*Paris").unwrap();
		let result = scorer
			.evaluate(&case(json!("The capital of France is Paris.")))
			.await
			.unwrap();
		assert_eq!(result.score, 1.0);
		assert!(result.success);
	}

	#[tokio::test]
	async fn no_match_scores_zero() {
		let scorer = RegexMatch::new(r"London").unwrap();
		let result = scorer
			.evaluate(&case(json!("The capital of France is Paris.")))
			.await
			.unwrap();
		assert_eq!(result.score, 0.0);
		assert!(!result.success);
	}

	#[tokio::test]
	async fn case_insensitive_flag() {
		let scorer = RegexMatch::case_insensitive(r"paris").unwrap();
		let result = scorer.evaluate(&case(json!("PARIS"))).await.unwrap();
		assert_eq!(result.score, 1.0);

		let strict = RegexMatch::new(r"paris").unwrap();
		let result = strict.evaluate(&case(json!("PARIS"))).await.unwrap();
		assert_eq!(result.score, 0.0);
	}

	#[tokio::test]
	async fn non_string_outputs_are_serialized() {
		let scorer = RegexMatch::new(r#"\"answer\":42"#).unwrap();
		let result = scorer.evaluate(&case(json!({"answer": 42}))).await.unwrap();
		assert_eq!(result.score, 1.0);
	}

	#[test]
	fn invalid_pattern_is_a_config_error() {
		match RegexMatch::new("(unclosed") {
			Err(EvalError::Config { evaluator, .. }) => assert_eq!(evaluator, "regex_match"),
			other => panic!("unexpected: {other:?}"),
		}
	}
}
