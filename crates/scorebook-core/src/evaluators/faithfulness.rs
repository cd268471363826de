use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use scorebook_types::{EvalResult, EvalTestCase, Field};

use crate::error::Result;
use crate::evaluator::{require, text_of, Evaluator};
use crate::judge::{ask, call, parse_reply, Judge};

/// Measures how well the actual output is supported by the context.
///
/// Three judge stages: extract atomic truths from the context, extract
/// atomic claims from the actual output, then verdict each claim against
/// the truths. Score = supported claims / total claims; zero claims is a
/// perfect 1.0 (nothing asserted, nothing unfaithful).
pub struct Faithfulness {
	judge: Arc<dyn Judge>,
	threshold: f64,
	include_reason: bool,
}

#[derive(Debug, Deserialize)]
struct ClaimVerdict {
	verdict: String,
	#[serde(default)]
	reasoning: Option<String>,
}

impl Faithfulness {
	pub fn new(judge: Arc<dyn Judge>) -> Self {
		Self {
			judge,
			threshold: 0.5,
			include_reason: true,
		}
	}

	pub fn with_threshold(mut self, threshold: f64) -> Self {
		self.threshold = threshold;
		self
	}

	pub fn with_reason(mut self, include_reason: bool) -> Self {
		self.include_reason = include_reason;
		self
	}

	async fn summarize(&self, verdicts: &[ClaimVerdict], score: f64) -> Result<String> {
		if !self.include_reason {
			return Ok("Reasoning was disabled".to_string());
		}
		let unsupported: Vec<&str> = verdicts
			.iter()
			.filter(|v| !v.verdict.trim().eq_ignore_ascii_case("yes"))
			.filter_map(|v| v.reasoning.as_deref())
			.collect();
		call(
			&self.judge,
			self.name(),
			"reason",
			&reason_prompt(score, &unsupported),
		)
		.await
	}
}

#[async_trait]
impl Evaluator for Faithfulness {
	fn name(&self) -> &str {
		"faithfulness"
	}

	fn threshold(&self) -> f64 {
		self.threshold
	}

	fn required_fields(&self) -> &[Field] {
		&[Field::Context, Field::ActualOutput]
	}

	async fn score(&self, test_case: &EvalTestCase) -> Result<EvalResult> {
		let context = text_of(require(self.name(), test_case, Field::Context)?);
		let actual = text_of(require(self.name(), test_case, Field::ActualOutput)?);

		let truths: Vec<String> =
			ask(&self.judge, self.name(), "truths", &truths_prompt(&context)).await?;
		let claims: Vec<String> =
			ask(&self.judge, self.name(), "claims", &claims_prompt(&actual)).await?;

		if claims.is_empty() {
			let reason = self.summarize(&[], 1.0).await?;
			return Ok(self.result(
				1.0,
				reason,
				Some(json!({
					"truths": truths.len(),
					"claims": 0,
					"supported": 0,
				})),
			));
		}

		// Verdict parsing is the one stage that falls back instead of
		// failing: an unparseable reply counts as zero supported claims.
		let raw = call(
			&self.judge,
			self.name(),
			"verdicts",
			&verdicts_prompt(&truths, &claims),
		)
		.await?;
		let verdicts: Vec<ClaimVerdict> =
			parse_reply(self.name(), "verdicts", &raw).unwrap_or_else(|err| {
				warn!(error = %err, "faithfulness verdicts unparseable, treating as unsupported");
				Vec::new()
			});

		let supported = verdicts
			.iter()
			.filter(|v| v.verdict.trim().eq_ignore_ascii_case("yes"))
			.count();
		let score = supported as f64 / claims.len() as f64;
		let reason = self.summarize(&verdicts, score).await?;

		Ok(self.result(
			score,
			reason,
			Some(json!({
				"truths": truths.len(),
				"claims": claims.len(),
				"supported": supported,
			})),
		))
	}
}

fn truths_prompt(context: &str) -> String {
	format!(
		"Extract every atomic factual statement from the following context. \
Reply with a JSON array of strings and nothing else.\n\nContext:\n{context}"
	)
}

fn claims_prompt(actual_output: &str) -> String {
	format!(
		"Extract every atomic claim asserted by the following text. \
Reply with a JSON array of strings and nothing else.\n\nText:\n{actual_output}"
	)
}

fn verdicts_prompt(truths: &[String], claims: &[String]) -> String {
	format!(
		"Given these established truths:\n{}\n\nFor each of the following claims, \
decide whether it is supported by the truths. Reply with a JSON array, one object \
per claim in order, shaped {{\"verdict\": \"Yes\"|\"No\"|\"IDK\", \"reasoning\": \"...\"}} \
and nothing else.\n\nClaims:\n{}",
		serde_json::to_string(truths).unwrap_or_default(),
		serde_json::to_string(claims).unwrap_or_default(),
	)
}

fn reason_prompt(score: f64, unsupported: &[&str]) -> String {
	format!(
		"A faithfulness evaluation scored {score:.2}. The following claims were \
not supported: {}. Summarize the result in one sentence.",
		serde_json::to_string(unsupported).unwrap_or_default(),
	)
}
