use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use scorebook_types::{EvalResult, EvalTestCase, Field};

use crate::error::{EvalError, Result};
use crate::evaluator::{require, text_of, Evaluator};
use crate::judge::{ask, call, Judge};

/// Scores each retrieval-context chunk independently for relevance to the
/// input, then averages. An empty chunk collection is a distinguished 0.0.
pub struct ContextualRelevance {
	judge: Arc<dyn Judge>,
	threshold: f64,
	strict: bool,
	include_reason: bool,
}

#[derive(Debug, Deserialize)]
struct ChunkVerdict {
	score: Value,
	#[serde(default)]
	reason: String,
}

impl ContextualRelevance {
	pub fn new(judge: Arc<dyn Judge>) -> Self {
		Self {
			judge,
			threshold: 0.5,
			strict: false,
			include_reason: false,
		}
	}

	pub fn with_threshold(mut self, threshold: f64) -> Self {
		self.threshold = threshold;
		self
	}

	/// Strict mode forces the success threshold to 1.0, overriding any
	/// configured threshold.
	pub fn strict(mut self, strict: bool) -> Self {
		self.strict = strict;
		self
	}

	pub fn with_reason(mut self, include_reason: bool) -> Self {
		self.include_reason = include_reason;
		self
	}

	fn coerce_score(&self, raw: &Value) -> Result<f64> {
		let numeric = match raw {
			Value::Number(n) => n.as_f64(),
			Value::String(s) => s.trim().parse::<f64>().ok(),
			_ => None,
		};
		let score = numeric.ok_or_else(|| EvalError::JudgeParse {
			evaluator: self.name().to_string(),
			stage: "chunk_score",
			message: format!("score is not numeric: {raw}"),
		})?;
		Ok(score.clamp(0.0, 1.0))
	}

	async fn summarize(&self, scored: &[(String, f64, String)], mean: f64) -> Result<String> {
		if !self.include_reason {
			return Ok(format!(
				"mean relevance {mean:.2} over {} context chunks",
				scored.len()
			));
		}
		let mut highly = Vec::new();
		let mut partially = Vec::new();
		let mut irrelevant = Vec::new();
		for (chunk, score, _) in scored {
			if *score >= 0.7 {
				highly.push(chunk.as_str());
			} else if *score >= 0.3 {
				partially.push(chunk.as_str());
			} else {
				irrelevant.push(chunk.as_str());
			}
		}
		call(
			&self.judge,
			self.name(),
			"reason",
			&reason_prompt(mean, &highly, &partially, &irrelevant),
		)
		.await
	}
}

#[async_trait]
impl Evaluator for ContextualRelevance {
	fn name(&self) -> &str {
		"contextual_relevance"
	}

	fn threshold(&self) -> f64 {
		if self.strict {
			1.0
		} else {
			self.threshold
		}
	}

	fn required_fields(&self) -> &[Field] {
		&[Field::Input, Field::RetrievalContext]
	}

	async fn score(&self, test_case: &EvalTestCase) -> Result<EvalResult> {
		let input = text_of(require(self.name(), test_case, Field::Input)?);
		let context = require(self.name(), test_case, Field::RetrievalContext)?;
		let chunks: Vec<String> = match context {
			Value::Array(items) => items.iter().map(text_of).collect(),
			lone => vec![text_of(lone)],
		};

		if chunks.is_empty() {
			return Ok(self.result(
				0.0,
				"no retrieval context to score",
				Some(json!({ "chunks": [] })),
			));
		}

		let mut scored: Vec<(String, f64, String)> = Vec::with_capacity(chunks.len());
		for chunk in chunks {
			let verdict: ChunkVerdict = ask(
				&self.judge,
				self.name(),
				"chunk_score",
				&chunk_prompt(&input, &chunk),
			)
			.await?;
			let score = self.coerce_score(&verdict.score)?;
			scored.push((chunk, score, verdict.reason));
		}

		let mean = scored.iter().map(|(_, s, _)| s).sum::<f64>() / scored.len() as f64;
		let reason = self.summarize(&scored, mean).await?;
		let per_chunk: Vec<Value> = scored
			.iter()
			.map(|(chunk, score, reason)| {
				json!({ "chunk": chunk, "score": score, "reason": reason })
			})
			.collect();

		Ok(self.result(mean, reason, Some(json!({ "chunks": per_chunk }))))
	}
}

fn chunk_prompt(input: &str, chunk: &str) -> String {
	format!(
		"Rate how relevant the following context chunk is to the input on a \
continuous 0 to 1 scale. Reply with a JSON object shaped \
{{\"score\": <number>, \"reason\": \"...\"}} and nothing else.\n\n\
Input:\n{input}\n\nChunk:\n{chunk}"
	)
}

fn reason_prompt(mean: f64, highly: &[&str], partially: &[&str], irrelevant: &[&str]) -> String {
	format!(
		"A contextual relevance evaluation scored {mean:.2}. Highly relevant \
chunks: {}. Partially relevant chunks: {}. Irrelevant chunks: {}. \
Summarize the result in one sentence.",
		serde_json::to_string(highly).unwrap_or_default(),
		serde_json::to_string(partially).unwrap_or_default(),
		serde_json::to_string(irrelevant).unwrap_or_default(),
	)
}
