use std::future::Future;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{EvalError, Result};

/// Callback sending a prompt to a language model and returning its reply.
/// Evaluators assume, but do not enforce, JSON-shaped replies that may be
/// wrapped in a markdown code fence.
#[async_trait]
pub trait Judge: Send + Sync {
	async fn judge(&self, prompt: &str) -> AnyResult<String>;
}

/// Wrap an async closure as a [`Judge`].
pub fn from_judge_fn<F, Fut>(f: F) -> Arc<dyn Judge>
where
	F: Send + Sync + 'static + Fn(&str) -> Fut,
	Fut: Future<Output = AnyResult<String>> + Send + 'static,
{
	struct ClosureJudge<F, Fut>
	where
		F: Send + Sync + 'static + Fn(&str) -> Fut,
		Fut: Future<Output = AnyResult<String>> + Send + 'static,
	{
		f: F,
	}

	#[async_trait]
	impl<F, Fut> Judge for ClosureJudge<F, Fut>
	where
		F: Send + Sync + 'static + Fn(&str) -> Fut,
		Fut: Future<Output = AnyResult<String>> + Send + 'static,
	{
		async fn judge(&self, prompt: &str) -> AnyResult<String> {
			(self.f)(prompt).await
		}
	}

	Arc::new(ClosureJudge { f })
}

/// Strip a leading ```` ``` ````/```` ```json ```` line and a trailing
/// ```` ``` ```` line, if present. Applied once, before every strict JSON
/// parse of a judge reply.
pub fn strip_code_fences(text: &str) -> &str {
	let trimmed = text.trim();
	let Some(rest) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	// Drop the remainder of the fence line (a language tag like "json").
	let body = match rest.find('\n') {
		Some(idx) => &rest[idx + 1..],
		None => return trimmed,
	};
	let body = body.trim_end();
	let body = body.strip_suffix("```").unwrap_or(body);
	body.trim()
}

/// One judge call, with errors attributed to the calling evaluator and stage.
pub(crate) async fn call(
	judge: &Arc<dyn Judge>,
	evaluator: &str,
	stage: &'static str,
	prompt: &str,
) -> Result<String> {
	judge.judge(prompt).await.map_err(|err| EvalError::Judge {
		evaluator: evaluator.to_string(),
		stage,
		message: format!("{err:#}"),
	})
}

/// Strict JSON parse of a (fence-stripped) judge reply.
pub(crate) fn parse_reply<T: DeserializeOwned>(
	evaluator: &str,
	stage: &'static str,
	raw: &str,
) -> Result<T> {
	serde_json::from_str(strip_code_fences(raw)).map_err(|err| EvalError::JudgeParse {
		evaluator: evaluator.to_string(),
		stage,
		message: err.to_string(),
	})
}

/// Judge call followed by a strict parse, both attributed to one stage.
pub(crate) async fn ask<T: DeserializeOwned>(
	judge: &Arc<dyn Judge>,
	evaluator: &str,
	stage: &'static str,
	prompt: &str,
) -> Result<T> {
	let raw = call(judge, evaluator, stage, prompt).await?;
	parse_reply(evaluator, stage, &raw)
}
