use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use scorebook_types::{Example, ValueMap};

/// The external callback under test: maps an [`Example`] to its actual
/// outputs. May be blocking or network-bound; the harness imposes no
/// behavioral constraints of its own.
#[async_trait]
pub trait Task: Send + Sync {
	async fn run(&self, example: &Example) -> Result<ValueMap>;
}

/// Wrap an async closure as a `Task`.
pub fn from_async_fn<F, Fut>(f: F) -> Arc<dyn Task>
where
	F: Send + Sync + 'static + Fn(&Example) -> Fut,
	Fut: Future<Output = Result<ValueMap>> + Send + 'static,
{
	struct ClosureTask<F, Fut>
	where
		F: Send + Sync + 'static + Fn(&Example) -> Fut,
		Fut: Future<Output = Result<ValueMap>> + Send + 'static,
	{
		f: F,
	}

	#[async_trait]
	impl<F, Fut> Task for ClosureTask<F, Fut>
	where
		F: Send + Sync + 'static + Fn(&Example) -> Fut,
		Fut: Future<Output = Result<ValueMap>> + Send + 'static,
	{
		async fn run(&self, example: &Example) -> Result<ValueMap> {
			(self.f)(example).await
		}
	}

	Arc::new(ClosureTask { f })
}

/// Build an actual-outputs map holding just the conventional `"output"` key.
pub fn output_map(output: serde_json::Value) -> ValueMap {
	let mut map = ValueMap::new();
	map.insert("output".to_string(), output);
	map
}
