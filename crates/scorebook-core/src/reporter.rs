use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use scorebook_types::{ItemResult, RunStatus};

/// Opaque identifier a reporter hands out for one run. Never reused across
/// runs by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle(String);

impl RunHandle {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn id(&self) -> &str {
		&self.0
	}
}

/// Boundary to the persistence/reporting subsystem.
///
/// The runner drives exactly this lifecycle per run: `start_run`, then
/// `report_item` for each item as it finishes, then `complete_run` with a
/// terminal status, then `flush` and `close` — unconditionally, even when
/// item processing raised. Batching is the reporter's private concern, as
/// is thread-safety when items arrive from concurrent workers.
#[async_trait]
pub trait Reporter: Send + Sync {
	async fn start_run(&self, name: &str, metadata: Option<&Value>) -> Result<RunHandle>;

	async fn report_item(&self, handle: &RunHandle, item: &ItemResult) -> Result<()>;

	async fn complete_run(&self, handle: &RunHandle, status: RunStatus) -> Result<()>;

	/// Blocks until pending work is delivered.
	async fn flush(&self) -> Result<()>;

	/// Releases resources, implicitly flushing.
	async fn close(&self) -> Result<()>;
}

/// Behaviorally transparent default reporter.
pub struct NoopReporter;

#[async_trait]
impl Reporter for NoopReporter {
	async fn start_run(&self, _name: &str, _metadata: Option<&Value>) -> Result<RunHandle> {
		Ok(RunHandle::new("noop"))
	}

	async fn report_item(&self, _handle: &RunHandle, _item: &ItemResult) -> Result<()> {
		Ok(())
	}

	async fn complete_run(&self, _handle: &RunHandle, _status: RunStatus) -> Result<()> {
		Ok(())
	}

	async fn flush(&self) -> Result<()> {
		Ok(())
	}

	async fn close(&self) -> Result<()> {
		Ok(())
	}
}
