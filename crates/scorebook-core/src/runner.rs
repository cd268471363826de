use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use scorebook_types::{
	Dataset, EvalTestCase, ExperimentResult, ItemResult, RunResult, RunStatus,
};

use crate::evaluator::Evaluator;
use crate::reporter::{NoopReporter, Reporter, RunHandle};
use crate::task::Task;

pub struct ExperimentBuilder {
	name: String,
	description: Option<String>,
	metadata: Option<Value>,
	dataset: Option<Dataset>,
	task: Option<Arc<dyn Task>>,
	evaluators: Vec<Arc<dyn Evaluator>>,
	reporter: Arc<dyn Reporter>,
	runs: usize,
	parallelism: usize,
}

impl ExperimentBuilder {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			description: None,
			metadata: None,
			dataset: None,
			task: None,
			evaluators: Vec::new(),
			reporter: Arc::new(NoopReporter),
			runs: 1,
			parallelism: 1,
		}
	}

	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn metadata(mut self, metadata: Value) -> Self {
		self.metadata = Some(metadata);
		self
	}

	pub fn dataset(mut self, dataset: Dataset) -> Self {
		self.dataset = Some(dataset);
		self
	}

	pub fn task(mut self, task: Arc<dyn Task>) -> Self {
		self.task = Some(task);
		self
	}

	pub fn evaluators<I>(mut self, evaluators: I) -> Self
	where
		I: IntoIterator<Item = Arc<dyn Evaluator>>,
	{
		self.evaluators = evaluators.into_iter().collect();
		self
	}

	pub fn add_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
		self.evaluators.push(evaluator);
		self
	}

	pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
		self.reporter = reporter;
		self
	}

	/// Number of sequential passes over the dataset (default 1).
	pub fn runs(mut self, runs: usize) -> Self {
		self.runs = runs.max(1);
		self
	}

	/// Bounded concurrent item processing within one run (default 1). At
	/// parallelism > 1 the task and every evaluator must tolerate
	/// concurrent invocation; the runner adds no synchronization.
	pub fn parallelism(mut self, parallelism: usize) -> Self {
		self.parallelism = parallelism.max(1);
		self
	}

	pub fn build(self) -> Result<Experiment> {
		Ok(Experiment {
			name: self.name,
			description: self.description,
			metadata: self.metadata,
			dataset: self
				.dataset
				.ok_or_else(|| anyhow::anyhow!("dataset must be set"))?,
			task: self.task.ok_or_else(|| anyhow::anyhow!("task must be set"))?,
			evaluators: self.evaluators,
			reporter: self.reporter,
			runs: self.runs,
			parallelism: self.parallelism,
		})
	}
}

/// Drives Task × Dataset × Evaluators over one or more runs.
pub struct Experiment {
	name: String,
	description: Option<String>,
	metadata: Option<Value>,
	dataset: Dataset,
	task: Arc<dyn Task>,
	evaluators: Vec<Arc<dyn Evaluator>>,
	reporter: Arc<dyn Reporter>,
	runs: usize,
	parallelism: usize,
}

impl Experiment {
	pub fn builder(name: impl Into<String>) -> ExperimentBuilder {
		ExperimentBuilder::new(name)
	}

	/// Execute every configured run, strictly sequentially: run n+1 starts
	/// only after run n's reporter flush/close completed. Any unrecoverable
	/// failure aborts the remaining runs and propagates after cleanup.
	pub async fn run(&self) -> Result<ExperimentResult> {
		let mut runs = Vec::with_capacity(self.runs);
		for index in 0..self.runs {
			runs.push(self.run_once(index).await?);
		}
		Ok(ExperimentResult::new(
			self.name.clone(),
			self.description.clone(),
			self.metadata.clone(),
			runs,
		))
	}

	async fn run_once(&self, index: usize) -> Result<RunResult> {
		let handle = self
			.reporter
			.start_run(&self.name, self.metadata.as_ref())
			.await?;
		let started_at = Utc::now();
		debug!(run = index, handle = handle.id(), "run started");

		let outcome = self.process_items(&handle).await;
		let status = if outcome.is_ok() {
			RunStatus::Success
		} else {
			RunStatus::Failed
		};

		// The completion notification and flush/close happen no matter how
		// item processing ended.
		let cleanup: Result<()> = async {
			self.reporter.complete_run(&handle, status).await?;
			self.reporter.flush().await?;
			self.reporter.close().await
		}
		.await;

		match outcome {
			Ok(items) => {
				cleanup?;
				debug!(run = index, items = items.len(), "run completed");
				Ok(RunResult::new(items, status, started_at, Utc::now()))
			}
			Err(err) => {
				if let Err(cleanup_err) = cleanup {
					warn!(error = %cleanup_err, "reporter cleanup failed after run error");
				}
				Err(err)
			}
		}
	}

	async fn process_items(&self, handle: &RunHandle) -> Result<Vec<ItemResult>> {
		let task = self.task.clone();
		let evaluators = self.evaluators.clone();
		let reporter = self.reporter.clone();
		let handle = handle.clone();
		let stream = stream::iter(self.dataset.examples().to_vec()).map(move |example| {
			let task = task.clone();
			let evaluators = evaluators.clone();
			let reporter = reporter.clone();
			let handle = handle.clone();
			async move {
				let actual_outputs = task
					.run(&example)
					.await
					.context("task failed for example")?;
				let test_case = EvalTestCase::from_example(&example, actual_outputs.clone());
				let mut evals = Vec::with_capacity(evaluators.len());
				for evaluator in &evaluators {
					evals.push(evaluator.evaluate(&test_case).await?);
				}
				let item = ItemResult::new(example, actual_outputs, evals);
				reporter.report_item(&handle, &item).await?;
				Ok::<ItemResult, anyhow::Error>(item)
			}
		});

		// `buffered` keeps the collected items in dataset order; reporter
		// calls arrive in completion order, which coincides with dataset
		// order only at parallelism = 1.
		stream.buffered(self.parallelism).try_collect().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::EvalError;
	use crate::evaluators::exact::ExactMatch;
	use crate::evaluators::hallucination::Hallucination;
	use crate::judge::from_judge_fn;
	use crate::task::{from_async_fn, output_map};
	use scorebook_types::Example;
	use serde_json::json;
	use std::sync::Mutex;

	struct RecordingReporter {
		events: Mutex<Vec<String>>,
	}

	impl RecordingReporter {
		fn new() -> Arc<Self> {
			Arc::new(Self {
				events: Mutex::new(Vec::new()),
			})
		}

		fn events(&self) -> Vec<String> {
			self.events.lock().unwrap().clone()
		}

		fn record(&self, event: impl Into<String>) {
			self.events.lock().unwrap().push(event.into());
		}
	}

	#[async_trait::async_trait]
	impl Reporter for RecordingReporter {
		async fn start_run(&self, name: &str, _metadata: Option<&Value>) -> Result<RunHandle> {
			let id = format!("run-{}", self.events.lock().unwrap().len());
			self.record(format!("start:{name}"));
			Ok(RunHandle::new(id))
		}

		async fn report_item(&self, _handle: &RunHandle, item: &ItemResult) -> Result<()> {
			let input = item
				.example()
				.input()
				.and_then(|v| v.as_str().map(str::to_string))
				.unwrap_or_default();
			self.record(format!("item:{input}"));
			Ok(())
		}

		async fn complete_run(&self, _handle: &RunHandle, status: RunStatus) -> Result<()> {
			self.record(format!("complete:{status}"));
			Ok(())
		}

		async fn flush(&self) -> Result<()> {
			self.record("flush");
			Ok(())
		}

		async fn close(&self) -> Result<()> {
			self.record("close");
			Ok(())
		}
	}

	fn echo_task() -> Arc<dyn Task> {
		from_async_fn(|example| {
			let input = example.input().cloned().unwrap_or_default();
			async move { Ok(output_map(input)) }
		})
	}

	fn echo_dataset() -> Dataset {
		Dataset::new(
			"echo",
			vec![
				Example::new(json!("a"), json!("a")),
				Example::new(json!("b"), json!("b")),
				Example::new(json!("c"), json!("wrong")),
			],
		)
	}

	#[tokio::test]
	async fn reporter_sees_the_full_lifecycle_in_dataset_order() {
		let reporter = RecordingReporter::new();
		let experiment = Experiment::builder("echo-exp")
			.dataset(echo_dataset())
			.task(echo_task())
			.add_evaluator(Arc::new(ExactMatch))
			.reporter(reporter.clone())
			.build()
			.unwrap();

		let result = experiment.run().await.unwrap();
		assert_eq!(result.runs().len(), 1);
		assert_eq!(result.runs()[0].total(), 3);
		assert_eq!(result.runs()[0].passed(), 2);
		assert_eq!(result.runs()[0].status(), RunStatus::Success);
		assert_eq!(
			reporter.events(),
			vec![
				"start:echo-exp",
				"item:a",
				"item:b",
				"item:c",
				"complete:success",
				"flush",
				"close",
			]
		);
	}

	#[tokio::test]
	async fn failed_run_still_completes_and_flushes_the_reporter() {
		let reporter = RecordingReporter::new();
		let failing_task = from_async_fn(|example| {
			let input = example.input().cloned().unwrap_or_default();
			async move {
				if input == json!("b") {
					anyhow::bail!("boom");
				}
				Ok(output_map(input))
			}
		});
		let experiment = Experiment::builder("failing")
			.dataset(echo_dataset())
			.task(failing_task)
			.add_evaluator(Arc::new(ExactMatch))
			.reporter(reporter.clone())
			.build()
			.unwrap();

		let err = experiment.run().await.unwrap_err();
		assert!(format!("{err:#}").contains("boom"));
		let events = reporter.events();
		assert!(events.contains(&"complete:failed".to_string()));
		assert_eq!(events[events.len() - 2..].to_vec(), vec!["flush", "close"]);
	}

	#[tokio::test]
	async fn configuration_errors_are_not_caught_by_the_runner() {
		// Hallucination requires a context field this dataset never sets.
		let judge = from_judge_fn(|_| async { Ok("[]".to_string()) });
		let experiment = Experiment::builder("misconfigured")
			.dataset(echo_dataset())
			.task(echo_task())
			.add_evaluator(Arc::new(Hallucination::new(judge)))
			.build()
			.unwrap();

		let err = experiment.run().await.unwrap_err();
		let eval_err = err.downcast_ref::<EvalError>().expect("EvalError");
		assert!(matches!(eval_err, EvalError::MissingField { .. }));
	}

	#[tokio::test]
	async fn multiple_runs_are_sequential_and_aggregated() {
		let reporter = RecordingReporter::new();
		let experiment = Experiment::builder("repeated")
			.dataset(echo_dataset())
			.task(echo_task())
			.add_evaluator(Arc::new(ExactMatch))
			.reporter(reporter.clone())
			.runs(2)
			.build()
			.unwrap();

		let result = experiment.run().await.unwrap();
		assert_eq!(result.runs().len(), 2);
		// Deterministic task: identical per-run averages, zero deviation.
		assert!((result.average_score("exact_match").unwrap() - 2.0 / 3.0).abs() < 1e-9);
		assert_eq!(result.score_std_dev("exact_match"), Some(0.0));

		let starts = reporter
			.events()
			.iter()
			.filter(|e| e.starts_with("start:"))
			.count();
		assert_eq!(starts, 2);
		// Run 2 starts only after run 1's close.
		let events = reporter.events();
		let first_close = events.iter().position(|e| e == "close").unwrap();
		let second_start = events.iter().rposition(|e| e.starts_with("start:")).unwrap();
		assert!(second_start > first_close);
	}

	#[tokio::test]
	async fn parallel_items_keep_dataset_order_in_the_run_result() {
		let examples: Vec<Example> = (0..16)
			.map(|i| Example::new(json!(format!("q{i}")), json!(format!("q{i}"))))
			.collect();
		let experiment = Experiment::builder("parallel")
			.dataset(Dataset::new("wide", examples))
			.task(echo_task())
			.add_evaluator(Arc::new(ExactMatch))
			.parallelism(4)
			.build()
			.unwrap();

		let result = experiment.run().await.unwrap();
		let run = &result.runs()[0];
		assert_eq!(run.total(), 16);
		assert_eq!(run.passed(), 16);
		let inputs: Vec<String> = run
			.items()
			.iter()
			.filter_map(|i| i.example().input().and_then(|v| v.as_str().map(str::to_string)))
			.collect();
		let expected: Vec<String> = (0..16).map(|i| format!("q{i}")).collect();
		assert_eq!(inputs, expected);
	}

	#[tokio::test]
	async fn builder_fails_fast_on_missing_members() {
		assert!(Experiment::builder("no-task")
			.dataset(echo_dataset())
			.build()
			.is_err());
		assert!(Experiment::builder("no-dataset")
			.task(echo_task())
			.build()
			.is_err());
	}
}
