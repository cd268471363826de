use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabled::Tabled;

use crate::dataset::{Example, ValueMap};

/// The verdict of one evaluator over one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
	pub evaluator: String,
	/// Always within `[0.0, 1.0]`.
	pub score: f64,
	/// Whether the score clears the evaluator's threshold; the comparison
	/// direction is the evaluator's own (lower-is-better for hallucination).
	pub success: bool,
	pub reason: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub metadata: Option<Value>,
}

/// One example's outcome across every configured evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
	example: Example,
	actual_outputs: ValueMap,
	evals: Vec<EvalResult>,
}

impl ItemResult {
	pub fn new(example: Example, actual_outputs: ValueMap, evals: Vec<EvalResult>) -> Self {
		Self {
			example,
			actual_outputs,
			evals,
		}
	}

	pub fn example(&self) -> &Example {
		&self.example
	}

	pub fn actual_outputs(&self) -> &ValueMap {
		&self.actual_outputs
	}

	pub fn evals(&self) -> &[EvalResult] {
		&self.evals
	}

	/// Logical AND over the eval results. An empty list is vacuously true.
	pub fn success(&self) -> bool {
		self.evals.iter().all(|e| e.success)
	}
}

/// Terminal status of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
	Success,
	Failed,
	Cancelled,
}

impl fmt::Display for RunStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RunStatus::Success => f.write_str("success"),
			RunStatus::Failed => f.write_str("failed"),
			RunStatus::Cancelled => f.write_str("cancelled"),
		}
	}
}

/// All item results from one pass over a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
	items: Vec<ItemResult>,
	status: RunStatus,
	started_at: DateTime<Utc>,
	finished_at: DateTime<Utc>,
}

impl RunResult {
	pub fn new(
		items: Vec<ItemResult>,
		status: RunStatus,
		started_at: DateTime<Utc>,
		finished_at: DateTime<Utc>,
	) -> Self {
		Self {
			items,
			status,
			started_at,
			finished_at,
		}
	}

	pub fn items(&self) -> &[ItemResult] {
		&self.items
	}

	pub fn status(&self) -> RunStatus {
		self.status
	}

	pub fn started_at(&self) -> DateTime<Utc> {
		self.started_at
	}

	pub fn finished_at(&self) -> DateTime<Utc> {
		self.finished_at
	}

	pub fn total(&self) -> usize {
		self.items.len()
	}

	pub fn passed(&self) -> usize {
		self.items.iter().filter(|i| i.success()).count()
	}

	pub fn pass_rate(&self) -> f64 {
		if self.items.is_empty() {
			0.0
		} else {
			self.passed() as f64 / self.items.len() as f64
		}
	}

	/// Flat mean over every raw score in this run, 0.0 when there are none.
	pub fn average_score(&self) -> f64 {
		let scores: Vec<f64> = self
			.items
			.iter()
			.flat_map(|i| i.evals().iter().map(|e| e.score))
			.collect();
		mean(&scores).unwrap_or(0.0)
	}

	/// Mean score for one evaluator name within this run. `None` when the
	/// name never appears, so an absent evaluator contributes nothing to
	/// cross-run aggregates instead of averaging in a silent zero.
	pub fn average_score_for(&self, evaluator: &str) -> Option<f64> {
		let scores: Vec<f64> = self
			.items
			.iter()
			.flat_map(|i| i.evals().iter())
			.filter(|e| e.evaluator == evaluator)
			.map(|e| e.score)
			.collect();
		mean(&scores)
	}

	pub fn evaluator_names(&self) -> BTreeSet<String> {
		self.items
			.iter()
			.flat_map(|i| i.evals().iter().map(|e| e.evaluator.clone()))
			.collect()
	}
}

/// Aggregate of one or more runs of the same experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
	name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	metadata: Option<Value>,
	runs: Vec<RunResult>,
}

#[derive(Tabled)]
struct SummaryRow {
	evaluator: String,
	avg_score: String,
	std_dev: String,
}

impl ExperimentResult {
	pub fn new(
		name: impl Into<String>,
		description: Option<String>,
		metadata: Option<Value>,
		runs: Vec<RunResult>,
	) -> Self {
		Self {
			name: name.into(),
			description,
			metadata,
			runs,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn description(&self) -> Option<&str> {
		self.description.as_deref()
	}

	pub fn metadata(&self) -> Option<&Value> {
		self.metadata.as_ref()
	}

	pub fn runs(&self) -> &[RunResult] {
		&self.runs
	}

	pub fn evaluator_names(&self) -> BTreeSet<String> {
		self.runs
			.iter()
			.flat_map(|r| r.evaluator_names())
			.collect()
	}

	/// Per-run average scores for an evaluator name, in run order. Runs in
	/// which the evaluator never scored are skipped.
	fn per_run_averages(&self, evaluator: &str) -> Vec<f64> {
		self.runs
			.iter()
			.filter_map(|r| r.average_score_for(evaluator))
			.collect()
	}

	/// Cross-run average for an evaluator: the mean of its per-run average
	/// scores (a two-level mean), never a flat mean over raw item scores.
	pub fn average_score(&self, evaluator: &str) -> Option<f64> {
		mean(&self.per_run_averages(evaluator))
	}

	/// Sample (n−1) standard deviation over the per-run average scores for
	/// an evaluator; 0.0 when only a single run contributed.
	pub fn score_std_dev(&self, evaluator: &str) -> Option<f64> {
		let averages = self.per_run_averages(evaluator);
		match averages.len() {
			0 => None,
			1 => Some(0.0),
			n => {
				let m = mean(&averages).unwrap_or(0.0);
				let var: f64 =
					averages.iter().map(|s| (s - m).powi(2)).sum::<f64>() / (n - 1) as f64;
				Some(var.sqrt())
			}
		}
	}

	/// Mean of per-run pass rates, consistent with the per-run score
	/// aggregation policy (not recomputed over a flattened item view).
	pub fn pass_rate(&self) -> f64 {
		let rates: Vec<f64> = self.runs.iter().map(|r| r.pass_rate()).collect();
		mean(&rates).unwrap_or(0.0)
	}

	/// Console rendering: one row per evaluator plus a footer line.
	pub fn summary_table(&self) -> String {
		use tabled::Table;
		let rows: Vec<SummaryRow> = self
			.evaluator_names()
			.into_iter()
			.map(|name| SummaryRow {
				avg_score: self
					.average_score(&name)
					.map(|s| format!("{s:.3}"))
					.unwrap_or_else(|| "-".to_string()),
				std_dev: self
					.score_std_dev(&name)
					.map(|s| format!("{s:.4}"))
					.unwrap_or_else(|| "-".to_string()),
				evaluator: name,
			})
			.collect();

		let table = Table::new(rows).to_string();
		let footer = format!(
			"Experiment: {}  Runs: {}  Pass rate: {:.1}%",
			self.name,
			self.runs.len(),
			self.pass_rate() * 100.0
		);
		format!("{table}\n\n{footer}\n")
	}
}

fn mean(values: &[f64]) -> Option<f64> {
	if values.is_empty() {
		None
	} else {
		Some(values.iter().sum::<f64>() / values.len() as f64)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn eval(name: &str, score: f64, success: bool) -> EvalResult {
		EvalResult {
			evaluator: name.to_string(),
			score,
			success,
			reason: String::new(),
			metadata: None,
		}
	}

	fn item(evals: Vec<EvalResult>) -> ItemResult {
		ItemResult::new(Example::new(json!("q"), json!("a")), ValueMap::new(), evals)
	}

	fn run(items: Vec<ItemResult>) -> RunResult {
		RunResult::new(items, RunStatus::Success, Utc::now(), Utc::now())
	}

	#[test]
	fn item_success_is_the_and_of_its_evals() {
		assert!(item(vec![eval("a", 1.0, true), eval("b", 0.9, true)]).success());
		assert!(!item(vec![eval("a", 1.0, true), eval("b", 0.1, false)]).success());
		assert!(item(vec![]).success());
	}

	#[test]
	fn run_pass_rate_and_average() {
		let r = run(vec![
			item(vec![eval("accuracy", 1.0, true)]),
			item(vec![eval("accuracy", 0.5, false)]),
		]);
		assert_eq!(r.total(), 2);
		assert_eq!(r.passed(), 1);
		assert!((r.pass_rate() - 0.5).abs() < 1e-9);
		assert!((r.average_score() - 0.75).abs() < 1e-9);
	}

	#[test]
	fn cross_run_mean_and_std_dev_over_per_run_averages() {
		// Per-run averages 0.8 and 0.6.
		let result = ExperimentResult::new(
			"exp",
			None,
			None,
			vec![
				run(vec![item(vec![eval("accuracy", 0.8, true)])]),
				run(vec![item(vec![eval("accuracy", 0.6, true)])]),
			],
		);
		let avg = result.average_score("accuracy").unwrap();
		let sd = result.score_std_dev("accuracy").unwrap();
		assert!((avg - 0.7).abs() < 1e-9);
		assert!((sd - 0.1414).abs() < 1e-3);
	}

	#[test]
	fn two_level_mean_is_not_a_flat_mean() {
		// Run 1 holds three items at 1.0, run 2 one item at 0.0. A flat
		// mean over items would be 0.75; the per-run mean must be 0.5.
		let result = ExperimentResult::new(
			"exp",
			None,
			None,
			vec![
				run(vec![
					item(vec![eval("m", 1.0, true)]),
					item(vec![eval("m", 1.0, true)]),
					item(vec![eval("m", 1.0, true)]),
				]),
				run(vec![item(vec![eval("m", 0.0, false)])]),
			],
		);
		assert!((result.average_score("m").unwrap() - 0.5).abs() < 1e-9);
	}

	#[test]
	fn single_run_std_dev_is_zero() {
		let result = ExperimentResult::new(
			"exp",
			None,
			None,
			vec![run(vec![item(vec![eval("accuracy", 0.8, true)])])],
		);
		assert_eq!(result.score_std_dev("accuracy"), Some(0.0));
	}

	#[test]
	fn missing_evaluator_contributes_nothing() {
		// "recall" only ran in the second run; its aggregate must ignore
		// the first run instead of averaging in a zero.
		let result = ExperimentResult::new(
			"exp",
			None,
			None,
			vec![
				run(vec![item(vec![eval("precision", 1.0, true)])]),
				run(vec![item(vec![
					eval("precision", 0.5, true),
					eval("recall", 0.9, true),
				])]),
			],
		);
		assert!((result.average_score("recall").unwrap() - 0.9).abs() < 1e-9);
		assert_eq!(result.average_score("f1"), None);
		assert_eq!(result.score_std_dev("f1"), None);
	}

	#[test]
	fn multi_run_pass_rate_averages_per_run_rates() {
		let result = ExperimentResult::new(
			"exp",
			None,
			None,
			vec![
				run(vec![
					item(vec![eval("m", 1.0, true)]),
					item(vec![eval("m", 0.0, false)]),
				]),
				run(vec![item(vec![eval("m", 1.0, true)])]),
			],
		);
		// (0.5 + 1.0) / 2, not 2/3 over the flattened items.
		assert!((result.pass_rate() - 0.75).abs() < 1e-9);
	}

	#[test]
	fn summary_table_renders() {
		let result = ExperimentResult::new(
			"exp",
			None,
			None,
			vec![run(vec![item(vec![eval("accuracy", 0.8, true)])])],
		);
		let table = result.summary_table();
		assert!(table.contains("accuracy"));
		assert!(table.contains("0.800"));
		assert!(table.contains("Pass rate: 100.0%"));
	}
}
