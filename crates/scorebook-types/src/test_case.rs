use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dataset::{Example, ValueMap};

/// Named field of an [`EvalTestCase`], resolved to a conventional key in
/// one of the three value maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
	/// `inputs["input"]` — the query or prompt under test.
	Input,
	/// `inputs["context"]` — ground-truth context supplied with the example.
	Context,
	/// `actual_outputs["output"]` — the task's answer.
	ActualOutput,
	/// `actual_outputs["retrieval_context"]` — what the task retrieved.
	RetrievalContext,
	/// `expected_outputs["output"]` — the reference answer (or set).
	ExpectedOutput,
}

impl Field {
	pub fn key(self) -> &'static str {
		match self {
			Field::Input => "input",
			Field::Context => "context",
			Field::ActualOutput => "output",
			Field::RetrievalContext => "retrieval_context",
			Field::ExpectedOutput => "output",
		}
	}
}

impl fmt::Display for Field {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			Field::Input => "input",
			Field::Context => "context",
			Field::ActualOutput => "actual output",
			Field::RetrievalContext => "retrieval context",
			Field::ExpectedOutput => "expected output",
		};
		f.write_str(label)
	}
}

/// The bundle handed to an evaluator: an [`Example`]'s inputs and expected
/// outputs merged with the actual outputs a task produced for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalTestCase {
	inputs: ValueMap,
	actual_outputs: ValueMap,
	expected_outputs: ValueMap,
	#[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
	metadata: ValueMap,
}

impl EvalTestCase {
	pub fn new(
		inputs: ValueMap,
		actual_outputs: ValueMap,
		expected_outputs: ValueMap,
		metadata: ValueMap,
	) -> Self {
		Self {
			inputs,
			actual_outputs,
			expected_outputs,
			metadata,
		}
	}

	/// Derive a test case from an example plus the task's actual outputs.
	pub fn from_example(example: &Example, actual_outputs: ValueMap) -> Self {
		Self {
			inputs: example.inputs().clone(),
			actual_outputs,
			expected_outputs: example.expected_outputs().clone(),
			metadata: example.metadata().clone(),
		}
	}

	/// Resolve a named field to its value, if present.
	pub fn get(&self, field: Field) -> Option<&Value> {
		let map = match field {
			Field::Input | Field::Context => &self.inputs,
			Field::ActualOutput | Field::RetrievalContext => &self.actual_outputs,
			Field::ExpectedOutput => &self.expected_outputs,
		};
		map.get(field.key())
	}

	pub fn input(&self) -> Option<&Value> {
		self.get(Field::Input)
	}

	pub fn context(&self) -> Option<&Value> {
		self.get(Field::Context)
	}

	pub fn actual_output(&self) -> Option<&Value> {
		self.get(Field::ActualOutput)
	}

	pub fn retrieval_context(&self) -> Option<&Value> {
		self.get(Field::RetrievalContext)
	}

	pub fn expected_output(&self) -> Option<&Value> {
		self.get(Field::ExpectedOutput)
	}

	pub fn inputs(&self) -> &ValueMap {
		&self.inputs
	}

	pub fn actual_outputs(&self) -> &ValueMap {
		&self.actual_outputs
	}

	pub fn expected_outputs(&self) -> &ValueMap {
		&self.expected_outputs
	}

	pub fn metadata(&self) -> &ValueMap {
		&self.metadata
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn from_example_merges_actual_outputs() {
		let example = Example::new(json!("q"), json!("a")).with_context(json!("ctx"));
		let mut actual = ValueMap::new();
		actual.insert("output".to_string(), json!("the answer"));
		actual.insert("retrieval_context".to_string(), json!(["doc1", "doc2"]));

		let tc = EvalTestCase::from_example(&example, actual);
		assert_eq!(tc.get(Field::Input), Some(&json!("q")));
		assert_eq!(tc.get(Field::Context), Some(&json!("ctx")));
		assert_eq!(tc.get(Field::ActualOutput), Some(&json!("the answer")));
		assert_eq!(tc.get(Field::ExpectedOutput), Some(&json!("a")));
		assert_eq!(
			tc.get(Field::RetrievalContext),
			Some(&json!(["doc1", "doc2"]))
		);
	}

	#[test]
	fn absent_fields_resolve_to_none() {
		let tc = EvalTestCase::from_example(&Example::new(json!("q"), json!("a")), ValueMap::new());
		assert_eq!(tc.get(Field::ActualOutput), None);
		assert_eq!(tc.get(Field::RetrievalContext), None);
		assert_eq!(tc.get(Field::Context), None);
	}
}
