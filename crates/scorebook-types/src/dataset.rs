use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// String-keyed mapping of dynamically-typed values. Used for example
/// inputs, expected outputs, actual outputs, and metadata alike.
pub type ValueMap = BTreeMap<String, Value>;

/// One input/expected-output/metadata triple, owned by a [`Dataset`].
///
/// Immutable after construction: the builder-style `with_*` methods consume
/// `self` and are meant for construction sites (parsers, fixtures), not for
/// mutating a dataset in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
	inputs: ValueMap,
	expected_outputs: ValueMap,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	metadata: ValueMap,
}

impl Example {
	/// Conventional constructor: one `"input"` and one expected `"output"`.
	pub fn new(input: Value, expected_output: Value) -> Self {
		let mut inputs = ValueMap::new();
		inputs.insert("input".to_string(), input);
		let mut expected_outputs = ValueMap::new();
		expected_outputs.insert("output".to_string(), expected_output);
		Self {
			inputs,
			expected_outputs,
			metadata: ValueMap::new(),
		}
	}

	pub fn from_maps(inputs: ValueMap, expected_outputs: ValueMap, metadata: ValueMap) -> Self {
		Self {
			inputs,
			expected_outputs,
			metadata,
		}
	}

	pub fn with_input_field(mut self, key: impl Into<String>, value: Value) -> Self {
		self.inputs.insert(key.into(), value);
		self
	}

	pub fn with_expected_field(mut self, key: impl Into<String>, value: Value) -> Self {
		self.expected_outputs.insert(key.into(), value);
		self
	}

	pub fn with_metadata_field(mut self, key: impl Into<String>, value: Value) -> Self {
		self.metadata.insert(key.into(), value);
		self
	}

	/// Shorthand for setting the conventional `"context"` input field.
	pub fn with_context(self, context: Value) -> Self {
		self.with_input_field("context", context)
	}

	/// The conventional `"input"` field, if present.
	pub fn input(&self) -> Option<&Value> {
		self.inputs.get("input")
	}

	/// The conventional expected `"output"` field, if present.
	pub fn expected_output(&self) -> Option<&Value> {
		self.expected_outputs.get("output")
	}

	pub fn inputs(&self) -> &ValueMap {
		&self.inputs
	}

	pub fn expected_outputs(&self) -> &ValueMap {
		&self.expected_outputs
	}

	pub fn metadata(&self) -> &ValueMap {
		&self.metadata
	}
}

/// Named, ordered, immutable sequence of [`Example`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
	name: String,
	examples: Vec<Example>,
}

impl Dataset {
	pub fn new(name: impl Into<String>, examples: Vec<Example>) -> Self {
		Self {
			name: name.into(),
			examples,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn examples(&self) -> &[Example] {
		&self.examples
	}

	pub fn iter(&self) -> std::slice::Iter<'_, Example> {
		self.examples.iter()
	}

	pub fn len(&self) -> usize {
		self.examples.len()
	}

	pub fn is_empty(&self) -> bool {
		self.examples.is_empty()
	}
}

impl<'a> IntoIterator for &'a Dataset {
	type Item = &'a Example;
	type IntoIter = std::slice::Iter<'a, Example>;

	fn into_iter(self) -> Self::IntoIter {
		self.examples.iter()
	}
}
