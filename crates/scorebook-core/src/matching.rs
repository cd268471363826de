use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Pluggable equivalence test for the set-overlap evaluators: decides
/// whether a retrieved item counts as a match for an expected item.
///
/// A pure `(retrieved, expected) → bool` capability value; compose with
/// [`MatchingStrategy::any_of`] / [`MatchingStrategy::all_of`]. Semantic
/// (e.g. model-backed) equivalence plugs in through `from_fn`.
#[derive(Clone)]
pub struct MatchingStrategy {
	f: Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>,
}

impl MatchingStrategy {
	pub fn from_fn(f: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static) -> Self {
		Self { f: Arc::new(f) }
	}

	/// Structural JSON equality.
	pub fn equality() -> Self {
		Self::from_fn(|retrieved, expected| retrieved == expected)
	}

	/// String comparison ignoring ASCII case; non-string pairs fall back to
	/// structural equality.
	pub fn string_case_insensitive() -> Self {
		Self::from_fn(|retrieved, expected| match (retrieved, expected) {
			(Value::String(r), Value::String(e)) => r.eq_ignore_ascii_case(e),
			(r, e) => r == e,
		})
	}

	/// The retrieved string contains the expected string as a substring.
	pub fn contains() -> Self {
		Self::from_fn(|retrieved, expected| match (retrieved, expected) {
			(Value::String(r), Value::String(e)) => r.contains(e.as_str()),
			(r, e) => r == e,
		})
	}

	/// Matches when any inner strategy matches.
	pub fn any_of(strategies: Vec<MatchingStrategy>) -> Self {
		Self::from_fn(move |retrieved, expected| {
			strategies.iter().any(|s| s.matches(retrieved, expected))
		})
	}

	/// Matches only when every inner strategy matches.
	pub fn all_of(strategies: Vec<MatchingStrategy>) -> Self {
		Self::from_fn(move |retrieved, expected| {
			strategies.iter().all(|s| s.matches(retrieved, expected))
		})
	}

	pub fn matches(&self, retrieved: &Value, expected: &Value) -> bool {
		(self.f)(retrieved, expected)
	}
}

impl fmt::Debug for MatchingStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("MatchingStrategy")
	}
}
