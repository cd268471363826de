use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;

use scorebook_types::{EvalResult, EvalTestCase, Field};

use crate::error::{EvalError, Result};

/// Which way an evaluator's threshold comparison points. A fixed property
/// of the evaluator, not caller-configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreDirection {
    /// `success = score >= threshold` (the default).
    HigherIsBetter,
    /// `success = score <= threshold` (hallucination).
    LowerIsBetter,
}

/// Scoring strategy: [`EvalTestCase`] → [`EvalResult`].
///
/// `evaluate` is the sole entry point; its provided body validates every
/// field the evaluator declares in `required_fields` exactly once, then
/// delegates to the per-evaluator `score`. Implementations override `score`
/// and never see incomplete data.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    fn threshold(&self) -> f64 {
        0.5
    }

    fn direction(&self) -> ScoreDirection {
        ScoreDirection::HigherIsBetter
    }

    /// Fields that must be present and non-null before `score` runs.
    fn required_fields(&self) -> &[Field];

    /// The scoring algorithm. Called only after required-field validation.
    async fn score(&self, test_case: &EvalTestCase) -> Result<EvalResult>;

    async fn evaluate(&self, test_case: &EvalTestCase) -> Result<EvalResult> {
        for &field in self.required_fields() {
            if test_case.get(field).map_or(true, Value::is_null) {
                return Err(EvalError::MissingField {
                    evaluator: self.name().to_string(),
                    field,
                });
            }
        }
        self.score(test_case).await
    }

    /// Applies this evaluator's threshold in its own direction.
    fn passes(&self, score: f64) -> bool {
        match self.direction() {
            ScoreDirection::HigherIsBetter => score >= self.threshold(),
            ScoreDirection::LowerIsBetter => score <= self.threshold(),
        }
    }

    /// Assemble an [`EvalResult`] for a score, deriving the success flag.
    fn result(&self, score: f64, reason: impl Into<String>, metadata: Option<Value>) -> EvalResult
    where
        Self: Sized,
    {
        EvalResult {
            evaluator: self.name().to_string(),
            score,
            success: self.passes(score),
            reason: reason.into(),
            metadata,
        }
    }
}

/// Submit an evaluation to the runtime and hand back a future.
///
/// A pure decorator over [`Evaluator::evaluate`]: scoring semantics and the
/// error taxonomy are unchanged. Aborting the returned handle does not
/// interrupt a judge call already in flight.
pub fn spawn_evaluate(
    evaluator: Arc<dyn Evaluator>,
    test_case: EvalTestCase,
) -> JoinHandle<Result<EvalResult>> {
    tokio::spawn(async move { evaluator.evaluate(&test_case).await })
}

/// Fetch a field, treating absent and null alike. The trait-level
/// validation already guarantees presence for declared fields; scorers use
/// this to borrow the value without unwrapping.
pub(crate) fn require<'a>(
    name: &str,
    test_case: &'a EvalTestCase,
    field: Field,
) -> Result<&'a Value> {
    test_case
        .get(field)
        .filter(|v| !v.is_null())
        .ok_or_else(|| EvalError::MissingField {
            evaluator: name.to_string(),
            field,
        })
}

/// Render a value as plain text: strings verbatim, anything else as JSON.
pub(crate) fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorebook_types::ValueMap;
    use serde_json::json;

    struct FixedScore {
        value: f64,
    }

    #[async_trait]
    impl Evaluator for FixedScore {
        fn name(&self) -> &str {
            "fixed"
        }

        fn required_fields(&self) -> &[Field] {
            &[Field::ActualOutput]
        }

        async fn score(&self, _tc: &EvalTestCase) -> Result<EvalResult> {
            Ok(self.result(self.value, "fixed", None))
        }
    }

    fn case_with_output(output: Value) -> EvalTestCase {
        let mut actual = ValueMap::new();
        actual.insert("output".to_string(), output);
        EvalTestCase::new(ValueMap::new(), actual, ValueMap::new(), ValueMap::new())
    }

    #[tokio::test]
    async fn missing_required_field_fails_before_scoring() {
        let tc = EvalTestCase::new(
            ValueMap::new(),
            ValueMap::new(),
            ValueMap::new(),
            ValueMap::new(),
        );
        let err = FixedScore { value: 1.0 }.evaluate(&tc).await.unwrap_err();
        match err {
            EvalError::MissingField { evaluator, field } => {
                assert_eq!(evaluator, "fixed");
                assert_eq!(field, Field::ActualOutput);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn null_counts_as_missing() {
        let tc = case_with_output(Value::Null);
        assert!(FixedScore { value: 1.0 }.evaluate(&tc).await.is_err());
    }

    #[tokio::test]
    async fn success_follows_threshold() {
        let tc = case_with_output(json!("x"));
        let result = FixedScore { value: 0.6 }.evaluate(&tc).await.unwrap();
        assert!(result.success);
        let result = FixedScore { value: 0.4 }.evaluate(&tc).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn spawn_evaluate_preserves_semantics() {
        let tc = case_with_output(json!("x"));
        let handle = spawn_evaluate(Arc::new(FixedScore { value: 0.9 }), tc);
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.evaluator, "fixed");
        assert!(result.success);
    }
}
