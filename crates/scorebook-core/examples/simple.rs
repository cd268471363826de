use std::sync::Arc;

use scorebook_core::{
    from_async_fn, from_judge_fn, output_map, ContextualRelevance, Dataset, Evaluator, ExactMatch,
    Example, Experiment, RegexMatch,
};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dataset = Dataset::new(
        "greetings",
        vec![
            Example::new(json!("Hello"), json!("Hello World!")),
            Example::new(json!("Hi"), json!("Hi World!")),
        ],
    );

    // Task: append " World!" to any string input, and pretend we retrieved
    // one context chunk along the way.
    let task = from_async_fn(|example| {
        let input = example.input().cloned().unwrap_or_default();
        async move {
            let s = input.as_str().unwrap_or_default();
            let mut outputs = output_map(json!(format!("{s} World!")));
            outputs.insert(
                "retrieval_context".to_string(),
                json!([format!("greeting lore about {s}")]),
            );
            Ok(outputs)
        }
    });

    // A canned judge standing in for a language-model client.
    let judge = from_judge_fn(|_prompt| async {
        Ok(r#"{"score": 0.9, "reason": "chunk answers the question"}"#.to_string())
    });

    let evaluators: Vec<Arc<dyn Evaluator>> = vec![
        Arc::new(ExactMatch),
        Arc::new(RegexMatch::new(r"World!$")?),
        Arc::new(ContextualRelevance::new(judge)),
    ];

    let experiment = Experiment::builder("greeting-quality")
        .description("quickstart: deterministic task, two runs")
        .dataset(dataset)
        .task(task)
        .evaluators(evaluators)
        .runs(2)
        .parallelism(4)
        .build()?;

    let result = experiment.run().await?;
    println!("{}", result.summary_table());
    Ok(())
}
