//! End-to-end recommendation run.
//!
//! Requires `OPENAI_API_KEY` and `SQLREC_QUERY_URL` (base URL of a JSON SQL
//! endpoint). `SQLREC_API_BASE` and `SQLREC_MODEL` optionally point the
//! completion service at another OpenAI-compatible backend.
//!
//! ```text
//! cargo run --example recommend -- 42 5
//! ```

use sqlrec::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let api_key = std::env::var("OPENAI_API_KEY")?;
    let query_url = std::env::var("SQLREC_QUERY_URL")?;

    let mut args = std::env::args().skip(1);
    let user_id: i64 = args.next().as_deref().unwrap_or("1").parse()?;
    let top_k: u32 = args.next().as_deref().unwrap_or("5").parse()?;

    let mut completion = OpenAiCompletion::builder().api_key(api_key).temperature(0.0);
    if let Ok(api_base) = std::env::var("SQLREC_API_BASE") {
        completion = completion.api_base(api_base);
    }
    if let Ok(model) = std::env::var("SQLREC_MODEL") {
        completion = completion.model(model);
    }

    let query = HttpQueryService::builder()
        .base_url(query_url)
        .timeout(Duration::from_secs(30))
        .build()?;

    let attempt_log = Arc::new(AttemptLogPlugin::new());
    let recommender = Recommender::builder(completion.build()?, query)
        .completion_layer(RetryLayer::new().with_max_retries(2))
        .completion_layer(LoggingLayer::new())
        .query_layer(LoggingLayer::new())
        .plugin(attempt_log.clone())
        .call_timeout(Duration::from_secs(45))
        .finish();

    let session = recommender.session();
    let outcome = session
        .recommend(RecommendationRequest::new(user_id, top_k)?)
        .await?;

    println!("=== Recommendation for user {} ===\n", user_id);
    match &outcome.error {
        None => {
            let source = outcome.source.map(|s| s.as_str()).unwrap_or("unknown");
            println!("Program ids ({} stage): {:?}", source, outcome.recommended_ids);
        }
        Some(error) => println!("No recommendation: {}", error),
    }

    if let Some(sql) = &outcome.last_sql {
        println!("\nLast SQL:\n{}", sql);
    }

    println!("\nAttempts:");
    for attempt in &outcome.attempts {
        println!(
            "  - {}: {}",
            attempt.stage,
            attempt.failure.as_deref().unwrap_or("ok")
        );
    }
    println!(
        "\nFailures: simple={}, guided={}, fallback={}",
        attempt_log.failures(Stage::Simple),
        attempt_log.failures(Stage::Guided),
        attempt_log.failures(Stage::Fallback)
    );

    Ok(())
}
