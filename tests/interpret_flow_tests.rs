//! End-to-end interpretation tests: question in, parameterized SQL out,
//! through the full tokenize -> rule pass -> compile path, including the
//! source-fallback load for tenants that were never added explicitly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use glossa::demo;
use glossa::interpreter::{Interpreter, InterpreterOptions};
use glossa::lexicon::{Lexicon, LexiconSource};
use glossa::query::SqlParam;

// The built-in automobile-sales knowledge base, the same one the CLI serves.
async fn started_with_fixture(tenant: &str) -> Result<Interpreter> {
    let interpreter = Interpreter::start(InterpreterOptions::default());
    interpreter.add_lexicon(tenant, demo::lexicon())?;
    Ok(interpreter)
}

#[tokio::test]
async fn known_value_filter_compiles_to_parameterized_sql() -> Result<()> {
    let interpreter = started_with_fixture("demo").await?;

    let query = interpreter.interpret_text("demo", "car is Swift").await?;
    let compiled = query.to_sql()?;
    assert_eq!(
        compiled.query,
        r#"SELECT "car" AS "car" FROM "automobile sales" WHERE "car" = $1"#
    );
    assert_eq!(compiled.params, vec![SqlParam::Text("'Swift'".into())]);

    interpreter.stop().await;
    Ok(())
}

#[tokio::test]
async fn noisy_question_still_selects_a_column() -> Result<()> {
    let interpreter = started_with_fixture("demo").await?;

    let tokens = interpreter.tokenize("demo", "show me the brands of with Swift cars").await?;
    assert!(!tokens.is_empty());

    let query = interpreter.interpret(&tokens)?;
    assert!(!query.select.is_empty(), "expected at least one select column");
    assert_eq!(query.filters.len(), 1);
    assert_eq!(
        query.group_by.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        vec!["brand"]
    );

    interpreter.stop().await;
    Ok(())
}

#[tokio::test]
async fn dimension_and_measure_group_and_aggregate() -> Result<()> {
    let interpreter = started_with_fixture("demo").await?;

    let compiled = interpreter.interpret_text("demo", "brand sales").await?.to_sql()?;
    assert_eq!(
        compiled.query,
        r#"SELECT SUM("sales") AS "sales", "brand" FROM "automobile sales" GROUP BY "brand""#
    );
    assert!(compiled.params.is_empty());

    interpreter.stop().await;
    Ok(())
}

#[tokio::test]
async fn repeated_questions_see_pristine_lexicon_state() -> Result<()> {
    let interpreter = started_with_fixture("demo").await?;

    // The first question resolves nodes; a later question over the same
    // cached lexicon must start from unresolved candidates again.
    let first = interpreter.interpret_text("demo", "car is Swift").await?.to_sql()?;
    let second = interpreter.interpret_text("demo", "car is Swift").await?.to_sql()?;
    assert_eq!(first, second);

    interpreter.stop().await;
    Ok(())
}

/// Counts fetches so tests can assert the cache only reaches for the source
/// on a miss.
struct CountingSource {
    calls: AtomicUsize,
}

#[async_trait]
impl LexiconSource for CountingSource {
    async fn fetch(&self, _tenant: &str) -> Result<Lexicon> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(demo::lexicon())
    }
}

#[tokio::test]
async fn unseen_tenant_loads_through_the_source_once() -> Result<()> {
    let source = Arc::new(CountingSource { calls: AtomicUsize::new(0) });
    let interpreter = Interpreter::start(InterpreterOptions {
        source: Some(source.clone() as Arc<dyn LexiconSource>),
        ..Default::default()
    });

    let compiled = interpreter.interpret_text("acme", "car is Swift").await?.to_sql()?;
    assert!(compiled.query.contains("WHERE"));
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    interpreter.interpret_text("acme", "brand sales").await?;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1, "second question must hit the cache");

    interpreter.stop().await;
    Ok(())
}
