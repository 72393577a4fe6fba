//! Idle-expiry behavior of the lexicon cache, driven on a paused clock:
//! entries idle past the TTL are swept and their matching automata go with
//! them, while recently used entries keep their stamps fresh and survive.

use std::time::Duration;

use anyhow::Result;

use glossa::error::InterpretError;
use glossa::interpreter::{Interpreter, InterpreterOptions};
use glossa::lexicon::{Lexicon, LexiconConfig};
use glossa::node::ColumnNode;
use glossa::token::Token;

const SWEEP: Duration = Duration::from_secs(60);
const EXPIRY: Duration = Duration::from_secs(300);

fn tiny_lexicon() -> Lexicon {
    let car = ColumnNode { uid: "c-car".into(), word: "car".into(), name: "car".into(), ..Default::default() };
    let mut lx = Lexicon::new();
    lx.insert("car", Token::new(0, "car", vec![car.into()]));
    lx
}

fn short_lived_interpreter() -> Interpreter {
    Interpreter::start(InterpreterOptions {
        lexicon: LexiconConfig { sweep_interval: SWEEP, idle_expiry: EXPIRY },
        ..Default::default()
    })
}

/// Let the sweeper tick and the cache workers drain their mailboxes. On a
/// paused clock the sleep only completes once every woken task has gone idle
/// again, so sweeps enqueued by the tick are fully processed on return.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test(start_paused = true)]
async fn idle_lexicon_is_swept_with_its_automaton() -> Result<()> {
    let interpreter = short_lived_interpreter();
    interpreter.add_lexicon("demo", tiny_lexicon())?;
    assert!(!interpreter.tokenize("demo", "car").await?.is_empty());

    // Idle well past the TTL so an intervening sweep evicts the entry.
    tokio::time::advance(EXPIRY + SWEEP + Duration::from_secs(1)).await;
    settle().await;

    let err = interpreter.tokenize("demo", "car").await.unwrap_err();
    assert!(
        matches!(err, InterpretError::AutomatonMissing { ref tenant } if tenant == "demo"),
        "expected an automaton miss, got: {err}"
    );

    interpreter.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn recent_use_refreshes_the_idle_stamp() -> Result<()> {
    let interpreter = short_lived_interpreter();
    interpreter.add_lexicon("demo", tiny_lexicon())?;

    // Touch the entry just inside the TTL, repeatedly; sweeps run in between
    // but never find it idle long enough.
    for _ in 0..3 {
        tokio::time::advance(EXPIRY - SWEEP).await;
        settle().await;
        assert!(!interpreter.tokenize("demo", "car").await?.is_empty());
    }

    interpreter.stop().await;
    Ok(())
}
