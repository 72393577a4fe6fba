//! Interpreter facade. Owns the two cache services, the time recognizer and
//! the rule engine, and exposes the boundary operations: tokenize a tenant's
//! question, interpret the token stream into a Query, manage rules, stop.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::warn;

use crate::automaton::{AutomatonHandle, AutomatonService};
use crate::datetime::{TimeRecognizer, TimeSpan, RECOGNITION_TIMEOUT};
use crate::error::{InterpretError, InterpretResult};
use crate::lexicon::{Lexicon, LexiconConfig, LexiconHandle, LexiconService, LexiconSource};
use crate::query::Query;
use crate::rules::{Rule, RuleEngine, RuleInfo};
use crate::token::FastToken;
use crate::tokenize::{fast_tokens, merge_time_spans, renumber, synthesize_unknowns};

/// Construction options. The source feeds lexicon cache misses; the
/// recognizer extracts time expressions. Either can be absent, degrading to
/// miss-is-not-found and no time entities respectively.
#[derive(Default)]
pub struct InterpreterOptions {
    pub lexicon: LexiconConfig,
    pub source: Option<Arc<dyn LexiconSource>>,
    pub recognizer: Option<Arc<dyn TimeRecognizer>>,
}

pub struct Interpreter {
    automaton_service: AutomatonService,
    lexicon_service: LexiconService,
    automata: AutomatonHandle,
    lexicons: LexiconHandle,
    recognizer: Option<Arc<dyn TimeRecognizer>>,
    engine: RwLock<RuleEngine>,
}

impl Interpreter {
    /// Spawn the worker services and install the default rule set. Must run
    /// inside a tokio runtime.
    pub fn start(options: InterpreterOptions) -> Interpreter {
        let automaton_service = AutomatonService::start();
        let automata = automaton_service.handle();
        let lexicon_service = LexiconService::start(options.source, automata.clone(), options.lexicon);
        let lexicons = lexicon_service.handle();
        Interpreter {
            automaton_service,
            lexicon_service,
            automata,
            lexicons,
            recognizer: options.recognizer,
            engine: RwLock::new(RuleEngine::with_default_rules()),
        }
    }

    /// Push a tenant's lexicon; the matching automaton rebuilds in the
    /// background.
    pub fn add_lexicon(&self, tenant: &str, lexicon: Lexicon) -> InterpretResult<()> {
        self.lexicons.add(tenant, lexicon)
    }

    /// Deep copy of a tenant's cached lexicon, loading through the source on
    /// miss.
    pub async fn lexicon(&self, tenant: &str) -> InterpretResult<Option<Lexicon>> {
        self.lexicons.get(tenant).await
    }

    /// Tokenize a sentence for a tenant. Time recognition runs concurrently
    /// with the cache round-trips and merges in before unknown words are
    /// synthesized; recognition failure or timeout degrades to a stream
    /// without time entities.
    pub async fn tokenize(&self, tenant: &str, sentence: &str) -> InterpretResult<Vec<FastToken>> {
        let recognition = self.spawn_recognition(sentence);

        self.lexicons.warm(tenant).await?;
        let toks = match self.automata.find(tenant, sentence).await? {
            Some(toks) => toks,
            None => return Err(InterpretError::automaton_missing(tenant)),
        };

        let spans = match recognition {
            Some(task) => await_recognition(task).await,
            None => Vec::new(),
        };

        let toks = merge_time_spans(toks, &spans);
        let mut toks = synthesize_unknowns(sentence, toks);
        renumber(&mut toks);
        Ok(fast_tokens(&toks))
    }

    /// Run the rule pass over a token stream.
    pub fn interpret(&self, tokens: &[FastToken]) -> InterpretResult<Query> {
        Ok(self.engine.write().interpret(tokens))
    }

    /// Tokenize then interpret in one step.
    pub async fn interpret_text(&self, tenant: &str, sentence: &str) -> InterpretResult<Query> {
        let tokens = self.tokenize(tenant, sentence).await?;
        self.interpret(&tokens)
    }

    pub fn register_rule(&self, group: usize, tag: &str, rule: Rule) {
        self.engine.write().register(group, tag, rule);
    }

    pub fn set_rule_disabled(&self, group: usize, index: usize, disabled: bool) -> bool {
        self.engine.write().set_disabled(group, index, disabled)
    }

    pub fn rules(&self) -> Vec<RuleInfo> {
        self.engine.read().rules()
    }

    /// Stop both services: the lexicon worker first, since it forwards build
    /// and removal requests into the automaton mailbox.
    pub async fn stop(self) {
        self.lexicon_service.stop().await;
        self.automaton_service.stop().await;
    }

    fn spawn_recognition(&self, sentence: &str) -> Option<JoinHandle<anyhow::Result<Vec<TimeSpan>>>> {
        let recognizer = self.recognizer.clone()?;
        let text = sentence.to_string();
        Some(tokio::spawn(async move { recognizer.parse(&text).await }))
    }
}

async fn await_recognition(task: JoinHandle<anyhow::Result<Vec<TimeSpan>>>) -> Vec<TimeSpan> {
    match timeout(RECOGNITION_TIMEOUT, task).await {
        Ok(Ok(Ok(spans))) => spans,
        Ok(Ok(Err(err))) => {
            warn!(error = %err, "time recognition failed; continuing without time entities");
            Vec::new()
        }
        Ok(Err(err)) => {
            warn!(error = %err, "time recognition task aborted; continuing without time entities");
            Vec::new()
        }
        Err(_) => {
            warn!("time recognition timed out; continuing without time entities");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    #[tokio::test]
    async fn rule_management_reaches_the_engine() {
        let interpreter = Interpreter::start(InterpreterOptions::default());

        let before = interpreter.rules().len();
        interpreter.register_rule(
            7,
            "custom",
            Rule::new("noop", "does nothing", vec![NodeKind::Unknown], |_, _, _| Ok(())),
        );
        assert_eq!(interpreter.rules().len(), before + 1);
        assert!(interpreter.set_rule_disabled(7, 0, true));
        assert!(interpreter.rules().iter().any(|r| r.name == "noop" && r.disabled));

        interpreter.stop().await;
    }

    #[tokio::test]
    async fn tokenize_without_lexicon_is_an_automaton_miss() {
        let interpreter = Interpreter::start(InterpreterOptions::default());
        let err = interpreter.tokenize("ghost", "anything").await.unwrap_err();
        assert!(matches!(err, InterpretError::AutomatonMissing { .. }));
        interpreter.stop().await;
    }
}
