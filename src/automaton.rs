//! Per-tenant multi-pattern matcher cache. One worker task owns the compiled
//! automatons; builds and removals are fire-and-forget forwards from the
//! lexicon cache, matches carry a one-shot reply.

use std::collections::HashMap;

use aho_corasick::AhoCorasick;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{InterpretError, InterpretResult};
use crate::token::Token;

enum AutomatonRequest {
    Build { tenant: String, words: HashMap<String, Token> },
    Match { tenant: String, sentence: String, reply: oneshot::Sender<Option<Vec<Token>>> },
    Remove { tenant: String },
    Close,
}

struct TenantMatcher {
    machine: AhoCorasick,
    // Lowercased pattern words, index-aligned with the machine's pattern ids.
    patterns: Vec<String>,
    words: HashMap<String, Token>,
}

impl TenantMatcher {
    fn build(tenant: &str, words: HashMap<String, Token>) -> Option<TenantMatcher> {
        let patterns: Vec<String> = words
            .keys()
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();
        match AhoCorasick::new(&patterns) {
            Ok(machine) => {
                debug!(tenant = %tenant, patterns = patterns.len(), "automaton_build");
                Some(TenantMatcher { machine, patterns, words })
            }
            Err(err) => {
                // Keep whatever entry was there before; a broken build must
                // not take out a working matcher.
                error!(tenant = %tenant, error = %err, "automaton_build_failed");
                None
            }
        }
    }

    /// All overlapping matches resolved to stored tokens, ordered by
    /// (start, end). Positions are char indices into the original sentence;
    /// the word is the stored token's original-case form.
    fn find(&self, sentence: &str) -> Vec<Token> {
        let lowered = lower_preserving_len(sentence);
        let byte_starts: Vec<usize> = lowered.char_indices().map(|(b, _)| b).collect();
        let mut spans: Vec<(usize, usize, usize)> = self
            .machine
            .find_overlapping_iter(&lowered)
            .map(|m| (m.start(), m.end(), m.pattern().as_usize()))
            .collect();
        spans.sort_by_key(|&(start, end, _)| (start, end));

        let mut out = Vec::new();
        for (start, _, pattern) in spans {
            let word = &self.patterns[pattern];
            let Some(stored) = self.words.get(word) else { continue };
            let Ok(char_pos) = byte_starts.binary_search(&start) else { continue };
            out.push(Token {
                pos: char_pos,
                word: stored.word.clone(),
                nodes: stored.nodes.clone(),
            });
        }
        out
    }
}

/// Char-wise lowercase that keeps the char count stable so match offsets map
/// 1:1 onto the original sentence. Multi-char lowercase expansions are left
/// as-is.
pub(crate) fn lower_preserving_len(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        let mut lower = ch.to_lowercase();
        match (lower.next(), lower.next()) {
            (Some(l), None) => out.push(l),
            _ => out.push(ch),
        }
    }
    out
}

async fn run(mut rx: mpsc::UnboundedReceiver<AutomatonRequest>) {
    let mut store: HashMap<String, TenantMatcher> = HashMap::new();
    while let Some(req) = rx.recv().await {
        match req {
            AutomatonRequest::Build { tenant, words } => {
                if let Some(matcher) = TenantMatcher::build(&tenant, words) {
                    store.insert(tenant, matcher);
                }
            }
            AutomatonRequest::Match { tenant, sentence, reply } => {
                let result = store.get(&tenant).map(|m| m.find(&sentence));
                let _ = reply.send(result);
            }
            AutomatonRequest::Remove { tenant } => {
                if store.remove(&tenant).is_some() {
                    debug!(tenant = %tenant, "automaton_remove");
                }
            }
            AutomatonRequest::Close => break,
        }
    }
}

/// Owner of the automaton worker task.
pub struct AutomatonService {
    tx: mpsc::UnboundedSender<AutomatonRequest>,
    worker: JoinHandle<()>,
}

impl AutomatonService {
    pub fn start() -> AutomatonService {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(rx));
        AutomatonService { tx, worker }
    }

    pub fn handle(&self) -> AutomatonHandle {
        AutomatonHandle { tx: self.tx.clone() }
    }

    /// Close the mailbox and join the worker. Requests queued after the
    /// close marker are dropped; their callers see the stopped-service error.
    pub async fn stop(self) {
        let _ = self.tx.send(AutomatonRequest::Close);
        let _ = self.worker.await;
    }
}

#[derive(Clone)]
pub struct AutomatonHandle {
    tx: mpsc::UnboundedSender<AutomatonRequest>,
}

impl AutomatonHandle {
    /// Queue a rebuild for a tenant's word map. Fire-and-forget: build
    /// failures are logged by the owner and the previous entry persists.
    pub fn build(&self, tenant: &str, words: HashMap<String, Token>) {
        let _ = self.tx.send(AutomatonRequest::Build { tenant: tenant.to_string(), words });
    }

    /// Queue removal of a tenant's matcher. Fire-and-forget.
    pub fn remove(&self, tenant: &str) {
        let _ = self.tx.send(AutomatonRequest::Remove { tenant: tenant.to_string() });
    }

    /// Match a sentence against a tenant's automaton. `None` when no
    /// automaton exists for the tenant.
    pub async fn find(&self, tenant: &str, sentence: &str) -> InterpretResult<Option<Vec<Token>>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(AutomatonRequest::Match {
                tenant: tenant.to_string(),
                sentence: sentence.to_string(),
                reply,
            })
            .map_err(|_| InterpretError::ServiceStopped { service: "automaton" })?;
        rx.await.map_err(|_| InterpretError::ServiceStopped { service: "automaton" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ColumnNode;

    fn words() -> HashMap<String, Token> {
        let mut map = HashMap::new();
        map.insert(
            "cars".to_string(),
            Token::new(0, "cars", vec![ColumnNode { uid: "c1".into(), word: "cars".into(), name: "car".into(), ..Default::default() }.into()]),
        );
        map.insert("swift".to_string(), Token::new(0, "Swift", vec![]));
        map.insert(String::new(), Token::new(0, "", vec![]));
        map
    }

    #[tokio::test]
    async fn matches_lowercased_text_and_keeps_stored_case() {
        let svc = AutomatonService::start();
        let h = svc.handle();
        h.build("t1", words());
        let toks = h.find("t1", "SWIFT cars").await.unwrap().unwrap();
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[0].pos, 0);
        assert_eq!(toks[0].word, "Swift");
        assert_eq!(toks[1].pos, 6);
        assert_eq!(toks[1].word, "cars");
        svc.stop().await;
    }

    #[tokio::test]
    async fn char_positions_survive_multibyte_prefixes() {
        let svc = AutomatonService::start();
        let h = svc.handle();
        h.build("t1", words());
        let toks = h.find("t1", "écoute cars").await.unwrap().unwrap();
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].pos, 7);
        svc.stop().await;
    }

    #[tokio::test]
    async fn missing_tenant_and_removal_yield_none() {
        let svc = AutomatonService::start();
        let h = svc.handle();
        assert!(h.find("ghost", "cars").await.unwrap().is_none());
        h.build("t1", words());
        assert!(h.find("t1", "cars").await.unwrap().is_some());
        h.remove("t1");
        assert!(h.find("t1", "cars").await.unwrap().is_none());
        svc.stop().await;
    }

    #[tokio::test]
    async fn find_after_stop_reports_stopped_service() {
        let svc = AutomatonService::start();
        let h = svc.handle();
        svc.stop().await;
        let err = h.find("t1", "cars").await.unwrap_err();
        assert!(matches!(err, InterpretError::ServiceStopped { .. }));
    }
}
