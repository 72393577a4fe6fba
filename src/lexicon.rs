//! Tenant lexicon cache: a single worker task owns the tenant -> lexicon map,
//! refreshes last-used stamps, falls back to a pluggable source on miss, and
//! evicts idle entries on a periodic sweep (cascading the removal to the
//! automaton cache).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
// Stamps use the tokio clock so tests can drive eviction with paused time.
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::automaton::AutomatonHandle;
use crate::error::{InterpretError, InterpretResult};
use crate::token::Token;

/// Sweep cadence and idle TTL defaults.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(20 * 60);
pub const IDLE_EXPIRY: Duration = Duration::from_secs(4 * 60 * 60);

/// A tenant's word -> token map plus the stamp the sweeper evicts on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lexicon {
    #[serde(skip, default = "Instant::now")]
    pub last_used: Instant,
    pub map: HashMap<String, Token>,
}

impl Default for Lexicon {
    fn default() -> Lexicon {
        Lexicon { last_used: Instant::now(), map: HashMap::new() }
    }
}

impl Lexicon {
    pub fn new() -> Lexicon {
        Lexicon::default()
    }

    /// Insert a token under its lowercased word. The automaton matches
    /// lowercased text, so keys must be stored that way to resolve.
    pub fn insert(&mut self, word: &str, token: Token) {
        self.map.insert(word.to_lowercase(), token);
    }

    /// Deep copy: every candidate node lands in a fresh cell, so callers can
    /// never mutate cached state through the result.
    pub fn deep_copy(&self) -> Lexicon {
        Lexicon {
            last_used: self.last_used,
            map: self.map.iter().map(|(k, v)| (k.clone(), v.deep_copy())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// External capability that supplies a tenant's lexicon on cache miss.
#[async_trait]
pub trait LexiconSource: Send + Sync + 'static {
    async fn fetch(&self, tenant: &str) -> anyhow::Result<Lexicon>;
}

#[derive(Debug, Clone, Copy)]
pub struct LexiconConfig {
    pub sweep_interval: Duration,
    pub idle_expiry: Duration,
}

impl Default for LexiconConfig {
    fn default() -> LexiconConfig {
        LexiconConfig { sweep_interval: SWEEP_INTERVAL, idle_expiry: IDLE_EXPIRY }
    }
}

enum LexiconRequest {
    Add { tenant: String, lexicon: Lexicon },
    Get { tenant: String, reply: oneshot::Sender<Option<Lexicon>> },
    Warm { tenant: String, reply: oneshot::Sender<bool> },
    Sweep,
    Close,
}

/// Load-or-fetch shared by Get and Warm. A hit refreshes the stamp; a miss
/// goes to the source, and a fetched lexicon is stored and forwarded for an
/// automaton build just like an explicit add.
async fn ensure_loaded(
    store: &mut HashMap<String, Lexicon>,
    source: Option<&dyn LexiconSource>,
    automata: &AutomatonHandle,
    tenant: &str,
) -> bool {
    if let Some(lx) = store.get_mut(tenant) {
        lx.last_used = Instant::now();
        return true;
    }
    let Some(src) = source else { return false };
    match src.fetch(tenant).await {
        Ok(mut lexicon) => {
            lexicon.last_used = Instant::now();
            automata.build(tenant, lexicon.map.clone());
            debug!(tenant = %tenant, words = lexicon.map.len(), "lexicon_source_load");
            store.insert(tenant.to_string(), lexicon);
            true
        }
        Err(err) => {
            warn!(tenant = %tenant, error = %err, "lexicon_source_failed");
            false
        }
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<LexiconRequest>,
    source: Option<Arc<dyn LexiconSource>>,
    automata: AutomatonHandle,
    idle_expiry: Duration,
) {
    let mut store: HashMap<String, Lexicon> = HashMap::new();
    while let Some(req) = rx.recv().await {
        match req {
            LexiconRequest::Add { tenant, mut lexicon } => {
                lexicon.last_used = Instant::now();
                automata.build(&tenant, lexicon.map.clone());
                debug!(tenant = %tenant, words = lexicon.map.len(), "lexicon_add");
                store.insert(tenant, lexicon);
            }
            LexiconRequest::Get { tenant, reply } => {
                let found = ensure_loaded(&mut store, source.as_deref(), &automata, &tenant).await;
                let copy = if found { store.get(&tenant).map(Lexicon::deep_copy) } else { None };
                let _ = reply.send(copy);
            }
            LexiconRequest::Warm { tenant, reply } => {
                let found = ensure_loaded(&mut store, source.as_deref(), &automata, &tenant).await;
                let _ = reply.send(found);
            }
            LexiconRequest::Sweep => {
                let now = Instant::now();
                let expired: Vec<String> = store
                    .iter()
                    .filter(|(_, lx)| now.duration_since(lx.last_used) >= idle_expiry)
                    .map(|(tenant, _)| tenant.clone())
                    .collect();
                for tenant in &expired {
                    store.remove(tenant);
                    automata.remove(tenant);
                }
                if !expired.is_empty() {
                    debug!(removed = expired.len(), "lexicon_sweep");
                }
            }
            LexiconRequest::Close => break,
        }
    }
}

/// Owner of the lexicon worker task and its sweep ticker.
pub struct LexiconService {
    tx: mpsc::UnboundedSender<LexiconRequest>,
    worker: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

impl LexiconService {
    pub fn start(
        source: Option<Arc<dyn LexiconSource>>,
        automata: AutomatonHandle,
        config: LexiconConfig,
    ) -> LexiconService {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(rx, source, automata, config.idle_expiry));
        let sweeper = {
            let tx = tx.clone();
            let every = config.sweep_interval;
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(every).await;
                    if tx.send(LexiconRequest::Sweep).is_err() {
                        break;
                    }
                }
            })
        };
        LexiconService { tx, worker, sweeper }
    }

    pub fn handle(&self) -> LexiconHandle {
        LexiconHandle { tx: self.tx.clone() }
    }

    /// Stop the ticker, close the mailbox and join the worker.
    pub async fn stop(self) {
        self.sweeper.abort();
        let _ = self.tx.send(LexiconRequest::Close);
        let _ = self.worker.await;
    }
}

#[derive(Clone)]
pub struct LexiconHandle {
    tx: mpsc::UnboundedSender<LexiconRequest>,
}

impl LexiconHandle {
    /// Replace a tenant's lexicon. The owner stamps it and forwards a
    /// fire-and-forget automaton build.
    pub fn add(&self, tenant: impl Into<String>, lexicon: Lexicon) -> InterpretResult<()> {
        self.tx
            .send(LexiconRequest::Add { tenant: tenant.into(), lexicon })
            .map_err(|_| InterpretError::ServiceStopped { service: "lexicon" })
    }

    /// Deep copy of a tenant's lexicon, loading through the source on miss.
    pub async fn get(&self, tenant: &str) -> InterpretResult<Option<Lexicon>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LexiconRequest::Get { tenant: tenant.to_string(), reply })
            .map_err(|_| InterpretError::ServiceStopped { service: "lexicon" })?;
        rx.await.map_err(|_| InterpretError::ServiceStopped { service: "lexicon" })
    }

    /// Ensure a tenant is loaded (and its automaton build forwarded) without
    /// paying for a copy. Returns presence.
    pub async fn warm(&self, tenant: &str) -> InterpretResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LexiconRequest::Warm { tenant: tenant.to_string(), reply })
            .map_err(|_| InterpretError::ServiceStopped { service: "lexicon" })?;
        rx.await.map_err(|_| InterpretError::ServiceStopped { service: "lexicon" })
    }

    /// Run an eviction pass now; the ticker sends the same request on its
    /// cadence.
    pub fn sweep(&self) -> InterpretResult<()> {
        self.tx
            .send(LexiconRequest::Sweep)
            .map_err(|_| InterpretError::ServiceStopped { service: "lexicon" })
    }
}
