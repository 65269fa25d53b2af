//! Post-commit side effects.
//!
//! Fire-and-forget is an explicit queue here, not an un-awaited future:
//! the mutation path submits to a bounded channel and returns immediately;
//! a background worker drains the channel and calls the collaborator hooks.
//! A full queue or a failing hook is logged and dropped — it never unwinds
//! or delays the committed mutation that triggered it.
//!
//! ```text
//! Order Service ──try_send──▶ EffectsQueue ──recv──▶ EffectsWorker ──▶ hooks
//!      │ (never blocks, never fails the mutation)        │
//!      └──────────── response to terminal                └─ errors → log
//! ```

pub mod hooks;

use std::sync::Arc;

use shared::RoutingManifest;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use hooks::{Catalog, InventoryHook, MenuItemInfo, NullHooks, SaleLine, StaticCatalog, TicketHook, TipsHook};

/// One unit of deferred work.
#[derive(Debug, Clone)]
pub enum SideEffect {
    DeductForSale { lines: Vec<SaleLine> },
    AllocateTips { payment_id: String },
    EmitTicket { manifest: RoutingManifest },
}

impl SideEffect {
    fn name(&self) -> &'static str {
        match self {
            SideEffect::DeductForSale { .. } => "deduct_for_sale",
            SideEffect::AllocateTips { .. } => "allocate_tips",
            SideEffect::EmitTicket { .. } => "emit_ticket",
        }
    }
}

/// Submission handle held by the order service.
#[derive(Debug, Clone)]
pub struct EffectsQueue {
    tx: mpsc::Sender<SideEffect>,
}

impl EffectsQueue {
    /// Submit without blocking. A full queue drops the effect with an error
    /// log; the triggering mutation has already committed and stays
    /// committed.
    pub fn submit(&self, effect: SideEffect) {
        if let Err(e) = self.tx.try_send(effect) {
            let effect = match &e {
                mpsc::error::TrySendError::Full(eff) | mpsc::error::TrySendError::Closed(eff) => {
                    eff.name()
                }
            };
            tracing::error!(effect = %effect, error = %e, "Side effect dropped");
        }
    }
}

/// The collaborator hooks the worker calls into.
pub struct EffectHooks {
    pub inventory: Arc<dyn InventoryHook>,
    pub tips: Arc<dyn TipsHook>,
    pub tickets: Arc<dyn TicketHook>,
}

impl EffectHooks {
    /// All hooks wired to no-ops.
    pub fn null() -> Self {
        let hooks = Arc::new(NullHooks);
        Self {
            inventory: hooks.clone(),
            tips: hooks.clone(),
            tickets: hooks,
        }
    }
}

/// Background worker draining the effects queue.
pub struct EffectsWorker {
    rx: mpsc::Receiver<SideEffect>,
    hooks: EffectHooks,
    shutdown: CancellationToken,
}

impl EffectsWorker {
    /// Build a queue/worker pair with the given capacity.
    pub fn new(
        capacity: usize,
        hooks: EffectHooks,
        shutdown: CancellationToken,
    ) -> (EffectsQueue, EffectsWorker) {
        let (tx, rx) = mpsc::channel(capacity);
        (EffectsQueue { tx }, EffectsWorker { rx, hooks, shutdown })
    }

    /// Drain until shutdown. Hook failures are logged, never propagated.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Effects worker shutting down");
                    break;
                }
                effect = self.rx.recv() => {
                    let Some(effect) = effect else { break };
                    self.execute(effect).await;
                }
            }
        }
    }

    async fn execute(&self, effect: SideEffect) {
        let name = effect.name();
        let result = match effect {
            SideEffect::DeductForSale { lines } => self.hooks.inventory.deduct_for_sale(lines).await,
            SideEffect::AllocateTips { payment_id } => self.hooks.tips.allocate_tips(payment_id).await,
            SideEffect::EmitTicket { manifest } => self.hooks.tickets.emit_ticket(manifest).await,
        };
        if let Err(e) = result {
            tracing::error!(effect = %name, error = %e, "Side effect failed");
        } else {
            tracing::debug!(effect = %name, "Side effect completed");
        }
    }
}
