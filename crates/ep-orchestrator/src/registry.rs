//! Completion registry
//!
//! Holds at most one [`PendingCompletion`] per [`OperationKind`]. A slot is
//! cleared the moment its completion is resolved or rejected, so a second
//! signal for the same kind finds nothing to resolve and is dropped.
//!
//! The registry has no locking of its own. The orchestrator keeps it behind
//! the same mutex as the session state and is its only writer.

use bytes::Bytes;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use ep_core::types::{CorrelationId, OperationKind, WifiNetwork};
use ep_core::ProvisionError;

/// Success payload of a pending completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Connected,
    Networks(Vec<WifiNetwork>),
    Provisioned,
    CustomData(Bytes),
}

/// Outcome delivered to the waiting caller
pub type CompletionResult = Result<Completion, ProvisionError>;

/// Receiving half held by the caller awaiting a completion
pub type CompletionReceiver = oneshot::Receiver<CompletionResult>;

/// Single-use placeholder awaiting exactly one resolution
#[derive(Debug)]
pub struct PendingCompletion {
    kind: OperationKind,
    correlation: CorrelationId,
    created_at: Instant,
    sender: Option<oneshot::Sender<CompletionResult>>,
}

impl PendingCompletion {
    /// Create a pending completion and the receiver its caller awaits
    pub fn new(kind: OperationKind) -> (Self, CompletionReceiver) {
        let (tx, rx) = oneshot::channel();
        let pending = Self {
            kind,
            correlation: CorrelationId::new(),
            created_at: Instant::now(),
            sender: Some(tx),
        };
        (pending, rx)
    }

    /// Operation kind
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Correlation ID
    pub fn correlation(&self) -> CorrelationId {
        self.correlation
    }

    /// When the completion was created
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// How long the completion has been outstanding
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Whether a result has already been delivered
    pub fn is_resolved(&self) -> bool {
        self.sender.is_none()
    }

    /// Deliver the result. Returns false if already resolved.
    fn complete(&mut self, result: CompletionResult) -> bool {
        match self.sender.take() {
            Some(tx) => {
                // A dropped receiver means the caller gave up; the slot is still spent
                if tx.send(result).is_err() {
                    tracing::debug!(kind = %self.kind, "Completion receiver already dropped");
                }
                true
            }
            None => false,
        }
    }
}

/// Pending completions keyed by operation kind
#[derive(Debug, Default)]
pub struct CompletionRegistry {
    slots: HashMap<OperationKind, PendingCompletion>,
}

impl CompletionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Register a pending completion.
    ///
    /// Fails with [`ProvisionError::AlreadyPending`] if one of the same kind
    /// is unresolved; the rejected completion is dropped.
    pub fn register(
        &mut self,
        pending: PendingCompletion,
    ) -> Result<CorrelationId, ProvisionError> {
        let kind = pending.kind();
        if self.is_pending(kind) {
            return Err(ProvisionError::AlreadyPending(kind));
        }

        let correlation = pending.correlation();
        tracing::debug!(%kind, %correlation, "Pending completion registered");
        self.slots.insert(kind, pending);
        Ok(correlation)
    }

    /// Fulfil the pending completion of `kind`, whatever its correlation.
    ///
    /// Returns false (and does nothing) if none is pending.
    pub fn resolve(&mut self, kind: OperationKind, value: Completion) -> bool {
        self.finish(kind, None, Ok(value))
    }

    /// Fail the pending completion of `kind`. Same semantics as [`resolve`](Self::resolve).
    pub fn reject(&mut self, kind: OperationKind, error: ProvisionError) -> bool {
        self.finish(kind, None, Err(error))
    }

    /// Fulfil only if the live completion carries `correlation`
    pub fn resolve_matching(
        &mut self,
        kind: OperationKind,
        correlation: CorrelationId,
        value: Completion,
    ) -> bool {
        self.finish(kind, Some(correlation), Ok(value))
    }

    /// Fail only if the live completion carries `correlation`
    pub fn reject_matching(
        &mut self,
        kind: OperationKind,
        correlation: CorrelationId,
        error: ProvisionError,
    ) -> bool {
        self.finish(kind, Some(correlation), Err(error))
    }

    /// Remove a completion without delivering anything to it
    pub fn take(
        &mut self,
        kind: OperationKind,
        correlation: CorrelationId,
    ) -> Option<PendingCompletion> {
        match self.slots.get(&kind) {
            Some(pending) if pending.correlation() == correlation => self.slots.remove(&kind),
            _ => None,
        }
    }

    /// Fail every pending completion, building each error from its kind.
    ///
    /// Returns how many were rejected.
    pub fn reject_all<F>(&mut self, mut error: F) -> usize
    where
        F: FnMut(OperationKind) -> ProvisionError,
    {
        let mut rejected = 0;
        for (kind, mut pending) in self.slots.drain() {
            if pending.complete(Err(error(kind))) {
                rejected += 1;
            }
        }
        rejected
    }

    /// Whether a completion of `kind` is outstanding
    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.slots.contains_key(&kind)
    }

    /// Correlation ID of the outstanding completion of `kind`
    pub fn correlation(&self, kind: OperationKind) -> Option<CorrelationId> {
        self.slots.get(&kind).map(|p| p.correlation())
    }

    /// Kinds with an outstanding completion, in a stable order
    pub fn pending_kinds(&self) -> Vec<OperationKind> {
        OperationKind::ALL
            .into_iter()
            .filter(|kind| self.slots.contains_key(kind))
            .collect()
    }

    /// Number of outstanding completions
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn finish(
        &mut self,
        kind: OperationKind,
        correlation: Option<CorrelationId>,
        result: CompletionResult,
    ) -> bool {
        let matches = match (self.slots.get(&kind), correlation) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(pending), Some(id)) => pending.correlation() == id,
        };
        if !matches {
            return false;
        }

        let Some(mut pending) = self.slots.remove(&kind) else {
            return false;
        };
        let outcome = if result.is_ok() { "resolved" } else { "rejected" };
        tracing::debug!(
            %kind,
            correlation = %pending.correlation(),
            elapsed = ?pending.age(),
            "Pending completion {}",
            outcome
        );
        pending.complete(result)
    }
}
