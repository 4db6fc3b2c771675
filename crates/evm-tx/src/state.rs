//! Transaction flow state machine
//!
//! ```text
//! input -> approving -> approved -> executing -> success
//!   |                                   |------> unconfirmed
//!   '-------------------------------->  |------> error
//! approving/approved ---------------------------> error
//! error --(retry)--> input
//! ```

use std::fmt;

use alloy_primitives::TxHash;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::classify::TxError;
use crate::FlowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    Input,
    Approving,
    Approved,
    Executing,
    Success,
    /// Broadcast but not seen mined within the polling budget
    Unconfirmed,
    Error,
}

impl FlowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Approving => "approving",
            Self::Approved => "approved",
            Self::Executing => "executing",
            Self::Success => "success",
            Self::Unconfirmed => "unconfirmed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Unconfirmed | Self::Error)
    }

    /// Forward edges of the flow graph. `Error -> Input` is only taken by retry.
    pub fn can_advance_to(&self, next: FlowStep) -> bool {
        use FlowStep::*;
        matches!(
            (self, next),
            (Input, Approving)
                | (Input, Executing)
                | (Approving, Approved)
                | (Approving, Error)
                | (Approved, Executing)
                | (Approved, Error)
                | (Executing, Success)
                | (Executing, Unconfirmed)
                | (Executing, Error)
        )
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable state of one user action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionState {
    pub step: FlowStep,
    pub needs_approval: bool,
    /// Approvals sent in the current attempt
    pub approval_hashes: Vec<TxHash>,
    pub action_hash: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TxError>,
    /// Steps visited in the current attempt, starting with `input`
    pub history: Vec<FlowStep>,
    /// Every hash broadcast for this flow, across retries
    pub observed_hashes: Vec<TxHash>,
    /// An orchestrator is working on this flow
    pub active: bool,
}

impl Default for TransactionState {
    fn default() -> Self {
        Self {
            step: FlowStep::Input,
            needs_approval: false,
            approval_hashes: Vec::new(),
            action_hash: None,
            error: None,
            history: vec![FlowStep::Input],
            observed_hashes: Vec::new(),
            active: false,
        }
    }
}

impl TransactionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, next: FlowStep) -> Result<(), FlowError> {
        if !self.step.can_advance_to(next) {
            return Err(FlowError::InvalidTransition {
                from: self.step,
                to: next,
            });
        }
        self.step = next;
        self.history.push(next);
        if next.is_terminal() {
            self.active = false;
        }
        Ok(())
    }

    /// Move to `error`, recording why
    pub fn fail(&mut self, error: TxError) -> Result<(), FlowError> {
        self.advance(FlowStep::Error)?;
        self.error = Some(error);
        Ok(())
    }

    pub fn record_approval(&mut self, hash: TxHash) {
        self.approval_hashes.push(hash);
        self.observed_hashes.push(hash);
    }

    pub fn record_action(&mut self, hash: TxHash) {
        self.action_hash = Some(hash);
        self.observed_hashes.push(hash);
    }

    /// `error -> input`, keeping observed hashes
    pub fn retry(&mut self) -> Result<(), FlowError> {
        if self.step != FlowStep::Error {
            return Err(FlowError::InvalidTransition {
                from: self.step,
                to: FlowStep::Input,
            });
        }
        self.reset();
        Ok(())
    }

    /// Only an idle flow in `input` can be cancelled
    pub fn cancel(&mut self) -> Result<(), FlowError> {
        if self.step != FlowStep::Input || self.active {
            return Err(FlowError::NotCancellable { step: self.step });
        }
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        let observed = std::mem::take(&mut self.observed_hashes);
        *self = Self {
            observed_hashes: observed,
            ..Self::default()
        };
    }
}

/// Shared handle over a flow's state; subscribers see every change
#[derive(Debug, Clone)]
pub struct FlowTracker {
    tx: watch::Sender<TransactionState>,
}

impl Default for FlowTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(TransactionState::new());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<TransactionState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TransactionState {
        self.tx.borrow().clone()
    }

    pub fn step(&self) -> FlowStep {
        self.tx.borrow().step
    }

    pub fn cancel(&self) -> Result<(), FlowError> {
        self.try_modify(TransactionState::cancel)
    }

    pub fn retry(&self) -> Result<(), FlowError> {
        self.try_modify(TransactionState::retry)
    }

    /// Claim an idle `input` flow for execution
    pub(crate) fn begin(&self) -> Result<(), FlowError> {
        self.try_modify(|s| {
            if s.step != FlowStep::Input || s.active {
                return Err(FlowError::InvalidTransition {
                    from: s.step,
                    to: FlowStep::Executing,
                });
            }
            s.active = true;
            s.error = None;
            Ok(())
        })
    }

    /// Release a flow that stopped before leaving `input`
    pub(crate) fn reject(&self, error: TxError) {
        self.tx.send_modify(|s| {
            s.active = false;
            s.error = Some(error);
        });
    }

    pub(crate) fn advance(&self, next: FlowStep) -> Result<(), FlowError> {
        self.try_modify(|s| s.advance(next))
    }

    pub(crate) fn fail(&self, error: TxError) -> Result<(), FlowError> {
        self.try_modify(|s| s.fail(error))
    }

    pub(crate) fn modify(&self, f: impl FnOnce(&mut TransactionState)) {
        self.tx.send_modify(f);
    }

    fn try_modify(
        &self,
        f: impl FnOnce(&mut TransactionState) -> Result<(), FlowError>,
    ) -> Result<(), FlowError> {
        let mut result = Ok(());
        self.tx.send_if_modified(|s| {
            result = f(s);
            result.is_ok()
        });
        result
    }
}
