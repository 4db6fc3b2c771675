//! evm-tx: Approval, execution and confirmation of router transactions
//!
//! A flow moves through [`FlowStep`]s under one [`Orchestrator`]; callers
//! watch progress through a [`FlowTracker`].

pub mod classify;
pub mod confirm;
pub mod orchestrator;
pub mod state;

use thiserror::Error;

pub use classify::{classify_message, classify_provider_error, TxError, TxErrorKind};
pub use confirm::{wait_for_receipt, PollPolicy};
pub use orchestrator::{
    AddLiquidityParams, FlowClaim, FlowOutcome, FlowRequest, Orchestrator, RemoveLiquidityParams,
    SwapParams,
};
pub use state::{FlowStep, FlowTracker, TransactionState};

/// Errors that prevent a flow from running at all
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    #[error("Another transaction flow is already in progress")]
    FlowBusy,

    #[error("Flow cannot move from {from} to {to}")]
    InvalidTransition { from: FlowStep, to: FlowStep },

    #[error("Flow in {step} cannot be cancelled")]
    NotCancellable { step: FlowStep },

    #[error("Quote is {age_secs}s old; prepare the flow again")]
    QuoteExpired { age_secs: u64 },
}

impl FlowError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::FlowBusy => "flow_busy",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::NotCancellable { .. } => "not_cancellable",
            Self::QuoteExpired { .. } => "quote_stale",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::QuoteExpired { .. } => 422,
            _ => 409,
        }
    }
}
