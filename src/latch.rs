//! Termination latch: the at-most-once settlement gate.
//!
//! Two independent sources race to end an exchange: the producer
//! (value/error/complete) and the transport (timeout/transport completion).
//! The latch reduces that race to a single compare-and-set on a tri-state
//! flag. Whoever wins performs the action on the [`Settle`] target; everyone
//! else is a silent no-op.
//!
//! ```text
//!            try_settle_value / try_settle_complete
//!   Pending ───────────────────────────────────────► SettledSuccess
//!      │
//!      └──────────────── try_settle_error ─────────► SettledError
//! ```

use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::BridgeError;

/// Settlement state of a latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TerminationState {
    /// Nothing has settled the latch yet.
    Pending = 0,
    /// Settled with a value or a completion.
    SettledSuccess = 1,
    /// Settled with an error.
    SettledError = 2,
}

impl TerminationState {
    #[inline]
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Pending,
            1 => Self::SettledSuccess,
            _ => Self::SettledError,
        }
    }
}

/// Target a latch settles exactly once.
pub trait Settle: Send + Sync {
    /// Value type carried by a successful settlement.
    type Value;

    /// Settle with a value.
    fn settle_value(&self, value: Self::Value);

    /// Settle with an error.
    fn settle_error(&self, error: BridgeError);

    /// Settle without a value.
    fn settle_complete(&self);
}

/// One-shot, thread-safe settlement gate.
pub struct TerminationLatch<S> {
    state: AtomicU8,
    target: S,
}

impl<S: Settle> TerminationLatch<S> {
    /// Create a pending latch owning `target`.
    pub fn new(target: S) -> Self {
        Self {
            state: AtomicU8::new(TerminationState::Pending as u8),
            target,
        }
    }

    /// Settle with a value. Returns `true` if this call won.
    pub fn try_settle_value(&self, value: S::Value) -> bool {
        if !self.transition(TerminationState::SettledSuccess) {
            return false;
        }
        self.target.settle_value(value);
        true
    }

    /// Settle with an error. Returns `true` if this call won.
    pub fn try_settle_error(&self, error: BridgeError) -> bool {
        if !self.transition(TerminationState::SettledError) {
            return false;
        }
        self.target.settle_error(error);
        true
    }

    /// Settle without a value. Returns `true` if this call won.
    pub fn try_settle_complete(&self) -> bool {
        if !self.transition(TerminationState::SettledSuccess) {
            return false;
        }
        self.target.settle_complete();
        true
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> TerminationState {
        TerminationState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether any settlement has happened.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.state() != TerminationState::Pending
    }

    /// The owned target.
    #[inline]
    pub fn target(&self) -> &S {
        &self.target
    }

    fn transition(&self, to: TerminationState) -> bool {
        self.state
            .compare_exchange(
                TerminationState::Pending as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}
