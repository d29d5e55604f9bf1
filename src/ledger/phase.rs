use tracing::{debug, error, info, warn};

use crate::error::LedgerError;

/// Where a mutation request is in its lifecycle.
///
/// `Pending -> Validating -> Committing -> Committed`, with `Rejected`
/// reachable from every non-terminal phase. A request that is rejected has
/// written nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Validating,
    Committing,
    Committed,
    Rejected,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Rejected)
    }

    pub fn can_advance_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Validating)
                | (Self::Validating, Self::Committing)
                | (Self::Committing, Self::Committed)
                | (Self::Pending | Self::Validating | Self::Committing, Self::Rejected)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks one request through its phases and logs each step.
pub(crate) struct Mutation {
    op: &'static str,
    phase: Phase,
}

impl Mutation {
    pub(crate) fn begin(op: &'static str) -> Self {
        debug!(op, phase = %Phase::Pending, "mutation requested");
        Self {
            op,
            phase: Phase::Pending,
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "{}: illegal transition {} -> {}",
            self.op,
            self.phase,
            next
        );
        debug!(op = self.op, from = %self.phase, to = %next, "mutation phase");
        self.phase = next;
        if next == Phase::Committed {
            info!(op = self.op, "mutation committed");
        }
    }

    /// Move to `Rejected` and hand the error back for propagation.
    pub(crate) fn reject(&mut self, err: LedgerError) -> LedgerError {
        if err.is_rejection() {
            warn!(op = self.op, from = %self.phase, error = %err, "mutation rejected");
        } else {
            error!(op = self.op, from = %self.phase, error = %err, "mutation failed");
        }
        self.advance(Phase::Rejected);
        err
    }
}
