use std::fmt;

use log::debug;
use parcel_core::{
    ActionKind, ActionQueue, OperationKind, PackageMatch, ProgressReporter, TransactionError,
    TransactionFlags,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Resolving,
    LicenseCheck,
    Fetching,
    Applying,
    Done,
    Aborted,
}

impl TransactionState {
    fn can_advance_to(self, next: Self) -> bool {
        use TransactionState::*;
        matches!(
            (self, next),
            (Idle, Resolving)
                | (Resolving, LicenseCheck)
                | (Resolving, Applying)
                | (LicenseCheck, Fetching)
                | (Fetching, Applying)
                | (Fetching, Done)
                | (Applying, Done)
                | (Resolving | LicenseCheck | Fetching | Applying, Aborted)
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::LicenseCheck => "license-check",
            Self::Fetching => "fetching",
            Self::Applying => "applying",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Per-call state of one transaction. Never persisted.
#[derive(Debug)]
pub struct TransactionContext {
    operation: OperationKind,
    flags: TransactionFlags,
    state: TransactionState,
    targets: Vec<PackageMatch>,
    queue: ActionQueue,
    progress: ProgressReporter,
    error: Option<TransactionError>,
}

impl TransactionContext {
    pub fn new(operation: OperationKind, flags: TransactionFlags) -> Self {
        Self {
            operation,
            flags,
            state: TransactionState::Idle,
            targets: Vec::new(),
            queue: ActionQueue::new(ActionKind::Install, Vec::new()),
            progress: ProgressReporter::new(0),
            error: None,
        }
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    pub fn flags(&self) -> TransactionFlags {
        self.flags
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn targets(&self) -> &[PackageMatch] {
        &self.targets
    }

    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    pub fn error(&self) -> Option<&TransactionError> {
        self.error.as_ref()
    }

    /// Whether an apply phase follows the fetch phase.
    pub fn applies(&self) -> bool {
        !self.flags.only_download && self.operation != OperationKind::Download
    }

    pub fn advance_to(&mut self, next: TransactionState) -> Result<(), TransactionError> {
        if !self.state.can_advance_to(next) {
            return Err(TransactionError::Internal(format!(
                "{} transaction cannot move from {} to {next}",
                self.operation.as_str(),
                self.state
            )));
        }
        debug!("{}: {} -> {next}", self.operation.as_str(), self.state);
        self.state = next;
        Ok(())
    }

    /// Fixes the queue and the progress denominator for the rest of the
    /// transaction.
    pub fn plan(&mut self, targets: Vec<PackageMatch>, queue: ActionQueue) {
        let len = queue.len() as u64;
        let total = match queue.kind() {
            ActionKind::Install if self.applies() => len * 2,
            _ => len,
        };
        self.targets = targets;
        self.queue = queue;
        self.progress = ProgressReporter::new(total);
    }

    pub(crate) fn progress_mut(&mut self) -> &mut ProgressReporter {
        &mut self.progress
    }

    /// Records `err` unless an earlier error was recorded, and returns the
    /// error that terminates the transaction.
    pub fn abort(&mut self, err: TransactionError) -> TransactionError {
        if self.state != TransactionState::Aborted {
            debug!("{}: {} -> aborted", self.operation.as_str(), self.state);
            self.state = TransactionState::Aborted;
        }
        self.error.get_or_insert(err).clone()
    }
}
