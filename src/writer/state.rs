use std::fmt;

/// Lifecycle of an `AtomicFileWriter`.
///
/// `Open` and `BackedUp` accept writes; the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Lock held, no backup taken.
    Open,
    /// Lock held, pre-write contents copied to the backup file.
    BackedUp,
    /// An I/O error occurred; lock released, backup (if any) retained.
    Failed,
    /// Caller gave up; lock released, backup removed.
    Aborted,
    /// Committed; lock released.
    Closed,
}

impl WriterState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WriterState::Failed | WriterState::Aborted | WriterState::Closed)
    }

    pub fn accepts_writes(self) -> bool {
        matches!(self, WriterState::Open | WriterState::BackedUp)
    }
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WriterState::Open => "open",
            WriterState::BackedUp => "backed-up",
            WriterState::Failed => "failed",
            WriterState::Aborted => "aborted",
            WriterState::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_never_accept_writes() {
        let all = [
            WriterState::Open,
            WriterState::BackedUp,
            WriterState::Failed,
            WriterState::Aborted,
            WriterState::Closed,
        ];
        for s in all {
            assert_ne!(s.is_terminal(), s.accepts_writes(), "{s}");
        }
        assert_eq!(WriterState::BackedUp.to_string(), "backed-up");
    }
}
