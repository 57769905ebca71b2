use std::fmt::Display;

/// Lifecycle state of a [`Dispatcher`](crate::Dispatcher)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Submissions are allowed
    Accepting,
    /// Shutdown was requested; no new submissions, admitted work still runs
    Draining,
    /// All work finished and pool resources were released
    Closed,
}

impl State {
    /// Returns `true` if new submissions are allowed
    #[must_use]
    pub const fn is_accepting(self) -> bool {
        matches!(self, Self::Accepting)
    }
}

impl Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Accepting => "accepting",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}
