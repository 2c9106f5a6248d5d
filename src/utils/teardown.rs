use std::sync::OnceLock;

/// Runs a teardown action at most once.
///
/// Every caller, first or subsequent, sequential or concurrent, observes the
/// outcome of the single execution. Concurrent callers block until the first
/// execution has finished.
pub struct TeardownOnce<E> {
    outcome: OnceLock<Result<(), E>>,
}

impl<E> Default for TeardownOnce<E> {
    fn default() -> Self {
        Self {
            outcome: OnceLock::new(),
        }
    }
}

impl<E> TeardownOnce<E>
where
    E: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes `action` unless a previous call already did, returning the
    /// recorded outcome either way.
    pub fn execute<F>(&self, action: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        self.outcome.get_or_init(action).clone()
    }
}
