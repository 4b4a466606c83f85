use super::QueryError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Limits applied to every ray query of a run: an optional per-query timeout
/// and a cancellation token shared with whoever drives the run.
#[derive(Debug, Clone, Default)]
pub struct QueryBudget {
    per_query: Option<Duration>,
    cancel: CancelToken,
}

impl QueryBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_timeout(per_query: Duration) -> Self {
        Self {
            per_query: Some(per_query),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn per_query(&self) -> Option<Duration> {
        self.per_query
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Start the clock for one query.
    pub fn deadline(&self) -> Deadline {
        Deadline {
            at: self.per_query.map(|d| Instant::now() + d),
            cancel: self.cancel.clone(),
        }
    }
}

/// Handed to the geometry collaborator for a single query. Long-running
/// queries call [`Deadline::check`] between units of work.
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Option<Instant>,
    cancel: CancelToken,
}

impl Deadline {
    pub fn none() -> Self {
        QueryBudget::unlimited().deadline()
    }

    pub fn check(&self) -> Result<(), QueryError> {
        if self.cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        match self.at {
            Some(at) if Instant::now() >= at => Err(QueryError::TimedOut),
            _ => Ok(()),
        }
    }
}
