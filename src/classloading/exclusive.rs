//! Named exclusive execution
//!
//! Runs an expensive, idempotent producer at most once concurrently per name.
//! Unlike a lock-per-name table, coordination state only lives while a
//! producer is running: the entry for a name is removed as soon as the
//! critical section ends, so memory does not grow with the number of names
//! ever seen.
//!
//! Callers that find a producer already running for their name block on its
//! result, bounded by a timeout. A timed-out waiter fails on its own; the
//! producer keeps running.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

/// Default bound on waiting for another caller's producer
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Failure of an exclusive execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusiveError<E> {
    /// The producer failed; every caller for the name observes the same error
    Failed(E),
    /// Another caller's producer did not finish in time
    Timeout { name: String, waited: Duration },
    /// The producing caller unwound without completing
    Abandoned { name: String },
}

impl<E: fmt::Display> fmt::Display for ExclusiveError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusiveError::Failed(e) => write!(f, "producer failed: {}", e),
            ExclusiveError::Timeout { name, waited } => write!(
                f,
                "timed out after {:?} waiting for concurrent operation on '{}'",
                waited, name
            ),
            ExclusiveError::Abandoned { name } => {
                write!(f, "concurrent operation on '{}' was abandoned", name)
            }
        }
    }
}

impl<E> Error for ExclusiveError<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExclusiveError::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Outcome<T, E> {
    Produced(T),
    Failed(E),
    Abandoned,
}

/// Placeholder for a result still being produced
struct PendingResult<T, E> {
    outcome: Mutex<Option<Outcome<T, E>>>,
    ready: Condvar,
}

impl<T: Clone, E: Clone> PendingResult<T, E> {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Record `outcome` unless one was already recorded
    fn complete(&self, outcome: Outcome<T, E>) {
        let mut slot = self.outcome.lock();
        if slot.is_none() {
            *slot = Some(outcome);
            self.ready.notify_all();
        }
    }

    fn wait(&self, timeout: Duration) -> Option<Outcome<T, E>> {
        let mut slot = self.outcome.lock();
        let deadline = deadline_after(Instant::now(), timeout);
        while slot.is_none() {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        (*slot).clone()
    }
}

/// Longest wait honoured; larger timeouts are clamped to it
const MAX_WAIT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

fn deadline_after(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout.min(MAX_WAIT)).unwrap_or(now)
}

/// Removes the registration once the producing caller leaves, even on unwind
struct Registration<'a, T: Clone, E: Clone> {
    operations: &'a DashMap<String, Arc<PendingResult<T, E>>>,
    name: &'a str,
    placeholder: Arc<PendingResult<T, E>>,
}

impl<T: Clone, E: Clone> Drop for Registration<'_, T, E> {
    fn drop(&mut self) {
        self.placeholder.complete(Outcome::Abandoned);
        // Only our own entry; a later caller may have registered a new one
        self.operations
            .remove_if(self.name, |_, pending| Arc::ptr_eq(pending, &self.placeholder));
    }
}

/// Cooperative mutual exclusion by name, with automatic cleanup
pub struct NamedExclusiveSingleOperations<T, E> {
    operations: DashMap<String, Arc<PendingResult<T, E>>>,
    wait_timeout: Duration,
}

impl<T: Clone, E: Clone> NamedExclusiveSingleOperations<T, E> {
    pub fn new() -> Self {
        Self::with_wait_timeout(DEFAULT_WAIT_TIMEOUT)
    }

    pub fn with_wait_timeout(wait_timeout: Duration) -> Self {
        Self {
            operations: DashMap::new(),
            wait_timeout,
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Produce the value for `name`, at most once concurrently
    ///
    /// `precheck` returning a value short-circuits everything; it may run
    /// twice. `produce` runs only for the caller that registers `name`
    /// first, and only if the second `precheck` still finds nothing. Every
    /// other concurrent caller for `name` receives the same outcome.
    pub fn exclusive_execution<A, P, F>(
        &self,
        name: &str,
        precheck: P,
        produce: F,
        arg: A,
    ) -> Result<T, ExclusiveError<E>>
    where
        P: Fn(&str) -> Option<T>,
        F: FnOnce(&str, A) -> Result<T, E>,
    {
        if let Some(value) = precheck(name) {
            return Ok(value);
        }

        let placeholder = Arc::new(PendingResult::new());
        let existing = match self.operations.entry(name.to_string()) {
            Entry::Occupied(entry) => Some(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&placeholder));
                None
            }
        };
        if let Some(existing) = existing {
            return self.await_outcome(name, &existing);
        }

        let registration = Registration {
            operations: &self.operations,
            name,
            placeholder,
        };

        // Another caller may have finished between the first check and registration
        if let Some(value) = precheck(name) {
            registration
                .placeholder
                .complete(Outcome::Produced(value.clone()));
            return Ok(value);
        }

        trace!("Producing '{}'", name);
        match produce(name, arg) {
            Ok(value) => {
                registration
                    .placeholder
                    .complete(Outcome::Produced(value.clone()));
                Ok(value)
            }
            Err(e) => {
                registration.placeholder.complete(Outcome::Failed(e.clone()));
                Err(ExclusiveError::Failed(e))
            }
        }
    }

    fn await_outcome(
        &self,
        name: &str,
        pending: &PendingResult<T, E>,
    ) -> Result<T, ExclusiveError<E>> {
        match pending.wait(self.wait_timeout) {
            Some(Outcome::Produced(value)) => Ok(value),
            Some(Outcome::Failed(e)) => Err(ExclusiveError::Failed(e)),
            Some(Outcome::Abandoned) => Err(ExclusiveError::Abandoned {
                name: name.to_string(),
            }),
            None => {
                debug!(
                    "Gave up waiting {:?} for concurrent operation on '{}'",
                    self.wait_timeout, name
                );
                Err(ExclusiveError::Timeout {
                    name: name.to_string(),
                    waited: self.wait_timeout,
                })
            }
        }
    }

    /// Names with a producer currently running
    pub fn pending_operations(&self) -> usize {
        self.operations.len()
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }
}

impl<T: Clone, E: Clone> Default for NamedExclusiveSingleOperations<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for NamedExclusiveSingleOperations<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedExclusiveSingleOperations")
            .field("pending", &self.operations.len())
            .field("wait_timeout", &self.wait_timeout)
            .finish()
    }
}
