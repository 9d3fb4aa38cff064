use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use llmass_protocol::{SessionName, Ticket};

use crate::error::{LlmassError, Result};
use crate::store::ResultStore;

const MAX_RESERVE_ATTEMPTS: usize = 16;

/// Exclusive right to allocate tickets for one session.
///
/// The guarded value is the session's generation, bumped each time the
/// session is cleared. A run only publishes if its generation is current.
pub struct AllocationGuard {
    session: SessionName,
    generation: OwnedMutexGuard<u64>,
}

impl AllocationGuard {
    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn generation(&self) -> u64 {
        *self.generation
    }

    pub(crate) fn bump_generation(&mut self) {
        *self.generation += 1;
    }
}

/// Derives ticket numbers from the records already on disk.
///
/// The directory scan is the source of truth. Callers that need unique
/// tickets take the session's [`AllocationGuard`] first and reserve through
/// [`TicketAllocator::allocate`].
pub struct TicketAllocator {
    store: ResultStore,
    locks: DashMap<SessionName, Arc<Mutex<u64>>>,
}

impl TicketAllocator {
    pub fn new(store: ResultStore) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    /// `max(existing) + 1`, or 1 for an empty session. Creates the session directory.
    ///
    /// Not exclusive on its own: two unguarded callers can get the same number.
    pub async fn next(&self, session: &str) -> Result<Ticket> {
        self.store.ensure_session(session).await?;
        let tickets = self.store.list_tickets(session).await?;
        Ok(tickets.last().map_or(1, |max| max + 1))
    }

    pub async fn lock(&self, session: &str) -> AllocationGuard {
        let mutex = self
            .locks
            .entry(session.to_string())
            .or_default()
            .value()
            .clone();
        AllocationGuard {
            session: session.to_string(),
            generation: mutex.lock_owned().await,
        }
    }

    /// Allocate the next ticket and claim it on disk with an empty record.
    pub async fn allocate(&self, guard: &AllocationGuard) -> Result<Ticket> {
        let session = guard.session();
        for _ in 0..MAX_RESERVE_ATTEMPTS {
            let ticket = self.next(session).await?;
            if self.store.reserve(session, ticket).await? {
                debug!(session, ticket, "allocated ticket");
                return Ok(ticket);
            }
        }
        Err(LlmassError::Io(std::io::Error::other(format!(
            "could not reserve a ticket for session {session} after {MAX_RESERVE_ATTEMPTS} attempts"
        ))))
    }
}
