pub mod dedup;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod session;
pub mod store;
pub mod ticket;

pub use dedup::{DEFAULT_DEDUP_WINDOW, DedupCache};
pub use dispatcher::{Dispatcher, DispatcherConfig, PollLinks, SubmitOutcome, SubmitRequest};
pub use error::{ErrorClass, LlmassError, Result};
pub use executor::{DEFAULT_EXEC_TIMEOUT, DEFAULT_SHELL, ExecOutcome, Executor};
pub use session::validate_session_name;
pub use store::{HistoryEntry, HistoryRecord, PendingWrite, ReadOutcome, ResultStore};
pub use ticket::{AllocationGuard, TicketAllocator};
