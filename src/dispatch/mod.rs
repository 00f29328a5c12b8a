//! Dispatch - drains the mail store through a transport.
//!
//! - `BackoffTrigger` - delay until the next tick, adapting to transport health
//! - `Dispatcher` - one tick: claim, send, classify, record
//! - `DispatcherThread` - background thread running ticks on the trigger's schedule
//!
//! ## Example
//!
//! ```ignore
//! use postbox::{BackoffTrigger, Dispatcher, InMemoryMailStore, LogTransport};
//!
//! let dispatcher = Dispatcher::new(InMemoryMailStore::new(), LogTransport::new());
//! let mut trigger = BackoffTrigger::default();
//!
//! let report = dispatcher.run_once(&mut trigger)?;
//! println!("sent {}, next tick in {:?}", report.sent, trigger.current_delay());
//! ```

mod backoff;
mod dispatcher;
mod thread;

pub use backoff::BackoffTrigger;
pub use dispatcher::{DispatchError, Dispatcher, TickReport};
pub use thread::{DispatchStats, DispatcherThread};
