mod in_memory;
mod record;
mod store;

pub use in_memory::InMemoryMailStore;
pub use record::{MailId, MailRecord, MailState};
pub use store::MailStore;
