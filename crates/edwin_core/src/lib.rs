pub mod controller;
pub mod domain;
pub mod extract;
pub mod identity;
pub mod ports;
pub mod settings;
pub mod state;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use domain::{CourseContext, CourseId, PageContent, PageType, SyncRecord, UserIdentity};
pub use ports::{BackendService, Clock, HostPage, KeyValueStore, PanelView, PortError, PortResult, SystemClock};
pub use settings::{ClientSettings, Timeouts};
pub use state::ClientState;
pub use storage::{EdwinStorage, MemoryStore};
pub use sync::{SyncScheduler, SyncState};
