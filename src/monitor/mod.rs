// restorectl/src/monitor/mod.rs
pub(crate) mod buffer;
pub(crate) mod driver;
pub(crate) mod state;

pub use driver::{JobWatcher, WatchEvent};
pub use state::MonitorState;
