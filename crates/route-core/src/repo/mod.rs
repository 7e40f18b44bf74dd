pub mod memory;
pub mod types;

pub use memory::InMemoryRouteStore;
pub use types::{sort_most_recent_first, ConfigFilter, ExecutionConfigStore, RoutingSource, VersionStore};
