pub mod catalog;
pub mod selection;
pub mod store;
pub mod watch_state;

pub use catalog::{CatalogBuilder, CatalogState, RevalidationHandle};
pub use store::{NotionStore, RecordPage, RecordStore};
