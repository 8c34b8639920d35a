pub mod movie;
pub mod notion;

pub use movie::{Catalog, CategorySet, MovieId, MovieRecord, SelectionCriteria, WatchState};
pub use notion::{NotionPage, PropertyValue, QueryResponse};
