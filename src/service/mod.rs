//! Service layer
//!
//! Business logic between the HTTP handlers and the data layer.

mod feed;
mod graph;
mod relationship;

pub use feed::{FeedService, PostAccess, SortDirection, SortField, check_post_access};
pub use graph::GraphService;
pub use relationship::{RelationStatus, RelationshipService, SendRequestOutcome};
