//! From table rows to a paginated list of labels.

pub mod columns;
pub mod compose;
pub mod group;
pub mod location;
pub mod pager;
