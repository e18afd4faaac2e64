//! OData data queries
//!
//! A [`DataQuery`] describes the first request against an entity collection
//! (collection, `$select` columns, free-form query fragment). Later pages are
//! requested through the server's continuation link and never rebuilt from it.

pub mod builder;
pub mod query;
pub mod result;

pub use builder::DataQueryBuilder;
pub use query::DataQuery;
pub use result::Page;
