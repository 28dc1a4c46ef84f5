//! # cm-queries
//!
//! Ad hoc filtering and sorting of an in-memory contact list.
//!
//! ## Structure
//!
//! - `filters` - Filter operators, values and AND-combined filter sets
//! - `sorts` - Sort fields and directions
//! - `query` - The query-string form used by the contact list endpoint
//!
//! ## Example
//!
//! ```
//! use cm_queries::filters::{Filter, FilterSet};
//!
//! let filters = FilterSet::new()
//!     .with(Filter::contains("search", "ada"))
//!     .with(Filter::contains("company", "analytical"));
//!
//! assert_eq!(filters.len(), 2);
//! ```

pub mod filters;
pub mod query;
pub mod sorts;

// Re-exports for convenience
pub use filters::{Filter, FilterOperator, FilterSet, FilterValue};
pub use query::ContactQuery;
pub use sorts::{SortDirection, SortField, SortOrder};
