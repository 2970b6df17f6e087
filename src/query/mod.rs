// Submodules for separation of concerns
mod builder;
mod eval;
mod parse;
pub mod specials;
mod types;

// Public API re-exports
pub use builder::{Query, QueryBuilder};
pub use eval::{bson_eq, compare_bson, compare_docs, eval_filter, project_fields};
pub use parse::parse_filter;
pub use specials::{
    Special, Specials, extract_specials, is_truthy, parse_populate, parse_select, parse_sort,
    prepare_query, translate,
};
pub use types::{CmpOp, Filter, Order, PopulateSpec, Projection, SortSpec};
