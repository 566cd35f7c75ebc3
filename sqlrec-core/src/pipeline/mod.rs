//! Pure pipeline stages.
//!
//! Each stage is a function of its inputs only; sequencing, retries and
//! service calls belong to [`crate::runtime`].

pub mod extract;
pub mod fallback;
pub mod parse;
pub mod validate;

pub use extract::{extract, extract_any, fallback_extract};
pub use fallback::{build_fallback_query, CatalogSchema, FallbackQueryBuilder, Ident};
pub use parse::parse;
pub use validate::validate;
