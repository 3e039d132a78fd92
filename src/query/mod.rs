//! Query composition building blocks shared by the dataset services:
//! predicate building from sparse filters, sort whitelisting, pagination.

pub mod filter;
pub mod page;
pub mod sort;

pub use filter::{opt_text, FieldRule, Match, Predicate};
pub use page::{clamp_page, offset, total_pages, ResultPage, DEFAULT_PAGE_SIZE};
pub use sort::{resolve as resolve_sort, SortOrder, SortSpec};
