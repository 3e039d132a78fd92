//! Dataset services.
//!
//! Each service owns its field-mapping table, sort allow-list and cache key
//! derivation, and goes through the shared predicate/pagination machinery and
//! the cache-aside layer. The TTLs below trade polling absorption against
//! data freshness: pages refresh within a minute, stats a little slower, and
//! the dropdown option lists only every ten minutes.

pub mod consegne;
pub mod terzisti;
pub mod viaggi;

pub use consegne::{ConsegneFilters, ConsegneService};
pub use terzisti::{TerzistiFilters, TerzistiService};
pub use viaggi::{ViaggiFilters, ViaggiService};

use std::time::Duration;

/// TTL for row-level and grouped pages.
pub const PAGE_TTL: Duration = Duration::from_secs(60);
/// TTL for whole-result-set stats.
pub const STATS_TTL: Duration = Duration::from_secs(120);
/// TTL for distinct-value filter option lists.
pub const OPTIONS_TTL: Duration = Duration::from_secs(600);
