//! Feature Dataset Index
//!
//! Land-cover statistics keyed by region and epoch:
//! - `record`: the region record schema and name normalization
//! - `index`: the load-once, read-only index with aggregate fallbacks
//! - `summary`: chart-facing digests of a record

mod index;
mod record;
mod summary;

pub use index::{DatasetIndex, DatasetSource};
pub use record::{normalize_region_name, ClassShare, Epoch, LevelKind, RegionRecord};
pub use summary::{
    class_color, summarize, BreakdownSummary, DominantClass, AGRICULTURAL_CLASSES, BUILT_CLASSES,
    FALLBACK_CLASS_COLOR, NATURAL_CLASSES,
};
