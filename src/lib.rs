//! `count-distinct` is a Rust crate designed to count exactly the number of distinct fixed-width values in a stream,
//! as an incremental aggregation primitive.
//!
//! Values are kept in a hash set of chained buckets which grows geometrically as values arrive,
//! so inserts cost O(1) amortized from a handful of values up to hundreds of millions.
pub mod aggregate;
mod bucket;
pub mod error;
pub mod hashset;
pub mod representation;
#[cfg(feature = "with_serde")]
mod serde;
pub mod stats;
pub mod value;

pub use aggregate::{accumulate, combine, finalize, CountDistinct, ResizePolicy, State};
pub use error::{Error, Result};
pub use hashset::HashSet;
pub use representation::{Representation, RepresentationTrait};
pub use stats::{LogObserver, ResizeEvent, ResizeObserver, TableStats};
pub use value::{FixedWidth, TypeLength, ValueType};

/// CRC-32 (IEEE) hasher, an alternative to the default `WyHash`.
pub type Crc32 = crc32fast::Hasher;
