//! ## Width representations
//! `HashSet` is sized by a const value width, while the driver only learns the
//! width at runtime from the declared type of the first value. `Representation`
//! wraps one statically-sized set per supported width:
//! - `Width1` - 1-byte values (`bool`, `char` of the host)
//! - `Width2` - 2-byte values
//! - `Width4` - 4-byte values
//! - `Width8` - 8-byte values
//!
//! These are all the widths the host passes by value.

use std::fmt::{Debug, Formatter};
use std::hash::Hasher;

use enum_dispatch::enum_dispatch;

use crate::error::{Error, Result};
use crate::hashset::HashSet;
use crate::stats::TableStats;

/// Set representations supported by the aggregation driver
#[enum_dispatch]
pub enum Representation<H: Hasher + Default> {
    Width1(HashSet<1, H>),
    Width2(HashSet<2, H>),
    Width4(HashSet<4, H>),
    Width8(HashSet<8, H>),
}

/// Representation trait which must be implemented by all representations.
#[enum_dispatch(Representation<H>)]
pub trait RepresentationTrait {
    /// Width of stored values in bytes
    fn value_length(&self) -> usize;
    /// Insert raw value bytes, which must be exactly `value_length` long
    fn insert_bytes(&mut self, value: &[u8]) -> Result<bool>;
    /// Return whether raw value bytes are stored
    fn contains_bytes(&self, value: &[u8]) -> bool;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn bucket_count(&self) -> usize;
    fn significant_bits(&self) -> u32;
    fn resize(&mut self) -> Result<()>;
    fn stats(&self) -> TableStats;
    fn size_of(&self) -> usize;
    /// All stored values concatenated, `value_length` bytes each
    fn to_bytes(&self) -> Vec<u8>;
    fn to_string(&self) -> String {
        format!(
            "value_length: {}, len: {}, buckets: {}",
            self.value_length(),
            self.len(),
            self.bucket_count()
        )
    }
}

impl<const L: usize, H: Hasher + Default> RepresentationTrait for HashSet<L, H> {
    #[inline]
    fn value_length(&self) -> usize {
        L
    }

    #[inline]
    fn insert_bytes(&mut self, value: &[u8]) -> Result<bool> {
        let value: &[u8; L] = value.try_into().map_err(|_| Error::WidthMismatch {
            expected: L,
            actual: value.len(),
        })?;
        self.insert(value)
    }

    #[inline]
    fn contains_bytes(&self, value: &[u8]) -> bool {
        value
            .try_into()
            .is_ok_and(|value: &[u8; L]| self.contains(value))
    }

    #[inline]
    fn len(&self) -> usize {
        HashSet::len(self)
    }

    #[inline]
    fn bucket_count(&self) -> usize {
        HashSet::bucket_count(self)
    }

    #[inline]
    fn significant_bits(&self) -> u32 {
        HashSet::significant_bits(self)
    }

    fn resize(&mut self) -> Result<()> {
        HashSet::resize(self)
    }

    fn stats(&self) -> TableStats {
        HashSet::stats(self)
    }

    fn size_of(&self) -> usize {
        HashSet::size_of(self)
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(HashSet::len(self) * L);
        self.iter().for_each(|v| data.extend_from_slice(v));
        data
    }
}

impl<H: Hasher + Default> Representation<H> {
    /// Create new empty representation for values of given width
    pub fn new(value_length: usize) -> Result<Self> {
        Self::with_significant_bits(value_length, crate::hashset::INIT_BITS)
    }

    /// Create new empty representation with `2^significant_bits` buckets
    pub(crate) fn with_significant_bits(value_length: usize, significant_bits: u32) -> Result<Self> {
        Ok(match value_length {
            1 => HashSet::<1, H>::with_significant_bits(significant_bits)?.into(),
            2 => HashSet::<2, H>::with_significant_bits(significant_bits)?.into(),
            4 => HashSet::<4, H>::with_significant_bits(significant_bits)?.into(),
            8 => HashSet::<8, H>::with_significant_bits(significant_bits)?.into(),
            _ => return Err(Error::UnsupportedWidth(value_length)),
        })
    }
}

impl<H: Hasher + Default> Clone for Representation<H> {
    fn clone(&self) -> Self {
        match self {
            Representation::Width1(set) => Representation::Width1(set.clone()),
            Representation::Width2(set) => Representation::Width2(set.clone()),
            Representation::Width4(set) => Representation::Width4(set.clone()),
            Representation::Width8(set) => Representation::Width8(set.clone()),
        }
    }
}

impl<H: Hasher + Default> Debug for Representation<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ {} }}", RepresentationTrait::to_string(self))
    }
}
