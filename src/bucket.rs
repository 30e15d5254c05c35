//! ## Bucket
//! A bucket is a chain of elements sharing the same low-order hash bits,
//! stored as a contiguous array of inline elements.
//!
//! Element layout:
//! - `hash`  - 32-bit hash of the value, kept so it is never recomputed
//! - `value` - `L` raw bytes of the value
//!
//! Buckets start unallocated and grow by `BUCKET_STEP` elements at a time,
//! so a bucket may hold up to `BUCKET_STEP - 1` unused trailing slots.

use std::mem::size_of;

use crate::error::Result;

/// Bucket growth step (number of elements, not bytes)
pub(crate) const BUCKET_STEP: usize = 5;

/// Single value stored inline, along with its hash
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Element<const L: usize> {
    pub(crate) hash: u32,
    pub(crate) value: [u8; L],
}

/// Chain of elements sharing the same bucket index
#[derive(Clone, Debug, Default)]
pub(crate) struct Bucket<const L: usize> {
    items: Vec<Element<L>>,
}

impl<const L: usize> Bucket<L> {
    /// Create new unallocated bucket
    #[inline]
    pub(crate) const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Return number of elements in the bucket
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Return whether the bucket has backing storage
    #[inline]
    pub(crate) fn is_allocated(&self) -> bool {
        self.items.capacity() != 0
    }

    /// Return whether an element with given hash and value is in the bucket
    #[inline]
    pub(crate) fn contains(&self, hash: u32, value: &[u8; L]) -> bool {
        self.items
            .iter()
            .any(|e| e.hash == hash && e.value == *value)
    }

    /// Append an element, growing the storage by `BUCKET_STEP` elements
    /// when it is full. Caller must ensure the element is not present yet.
    #[inline]
    pub(crate) fn push(&mut self, element: Element<L>) -> Result<()> {
        if self.items.len() == self.items.capacity() {
            self.items.try_reserve_exact(BUCKET_STEP)?;
        }
        self.items.push(element);
        Ok(())
    }

    /// Return elements stored in the bucket
    #[inline]
    pub(crate) fn items(&self) -> &[Element<L>] {
        &self.items
    }

    /// Return memory size of the bucket's backing storage
    #[inline]
    pub(crate) fn size_of(&self) -> usize {
        self.items.capacity() * size_of::<Element<L>>()
    }
}
