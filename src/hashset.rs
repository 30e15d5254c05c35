//! Distinct hash set allows to count exactly the number of distinct fixed-width
//! values and is defined with const `L` parameter: the width of every value in
//! bytes. Values are compared by their raw bytes.
//!
//! # Data-structure design rationale
//!
//! ## Chained buckets of inline elements
//! - Each bucket is a contiguous array of `(hash, [u8; L])` elements, so values
//!   are stored by value and scanning a bucket never chases pointers.
//! - The 32-bit hash is stored along with the value: bucket scans compare
//!   hashes first and resizing never recomputes a hash.
//! - Buckets grow by `BUCKET_STEP` elements at a time.
//!
//! ## Geometric growth
//! - The table starts with `INIT_BUCKETS` buckets (`INIT_BITS` significant
//!   hash bits) and every resize quadruples it, up to `MAX_BUCKETS`.
//! - Resizing is triggered by the owner of the set (see `ResizePolicy`),
//!   never inside `insert`. With the default policy buckets hold about
//!   `BUCKET_LIMIT` elements on average before the table grows, and the total
//!   resize cost amortizes to O(number of items).
//!
//! Growth of the table for the default policy:
//! - Items in [0..80) range - 4 buckets
//! - Items in [80..320) range - 16 buckets
//! - Items in [320..1280) range - 64 buckets
//! - ...
//! - Items in [1310720..) range - 262144 buckets (bucket size is unbounded)

use std::fmt::{Debug, Formatter};
use std::hash::{BuildHasher, BuildHasherDefault, Hasher};
use std::mem::size_of;

use log::debug;
use wyhash::WyHash;

use crate::bucket::{Bucket, Element};
use crate::error::Result;
use crate::stats::TableStats;

/// Initial number of significant hash bits
pub const INIT_BITS: u32 = 2;
/// Initial number of buckets
pub const INIT_BUCKETS: usize = 1 << INIT_BITS;
/// Maximum number of buckets
pub const MAX_BUCKETS: usize = 262_144;
/// Average bucket size which triggers table resize
pub const BUCKET_LIMIT: usize = 20;

/// Exact distinct set of `L`-byte values.
pub struct HashSet<const L: usize, H: Hasher + Default = WyHash> {
    /// Number of low hash bits used as bucket index
    significant_bits: u32,
    /// Number of distinct values stored
    len: usize,
    /// Exactly `2^significant_bits` buckets
    buckets: Vec<Bucket<L>>,
    /// Zero-sized build hasher
    build_hasher: BuildHasherDefault<H>,
}

impl<const L: usize, H: Hasher + Default> HashSet<L, H> {
    /// Ensure that `L` is a valid value width at compile time
    const VALID_WIDTH: () = assert!(L > 0 && L <= u16::MAX as usize);

    /// Creates new empty `HashSet` with `INIT_BUCKETS` unallocated buckets
    #[inline]
    pub fn new() -> Self {
        // compile time check of width
        _ = Self::VALID_WIDTH;

        Self {
            significant_bits: INIT_BITS,
            len: 0,
            buckets: (0..INIT_BUCKETS).map(|_| Bucket::new()).collect(),
            build_hasher: BuildHasherDefault::default(),
        }
    }

    /// Creates new empty `HashSet` with `2^significant_bits` buckets.
    /// Used to restore a set which already went through resizes.
    pub(crate) fn with_significant_bits(significant_bits: u32) -> Result<Self> {
        _ = Self::VALID_WIDTH;
        debug_assert!(significant_bits >= INIT_BITS && (1 << significant_bits) <= MAX_BUCKETS);

        let mut buckets = Vec::new();
        buckets.try_reserve_exact(1 << significant_bits)?;
        buckets.resize_with(1 << significant_bits, Bucket::new);
        Ok(Self {
            significant_bits,
            len: 0,
            buckets,
            build_hasher: BuildHasherDefault::default(),
        })
    }

    /// Return width of stored values in bytes
    #[inline]
    pub const fn value_length(&self) -> usize {
        L
    }

    /// Return number of distinct values stored
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Return whether no value was stored yet
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Return number of significant hash bits
    #[inline]
    pub fn significant_bits(&self) -> u32 {
        self.significant_bits
    }

    /// Return number of buckets, always `2^significant_bits`
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Compute 32-bit hash of the value
    #[inline]
    fn hash(&self, value: &[u8; L]) -> u32 {
        let mut hasher = self.build_hasher.build_hasher();
        hasher.write(value);
        // keep only the low 4 bytes of the hash
        hasher.finish() as u32
    }

    /// Insert value into `HashSet`.
    /// Returns true when the value was not present before.
    #[inline]
    pub fn insert(&mut self, value: &[u8; L]) -> Result<bool> {
        let element = Element {
            hash: self.hash(value),
            value: *value,
        };
        let inserted = insert_element(&mut self.buckets, element)?;
        self.len += usize::from(inserted);
        Ok(inserted)
    }

    /// Return whether value is stored in `HashSet`
    #[inline]
    pub fn contains(&self, value: &[u8; L]) -> bool {
        let hash = self.hash(value);
        self.buckets[bucket_index(hash, self.buckets.len())].contains(hash, value)
    }

    /// Quadruple the number of buckets and redistribute all stored values.
    ///
    /// The new bucket array is fully built before it replaces the old one,
    /// and each value is moved with its stored hash through the same insert
    /// path used for new values. When the allocation fails the set is left
    /// unchanged. A set already at `MAX_BUCKETS` is not resized.
    pub fn resize(&mut self) -> Result<()> {
        if self.bucket_count() * 4 > MAX_BUCKETS {
            debug!(
                "distinct set of {}-byte values already has {} buckets, not resizing",
                L,
                self.bucket_count()
            );
            return Ok(());
        }

        let new_count = self.bucket_count() * 4;
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(new_count)?;
        buckets.resize_with(new_count, Bucket::new);

        let mut len = 0;
        for bucket in self.buckets.iter().filter(|b| b.is_allocated()) {
            for &element in bucket.items() {
                len += usize::from(insert_element(&mut buckets, element)?);
            }
        }
        debug_assert_eq!(len, self.len, "resize must neither drop nor duplicate values");

        debug!(
            "resized distinct set of {}-byte values: items={} buckets={} => {}",
            L,
            len,
            self.bucket_count(),
            new_count
        );

        // old buckets are released here, each exactly once
        self.buckets = buckets;
        self.significant_bits += 2;
        self.len = len;
        Ok(())
    }

    /// Iterate over stored values in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = &[u8; L]> + '_ {
        self.buckets
            .iter()
            .flat_map(|b| b.items().iter().map(|e| &e.value))
    }

    /// Return bucket occupancy statistics
    pub fn stats(&self) -> TableStats {
        TableStats::from_bucket_sizes(self.len, self.buckets.iter().map(Bucket::len))
    }

    /// Return memory size of `HashSet`, including unused bucket capacity
    pub fn size_of(&self) -> usize {
        size_of::<Self>()
            + self.buckets.capacity() * size_of::<Bucket<L>>()
            + self.buckets.iter().map(Bucket::size_of).sum::<usize>()
    }
}

/// Return index of the bucket for given hash; `bucket_count` is a power of two
#[inline]
fn bucket_index(hash: u32, bucket_count: usize) -> usize {
    hash as usize & (bucket_count - 1)
}

/// Insert element into its bucket unless an equal element is already there
#[inline]
fn insert_element<const L: usize>(buckets: &mut [Bucket<L>], element: Element<L>) -> Result<bool> {
    let bucket = &mut buckets[bucket_index(element.hash, buckets.len())];
    if bucket.contains(element.hash, &element.value) {
        return Ok(false);
    }
    bucket.push(element)?;
    Ok(true)
}

impl<const L: usize, H: Hasher + Default> Default for HashSet<L, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const L: usize, H: Hasher + Default> Clone for HashSet<L, H> {
    fn clone(&self) -> Self {
        Self {
            significant_bits: self.significant_bits,
            len: self.len,
            buckets: self.buckets.clone(),
            build_hasher: BuildHasherDefault::default(),
        }
    }
}

impl<const L: usize, H: Hasher + Default> Debug for HashSet<L, H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ value_length: {}, len: {}, buckets: {} }}",
            L,
            self.len(),
            self.bucket_count()
        )
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::Crc32;
    use test_case::test_case;

    fn bytes(v: u32) -> [u8; 4] {
        v.to_ne_bytes()
    }

    /// Check structural invariants of the set
    fn check_invariants<const L: usize, H: Hasher + Default>(set: &HashSet<L, H>) {
        assert_eq!(set.bucket_count(), 1 << set.significant_bits());
        assert!(set.bucket_count() <= MAX_BUCKETS);
        let mut total = 0;
        for (idx, bucket) in set.buckets.iter().enumerate() {
            for e in bucket.items() {
                assert_eq!(bucket_index(e.hash, set.bucket_count()), idx);
                assert_eq!(e.hash, set.hash(&e.value));
            }
            total += bucket.len();
        }
        assert_eq!(total, set.len());
        let unique: std::collections::HashSet<_> = set.iter().collect();
        assert_eq!(unique.len(), set.len());
    }

    #[test]
    fn test_new() {
        let set = HashSet::<4>::new();
        assert_eq!(format!("{:?}", set), "{ value_length: 4, len: 0, buckets: 4 }");
        assert_eq!(set.significant_bits(), INIT_BITS);
        assert!(set.is_empty());
        assert!(set.buckets.iter().all(|b| !b.is_allocated()));
        check_invariants(&set);
    }

    #[test]
    fn test_insert() {
        let mut set = HashSet::<4>::new();

        // first insert of a value adds it
        assert!(set.insert(&bytes(5)).unwrap());
        assert_eq!(set.len(), 1);

        // re-inserting the same value doesn't change the set
        assert!(!set.insert(&bytes(5)).unwrap());
        assert_eq!(set.len(), 1);

        assert!(set.insert(&bytes(7)).unwrap());
        assert!(!set.insert(&bytes(5)).unwrap());
        assert!(set.insert(&bytes(9)).unwrap());
        assert_eq!(set.len(), 3);

        assert!(set.contains(&bytes(7)));
        assert!(!set.contains(&bytes(8)));
        check_invariants(&set);
    }

    #[test_case(0 => "{ value_length: 4, len: 0, buckets: 16 }")]
    #[test_case(1 => "{ value_length: 4, len: 1, buckets: 16 }")]
    #[test_case(80 => "{ value_length: 4, len: 80, buckets: 16 }")]
    #[test_case(1_000 => "{ value_length: 4, len: 1000, buckets: 16 }")]
    fn test_resize_preserves_values(n: u32) -> String {
        let mut set = HashSet::<4>::new();
        for i in 0..n {
            set.insert(&bytes(i)).unwrap();
        }
        let before = set.clone();

        set.resize().unwrap();

        check_invariants(&set);
        assert_eq!(set.len(), before.len());
        assert!(before.iter().all(|v| set.contains(v)));
        assert!(set.iter().all(|v| before.contains(v)));
        assert!(!set.contains(&bytes(n)));
        format!("{:?}", set)
    }

    #[test]
    fn test_resize_up_to_max_buckets() {
        let mut set = HashSet::<8>::new();
        for i in 0..10_000u64 {
            set.insert(&i.to_ne_bytes()).unwrap();
        }
        while set.bucket_count() * 4 <= MAX_BUCKETS {
            set.resize().unwrap();
            check_invariants(&set);
        }
        assert_eq!(set.bucket_count(), MAX_BUCKETS);
        assert_eq!(set.significant_bits(), 18);
        assert_eq!(set.len(), 10_000);

        // resizing at the ceiling keeps the table as it is
        set.resize().unwrap();
        assert_eq!(set.bucket_count(), MAX_BUCKETS);
        assert_eq!(set.significant_bits(), 18);
        assert!((0..10_000u64).all(|i| set.contains(&i.to_ne_bytes())));
        check_invariants(&set);
    }

    #[test]
    fn test_crc32_hash() {
        let mut set = HashSet::<4, Crc32>::new();
        // CRC-32 of the four bytes 0x01 0x02 0x03 0x04
        assert_eq!(set.hash(&[1, 2, 3, 4]), 0xb63c_fbcd);
        for i in 0..500 {
            set.insert(&bytes(i % 100)).unwrap();
        }
        assert_eq!(set.len(), 100);
        check_invariants(&set);
    }

    #[test]
    fn test_all_single_byte_values() {
        let mut set = HashSet::<1>::new();
        for round in 0..3 {
            for b in 0..=u8::MAX {
                assert_eq!(set.insert(&[b]).unwrap(), round == 0);
            }
        }
        assert_eq!(set.len(), 256);
        check_invariants(&set);
    }

    #[test]
    fn test_size_of() {
        let mut set = HashSet::<4>::new();
        let empty = set.size_of();
        assert_eq!(empty, size_of::<HashSet<4>>() + 4 * size_of::<Bucket<4>>());

        set.insert(&bytes(1)).unwrap();
        // first insert allocates one bucket step of 8-byte elements
        assert_eq!(set.size_of(), empty + 5 * 8);
    }
}
