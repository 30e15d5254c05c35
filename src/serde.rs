//! # Serde module for distinct sets
//!
//! This module provides serde-based (serialization and deserialization) features for
//! `HashSet` and `Representation`, so partial aggregation states can be shipped between
//! workers of the host and combined there.
//!
//! A set is serialized as a tuple `(value_length, significant_bits, values)`, where
//! `values` holds all stored values concatenated, `value_length` bytes each.
//!
//! During deserialization the set is rebuilt with the same number of buckets by
//! re-inserting every value. A tuple is rejected when the width or the number of
//! significant bits is invalid, when `values` is not a whole number of values, or
//! when it contains the same value twice.
use std::hash::Hasher;

use serde::de::Error;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize};

use crate::hashset::{HashSet, INIT_BITS, MAX_BUCKETS};
use crate::representation::{Representation, RepresentationTrait};

/// Validate serialized parts of a set
fn check_parts(value_length: usize, significant_bits: u32, values: &[u8]) -> crate::Result<()> {
    if significant_bits < INIT_BITS
        || significant_bits % 2 != 0
        || (1usize << significant_bits.min(usize::BITS - 1)) > MAX_BUCKETS
    {
        return Err(crate::Error::InvalidState(format!(
            "invalid number of significant bits: {}",
            significant_bits
        )));
    }
    if value_length == 0 || values.len() % value_length != 0 {
        return Err(crate::Error::InvalidState(format!(
            "{} bytes are not a whole number of {}-byte values",
            values.len(),
            value_length
        )));
    }
    Ok(())
}

/// Error for a value found twice in serialized state
fn duplicate(value: &[u8]) -> crate::Error {
    crate::Error::InvalidState(format!("duplicate value {:?}", value))
}

/// Rebuild a set from its serialized parts
fn restore<H: Hasher + Default>(
    value_length: usize,
    significant_bits: u32,
    values: &[u8],
) -> crate::Result<Representation<H>> {
    check_parts(value_length, significant_bits, values)?;
    let mut set = Representation::with_significant_bits(value_length, significant_bits)?;
    for value in values.chunks_exact(value_length) {
        if !set.insert_bytes(value)? {
            return Err(duplicate(value));
        }
    }
    Ok(set)
}

impl<H: Hasher + Default> Serialize for Representation<H> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut tup = serializer.serialize_tuple(3)?;
        tup.serialize_element(&self.value_length())?;
        tup.serialize_element(&self.significant_bits())?;
        tup.serialize_element(&self.to_bytes())?;
        tup.end()
    }
}

impl<'de, H: Hasher + Default> Deserialize<'de> for Representation<H> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let (value_length, significant_bits, values): (usize, u32, Vec<u8>) =
            Deserialize::deserialize(deserializer)?;
        restore(value_length, significant_bits, &values).map_err(D::Error::custom)
    }
}

impl<const L: usize, H: Hasher + Default> Serialize for HashSet<L, H> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut tup = serializer.serialize_tuple(3)?;
        tup.serialize_element(&L)?;
        tup.serialize_element(&self.significant_bits())?;
        tup.serialize_element(&RepresentationTrait::to_bytes(self))?;
        tup.end()
    }
}

impl<'de, const L: usize, H: Hasher + Default> Deserialize<'de> for HashSet<L, H> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let (value_length, significant_bits, values): (usize, u32, Vec<u8>) =
            Deserialize::deserialize(deserializer)?;
        if value_length != L {
            return Err(D::Error::custom(crate::Error::WidthMismatch {
                expected: L,
                actual: value_length,
            }));
        }
        check_parts(value_length, significant_bits, &values).map_err(D::Error::custom)?;

        let mut set = HashSet::with_significant_bits(significant_bits).map_err(D::Error::custom)?;
        for value in values.chunks_exact(L) {
            if !set.insert_bytes(value).map_err(D::Error::custom)? {
                return Err(D::Error::custom(duplicate(value)));
            }
        }
        Ok(set)
    }
}
