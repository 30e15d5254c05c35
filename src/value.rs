//! Value types accepted at the aggregation boundary.
//!
//! The host describes every argument with a [`ValueType`]: its storage length
//! and whether it is passed by value. Only fixed-length by-value types can be
//! counted, since the set compares values by their raw bytes.

use crate::error::{Error, Result};

/// Storage length of a host type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeLength {
    /// Every value occupies exactly this many bytes.
    Fixed(u16),
    /// Length-prefixed variable-length value.
    Varlena,
    /// Null-terminated string.
    CString,
}

/// Declared type of an accumulated value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueType {
    pub length: TypeLength,
    pub by_value: bool,
}

impl ValueType {
    /// Fixed-length type passed by value
    pub const fn fixed(width: u16) -> Self {
        Self {
            length: TypeLength::Fixed(width),
            by_value: true,
        }
    }

    /// Variable-length type passed by reference
    pub const fn varlena() -> Self {
        Self {
            length: TypeLength::Varlena,
            by_value: false,
        }
    }

    /// Return value width in bytes if values of this type can be counted,
    /// otherwise fail with `Error::UnsupportedType`.
    #[inline]
    pub fn fixed_width(&self) -> Result<usize> {
        match self.length {
            TypeLength::Fixed(width) if self.by_value && width > 0 => Ok(usize::from(width)),
            length => Err(Error::UnsupportedType {
                length,
                by_value: self.by_value,
            }),
        }
    }
}

/// Rust types with a fixed-width, by-value byte image.
pub trait FixedWidth: Copy {
    /// Width of the byte image
    const WIDTH: usize;
    /// Byte image of the value
    type Bytes: AsRef<[u8]>;

    fn to_bytes(self) -> Self::Bytes;

    /// Host type descriptor matching `WIDTH`
    fn value_type() -> ValueType {
        // widths are at most 8 bytes
        ValueType::fixed(Self::WIDTH as u16)
    }
}

macro_rules! impl_fixed_width {
    ($($t:ty),*) => {
        $(
            impl FixedWidth for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();
                type Bytes = [u8; std::mem::size_of::<$t>()];

                #[inline]
                fn to_bytes(self) -> Self::Bytes {
                    self.to_ne_bytes()
                }
            }
        )*
    };
}

impl_fixed_width!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

impl FixedWidth for bool {
    const WIDTH: usize = 1;
    type Bytes = [u8; 1];

    #[inline]
    fn to_bytes(self) -> Self::Bytes {
        [u8::from(self)]
    }
}

impl FixedWidth for char {
    const WIDTH: usize = 4;
    type Bytes = [u8; 4];

    #[inline]
    fn to_bytes(self) -> Self::Bytes {
        u32::from(self).to_ne_bytes()
    }
}
