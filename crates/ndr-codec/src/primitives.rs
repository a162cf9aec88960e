//! NDR primitive type implementations
//!
//! NDR primitive types and their encodings:
//!
//! | MIDL Type     | Rust Type | Size | Alignment |
//! |---------------|-----------|------|-----------|
//! | boolean       | bool      | 1    | 1         |
//! | byte/char     | u8        | 1    | 1         |
//! | small         | i8        | 1    | 1         |
//! | short         | i16       | 2    | 2         |
//! | long/int      | i32       | 4    | 4         |
//! | hyper         | i64       | 8    | 8         |
//! | unsigned short| u16       | 2    | 2         |
//! | unsigned long | u32       | 4    | 4         |
//! | unsigned hyper| u64       | 8    | 8         |
//! | float         | f32       | 4    | 4         |
//! | double        | f64       | 8    | 8         |
//! | wchar_t       | u16       | 2    | 2         |
//! | error_status_t| u32       | 4    | 4         |
//!
//! Alignments are identical under NDR20 and NDR64.

use std::fmt;

use bytes::{Buf, BufMut};

use crate::{Marshal, NdrReader, NdrWriter, Result, Unmarshal};

/// A fixed-size scalar, aligned to its own size on the wire
pub trait NdrPrimitive: Copy + Default {
    /// Encoded size in bytes, also the alignment
    const SIZE: usize;

    fn put<B: BufMut>(self, buf: &mut B, little_endian: bool);

    /// Caller guarantees `SIZE` bytes are available
    fn get<B: Buf>(buf: &mut B, little_endian: bool) -> Self;
}

macro_rules! impl_ndr_primitive {
    ($ty:ty, $size:expr, $put_le:ident, $put_be:ident, $get_le:ident, $get_be:ident) => {
        impl NdrPrimitive for $ty {
            const SIZE: usize = $size;

            #[inline]
            fn put<B: BufMut>(self, buf: &mut B, little_endian: bool) {
                if little_endian {
                    buf.$put_le(self)
                } else {
                    buf.$put_be(self)
                }
            }

            #[inline]
            fn get<B: Buf>(buf: &mut B, little_endian: bool) -> Self {
                if little_endian {
                    buf.$get_le()
                } else {
                    buf.$get_be()
                }
            }
        }
    };
}

impl_ndr_primitive!(u8, 1, put_u8, put_u8, get_u8, get_u8);
impl_ndr_primitive!(i8, 1, put_i8, put_i8, get_i8, get_i8);
impl_ndr_primitive!(u16, 2, put_u16_le, put_u16, get_u16_le, get_u16);
impl_ndr_primitive!(i16, 2, put_i16_le, put_i16, get_i16_le, get_i16);
impl_ndr_primitive!(u32, 4, put_u32_le, put_u32, get_u32_le, get_u32);
impl_ndr_primitive!(i32, 4, put_i32_le, put_i32, get_i32_le, get_i32);
impl_ndr_primitive!(u64, 8, put_u64_le, put_u64, get_u64_le, get_u64);
impl_ndr_primitive!(i64, 8, put_i64_le, put_i64, get_i64_le, get_i64);
impl_ndr_primitive!(f32, 4, put_f32_le, put_f32, get_f32_le, get_f32);
impl_ndr_primitive!(f64, 8, put_f64_le, put_f64, get_f64_le, get_f64);

/// NDR boolean - encoded as a single byte (0x00 = false, 0x01 = true)
impl NdrPrimitive for bool {
    const SIZE: usize = 1;

    fn put<B: BufMut>(self, buf: &mut B, _little_endian: bool) {
        buf.put_u8(u8::from(self));
    }

    fn get<B: Buf>(buf: &mut B, _little_endian: bool) -> Self {
        buf.get_u8() != 0
    }
}

macro_rules! impl_marshal_primitive {
    ($($ty:ty),*) => {
        $(
            impl Marshal for $ty {
                fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
                    w.write_data(*self)
                }
            }

            impl Unmarshal for $ty {
                fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
                    r.read_data(self)
                }
            }
        )*
    };
}

impl_marshal_primitive!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64, bool);

/// GUID/UUID type for NDR encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    /// Nil UUID
    pub const NIL: Self = Self {
        data1: 0,
        data2: 0,
        data3: 0,
        data4: [0; 8],
    };

    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self { data1, data2, data3, data4 }
    }

    /// Parse from string "xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx", braces optional
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('{').trim_end_matches('}');
        if s.len() != 36 {
            return None;
        }
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 5 || parts[4].len() != 12 {
            return None;
        }

        let data1 = u32::from_str_radix(parts[0], 16).ok()?;
        let data2 = u16::from_str_radix(parts[1], 16).ok()?;
        let data3 = u16::from_str_radix(parts[2], 16).ok()?;
        let clock = u16::from_str_radix(parts[3], 16).ok()?;

        let mut data4 = [0u8; 8];
        data4[..2].copy_from_slice(&clock.to_be_bytes());
        for (i, byte) in data4[2..].iter_mut().enumerate() {
            *byte = u8::from_str_radix(parts[4].get(i * 2..i * 2 + 2)?, 16).ok()?;
        }

        Some(Self { data1, data2, data3, data4 })
    }

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7],
        )
    }
}

// A GUID is a struct aligned to its first member
impl Marshal for Guid {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_align(4)?;
        w.write_data(self.data1)?;
        w.write_data(self.data2)?;
        w.write_data(self.data3)?;
        self.data4.marshal_ndr(w)
    }
}

impl Unmarshal for Guid {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        r.read_align(4)?;
        r.read_data(&mut self.data1)?;
        r.read_data(&mut self.data2)?;
        r.read_data(&mut self.data3)?;
        self.data4.unmarshal_ndr(r)
    }
}
