//! NDR string types
//!
//! Two string shapes appear in interface definitions:
//!
//! - `[string]` strings are conformant varying arrays that carry their own
//!   NUL terminator:
//!   ```text
//!   max_count     # elements including NUL
//!   offset        # always 0
//!   actual_count  # elements including NUL
//!   chars[actual_count]
//!   ```
//! - Sized buffers (`[size_is(n)] wchar_t s[]`) are plain conformant arrays:
//!   one size word, then exactly that many characters, NUL padded on encode.
//!
//! Both decode by truncating at the first NUL; nothing after it is kept.

use std::char::decode_utf16;
use std::iter;

use crate::arrays::{read_variance, write_variance};
use crate::{Marshal, NdrError, NdrPrimitive, NdrReader, NdrWriter, Result, Unmarshal};

/// Length in UTF-16 code units, terminator included
pub fn utf16_len(s: &str) -> u64 {
    s.encode_utf16().count() as u64 + 1
}

fn until_nul<T: NdrPrimitive + PartialEq>(mut units: Vec<T>) -> Vec<T> {
    if let Some(end) = units.iter().position(|unit| *unit == T::default()) {
        units.truncate(end);
    }
    units
}

fn from_utf16(units: Vec<u16>) -> Result<String> {
    Ok(decode_utf16(until_nul(units)).collect::<std::result::Result<String, _>>()?)
}

fn from_chars(chars: Vec<u8>) -> Result<String> {
    Ok(String::from_utf8(until_nul(chars))?)
}

fn write_units<T: NdrPrimitive>(w: &mut NdrWriter<'_>, units: impl Iterator<Item = T>) -> Result<()> {
    for unit in units {
        w.write_data(unit)?;
    }
    Ok(())
}

fn read_units<T: NdrPrimitive>(r: &mut NdrReader<'_>, count: u64) -> Result<Vec<T>> {
    r.check_size(count)?;
    let count = usize::try_from(count).map_err(|_| NdrError::SizeOverflow(count))?;
    let mut units = Vec::with_capacity(count);
    for _ in 0..count {
        units.push(r.read_value()?);
    }
    Ok(units)
}

fn write_varying<T: NdrPrimitive>(w: &mut NdrWriter<'_>, units: Vec<T>) -> Result<()> {
    let count = units.len() as u64;
    w.write_size(count)?;
    write_variance(w, 0, count)?;
    write_units(w, units.into_iter())
}

fn read_varying<T: NdrPrimitive>(r: &mut NdrReader<'_>) -> Result<Vec<T>> {
    let max_count = r.read_size_word()?;
    let (offset, actual_count) = read_variance(r, max_count)?;
    if offset != 0 {
        return Err(NdrError::InvalidString(format!("non-zero offset {offset}")));
    }
    read_units(r, actual_count)
}

/// Write a `[string] wchar_t*`
pub fn write_utf16_string(w: &mut NdrWriter<'_>, s: &str) -> Result<()> {
    write_varying(w, s.encode_utf16().chain(iter::once(0)).collect())
}

/// Read a `[string] wchar_t*`
pub fn read_utf16_string(r: &mut NdrReader<'_>) -> Result<String> {
    from_utf16(read_varying(r)?)
}

/// Write a sized UTF-16 buffer of exactly `declared` code units
///
/// Shorter input is NUL padded, longer input is cut at `declared` units.
pub fn write_utf16_nstring(w: &mut NdrWriter<'_>, declared: u64, s: &str) -> Result<()> {
    let count = usize::try_from(declared).map_err(|_| NdrError::SizeOverflow(declared))?;
    w.write_size(declared)?;
    write_units(w, s.encode_utf16().chain(iter::repeat(0)).take(count))
}

/// Read a sized UTF-16 buffer
pub fn read_utf16_nstring(r: &mut NdrReader<'_>) -> Result<String> {
    let mut size = 0;
    r.read_size(&mut size)?;
    from_utf16(read_units(r, size)?)
}

/// Write a `[string] char*`
pub fn write_char_string(w: &mut NdrWriter<'_>, s: &str) -> Result<()> {
    write_varying(w, s.bytes().chain(iter::once(0)).collect())
}

/// Read a `[string] char*`
pub fn read_char_string(r: &mut NdrReader<'_>) -> Result<String> {
    from_chars(read_varying(r)?)
}

/// Write a sized 8-bit buffer of exactly `declared` bytes
pub fn write_char_nstring(w: &mut NdrWriter<'_>, declared: u64, s: &str) -> Result<()> {
    let count = usize::try_from(declared).map_err(|_| NdrError::SizeOverflow(declared))?;
    w.write_size(declared)?;
    write_units(w, s.bytes().chain(iter::repeat(0)).take(count))
}

/// Read a sized 8-bit buffer
pub fn read_char_nstring(r: &mut NdrReader<'_>) -> Result<String> {
    let mut size = 0;
    r.read_size(&mut size)?;
    from_chars(read_units(r, size)?)
}

/// Write a `[string] char s[capacity]` embedded array
///
/// Only the offset and actual count precede the characters. Input longer
/// than `capacity - 1` bytes is cut; an empty string, or any string when
/// `capacity` is 0, is sent with no terminator.
pub fn write_char_vstring(w: &mut NdrWriter<'_>, capacity: u64, s: &str) -> Result<()> {
    let max_chars = usize::try_from(capacity.saturating_sub(1)).map_err(|_| NdrError::SizeOverflow(capacity))?;
    let mut chars: Vec<u8> = s.bytes().take(max_chars).collect();
    if !s.is_empty() && capacity > 0 {
        chars.push(0);
    }
    write_variance(w, 0, chars.len() as u64)?;
    write_units(w, chars.into_iter())
}

/// Read a `[string] char s[capacity]` embedded array
pub fn read_char_vstring(r: &mut NdrReader<'_>, capacity: u64) -> Result<String> {
    let (offset, actual_count) = read_variance(r, capacity)?;
    if offset != 0 {
        return Err(NdrError::InvalidString(format!("non-zero offset {offset}")));
    }
    from_chars(read_units(r, actual_count)?)
}

/// ANSI string type (null-terminated char*)
///
/// Used for [string] annotated char* parameters in MIDL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NdrString(pub String);

impl NdrString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NdrString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Marshal for NdrString {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        write_char_string(w, &self.0)
    }
}

impl Unmarshal for NdrString {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        self.0 = read_char_string(r)?;
        Ok(())
    }
}

/// Wide string type (null-terminated wchar_t*)
///
/// Used for [string] annotated wchar_t* parameters in MIDL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NdrWString(pub String);

impl NdrWString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NdrWString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Marshal for NdrWString {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        write_utf16_string(w, &self.0)
    }
}

impl Unmarshal for NdrWString {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        self.0 = read_utf16_string(r)?;
        Ok(())
    }
}
