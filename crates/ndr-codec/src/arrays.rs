//! NDR array types
//!
//! NDR supports several array types:
//!
//! - Fixed arrays: size known at compile time (`[T; N]`)
//! - Conformant arrays: size determined at runtime, transmitted as prefix
//! - Varying arrays: subset of elements transmitted
//! - Conformant varying arrays: both conformant and varying
//!
//! The size prefix is authoritative. Encoding writes exactly the declared
//! number of elements, truncating the slice or padding it with default
//! values; decoding produces exactly the declared number of elements.
//!
//! The free functions are what hand-written aggregates use; when a struct is
//! conformant its size words are written up front with
//! [`NdrWriter::write_size`] and only the elements are written with
//! [`write_elements`] at the end.

use crate::{Marshal, NdrError, NdrReader, NdrWriter, Result, Unmarshal};

fn element_count(count: u64) -> Result<usize> {
    usize::try_from(count).map_err(|_| NdrError::SizeOverflow(count))
}

/// Write a conformant array: one size word, then `dim_size` elements
pub fn write_conformant<'a, T: Marshal + Default>(
    w: &mut NdrWriter<'a>,
    dim_size: u64,
    elements: &'a [T],
) -> Result<()> {
    w.write_size(dim_size)?;
    write_elements(w, dim_size, elements)
}

/// Write exactly `count` elements of `elements`
///
/// Missing elements are sent as `T::default()`, extra ones are dropped.
pub fn write_elements<'a, T: Marshal + Default>(
    w: &mut NdrWriter<'a>,
    count: u64,
    elements: &'a [T],
) -> Result<()> {
    let count = element_count(count)?;
    let present = count.min(elements.len());
    for element in &elements[..present] {
        element.marshal_ndr(w)?;
    }
    for _ in present..count {
        w.write_zero::<T>()?;
    }
    Ok(())
}

/// Write `count` embedded structs where any element may be absent
///
/// An absent element is sent as the zero struct, never as a null pointer.
pub fn write_struct_elements<'a, T: Marshal + Default>(
    w: &mut NdrWriter<'a>,
    count: u64,
    elements: &'a [Option<T>],
) -> Result<()> {
    for i in 0..element_count(count)? {
        match elements.get(i).and_then(Option::as_ref) {
            Some(element) => element.marshal_ndr(w)?,
            None => w.write_zero::<T>()?,
        }
    }
    Ok(())
}

/// Write `count` `[unique]` pointers; absent elements are null
pub fn write_unique_elements<'a, T: Marshal>(
    w: &mut NdrWriter<'a>,
    count: u64,
    elements: &'a [Option<T>],
) -> Result<()> {
    for i in 0..element_count(count)? {
        w.write_unique(elements.get(i).and_then(Option::as_ref))?;
    }
    Ok(())
}

/// Read a conformant array: one size word, then that many elements
pub fn read_conformant<'r, T: Unmarshal + Default>(
    r: &mut NdrReader<'r>,
    elements: &'r mut Vec<T>,
) -> Result<u64> {
    let mut size = 0;
    r.read_size(&mut size)?;
    read_elements(r, size, elements)?;
    Ok(size)
}

/// Read exactly `count` elements, replacing the contents of `elements`
pub fn read_elements<'r, T: Unmarshal + Default>(
    r: &mut NdrReader<'r>,
    count: u64,
    elements: &'r mut Vec<T>,
) -> Result<()> {
    r.check_size(count)?;
    let count = element_count(count)?;
    elements.clear();
    elements.resize_with(count, T::default);
    for element in elements.iter_mut() {
        element.unmarshal_ndr(r)?;
    }
    Ok(())
}

/// Read `count` embedded structs; every element comes back present
pub fn read_struct_elements<'r, T: Unmarshal + Default>(
    r: &mut NdrReader<'r>,
    count: u64,
    elements: &'r mut Vec<Option<T>>,
) -> Result<()> {
    r.check_size(count)?;
    let count = element_count(count)?;
    elements.clear();
    elements.resize_with(count, || None);
    for slot in elements.iter_mut() {
        slot.insert(T::default()).unmarshal_ndr(r)?;
    }
    Ok(())
}

/// Read `count` `[unique]` pointers
pub fn read_unique_elements<'r, T: Unmarshal + Default + 'r>(
    r: &mut NdrReader<'r>,
    count: u64,
    elements: &'r mut Vec<Option<T>>,
) -> Result<()> {
    r.check_size(count)?;
    let count = element_count(count)?;
    elements.clear();
    elements.resize_with(count, || None);
    for slot in elements.iter_mut() {
        r.read_unique(slot)?;
    }
    Ok(())
}

/// Write the (offset, actual count) pair of a varying array
pub fn write_variance(w: &mut NdrWriter<'_>, offset: u64, actual_count: u64) -> Result<()> {
    w.write_size(offset)?;
    w.write_size(actual_count)
}

/// Read the (offset, actual count) pair of a varying array
///
/// The actual count is bounded by the bytes left, and `offset + actual`
/// must fit in `max_count`.
pub fn read_variance(r: &mut NdrReader<'_>, max_count: u64) -> Result<(u64, u64)> {
    let offset = r.read_size_word()?;
    let mut actual_count = 0;
    r.read_size(&mut actual_count)?;
    check_variance(max_count, offset, actual_count)?;
    Ok((offset, actual_count))
}

fn check_variance(max_count: u64, offset: u64, actual_count: u64) -> Result<()> {
    match offset.checked_add(actual_count) {
        Some(total) if total <= max_count => Ok(()),
        _ => Err(NdrError::ConformanceMismatch {
            max_count,
            actual_count: offset.saturating_add(actual_count),
        }),
    }
}

/// Conformant array - size determined at runtime
///
/// Wire format:
/// ```text
/// max_count            # size word, u32 (NDR20) or u64 (NDR64)
/// elements[max_count]  # element data
/// ```
///
/// `dim_size` is what goes on the wire; it normally equals the element
/// count but may be larger (elements are padded) or smaller (truncated).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConformantArray<T> {
    pub dim_size: u64,
    pub elements: Vec<T>,
}

impl<T> ConformantArray<T> {
    pub fn new(elements: Vec<T>) -> Self {
        Self {
            dim_size: elements.len() as u64,
            elements,
        }
    }

    /// Array with an explicit declared dimension
    pub fn with_size(dim_size: u64, elements: Vec<T>) -> Self {
        Self { dim_size, elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<T> From<Vec<T>> for ConformantArray<T> {
    fn from(elements: Vec<T>) -> Self {
        Self::new(elements)
    }
}

impl<T: Marshal + Default> Marshal for ConformantArray<T> {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        write_conformant(w, self.dim_size, &self.elements)
    }
}

impl<T: Unmarshal + Default> Unmarshal for ConformantArray<T> {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        self.dim_size = read_conformant(r, &mut self.elements)?;
        Ok(())
    }
}

/// Varying array of at most `N` elements
///
/// Wire format:
/// ```text
/// offset        # first transmitted element
/// actual_count  # number of transmitted elements
/// elements[actual_count]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaryingArray<T, const N: usize> {
    pub offset: u64,
    pub elements: Vec<T>,
}

impl<T, const N: usize> Default for VaryingArray<T, N> {
    fn default() -> Self {
        Self {
            offset: 0,
            elements: Vec::new(),
        }
    }
}

impl<T, const N: usize> VaryingArray<T, N> {
    pub fn new(elements: Vec<T>) -> Self {
        Self { offset: 0, elements }
    }

    pub fn capacity(&self) -> usize {
        N
    }
}

impl<T: Marshal + Default, const N: usize> Marshal for VaryingArray<T, N> {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let actual_count = self.elements.len() as u64;
        check_variance(N as u64, self.offset, actual_count)?;
        write_variance(w, self.offset, actual_count)?;
        write_elements(w, actual_count, &self.elements)
    }
}

impl<T: Unmarshal + Default, const N: usize> Unmarshal for VaryingArray<T, N> {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        let (offset, actual_count) = read_variance(r, N as u64)?;
        self.offset = offset;
        read_elements(r, actual_count, &mut self.elements)
    }
}

/// Conformant varying array
///
/// Wire format:
/// ```text
/// max_count     # allocated size, not bounded by the stream
/// offset
/// actual_count
/// elements[actual_count]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConformantVaryingArray<T> {
    pub max_count: u64,
    pub offset: u64,
    pub elements: Vec<T>,
}

impl<T> ConformantVaryingArray<T> {
    /// Array whose capacity equals its length
    pub fn new(elements: Vec<T>) -> Self {
        Self::with_max(elements.len() as u64, elements)
    }

    pub fn with_max(max_count: u64, elements: Vec<T>) -> Self {
        Self {
            max_count,
            offset: 0,
            elements,
        }
    }
}

impl<T: Marshal + Default> Marshal for ConformantVaryingArray<T> {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let actual_count = self.elements.len() as u64;
        check_variance(self.max_count, self.offset, actual_count)?;
        w.write_size(self.max_count)?;
        write_variance(w, self.offset, actual_count)?;
        write_elements(w, actual_count, &self.elements)
    }
}

impl<T: Unmarshal + Default> Unmarshal for ConformantVaryingArray<T> {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        self.max_count = r.read_size_word()?;
        let (offset, actual_count) = read_variance(r, self.max_count)?;
        self.offset = offset;
        read_elements(r, actual_count, &mut self.elements)
    }
}
