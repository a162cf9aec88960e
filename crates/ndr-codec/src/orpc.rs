//! ORPC (Object RPC) header types (MS-DCOM 2.2.13, 2.2.14)
//!
//! `ORPCTHIS` is the first field of every DCOM request and `ORPCTHAT` the
//! first field of every response. Both carry an optional extension array,
//! which exercises most of the codec: a unique pointer to a structure
//! holding a unique pointer to a conformant array of unique pointers to
//! conformant structures.

use crate::arrays::{read_elements, read_unique_elements, write_elements, write_unique_elements};
use crate::{Guid, Marshal, NdrError, NdrReader, NdrWriter, Result, Unmarshal};

/// Length of a sequence as the 32-bit count ORPC sends
fn wire_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| NdrError::SizeOverflow(len as u64))
}

/// COM version structure (MS-DCOM 2.2.11)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ComVersion {
    pub major: u16,
    pub minor: u16,
}

impl ComVersion {
    /// DCOM version 5.1 (Windows 2000)
    pub const DCOM_5_1: Self = Self { major: 5, minor: 1 };
    /// DCOM version 5.4 (Windows XP/2003)
    pub const DCOM_5_4: Self = Self { major: 5, minor: 4 };
    /// DCOM version 5.6 (Windows Vista)
    pub const DCOM_5_6: Self = Self { major: 5, minor: 6 };
    /// DCOM version 5.7 (Windows 7)
    pub const DCOM_5_7: Self = Self { major: 5, minor: 7 };

    pub fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl Marshal for ComVersion {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_align(2)?;
        w.write_data(self.major)?;
        w.write_data(self.minor)
    }
}

impl Unmarshal for ComVersion {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        r.read_align(2)?;
        r.read_data(&mut self.major)?;
        r.read_data(&mut self.minor)
    }
}

/// ORPC extension entry (MS-DCOM 2.2.21.4)
///
/// A conformant structure: the byte count of `data`, rounded up to a
/// multiple of 8, is sent ahead of the structure.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct OrpcExtent {
    /// Format of the opaque data
    pub id: Guid,
    /// Data size without padding; 0 means `data.len()`
    pub size: u32,
    pub data: Vec<u8>,
}

impl OrpcExtent {
    /// Data longer than `u32::MAX` bytes fails to marshal with
    /// [`NdrError::SizeOverflow`].
    pub fn new(id: Guid, data: Vec<u8>) -> Self {
        Self {
            id,
            size: u32::try_from(data.len()).unwrap_or(u32::MAX),
            data,
        }
    }

    fn wire_size(&self) -> Result<u32> {
        let len = wire_len(self.data.len())?;
        Ok(match self.size {
            0 => len,
            size => size,
        })
    }

    fn dim_size(size: u32) -> u64 {
        u64::from(size.saturating_add(7) & !7)
    }
}

impl Marshal for OrpcExtent {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let size = self.wire_size()?;
        let dim_size = Self::dim_size(size);
        w.write_size(dim_size)?;
        w.write_align(4)?;
        self.id.marshal_ndr(w)?;
        w.write_data(size)?;
        write_elements(w, dim_size, &self.data)
    }
}

impl Unmarshal for OrpcExtent {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        let mut dim_size = 0;
        r.read_size(&mut dim_size)?;
        r.read_align(4)?;
        self.id.unmarshal_ndr(r)?;
        r.read_data(&mut self.size)?;
        read_elements(r, dim_size, &mut self.data)
    }
}

/// ORPC extent array (MS-DCOM 2.2.21.5)
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct OrpcExtentArray {
    /// Number of non-null entries; 0 means the length of `extents`
    pub size: u32,
    pub reserved: u32,
    /// `None` is sent as a null array pointer whatever `size` holds
    pub extents: Option<Vec<Option<OrpcExtent>>>,
}

impl OrpcExtentArray {
    pub fn new(extents: Vec<OrpcExtent>) -> Self {
        Self {
            size: u32::try_from(extents.len()).unwrap_or(u32::MAX),
            reserved: 0,
            extents: Some(extents.into_iter().map(Some).collect()),
        }
    }

    fn wire_size(&self) -> Result<u32> {
        match (self.size, &self.extents) {
            (0, Some(extents)) => wire_len(extents.len()),
            (size, _) => Ok(size),
        }
    }
}

impl Marshal for OrpcExtentArray {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let size = self.wire_size()?;
        // The array length is rounded up to an even count.
        let dim_size = u64::from(size.saturating_add(1) & !1);

        w.write_align(w.context().pointer_align())?;
        w.write_data(size)?;
        w.write_data(0u32)?;
        match self.extents.as_deref() {
            None => w.write_null_pointer(),
            Some(extents) => w.write_ref_pointer(move |w| {
                w.write_size(dim_size)?;
                write_unique_elements(w, dim_size, extents)
            }),
        }
    }
}

impl Unmarshal for OrpcExtentArray {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        r.read_align(r.context().pointer_align())?;
        r.read_data(&mut self.size)?;
        r.read_data(&mut self.reserved)?;
        r.read_pointer(&mut self.extents, |extents, r| {
            let mut dim_size = 0;
            r.read_size(&mut dim_size)?;
            read_unique_elements(r, dim_size, extents)
        })
    }
}

/// ORPCTHIS structure (MS-DCOM 2.2.13)
///
/// Sent with every ORPC request from client to server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrpcThis {
    pub version: ComVersion,
    /// Must be 0 in ORPC calls
    pub flags: u32,
    pub reserved1: u32,
    /// Causality ID (identifies the call chain)
    pub cid: Guid,
    pub extensions: Option<OrpcExtentArray>,
}

impl OrpcThis {
    pub fn new() -> Self {
        Self::with_causality(Guid::NIL)
    }

    pub fn with_causality(cid: Guid) -> Self {
        Self {
            version: ComVersion::DCOM_5_7,
            flags: 0,
            reserved1: 0,
            cid,
            extensions: None,
        }
    }
}

impl Default for OrpcThis {
    fn default() -> Self {
        Self::new()
    }
}

impl Marshal for OrpcThis {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_align(w.context().pointer_align())?;
        self.version.marshal_ndr(w)?;
        w.write_data(self.flags)?;
        w.write_data(self.reserved1)?;
        self.cid.marshal_ndr(w)?;
        w.write_unique(self.extensions.as_ref())
    }
}

impl Unmarshal for OrpcThis {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        r.read_align(r.context().pointer_align())?;
        self.version.unmarshal_ndr(r)?;
        r.read_data(&mut self.flags)?;
        r.read_data(&mut self.reserved1)?;
        self.cid.unmarshal_ndr(r)?;
        r.read_unique(&mut self.extensions)
    }
}

/// ORPCTHAT structure (MS-DCOM 2.2.14)
///
/// Sent with every ORPC response from server to client.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct OrpcThat {
    pub flags: u32,
    pub extensions: Option<OrpcExtentArray>,
}

impl OrpcThat {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Marshal for OrpcThat {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_align(w.context().pointer_align())?;
        w.write_data(self.flags)?;
        w.write_unique(self.extensions.as_ref())
    }
}

impl Unmarshal for OrpcThat {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        r.read_align(r.context().pointer_align())?;
        r.read_data(&mut self.flags)?;
        r.read_unique(&mut self.extensions)
    }
}
