//! NDR encoding/decoding context
//!
//! The context carries the negotiated data representation: byte order and
//! transfer syntax (NDR20 or NDR64). Both sides of a call must agree on it;
//! it is fixed for the duration of one encode or decode pass.

use std::fmt;
use std::str::FromStr;

use crate::NdrError;

/// Negotiated transfer syntax
///
/// NDR64 widens every size, count, offset and referent word to 64 bits and
/// adds explicit union and trailing structure padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferSyntax {
    /// 32-bit NDR (DCE 1.1)
    #[default]
    Ndr20,
    /// 64-bit NDR (MS-RPCE 2.2.5)
    Ndr64,
}

impl TransferSyntax {
    /// Width (and alignment) of size, offset and referent words
    pub fn word_size(self) -> usize {
        match self {
            TransferSyntax::Ndr20 => 4,
            TransferSyntax::Ndr64 => 8,
        }
    }

    /// Width (and alignment) of an enum on the wire
    pub fn enum_size(self) -> usize {
        match self {
            TransferSyntax::Ndr20 => 2,
            TransferSyntax::Ndr64 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TransferSyntax::Ndr20 => "ndr20",
            TransferSyntax::Ndr64 => "ndr64",
        }
    }
}

impl fmt::Display for TransferSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransferSyntax {
    type Err = NdrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ndr" | "ndr20" => Ok(TransferSyntax::Ndr20),
            "ndr64" => Ok(TransferSyntax::Ndr64),
            _ => Err(NdrError::UnknownSyntax(s.to_string())),
        }
    }
}

/// NDR encoding/decoding context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdrContext {
    /// Whether to use little-endian byte order
    pub little_endian: bool,
    /// Transfer syntax in effect
    pub syntax: TransferSyntax,
}

impl NdrContext {
    /// Create a new NDR context with little-endian byte order (default)
    pub fn new() -> Self {
        Self {
            little_endian: true,
            syntax: TransferSyntax::Ndr20,
        }
    }

    /// Create a context with big-endian byte order
    pub fn big_endian() -> Self {
        Self::with_byte_order(false)
    }

    /// Create a context with specified byte order
    pub fn with_byte_order(little_endian: bool) -> Self {
        Self {
            little_endian,
            ..Self::new()
        }
    }

    /// Little-endian NDR64 context
    pub fn ndr64() -> Self {
        Self::new().with_syntax(TransferSyntax::Ndr64)
    }

    pub fn with_syntax(self, syntax: TransferSyntax) -> Self {
        Self { syntax, ..self }
    }

    pub fn is_ndr64(&self) -> bool {
        self.syntax == TransferSyntax::Ndr64
    }

    /// Alignment of referent IDs, and of any structure containing a pointer
    pub fn pointer_align(&self) -> usize {
        self.syntax.word_size()
    }

    /// Calculate padding needed to align to the given boundary
    #[inline]
    pub fn align_padding(position: usize, alignment: usize) -> usize {
        if alignment <= 1 {
            return 0;
        }
        match position % alignment {
            0 => 0,
            rem => alignment - rem,
        }
    }
}

impl Default for NdrContext {
    fn default() -> Self {
        Self::new()
    }
}
