//! NDR (Network Data Representation) codec
//!
//! This crate implements the NDR transfer syntax used by DCE RPC and DCOM
//! (NDR20 and NDR64, MS-RPCE 2.2.5) as an engine for generated stubs.
//!
//! # NDR Wire Format
//!
//! - Primitives align to their natural size (1, 2, 4, or 8 bytes)
//! - Conformant arrays and strings are preceded by size words
//! - Embedded pointers are referent IDs (0 = null); the data they point to
//!   is written after all immediate fields of the enclosing aggregate, in
//!   the order the pointers were seen
//!
//! [`NdrWriter`] and [`NdrReader`] carry the primitive, size and pointer
//! layers plus the deferred pointee queue. Types implement [`Marshal`] and
//! [`Unmarshal`] by calling into them field by field; [`Call`] drives a
//! whole [`Operation`] request or response.
//!
//! ```
//! use ndr_codec::{marshal, unmarshal, ConformantArray, NdrContext};
//!
//! let ctx = NdrContext::new();
//! let bytes = marshal(ctx, &ConformantArray::new(vec![1u16, 2])).unwrap();
//! assert_eq!(&bytes[..], &[2, 0, 0, 0, 1, 0, 2, 0]);
//!
//! let decoded: ConformantArray<u16> = unmarshal(ctx, bytes).unwrap();
//! assert_eq!(decoded.elements, vec![1, 2]);
//! ```

mod context;
mod decode;
mod encode;
mod error;
mod primitives;
mod reader;
mod writer;

pub mod arrays;
pub mod operation;
pub mod orpc;
pub mod pointers;
pub mod strings;
pub mod unions;

pub use arrays::{ConformantArray, ConformantVaryingArray, VaryingArray};
pub use context::{NdrContext, TransferSyntax};
pub use decode::{unmarshal, unmarshal_into, Unmarshal};
pub use encode::{marshal, Marshal};
pub use error::{ErrorKind, NdrError, Result};
pub use operation::{Call, Hresult, Operation, OperationError, Payload, PrepareHook};
pub use orpc::{ComVersion, OrpcExtent, OrpcExtentArray, OrpcThat, OrpcThis};
pub use pointers::{FullPtr, RefPtr, UniquePtr};
pub use primitives::{Guid, NdrPrimitive};
pub use reader::{DeferredRead, NdrReader};
pub use strings::{NdrString, NdrWString};
pub use unions::Union;
pub use writer::{DeferredWrite, NdrWriter, FIRST_REFERENT_ID, MAX_NESTING_DEPTH};

/// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};
