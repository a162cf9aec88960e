//! NDR encoding trait

use bytes::Bytes;

use crate::{NdrContext, NdrWriter, Result};

/// Types that can be encoded to NDR
///
/// An implementation writes the immediate fields of the value in declared
/// order. Pointees are queued on the writer and land after the immediate
/// fields of the outermost aggregate that flushes them.
pub trait Marshal {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()>;
}

/// Encode one value as a complete stream
///
/// Flushes the deferred pointees of `value` and fails if any were left
/// queued.
pub fn marshal<T: Marshal + ?Sized>(ctx: NdrContext, value: &T) -> Result<Bytes> {
    let mut w = NdrWriter::new(ctx);
    value.marshal_ndr(&mut w)?;
    w.write_deferred()?;
    w.finish()
}

impl<T: Marshal + ?Sized> Marshal for Box<T> {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        (**self).marshal_ndr(w)
    }
}

/// Fixed array: the elements in order, no size prefix
impl<T: Marshal, const N: usize> Marshal for [T; N] {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        for element in self {
            element.marshal_ndr(w)?;
        }
        Ok(())
    }
}
