//! NDR decoding trait

use bytes::Bytes;

use crate::{NdrContext, NdrReader, Result};

/// Types that can be decoded from NDR
///
/// Decoding fills `self` in place. Pointer fields are set to
/// `Some(Default::default())` as soon as a non-null referent is seen and
/// completed when the reader flushes its deferred pointees, so the value
/// stays borrowed by the reader for `'r`.
pub trait Unmarshal {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()>;
}

/// Decode one value from a complete stream
pub fn unmarshal<T: Unmarshal + Default>(ctx: NdrContext, data: impl Into<Bytes>) -> Result<T> {
    let mut value = T::default();
    unmarshal_into(ctx, data, &mut value)?;
    Ok(value)
}

/// Decode into an existing value and return the unread tail of `data`
pub fn unmarshal_into<T: Unmarshal + ?Sized>(
    ctx: NdrContext,
    data: impl Into<Bytes>,
    value: &mut T,
) -> Result<Bytes> {
    let mut r = NdrReader::new(ctx, data);
    value.unmarshal_ndr(&mut r)?;
    r.read_deferred()?;
    r.finish()
}

impl<T: Unmarshal + ?Sized> Unmarshal for Box<T> {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        (**self).unmarshal_ndr(r)
    }
}

impl<T: Unmarshal, const N: usize> Unmarshal for [T; N] {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        for element in self.iter_mut() {
            element.unmarshal_ndr(r)?;
        }
        Ok(())
    }
}
