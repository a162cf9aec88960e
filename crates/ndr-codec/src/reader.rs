//! NDR stream reader
//!
//! [`NdrReader`] is the decode-side mirror of [`NdrWriter`](crate::NdrWriter).
//! Reads never go past the end of the input: every short read is a
//! [`NdrError::BufferUnderflow`], and size prefixes larger than the remaining
//! input are rejected before anything is allocated for them.

use bytes::{Buf, Bytes};
use tracing::{debug, trace};

use crate::{NdrContext, NdrError, NdrPrimitive, Result, Unmarshal, MAX_NESTING_DEPTH};

/// Deferred pointee reader
pub type DeferredRead<'r> = Box<dyn FnOnce(&mut NdrReader<'r>) -> Result<()> + 'r>;

/// Decoder for one NDR stream
///
/// `'r` is the lifetime of the values being filled in: a pointer's target is
/// borrowed until its deferred pointee has been read.
pub struct NdrReader<'r> {
    ctx: NdrContext,
    buf: Bytes,
    total: usize,
    frames: Vec<Vec<DeferredRead<'r>>>,
}

impl<'r> NdrReader<'r> {
    pub fn new(ctx: NdrContext, data: impl Into<Bytes>) -> Self {
        let buf = data.into();
        Self {
            ctx,
            total: buf.len(),
            buf,
            frames: vec![Vec::new()],
        }
    }

    pub fn context(&self) -> &NdrContext {
        &self.ctx
    }

    /// Bytes left to read
    pub fn len(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    /// Offset from the start of the stream
    pub fn position(&self) -> usize {
        self.total - self.buf.remaining()
    }

    /// Number of queued pointees across all open frames
    pub fn pending(&self) -> usize {
        self.frames.iter().map(Vec::len).sum()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let have = self.buf.remaining();
        if have < needed {
            return Err(NdrError::BufferUnderflow { needed, have });
        }
        Ok(())
    }

    /// Skip padding up to the given boundary
    pub fn read_align(&mut self, alignment: usize) -> Result<()> {
        let padding = NdrContext::align_padding(self.position(), alignment);
        self.ensure(padding)?;
        self.buf.advance(padding);
        Ok(())
    }

    /// Read a primitive at its natural alignment
    pub fn read_data<T: NdrPrimitive>(&mut self, value: &mut T) -> Result<()> {
        *value = self.read_value()?;
        Ok(())
    }

    /// Read and return a primitive at its natural alignment
    pub fn read_value<T: NdrPrimitive>(&mut self) -> Result<T> {
        let padding = NdrContext::align_padding(self.position(), T::SIZE);
        self.ensure(padding + T::SIZE)?;
        self.buf.advance(padding);
        Ok(T::get(&mut self.buf, self.ctx.little_endian))
    }

    /// Read an enum value (16-bit under NDR20, 32-bit under NDR64)
    pub fn read_enum(&mut self, value: &mut u16) -> Result<()> {
        *value = if self.ctx.is_ndr64() {
            let wide: u32 = self.read_value()?;
            u16::try_from(wide).map_err(|_| NdrError::InvalidEnumValue(wide))?
        } else {
            self.read_value()?
        };
        Ok(())
    }

    /// Read one size word without bounding it
    ///
    /// Only for words that do not count transmitted elements, such as the
    /// maximum count of a varying array.
    pub fn read_size_word(&mut self) -> Result<u64> {
        if self.ctx.is_ndr64() {
            self.read_value()
        } else {
            self.read_value::<u32>().map(u64::from)
        }
    }

    /// Read a size word that counts elements following in the stream
    ///
    /// Sizes larger than the number of bytes left are rejected with
    /// [`NdrError::MalformedSize`]: every element takes at least one byte, so
    /// such a size can only come from corrupt or hostile input.
    pub fn read_size(&mut self, size: &mut u64) -> Result<()> {
        let value = self.read_size_word()?;
        self.check_size(value)?;
        *size = value;
        Ok(())
    }

    /// Bound an element count by the bytes left
    pub fn check_size(&self, size: u64) -> Result<()> {
        let remaining = self.buf.remaining();
        if size > remaining as u64 {
            debug!(size, remaining, position = self.position(), "rejecting oversized size prefix");
            return Err(NdrError::MalformedSize { size, remaining });
        }
        Ok(())
    }

    /// Read a union discriminant
    pub fn read_switch<T: NdrPrimitive>(&mut self, discriminant: &mut T) -> Result<()> {
        self.read_data(discriminant)
    }

    /// Skip the padding before a union arm (NDR64 only)
    pub fn read_union_align(&mut self, alignment: usize) -> Result<()> {
        if self.ctx.is_ndr64() {
            self.read_align(alignment)?;
        }
        Ok(())
    }

    /// Skip the tail padding of a structure (NDR64 only)
    pub fn read_trailing_gap(&mut self, alignment: usize) -> Result<()> {
        self.read_union_align(alignment)
    }

    /// Take `count` raw bytes with no alignment
    pub fn read_bytes(&mut self, count: usize) -> Result<Bytes> {
        self.ensure(count)?;
        Ok(self.buf.copy_to_bytes(count))
    }

    fn read_referent(&mut self) -> Result<u64> {
        if self.ctx.is_ndr64() {
            self.read_value()
        } else {
            self.read_value::<u32>().map(u64::from)
        }
    }

    fn defer(&mut self, op: DeferredRead<'r>) {
        match self.frames.last_mut() {
            Some(frame) => frame.push(op),
            None => self.frames.push(vec![op]),
        }
    }

    /// Read an embedded pointer
    ///
    /// A null referent leaves `slot` as `None`. Otherwise `slot` is set to
    /// `Some(T::default())` right away and `deferred` fills it in on the next
    /// [`read_deferred`](Self::read_deferred).
    pub fn read_pointer<T, F>(&mut self, slot: &'r mut Option<T>, deferred: F) -> Result<()>
    where
        T: Default + 'r,
        F: FnOnce(&'r mut T, &mut NdrReader<'r>) -> Result<()> + 'r,
    {
        if self.read_referent()? == 0 {
            *slot = None;
            return Ok(());
        }
        let target = slot.insert(T::default());
        self.defer(Box::new(move |r: &mut NdrReader<'r>| deferred(target, r)));
        Ok(())
    }

    /// Read an embedded `[ref]` pointer into an existing target
    pub fn read_ref_pointer<T, F>(&mut self, target: &'r mut T, deferred: F) -> Result<()>
    where
        T: 'r,
        F: FnOnce(&'r mut T, &mut NdrReader<'r>) -> Result<()> + 'r,
    {
        let referent = self.read_referent()?;
        if referent == 0 {
            debug!(position = self.position(), "null referent for a [ref] pointer");
            return Err(NdrError::InvalidPointer(referent));
        }
        self.defer(Box::new(move |r: &mut NdrReader<'r>| deferred(target, r)));
        Ok(())
    }

    /// Read a `[unique]` pointer to an unmarshalable value
    pub fn read_unique<T: Unmarshal + Default + 'r>(&mut self, slot: &'r mut Option<T>) -> Result<()> {
        self.read_pointer(slot, |target, r| target.unmarshal_ndr(r))
    }

    /// Read an embedded `[ref]` pointer to an unmarshalable value
    pub fn read_ref<T: Unmarshal + 'r>(&mut self, target: &'r mut T) -> Result<()> {
        self.read_ref_pointer(target, |target, r| target.unmarshal_ndr(r))
    }

    /// Read the pointees queued on the current frame
    pub fn read_deferred(&mut self) -> Result<()> {
        let queued = match self.frames.last_mut() {
            Some(frame) if !frame.is_empty() => std::mem::take(frame),
            _ => return Ok(()),
        };

        let depth = self.frames.len();
        if depth > MAX_NESTING_DEPTH {
            debug!(depth, position = self.position(), "pointee nesting limit reached");
            return Err(NdrError::NestingTooDeep { depth });
        }

        trace!(depth, count = queued.len(), "reading deferred pointees");
        for op in queued {
            self.frames.push(Vec::new());
            let result = op(self).and_then(|()| self.read_deferred());
            self.frames.pop();
            result?;
        }
        Ok(())
    }

    /// End the pass and return whatever input was not consumed
    pub fn finish(self) -> Result<Bytes> {
        let pending = self.pending();
        if pending > 0 {
            debug!(pending, "decode finished with unread pointees");
            return Err(NdrError::UnresolvedReferent { pending });
        }
        Ok(self.buf)
    }
}
