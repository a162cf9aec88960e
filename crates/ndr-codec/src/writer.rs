//! NDR stream writer
//!
//! [`NdrWriter`] owns the output buffer for one encode pass and implements
//! the layers every marshaled value goes through:
//!
//! - primitives at their natural alignment ([`write_data`](NdrWriter::write_data))
//! - size words for conformant and varying data ([`write_size`](NdrWriter::write_size))
//! - referent IDs for embedded pointers ([`write_pointer`](NdrWriter::write_pointer))
//! - the deferred pointee queue ([`write_deferred`](NdrWriter::write_deferred))
//!
//! Pointees are not written where their pointer appears. They are queued on
//! the current frame and written by the next `write_deferred`, in the order the
//! pointers were met. Each pointee is written inside a fresh frame, so the
//! pointers it contains are flushed right after it and before its next
//! sibling pointee.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::{Marshal, NdrContext, NdrError, NdrPrimitive, Result};

/// First referent ID handed out in a pass
pub const FIRST_REFERENT_ID: u32 = 0x0002_0000;

const REFERENT_STEP: u32 = 4;

/// Deepest chain of nested pointees a pass will write or read
pub const MAX_NESTING_DEPTH: usize = 1024;

/// Deferred pointee writer
pub type DeferredWrite<'a> = Box<dyn FnOnce(&mut NdrWriter<'a>) -> Result<()> + 'a>;

enum Deferred<'a> {
    Value(&'a dyn Marshal),
    Func(DeferredWrite<'a>),
}

/// Encoder for one NDR stream
///
/// `'a` is the lifetime of the data being marshaled: queued pointees borrow
/// from it until they are flushed.
pub struct NdrWriter<'a> {
    ctx: NdrContext,
    buf: BytesMut,
    next_referent: u32,
    /// Frames open in the writer this one is scoped inside
    outer_depth: usize,
    frames: Vec<Vec<Deferred<'a>>>,
}

impl<'a> NdrWriter<'a> {
    pub fn new(ctx: NdrContext) -> Self {
        Self::with_capacity(ctx, 0)
    }

    pub fn with_capacity(ctx: NdrContext, capacity: usize) -> Self {
        Self {
            ctx,
            buf: BytesMut::with_capacity(capacity),
            next_referent: FIRST_REFERENT_ID,
            outer_depth: 0,
            frames: vec![Vec::new()],
        }
    }

    pub fn context(&self) -> &NdrContext {
        &self.ctx
    }

    /// Bytes written so far; also the current stream position
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of queued pointees across all open frames
    pub fn pending(&self) -> usize {
        self.frames.iter().map(Vec::len).sum()
    }

    /// Write zero padding up to the given boundary
    pub fn write_align(&mut self, alignment: usize) -> Result<()> {
        let padding = NdrContext::align_padding(self.buf.len(), alignment);
        self.buf.put_bytes(0, padding);
        Ok(())
    }

    /// Write a primitive at its natural alignment
    pub fn write_data<T: NdrPrimitive>(&mut self, value: T) -> Result<()> {
        self.write_align(T::SIZE)?;
        value.put(&mut self.buf, self.ctx.little_endian);
        Ok(())
    }

    /// Write an enum value
    ///
    /// Enums travel as 16-bit values under NDR20 and 32-bit under NDR64,
    /// whatever the width of the declared enum.
    pub fn write_enum(&mut self, value: u16) -> Result<()> {
        if self.ctx.is_ndr64() {
            self.write_data(u32::from(value))
        } else {
            self.write_data(value)
        }
    }

    /// Write one size word (conformance, offset or actual count)
    pub fn write_size(&mut self, size: u64) -> Result<()> {
        if self.ctx.is_ndr64() {
            self.write_data(size)
        } else {
            let size = u32::try_from(size).map_err(|_| NdrError::SizeOverflow(size))?;
            self.write_data(size)
        }
    }

    /// Write a union discriminant
    pub fn write_switch<T: NdrPrimitive>(&mut self, discriminant: T) -> Result<()> {
        self.write_data(discriminant)
    }

    /// Align the arm of a union; NDR20 arms align themselves
    pub fn write_union_align(&mut self, alignment: usize) -> Result<()> {
        if self.ctx.is_ndr64() {
            self.write_align(alignment)?;
        }
        Ok(())
    }

    /// Pad the tail of a structure to its alignment (NDR64 only)
    pub fn write_trailing_gap(&mut self, alignment: usize) -> Result<()> {
        self.write_union_align(alignment)
    }

    /// Append raw bytes with no alignment
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.put_slice(bytes);
        Ok(())
    }

    fn write_referent(&mut self, referent: u32) -> Result<()> {
        if self.ctx.is_ndr64() {
            self.write_data(u64::from(referent))
        } else {
            self.write_data(referent)
        }
    }

    fn allocate_referent(&mut self) -> u32 {
        let referent = self.next_referent;
        self.next_referent = self
            .next_referent
            .wrapping_add(REFERENT_STEP)
            .max(FIRST_REFERENT_ID);
        referent
    }

    fn defer(&mut self, op: Deferred<'a>) {
        match self.frames.last_mut() {
            Some(frame) => frame.push(op),
            None => self.frames.push(vec![op]),
        }
    }

    /// Write an embedded pointer
    ///
    /// `None` writes the null referent and drops `deferred`. `Some` writes a
    /// fresh referent ID and queues `deferred` to write the pointee on the next
    /// [`write_deferred`](Self::write_deferred).
    pub fn write_pointer<T, F>(&mut self, value: Option<&T>, deferred: F) -> Result<()>
    where
        T: ?Sized,
        F: FnOnce(&mut NdrWriter<'a>) -> Result<()> + 'a,
    {
        match value {
            None => self.write_null_pointer(),
            Some(_) => self.write_ref_pointer(deferred),
        }
    }

    /// Write the null referent
    pub fn write_null_pointer(&mut self) -> Result<()> {
        self.write_referent(0)
    }

    /// Write a non-null referent and queue its pointee
    pub fn write_ref_pointer<F>(&mut self, deferred: F) -> Result<()>
    where
        F: FnOnce(&mut NdrWriter<'a>) -> Result<()> + 'a,
    {
        let referent = self.allocate_referent();
        self.write_referent(referent)?;
        self.defer(Deferred::Func(Box::new(deferred)));
        Ok(())
    }

    /// Write a `[unique]` pointer to a marshalable value
    pub fn write_unique<T: Marshal>(&mut self, value: Option<&'a T>) -> Result<()> {
        match value {
            None => self.write_null_pointer(),
            Some(value) => {
                let referent = self.allocate_referent();
                self.write_referent(referent)?;
                self.defer(Deferred::Value(value));
                Ok(())
            }
        }
    }

    /// Write an embedded `[ref]` pointer
    ///
    /// A `[ref]` pointer is never null on the wire; an absent value is sent
    /// as `T::default()`.
    pub fn write_ref<T: Marshal + Default>(&mut self, value: Option<&'a T>) -> Result<()> {
        match value {
            Some(value) => self.write_unique(Some(value)),
            None => self.write_ref_pointer(|w| w.write_zero::<T>()),
        }
    }

    /// Write `T::default()` in place
    ///
    /// The immediate fields of the zero value are written now. Its pointees
    /// are queued on the current frame like those of any other value, and a
    /// fresh zero value is built to write them when that frame is flushed.
    pub fn write_zero<T: Marshal + Default + 'a>(&mut self) -> Result<()> {
        let zero = T::default();
        let queued = self.scoped(vec![Vec::new()], |scope| zero.marshal_ndr(scope))?;
        if queued > 0 {
            self.defer(Deferred::Func(Box::new(|w: &mut NdrWriter<'a>| {
                w.write_zero_pointees::<T>()
            })));
        }
        Ok(())
    }

    fn write_zero_pointees<T: Marshal + Default>(&mut self) -> Result<()> {
        let zero = T::default();
        // Only the queue is kept; the immediate fields are already written.
        let mut scratch = NdrWriter::new(self.ctx);
        zero.marshal_ndr(&mut scratch)?;
        let frames = std::mem::take(&mut scratch.frames);
        self.scoped(frames, |scope| scope.write_deferred()).map(drop)
    }

    /// Run `f` on a writer sharing this buffer and referent counter
    ///
    /// Returns the number of pointees `f` left queued; they are dropped with
    /// the scope.
    fn scoped<'z, F>(&mut self, frames: Vec<Vec<Deferred<'z>>>, f: F) -> Result<usize>
    where
        F: FnOnce(&mut NdrWriter<'z>) -> Result<()>,
    {
        let mut scope = NdrWriter {
            ctx: self.ctx,
            buf: std::mem::take(&mut self.buf),
            next_referent: self.next_referent,
            outer_depth: self.depth(),
            frames,
        };
        let result = f(&mut scope);
        self.buf = std::mem::take(&mut scope.buf);
        self.next_referent = scope.next_referent;
        result.map(|()| scope.pending())
    }

    fn depth(&self) -> usize {
        self.outer_depth + self.frames.len()
    }

    /// Flush the pointees queued on the current frame
    ///
    /// Each pointee runs in its own frame; whatever it queues is flushed
    /// before the next pointee is written.
    pub fn write_deferred(&mut self) -> Result<()> {
        let queued = match self.frames.last_mut() {
            Some(frame) if !frame.is_empty() => std::mem::take(frame),
            _ => return Ok(()),
        };

        let depth = self.depth();
        if depth > MAX_NESTING_DEPTH {
            debug!(depth, "pointee nesting limit reached");
            return Err(NdrError::NestingTooDeep { depth });
        }

        trace!(depth, count = queued.len(), "writing deferred pointees");
        for op in queued {
            self.frames.push(Vec::new());
            let result = match op {
                Deferred::Value(value) => value.marshal_ndr(self),
                Deferred::Func(func) => func(self),
            };
            let result = result.and_then(|()| self.write_deferred());
            self.frames.pop();
            result?;
        }
        Ok(())
    }

    /// End the pass and return the encoded stream
    pub fn finish(self) -> Result<Bytes> {
        let pending = self.pending();
        if pending > 0 {
            debug!(pending, "encode finished with unflushed pointees");
            return Err(NdrError::UnresolvedReferent { pending });
        }
        Ok(self.buf.freeze())
    }
}
