//! Operation frame
//!
//! One RPC method call: the request fields sent client to server and the
//! response fields sent back, ending in the 32-bit `Return` status.
//! Generated stubs implement [`Operation`]; [`Call`] drives a full encode or
//! decode pass over it and runs the caller's prepare hooks.

use std::fmt;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{Marshal, NdrContext, NdrError, NdrReader, NdrWriter, Result, Unmarshal};

/// HRESULT status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hresult(pub i32);

impl Hresult {
    /// Operation successful
    pub const S_OK: Self = Self(0x0000_0000);
    /// Operation successful, returning false
    pub const S_FALSE: Self = Self(0x0000_0001);
    /// Unspecified error
    pub const E_FAIL: Self = Self::from_bits(0x8000_4005);
    /// Invalid pointer
    pub const E_POINTER: Self = Self::from_bits(0x8000_4003);
    /// No such interface supported
    pub const E_NOINTERFACE: Self = Self::from_bits(0x8000_4002);
    /// Out of memory
    pub const E_OUTOFMEMORY: Self = Self::from_bits(0x8007_000E);
    /// Invalid argument
    pub const E_INVALIDARG: Self = Self::from_bits(0x8007_0057);
    /// Access denied
    pub const E_ACCESSDENIED: Self = Self::from_bits(0x8007_0005);
    /// RPC server unavailable
    pub const RPC_E_SERVER_DIED: Self = Self::from_bits(0x8001_0007);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits as i32)
    }

    pub const fn bits(self) -> u32 {
        self.0 as u32
    }

    /// Only zero is success
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Hresult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.bits())
    }
}

impl Marshal for Hresult {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_data(self.0)
    }
}

impl Unmarshal for Hresult {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        r.read_data(&mut self.0)
    }
}

/// Errors from driving an operation
#[derive(Error, Debug)]
pub enum OperationError {
    /// Encode or decode failure
    #[error(transparent)]
    Ndr(#[from] NdrError),

    /// Well-formed response carrying a nonzero status
    #[error("{op_name}: return code {status}")]
    Return { op_name: &'static str, status: Hresult },

    /// A prepare hook refused the payload
    #[error("prepare hook failed: {0}")]
    Hook(String),
}

impl OperationError {
    /// Status of a [`OperationError::Return`]
    pub fn status(&self) -> Option<Hresult> {
        match self {
            OperationError::Return { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Which half of the call is being prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Request,
    Response,
}

/// One RPC method
pub trait Operation {
    fn op_num(&self) -> u16;

    fn op_name(&self) -> &'static str;

    /// Fill derived request fields (counts, lengths) before encoding
    fn prepare_request(&mut self) -> std::result::Result<(), OperationError> {
        Ok(())
    }

    /// Fill derived response fields before encoding
    fn prepare_response(&mut self) -> std::result::Result<(), OperationError> {
        Ok(())
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()>;

    fn unmarshal_request<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()>;

    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()>;

    fn unmarshal_response<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()>;

    /// The `Return` field of the response
    fn return_code(&self) -> Hresult;
}

/// Caller hook run around the operation's own prepare step
pub type PrepareHook<Op> = Box<dyn Fn(&mut Op, Payload) -> std::result::Result<(), OperationError>>;

/// Drives one operation through encode and decode
pub struct Call<Op> {
    op: Op,
    ctx: NdrContext,
    before_prepare: Option<PrepareHook<Op>>,
    after_prepare: Option<PrepareHook<Op>>,
}

impl<Op: fmt::Debug> fmt::Debug for Call<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("op", &self.op)
            .field("ctx", &self.ctx)
            .field("before_prepare", &self.before_prepare.is_some())
            .field("after_prepare", &self.after_prepare.is_some())
            .finish()
    }
}

impl<Op: Operation> Call<Op> {
    pub fn new(op: Op) -> Self {
        Self::with_context(op, NdrContext::default())
    }

    pub fn with_context(op: Op, ctx: NdrContext) -> Self {
        Self {
            op,
            ctx,
            before_prepare: None,
            after_prepare: None,
        }
    }

    /// Hook run before the operation fills its derived fields
    pub fn before_prepare(
        mut self,
        hook: impl Fn(&mut Op, Payload) -> std::result::Result<(), OperationError> + 'static,
    ) -> Self {
        self.before_prepare = Some(Box::new(hook));
        self
    }

    /// Hook run after the operation filled its derived fields
    pub fn after_prepare(
        mut self,
        hook: impl Fn(&mut Op, Payload) -> std::result::Result<(), OperationError> + 'static,
    ) -> Self {
        self.after_prepare = Some(Box::new(hook));
        self
    }

    pub fn context(&self) -> NdrContext {
        self.ctx
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn op_mut(&mut self) -> &mut Op {
        &mut self.op
    }

    pub fn into_inner(self) -> Op {
        self.op
    }

    fn prepare(&mut self, payload: Payload) -> std::result::Result<(), OperationError> {
        if let Some(hook) = &self.before_prepare {
            hook(&mut self.op, payload)?;
        }
        match payload {
            Payload::Request => self.op.prepare_request()?,
            Payload::Response => self.op.prepare_response()?,
        }
        if let Some(hook) = &self.after_prepare {
            hook(&mut self.op, payload)?;
        }
        Ok(())
    }

    /// Prepare and encode the request fields
    pub fn encode_request(&mut self) -> std::result::Result<Bytes, OperationError> {
        self.prepare(Payload::Request)?;
        let mut w = NdrWriter::new(self.ctx);
        self.op.marshal_request(&mut w)?;
        w.write_deferred()?;
        let bytes = w.finish()?;
        debug!(
            op_num = self.op.op_num(),
            op_name = self.op.op_name(),
            len = bytes.len(),
            "encoded request"
        );
        Ok(bytes)
    }

    /// Decode the request fields (server side)
    pub fn decode_request(&mut self, data: impl Into<Bytes>) -> std::result::Result<(), OperationError> {
        let mut r = NdrReader::new(self.ctx, data);
        self.op.unmarshal_request(&mut r)?;
        r.read_deferred()?;
        let rest = r.finish()?;
        trace!(unread = rest.len(), "request tail");
        debug!(op_num = self.op.op_num(), op_name = self.op.op_name(), "decoded request");
        Ok(())
    }

    /// Prepare and encode the response fields (server side)
    pub fn encode_response(&mut self) -> std::result::Result<Bytes, OperationError> {
        self.prepare(Payload::Response)?;
        let mut w = NdrWriter::new(self.ctx);
        self.op.marshal_response(&mut w)?;
        w.write_deferred()?;
        let bytes = w.finish()?;
        debug!(
            op_num = self.op.op_num(),
            op_name = self.op.op_name(),
            len = bytes.len(),
            "encoded response"
        );
        Ok(bytes)
    }

    /// Decode the response fields and check the return code
    ///
    /// The decoded fields stay available through [`op`](Self::op) even when
    /// a nonzero status is reported.
    pub fn decode_response(&mut self, data: impl Into<Bytes>) -> std::result::Result<(), OperationError> {
        let mut r = NdrReader::new(self.ctx, data);
        self.op.unmarshal_response(&mut r)?;
        r.read_deferred()?;
        let rest = r.finish()?;
        trace!(unread = rest.len(), "response tail");

        let status = self.op.return_code();
        debug!(
            op_num = self.op.op_num(),
            op_name = self.op.op_name(),
            %status,
            "decoded response"
        );
        if !status.is_ok() {
            return Err(OperationError::Return {
                op_name: self.op.op_name(),
                status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::arrays::{read_conformant, write_conformant};

    #[derive(Debug, Default)]
    struct Sum {
        count: u32,
        values: Vec<u32>,
        total: u64,
        ret: Hresult,
    }

    impl Operation for Sum {
        fn op_num(&self) -> u16 {
            3
        }

        fn op_name(&self) -> &'static str {
            "Sum"
        }

        fn prepare_request(&mut self) -> std::result::Result<(), OperationError> {
            if self.count == 0 {
                self.count = self.values.len() as u32;
            }
            Ok(())
        }

        fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
            w.write_data(self.count)?;
            write_conformant(w, u64::from(self.count), &self.values)
        }

        fn unmarshal_request<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
            r.read_data(&mut self.count)?;
            read_conformant(r, &mut self.values)?;
            Ok(())
        }

        fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
            w.write_data(self.total)?;
            self.ret.marshal_ndr(w)
        }

        fn unmarshal_response<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
            r.read_data(&mut self.total)?;
            self.ret.unmarshal_ndr(r)
        }

        fn return_code(&self) -> Hresult {
            self.ret
        }
    }

    #[test]
    fn test_prepare_fills_count() {
        let mut call = Call::new(Sum {
            values: vec![1, 2, 3],
            ..Default::default()
        });
        let bytes = call.encode_request().unwrap();
        assert_eq!(call.op().count, 3);
        assert_eq!(&bytes[..8], &[3, 0, 0, 0, 3, 0, 0, 0]);

        let mut server = Call::new(Sum::default());
        server.decode_request(bytes).unwrap();
        assert_eq!(server.op().values, vec![1, 2, 3]);
    }

    #[test]
    fn test_hook_order() {
        let seen = Rc::new(Cell::new(0u32));
        let before = seen.clone();
        let after = seen.clone();

        let mut call = Call::new(Sum {
            values: vec![5],
            ..Default::default()
        })
        .before_prepare(move |op, payload| {
            assert_eq!(payload, Payload::Request);
            assert_eq!(op.count, 0);
            before.set(before.get() + 1);
            Ok(())
        })
        .after_prepare(move |op, _| {
            assert_eq!(op.count, 1);
            op.values.push(6);
            op.count = 2;
            after.set(after.get() + 10);
            Ok(())
        });

        let bytes = call.encode_request().unwrap();
        assert_eq!(seen.get(), 11);
        assert_eq!(&bytes[..], &[2, 0, 0, 0, 2, 0, 0, 0, 5, 0, 0, 0, 6, 0, 0, 0]);
    }

    #[test]
    fn test_hook_failure_aborts() {
        let mut call = Call::new(Sum::default())
            .before_prepare(|_, _| Err(OperationError::Hook("no".to_string())));
        assert!(matches!(call.encode_request(), Err(OperationError::Hook(_))));
    }

    #[test]
    fn test_nonzero_return() {
        let mut server = Call::new(Sum {
            total: 6,
            ret: Hresult::E_ACCESSDENIED,
            ..Default::default()
        });
        let bytes = server.encode_response().unwrap();
        assert_eq!(&bytes[8..], &[0x05, 0x00, 0x07, 0x80]);

        let mut client = Call::new(Sum::default());
        let err = client.decode_response(bytes).unwrap_err();
        assert_eq!(err.status(), Some(Hresult::E_ACCESSDENIED));
        assert_eq!(err.to_string(), "Sum: return code 0x80070005");
        assert_eq!(client.op().total, 6);
    }

    #[test]
    fn test_truncated_response() {
        let mut client = Call::new(Sum::default());
        let err = client.decode_response(vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, OperationError::Ndr(NdrError::BufferUnderflow { .. })));
    }
}
