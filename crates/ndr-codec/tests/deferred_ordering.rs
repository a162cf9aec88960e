//! Placement of deferred pointees
//!
//! A pointee lands after every immediate field of the aggregate that holds
//! the pointer, pointees go out in the order their pointers were written,
//! and whatever a pointee points to is written before the next sibling.

mod common;

use common::{hex, init_logging};
use ndr_codec::{
    marshal, unmarshal, Marshal, NdrContext, NdrReader, NdrWriter, Result, UniquePtr, Unmarshal,
    FIRST_REFERENT_ID,
};

#[derive(Debug, Default, PartialEq)]
struct Inner {
    value: u16,
    child: UniquePtr<u16>,
}

impl Marshal for Inner {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_align(w.context().pointer_align())?;
        w.write_data(self.value)?;
        self.child.marshal_ndr(w)
    }
}

impl Unmarshal for Inner {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        r.read_align(r.context().pointer_align())?;
        r.read_data(&mut self.value)?;
        self.child.unmarshal_ndr(r)
    }
}

#[derive(Debug, Default, PartialEq)]
struct Outer {
    a: UniquePtr<Inner>,
    b: UniquePtr<u32>,
}

impl Marshal for Outer {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        self.a.marshal_ndr(w)?;
        self.b.marshal_ndr(w)
    }
}

impl Unmarshal for Outer {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        self.a.unmarshal_ndr(r)?;
        self.b.unmarshal_ndr(r)
    }
}

fn nested() -> Outer {
    Outer {
        a: UniquePtr::new(Inner {
            value: 0x1122,
            child: UniquePtr::new(0x3344),
        }),
        b: UniquePtr::new(0x5566_7788),
    }
}

#[test]
fn test_nested_pointee_precedes_sibling() {
    init_logging();

    let bytes = marshal(NdrContext::new(), &nested()).unwrap();
    assert_eq!(bytes.len(), 24, "{}", hex(&bytes));

    // Both referents first, in field order
    assert_eq!(&bytes[0..4], &FIRST_REFERENT_ID.to_le_bytes());
    assert_eq!(&bytes[4..8], &(FIRST_REFERENT_ID + 4).to_le_bytes());
    // a's pointee, with the child referent handed out after a and b
    assert_eq!(&bytes[8..10], &[0x22, 0x11]);
    assert_eq!(&bytes[12..16], &(FIRST_REFERENT_ID + 8).to_le_bytes());
    // child's pointee, before b's
    assert_eq!(&bytes[16..18], &[0x44, 0x33]);
    assert_eq!(&bytes[20..24], &[0x88, 0x77, 0x66, 0x55]);

    let decoded: Outer = unmarshal(NdrContext::new(), bytes).unwrap();
    assert_eq!(decoded, nested());
}

#[test]
fn test_nested_ndr64() {
    let ctx = NdrContext::ndr64();
    let bytes = marshal(ctx, &nested()).unwrap();
    // a, b referents; Inner { value, pad, child }; child pointee; b pointee
    assert_eq!(bytes.len(), 40, "{}", hex(&bytes));
    assert_eq!(&bytes[16..18], &[0x22, 0x11]);
    assert_eq!(&bytes[32..34], &[0x44, 0x33]);
    assert_eq!(&bytes[36..40], &[0x88, 0x77, 0x66, 0x55]);

    let decoded: Outer = unmarshal(ctx, bytes).unwrap();
    assert_eq!(decoded, nested());
}

#[test]
fn test_null_pointer_takes_no_deferred_space() {
    let outer = Outer {
        a: UniquePtr::null(),
        b: UniquePtr::new(7),
    };
    let bytes = marshal(NdrContext::new(), &outer).unwrap();
    assert_eq!(&bytes[..], &[0, 0, 0, 0, 0, 0, 2, 0, 7, 0, 0, 0]);

    let decoded: Outer = unmarshal(NdrContext::new(), bytes).unwrap();
    assert!(decoded.a.is_null());
    assert_eq!(decoded.b.get(), Some(&7));
}

#[derive(Debug, Default, PartialEq)]
struct Mixed {
    wide: UniquePtr<u64>,
    narrow: UniquePtr<u8>,
}

impl Marshal for Mixed {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        self.wide.marshal_ndr(w)?;
        self.narrow.marshal_ndr(w)
    }
}

impl Unmarshal for Mixed {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        self.wide.unmarshal_ndr(r)?;
        self.narrow.unmarshal_ndr(r)
    }
}

#[test]
fn test_pointees_follow_pointer_order() {
    let mixed = Mixed {
        wide: UniquePtr::new(u64::MAX),
        narrow: UniquePtr::new(0xab),
    };

    for (ctx, wide_at, len) in [(NdrContext::new(), 8, 17), (NdrContext::ndr64(), 16, 25)] {
        let bytes = marshal(ctx, &mixed).unwrap();
        assert_eq!(bytes.len(), len, "{}", hex(&bytes));
        assert_eq!(&bytes[wide_at..wide_at + 8], &[0xff; 8]);
        assert_eq!(bytes[len - 1], 0xab);

        let decoded: Mixed = unmarshal(ctx, bytes).unwrap();
        assert_eq!(decoded, mixed);
    }
}

#[test]
fn test_parameter_flush_between_fields() {
    // Top-level parameters flush their pointees before the next parameter
    let name = 0x0102u16;
    let mut w = NdrWriter::new(NdrContext::new());
    w.write_unique(Some(&name)).unwrap();
    w.write_deferred().unwrap();
    w.write_data(0xffff_ffffu32).unwrap();
    let bytes = w.finish().unwrap();
    assert_eq!(
        &bytes[..],
        &[0, 0, 2, 0, 0x02, 0x01, 0, 0, 0xff, 0xff, 0xff, 0xff]
    );

    let mut target = None::<u16>;
    let mut tail = 0u32;
    let mut r = NdrReader::new(NdrContext::new(), bytes);
    r.read_unique(&mut target).unwrap();
    r.read_deferred().unwrap();
    r.read_data(&mut tail).unwrap();
    r.finish().unwrap();
    assert_eq!(target, Some(0x0102));
    assert_eq!(tail, 0xffff_ffff);
}
