//! Decoding truncated, corrupt and oversized input
//!
//! Every failure must come back as an error; nothing may panic or allocate
//! by a count the stream cannot back.

mod common;

use common::init_logging;
use ndr_codec::{
    marshal, unmarshal, ConformantArray, ConformantVaryingArray, ErrorKind, Guid, Marshal,
    NdrContext, NdrError, NdrReader, NdrWString, NdrWriter, OrpcExtent, OrpcExtentArray, OrpcThis,
    Result, UniquePtr, Unmarshal, FIRST_REFERENT_ID, MAX_NESTING_DEPTH,
};

#[derive(Debug, Default)]
struct Node {
    value: u8,
    next: UniquePtr<Node>,
}

impl Marshal for Node {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_align(w.context().pointer_align())?;
        w.write_data(self.value)?;
        self.next.marshal_ndr(w)
    }
}

impl Unmarshal for Node {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        r.read_align(r.context().pointer_align())?;
        r.read_data(&mut self.value)?;
        self.next.unmarshal_ndr(r)
    }
}

fn chain(links: usize) -> Node {
    let mut node = Node::default();
    for i in 0..links {
        node = Node {
            value: i as u8,
            next: UniquePtr::new(node),
        };
    }
    node
}

fn chain_len(node: &Node) -> usize {
    let mut len = 1;
    let mut cur = node;
    while let Some(next) = cur.next.get() {
        len += 1;
        cur = next;
    }
    len
}

fn orpc_this() -> OrpcThis {
    let mut this = OrpcThis::with_causality(Guid::new(1, 2, 3, [4; 8]));
    this.extensions = Some(OrpcExtentArray::new(vec![
        OrpcExtent::new(Guid::new(5, 6, 7, [8; 8]), vec![1, 2, 3, 4, 5, 6, 7, 8]),
        OrpcExtent::new(Guid::NIL, Vec::new()),
    ]));
    this
}

#[test]
fn test_every_truncation_fails() {
    init_logging();

    for ctx in [NdrContext::new(), NdrContext::ndr64()] {
        let bytes = marshal(ctx, &orpc_this()).unwrap();
        for len in 0..bytes.len() {
            let result = unmarshal::<OrpcThis>(ctx, bytes.slice(..len));
            assert!(result.is_err(), "prefix of {len} bytes decoded");
        }
        assert_eq!(unmarshal::<OrpcThis>(ctx, bytes).unwrap(), orpc_this());
    }
}

#[test]
fn test_truncated_string() {
    let ctx = NdrContext::new();
    let bytes = marshal(ctx, &NdrWString::new("hi")).unwrap();
    assert_eq!(bytes.len(), 18);

    for len in 0..bytes.len() {
        let err = unmarshal::<NdrWString>(ctx, bytes.slice(..len)).unwrap_err();
        assert!(
            matches!(err.kind(), ErrorKind::TruncatedBuffer | ErrorKind::MalformedSize),
            "{len}: {err}"
        );
    }
}

#[test]
fn test_corrupt_bytes_never_panic() {
    for ctx in [NdrContext::new(), NdrContext::ndr64()] {
        let bytes = marshal(ctx, &orpc_this()).unwrap();
        for pos in 0..bytes.len() {
            for value in [0x00, 0x01, 0x7f, 0x80, 0xff] {
                let mut corrupt = bytes.to_vec();
                corrupt[pos] = value;
                let _ = unmarshal::<OrpcThis>(ctx, corrupt);
            }
        }
    }
}

#[test]
fn test_size_beyond_stream() {
    let ctx = NdrContext::new();

    // size 1000 with four bytes behind it
    let mut data = 1000u32.to_le_bytes().to_vec();
    data.extend_from_slice(&[0; 4]);
    let err = unmarshal::<ConformantArray<u8>>(ctx, data).unwrap_err();
    assert!(matches!(err, NdrError::MalformedSize { size: 1000, remaining: 4 }));

    // a plausible count whose elements are wider than the bytes left
    let mut data = 3u32.to_le_bytes().to_vec();
    data.extend_from_slice(&[0; 12]);
    let err = unmarshal::<ConformantArray<u64>>(ctx, data).unwrap_err();
    assert!(matches!(err, NdrError::BufferUnderflow { .. }));
}

#[test]
fn test_ndr64_size_word() {
    let ctx = NdrContext::ndr64();
    let data = u64::MAX.to_le_bytes().to_vec();
    let err = unmarshal::<ConformantArray<u8>>(ctx, data).unwrap_err();
    assert!(matches!(err, NdrError::MalformedSize { size: u64::MAX, remaining: 0 }));
}

#[test]
fn test_large_capacity_without_elements() {
    // max_count only sizes the receiver's buffer; an empty transmission is valid
    let ctx = NdrContext::new();
    let mut data = Vec::new();
    data.extend_from_slice(&u32::MAX.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());

    let decoded: ConformantVaryingArray<u32> = unmarshal(ctx, data).unwrap();
    assert_eq!(decoded.max_count, u64::from(u32::MAX));
    assert!(decoded.elements.is_empty());
}

#[test]
fn test_actual_count_beyond_max() {
    let ctx = NdrContext::new();
    let mut data = Vec::new();
    for word in [2u32, 0, 3] {
        data.extend_from_slice(&word.to_le_bytes());
    }
    data.extend_from_slice(&[0; 12]);

    let err = unmarshal::<ConformantVaryingArray<u32>>(ctx, data).unwrap_err();
    assert!(matches!(
        err,
        NdrError::ConformanceMismatch { max_count: 2, actual_count: 3 }
    ));
}

#[test]
fn test_deep_pointer_chain_is_rejected() {
    init_logging();

    // 20000 nodes, each pointing at the next: 8 bytes per link
    let links = 20_000u32;
    let mut data = Vec::with_capacity(links as usize * 8);
    for i in 0..links {
        data.extend_from_slice(&[1, 0, 0, 0]);
        let referent = if i + 1 < links { FIRST_REFERENT_ID + 4 * i } else { 0 };
        data.extend_from_slice(&referent.to_le_bytes());
    }

    let err = unmarshal::<Node>(NdrContext::new(), data).unwrap_err();
    assert!(matches!(err, NdrError::NestingTooDeep { depth } if depth > MAX_NESTING_DEPTH));
}

#[test]
fn test_deep_chain_is_not_encoded() {
    let node = chain(MAX_NESTING_DEPTH + 10);
    let err = marshal(NdrContext::new(), &node).unwrap_err();
    assert!(matches!(err, NdrError::NestingTooDeep { .. }));
}

#[test]
fn test_chain_within_limit() {
    for ctx in [NdrContext::new(), NdrContext::ndr64()] {
        let node = chain(MAX_NESTING_DEPTH - 24);
        let bytes = marshal(ctx, &node).unwrap();
        let decoded: Node = unmarshal(ctx, bytes).unwrap();
        assert_eq!(chain_len(&decoded), chain_len(&node));
    }
}
