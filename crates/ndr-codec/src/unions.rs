//! Non-encapsulated unions
//!
//! A `[switch_is]` union is sent as its discriminant followed by the
//! selected arm. Under NDR64 the arm is additionally aligned to the union's
//! largest arm.

use crate::{NdrPrimitive, NdrReader, NdrWriter, Result};

/// A discriminated union with one arm per discriminant value
pub trait Union: Sized {
    type Discriminant: NdrPrimitive;

    /// Alignment of the largest arm
    const ARM_ALIGN: usize;

    fn discriminant(&self) -> Self::Discriminant;

    /// The default value of the arm for `discriminant`
    ///
    /// Unknown discriminants are
    /// [`NdrError::InvalidDiscriminant`](crate::NdrError::InvalidDiscriminant).
    fn select(discriminant: Self::Discriminant) -> Result<Self>;

    fn marshal_arm<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()>;

    fn unmarshal_arm<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()>;
}

/// Write the discriminant and the selected arm
pub fn write_union<'a, U: Union>(w: &mut NdrWriter<'a>, value: &'a U) -> Result<()> {
    w.write_switch(value.discriminant())?;
    w.write_union_align(U::ARM_ALIGN)?;
    value.marshal_arm(w)
}

/// Read the discriminant, switch `value` to that arm and read it
pub fn read_union<'r, U: Union>(r: &mut NdrReader<'r>, value: &'r mut U) -> Result<()> {
    let mut discriminant = U::Discriminant::default();
    r.read_switch(&mut discriminant)?;
    *value = U::select(discriminant)?;
    r.read_union_align(U::ARM_ALIGN)?;
    value.unmarshal_arm(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NdrContext, NdrError};

    #[derive(Debug, Clone, PartialEq)]
    enum Value {
        Short(u16),
        Long(u32),
        Empty,
    }

    impl Union for Value {
        type Discriminant = u16;
        const ARM_ALIGN: usize = 4;

        fn discriminant(&self) -> u16 {
            match self {
                Value::Short(_) => 1,
                Value::Long(_) => 2,
                Value::Empty => 3,
            }
        }

        fn select(discriminant: u16) -> Result<Self> {
            match discriminant {
                1 => Ok(Value::Short(0)),
                2 => Ok(Value::Long(0)),
                3 => Ok(Value::Empty),
                other => Err(NdrError::InvalidDiscriminant(other.into())),
            }
        }

        fn marshal_arm<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
            match self {
                Value::Short(v) => w.write_data(*v),
                Value::Long(v) => w.write_data(*v),
                Value::Empty => Ok(()),
            }
        }

        fn unmarshal_arm<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
            match self {
                Value::Short(v) => r.read_data(v),
                Value::Long(v) => r.read_data(v),
                Value::Empty => Ok(()),
            }
        }
    }

    fn roundtrip(ctx: NdrContext, value: &Value) -> (bytes::Bytes, Value) {
        let mut w = NdrWriter::new(ctx);
        write_union(&mut w, value).unwrap();
        let bytes = w.finish().unwrap();

        let mut decoded = Value::Empty;
        let mut r = NdrReader::new(ctx, bytes.clone());
        read_union(&mut r, &mut decoded).unwrap();
        r.finish().unwrap();
        (bytes, decoded)
    }

    #[test]
    fn test_union_arms() {
        let (bytes, decoded) = roundtrip(NdrContext::new(), &Value::Long(0xAABBCCDD));
        assert_eq!(&bytes[..], &[2, 0, 0, 0, 0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(decoded, Value::Long(0xAABBCCDD));

        let (bytes, decoded) = roundtrip(NdrContext::new(), &Value::Short(9));
        assert_eq!(&bytes[..], &[1, 0, 9, 0]);
        assert_eq!(decoded, Value::Short(9));
    }

    #[test]
    fn test_union_align_ndr64() {
        let (bytes, decoded) = roundtrip(NdrContext::ndr64(), &Value::Short(9));
        assert_eq!(&bytes[..], &[1, 0, 0, 0, 9, 0]);
        assert_eq!(decoded, Value::Short(9));
    }

    #[test]
    fn test_unknown_discriminant() {
        let data: &'static [u8] = &[7, 0];
        let mut value = Value::Empty;
        let mut r = NdrReader::new(NdrContext::new(), data);
        assert!(matches!(
            read_union(&mut r, &mut value),
            Err(NdrError::InvalidDiscriminant(7))
        ));
    }
}
