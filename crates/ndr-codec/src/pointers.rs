//! NDR pointer types
//!
//! NDR supports three pointer semantics:
//!
//! - Reference (`[ref]`): never null; embedded in an aggregate it still
//!   takes a referent slot and its pointee is deferred
//! - Unique (`[unique]`): nullable, no aliasing
//! - Full (`[ptr]`): nullable, aliasing allowed
//!
//! Aliasing is never produced on encode, so full pointers are encoded
//! exactly like unique ones.

use std::ops::{Deref, DerefMut};

use crate::{Marshal, NdrReader, NdrWriter, Result, Unmarshal};

/// Embedded reference pointer
///
/// Always written with a nonzero referent; a null referent on decode is
/// [`NdrError::InvalidPointer`](crate::NdrError::InvalidPointer).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RefPtr<T>(pub T);

impl<T> RefPtr<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for RefPtr<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for RefPtr<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: Marshal + Default> Marshal for RefPtr<T> {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_ref(Some(&self.0))
    }
}

impl<T: Unmarshal> Unmarshal for RefPtr<T> {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        r.read_ref(&mut self.0)
    }
}

/// Unique pointer - nullable, no aliasing
///
/// Encoded as a referent ID (0 = null); a non-null pointee follows in the
/// deferred section of the enclosing aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniquePtr<T>(pub Option<Box<T>>);

/// Full pointers share the unique representation
pub type FullPtr<T> = UniquePtr<T>;

impl<T> UniquePtr<T> {
    pub fn new(value: T) -> Self {
        Self(Some(Box::new(value)))
    }

    pub fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_deref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.0.as_deref_mut()
    }

    pub fn into_inner(self) -> Option<T> {
        self.0.map(|boxed| *boxed)
    }
}

impl<T> Default for UniquePtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<Option<T>> for UniquePtr<T> {
    fn from(value: Option<T>) -> Self {
        Self(value.map(Box::new))
    }
}

impl<T: Marshal> Marshal for UniquePtr<T> {
    fn marshal_ndr<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_unique(self.0.as_deref())
    }
}

impl<T: Unmarshal + Default> Unmarshal for UniquePtr<T> {
    fn unmarshal_ndr<'r>(&'r mut self, r: &mut NdrReader<'r>) -> Result<()> {
        r.read_unique(&mut self.0)
    }
}
