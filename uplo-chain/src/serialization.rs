//! Consensus-critical serialization.
//!
//! This module defines two traits, [`Encode`] and [`Decode`], the
//! fixed-width, length-prefixed encoding used everywhere a byte-exact
//! representation matters: computing IDs, hashing transactions for
//! signing, and writing entities to the persistent store.
//!
//! Every integer is little-endian and fixed-width. Every variable-length
//! byte string or sequence is prefixed by an 8-byte little-endian count.
//! There is no Bitcoin-style variable-length integer and no implicit
//! optional field: both would make the byte-exactness of an encoding
//! depend on values outside the type itself.

mod deserialize;
mod error;

pub use deserialize::Decode;
pub use error::DecodeError;

use byteorder::{LittleEndian, WriteBytesExt};

pub trait Encode {
    fn encode<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error>;

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut data = Vec::new();
        self.encode(&mut data)
            .expect("encoding into a Vec<u8> is infallible");
        data
    }
}

impl Encode for bool {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_all(&[*self as u8])
    }
}

impl Encode for u8 {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_all(&[*self])
    }
}

impl Encode for u16 {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_u16::<LittleEndian>(*self)
    }
}

impl Encode for u32 {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_u32::<LittleEndian>(*self)
    }
}

impl Encode for u64 {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_u64::<LittleEndian>(*self)
    }
}

impl Encode for i64 {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_i64::<LittleEndian>(*self)
    }
}

impl Encode for u128 {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_u128::<LittleEndian>(*self)
    }
}

impl Encode for [u8; 32] {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_all(self)
    }
}

impl Encode for [u8; 16] {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_all(self)
    }
}

/// Variable-length byte strings are an 8-byte LE length prefix followed by
/// the raw bytes.
impl Encode for Vec<u8> {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        (self.len() as u64).encode(&mut target)?;
        target.write_all(self)
    }
}

impl Encode for String {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        (self.len() as u64).encode(&mut target)?;
        target.write_all(self.as_bytes())
    }
}

/// Sequences are an 8-byte LE count followed by each element's own encoding.
impl<T> Encode for Vec<T>
where
    T: Encode,
{
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        (self.len() as u64).encode(&mut target)?;
        for item in self.iter() {
            item.encode(&mut target)?;
        }
        Ok(())
    }
}

impl<T> Encode for Option<T>
where
    T: Encode,
{
    /// Optional fields are forbidden at the wire layer (see module docs);
    /// callers who need optionality at the domain level split the field
    /// into distinct encoded variants instead (see `transparent::Input`).
    /// This impl exists only so generic container code compiles once.
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        match self {
            Some(value) => value.encode(&mut target),
            None => Ok(()),
        }
    }
}

impl<T, U> Encode for (T, U)
where
    T: Encode,
    U: Encode,
{
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.0.encode(&mut target)?;
        self.1.encode(&mut target)
    }
}

impl<T> Encode for std::sync::Arc<T>
where
    T: Encode,
{
    fn encode<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        T::encode(self, target)
    }
}
