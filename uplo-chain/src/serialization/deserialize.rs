use byteorder::{LittleEndian, ReadBytesExt};
use std::io;

use super::DecodeError;

type Result<R> = std::result::Result<R, DecodeError>;

/// The mirror image of [`super::Encode`]: reconstructs a value from the
/// same fixed-width, length-prefixed byte layout.
pub trait Decode: Sized {
    fn decode<R: io::Read>(target: R) -> Result<Self>;
}

impl Decode for bool {
    fn decode<R: io::Read>(mut target: R) -> Result<bool> {
        match target.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(DecodeError::Parse("invalid bool")),
        }
    }
}

impl Decode for u8 {
    fn decode<R: io::Read>(mut target: R) -> Result<u8> {
        Ok(target.read_u8()?)
    }
}

impl Decode for u16 {
    fn decode<R: io::Read>(mut target: R) -> Result<u16> {
        Ok(target.read_u16::<LittleEndian>()?)
    }
}

impl Decode for u32 {
    fn decode<R: io::Read>(mut target: R) -> Result<u32> {
        Ok(target.read_u32::<LittleEndian>()?)
    }
}

impl Decode for u64 {
    fn decode<R: io::Read>(mut target: R) -> Result<u64> {
        Ok(target.read_u64::<LittleEndian>()?)
    }
}

impl Decode for u128 {
    fn decode<R: io::Read>(mut target: R) -> Result<u128> {
        Ok(target.read_u128::<LittleEndian>()?)
    }
}

impl Decode for i64 {
    fn decode<R: io::Read>(mut target: R) -> Result<i64> {
        Ok(target.read_i64::<LittleEndian>()?)
    }
}

/// Caps a single length prefix so a corrupt or adversarial stream can't
/// force an attempted multi-exabyte allocation before the read fails.
const MAX_VEC_LEN: u64 = 32 * 1024 * 1024;

impl Decode for Vec<u8> {
    fn decode<R: io::Read>(mut target: R) -> Result<Vec<u8>> {
        let len = u64::decode(&mut target)?;
        if len > MAX_VEC_LEN {
            return Err(DecodeError::Parse("byte string length prefix too large"));
        }
        let mut buf = vec![0u8; len as usize];
        target.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl Decode for String {
    fn decode<R: io::Read>(mut target: R) -> Result<String> {
        let bytes = Vec::<u8>::decode(&mut target)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::Parse("invalid utf-8"))
    }
}

impl<T> Decode for Vec<T>
where
    T: Decode,
{
    fn decode<R: io::Read>(mut target: R) -> Result<Vec<T>> {
        let len = u64::decode(&mut target)?;
        if len > MAX_VEC_LEN {
            return Err(DecodeError::Parse("sequence length prefix too large"));
        }
        // Limit preallocation regardless of the claimed length; a short
        // read still fails via read_exact on the first missing element.
        let mut items = Vec::with_capacity(std::cmp::min(len, 1024) as usize);
        for _ in 0..len {
            items.push(T::decode(&mut target)?);
        }
        Ok(items)
    }
}

impl<T> Decode for Option<T>
where
    T: Decode,
{
    fn decode<R: io::Read>(target: R) -> Result<Option<T>> {
        Ok(Some(T::decode(target)?))
    }
}

impl<T, U> Decode for (T, U)
where
    T: Decode,
    U: Decode,
{
    fn decode<R: io::Read>(mut target: R) -> Result<(T, U)> {
        let first = T::decode(&mut target)?;
        let second = U::decode(&mut target)?;
        Ok((first, second))
    }
}

impl<T> Decode for std::sync::Arc<T>
where
    T: Decode,
{
    fn decode<R: io::Read>(target: R) -> Result<std::sync::Arc<T>> {
        Ok(std::sync::Arc::new(T::decode(target)?))
    }
}

macro_rules! impl_decodable_byte_array {
    ($size:expr) => {
        impl Decode for [u8; $size] {
            fn decode<R: io::Read>(mut target: R) -> Result<[u8; $size]> {
                let mut result = [0u8; $size];
                target.read_exact(&mut result)?;
                Ok(result)
            }
        }
    };
}

impl_decodable_byte_array!(16);
impl_decodable_byte_array!(32);
