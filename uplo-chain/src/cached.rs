use crate::serialization::{Decode, DecodeError, Encode};

/// A Cached type is an option that is never encoded.
///
/// It can be added to any struct without risking a consensus break, since
/// two otherwise-identical values compare equal regardless of whether
/// either side has actually computed and cached its value.
#[derive(Clone, Copy, Eq)]
pub struct Cached<T: Clone + Copy>(Option<T>);

impl<T: Clone + Copy> Cached<T> {
    pub fn new() -> Cached<T> {
        Cached(None)
    }
    pub fn from(val: T) -> Cached<T> {
        Cached(Some(val))
    }
    pub fn value(&self) -> Option<T> {
        self.0
    }
    pub fn mut_value(&mut self) -> &mut Option<T> {
        &mut self.0
    }
    pub fn has_value(&self) -> bool {
        self.0.is_some()
    }
}

impl<T: Clone + Copy> Default for Cached<T> {
    fn default() -> Self {
        Cached::new()
    }
}

/// Returns false only if the two items both have a full cache and their values differ.
///
/// This allows generating items with empty caches for testing purposes and comparing
/// them to their decoded counterparts without modification; decoding always populates
/// the cache from the bytes it just read.
impl<T: PartialEq + Copy> PartialEq for Cached<T> {
    fn eq(&self, other: &Self) -> bool {
        match self.0 {
            None => true,
            Some(val) => match other.0 {
                Some(rhs) => val == rhs,
                None => true,
            },
        }
    }
}

impl<T: Clone + Copy> std::fmt::Debug for Cached<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<T: Clone + Copy> Encode for Cached<T> {
    fn encode<W>(&self, _target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        Ok(())
    }
}

impl<T: Clone + Copy> Decode for Cached<T> {
    fn decode<R: std::io::Read>(_target: R) -> Result<Self, DecodeError> {
        Ok(Cached(None))
    }
}
