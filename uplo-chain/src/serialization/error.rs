use std::io;

use thiserror::Error;

/// A decoding error.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// An io error that prevented decoding.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The data to be decoded was malformed.
    #[error("parse error: {0}")]
    Parse(&'static str),
}
