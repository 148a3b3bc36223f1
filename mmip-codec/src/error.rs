use std::error;
use std::fmt;

use mmip_bitio::BitIoError;

#[derive(Debug)]
pub enum CodecError {
    InvalidCode,
    CorruptStream(String),
    RangeError(String),
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    BitIo(BitIoError),
}

impl error::Error for CodecError {}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidCode => write!(f, "invalid Huffman code (corrupt stream)"),
            Self::CorruptStream(msg) => write!(f, "corrupt stream: {}", msg),
            Self::RangeError(msg) => write!(f, "value out of range: {}", msg),
            Self::ShapeMismatch { expected, got } => write!(
                f,
                "shape mismatch: expected {:?}, got {:?}",
                expected, got
            ),
            Self::BitIo(e) => write!(f, "{}", e),
        }
    }
}

impl From<BitIoError> for CodecError {
    fn from(e: BitIoError) -> Self {
        CodecError::BitIo(e)
    }
}
