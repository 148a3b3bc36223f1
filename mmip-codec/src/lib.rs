//! Core codec: image padding, block transform, quantization, entropy
//! coding, and the four pipeline generations (v1-v4) built on top of them.

pub mod dct;
pub mod error;
pub mod huffman;
pub mod image;
pub mod pipeline;
pub mod quant;
pub mod rle;
pub mod roi;
pub mod zigzag;

pub use dct::DctMatrix;
pub use error::CodecError;
pub use image::PixelBuffer;
pub use zigzag::ZigZag;
