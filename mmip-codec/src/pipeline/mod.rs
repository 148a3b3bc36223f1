//! Encode/decode pipelines, one module per historical codec generation:
//! v1 (uniform scalar quantization, no entropy stage), v2 (adds canonical
//! Huffman over the whole block grid), v3 (adds ROI-aware stepsize and
//! spectral-selection stages), v4 (adds the physics-derived per-block
//! scale and stage frequency weighting). v4 is the format this crate's
//! container and CLI use; v1-v3 remain as the intermediate generations the
//! design moved through.

pub mod v1;
pub mod v2;
pub mod v3;
pub mod v4;

use crate::image::PixelBuffer;
use crate::rle::Symbol;

/// One spectral-selection stage's Huffman table plus packed payload.
#[derive(Debug, Clone)]
pub struct StageData {
    pub k0: usize,
    pub k1: usize,
    pub table_entries: Vec<(Symbol, u8)>,
    pub payload: Vec<u8>,
}

fn stage_ranges(block_n: usize) -> Vec<(usize, usize)> {
    if block_n == 8 {
        vec![(0, 1), (1, 10), (10, 64)]
    } else {
        vec![(0, block_n * block_n)]
    }
}

fn stage_id_from_range(k0: usize, k1: usize) -> u8 {
    match (k0, k1) {
        (0, 1) => 0,
        (1, 10) => 1,
        _ => 2,
    }
}

/// Gathers a padded buffer's `(br,bc)` tile into a row-major float block.
fn extract_block(buf: &PixelBuffer, br: usize, bc: usize, n: usize) -> Vec<f32> {
    let mut out = vec![0f32; n * n];
    for r in 0..n {
        for c in 0..n {
            out[r * n + c] = buf.get(br * n + r, bc * n + c) as f32;
        }
    }
    out
}

/// Scatters a reconstructed float block back into a padded buffer's
/// `(br,bc)` tile, rounding and clamping to the u16 sample range.
fn write_block(buf: &mut PixelBuffer, br: usize, bc: usize, n: usize, blk: &[f32]) {
    for r in 0..n {
        for c in 0..n {
            let v = blk[r * n + c].round().clamp(0.0, 65535.0) as u16;
            buf.set(br * n + r, bc * n + c, v);
        }
    }
}
