//! Generation 3: adds ROI-aware quantization stepsize and progressive
//! spectral-selection stages on top of v2's entropy coding. Each stage
//! carries its own Huffman table and payload so a decoder can stop after
//! any prefix of stages and still reconstruct a (coarser) image.

use std::collections::HashMap;

use log::debug;
use mmip_bitio::{BitReader, BitWriter};

use crate::dct::DctMatrix;
use crate::error::CodecError;
use crate::huffman::{build_code_lengths, canonical_codes_from_lengths, DecodeTrie};
use crate::image::PixelBuffer;
use crate::rle::{rle_decode, rle_encode, Symbol, EOB};
use crate::zigzag::ZigZag;

use super::{extract_block, stage_ranges, write_block, StageData};

pub struct EncodedV3 {
    pub stages: Vec<StageData>,
    pub pad_w: usize,
    pub pad_h: usize,
    pub hb: usize,
    pub wb: usize,
    pub block_n: usize,
}

pub fn encode_v3(
    image: &PixelBuffer,
    block_n: usize,
    qstep_bg: u16,
    qstep_roi: u16,
    block_roi: &[u8],
) -> EncodedV3 {
    let (padded, pad_w, pad_h) = image.pad_to_block(block_n);
    let hb = padded.height / block_n;
    let wb = padded.width / block_n;
    assert_eq!(block_roi.len(), hb * wb, "ROI map shape mismatch");

    let c = DctMatrix::new(block_n);
    let zz = ZigZag::new(block_n);
    let coeffs_per_block = block_n * block_n;

    // Precompute all quantized zigzag vectors with ROI-aware stepsize.
    let mut zz_all: Vec<Vec<i16>> = Vec::with_capacity(hb * wb);
    for br in 0..hb {
        for bc in 0..wb {
            let blk = extract_block(&padded, br, bc, block_n);
            let coeff = c.forward(&blk);
            let qstep = if block_roi[br * wb + bc] == 1 {
                qstep_roi
            } else {
                qstep_bg
            } as f32;
            let q: Vec<i16> = coeff.iter().map(|&v| (v / qstep).round() as i16).collect();
            zz_all.push(zz.scan(&q));
        }
    }

    let mut stages = Vec::new();
    for (k0, k1) in stage_ranges(block_n) {
        let mut block_streams: Vec<Vec<Symbol>> = Vec::with_capacity(zz_all.len());
        let mut symbols: Vec<Symbol> = Vec::new();
        for vec in &zz_all {
            let mut masked = vec![0i16; coeffs_per_block];
            masked[k0..k1].copy_from_slice(&vec[k0..k1]);
            let pairs = rle_encode(&masked);
            symbols.extend(pairs.iter().copied());
            block_streams.push(pairs);
        }
        if symbols.is_empty() {
            symbols.push(EOB);
        }

        let lengths = build_code_lengths(&symbols);
        let codes = canonical_codes_from_lengths(&lengths);

        let mut bw = BitWriter::new();
        for pairs in &block_streams {
            for &sym in pairs {
                let (code, len) = codes[&sym];
                bw.write_code(code, len);
            }
        }
        stages.push(StageData {
            k0,
            k1,
            table_entries: lengths,
            payload: bw.finish(),
        });
    }

    EncodedV3 {
        stages,
        pad_w,
        pad_h,
        hb,
        wb,
        block_n,
    }
}

pub fn decode_v3(
    enc: &EncodedV3,
    width: usize,
    height: usize,
    qstep_bg: u16,
    qstep_roi: u16,
    block_roi: &[u8],
    stages_to_decode: usize,
) -> Result<PixelBuffer, CodecError> {
    let block_n = enc.block_n;
    let hp = height + enc.pad_h;
    let wp = width + enc.pad_w;
    let hb = hp / block_n;
    let wb = wp / block_n;
    if block_roi.len() != hb * wb {
        return Err(CodecError::ShapeMismatch {
            expected: (hb, wb),
            got: (enc.hb, enc.wb),
        });
    }

    let c = DctMatrix::new(block_n);
    let zz = ZigZag::new(block_n);
    let nb = hb * wb;
    let coeffs_per_block = block_n * block_n;
    let mut zz_acc = vec![vec![0i16; coeffs_per_block]; nb];

    let n = stages_to_decode.clamp(1, enc.stages.len().max(1)).min(enc.stages.len());
    debug!("decode_v3: decoding {} of {} stages, {} blocks", n, enc.stages.len(), nb);
    for stage in &enc.stages[..n] {
        let lengths: HashMap<Symbol, u8> = stage.table_entries.iter().copied().collect();
        let lengths_vec: Vec<(Symbol, u8)> = lengths.into_iter().collect();
        let codes = canonical_codes_from_lengths(&lengths_vec);
        let trie = DecodeTrie::build(&codes);
        let mut r = BitReader::new(&stage.payload);

        for bi in 0..nb {
            let mut pairs = Vec::new();
            loop {
                let sym = trie.decode_one(&mut r)?;
                pairs.push(sym);
                if sym == EOB {
                    break;
                }
                if pairs.len() > coeffs_per_block + 1 {
                    return Err(CodecError::CorruptStream(
                        "too many symbols in block".into(),
                    ));
                }
            }
            let vec = rle_decode(&pairs, coeffs_per_block)?;
            zz_acc[bi][stage.k0..stage.k1].copy_from_slice(&vec[stage.k0..stage.k1]);
        }
    }

    let mut out = PixelBuffer::zeroed(wp, hp);
    let mut bi = 0;
    for br in 0..hb {
        for bc in 0..wb {
            let qstep = if block_roi[br * wb + bc] == 1 {
                qstep_roi
            } else {
                qstep_bg
            } as f32;
            let qblk: Vec<f32> = zz.unscan(&zz_acc[bi]).iter().map(|&v| v as f32).collect();
            let coeff: Vec<f32> = qblk.iter().map(|&v| v * qstep).collect();
            let blk = c.inverse(&coeff);
            write_block(&mut out, br, bc, block_n, &blk);
            bi += 1;
        }
    }
    Ok(out.crop_to(width, height))
}
