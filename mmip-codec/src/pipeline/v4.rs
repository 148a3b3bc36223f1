//! Generation 4: adds the physics-derived per-block quantization scale and
//! a stage-specific frequency weighting matrix on top of v3's ROI-aware,
//! progressive scheme.
//!
//! The frequency weighting is asymmetric by design: the encoder folds it
//! into the per-coefficient step so visually/diagnostically important
//! frequencies get finer quantization, but the decoder reconstructs with
//! only the flat `qbase * block_scale` step, never re-deriving the
//! per-coefficient weight. Matching that asymmetry exactly (not
//! "fixing" it into a symmetric quantizer) is required for bit-exact
//! compatibility with existing encoded streams.

use std::collections::HashMap;

use log::debug;
use mmip_bitio::{BitReader, BitWriter};

use crate::dct::DctMatrix;
use crate::error::CodecError;
use crate::huffman::{build_code_lengths, canonical_codes_from_lengths, DecodeTrie};
use crate::image::PixelBuffer;
use crate::quant::{
    attenuation_scale, block_scale_from_quantized, block_stats, qmin_for_stage,
    quantize_block_scale, stage_freq_matrix_zigzag, noise_scale,
};
use crate::rle::{rle_decode, rle_encode, Symbol, EOB};
use crate::zigzag::ZigZag;

use super::{extract_block, stage_id_from_range, stage_ranges, write_block, StageData};

pub struct EncodedV4 {
    pub stages: Vec<StageData>,
    pub sb_q: Vec<u8>,
    pub sb_qscale: u16,
    pub pad_w: usize,
    pub pad_h: usize,
    pub hb: usize,
    pub wb: usize,
    pub block_n: usize,
}

#[allow(clippy::too_many_arguments)]
pub fn encode_v4(
    image: &PixelBuffer,
    block_n: usize,
    qstep_bg: u16,
    qstep_roi: u16,
    block_roi: &[u8],
    sb_qscale: u16,
) -> EncodedV4 {
    let (padded, pad_w, pad_h) = image.pad_to_block(block_n);
    let hb = padded.height / block_n;
    let wb = padded.width / block_n;
    assert_eq!(block_roi.len(), hb * wb, "ROI map shape mismatch");

    let stats = block_stats(&padded.data, padded.width, padded.height, block_n);
    let s_att = attenuation_scale(&stats.mean, 9000.0, 1200.0, 1.5, 1e-3);
    let s_noise = noise_scale(&stats.mean, &stats.std, 0.8, 300.0);
    let s_block: Vec<f32> = s_att.iter().zip(s_noise.iter()).map(|(a, n)| a * n).collect();
    let sb_q = quantize_block_scale(&s_block, sb_qscale);
    let sb = block_scale_from_quantized(&sb_q, sb_qscale, true);

    let c = DctMatrix::new(block_n);
    let zz = ZigZag::new(block_n);

    let mut stages = Vec::new();
    for (k0, k1) in stage_ranges(block_n) {
        let sid = stage_id_from_range(k0, k1);
        let mzz = stage_freq_matrix_zigzag(block_n, sid);

        let mut block_streams: Vec<Vec<Symbol>> = Vec::with_capacity(hb * wb);
        let mut symbols: Vec<Symbol> = Vec::new();

        for br in 0..hb {
            for bc in 0..wb {
                let blk = extract_block(&padded, br, bc, block_n);
                let coeff = c.forward(&blk);
                let coeff_zz = zz.scan(&coeff);

                let qbase = if block_roi[br * wb + bc] == 1 {
                    qstep_roi
                } else {
                    qstep_bg
                } as f32;
                let sbv = sb[br * wb + bc];
                let qmin = qmin_for_stage(sid);

                let mut zzq = vec![0i16; block_n * block_n];
                for k in k0..k1 {
                    let qzz = (qbase * sbv * mzz[k]).max(qmin);
                    zzq[k] = (coeff_zz[k] / qzz).round() as i16;
                }
                let pairs = rle_encode(&zzq);
                symbols.extend(pairs.iter().copied());
                block_streams.push(pairs);
            }
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

    EncodedV4 {
        stages,
        sb_q,
        sb_qscale,
        pad_w,
        pad_h,
        hb,
        wb,
        block_n,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn decode_v4(
    enc: &EncodedV4,
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
    if block_roi.len() != hb * wb || enc.sb_q.len() != hb * wb {
        return Err(CodecError::ShapeMismatch {
            expected: (hb, wb),
            got: (enc.hb, enc.wb),
        });
    }

    // The decoder never applies the encoder's [1.0, 1.6] clip: it simply
    // recovers the transmitted ratio as-is.
    let sb = block_scale_from_quantized(&enc.sb_q, enc.sb_qscale, false);

    let c = DctMatrix::new(block_n);
    let zz = ZigZag::new(block_n);
    let nb = hb * wb;
    let coeffs_per_block = block_n * block_n;
    let mut zz_acc = vec![vec![0i16; coeffs_per_block]; nb];

    let n = stages_to_decode.clamp(1, enc.stages.len().max(1)).min(enc.stages.len());
    debug!(
        "decode_v4: decoding {} of {} stages, {} blocks, sb_qscale={}",
        n,
        enc.stages.len(),
        nb,
        enc.sb_qscale
    );
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
            let qbase = if block_roi[br * wb + bc] == 1 {
                qstep_roi
            } else {
                qstep_bg
            } as f32;
            let sbv = sb[br * wb + bc];

            let mut coeff_zz = vec![0f32; coeffs_per_block];
            for stage in &enc.stages[..n] {
                // No frequency weighting and no re-derived Mzz here: only
                // the flat base step the encoder already folded ROI and
                // physics scale into.
                let qflat = qbase * sbv;
                for k in stage.k0..stage.k1 {
                    coeff_zz[k] = zz_acc[bi][k] as f32 * qflat;
                }
            }

            let coeff = zz.unscan(&coeff_zz);
            let blk = c.inverse(&coeff);
            write_block(&mut out, br, bc, block_n, &blk);
            bi += 1;
        }
    }
    Ok(out.crop_to(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image(width: usize, height: usize) -> PixelBuffer {
        let mut data = vec![0u16; width * height];
        for (i, v) in data.iter_mut().enumerate() {
            *v = (4000 + (i % 53) * 61) as u16;
        }
        PixelBuffer::new(width, height, data)
    }

    #[test]
    fn full_decode_reconstructs_plausible_image() {
        let width = 16;
        let height = 8;
        let image = sample_image(width, height);
        let block_roi = vec![0u8, 1u8];
        let enc = encode_v4(&image, 8, 40, 16, &block_roi, 16);
        let dec = decode_v4(&enc, width, height, 40, 16, &block_roi, enc.stages.len()).unwrap();
        assert_eq!(dec.width, width);
        assert_eq!(dec.height, height);
        for (orig, got) in image.data.iter().zip(dec.data.iter()) {
            assert!((*orig as i32 - *got as i32).abs() < 500);
        }
    }

    #[test]
    fn progressive_prefix_decode_produces_coarser_but_valid_image() {
        let width = 8;
        let height = 8;
        let image = sample_image(width, height);
        let block_roi = vec![0u8];
        let enc = encode_v4(&image, 8, 40, 16, &block_roi, 16);
        assert_eq!(enc.stages.len(), 3);

        // Decoding only the DC stage leaves every pixel in the (single)
        // block at the same reconstructed value.
        let dc_only = decode_v4(&enc, width, height, 40, 16, &block_roi, 1).unwrap();
        let first = dc_only.data[0];
        assert!(dc_only.data.iter().all(|&v| v == first));

        // Decoding all stages recovers the image's actual variation.
        let full = decode_v4(&enc, width, height, 40, 16, &block_roi, 3).unwrap();
        assert!(full.data.iter().any(|&v| v != full.data[0]));
    }

    #[test]
    fn roi_block_uses_finer_base_step() {
        let width = 16;
        let height = 8;
        let image = sample_image(width, height);
        let block_roi = vec![0u8, 1u8];
        let enc = encode_v4(&image, 8, 64, 8, &block_roi, 16);
        let dec = decode_v4(&enc, width, height, 64, 8, &block_roi, enc.stages.len()).unwrap();

        let err_bg: i64 = (0..8)
            .flat_map(|r| (0..8).map(move |c| (r, c)))
            .map(|(r, c)| {
                (image.data[r * width + c] as i64 - dec.data[r * width + c] as i64).abs()
            })
            .sum();
        let err_roi: i64 = (0..8)
            .flat_map(|r| (0..8).map(move |c| (r, c + 8)))
            .map(|(r, c)| {
                (image.data[r * width + c] as i64 - dec.data[r * width + c] as i64).abs()
            })
            .sum();
        assert!(err_roi < err_bg);
    }
}
