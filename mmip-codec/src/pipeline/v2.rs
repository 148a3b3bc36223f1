//! Generation 2: adds run-length + canonical Huffman entropy coding on top
//! of v1's uniform scalar quantization. Single table, single payload, no
//! spectral selection yet.

use log::debug;
use mmip_bitio::{BitReader, BitWriter};

use crate::dct::DctMatrix;
use crate::error::CodecError;
use crate::huffman::{build_code_lengths, canonical_codes_from_lengths, DecodeTrie};
use crate::image::PixelBuffer;
use crate::rle::{rle_decode, rle_encode, Symbol, EOB};
use crate::zigzag::ZigZag;

use super::{extract_block, write_block};

pub struct EncodedV2 {
    pub table_entries: Vec<(Symbol, u8)>,
    pub payload: Vec<u8>,
    pub pad_w: usize,
    pub pad_h: usize,
    pub block_n: usize,
    pub num_blocks: usize,
}

pub fn encode_v2(image: &PixelBuffer, block_n: usize, qstep: u16) -> EncodedV2 {
    let (padded, pad_w, pad_h) = image.pad_to_block(block_n);
    let c = DctMatrix::new(block_n);
    let zz = ZigZag::new(block_n);
    let qstep_f = qstep as f32;

    let hb = padded.height / block_n;
    let wb = padded.width / block_n;

    let mut symbols: Vec<Symbol> = Vec::new();
    let mut block_streams: Vec<Vec<Symbol>> = Vec::with_capacity(hb * wb);
    for br in 0..hb {
        for bc in 0..wb {
            let blk = extract_block(&padded, br, bc, block_n);
            let coeff = c.forward(&blk);
            let q: Vec<i16> = coeff
                .iter()
                .map(|&v| (v / qstep_f).round() as i16)
                .collect();
            let zzvec = zz.scan(&q);
            let pairs = rle_encode(&zzvec);
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
    let payload = bw.finish();

    EncodedV2 {
        table_entries: lengths,
        payload,
        pad_w,
        pad_h,
        block_n,
        num_blocks: hb * wb,
    }
}

pub fn decode_v2(
    enc: &EncodedV2,
    width: usize,
    height: usize,
    qstep: u16,
) -> Result<PixelBuffer, CodecError> {
    let block_n = enc.block_n;
    let hp = height + enc.pad_h;
    let wp = width + enc.pad_w;
    let wb = wp / block_n;
    let coeffs_per_block = block_n * block_n;

    debug!(
        "decode_v2: {} blocks, {} table entries, {} payload bytes",
        enc.num_blocks,
        enc.table_entries.len(),
        enc.payload.len()
    );

    let codes = canonical_codes_from_lengths(&enc.table_entries);
    let trie = DecodeTrie::build(&codes);

    let c = DctMatrix::new(block_n);
    let zz = ZigZag::new(block_n);
    let mut r = BitReader::new(&enc.payload);

    let mut out = PixelBuffer::zeroed(wp, hp);
    for idx in 0..enc.num_blocks {
        let br = idx / wb;
        let bc = idx % wb;
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
        let zzvec = rle_decode(&pairs, coeffs_per_block)?;
        let qblk: Vec<f32> = zz.unscan(&zzvec).iter().map(|&v| v as f32).collect();
        let coeff: Vec<f32> = qblk.iter().map(|&v| v * qstep as f32).collect();
        let blk = c.inverse(&coeff);
        write_block(&mut out, br, bc, block_n, &blk);
    }
    Ok(out.crop_to(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_is_close_under_quantization() {
        let width = 16;
        let height = 16;
        let mut data = vec![0u16; width * height];
        for (i, v) in data.iter_mut().enumerate() {
            *v = (1500 + (i % 29) * 71) as u16;
        }
        let image = PixelBuffer::new(width, height, data.clone());
        let qstep = 10;
        let enc = encode_v2(&image, 8, qstep);
        let dec = decode_v2(&enc, width, height, qstep).unwrap();
        for (orig, got) in data.iter().zip(dec.data.iter()) {
            assert!((*orig as i32 - *got as i32).abs() < 200);
        }
    }

    #[test]
    fn flat_image_compresses_to_small_payload() {
        let width = 32;
        let height = 32;
        let image = PixelBuffer::new(width, height, vec![4096u16; width * height]);
        let enc = encode_v2(&image, 8, 16);
        assert!(enc.payload.len() < width * height);
    }
}
