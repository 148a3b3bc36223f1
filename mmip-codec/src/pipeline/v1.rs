//! Generation 1: per-block DCT with uniform scalar quantization, no
//! entropy coding. Each block's quantized zigzag vector is stored
//! verbatim as int16.

use crate::dct::DctMatrix;
use crate::image::PixelBuffer;
use crate::zigzag::ZigZag;

use super::{extract_block, write_block};

pub struct EncodedV1 {
    pub blocks: Vec<Vec<i16>>,
    pub pad_w: usize,
    pub pad_h: usize,
    pub block_n: usize,
}

pub fn encode_v1(image: &PixelBuffer, block_n: usize, qstep: u16) -> EncodedV1 {
    let (padded, pad_w, pad_h) = image.pad_to_block(block_n);
    let c = DctMatrix::new(block_n);
    let zz = ZigZag::new(block_n);
    let qstep = qstep as f32;

    let hb = padded.height / block_n;
    let wb = padded.width / block_n;
    let mut blocks = Vec::with_capacity(hb * wb);
    for br in 0..hb {
        for bc in 0..wb {
            let blk = extract_block(&padded, br, bc, block_n);
            let coeff = c.forward(&blk);
            let q: Vec<i16> = coeff.iter().map(|&v| (v / qstep).round() as i16).collect();
            blocks.push(zz.scan(&q));
        }
    }
    EncodedV1 {
        blocks,
        pad_w,
        pad_h,
        block_n,
    }
}

pub fn decode_v1(
    enc: &EncodedV1,
    width: usize,
    height: usize,
    qstep: u16,
) -> PixelBuffer {
    let block_n = enc.block_n;
    let hp = height + enc.pad_h;
    let wp = width + enc.pad_w;
    let c = DctMatrix::new(block_n);
    let zz = ZigZag::new(block_n);
    let qstep = qstep as f32;

    let wb = wp / block_n;
    let mut out = PixelBuffer::zeroed(wp, hp);
    for (idx, zzvec) in enc.blocks.iter().enumerate() {
        let br = idx / wb;
        let bc = idx % wb;
        let qblk: Vec<f32> = zz.unscan(zzvec).iter().map(|&v| v as f32).collect();
        let coeff: Vec<f32> = qblk.iter().map(|&v| v * qstep).collect();
        let blk = c.inverse(&coeff);
        write_block(&mut out, br, bc, block_n, &blk);
    }
    out.crop_to(width, height)
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
            *v = (2000 + (i % 37) * 53) as u16;
        }
        let image = PixelBuffer::new(width, height, data.clone());
        let qstep = 8;
        let enc = encode_v1(&image, 8, qstep);
        let dec = decode_v1(&enc, width, height, qstep);
        for (orig, got) in data.iter().zip(dec.data.iter()) {
            assert!((*orig as i32 - *got as i32).abs() < 200);
        }
    }
}
