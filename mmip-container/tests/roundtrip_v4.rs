//! Builds a v4 container end-to-end from the codec crate's pipeline
//! output, writes it, reads it back, and checks the bytes agree.

use std::io::Cursor;

use mmip_codec::image::PixelBuffer;
use mmip_codec::pipeline::v4::encode_v4;
use mmip_codec::roi::{block_roi_map, roi_mask_from_phantom};
use mmip_container::{write_container, read_container, Container, Header, StageRecord, TableEntry};

fn sample_image(width: usize, height: usize) -> PixelBuffer {
    let mut data = vec![0u16; width * height];
    for (i, v) in data.iter_mut().enumerate() {
        *v = (3000 + (i % 43) * 59) as u16;
    }
    PixelBuffer::new(width, height, data)
}

#[test]
fn full_v4_stream_roundtrips_through_the_container_format() {
    let width = 16;
    let height = 16;
    let block_n = 8;
    let image = sample_image(width, height);

    let (padded, pad_w, pad_h) = image.pad_to_block(block_n);
    let roi_pix = roi_mask_from_phantom(&padded, 9000);
    let roi_blk = block_roi_map(&roi_pix, padded.width, padded.height, block_n);

    let enc = encode_v4(&image, block_n, 40, 16, &roi_blk, 16);

    let roi_bytes = mmip_bitio::pack_bits(&roi_blk);

    let header = Header {
        flags: 0,
        bitdepth: 16,
        block_n: block_n as u8,
        width: width as u16,
        height: height as u16,
        pad_w: pad_w as u16,
        pad_h: pad_h as u16,
        qstep_bg: 40,
        qstep_roi: 16,
        roi_bits: roi_blk.len() as u32,
        roi_bytes: roi_bytes.len() as u32,
        sb_qscale: enc.sb_qscale,
        sb_bytes: enc.sb_q.len() as u32,
        nstages: enc.stages.len() as u8,
    };

    let stages = enc
        .stages
        .iter()
        .map(|s| StageRecord {
            k0: s.k0 as u8,
            k1: s.k1 as u8,
            table: s
                .table_entries
                .iter()
                .map(|&((run, value), codelen)| TableEntry {
                    run,
                    value,
                    codelen: codelen as i8,
                })
                .collect(),
            payload: s.payload.clone(),
        })
        .collect();

    let container = Container {
        header,
        roi_bytes,
        sb_bytes: enc.sb_q.clone(),
        stages,
    };

    let mut buf = Vec::new();
    write_container(&container, &mut buf).unwrap();
    let back = read_container(&mut Cursor::new(&buf)).unwrap();

    assert_eq!(back.header, container.header);
    assert_eq!(back.roi_bytes, container.roi_bytes);
    assert_eq!(back.sb_bytes, container.sb_bytes);
    assert_eq!(back.stages.len(), 3);
    for (a, b) in container.stages.iter().zip(back.stages.iter()) {
        assert_eq!(a.table, b.table);
        assert_eq!(a.payload, b.payload);
    }
}
