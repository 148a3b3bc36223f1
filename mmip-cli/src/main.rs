use std::error;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;

use mmip_codec::image::PixelBuffer;
use mmip_codec::pipeline::v4::{decode_v4, encode_v4};
use mmip_codec::roi::{block_roi_map, roi_mask_from_phantom};
use mmip_container::{read_container, write_container, Container, Header, StageRecord, TableEntry};
use mmip_inspect::{describe, validate, DetailLevel};

#[derive(Debug)]
enum CliError {
    RawPlaneSizeMismatch { expected: usize, got: usize },
}

impl error::Error for CliError {}
impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::RawPlaneSizeMismatch { expected, got } => write!(
                f,
                "raw plane has {} bytes, expected {} for the given width/height",
                got, expected
            ),
        }
    }
}

#[derive(Parser)]
#[command(name = "mmip", author, version, about = "MMIP v4 medical image codec")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a raw little-endian uint16 plane into an MMIP v4 stream.
    Encode {
        /// Raw uint16 plane, row-major, little-endian.
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        width: usize,
        #[arg(long)]
        height: usize,
        /// 1-100 subjective quality; maps to qstep_bg/qstep_roi.
        #[arg(long)]
        quality: i32,
        #[arg(long, default_value_t = 8)]
        block: usize,
        #[arg(long, default_value_t = 9000)]
        bone_threshold: u16,
        #[arg(long, default_value_t = 16)]
        sb_qscale: u16,
    },
    /// Decode an MMIP v4 stream back to a raw little-endian uint16 plane.
    Decode {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Number of spectral stages to decode (1..=nstages).
        #[arg(long, default_value_t = 3)]
        stages: usize,
    },
    /// Print a structural summary of an MMIP v4 stream without decoding it.
    Inspect {
        input: PathBuf,
        /// Also list every Huffman table entry per stage.
        #[arg(long)]
        full: bool,
    },
}

/// `base = max(1, round(220/max(1,q)))`; ROI gets half, background double.
fn quality_to_qsteps(quality: i32) -> (u16, u16) {
    let q = quality.max(1) as f64;
    let base = (220.0 / q).round().max(1.0) as i64;
    let qstep_roi = (base / 2).max(1) as u16;
    let qstep_bg = (base * 2).max(1) as u16;
    (qstep_bg, qstep_roi)
}

fn read_raw_plane(path: &PathBuf, width: usize, height: usize) -> Result<PixelBuffer, Box<dyn Error>> {
    let bytes = fs::read(path)?;
    let expected = width * height * 2;
    if bytes.len() != expected {
        return Err(CliError::RawPlaneSizeMismatch {
            expected,
            got: bytes.len(),
        }
        .into());
    }
    let data: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    Ok(PixelBuffer::new(width, height, data))
}

fn write_raw_plane(path: &PathBuf, image: &PixelBuffer) -> Result<(), Box<dyn Error>> {
    let mut bytes = Vec::with_capacity(image.data.len() * 2);
    for &v in &image.data {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    fs::write(path, bytes)?;
    Ok(())
}

fn run_encode(
    input: PathBuf,
    output: PathBuf,
    width: usize,
    height: usize,
    quality: i32,
    block: usize,
    bone_threshold: u16,
    sb_qscale: u16,
) -> Result<(), Box<dyn Error>> {
    let image = read_raw_plane(&input, width, height)?;
    let (padded, pad_w, pad_h) = image.pad_to_block(block);

    let roi_pix = roi_mask_from_phantom(&padded, bone_threshold);
    let roi_blk = block_roi_map(&roi_pix, padded.width, padded.height, block);

    let (qstep_bg, qstep_roi) = quality_to_qsteps(quality);
    info!(
        "encoding {}x{} quality={} -> qstep_bg={} qstep_roi={}",
        width, height, quality, qstep_bg, qstep_roi
    );

    let enc = encode_v4(&image, block, qstep_bg, qstep_roi, &roi_blk, sb_qscale);
    let roi_bytes = mmip_bitio::pack_bits(&roi_blk);

    let header = Header {
        flags: 0,
        bitdepth: 16,
        block_n: block as u8,
        width: width as u16,
        height: height as u16,
        pad_w: pad_w as u16,
        pad_h: pad_h as u16,
        qstep_bg,
        qstep_roi,
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
        sb_bytes: enc.sb_q,
        stages,
    };

    let mut buf = Vec::new();
    write_container(&container, &mut buf)?;
    fs::write(&output, buf)?;
    info!("wrote {}", output.display());
    Ok(())
}

fn run_decode(input: PathBuf, output: PathBuf, stages: usize) -> Result<(), Box<dyn Error>> {
    let bytes = fs::read(&input)?;
    let container = read_container(&mut Cursor::new(bytes))?;
    let h = &container.header;

    let hb = (h.height as usize + h.pad_h as usize) / h.block_n as usize;
    let wb = (h.width as usize + h.pad_w as usize) / h.block_n as usize;
    let roi_blk = mmip_bitio::unpack_bits(&container.roi_bytes, hb * wb);

    let enc = mmip_codec::pipeline::v4::EncodedV4 {
        stages: container
            .stages
            .iter()
            .map(|s| mmip_codec::pipeline::StageData {
                k0: s.k0 as usize,
                k1: s.k1 as usize,
                table_entries: s
                    .table
                    .iter()
                    .map(|e| ((e.run, e.value), e.codelen as u8))
                    .collect(),
                payload: s.payload.clone(),
            })
            .collect(),
        sb_q: container.sb_bytes.clone(),
        sb_qscale: h.sb_qscale,
        pad_w: h.pad_w as usize,
        pad_h: h.pad_h as usize,
        hb,
        wb,
        block_n: h.block_n as usize,
    };

    let image = decode_v4(
        &enc,
        h.width as usize,
        h.height as usize,
        h.qstep_bg,
        h.qstep_roi,
        &roi_blk,
        stages,
    )?;
    write_raw_plane(&output, &image)?;
    info!(
        "decoded {} stage(s) of {} -> {}",
        stages.min(h.nstages as usize),
        h.nstages,
        output.display()
    );
    Ok(())
}

fn run_inspect(input: PathBuf, full: bool) -> Result<(), Box<dyn Error>> {
    let bytes = fs::read(&input)?;
    let container = read_container(&mut Cursor::new(bytes))?;
    validate(&container)?;
    let level = if full { DetailLevel::Full } else { DetailLevel::Summary };
    print!("{}", describe(&container, level));
    Ok(())
}

fn run() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Encode {
            input,
            output,
            width,
            height,
            quality,
            block,
            bone_threshold,
            sb_qscale,
        } => run_encode(input, output, width, height, quality, block, bone_threshold, sb_qscale),
        Command::Decode { input, output, stages } => run_decode(input, output, stages),
        Command::Inspect { input, full } => run_inspect(input, full),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    run()
}
