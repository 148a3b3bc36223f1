//! MMIP v4 binary container: fixed header, ROI bitmap, block-scale map,
//! and a sequence of per-stage (header, Huffman table, payload) records.
//!
//! This crate only knows the byte layout; it has no notion of DCT
//! coefficients, quantization, or what the payload bits decode to. That
//! stays a level up, in the codec crate.

use std::error;
use std::fmt;
use std::io;
use std::io::{Read, Write};

use log::debug;

pub const MAGIC: [u8; 4] = *b"MMIP";
pub const VERSION: u8 = 4;
pub const HEADER_SIZE: usize = 38;
pub const STAGE_HEADER_SIZE: usize = 8;
pub const TABLE_ENTRY_SIZE: usize = 4;

#[derive(Debug)]
pub enum ContainerError {
    BadMagic { found: [u8; 4] },
    UnsupportedVersion { found: u8 },
    ShortRead { context: &'static str },
    RangeError(String),
    Io(io::Error),
}

impl error::Error for ContainerError {}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadMagic { found } => write!(f, "bad magic {:?}, expected \"MMIP\"", found),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported version {}, expected {}", found, VERSION)
            }
            Self::ShortRead { context } => write!(f, "short read: {}", context),
            Self::RangeError(msg) => write!(f, "value out of range: {}", msg),
            Self::Io(e) => write!(f, "{}", e),
        }
    }
}

impl From<io::Error> for ContainerError {
    fn from(e: io::Error) -> Self {
        ContainerError::Io(e)
    }
}

/// Fixed 38-byte main header, little-endian throughout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub flags: u8,
    pub bitdepth: u8,
    pub block_n: u8,
    pub width: u16,
    pub height: u16,
    pub pad_w: u16,
    pub pad_h: u16,
    pub qstep_bg: u16,
    pub qstep_roi: u16,
    pub roi_bits: u32,
    pub roi_bytes: u32,
    pub sb_qscale: u16,
    pub sb_bytes: u32,
    pub nstages: u8,
}

impl Header {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), ContainerError> {
        w.write_all(&MAGIC)?;
        w.write_all(&[VERSION, self.flags, self.bitdepth, self.block_n])?;
        w.write_all(&self.width.to_le_bytes())?;
        w.write_all(&self.height.to_le_bytes())?;
        w.write_all(&self.pad_w.to_le_bytes())?;
        w.write_all(&self.pad_h.to_le_bytes())?;
        w.write_all(&self.qstep_bg.to_le_bytes())?;
        w.write_all(&self.qstep_roi.to_le_bytes())?;
        w.write_all(&self.roi_bits.to_le_bytes())?;
        w.write_all(&self.roi_bytes.to_le_bytes())?;
        w.write_all(&self.sb_qscale.to_le_bytes())?;
        w.write_all(&self.sb_bytes.to_le_bytes())?;
        w.write_all(&[self.nstages, 0, 0, 0])?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Header, ContainerError> {
        let mut buf = [0u8; HEADER_SIZE];
        r.read_exact(&mut buf).map_err(|_| ContainerError::ShortRead {
            context: "main header",
        })?;

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);
        if magic != MAGIC {
            return Err(ContainerError::BadMagic { found: magic });
        }
        let version = buf[4];
        if version != VERSION {
            return Err(ContainerError::UnsupportedVersion { found: version });
        }

        let u16_at = |o: usize| u16::from_le_bytes([buf[o], buf[o + 1]]);
        let u32_at = |o: usize| u32::from_le_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]);

        Ok(Header {
            flags: buf[5],
            bitdepth: buf[6],
            block_n: buf[7],
            width: u16_at(8),
            height: u16_at(10),
            pad_w: u16_at(12),
            pad_h: u16_at(14),
            qstep_bg: u16_at(16),
            qstep_roi: u16_at(18),
            roi_bits: u32_at(20),
            roi_bytes: u32_at(24),
            sb_qscale: u16_at(28),
            sb_bytes: u32_at(30),
            nstages: buf[34],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageHeader {
    pub k0: u8,
    pub k1: u8,
    pub table_len: u16,
    pub payload_len: u32,
}

impl StageHeader {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), ContainerError> {
        w.write_all(&[self.k0, self.k1])?;
        w.write_all(&self.table_len.to_le_bytes())?;
        w.write_all(&self.payload_len.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<StageHeader, ContainerError> {
        let mut buf = [0u8; STAGE_HEADER_SIZE];
        r.read_exact(&mut buf).map_err(|_| ContainerError::ShortRead {
            context: "stage header",
        })?;
        Ok(StageHeader {
            k0: buf[0],
            k1: buf[1],
            table_len: u16::from_le_bytes([buf[2], buf[3]]),
            payload_len: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }
}

/// One entry of a transmitted Huffman code-length table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableEntry {
    pub run: u8,
    pub value: i16,
    pub codelen: i8,
}

pub fn write_table<W: Write>(w: &mut W, entries: &[TableEntry]) -> Result<(), ContainerError> {
    for e in entries {
        if !(1..=31).contains(&e.codelen) {
            return Err(ContainerError::RangeError(format!(
                "codelen {} out of range [1,31]",
                e.codelen
            )));
        }
        w.write_all(&[e.run])?;
        w.write_all(&e.value.to_le_bytes())?;
        w.write_all(&[e.codelen as u8])?;
    }
    Ok(())
}

pub fn read_table<R: Read>(r: &mut R, table_len: usize) -> Result<Vec<TableEntry>, ContainerError> {
    let mut out = Vec::with_capacity(table_len);
    for _ in 0..table_len {
        let mut buf = [0u8; TABLE_ENTRY_SIZE];
        r.read_exact(&mut buf).map_err(|_| ContainerError::ShortRead {
            context: "table entry",
        })?;
        out.push(TableEntry {
            run: buf[0],
            value: i16::from_le_bytes([buf[1], buf[2]]),
            codelen: buf[3] as i8,
        });
    }
    Ok(out)
}

/// A fully parsed/to-be-written stage record.
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub k0: u8,
    pub k1: u8,
    pub table: Vec<TableEntry>,
    pub payload: Vec<u8>,
}

/// The full on-disk layout: header, ROI bitmap, block-scale map, stages.
#[derive(Debug, Clone)]
pub struct Container {
    pub header: Header,
    pub roi_bytes: Vec<u8>,
    pub sb_bytes: Vec<u8>,
    pub stages: Vec<StageRecord>,
}

pub fn write_container<W: Write>(c: &Container, w: &mut W) -> Result<(), ContainerError> {
    c.header.write_to(w)?;
    w.write_all(&c.roi_bytes)?;
    w.write_all(&c.sb_bytes)?;
    for stage in &c.stages {
        let sh = StageHeader {
            k0: stage.k0,
            k1: stage.k1,
            table_len: stage.table.len() as u16,
            payload_len: stage.payload.len() as u32,
        };
        sh.write_to(w)?;
        write_table(w, &stage.table)?;
        w.write_all(&stage.payload)?;
    }
    debug!(
        "wrote container: {} stages, {} ROI bytes, {} sb bytes",
        c.stages.len(),
        c.roi_bytes.len(),
        c.sb_bytes.len()
    );
    Ok(())
}

pub fn read_container<R: Read>(r: &mut R) -> Result<Container, ContainerError> {
    let header = Header::read_from(r)?;

    let mut roi_bytes = vec![0u8; header.roi_bytes as usize];
    r.read_exact(&mut roi_bytes).map_err(|_| ContainerError::ShortRead {
        context: "ROI bitmap",
    })?;

    let mut sb_bytes = vec![0u8; header.sb_bytes as usize];
    r.read_exact(&mut sb_bytes).map_err(|_| ContainerError::ShortRead {
        context: "block-scale map",
    })?;

    let mut stages = Vec::with_capacity(header.nstages as usize);
    for _ in 0..header.nstages {
        let sh = StageHeader::read_from(r)?;
        let table = read_table(r, sh.table_len as usize)?;
        let mut payload = vec![0u8; sh.payload_len as usize];
        r.read_exact(&mut payload).map_err(|_| ContainerError::ShortRead {
            context: "stage payload",
        })?;
        stages.push(StageRecord {
            k0: sh.k0,
            k1: sh.k1,
            table,
            payload,
        });
    }

    debug!(
        "read container: {}x{} ({} blocks), {} stages",
        header.width, header.height, header.roi_bits, header.nstages
    );
    Ok(Container {
        header,
        roi_bytes,
        sb_bytes,
        stages,
    })
}
