//! Human-readable structural dump and sanity checks for an MMIP v4
//! stream, independent of decoding its pixel content.

use core::fmt::Write as _;
use std::error;
use std::fmt;

use log::debug;
use mmip_container::Container;

#[derive(Debug)]
pub enum InspectError {
    ShapeMismatch { field: &'static str, expected: u32, got: u32 },
    TableCodelenOutOfRange { stage: usize, codelen: i8 },
}

impl error::Error for InspectError {}
impl fmt::Display for InspectError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ShapeMismatch { field, expected, got } => {
                write!(f, "{} mismatch: expected {}, got {}", field, expected, got)
            }
            Self::TableCodelenOutOfRange { stage, codelen } => {
                write!(f, "stage {} table has codelen {} out of [1,31]", stage, codelen)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    /// Header fields and per-stage sizes only.
    Summary,
    /// Summary plus one line per Huffman table entry.
    Full,
}

/// Checks the invariants a well-formed stream must satisfy, independent
/// of whether the payload bits themselves decode cleanly.
pub fn validate(container: &Container) -> Result<(), InspectError> {
    let h = &container.header;
    debug!(
        "validating stream: {} stages, {} roi blocks",
        h.nstages, h.roi_bits
    );
    let expected_roi_bytes = (h.roi_bits + 7) / 8;
    if container.roi_bytes.len() as u32 != expected_roi_bytes {
        return Err(InspectError::ShapeMismatch {
            field: "roi_bytes",
            expected: expected_roi_bytes,
            got: container.roi_bytes.len() as u32,
        });
    }
    if container.sb_bytes.len() as u32 != h.sb_bytes {
        return Err(InspectError::ShapeMismatch {
            field: "sb_bytes",
            expected: h.sb_bytes,
            got: container.sb_bytes.len() as u32,
        });
    }
    for (i, stage) in container.stages.iter().enumerate() {
        for entry in &stage.table {
            if !(1..=31).contains(&entry.codelen) {
                return Err(InspectError::TableCodelenOutOfRange {
                    stage: i,
                    codelen: entry.codelen,
                });
            }
        }
    }
    Ok(())
}

/// Renders a structural summary of `container`.
pub fn describe(container: &Container, level: DetailLevel) -> String {
    let h = &container.header;
    let mut out = String::new();

    writeln!(out, "MMIP v4").unwrap();
    writeln!(
        out,
        "  image: {}x{} (padded {}x{})",
        h.width,
        h.height,
        h.width + h.pad_w,
        h.height + h.pad_h
    )
    .unwrap();
    writeln!(
        out,
        "  block: {}  qstep_bg={} qstep_roi={}",
        h.block_n, h.qstep_bg, h.qstep_roi
    )
    .unwrap();

    let roi_on: u32 = container.roi_bytes.iter().map(|b| b.count_ones()).sum();
    writeln!(
        out,
        "  roi: {} blocks, {} flagged ({} bytes packed)",
        h.roi_bits, roi_on, h.roi_bytes
    )
    .unwrap();
    writeln!(
        out,
        "  block-scale: qscale={} ({} bytes)",
        h.sb_qscale, h.sb_bytes
    )
    .unwrap();

    writeln!(out, "  stages: {}", h.nstages).unwrap();
    for (i, stage) in container.stages.iter().enumerate() {
        writeln!(
            out,
            "    stage {}: k[{},{})  table={} entries  payload={} bytes",
            i,
            stage.k0,
            stage.k1,
            stage.table.len(),
            stage.payload.len()
        )
        .unwrap();
        if level == DetailLevel::Full {
            for entry in &stage.table {
                writeln!(
                    out,
                    "      run={:3} value={:6} codelen={}",
                    entry.run, entry.value, entry.codelen
                )
                .unwrap();
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmip_container::{Header, StageRecord, TableEntry};

    fn sample() -> Container {
        Container {
            header: Header {
                flags: 0,
                bitdepth: 16,
                block_n: 8,
                width: 13,
                height: 7,
                pad_w: 3,
                pad_h: 1,
                qstep_bg: 40,
                qstep_roi: 16,
                roi_bits: 2,
                roi_bytes: 1,
                sb_qscale: 16,
                sb_bytes: 2,
                nstages: 1,
            },
            roi_bytes: vec![0b1000_0000],
            sb_bytes: vec![16, 20],
            stages: vec![StageRecord {
                k0: 0,
                k1: 1,
                table: vec![TableEntry {
                    run: 0,
                    value: 5,
                    codelen: 1,
                }],
                payload: vec![0xFF],
            }],
        }
    }

    #[test]
    fn well_formed_stream_validates() {
        assert!(validate(&sample()).is_ok());
    }

    #[test]
    fn wrong_roi_bytes_length_is_rejected() {
        let mut c = sample();
        c.roi_bytes.push(0);
        assert!(matches!(
            validate(&c),
            Err(InspectError::ShapeMismatch { field: "roi_bytes", .. })
        ));
    }

    #[test]
    fn out_of_range_codelen_is_rejected() {
        let mut c = sample();
        c.stages[0].table[0].codelen = 0;
        assert!(matches!(
            validate(&c),
            Err(InspectError::TableCodelenOutOfRange { .. })
        ));
    }

    #[test]
    fn describe_includes_dimensions_and_stage_count() {
        let text = describe(&sample(), DetailLevel::Summary);
        assert!(text.contains("13x7"));
        assert!(text.contains("stages: 1"));
        assert!(!text.contains("run="));
    }

    #[test]
    fn full_detail_lists_table_entries() {
        let text = describe(&sample(), DetailLevel::Full);
        assert!(text.contains("run="));
    }
}
