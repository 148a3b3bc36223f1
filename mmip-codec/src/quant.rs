//! Physics-inspired per-block quantization scale and the stage frequency
//! weighting matrices applied on top of it.

use crate::zigzag::ZigZag;

/// Per-block mean/std of a padded plane, shape `(hb, wb)` row-major.
pub struct BlockStats {
    pub hb: usize,
    pub wb: usize,
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

pub fn block_stats(padded: &[u16], width: usize, height: usize, block_n: usize) -> BlockStats {
    debug_assert_eq!(padded.len(), width * height);
    let hb = height / block_n;
    let wb = width / block_n;
    let mut mean = vec![0f32; hb * wb];
    let mut std = vec![0f32; hb * wb];
    let count = (block_n * block_n) as f32;
    for br in 0..hb {
        for bc in 0..wb {
            let mut sum = 0f64;
            for r in 0..block_n {
                let row = (br * block_n + r) * width + bc * block_n;
                for c in 0..block_n {
                    sum += padded[row + c] as f64;
                }
            }
            let mu = (sum / count as f64) as f32;
            let mut var_sum = 0f64;
            for r in 0..block_n {
                let row = (br * block_n + r) * width + bc * block_n;
                for c in 0..block_n {
                    let d = padded[row + c] as f64 - mu as f64;
                    var_sum += d * d;
                }
            }
            let sd = ((var_sum / count as f64).sqrt()) as f32;
            mean[br * wb + bc] = mu;
            std[br * wb + bc] = sd;
        }
    }
    BlockStats { hb, wb, mean, std }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Continuous importance from an attenuation proxy: high mean intensity
/// (more attenuation) maps toward a smaller scale (finer quantization).
pub fn attenuation_scale(mean: &[f32], tau: f32, kappa: f32, alpha: f32, eps: f32) -> Vec<f32> {
    let k = kappa.max(1.0);
    mean.iter()
        .map(|&mu| {
            let w = sigmoid((mu - tau) / k);
            1.0 / (eps + w.powf(alpha))
        })
        .collect()
}

/// Poisson-like relative-noise proxy: noisier blocks get a coarser scale.
pub fn noise_scale(mean: &[f32], std: &[f32], lam: f32, c: f32) -> Vec<f32> {
    mean.iter()
        .zip(std.iter())
        .map(|(&mu, &sd)| {
            let rel = sd / (mu + c);
            1.0 + lam * rel
        })
        .collect()
}

/// Stage-specific MTF/PSF-inspired frequency weighting `m_s(u,v)`, zigzag
/// scanned to align with coefficient order. `stage_id`: 0=DC, 1=low-freq,
/// 2=high/remaining.
pub fn stage_freq_matrix(block_n: usize, stage_id: u8) -> Vec<f32> {
    let (beta, p, gamma) = match stage_id {
        0 => (0.10f32, 1.0f32, 0.60f32),
        1 => (0.35, 1.3, 1.00),
        _ => (0.35, 1.3, 1.05),
    };
    let denom = (2.0 * ((block_n - 1) as f32).powi(2)).sqrt();
    let denom = if denom > 0.0 { denom } else { 1.0 };
    let mut m = vec![0f32; block_n * block_n];
    for u in 0..block_n {
        for v in 0..block_n {
            let rho = ((u * u + v * v) as f32).sqrt() / denom;
            m[u * block_n + v] = (1.0 + beta * rho.powf(p)) * gamma;
        }
    }
    m
}

/// Zigzag-scans a row-major `block_n x block_n` frequency matrix.
pub fn stage_freq_matrix_zigzag(block_n: usize, stage_id: u8) -> Vec<f32> {
    let m = stage_freq_matrix(block_n, stage_id);
    ZigZag::new(block_n).scan(&m)
}

/// Minimum quantization step per stage, guarding against overflow of the
/// 16-bit bit-shifted int16 coefficient at the given block size. The DC
/// coefficient is the likeliest to overflow, so it gets the larger floor.
pub fn qmin_for_stage(stage_id: u8) -> f32 {
    if stage_id == 0 {
        16.0
    } else {
        8.0
    }
}

/// Quantizes a combined block scale map to a transmissible uint8:
/// `round(s * qscale)`, clamped to `[0,255]`.
pub fn quantize_block_scale(s_block: &[f32], qscale: u16) -> Vec<u8> {
    s_block
        .iter()
        .map(|&s| {
            let q = (s * qscale as f32).round();
            q.clamp(0.0, 255.0) as u8
        })
        .collect()
}

/// Recovers the float block scale from the transmitted uint8 map.
/// `clip` applies the encoder's `[1.0, 1.6]` bound; pass `false` to recover
/// the raw decoder-side value (no corresponding clip on the decode path).
pub fn block_scale_from_quantized(sb_q: &[u8], qscale: u16, clip: bool) -> Vec<f32> {
    sb_q.iter()
        .map(|&q| {
            let sb = q as f32 / qscale as f32;
            if clip {
                sb.clamp(1.0, 1.6)
            } else {
                sb
            }
        })
        .collect()
}
