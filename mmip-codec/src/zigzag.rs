//! Zigzag permutation between an N×N block and a length-N² vector.
//!
//! Traverses anti-diagonals alternately down-left and up-right, starting at
//! (0,0); position 0 is always the DC coefficient.

#[derive(Debug, Clone)]
pub struct ZigZag {
    pub n: usize,
    indices: Vec<(usize, usize)>,
}

impl ZigZag {
    pub fn new(n: usize) -> Self {
        let mut indices = Vec::with_capacity(n * n);
        for s in 0..(2 * n - 1) {
            if s % 2 == 0 {
                let r0 = s.min(n - 1);
                let c0 = s - r0;
                let mut r = r0 as isize;
                let mut c = c0 as isize;
                while r >= 0 && (c as usize) < n {
                    indices.push((r as usize, c as usize));
                    r -= 1;
                    c += 1;
                }
            } else {
                let c0 = s.min(n - 1);
                let r0 = s - c0;
                let mut c = c0 as isize;
                let mut r = r0 as isize;
                while c >= 0 && (r as usize) < n {
                    indices.push((r as usize, c as usize));
                    r += 1;
                    c -= 1;
                }
            }
        }
        debug_assert_eq!(indices.len(), n * n);
        ZigZag { n, indices }
    }

    /// Gathers a row-major N×N block into a length-N² zigzag vector.
    pub fn scan<T: Copy>(&self, block: &[T]) -> Vec<T> {
        debug_assert_eq!(block.len(), self.n * self.n);
        self.indices
            .iter()
            .map(|&(r, c)| block[r * self.n + c])
            .collect()
    }

    /// Scatters a length-N² zigzag vector back into a row-major N×N block.
    pub fn unscan<T: Copy + Default>(&self, vec: &[T]) -> Vec<T> {
        debug_assert_eq!(vec.len(), self.n * self.n);
        let mut out = vec![T::default(); self.n * self.n];
        for (k, &(r, c)) in self.indices.iter().enumerate() {
            out[r * self.n + c] = vec[k];
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_unscan_roundtrip_various_n() {
        for &n in &[2usize, 4, 8, 16] {
            let zz = ZigZag::new(n);
            let block: Vec<i32> = (0..n * n).map(|i| i as i32 - (n * n / 2) as i32).collect();
            let scanned = zz.scan(&block);
            assert_eq!(scanned.len(), n * n);
            let back = zz.unscan(&scanned);
            assert_eq!(back, block);
        }
    }

    #[test]
    fn first_position_is_dc() {
        let zz = ZigZag::new(8);
        let mut block = vec![0i32; 64];
        block[0] = 42;
        let scanned = zz.scan(&block);
        assert_eq!(scanned[0], 42);
    }

    #[test]
    fn known_8x8_sequence_matches_jpeg_style_zigzag() {
        // First few positions of the standard JPEG zigzag walk: (0,0),(0,1),(1,0),(2,0),(1,1),(0,2)...
        let zz = ZigZag::new(8);
        let expected_prefix = [
            (0, 0),
            (0, 1),
            (1, 0),
            (2, 0),
            (1, 1),
            (0, 2),
            (0, 3),
            (1, 2),
        ];
        let mut block = vec![0i32; 64];
        for (k, &(r, c)) in expected_prefix.iter().enumerate() {
            block[r * 8 + c] = k as i32 + 1;
        }
        let scanned = zz.scan(&block);
        for (k, _) in expected_prefix.iter().enumerate() {
            assert_eq!(scanned[k], k as i32 + 1);
        }
    }
}
