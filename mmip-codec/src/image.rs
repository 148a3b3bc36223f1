//! 2-D uint16 pixel buffers and edge-replication padding to a block grid.

/// A row-major 2-D grid of uint16 samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u16>,
}

impl PixelBuffer {
    pub fn new(width: usize, height: usize, data: Vec<u16>) -> Self {
        assert_eq!(data.len(), width * height, "pixel buffer size mismatch");
        PixelBuffer {
            width,
            height,
            data,
        }
    }

    pub fn zeroed(width: usize, height: usize) -> Self {
        PixelBuffer::new(width, height, vec![0u16; width * height])
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> u16 {
        self.data[r * self.width + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, v: u16) {
        self.data[r * self.width + c] = v;
    }

    /// Pads to the next multiple of `block_n` in each dimension using edge
    /// replication (last row/column repeated, corner replicated into the
    /// corner). Returns the padded buffer plus `(pad_w, pad_h)` added.
    pub fn pad_to_block(&self, block_n: usize) -> (PixelBuffer, usize, usize) {
        let pad_h = (block_n - (self.height % block_n)) % block_n;
        let pad_w = (block_n - (self.width % block_n)) % block_n;
        if pad_h == 0 && pad_w == 0 {
            return (self.clone(), 0, 0);
        }
        let new_h = self.height + pad_h;
        let new_w = self.width + pad_w;
        let mut out = vec![0u16; new_h * new_w];
        for r in 0..new_h {
            let src_r = r.min(self.height - 1);
            for c in 0..new_w {
                let src_c = c.min(self.width - 1);
                out[r * new_w + c] = self.get(src_r, src_c);
            }
        }
        (PixelBuffer::new(new_w, new_h, out), pad_w, pad_h)
    }

    /// Crops back to `(width, height)`, dropping padding from the bottom
    /// and right edges.
    pub fn crop_to(&self, width: usize, height: usize) -> PixelBuffer {
        assert!(width <= self.width && height <= self.height);
        let mut out = vec![0u16; width * height];
        for r in 0..height {
            out[r * width..r * width + width]
                .copy_from_slice(&self.data[r * self.width..r * self.width + width]);
        }
        PixelBuffer::new(width, height, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_is_noop_on_multiple() {
        let buf = PixelBuffer::new(8, 8, vec![7u16; 64]);
        let (padded, pw, ph) = buf.pad_to_block(8);
        assert_eq!((pw, ph), (0, 0));
        assert_eq!(padded, buf);
    }

    #[test]
    fn pad_replicates_edges() {
        // width=13, height=7, blockN=8 -> padW=3, padH=1.
        let width = 13;
        let height = 7;
        let mut data = vec![0u16; width * height];
        for r in 0..height {
            for c in 0..width {
                data[r * width + c] = (r * 100 + c) as u16;
            }
        }
        let buf = PixelBuffer::new(width, height, data);
        let (padded, pw, ph) = buf.pad_to_block(8);
        assert_eq!((pw, ph), (3, 1));
        assert_eq!(padded.width, 16);
        assert_eq!(padded.height, 8);

        // last real row is replicated downward
        for c in 0..width {
            assert_eq!(padded.get(7, c), buf.get(6, c));
        }
        // last real column is replicated rightward
        for r in 0..height {
            assert_eq!(padded.get(r, 15), buf.get(r, 12));
        }
        // corner replicates the corner sample
        assert_eq!(padded.get(7, 15), buf.get(6, 12));
    }

    #[test]
    fn crop_recovers_original() {
        let width = 13;
        let height = 7;
        let mut data = vec![0u16; width * height];
        for (i, v) in data.iter_mut().enumerate() {
            *v = i as u16;
        }
        let buf = PixelBuffer::new(width, height, data);
        let (padded, _, _) = buf.pad_to_block(8);
        let cropped = padded.crop_to(width, height);
        assert_eq!(cropped, buf);
    }
}
