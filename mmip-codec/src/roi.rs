//! Region-of-interest masks: per-pixel threshold mask reduced to a
//! per-block flag map.

use crate::image::PixelBuffer;

/// `roi_pix[i] = pixel[i] >= bone_threshold`, flat row-major, same shape
/// as `image`. Named for the phantom/CT scans this format targets, where
/// bone is the clinically important high-attenuation region.
pub fn roi_mask_from_phantom(image: &PixelBuffer, bone_threshold: u16) -> Vec<u8> {
    image
        .data
        .iter()
        .map(|&v| if v >= bone_threshold { 1 } else { 0 })
        .collect()
}

/// Reduces a per-pixel ROI mask (row-major, `width x height`) to one flag
/// per `block_n x block_n` tile, raster order. A block is ROI iff any
/// pixel within it is ROI. `width`/`height` must be multiples of `block_n`.
pub fn block_roi_map(mask: &[u8], width: usize, height: usize, block_n: usize) -> Vec<u8> {
    debug_assert_eq!(mask.len(), width * height);
    debug_assert_eq!(width % block_n, 0);
    debug_assert_eq!(height % block_n, 0);
    let hb = height / block_n;
    let wb = width / block_n;
    let mut out = vec![0u8; hb * wb];
    for br in 0..hb {
        for bc in 0..wb {
            let mut any = false;
            'block: for r in 0..block_n {
                for c in 0..block_n {
                    let pr = br * block_n + r;
                    let pc = bc * block_n + c;
                    if mask[pr * width + pc] != 0 {
                        any = true;
                        break 'block;
                    }
                }
            }
            out[br * wb + bc] = any as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_mask_matches_comparison() {
        let buf = PixelBuffer::new(4, 1, vec![1000, 9000, 9001, 8999]);
        let mask = roi_mask_from_phantom(&buf, 9000);
        assert_eq!(mask, vec![0, 1, 1, 0]);
    }

    #[test]
    fn block_is_roi_if_any_pixel_is() {
        // 16x8, 2x1 blocks of 8x8, only one pixel set in the second block.
        let width = 16;
        let height = 8;
        let mut mask = vec![0u8; width * height];
        mask[3 * width + 9] = 1;
        let blk = block_roi_map(&mask, width, height, 8);
        assert_eq!(blk, vec![0, 1]);
    }

    #[test]
    fn all_background_gives_no_roi_blocks() {
        let width = 16;
        let height = 16;
        let mask = vec![0u8; width * height];
        let blk = block_roi_map(&mask, width, height, 8);
        assert_eq!(blk, vec![0, 0, 0, 0]);
    }
}
