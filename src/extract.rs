use bitvec::{order::Lsb0, view::BitView};
use std::path::Path;

use crate::*;

/// Local descriptor extraction.
///
/// Given an image, produce a variable number of `dim()`-dimensional descriptors,
/// flattened row-major. An image may legitimately produce none.
pub trait DescriptorExtractor {
    /// Length of one descriptor.
    fn dim(&self) -> usize;

    /// Descriptors of the image at `path`. Fails with [`BowErr::ImageRead`] if the
    /// image cannot be decoded.
    fn extract(&self, path: &Path) -> BowResult<Vec<f32>>;
}

/// Expand a packed binary descriptor into one `±1` component per bit, least significant
/// bit of every byte first.
///
/// Binary descriptors (ORB, BRIEF) are compared with Hamming distance; in this signed
/// form the squared Euclidean distance is `4 × hamming`, so Euclidean k-means can
/// cluster them directly.
pub fn unpack_binary(desc: &[u8], out: &mut Vec<f32>) {
    out.extend(
        desc.view_bits::<Lsb0>()
            .iter()
            .map(|b| if *b { 1. } else { -1. }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpack_low_bit_first() {
        let mut v = Vec::new();
        unpack_binary(&[0b1011_0001], &mut v);
        assert_eq!(v, vec![1., -1., -1., -1., 1., 1., -1., 1.]);
    }

    #[test]
    fn squared_distance_is_four_times_hamming() {
        let (a, b) = ([0xAAu8, 0x0F], [0x55u8, 0x0E]);
        let (mut x, mut y) = (Vec::new(), Vec::new());
        unpack_binary(&a, &mut x);
        unpack_binary(&b, &mut y);
        let hamming: u32 = a.iter().zip(&b).map(|(p, q)| (p ^ q).count_ones()).sum();
        let sq: f32 = x.iter().zip(&y).map(|(p, q)| (p - q) * (p - q)).sum();
        assert_eq!(x.len(), 16);
        assert_eq!(sq, 4. * hamming as f32);
    }
}
