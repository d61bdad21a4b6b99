//! Perceptual Hash (pHash) implementation.
//!
//! pHash resizes to 32x32, runs a 2D DCT-II, keeps the top-left 8x8 block
//! of low-frequency coefficients, discards the DC term at [0,0], and
//! compares the remaining 63 coefficients to the block's median. This
//! makes it more robust than dHash to scaling, brightness/contrast
//! changes, and compression artifacts, at the cost of being pickier about
//! crops and rotations.

use super::super::fast_resize::resize_to_grayscale;
use super::super::traits::{HashAlgorithm, HashAlgorithmKind};
use crate::error::HashError;
use image::DynamicImage;

const SRC_SIZE: usize = 32;
const DCT_SIZE: usize = 8;

/// Perceptual Hash (pHash) implementation using a direct 2D DCT-II.
pub struct PerceptualHasher;

impl PerceptualHasher {
    pub fn new() -> Self {
        Self
    }

    /// Orthonormal 2D DCT-II over a 32x32 grayscale plane, returning only
    /// the top-left 8x8 block of coefficients.
    fn dct_8x8(pixels: &[[f64; SRC_SIZE]; SRC_SIZE]) -> [[f64; DCT_SIZE]; DCT_SIZE] {
        let mut cos_table = [[0.0_f64; SRC_SIZE]; DCT_SIZE];
        for (u, row) in cos_table.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = ((std::f64::consts::PI / SRC_SIZE as f64)
                    * (x as f64 + 0.5)
                    * u as f64)
                    .cos();
            }
        }

        let alpha = |k: usize| -> f64 {
            if k == 0 {
                (1.0 / SRC_SIZE as f64).sqrt()
            } else {
                (2.0 / SRC_SIZE as f64).sqrt()
            }
        };

        let mut coeffs = [[0.0_f64; DCT_SIZE]; DCT_SIZE];
        for u in 0..DCT_SIZE {
            for v in 0..DCT_SIZE {
                let mut sum = 0.0;
                for (x, row) in pixels.iter().enumerate() {
                    for (y, &p) in row.iter().enumerate() {
                        sum += p * cos_table[u][x] * cos_table[v][y];
                    }
                }
                coeffs[u][v] = alpha(u) * alpha(v) * sum;
            }
        }

        coeffs
    }

    fn hash_from_luma(gray: &image::GrayImage) -> u64 {
        let mut pixels = [[0.0_f64; SRC_SIZE]; SRC_SIZE];
        for y in 0..SRC_SIZE {
            for x in 0..SRC_SIZE {
                pixels[x][y] = gray.get_pixel(x as u32, y as u32)[0] as f64;
            }
        }

        let coeffs = Self::dct_8x8(&pixels);

        // Median over the 8x8 block excluding the DC term at [0,0].
        let mut values: Vec<f64> = Vec::with_capacity(DCT_SIZE * DCT_SIZE - 1);
        for (u, row) in coeffs.iter().enumerate() {
            for (v, &c) in row.iter().enumerate() {
                if u == 0 && v == 0 {
                    continue;
                }
                values.push(c);
            }
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let median = values[values.len() / 2];

        let mut hash: u64 = 0;
        let mut bit = 63;
        for (u, row) in coeffs.iter().enumerate() {
            for (v, &c) in row.iter().enumerate() {
                if u == 0 && v == 0 {
                    // DC position bit is forced to 0.
                    bit -= 1;
                    continue;
                }
                if c > median {
                    hash |= 1 << bit;
                }
                bit -= 1;
            }
        }

        hash
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl HashAlgorithm for PerceptualHasher {
    fn hash_image(&self, image: &DynamicImage) -> Result<u64, HashError> {
        let gray = resize_to_grayscale(image, SRC_SIZE as u32, SRC_SIZE as u32)?;
        Ok(Self::hash_from_luma(&gray))
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::Perceptual
    }
}
