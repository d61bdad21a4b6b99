//! Difference Hash (dHash) implementation.
//!
//! dHash works by:
//! 1. Resizing the image to 9x8
//! 2. Converting to grayscale
//! 3. Comparing each pixel to the one to its right
//! 4. If left pixel is brighter, set bit to 1, else 0
//!
//! This captures the relative gradient of brightness changes, packed
//! row-major into a u64.
//!
//! Uses SIMD-accelerated resizing via fast_image_resize for 5-14x speedup.

use super::super::fast_resize::resize_to_grayscale;
use super::super::traits::{HashAlgorithm, HashAlgorithmKind};
use crate::error::HashError;
use image::DynamicImage;

/// Difference Hash (dHash) implementation, fixed to an 8x8 comparison grid
/// (64 bits) per the prescribed signature format.
pub struct DifferenceHasher;

impl DifferenceHasher {
    pub fn new() -> Self {
        Self
    }

    /// Compute the dHash directly from an already-grayscale buffer, used by
    /// the video signature pipeline on decoded frames.
    pub fn hash_luma(gray: &image::GrayImage) -> u64 {
        let mut hash: u64 = 0;
        let mut bit = 63;

        for y in 0..8 {
            for x in 0..8 {
                let left = gray.get_pixel(x, y)[0];
                let right = gray.get_pixel(x + 1, y)[0];
                if left > right {
                    hash |= 1 << bit;
                }
                bit -= 1;
            }
        }

        hash
    }
}

impl Default for DifferenceHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl HashAlgorithm for DifferenceHasher {
    fn hash_image(&self, image: &DynamicImage) -> Result<u64, HashError> {
        // One extra column so each of the 8 columns has a right-hand
        // neighbor to compare against.
        let gray = resize_to_grayscale(image, 9, 8)?;
        Ok(Self::hash_luma(&gray))
    }

    fn kind(&self) -> HashAlgorithmKind {
        HashAlgorithmKind::Difference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn create_solid_image(r: u8, g: u8, b: u8) -> DynamicImage {
        let img = ImageBuffer::from_fn(100, 100, |_, _| Rgb([r, g, b]));
        DynamicImage::ImageRgb8(img)
    }

    fn create_left_to_right_gradient() -> DynamicImage {
        let img = ImageBuffer::from_fn(100, 100, |x, _| {
            let brightness = (x * 255 / 99) as u8;
            Rgb([brightness, brightness, brightness])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn create_right_to_left_gradient() -> DynamicImage {
        let img = ImageBuffer::from_fn(100, 100, |x, _| {
            let brightness = ((99 - x) * 255 / 99) as u8;
            Rgb([brightness, brightness, brightness])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn identical_images_produce_identical_hash() {
        let hasher = DifferenceHasher::new();
        let image = create_solid_image(128, 128, 128);

        let hash1 = hasher.hash_image(&image).unwrap();
        let hash2 = hasher.hash_image(&image).unwrap();

        assert_eq!(hash1, hash2);
    }

    #[test]
    fn opposite_gradients_produce_opposite_hash() {
        let hasher = DifferenceHasher::new();

        let image1 = create_left_to_right_gradient();
        let image2 = create_right_to_left_gradient();

        let hash1 = hasher.hash_image(&image1).unwrap();
        let hash2 = hasher.hash_image(&image2).unwrap();

        // Every comparison flips, so every one of the 64 bits differs.
        assert_eq!((hash1 ^ hash2).count_ones(), 64);
    }

    #[test]
    fn kind_returns_difference() {
        let hasher = DifferenceHasher::new();
        assert_eq!(hasher.kind(), HashAlgorithmKind::Difference);
    }
}
