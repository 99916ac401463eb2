#![cfg(feature = "opencv")]
use crate::extract::unpack_binary;
use crate::{BowErr, BowResult, DescriptorExtractor};
use opencv::{self, prelude::*};
use std::path::Path;

type CvImage = opencv::prelude::Mat;
type CvMat = opencv::core::Mat;

/// Bytes in one ORB descriptor.
pub const ORB_BYTES: usize = 32;

/// ORB keypoint descriptors, unpacked to one `±1` component per bit (256 per keypoint).
#[derive(Debug, Clone, Copy)]
pub struct OrbExtractor {
    /// Maximum number of keypoints kept per image.
    pub max_features: i32,
}

impl Default for OrbExtractor {
    fn default() -> Self {
        Self { max_features: 500 }
    }
}

impl OrbExtractor {
    /// Extract orb keypoint descriptors from an image.
    fn orb_from_cvimage(&self, cv_img: &CvImage) -> BowResult<Vec<f32>> {
        // Create detector
        let mut orb = opencv::features2d::ORB::default()?;
        orb.set_max_features(self.max_features)?;

        // Detect keypoints and compute descriptors
        let mut kps = opencv::types::VectorOfKeyPoint::new();
        let mut desc = CvMat::default()?;
        let mask = CvMat::default()?;
        orb.detect_and_compute(cv_img, &mask, &mut kps, &mut desc, false)?;

        // Copy data from CvMat into the descriptor buffer
        let mut out = Vec::with_capacity(kps.len() * ORB_BYTES * 8);
        let mut row = [0u8; ORB_BYTES];
        for i in 0..kps.len() {
            for (j, b) in row.iter_mut().enumerate() {
                *b = *desc
                    .at_2d::<u8>(i as i32, j as i32)
                    .map_err(|_| BowErr::OpenCvDecode)?;
            }
            unpack_binary(&row, &mut out);
        }
        Ok(out)
    }

    /// Use opencv to load an image as grayscale.
    fn load_img<P: AsRef<Path>>(path: P) -> BowResult<CvImage> {
        let path = path.as_ref();
        let name = path
            .to_str()
            .ok_or_else(|| BowErr::ImageRead(path.to_path_buf()))?;
        let img: CvImage = opencv::imgcodecs::imread(name, opencv::imgcodecs::IMREAD_GRAYSCALE)?;
        if img.empty()? {
            return Err(BowErr::ImageRead(path.to_path_buf()));
        }
        Ok(img)
    }
}

impl DescriptorExtractor for OrbExtractor {
    fn dim(&self) -> usize {
        ORB_BYTES * 8
    }

    fn extract(&self, path: &Path) -> BowResult<Vec<f32>> {
        let img = Self::load_img(path)?;
        self.orb_from_cvimage(&img)
    }
}
