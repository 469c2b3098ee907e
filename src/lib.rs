//! PDQ perceptual image hashing.
//!
//! Produces a 256-bit fingerprint and a quality score from a decoded image,
//! such that visually similar images land within a small Hamming distance of
//! each other. The eight dihedral variants (rotations, flips, transposes)
//! are derived from one shared DCT intermediate instead of re-hashing
//! transformed pixels.

pub use image;

pub mod hash256;
pub mod imgproc;
pub mod pdqhash;
pub mod torben;

pub use hash256::{Hash256, HashParseError};
pub use imgproc::{ImageLoadError, PdqImage};
pub use pdqhash::{DihedralHashes, HashAndQuality, PdqHasher};
