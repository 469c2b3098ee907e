//! Compute the 256-bit PDQ hash of an image, with optional dihedral
//! variants derived from the shared 16x16 DCT intermediate.

use std::f64::consts::PI;
use std::path::Path;

use crate::hash256::Hash256;
use crate::imgproc::{ImageLoadError, PdqImage};
use crate::torben::torben;

// From Wikipedia: standard RGB to luminance (the 'Y' in 'YUV').
const LUMA_FROM_R_COEFF: f64 = 0.299;
const LUMA_FROM_G_COEFF: f64 = 0.587;
const LUMA_FROM_B_COEFF: f64 = 0.114;

// Wojciech Jarosz 'Fast Image Convolutions' ACM SIGGRAPH 2001:
// X,Y,X,Y passes of 1-D box filters produce a 2D tent filter.
const NUM_JAROSZ_XY_PASSES: usize = 2;

// Each 1/64th of the image dimension becomes one downsample pixel; with two
// passes, each 1-D window covers half such a block.
const JAROSZ_WINDOW_SIZE_DIVISOR: usize = 128;

const BUFFER_W_H: usize = 64;
const DCT_OUTPUT_W_H: usize = 16;

// Flags for which dihedral transforms are desired to be produced.
pub const DIH_ORIGINAL: u32 = 0x01;
pub const DIH_ROTATE_90: u32 = 0x02;
pub const DIH_ROTATE_180: u32 = 0x04;
pub const DIH_ROTATE_270: u32 = 0x08;
pub const DIH_FLIPX: u32 = 0x10;
pub const DIH_FLIPY: u32 = 0x20;
pub const DIH_FLIP_PLUS1: u32 = 0x40;
pub const DIH_FLIP_MINUS1: u32 = 0x80;
pub const DIH_ALL: u32 = 0xFF;

/// The only state is the DCT matrix, so a hasher may be built once per image
/// or shared across all of them; sharing skips recomputing the matrix and is
/// safe because nothing is written after construction.
pub struct PdqHasher {
    dct_matrix: [[f64; BUFFER_W_H]; DCT_OUTPUT_W_H],
}

/// A hash plus the image-domain quality score in 0..=100. Low quality marks
/// flat images whose hashes discriminate poorly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashAndQuality {
    pub hash: Hash256,
    pub quality: i32,
}

/// Hashes of the dihedral variants requested via the `DIH_*` flags; entries
/// whose flag was not set stay `None`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DihedralHashes {
    pub hash: Option<Hash256>,
    pub rotate_90: Option<Hash256>,
    pub rotate_180: Option<Hash256>,
    pub rotate_270: Option<Hash256>,
    pub flip_x: Option<Hash256>,
    pub flip_y: Option<Hash256>,
    pub flip_plus_1: Option<Hash256>,
    pub flip_minus_1: Option<Hash256>,
    pub quality: i32,
}

/// Per-call scratch space. The row and column box passes ping-pong between
/// the two linear buffers, which must not alias; after the final column pass
/// the smoothed plane is back in `buffer1`.
struct Workspace {
    buffer1: Vec<f64>,
    buffer2: Vec<f64>,
    buffer_64x64: [[f64; BUFFER_W_H]; BUFFER_W_H],
    buffer_16x64: [[f64; BUFFER_W_H]; DCT_OUTPUT_W_H],
    buffer_16x16: [[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
    buffer_16x16_aux: [[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
}

impl Workspace {
    fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            buffer1: vec![0.0; num_rows * num_cols],
            buffer2: vec![0.0; num_rows * num_cols],
            buffer_64x64: [[0.0; BUFFER_W_H]; BUFFER_W_H],
            buffer_16x64: [[0.0; BUFFER_W_H]; DCT_OUTPUT_W_H],
            buffer_16x16: [[0.0; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
            buffer_16x16_aux: [[0.0; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
        }
    }
}

impl PdqHasher {
    pub fn new() -> Self {
        Self { dct_matrix: compute_dct_matrix() }
    }

    pub fn hash_file(&self, path: impl AsRef<Path>) -> Result<HashAndQuality, ImageLoadError> {
        Ok(self.hash_image(&PdqImage::open(path.as_ref())?))
    }

    pub fn hash_bytes(&self, bytes: &[u8]) -> Result<HashAndQuality, ImageLoadError> {
        Ok(self.hash_image(&PdqImage::from_bytes(bytes)?))
    }

    pub fn hash_image(&self, image: &PdqImage) -> HashAndQuality {
        let num_rows = image.height();
        let num_cols = image.width();
        let mut ws = Workspace::new(num_rows, num_cols);

        fill_float_luma(image, &mut ws.buffer1);
        self.run_shared_pipeline(&mut ws, num_rows, num_cols);

        let quality = image_domain_quality_metric(&ws.buffer_64x64);
        let hash = buffer_16x16_to_bits(&ws.buffer_16x16);
        HashAndQuality { hash, quality }
    }

    pub fn dihedral_from_file(
        &self,
        path: impl AsRef<Path>,
        dihedral_flags: u32,
    ) -> Result<DihedralHashes, ImageLoadError> {
        Ok(self.dihedral_from_image(&PdqImage::open(path.as_ref())?, dihedral_flags))
    }

    pub fn dihedral_from_bytes(
        &self,
        bytes: &[u8],
        dihedral_flags: u32,
    ) -> Result<DihedralHashes, ImageLoadError> {
        Ok(self.dihedral_from_image(&PdqImage::from_bytes(bytes)?, dihedral_flags))
    }

    /// Same prelude as [`hash_image`](Self::hash_image) up through the
    /// partial DCT, then each requested variant is permuted out of the
    /// shared 16x16 into the auxiliary buffer and binarized.
    pub fn dihedral_from_image(&self, image: &PdqImage, dihedral_flags: u32) -> DihedralHashes {
        let num_rows = image.height();
        let num_cols = image.width();
        let mut ws = Workspace::new(num_rows, num_cols);

        fill_float_luma(image, &mut ws.buffer1);
        self.run_shared_pipeline(&mut ws, num_rows, num_cols);

        let mut out = DihedralHashes {
            quality: image_domain_quality_metric(&ws.buffer_64x64),
            ..Default::default()
        };

        if dihedral_flags & DIH_ORIGINAL != 0 {
            out.hash = Some(buffer_16x16_to_bits(&ws.buffer_16x16));
        }
        if dihedral_flags & DIH_ROTATE_90 != 0 {
            dct16_to_rotate_90(&ws.buffer_16x16, &mut ws.buffer_16x16_aux);
            out.rotate_90 = Some(buffer_16x16_to_bits(&ws.buffer_16x16_aux));
        }
        if dihedral_flags & DIH_ROTATE_180 != 0 {
            dct16_to_rotate_180(&ws.buffer_16x16, &mut ws.buffer_16x16_aux);
            out.rotate_180 = Some(buffer_16x16_to_bits(&ws.buffer_16x16_aux));
        }
        if dihedral_flags & DIH_ROTATE_270 != 0 {
            dct16_to_rotate_270(&ws.buffer_16x16, &mut ws.buffer_16x16_aux);
            out.rotate_270 = Some(buffer_16x16_to_bits(&ws.buffer_16x16_aux));
        }
        if dihedral_flags & DIH_FLIPX != 0 {
            dct16_to_flip_x(&ws.buffer_16x16, &mut ws.buffer_16x16_aux);
            out.flip_x = Some(buffer_16x16_to_bits(&ws.buffer_16x16_aux));
        }
        if dihedral_flags & DIH_FLIPY != 0 {
            dct16_to_flip_y(&ws.buffer_16x16, &mut ws.buffer_16x16_aux);
            out.flip_y = Some(buffer_16x16_to_bits(&ws.buffer_16x16_aux));
        }
        if dihedral_flags & DIH_FLIP_PLUS1 != 0 {
            dct16_to_flip_plus_1(&ws.buffer_16x16, &mut ws.buffer_16x16_aux);
            out.flip_plus_1 = Some(buffer_16x16_to_bits(&ws.buffer_16x16_aux));
        }
        if dihedral_flags & DIH_FLIP_MINUS1 != 0 {
            dct16_to_flip_minus_1(&ws.buffer_16x16, &mut ws.buffer_16x16_aux);
            out.flip_minus_1 = Some(buffer_16x16_to_bits(&ws.buffer_16x16_aux));
        }
        out
    }

    /// Runs the luma plane in `buffer1` through smoothing, decimation and
    /// the partial DCT; leaves the decimated plane in `buffer_64x64` and the
    /// DCT output in `buffer_16x16`.
    fn run_shared_pipeline(&self, ws: &mut Workspace, num_rows: usize, num_cols: usize) {
        let window_size_along_rows = jarosz_window_size(num_cols);
        let window_size_along_cols = jarosz_window_size(num_rows);
        jarosz_filter_float(
            &mut ws.buffer1,
            &mut ws.buffer2,
            num_rows,
            num_cols,
            window_size_along_rows,
            window_size_along_cols,
            NUM_JAROSZ_XY_PASSES,
        );
        decimate_float(&ws.buffer1, num_rows, num_cols, &mut ws.buffer_64x64);
        self.dct_64_to_16(&ws.buffer_64x64, &mut ws.buffer_16x64, &mut ws.buffer_16x16);
    }

    /// Top-left 16x16 block of the 2-D DCT via two matrix multiplications.
    /// Deliberately the naive form: at these sizes, fast-DCT-plus-extraction
    /// measures slower than computing only the slots needed.
    fn dct_64_to_16(
        &self,
        a: &[[f64; BUFFER_W_H]; BUFFER_W_H],
        t: &mut [[f64; BUFFER_W_H]; DCT_OUTPUT_W_H],
        b: &mut [[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
    ) {
        debug_assert!(a.iter().flatten().all(|v| v.is_finite()));

        let d = &self.dct_matrix;
        for i in 0..DCT_OUTPUT_W_H {
            for j in 0..BUFFER_W_H {
                let mut tij = 0.0;
                for k in 0..BUFFER_W_H {
                    tij += d[i][k] * a[k][j];
                }
                t[i][j] = tij;
            }
        }
        for i in 0..DCT_OUTPUT_W_H {
            for j in 0..DCT_OUTPUT_W_H {
                let mut sumk = 0.0;
                for k in 0..BUFFER_W_H {
                    sumk += t[i][k] * d[j][k];
                }
                b[i][j] = sumk;
            }
        }
    }
}

impl Default for PdqHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// The 16 lowest AC rows of the 64-point DCT-II basis. The frequency index
/// is 1-based (the `i + 1`); the dihedral parity rules below depend on that.
fn compute_dct_matrix() -> [[f64; BUFFER_W_H]; DCT_OUTPUT_W_H] {
    let scale = (2.0 / BUFFER_W_H as f64).sqrt();
    let mut d = [[0.0; BUFFER_W_H]; DCT_OUTPUT_W_H];
    for (i, row) in d.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = scale
                * ((PI / 2.0 / BUFFER_W_H as f64) * (i as f64 + 1.0) * (2.0 * j as f64 + 1.0))
                    .cos();
        }
    }
    d
}

fn fill_float_luma(image: &PdqImage, luma: &mut [f64]) {
    let num_rows = image.height();
    let num_cols = image.width();
    for i in 0..num_rows {
        for j in 0..num_cols {
            let [r, g, b] = image.rgb(j as u32, i as u32);
            luma[i * num_cols + j] = LUMA_FROM_R_COEFF * r as f64
                + LUMA_FROM_G_COEFF * g as f64
                + LUMA_FROM_B_COEFF * b as f64;
        }
    }
}

/// Round up, never below one sample.
fn jarosz_window_size(dimension: usize) -> usize {
    dimension.div_ceil(JAROSZ_WINDOW_SIZE_DIVISOR).max(1)
}

fn jarosz_filter_float(
    buffer1: &mut [f64],
    buffer2: &mut [f64],
    num_rows: usize,
    num_cols: usize,
    window_size_along_rows: usize,
    window_size_along_cols: usize,
    nreps: usize,
) {
    for _ in 0..nreps {
        box_along_rows_float(buffer1, buffer2, num_rows, num_cols, window_size_along_rows);
        box_along_cols_float(buffer2, buffer1, num_rows, num_cols, window_size_along_cols);
    }
}

/// One strided 1-D box-average pass. The window ramps up over the leading
/// edge, runs at full size, then ramps down over the trailing edge, so
/// exactly `vector_length` outputs are written.
#[inline(always)]
fn box_1d_float(
    invec: &[f64],
    in_start: usize,
    outvec: &mut [f64],
    out_start: usize,
    vector_length: usize,
    stride: usize,
    full_window_size: usize,
) {
    let half_window_size = (full_window_size + 2) / 2;
    let phase_1_nreps = half_window_size - 1;
    let phase_2_nreps = full_window_size - half_window_size + 1;
    let phase_3_nreps = vector_length - full_window_size;
    let phase_4_nreps = half_window_size - 1;

    let mut li = 0; // Index of left edge of read window, for subtracts
    let mut ri = 0; // Index of right edge of read window, for adds
    let mut oi = 0; // Index of output vector
    let mut sum = 0.0;
    let mut current_window_size = 0usize;

    // PHASE 1: ACCUMULATE FIRST SUM NO WRITES
    for _ in 0..phase_1_nreps {
        sum += invec[in_start + ri];
        current_window_size += 1;
        ri += stride;
    }

    // PHASE 2: INITIAL WRITES WITH SMALL WINDOW
    for _ in 0..phase_2_nreps {
        sum += invec[in_start + ri];
        current_window_size += 1;
        outvec[out_start + oi] = sum / current_window_size as f64;
        ri += stride;
        oi += stride;
    }

    // PHASE 3: WRITES WITH FULL WINDOW
    for _ in 0..phase_3_nreps {
        sum += invec[in_start + ri];
        sum -= invec[in_start + li];
        outvec[out_start + oi] = sum / current_window_size as f64;
        li += stride;
        ri += stride;
        oi += stride;
    }

    // PHASE 4: FINAL WRITES WITH SMALL WINDOW
    for _ in 0..phase_4_nreps {
        sum -= invec[in_start + li];
        current_window_size -= 1;
        outvec[out_start + oi] = sum / current_window_size as f64;
        li += stride;
        oi += stride;
    }
}

/// Input and output are numRows x numCols in row-major order.
fn box_along_rows_float(
    input: &[f64],
    output: &mut [f64],
    num_rows: usize,
    num_cols: usize,
    window_size: usize,
) {
    for i in 0..num_rows {
        box_1d_float(input, i * num_cols, output, i * num_cols, num_cols, 1, window_size);
    }
}

fn box_along_cols_float(
    input: &[f64],
    output: &mut [f64],
    num_rows: usize,
    num_cols: usize,
    window_size: usize,
) {
    for j in 0..num_cols {
        box_1d_float(input, j, output, j, num_rows, num_cols, window_size);
    }
}

/// Nearest-sample subsampling centered on output pixels; no interpolation.
fn decimate_float(
    input: &[f64],
    in_num_rows: usize,
    in_num_cols: usize,
    out: &mut [[f64; BUFFER_W_H]; BUFFER_W_H],
) {
    for i in 0..BUFFER_W_H {
        let ini = (((i as f64 + 0.5) * in_num_rows as f64) / 64.0) as usize;
        for j in 0..BUFFER_W_H {
            let inj = (((j as f64 + 0.5) * in_num_cols as f64) / 64.0) as usize;
            out[i][j] = input[ini * in_num_cols + inj];
        }
    }
}

/// Gradient-sum heuristic over the decimated plane. Each term is quantized
/// to an integer first so only significant gradients count.
fn image_domain_quality_metric(buffer_64x64: &[[f64; BUFFER_W_H]; BUFFER_W_H]) -> i32 {
    let mut gradient_sum: i64 = 0;
    for i in 0..BUFFER_W_H - 1 {
        for j in 0..BUFFER_W_H {
            let u = buffer_64x64[i][j];
            let v = buffer_64x64[i + 1][j];
            let d = ((u - v) * 100.0 / 255.0) as i64;
            gradient_sum += d.abs();
        }
    }
    for i in 0..BUFFER_W_H {
        for j in 0..BUFFER_W_H - 1 {
            let u = buffer_64x64[i][j];
            let v = buffer_64x64[i][j + 1];
            let d = ((u - v) * 100.0 / 255.0) as i64;
            gradient_sum += d.abs();
        }
    }
    let quality = gradient_sum as f64 / 90.0;
    if quality > 100.0 { 100 } else { quality as i32 }
}

/*
   Sign/transpose patterns of the eight variants over the 16x16 DCT output,
   shown on a 4x4 corner:

   orig      rot90     rot180    rot270
   noxpose   xpose     noxpose   xpose
   + + + +   - + - +   + - + -   - - - -
   + + + +   - + - +   - + - +   + + + +
   + + + +   - + - +   + - + -   - - - -
   + + + +   - + - +   - + - +   + + + +

   flipx     flipy     flipplus  flipminus
   noxpose   noxpose   xpose     xpose
   - - - -   - + - +   + + + +   + - + -
   + + + +   - + - +   + + + +   - + - +
   - - - -   - + - +   + + + +   + - + -
   + + + +   - + - +   + + + +   - + - +
*/

fn dct16_to_rotate_90(
    a: &[[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
    b: &mut [[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
) {
    for i in 0..DCT_OUTPUT_W_H {
        for j in 0..DCT_OUTPUT_W_H {
            b[j][i] = if j & 1 != 0 { a[i][j] } else { -a[i][j] };
        }
    }
}

fn dct16_to_rotate_180(
    a: &[[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
    b: &mut [[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
) {
    for i in 0..DCT_OUTPUT_W_H {
        for j in 0..DCT_OUTPUT_W_H {
            b[i][j] = if (i + j) & 1 != 0 { -a[i][j] } else { a[i][j] };
        }
    }
}

fn dct16_to_rotate_270(
    a: &[[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
    b: &mut [[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
) {
    for i in 0..DCT_OUTPUT_W_H {
        for j in 0..DCT_OUTPUT_W_H {
            b[j][i] = if i & 1 != 0 { a[i][j] } else { -a[i][j] };
        }
    }
}

fn dct16_to_flip_x(
    a: &[[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
    b: &mut [[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
) {
    for i in 0..DCT_OUTPUT_W_H {
        for j in 0..DCT_OUTPUT_W_H {
            b[i][j] = if i & 1 != 0 { a[i][j] } else { -a[i][j] };
        }
    }
}

fn dct16_to_flip_y(
    a: &[[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
    b: &mut [[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
) {
    for i in 0..DCT_OUTPUT_W_H {
        for j in 0..DCT_OUTPUT_W_H {
            b[i][j] = if j & 1 != 0 { a[i][j] } else { -a[i][j] };
        }
    }
}

fn dct16_to_flip_plus_1(
    a: &[[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
    b: &mut [[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
) {
    for i in 0..DCT_OUTPUT_W_H {
        for j in 0..DCT_OUTPUT_W_H {
            b[j][i] = a[i][j];
        }
    }
}

fn dct16_to_flip_minus_1(
    a: &[[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
    b: &mut [[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H],
) {
    for i in 0..DCT_OUTPUT_W_H {
        for j in 0..DCT_OUTPUT_W_H {
            b[j][i] = if (i + j) & 1 != 0 { -a[i][j] } else { a[i][j] };
        }
    }
}

/// Each output bit records whether the corresponding frequency component
/// exceeds the median component; ties stay zero.
fn buffer_16x16_to_bits(dct_output_16x16: &[[f64; DCT_OUTPUT_W_H]; DCT_OUTPUT_W_H]) -> Hash256 {
    let dct_median = torben(dct_output_16x16);
    let mut hash = Hash256::new();
    for i in 0..DCT_OUTPUT_W_H {
        for j in 0..DCT_OUTPUT_W_H {
            if dct_output_16x16[i][j] > dct_median {
                hash.set_bit(i * DCT_OUTPUT_W_H + j);
            }
        }
    }
    hash
}
