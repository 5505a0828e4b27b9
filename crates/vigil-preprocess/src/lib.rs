//! vigil-preprocess – stretch-resize + normalize RGBA frames into a planar tensor.

use log::debug;
use ndarray::{Array4, ArrayView4, ShapeError};
use resize::{new, Pixel, Type};
use rgb::FromSlice;
use thiserror::Error;
use vigil_frame::{Frame, FrameError};

/// Number of colour planes written to the tensor (alpha is dropped).
pub const PLANES: usize = 3;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Malformed frame: {0}")]
    Frame(#[from] FrameError),
    #[error("Resize failed: {0}")]
    Resize(#[from] resize::Error),
    #[error("Tensor buffer has {actual} values, expected {expected}")]
    TensorLength { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, PreprocessError>;

/// Model-ready input: `3 × size × size` floats in CHW order, values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    size: usize,
    data: Vec<f32>,
}

impl Tensor {
    /// Wrap an existing planar buffer; the length must be `3 * size * size`.
    pub fn from_planar(size: usize, data: Vec<f32>) -> Result<Self> {
        let expected = PLANES * size * size;
        if data.len() != expected {
            return Err(PreprocessError::TensorLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { size, data })
    }

    /// Spatial edge length (the tensor is square).
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// One colour plane (0 = R, 1 = G, 2 = B), row-major.
    pub fn plane(&self, channel: usize) -> &[f32] {
        let n = self.size * self.size;
        &self.data[channel * n..(channel + 1) * n]
    }

    /// Borrow as `[1, 3, size, size]`.
    pub fn view(&self) -> std::result::Result<ArrayView4<'_, f32>, ShapeError> {
        ArrayView4::from_shape((1, PLANES, self.size, self.size), &self.data)
    }

    /// Consume into an owned `[1, 3, size, size]` array for the runtime.
    pub fn into_array(self) -> std::result::Result<Array4<f32>, ShapeError> {
        Array4::from_shape_vec((1, PLANES, self.size, self.size), self.data)
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    size: u32,
}

impl Preprocessor {
    /// Create a pre‑processor that outputs size×size planar RGB (0‑1.0f32).
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Validate, stretch‑resize and normalize one frame.
    pub fn run(&self, frame: &Frame) -> Result<Tensor> {
        // 1. reject zero sized / wrong length buffers up front
        frame.validate()?;

        let (w, h) = (frame.width() as usize, frame.height() as usize);
        let dst = self.size as usize;

        // 2. stretch to dst×dst (no letterbox); skip when already there
        let resized;
        let rgba: &[u8] = if w == dst && h == dst {
            frame.pixels()
        } else {
            let mut out = vec![0u8; dst * dst * 4];
            let mut resizer = new(w, h, dst, dst, Pixel::RGBA8, Type::Triangle)?;
            resizer.resize(frame.pixels().as_rgba(), out.as_rgba_mut())?;
            resized = out;
            &resized
        };

        // 3. interleaved RGBA → planar RGB, /255
        let tensor = Tensor {
            size: dst,
            data: to_planar(rgba, dst * dst),
        };
        debug!("frame {} preprocessed {}x{} → {}x{}", frame.id(), w, h, dst, dst);
        Ok(tensor)
    }
}

/// Split `pixels` RGBA8 pixels into three normalized planes, dropping alpha.
fn to_planar(rgba: &[u8], pixels: usize) -> Vec<f32> {
    let mut data = vec![0f32; PLANES * pixels];
    let (r_plane, gb) = data.split_at_mut(pixels);
    let (g_plane, b_plane) = gb.split_at_mut(pixels);
    for (i, px) in rgba.chunks_exact(4).take(pixels).enumerate() {
        r_plane[i] = px[0] as f32 / 255.0;
        g_plane[i] = px[1] as f32 / 255.0;
        b_plane[i] = px[2] as f32 / 255.0;
    }
    data
}
