//! Image preprocessing for inference.
//!
//! Decodes uploaded bytes (PNG/JPEG/BMP/GIF), converts to RGB, resizes to the
//! training resolution without preserving aspect ratio, and scales pixels
//! to [0, 1]. The result is a single-image batch in NHWC order.

use image::imageops::{self, FilterType};

use crate::error::{ServeError, ServeResult};

/// Side length of the square input the classifier was trained on.
pub const INPUT_SIZE: u32 = 160;

/// RGB.
pub const CHANNELS: usize = 3;

/// Flattened length of one preprocessed image.
pub const INPUT_LEN: usize = (INPUT_SIZE as usize) * (INPUT_SIZE as usize) * CHANNELS;

/// Bicubic, same as the serving-time resize used during model development.
pub const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// A batch of preprocessed images, `[batch, height, width, channels]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    shape: [usize; 4],
    data: Vec<f64>,
}

impl ImageTensor {
    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn batch_size(&self) -> usize {
        self.shape[0]
    }

    /// Row-major values for the sample at `index` (R, G, B per pixel).
    pub fn sample(&self, index: usize) -> Option<&[f64]> {
        let len = self.shape[1] * self.shape[2] * self.shape[3];
        let start = index.checked_mul(len)?;
        self.data.get(start..start + len)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// Runs the full preprocessing pipeline on raw upload bytes.
pub fn preprocess(bytes: &[u8]) -> ServeResult<ImageTensor> {
    if bytes.is_empty() {
        return Err(ServeError::Decode("uploaded file is empty".into()));
    }
    let img = image::load_from_memory(bytes)?;
    // Colour conversion first so grayscale / RGBA / 16-bit inputs resize as RGB8.
    let rgb = img.to_rgb8();
    let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, RESIZE_FILTER);

    let data: Vec<f64> = resized
        .pixels()
        .flat_map(|p| p.0.iter().map(|&c| c as f64 / 255.0))
        .collect();

    Ok(ImageTensor {
        shape: [1, INPUT_SIZE as usize, INPUT_SIZE as usize, CHANNELS],
        data,
    })
}
