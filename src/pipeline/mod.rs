/// Colorization pipeline
///
/// Turns a grayscale or color photograph into a colorized one:
/// - decode and convert to L*a*b* (color.rs)
/// - shrink lightness to the model grid (resample.rs)
/// - predict chrominance (model.rs)
/// - grow chrominance back, recombine with the original lightness, encode

pub mod model;
pub mod resample;

use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::{s, Array3, Axis};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

use crate::color;
pub use model::{load_model, ChromaModel, ModelError, MODEL_SIZE};

#[derive(Debug, Error)]
pub enum ColorizeError {
    #[error("colorization failed: cannot decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("colorization failed: image has no pixels")]
    EmptyImage,

    #[error("colorization failed: {0}")]
    Model(#[from] ModelError),

    #[error("colorization failed: model returned shape {actual:?}, expected {expected:?}")]
    Shape {
        expected: [usize; 4],
        actual: Vec<usize>,
    },

    #[error("colorization failed: cannot write {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// An inference session: one loaded model plus the pipeline around it.
///
/// Created once at startup and handed to whoever runs colorization; it is
/// never stored in a global.
pub struct Colorizer {
    model: Box<dyn ChromaModel>,
}

impl Colorizer {
    pub fn new(model: Box<dyn ChromaModel>) -> Self {
        Colorizer { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Colorize the image at `input` and write the result to `output`.
    ///
    /// The output format follows the extension of `output`. The input file
    /// is never modified.
    pub fn colorize(&mut self, input: &Path, output: &Path) -> Result<PathBuf, ColorizeError> {
        let t0 = Instant::now();

        let img = image::open(input).map_err(|source| ColorizeError::Decode {
            path: input.to_path_buf(),
            source,
        })?;

        let colorized = self.colorize_image(&img)?;

        colorized.save(output).map_err(|source| ColorizeError::Encode {
            path: output.to_path_buf(),
            source,
        })?;

        tracing::info!(
            "🎨 Colorized {} ({}x{}) in {}ms",
            input.display(),
            img.width(),
            img.height(),
            t0.elapsed().as_millis()
        );

        Ok(output.to_path_buf())
    }

    /// Colorize an in-memory image. The result has the input's dimensions.
    pub fn colorize_image(&mut self, img: &DynamicImage) -> Result<RgbImage, ColorizeError> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(ColorizeError::EmptyImage);
        }
        let (height, width) = (height as usize, width as usize);

        // Grayscale is replicated into three identical channels here
        let rgb = img.to_rgb32f();
        let lab = color::rgb_image_to_lab(&rgb);
        let lightness = lab.index_axis(Axis(0), 0);

        let input = resample::resize(lightness, MODEL_SIZE, MODEL_SIZE)
            .insert_axis(Axis(0))
            .insert_axis(Axis(0));

        let predicted = self.model.predict(input)?;

        let expected = [1, 2, MODEL_SIZE, MODEL_SIZE];
        if predicted.shape() != &expected[..] {
            return Err(ColorizeError::Shape {
                expected,
                actual: predicted.shape().to_vec(),
            });
        }

        let mut out = Array3::zeros((3, height, width));
        out.index_axis_mut(Axis(0), 0).assign(&lightness);
        for channel in 0..2 {
            let ab = resample::resize(predicted.slice(s![0, channel, .., ..]), height, width);
            out.index_axis_mut(Axis(0), channel + 1).assign(&ab);
        }

        Ok(color::lab_to_rgb_image(out.view()))
    }
}

impl std::fmt::Debug for Colorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Colorizer")
            .field("model", &self.model.name())
            .finish()
    }
}
