/// Chroma prediction models
///
/// The colorization network is an external, pretrained artifact. The
/// pipeline only relies on its numeric contract:
///
/// - input: lightness tensor of shape `[1, 1, 256, 256]`, L in [0, 100]
/// - output: chrominance tensor of shape `[1, 2, 256, 256]`, unnormalized
///   a/b values (roughly [-110, 110])
///
/// Any normalization the network needs internally is part of the exported
/// graph, not of this crate.

use ndarray::Array4;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Side length of the square grid the network was trained on
pub const MODEL_SIZE: usize = 256;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to load model from {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("model file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot load {}: built without the `onnx` feature", .0.display())]
    Unsupported(PathBuf),
}

/// A loaded, ready-to-run chroma prediction network.
///
/// Implementations may keep mutable scratch state, so every worker owns
/// its own instance.
pub trait ChromaModel: Send {
    fn name(&self) -> &str;

    /// Predict a/b chrominance for a `[1, 1, 256, 256]` lightness tensor.
    fn predict(&mut self, lightness: Array4<f32>) -> Result<Array4<f32>, ModelError>;
}

/// Load the pretrained network stored at `path`.
pub fn load_model(path: &Path) -> Result<Box<dyn ChromaModel>, ModelError> {
    if !path.exists() {
        return Err(ModelError::NotFound(path.to_path_buf()));
    }

    #[cfg(feature = "onnx")]
    {
        let model = onnx::OnnxModel::load(path)?;
        Ok(Box::new(model))
    }

    #[cfg(not(feature = "onnx"))]
    {
        Err(ModelError::Unsupported(path.to_path_buf()))
    }
}

#[cfg(feature = "onnx")]
pub mod onnx {
    use super::{ChromaModel, ModelError};
    use ndarray::{Array4, Ix4};
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Tensor;
    use std::path::Path;
    use std::time::Instant;

    /// ONNX Runtime session wrapping an exported colorization network.
    pub struct OnnxModel {
        session: Session,
        name: String,
    }

    impl OnnxModel {
        pub fn load(path: &Path) -> Result<Self, ModelError> {
            let load_error = |e: ort::Error| ModelError::Load {
                path: path.to_path_buf(),
                message: e.to_string(),
            };

            let t0 = Instant::now();
            let session = Session::builder()
                .map_err(load_error)?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(load_error)?
                .commit_from_file(path)
                .map_err(load_error)?;

            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "onnx".to_string());

            tracing::info!(
                "🎨 Loaded model {} in {:.1}s",
                name,
                t0.elapsed().as_secs_f64()
            );

            Ok(OnnxModel { session, name })
        }
    }

    impl ChromaModel for OnnxModel {
        fn name(&self) -> &str {
            &self.name
        }

        fn predict(&mut self, lightness: Array4<f32>) -> Result<Array4<f32>, ModelError> {
            let input = Tensor::from_array(lightness)
                .map_err(|e| ModelError::Inference(e.to_string()))?;

            let outputs = self
                .session
                .run(ort::inputs![input])
                .map_err(|e| ModelError::Inference(e.to_string()))?;

            let ab = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| ModelError::Inference(e.to_string()))?;

            ab.into_dimensionality::<Ix4>()
                .map(|view| view.to_owned())
                .map_err(|e| ModelError::Inference(format!("unexpected output rank: {}", e)))
        }
    }
}
