//! Classifier backends and batch inference

pub mod classifier;
pub mod inference;
pub mod linear;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use classifier::{Classifier, ModelError};
pub use inference::InferenceEngine;
pub use linear::LogisticClassifier;
pub use loader::{FeatureInfo, ModelLoader};
#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;
