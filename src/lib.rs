//! Student Outcome Pipeline Library
//!
//! Batch dropout/graduate prediction over tabular uploads: schema
//! validation, value coercion, classifier inference and label summaries.

pub mod batch;
pub mod config;
pub mod error;
pub mod io;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod summary;
pub mod types;
pub mod validation;

pub use config::AppConfig;
pub use error::{PipelineError, PipelineResult, SchemaMismatch};
pub use metrics::PipelineMetrics;
pub use models::{Classifier, InferenceEngine, ModelLoader};
pub use pipeline::{PipelineOutput, PredictionPipeline};
pub use schema::{FeatureSchema, SchemaRegistry, STUDENT_FEATURES};
pub use summary::{summarize, Summary};
pub use types::{BatchReport, FeatureMatrix, Outcome, PredictionResult, RawTable, ResultTable};
pub use validation::ColumnPolicy;
