//! Feature schema registry.
//!
//! The classifier was fitted against an ordered list of 36 columns from the
//! student enrolment dataset. Column position is significant: feeding the
//! same values in another order silently changes the prediction.

use crate::models::Classifier;
use anyhow::Result;
use std::collections::HashSet;
use tracing::{info, warn};

/// Built-in feature list, in training order.
///
/// `Nacionality` keeps the dataset spelling because that is the name the
/// model was fitted with.
pub const STUDENT_FEATURES: [&str; 36] = [
    // Enrolment and background (21)
    "Marital status",
    "Application mode",
    "Application order",
    "Course",
    "Daytime/evening attendance",
    "Previous qualification",
    "Previous qualification (grade)",
    "Nacionality",
    "Mother's qualification",
    "Father's qualification",
    "Mother's occupation",
    "Father's occupation",
    "Admission grade",
    "Displaced",
    "Educational special needs",
    "Debtor",
    "Tuition fees up to date",
    "Gender",
    "Scholarship holder",
    "Age at enrollment",
    "International",
    // First semester (6)
    "Curricular units 1st sem (credited)",
    "Curricular units 1st sem (enrolled)",
    "Curricular units 1st sem (evaluations)",
    "Curricular units 1st sem (approved)",
    "Curricular units 1st sem (grade)",
    "Curricular units 1st sem (without evaluations)",
    // Second semester (6)
    "Curricular units 2nd sem (credited)",
    "Curricular units 2nd sem (enrolled)",
    "Curricular units 2nd sem (evaluations)",
    "Curricular units 2nd sem (approved)",
    "Curricular units 2nd sem (grade)",
    "Curricular units 2nd sem (without evaluations)",
    // Macroeconomic (3)
    "Unemployment rate",
    "Inflation rate",
    "GDP",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum SchemaKind {
    Named(Vec<String>),
    CountOnly(usize),
}

/// Ordered feature names the model expects, or just their count when the
/// model does not record names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    kind: SchemaKind,
}

/// Where the active schema came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaSource {
    /// Feature names recorded by the model at training time
    ModelNames,
    /// Model records a feature count only; validation is by count
    ModelCount,
    /// Model records nothing; built-in list
    Builtin,
}

impl FeatureSchema {
    /// Schema from an ordered list of names. Names must be unique and non-empty.
    pub fn named<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(|n| n.into().trim().to_string()).collect();

        if names.is_empty() {
            anyhow::bail!("feature schema must contain at least one feature");
        }
        if let Some(blank) = names.iter().position(|n| n.is_empty()) {
            anyhow::bail!("feature schema has an empty name at position {}", blank);
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                anyhow::bail!("feature schema lists '{}' more than once", name);
            }
        }

        Ok(Self {
            kind: SchemaKind::Named(names),
        })
    }

    /// Degraded schema that knows only how many columns to expect.
    pub fn count_only(count: usize) -> Self {
        Self {
            kind: SchemaKind::CountOnly(count),
        }
    }

    /// The built-in 36-column student schema.
    pub fn builtin() -> Self {
        Self {
            kind: SchemaKind::Named(STUDENT_FEATURES.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// Feature names in model order, `None` in count-only mode.
    pub fn names(&self) -> Option<&[String]> {
        match &self.kind {
            SchemaKind::Named(names) => Some(names),
            SchemaKind::CountOnly(_) => None,
        }
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        match &self.kind {
            SchemaKind::Named(names) => names.len(),
            SchemaKind::CountOnly(count) => *count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_count_only(&self) -> bool {
        matches!(self.kind, SchemaKind::CountOnly(_))
    }

    /// Position of a feature by name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names()?.iter().position(|n| n == name.trim())
    }

    /// Header row for template and demo tables.
    ///
    /// A count-only schema borrows the built-in names when the counts agree
    /// and otherwise falls back to positional placeholders.
    pub fn template_columns(&self) -> Vec<String> {
        match &self.kind {
            SchemaKind::Named(names) => names.clone(),
            SchemaKind::CountOnly(count) if *count == STUDENT_FEATURES.len() => {
                STUDENT_FEATURES.iter().map(|s| s.to_string()).collect()
            }
            SchemaKind::CountOnly(count) => (0..*count).map(|i| format!("feature_{}", i)).collect(),
        }
    }
}

/// Resolves the schema for a loaded model.
pub struct SchemaRegistry;

impl SchemaRegistry {
    /// Derive the schema from the model's training-time metadata.
    ///
    /// Names win over a bare count; a model exposing neither gets the
    /// built-in list.
    pub fn resolve(model: &dyn Classifier) -> Result<(FeatureSchema, SchemaSource)> {
        if let Some(names) = model.feature_names() {
            let schema = FeatureSchema::named(names.iter().cloned())?;

            if let Some(count) = model.feature_count() {
                if count != schema.len() {
                    anyhow::bail!(
                        "model '{}' records {} feature names but a feature count of {}",
                        model.name(),
                        schema.len(),
                        count
                    );
                }
            }

            if schema != FeatureSchema::builtin() {
                warn!(
                    model = %model.name(),
                    features = schema.len(),
                    "Model feature names differ from the built-in student schema; using the model's"
                );
            }

            info!(model = %model.name(), features = schema.len(), "Schema taken from model feature names");
            return Ok((schema, SchemaSource::ModelNames));
        }

        if let Some(count) = model.feature_count() {
            warn!(
                model = %model.name(),
                features = count,
                "Model exposes a feature count but no names; validating by column count only"
            );
            return Ok((FeatureSchema::count_only(count), SchemaSource::ModelCount));
        }

        info!(
            model = %model.name(),
            features = STUDENT_FEATURES.len(),
            "Model exposes no feature metadata; using built-in schema"
        );
        Ok((FeatureSchema::builtin(), SchemaSource::Builtin))
    }
}
