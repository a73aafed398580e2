//! One-hot encoder for the categorical posting fields

use crate::error::TransformError;
use crate::sparse::SparseRow;
use crate::types::posting::CategoricalRecord;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Maps a categorical record to a fixed-width indicator row.
///
/// Values never seen during fitting must encode as an all-zero block for
/// their field rather than fail.
pub trait CategoricalEncoder: Send + Sync {
    fn transform(&self, record: &CategoricalRecord<'_>) -> Result<SparseRow, TransformError>;

    /// Number of indicator columns.
    fn width(&self) -> usize;

    /// Indicator names (`<field>_<category>`) in column order.
    fn feature_names(&self) -> Vec<String>;
}

#[derive(Debug, Deserialize)]
struct OneHotArtifact {
    feature_names_in: Vec<String>,
    categories: Vec<Vec<String>>,
    #[serde(default = "default_handle_unknown")]
    handle_unknown: String,
}

fn default_handle_unknown() -> String {
    "ignore".to_string()
}

/// One fitted field: its categories and where its block starts
#[derive(Debug)]
struct EncodedField {
    name: String,
    categories: Vec<String>,
    positions: HashMap<String, usize>,
    offset: usize,
}

/// Fitted one-hot encoder that ignores unknown categories
#[derive(Debug)]
pub struct OneHotEncoder {
    fields: Vec<EncodedField>,
    width: usize,
}

impl OneHotEncoder {
    /// Load the encoder from its JSON export.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read encoder from {:?}", path))?;
        Self::from_json(&raw).with_context(|| format!("Invalid encoder artifact {:?}", path))
    }

    /// Parse the encoder from its JSON export.
    pub fn from_json(raw: &str) -> Result<Self> {
        let artifact: OneHotArtifact = serde_json::from_str(raw)?;

        if artifact.handle_unknown != "ignore" {
            bail!(
                "encoder must ignore unknown categories, found handle_unknown = {:?}",
                artifact.handle_unknown
            );
        }
        if artifact.feature_names_in.len() != artifact.categories.len() {
            bail!(
                "{} input fields but {} category lists",
                artifact.feature_names_in.len(),
                artifact.categories.len()
            );
        }

        let mut fields = Vec::with_capacity(artifact.categories.len());
        let mut offset = 0;
        for (name, categories) in artifact
            .feature_names_in
            .into_iter()
            .zip(artifact.categories)
        {
            if categories.is_empty() {
                bail!("field '{}' has no categories", name);
            }
            let positions: HashMap<String, usize> = categories
                .iter()
                .enumerate()
                .map(|(i, c)| (c.clone(), i))
                .collect();
            if positions.len() != categories.len() {
                bail!("field '{}' lists a category twice", name);
            }
            let len = categories.len();
            fields.push(EncodedField {
                name,
                categories,
                positions,
                offset,
            });
            offset += len;
        }

        Ok(Self {
            fields,
            width: offset,
        })
    }

    /// Names of the input fields, in fit order.
    pub fn input_fields(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

impl CategoricalEncoder for OneHotEncoder {
    fn transform(&self, record: &CategoricalRecord<'_>) -> Result<SparseRow, TransformError> {
        let mut pairs = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = record
                .get(&field.name)
                .ok_or_else(|| TransformError::MissingField(field.name.clone()))?;
            // Unknown category: leave the field's block empty
            if let Some(&pos) = field.positions.get(value) {
                pairs.push((field.offset + pos, 1.0));
            }
        }
        Ok(SparseRow::from_pairs(self.width, pairs))
    }

    fn width(&self) -> usize {
        self.width
    }

    fn feature_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .flat_map(|f| {
                f.categories
                    .iter()
                    .map(move |c| format!("{}_{}", f.name, c))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobPostingRequest;
    use serde_json::json;

    fn encoder() -> OneHotEncoder {
        let raw = json!({
            "feature_names_in": ["employment_type", "required_experience", "required_education"],
            "categories": [
                ["Contract", "Full-time", "Unknown"],
                ["Entry level", "Unknown"],
                ["Bachelor's Degree", "High School or equivalent", "Unknown"]
            ],
            "handle_unknown": "ignore"
        });
        OneHotEncoder::from_json(&raw.to_string()).unwrap()
    }

    #[test]
    fn test_feature_names() {
        let enc = encoder();
        assert_eq!(enc.width(), 8);
        let names = enc.feature_names();
        assert_eq!(names[0], "employment_type_Contract");
        assert_eq!(names[3], "required_experience_Entry level");
        assert_eq!(names[7], "required_education_Unknown");
    }

    #[test]
    fn test_known_categories() {
        let enc = encoder();
        let mut req = JobPostingRequest::new("x");
        req.employment_type = "Full-time".into();
        req.required_education = "Bachelor's Degree".into();

        let row = enc.transform(&req.categorical_record()).unwrap();

        assert_eq!(row.width(), 8);
        assert_eq!(row.indices(), &[1, 4, 5]);
        assert!(row.values().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_unknown_category_is_zero_block() {
        let enc = encoder();
        let mut req = JobPostingRequest::new("x");
        req.employment_type = "Freelance".into();
        req.required_experience = "Director".into();
        req.required_education = "PhD".into();

        let row = enc.transform(&req.categorical_record()).unwrap();

        assert_eq!(row.width(), 8);
        assert_eq!(row.nnz(), 0);
    }

    #[test]
    fn test_field_missing_from_record() {
        let raw = json!({
            "feature_names_in": ["employment_type", "industry"],
            "categories": [["Contract"], ["Retail"]]
        });
        let enc = OneHotEncoder::from_json(&raw.to_string()).unwrap();
        let req = JobPostingRequest::new("x");

        let err = enc.transform(&req.categorical_record()).unwrap_err();
        assert_eq!(err, TransformError::MissingField("industry".into()));
    }

    #[test]
    fn test_rejects_error_on_unknown() {
        let raw = json!({
            "feature_names_in": ["employment_type"],
            "categories": [["Contract"]],
            "handle_unknown": "error"
        });
        assert!(OneHotEncoder::from_json(&raw.to_string()).is_err());
    }
}
