//! Job posting request as received from clients

use crate::error::TransformError;
use serde::{Deserialize, Serialize};

/// Categorical fields, in the order the encoder was fitted on.
pub const CATEGORICAL_FIELDS: [&str; 3] = [
    "employment_type",
    "required_experience",
    "required_education",
];

/// Numeric flag fields, in training column order.
pub const NUMERIC_FIELDS: [&str; 3] = ["telecommuting", "has_company_logo", "has_questions"];

/// Value used for categorical fields the client did not fill in.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

fn unknown() -> String {
    UNKNOWN_CATEGORY.to_string()
}

/// A job posting to be scored for fraud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPostingRequest {
    /// Free text of the posting (title, description, requirements...)
    pub text: String,

    /// e.g. "Full-time", "Contract"
    #[serde(default = "unknown")]
    pub employment_type: String,

    /// e.g. "Entry level", "Mid-Senior level"
    #[serde(default = "unknown")]
    pub required_experience: String,

    /// e.g. "Bachelor's Degree"
    #[serde(default = "unknown")]
    pub required_education: String,

    /// 1 if the posting advertises remote work
    #[serde(default)]
    pub telecommuting: i64,

    /// 1 if the posting carries a company logo
    #[serde(default)]
    pub has_company_logo: i64,

    /// 1 if the posting has screening questions
    #[serde(default)]
    pub has_questions: i64,
}

impl JobPostingRequest {
    /// Create a request with only text; every other field takes its default.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            employment_type: unknown(),
            required_experience: unknown(),
            required_education: unknown(),
            telecommuting: 0,
            has_company_logo: 0,
            has_questions: 0,
        }
    }

    /// Categorical values keyed by field name.
    pub fn categorical_record(&self) -> CategoricalRecord<'_> {
        CategoricalRecord {
            values: [
                (CATEGORICAL_FIELDS[0], self.employment_type.as_str()),
                (CATEGORICAL_FIELDS[1], self.required_experience.as_str()),
                (CATEGORICAL_FIELDS[2], self.required_education.as_str()),
            ],
        }
    }

    /// Numeric segment `[telecommuting, has_company_logo, has_questions]`.
    ///
    /// Fails if any flag is outside {0, 1}.
    pub fn numeric_features(&self) -> Result<[f32; 3], TransformError> {
        let flags = [self.telecommuting, self.has_company_logo, self.has_questions];
        let mut out = [0.0f32; 3];
        for (i, (&field, &value)) in NUMERIC_FIELDS.iter().zip(flags.iter()).enumerate() {
            if value != 0 && value != 1 {
                return Err(TransformError::InvalidFlag { field, value });
            }
            out[i] = value as f32;
        }
        Ok(out)
    }
}

/// Single-row categorical record handed to the encoder.
#[derive(Debug, Clone, Copy)]
pub struct CategoricalRecord<'a> {
    values: [(&'static str, &'a str); 3],
}

impl<'a> CategoricalRecord<'a> {
    /// Value for a field, if the record carries it.
    pub fn get(&self, field: &str) -> Option<&'a str> {
        self.values
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| *value)
    }
}

/// Explain request: a posting plus how many contributors to list per side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainRequest {
    #[serde(flatten)]
    pub posting: JobPostingRequest,

    #[serde(default)]
    pub top_n: Option<usize>,
}
