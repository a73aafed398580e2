//! Feature assembly for fake job posting model inference.
//!
//! Builds the combined row `[text | categorical | numeric]` the classifier
//! was trained on. Segment order here and in [`FeatureIndex`] must stay in
//! lockstep with training; a mismatch does not fail, it just scores garbage.

use crate::error::TransformError;
use crate::models::encoder::CategoricalEncoder;
use crate::models::vectorizer::TextVectorizer;
use crate::sparse::SparseRow;
use crate::types::posting::{JobPostingRequest, NUMERIC_FIELDS};

/// Turns a posting into the classifier's input row.
pub struct FeatureAssembler {
    vectorizer: Box<dyn TextVectorizer>,
    encoder: Box<dyn CategoricalEncoder>,
}

impl FeatureAssembler {
    pub fn new(vectorizer: Box<dyn TextVectorizer>, encoder: Box<dyn CategoricalEncoder>) -> Self {
        Self {
            vectorizer,
            encoder,
        }
    }

    /// Assemble the combined sparse row for one posting.
    pub fn assemble(&self, posting: &JobPostingRequest) -> Result<SparseRow, TransformError> {
        let text = self.vectorizer.transform(&posting.text)?;
        check_width("text", self.vectorizer.vocabulary_size(), &text)?;

        let categorical = self.encoder.transform(&posting.categorical_record())?;
        check_width("categorical", self.encoder.width(), &categorical)?;

        let numeric = SparseRow::from_dense(&posting.numeric_features()?);

        Ok(SparseRow::hstack(&[text, categorical, numeric]))
    }

    /// Width of every assembled row.
    pub fn width(&self) -> usize {
        self.vectorizer.vocabulary_size() + self.encoder.width() + NUMERIC_FIELDS.len()
    }

    /// Column names matching [`assemble`](Self::assemble)'s layout.
    pub fn feature_index(&self) -> FeatureIndex {
        let mut names = self.vectorizer.feature_names();
        names.extend(self.encoder.feature_names());
        names.extend(NUMERIC_FIELDS.iter().map(|s| s.to_string()));
        FeatureIndex { names }
    }
}

fn check_width(
    segment: &'static str,
    expected: usize,
    row: &SparseRow,
) -> Result<(), TransformError> {
    if row.width() != expected {
        return Err(TransformError::SegmentWidth {
            segment,
            expected,
            actual: row.width(),
        });
    }
    Ok(())
}

/// Human-readable name for each column of the assembled row
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureIndex {
    names: Vec<String>,
}

impl FeatureIndex {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, column: usize) -> Option<&str> {
        self.names.get(column).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl From<Vec<String>> for FeatureIndex {
    fn from(names: Vec<String>) -> Self {
        Self { names }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::encoder::OneHotEncoder;
    use crate::models::vectorizer::TfidfVectorizer;
    use serde_json::json;

    fn assembler() -> FeatureAssembler {
        let vectorizer = TfidfVectorizer::from_json(
            &json!({
                "vocabulary": {"home": 0, "interview": 1, "urgent": 2, "work": 3},
                "idf": [1.0, 1.0, 1.0, 1.0]
            })
            .to_string(),
        )
        .unwrap();
        let encoder = OneHotEncoder::from_json(
            &json!({
                "feature_names_in": ["employment_type", "required_experience", "required_education"],
                "categories": [["Contract", "Full-time"], ["Unknown"], ["Unknown"]]
            })
            .to_string(),
        )
        .unwrap();
        FeatureAssembler::new(Box::new(vectorizer), Box::new(encoder))
    }

    #[test]
    fn test_width_is_sum_of_segments() {
        let assembler = assembler();
        assert_eq!(assembler.width(), 4 + 4 + 3);

        let row = assembler
            .assemble(&JobPostingRequest::new("urgent work from home"))
            .unwrap();
        assert_eq!(row.width(), assembler.width());
    }

    #[test]
    fn test_segment_layout() {
        let assembler = assembler();
        let mut posting = JobPostingRequest::new("urgent interview");
        posting.employment_type = "Full-time".into();
        posting.telecommuting = 1;
        posting.has_questions = 1;

        let row = assembler.assemble(&posting).unwrap();

        // text: interview(1), urgent(2); categorical: Full-time(4+1), Unknown(4+2), Unknown(4+3);
        // numeric: telecommuting(8), has_questions(10)
        assert_eq!(row.indices(), &[1, 2, 5, 6, 7, 8, 10]);
    }

    #[test]
    fn test_unseen_categories_keep_width() {
        let assembler = assembler();
        let mut posting = JobPostingRequest::new("urgent");
        posting.employment_type = "Volunteer".into();
        posting.required_experience = "Executive".into();
        posting.required_education = "Doctorate".into();

        let row = assembler.assemble(&posting).unwrap();

        assert_eq!(row.width(), 11);
        assert_eq!(row.indices(), &[2]);
        assert!((4..8).all(|col| row.get(col) == 0.0));
    }

    #[test]
    fn test_invalid_flag_fails_assembly() {
        let assembler = assembler();
        let mut posting = JobPostingRequest::new("urgent");
        posting.has_questions = -1;
        assert!(matches!(
            assembler.assemble(&posting),
            Err(TransformError::InvalidFlag { field: "has_questions", .. })
        ));
    }

    #[test]
    fn test_feature_index_alignment() {
        let assembler = assembler();
        let index = assembler.feature_index();

        assert_eq!(index.len(), assembler.width());
        assert_eq!(index.name(0), Some("home"));
        assert_eq!(index.name(4), Some("employment_type_Contract"));
        assert_eq!(index.name(7), Some("required_education_Unknown"));
        assert_eq!(index.name(8), Some("telecommuting"));
        assert_eq!(index.name(10), Some("has_questions"));
        assert_eq!(index.name(11), None);
    }
}
