//! Term-weighted bag-of-terms text vectorizer.
//!
//! Reproduces the transform of a fitted TF-IDF vectorizer exported to JSON:
//! regex tokenisation, optional lowercasing and stop-word removal, word
//! n-grams, raw/binary/sublinear term frequency, idf weighting and row
//! normalisation. Column ids come from the exported vocabulary, so the
//! output lines up with the columns the classifier was trained on.

use crate::error::TransformError;
use crate::sparse::SparseRow;
use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Default token pattern: words of two or more word characters.
pub const DEFAULT_TOKEN_PATTERN: &str = r"(?u)\b\w\w+\b";

/// Maps raw text to a fixed-width sparse row.
pub trait TextVectorizer: Send + Sync {
    fn transform(&self, text: &str) -> Result<SparseRow, TransformError>;

    /// Number of output columns.
    fn vocabulary_size(&self) -> usize;

    /// Column names in column order.
    fn feature_names(&self) -> Vec<String>;
}

/// Row normalisation applied after weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

/// On-disk form of the vectorizer
#[derive(Debug, Deserialize)]
struct TfidfArtifact {
    vocabulary: HashMap<String, usize>,
    #[serde(default)]
    idf: Option<Vec<f64>>,
    #[serde(default = "default_true")]
    lowercase: bool,
    #[serde(default = "default_token_pattern")]
    token_pattern: String,
    #[serde(default = "default_ngram_range")]
    ngram_range: (usize, usize),
    #[serde(default)]
    stop_words: Option<Vec<String>>,
    #[serde(default)]
    binary: bool,
    #[serde(default)]
    sublinear_tf: bool,
    #[serde(default = "default_true")]
    use_idf: bool,
    #[serde(default = "default_norm")]
    norm: Option<Norm>,
}

fn default_true() -> bool {
    true
}

fn default_token_pattern() -> String {
    DEFAULT_TOKEN_PATTERN.to_string()
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_norm() -> Option<Norm> {
    Some(Norm::L2)
}

/// Fitted TF-IDF vectorizer
#[derive(Debug)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    /// Term for each column id
    terms: Vec<String>,
    idf: Option<Vec<f64>>,
    lowercase: bool,
    token_pattern: Regex,
    ngram_range: (usize, usize),
    stop_words: HashSet<String>,
    binary: bool,
    sublinear_tf: bool,
    norm: Option<Norm>,
}

impl TfidfVectorizer {
    /// Load the vectorizer from its JSON export.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read vectorizer from {:?}", path))?;
        Self::from_json(&raw).with_context(|| format!("Invalid vectorizer artifact {:?}", path))
    }

    /// Parse the vectorizer from its JSON export.
    pub fn from_json(raw: &str) -> Result<Self> {
        let artifact: TfidfArtifact = serde_json::from_str(raw)?;
        Self::from_artifact(artifact)
    }

    fn from_artifact(artifact: TfidfArtifact) -> Result<Self> {
        let size = artifact.vocabulary.len();
        if size == 0 {
            bail!("vocabulary is empty");
        }

        // Ids must cover 0..size exactly once
        let mut terms: Vec<Option<String>> = vec![None; size];
        for (term, &id) in &artifact.vocabulary {
            if id >= size {
                bail!("term '{}' has id {} outside vocabulary of {}", term, id, size);
            }
            if terms[id].replace(term.clone()).is_some() {
                bail!("vocabulary id {} assigned twice", id);
            }
        }
        let terms: Vec<String> = terms.into_iter().flatten().collect();

        let idf = if artifact.use_idf {
            let idf = artifact
                .idf
                .context("use_idf is set but no idf weights were exported")?;
            if idf.len() != size {
                bail!("idf has {} weights for {} terms", idf.len(), size);
            }
            Some(idf)
        } else {
            None
        };

        let (min_n, max_n) = artifact.ngram_range;
        if min_n == 0 || min_n > max_n {
            bail!("invalid ngram_range ({}, {})", min_n, max_n);
        }

        let token_pattern = Regex::new(&artifact.token_pattern)
            .with_context(|| format!("invalid token_pattern {:?}", artifact.token_pattern))?;

        Ok(Self {
            vocabulary: artifact.vocabulary,
            terms,
            idf,
            lowercase: artifact.lowercase,
            token_pattern,
            ngram_range: artifact.ngram_range,
            stop_words: artifact.stop_words.unwrap_or_default().into_iter().collect(),
            binary: artifact.binary,
            sublinear_tf: artifact.sublinear_tf,
            norm: artifact.norm,
        })
    }

    /// Split text into the terms the vocabulary is keyed by.
    fn analyze(&self, text: &str) -> Vec<String> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let tokens: Vec<&str> = self
            .token_pattern
            .find_iter(&text)
            .map(|m| m.as_str())
            .filter(|t| !self.stop_words.contains(*t))
            .collect();

        let (min_n, max_n) = self.ngram_range;
        let mut terms = Vec::new();
        for n in min_n..=max_n.min(tokens.len()) {
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }
        terms
    }
}

impl TextVectorizer for TfidfVectorizer {
    fn transform(&self, text: &str) -> Result<SparseRow, TransformError> {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in self.analyze(text) {
            if let Some(&id) = self.vocabulary.get(&term) {
                *counts.entry(id).or_insert(0.0) += 1.0;
            }
        }

        let mut weighted: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(id, count)| {
                let tf = if self.binary {
                    1.0
                } else if self.sublinear_tf {
                    1.0 + count.ln()
                } else {
                    count
                };
                let idf = self.idf.as_ref().map(|w| w[id]).unwrap_or(1.0);
                (id, tf * idf)
            })
            .collect();

        let norm = match self.norm {
            Some(Norm::L2) => weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt(),
            Some(Norm::L1) => weighted.iter().map(|(_, w)| w.abs()).sum::<f64>(),
            None => 1.0,
        };
        if norm > 0.0 {
            for (_, w) in &mut weighted {
                *w /= norm;
            }
        }

        Ok(SparseRow::from_pairs(
            self.terms.len(),
            weighted.into_iter().map(|(id, w)| (id, w as f32)).collect(),
        ))
    }

    fn vocabulary_size(&self) -> usize {
        self.terms.len()
    }

    fn feature_names(&self) -> Vec<String> {
        self.terms.clone()
    }
}
