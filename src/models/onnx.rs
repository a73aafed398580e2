//! ONNX export of the classifier, run through ONNX Runtime.
//!
//! Converted models take a dense float tensor of shape `[1, num_features]`
//! and cannot decompose their output, so this variant only serves the
//! probability path; sparse rows are refused so the engine densifies them.

use crate::error::ClassifierError;
use crate::models::classifier::Classifier;
use crate::sparse::SparseRow;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Classifier backed by an ONNX Runtime session
pub struct OnnxClassifier {
    name: String,
    /// Running a session needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxClassifier {
    /// Load an ONNX model from file
    pub fn load<P: AsRef<Path>>(path: P, name: &str, threads: usize) -> Result<Self> {
        let path = path.as_ref();

        ort::init().commit()?;
        info!(model = %name, path = %path.display(), threads = threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "probabilities".to_string())
            });

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "ONNX model loaded"
        );

        Ok(Self {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    fn run(&self, features: &[f32]) -> Result<f64> {
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor = Tensor::from_array((shape, features.to_vec()))
            .context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        if let Some(output) = outputs.get(&self.output_name) {
            if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
                let dims: Vec<i64> = shape.iter().copied().collect();
                return fake_class_probability(&dims, data);
            }
        }

        // Fall back to any float tensor output that is not the label
        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
                let dims: Vec<i64> = shape.iter().copied().collect();
                debug!(model = %self.name, output = %name, "Probability read from fallback output");
                return fake_class_probability(&dims, data);
            }
        }

        anyhow::bail!("no probability tensor among model outputs")
    }
}

/// Pick the positive-class probability out of `[1, 2]`, `[2]` or `[1, 1]` output.
fn fake_class_probability(dims: &[i64], data: &[f32]) -> Result<f64> {
    let classes = dims.last().copied().unwrap_or(0);
    match classes {
        c if c >= 2 && data.len() >= 2 => Ok(data[1] as f64),
        1 if !data.is_empty() => Ok(data[0] as f64),
        _ => anyhow::bail!("unexpected probability tensor shape {:?}", dims),
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_features(&self) -> Option<usize> {
        None
    }

    fn predict_proba_sparse(&self, _row: &SparseRow) -> Result<f64, ClassifierError> {
        Err(ClassifierError::SparseInputUnsupported)
    }

    fn predict_proba_dense(&self, row: &[f32]) -> Result<f64, ClassifierError> {
        self.run(row)
            .map_err(|e| ClassifierError::Runtime(format!("{:#}", e)))
    }

    fn contributions(&self, _row: &SparseRow) -> Result<Vec<f64>, ClassifierError> {
        Err(ClassifierError::ContributionsUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_class_probability_shapes() {
        assert_eq!(fake_class_probability(&[1, 2], &[0.3, 0.7]).unwrap(), 0.7f32 as f64);
        assert_eq!(fake_class_probability(&[2], &[0.9, 0.1]).unwrap(), 0.1f32 as f64);
        assert_eq!(fake_class_probability(&[1, 1], &[0.4]).unwrap(), 0.4f32 as f64);
        assert!(fake_class_probability(&[1, 0], &[]).is_err());
    }
}
