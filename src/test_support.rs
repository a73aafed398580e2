//! Small fitted artifacts shared by unit tests.
//!
//! Layout of the assembled row (24 columns):
//! text 0..11, employment_type 11..15, required_experience 15..18,
//! required_education 18..21, then telecommuting, has_company_logo, has_questions.

use crate::models::booster::TreeEnsemble;
use crate::models::encoder::OneHotEncoder;
use crate::models::loader::LoadedArtifacts;
use crate::models::vectorizer::TfidfVectorizer;
use crate::types::posting::JobPostingRequest;
use serde_json::{json, Value};
use std::path::Path;

pub const VOCABULARY: [&str; 11] = [
    "apply",
    "experience",
    "from",
    "home",
    "interview",
    "no",
    "required",
    "salary",
    "team",
    "urgent",
    "work",
];

/// Terms whose presence pushes towards fake
const SUSPICIOUS: [&str; 7] = ["from", "home", "interview", "no", "required", "urgent", "work"];

pub fn vectorizer_json() -> Value {
    let vocabulary: serde_json::Map<String, Value> = VOCABULARY
        .iter()
        .enumerate()
        .map(|(i, t)| (t.to_string(), json!(i)))
        .collect();
    json!({
        "vocabulary": vocabulary,
        "idf": [1.4, 1.2, 1.9, 1.8, 1.6, 2.1, 1.3, 1.5, 1.1, 2.4, 1.7],
        "ngram_range": [1, 1],
        "norm": "l2",
        "sublinear_tf": false
    })
}

pub fn encoder_json() -> Value {
    json!({
        "feature_names_in": ["employment_type", "required_experience", "required_education"],
        "categories": [
            ["Contract", "Full-time", "Part-time", "Unknown"],
            ["Entry level", "Mid-Senior level", "Unknown"],
            ["Bachelor's Degree", "High School or equivalent", "Unknown"]
        ],
        "handle_unknown": "ignore"
    })
}

/// One split on `feature`; covers 10 / 6 / 4 with missing going left.
fn stump(feature: usize, cond: f32, left: f32, right: f32) -> Value {
    json!({
        "left_children": [1, -1, -1],
        "right_children": [2, -1, -1],
        "split_indices": [feature, 0, 0],
        "split_conditions": [cond, left, right],
        "default_left": [1, 0, 0],
        "sum_hessian": [10.0, 6.0, 4.0],
        "split_type": [0, 0, 0]
    })
}

pub fn model_json() -> Value {
    let mut trees: Vec<Value> = VOCABULARY
        .iter()
        .enumerate()
        .map(|(col, term)| {
            if SUSPICIOUS.contains(term) {
                stump(col, 0.05, -0.1, 0.8)
            } else {
                stump(col, 0.05, 0.1, -0.6)
            }
        })
        .collect();
    trees.push(stump(12, 0.5, 0.0, -0.2)); // employment_type_Full-time
    trees.push(stump(17, 0.5, 0.0, 0.3)); // required_experience_Unknown
    trees.push(stump(20, 0.5, 0.0, 0.25)); // required_education_Unknown
    trees.push(stump(21, 0.5, 0.0, 0.5)); // telecommuting
    trees.push(stump(22, 0.5, 0.4, -0.9)); // has_company_logo
    trees.push(stump(23, 0.5, 0.2, -0.3)); // has_questions

    let n = trees.len();
    json!({
        "learner": {
            "attributes": {},
            "gradient_booster": {
                "name": "gbtree",
                "model": {
                    "gbtree_model_param": {"num_parallel_tree": "1", "num_trees": n.to_string()},
                    "trees": trees,
                    "tree_info": vec![0; n]
                }
            },
            "learner_model_param": {
                "base_score": "5E-1",
                "num_class": "0",
                "num_feature": "24"
            },
            "objective": {"name": "binary:logistic"}
        },
        "version": [2, 0, 3]
    })
}

/// Write the three artifacts under their default file names.
pub fn write_artifacts(dir: &Path) {
    std::fs::write(dir.join("tfidf_vectorizer.json"), vectorizer_json().to_string()).unwrap();
    std::fs::write(dir.join("onehot_encoder.json"), encoder_json().to_string()).unwrap();
    std::fs::write(dir.join("xgboost_model.json"), model_json().to_string()).unwrap();
}

pub fn artifacts() -> LoadedArtifacts {
    LoadedArtifacts {
        vectorizer: Box::new(TfidfVectorizer::from_json(&vectorizer_json().to_string()).unwrap()),
        encoder: Box::new(OneHotEncoder::from_json(&encoder_json().to_string()).unwrap()),
        classifier: Box::new(TreeEnsemble::from_json(&model_json().to_string(), "xgboost").unwrap()),
    }
}

/// Remote posting with no logo or screening questions.
pub fn suspicious_posting() -> JobPostingRequest {
    let mut posting = JobPostingRequest::new("Urgent! Work from home, no interview required");
    posting.employment_type = "Full-time".into();
    posting.telecommuting = 1;
    posting
}

/// Office posting from an established company.
pub fn legitimate_posting() -> JobPostingRequest {
    let mut posting =
        JobPostingRequest::new("Apply to join our team. Competitive salary, 3 years experience");
    posting.required_experience = "Mid-Senior level".into();
    posting.required_education = "Bachelor's Degree".into();
    posting.has_company_logo = 1;
    posting.has_questions = 1;
    posting
}
