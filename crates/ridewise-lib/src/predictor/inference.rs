//! Regressor implementations
//!
//! Native regressors (linear models and gradient-boosted tree ensembles)
//! are serde documents stored as JSON or bincode. ONNX regressors run
//! through tract-onnx.

use super::schema::ModelSchema;
use super::Regressor;
use crate::error::{Error, Result};
use crate::models::FeatureFrame;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Inference latency above which a warning is logged
const SLOW_INFERENCE_MS: u128 = 50;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Ordinary least squares style model: `intercept + coefficients . x`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

/// One node of a regression tree; children are indices into the node list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Walk from the root; `x[feature] <= threshold` goes left
    fn evaluate(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                TreeNode::Split { feature, .. } => Some(*feature),
                TreeNode::Leaf { .. } => None,
            })
            .max()
    }

    /// Children must point strictly forward, which rules out cycles
    fn validate(&self, tree_idx: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::InvalidModel(format!("tree {} has no nodes", tree_idx)));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split { left, right, .. } = node {
                for child in [*left, *right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(Error::InvalidModel(format!(
                            "tree {} node {} has invalid child {}",
                            tree_idx, idx, child
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Additive ensemble: `base_score + learning_rate * sum(trees)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

/// Native regressor document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeModel {
    Linear(LinearModel),
    GradientBoosting(TreeEnsemble),
}

impl NativeModel {
    fn feature_names(&self) -> Option<&Vec<String>> {
        match self {
            Self::Linear(m) => m.feature_names.as_ref(),
            Self::GradientBoosting(m) => m.feature_names.as_ref(),
        }
    }

    /// Number of input columns the model reads
    fn input_width(&self) -> usize {
        match self {
            Self::Linear(m) => m.coefficients.len(),
            Self::GradientBoosting(m) => m
                .trees
                .iter()
                .filter_map(RegressionTree::max_feature)
                .max()
                .map(|f| f + 1)
                .unwrap_or(0),
        }
    }

    fn validate(&self) -> Result<()> {
        if let Self::GradientBoosting(ensemble) = self {
            for (idx, tree) in ensemble.trees.iter().enumerate() {
                tree.validate(idx)?;
            }
        }
        if let Some(names) = self.feature_names() {
            let width = self.input_width();
            let fits = match self {
                Self::Linear(_) => names.len() == width,
                Self::GradientBoosting(_) => names.len() >= width,
            };
            if !fits {
                return Err(Error::InvalidModel(format!(
                    "{} feature names for a model reading {} inputs",
                    names.len(),
                    width
                )));
            }
        }
        Ok(())
    }

    fn predict_one(&self, x: &[f64]) -> f64 {
        match self {
            Self::Linear(m) => {
                m.intercept
                    + m.coefficients
                        .iter()
                        .zip(x)
                        .map(|(c, v)| c * v)
                        .sum::<f64>()
            }
            Self::GradientBoosting(m) => {
                m.base_score + m.learning_rate * m.trees.iter().map(|t| t.evaluate(x)).sum::<f64>()
            }
        }
    }
}

/// Regressor backed by a [`NativeModel`] document
#[derive(Debug, Clone)]
pub struct NativeRegressor {
    model: NativeModel,
    schema: Option<ModelSchema>,
}

impl NativeRegressor {
    /// Validate the document and wrap it
    pub fn new(model: NativeModel) -> Result<Self> {
        model.validate()?;
        let schema = model.feature_names().map(|n| ModelSchema::new(n.iter().cloned()));
        Ok(Self { model, schema })
    }

    pub fn from_json(bytes: &[u8]) -> anyhow::Result<Self> {
        let model: NativeModel = serde_json::from_slice(bytes)?;
        Ok(Self::new(model)?)
    }

    pub fn from_bincode(bytes: &[u8]) -> anyhow::Result<Self> {
        let model: NativeModel = bincode::deserialize(bytes)?;
        Ok(Self::new(model)?)
    }

    pub fn model(&self) -> &NativeModel {
        &self.model
    }
}

impl Regressor for NativeRegressor {
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        let width = self.model.input_width();
        if frame.n_cols() < width {
            return Err(Error::prediction(format!(
                "model reads {} features but input has {} columns",
                width,
                frame.n_cols()
            )));
        }
        Ok(frame.rows().iter().map(|x| self.model.predict_one(x)).collect())
    }

    fn schema(&self) -> Option<&ModelSchema> {
        self.schema.as_ref()
    }
}

/// ONNX regressor using tract for lightweight inference
pub struct OnnxRegressor {
    plan: TractModel,
    schema: Option<ModelSchema>,
}

impl OnnxRegressor {
    /// Parse and optimize an ONNX model from bytes
    ///
    /// With a schema the input shape is pinned to `[1, schema.len()]`;
    /// otherwise the shape declared by the graph is used.
    pub fn from_bytes(model_bytes: &[u8], schema: Option<ModelSchema>) -> anyhow::Result<Self> {
        let mut model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?;
        if let Some(schema) = &schema {
            model = model
                .with_input_fact(0, f32::fact([1, schema.len()]).into())
                .context("Failed to set input shape")?;
        }
        let plan = model
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(Self { plan, schema })
    }

    fn run_row(&self, row: &[f64]) -> Result<f64> {
        let data: Vec<f32> = row.iter().map(|v| *v as f32).collect();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, data.len()), data)
            .map_err(|e| Error::prediction(e.to_string()))?
            .into();

        let result = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| Error::prediction(format!("{:#}", e)))?;
        let output = result
            .first()
            .ok_or_else(|| Error::prediction("No output from model"))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| Error::prediction(e.to_string()))?;
        let value = view
            .iter()
            .next()
            .copied()
            .ok_or_else(|| Error::prediction("Model output is empty"))?;
        Ok(value as f64)
    }
}

impl Regressor for OnnxRegressor {
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        let start = Instant::now();
        let values = frame
            .rows()
            .iter()
            .map(|row| self.run_row(row))
            .collect::<Result<Vec<_>>>()?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > SLOW_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), rows = frame.n_rows(), "Slow ONNX inference");
        } else {
            debug!(elapsed_us = elapsed.as_micros(), rows = frame.n_rows(), "ONNX inference completed");
        }
        Ok(values)
    }

    fn schema(&self) -> Option<&ModelSchema> {
        self.schema.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureRow;
    use crate::predictor::SchemaAligner;

    fn stump() -> RegressionTree {
        RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 6.5,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: 10.0 },
                TreeNode::Leaf { value: 100.0 },
            ],
        }
    }

    fn frame(columns: &[&str], rows: Vec<Vec<f64>>) -> FeatureFrame {
        FeatureFrame::from_parts(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn test_linear_prediction() {
        let model = NativeRegressor::new(NativeModel::Linear(LinearModel {
            feature_names: Some(vec!["hr".into(), "temp".into()]),
            intercept: 5.0,
            coefficients: vec![2.0, 0.5],
        }))
        .unwrap();
        let preds = model.predict(&frame(&["hr", "temp"], vec![vec![3.0, 10.0]])).unwrap();
        assert_eq!(preds, vec![16.0]);
        assert_eq!(model.schema().unwrap().names(), &["hr".to_string(), "temp".to_string()]);
    }

    #[test]
    fn test_tree_ensemble_prediction() {
        let model = NativeRegressor::new(NativeModel::GradientBoosting(TreeEnsemble {
            feature_names: None,
            base_score: 1.0,
            learning_rate: 0.5,
            trees: vec![stump(), stump()],
        }))
        .unwrap();
        let preds = model
            .predict(&frame(&["hr"], vec![vec![6.0], vec![7.0]]))
            .unwrap();
        assert_eq!(preds, vec![11.0, 101.0]);
        assert!(model.schema().is_none());
    }

    #[test]
    fn test_cyclic_tree_rejected() {
        let tree = RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 0,
                    right: 1,
                },
                TreeNode::Leaf { value: 1.0 },
            ],
        };
        let result = NativeRegressor::new(NativeModel::GradientBoosting(TreeEnsemble {
            feature_names: None,
            base_score: 0.0,
            learning_rate: 1.0,
            trees: vec![tree],
        }));
        assert!(matches!(result, Err(Error::InvalidModel(_))));
    }

    #[test]
    fn test_feature_name_count_mismatch_rejected() {
        let result = NativeRegressor::new(NativeModel::Linear(LinearModel {
            feature_names: Some(vec!["hr".into()]),
            intercept: 0.0,
            coefficients: vec![1.0, 2.0],
        }));
        assert!(matches!(result, Err(Error::InvalidModel(_))));
    }

    #[test]
    fn test_narrow_input_is_prediction_error() {
        let model = NativeRegressor::new(NativeModel::Linear(LinearModel {
            feature_names: None,
            intercept: 0.0,
            coefficients: vec![1.0, 2.0, 3.0],
        }))
        .unwrap();
        let err = model.predict(&frame(&["a"], vec![vec![1.0]])).unwrap_err();
        assert!(matches!(err, Error::Prediction(_)));
    }

    #[test]
    fn test_json_and_bincode_documents_agree() {
        let doc = NativeModel::GradientBoosting(TreeEnsemble {
            feature_names: Some(vec!["hr".into()]),
            base_score: 2.0,
            learning_rate: 1.0,
            trees: vec![stump()],
        });
        let from_json = NativeRegressor::from_json(&serde_json::to_vec(&doc).unwrap()).unwrap();
        let from_bin = NativeRegressor::from_bincode(&bincode::serialize(&doc).unwrap()).unwrap();
        assert_eq!(from_json.model(), from_bin.model());
    }

    #[test]
    fn test_aligned_row_feeds_native_model() {
        let model = NativeRegressor::new(NativeModel::Linear(LinearModel {
            feature_names: Some(vec!["temp".into(), "hr".into()]),
            intercept: 0.0,
            coefficients: vec![1.0, 10.0],
        }))
        .unwrap();
        let row: FeatureRow = [("hr", 8.0), ("temp", 3.0), ("noise", 99.0)].into_iter().collect();
        let aligned = SchemaAligner::align_row(&row, model.schema());
        assert_eq!(model.predict(&aligned.frame).unwrap(), vec![83.0]);
    }

    #[test]
    fn test_garbage_onnx_bytes_fail_to_parse() {
        assert!(OnnxRegressor::from_bytes(b"not an onnx graph", None).is_err());
    }
}
