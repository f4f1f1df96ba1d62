// src/relevance/training.rs
//! Labeled examples for the semantic filter and where they are persisted.
//!
//! Each label keeps at most `cap` examples; the oldest are evicted first so the
//! filter follows recent feedback and memory stays bounded.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::embedding::cosine_similarity;

pub const DEFAULT_MAX_EXAMPLES_PER_LABEL: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    pub label: Label,
    /// Only set for negatives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub embedding: Vec<f32>,
}

/// Row-major embedding rows of one label, rebuilt after every mutation.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingMatrix {
    rows: Vec<Vec<f32>>,
}

impl EmbeddingMatrix {
    fn rebuild(examples: &[TrainingExample]) -> Self {
        Self {
            rows: examples.iter().map(|e| e.embedding.clone()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `(row index, cosine)` of the most similar row, if any.
    pub fn nearest(&self, query: &[f32]) -> Option<(usize, f32)> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| (i, cosine_similarity(query, row)))
            .fold(None, |best, (i, sim)| match best {
                Some((_, b)) if b >= sim => best,
                _ => Some((i, sim)),
            })
    }
}

/// Both label collections plus their matrices. Only the examples are serialized;
/// matrices are derived on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingSet {
    #[serde(default)]
    positive: Vec<TrainingExample>,
    #[serde(default)]
    negative: Vec<TrainingExample>,
    #[serde(skip)]
    positive_matrix: EmbeddingMatrix,
    #[serde(skip)]
    negative_matrix: EmbeddingMatrix,
}

impl TrainingSet {
    pub fn positives(&self) -> &[TrainingExample] {
        &self.positive
    }

    pub fn negatives(&self) -> &[TrainingExample] {
        &self.negative
    }

    pub fn positive_matrix(&self) -> &EmbeddingMatrix {
        &self.positive_matrix
    }

    pub fn negative_matrix(&self) -> &EmbeddingMatrix {
        &self.negative_matrix
    }

    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty()
    }

    /// Append, evict oldest beyond `cap`, rebuild the affected matrix.
    pub fn push(&mut self, example: TrainingExample, cap: usize) {
        let cap = cap.max(1);
        let (list, matrix) = match example.label {
            Label::Positive => (&mut self.positive, &mut self.positive_matrix),
            Label::Negative => (&mut self.negative, &mut self.negative_matrix),
        };
        list.push(example);
        if list.len() > cap {
            let excess = list.len() - cap;
            list.drain(0..excess);
        }
        *matrix = EmbeddingMatrix::rebuild(list);
    }

    /// Recompute both matrices (after deserialization).
    pub fn rebuild_matrices(&mut self) {
        self.positive_matrix = EmbeddingMatrix::rebuild(&self.positive);
        self.negative_matrix = EmbeddingMatrix::rebuild(&self.negative);
    }
}

/// Durable home of the training set.
pub trait TrainingRepository: Send + Sync {
    fn load(&self) -> Result<TrainingSet>;
    fn save(&self, set: &TrainingSet) -> Result<()>;
}

/// Single JSON blob on disk, written via tmp file + rename.
pub struct JsonTrainingRepository {
    path: PathBuf,
}

impl JsonTrainingRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TrainingRepository for JsonTrainingRepository {
    /// A missing file is an empty training set, not an error.
    fn load(&self) -> Result<TrainingSet> {
        if !self.path.exists() {
            return Ok(TrainingSet::default());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading training set {}", self.path.display()))?;
        let mut set: TrainingSet = serde_json::from_str(&raw)
            .with_context(|| format!("parsing training set {}", self.path.display()))?;
        set.rebuild_matrices();
        Ok(set)
    }

    fn save(&self, set: &TrainingSet) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating directory {}", dir.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec(set).context("serializing training set")?;
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(&json)?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

/// In-process repository for tests and dry runs.
#[derive(Default)]
pub struct MemoryTrainingRepository {
    inner: Mutex<Option<TrainingSet>>,
    saves: Mutex<usize>,
}

impl MemoryTrainingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_set(set: TrainingSet) -> Self {
        Self {
            inner: Mutex::new(Some(set)),
            saves: Mutex::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TrainingRepository for MemoryTrainingRepository {
    fn load(&self) -> Result<TrainingSet> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut set = guard.clone().unwrap_or_default();
        set.rebuild_matrices();
        Ok(set)
    }

    fn save(&self, set: &TrainingSet) -> Result<()> {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(set.clone());
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
