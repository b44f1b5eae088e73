//! Read-only access to live platform state.
//!
//! The model, dataset and training-task registries are owned by other
//! services. The assistant only reads them through [`PlatformQuery`].

use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, VulwebError};
use crate::types::{DatasetRecord, LiveContext, ModelRecord, TaskStatus, TrainingTaskRecord};

/// Aggregate counts across the platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCounts {
    pub models: usize,
    pub datasets: usize,
    pub tasks: usize,
    pub running_tasks: usize,
}

/// Read-only query provider over platform records.
///
/// Implementors supply the three collection accessors; the filter, sort
/// and count helpers have default implementations on top of them.
pub trait PlatformQuery: Send + Sync {
    fn models(&self) -> Result<Vec<ModelRecord>>;

    fn datasets(&self) -> Result<Vec<DatasetRecord>>;

    fn training_tasks(&self) -> Result<Vec<TrainingTaskRecord>>;

    /// Models whose accuracy is at least `threshold` (a fraction).
    fn models_with_min_accuracy(&self, threshold: f64) -> Result<Vec<ModelRecord>> {
        Ok(self
            .models()?
            .into_iter()
            .filter(|m| m.accuracy.is_some_and(|a| a >= threshold))
            .collect())
    }

    /// The model with the highest recorded accuracy.
    fn best_model(&self) -> Result<Option<ModelRecord>> {
        Ok(self
            .models()?
            .into_iter()
            .filter(|m| m.accuracy.is_some())
            .fold(None, |best: Option<ModelRecord>, m| match best {
                Some(b) if b.accuracy >= m.accuracy => Some(b),
                _ => Some(m),
            }))
    }

    /// The dataset with the most samples.
    fn dataset_with_most_samples(&self) -> Result<Option<DatasetRecord>> {
        Ok(self
            .datasets()?
            .into_iter()
            .filter(|d| d.num_samples.is_some())
            .fold(None, |best: Option<DatasetRecord>, d| match best {
                Some(b) if b.num_samples >= d.num_samples => Some(b),
                _ => Some(d),
            }))
    }

    fn tasks_with_status(&self, status: TaskStatus) -> Result<Vec<TrainingTaskRecord>> {
        Ok(self
            .training_tasks()?
            .into_iter()
            .filter(|t| t.status == status)
            .collect())
    }

    fn counts(&self) -> Result<PlatformCounts> {
        let tasks = self.training_tasks()?;
        Ok(PlatformCounts {
            models: self.models()?.len(),
            datasets: self.datasets()?.len(),
            running_tasks: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Running)
                .count(),
            tasks: tasks.len(),
        })
    }

    /// Snapshot of every collection for the response composer.
    fn live_context(&self) -> Result<LiveContext> {
        Ok(LiveContext {
            models: Some(self.models()?),
            datasets: Some(self.datasets()?),
            tasks: Some(self.training_tasks()?),
        })
    }
}

/// Serializable collection of platform records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSnapshot {
    pub models: Vec<ModelRecord>,
    pub datasets: Vec<DatasetRecord>,
    pub tasks: Vec<TrainingTaskRecord>,
}

/// In-memory [`PlatformQuery`] implementation.
///
/// Backs the terminal driver and tests. The snapshot can be replaced at
/// runtime with [`InMemoryPlatform::replace`].
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    snapshot: RwLock<PlatformSnapshot>,
}

impl InMemoryPlatform {
    pub fn new(snapshot: PlatformSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Load a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: PlatformSnapshot = serde_json::from_str(&content)?;
        info!(
            path = %path.display(),
            models = snapshot.models.len(),
            datasets = snapshot.datasets.len(),
            tasks = snapshot.tasks.len(),
            "Platform snapshot loaded"
        );
        Ok(Self::new(snapshot))
    }

    pub fn replace(&self, snapshot: PlatformSnapshot) -> Result<()> {
        let mut guard = self
            .snapshot
            .write()
            .map_err(|e| VulwebError::Platform(format!("Lock poisoned: {}", e)))?;
        *guard = snapshot;
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&PlatformSnapshot) -> T) -> Result<T> {
        let guard = self
            .snapshot
            .read()
            .map_err(|e| VulwebError::Platform(format!("Lock poisoned: {}", e)))?;
        Ok(f(&guard))
    }
}

impl PlatformQuery for InMemoryPlatform {
    fn models(&self) -> Result<Vec<ModelRecord>> {
        self.read(|s| s.models.clone())
    }

    fn datasets(&self) -> Result<Vec<DatasetRecord>> {
        self.read(|s| s.datasets.clone())
    }

    fn training_tasks(&self) -> Result<Vec<TrainingTaskRecord>> {
        self.read(|s| s.tasks.clone())
    }
}
