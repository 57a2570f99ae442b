use std::path::{Path, PathBuf};

use tracing::instrument;

mod checkpoint;
mod error;
pub mod geometry;
pub mod labels;
pub mod loss;
mod model;
pub mod pipeline;
mod util;
pub mod zones;

pub use checkpoint::{Checkpoint, CheckpointMonitor};
pub use error::{AnnotationError, DatasetError, LossError};
pub use geometry::{read_annotations, Quad};
pub use labels::{LabelGrids, LabelSynthesizer};
pub use model::{DetectionModel, ZeroBaseline};
pub use pipeline::{Batch, Batcher, Labeler, Sample, SampleSource, TrainingExample};
pub use zones::{AllPositive, SizeZoneClassifier, ZoneClassifier, ZonePartition};

/// Knobs for the dataset pipeline.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct DatasetOptions {
    /// Expected square image edge (pixels); draws with other dimensions
    /// are skipped.
    pub crop_size: u32,
    /// Cells per side of the label grids.
    pub grid_size: usize,
    /// Examples stacked per batch.
    pub batch_size: usize,
    /// Scalar applied to every pixel channel.
    pub normalize_scale: f32,
    /// Source-stage RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            crop_size: 320,
            grid_size: 80,
            batch_size: 32,
            normalize_scale: 1.0 / 255.0,
            seed: None,
        }
    }
}

pub struct DatasetBuilder {
    root: PathBuf,
    options: DatasetOptions,
    classifier: Box<dyn ZoneClassifier>,
}

impl DatasetBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            options: DatasetOptions::default(),
            classifier: Box::new(SizeZoneClassifier::default()),
        }
    }

    pub fn options(mut self, options: DatasetOptions) -> Self {
        self.options = options;
        self
    }

    pub fn crop_size(mut self, crop_size: u32) -> Self {
        self.options.crop_size = crop_size;
        self
    }

    pub fn grid_size(mut self, grid_size: usize) -> Self {
        self.options.grid_size = grid_size;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.options.batch_size = batch_size;
        self
    }

    pub fn normalize_scale(mut self, normalize_scale: f32) -> Self {
        self.options.normalize_scale = normalize_scale;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.options.seed = Some(seed);
        self
    }

    pub fn zone_classifier(mut self, classifier: impl ZoneClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    #[instrument(skip(self))]
    pub fn build(self) -> Result<Dataset, DatasetError> {
        let paths = list_images(&self.root)?;
        if paths.is_empty() {
            return Err(DatasetError::EmptyDataset(self.root));
        }
        log::debug!("found {} images under {}", paths.len(), self.root.display());

        let options = self.options;
        let downsample = options.crop_size as f32 / options.grid_size as f32;
        let source = SampleSource::new(
            paths,
            options.crop_size,
            options.normalize_scale,
            options.seed,
        );
        let labeler = Labeler::new(
            source,
            LabelSynthesizer::new(options.grid_size, downsample),
            self.classifier,
        );
        Ok(Dataset {
            batches: Batcher::new(labeler, options.batch_size),
            options,
        })
    }
}

/// An infinite, restartable stream of stacked training batches.
pub struct Dataset {
    batches: Batcher<Labeler<SampleSource>>,
    options: DatasetOptions,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Dataset {
    pub fn options(&self) -> DatasetOptions {
        self.options
    }
}

impl Iterator for Dataset {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        self.batches.next()
    }
}

/// Images are matched by extension and sorted, so the seed alone
/// determines the draw sequence.
fn list_images(root: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        if matches!(ext.as_deref(), Some("jpg" | "jpeg" | "png")) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
