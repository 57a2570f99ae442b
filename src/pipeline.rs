use std::path::{Path, PathBuf};

use ndarray::{Array3, Array4, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{
    geometry::read_annotations, labels::LabelSynthesizer, util::normalize_image,
    zones::ZoneClassifier, Quad,
};

/// One validated, normalized image paired with its annotations.
pub struct Sample {
    /// (H, W, 3) float tensor, already normalized.
    pub image: Array3<f32>,
    pub quads: Vec<Quad>,
}

/// One labeled training example.
pub struct TrainingExample {
    pub image: Array3<f32>,
    /// (grid, grid, 2): class label + mask.
    pub cls: Array3<f32>,
    /// (grid, grid, 10): regression targets + class label + mask.
    pub merged: Array3<f32>,
}

/// A stack of `batch_size` examples along a new leading axis.
pub struct Batch {
    pub images: Array4<f32>,
    pub cls: Array4<f32>,
    pub merged: Array4<f32>,
}

/// Infinite sample stream: draws an image path uniformly with replacement
/// and silently resamples whenever a draw fails validation.
pub struct SampleSource {
    paths: Vec<PathBuf>,
    rng: StdRng,
    crop_size: u32,
    scale: f32,
}

impl SampleSource {
    pub fn new(paths: Vec<PathBuf>, crop_size: u32, scale: f32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            paths,
            rng,
            crop_size,
            scale,
        }
    }

    fn try_load(&self, image_path: &Path) -> Option<Sample> {
        let annotation_path = image_path.with_extension("txt");
        if !annotation_path.is_file() {
            log::debug!("skipping {}: no annotation file", image_path.display());
            return None;
        }
        let quads = match read_annotations(&annotation_path) {
            Ok(quads) => quads,
            Err(err) => {
                log::debug!("skipping {}: {err}", annotation_path.display());
                return None;
            }
        };
        let image = match image::open(image_path) {
            Ok(image) => image,
            Err(err) => {
                log::debug!("skipping {}: {err}", image_path.display());
                return None;
            }
        };
        if image.width() != self.crop_size || image.height() != self.crop_size {
            log::debug!(
                "skipping {}: {}x{} instead of {crop}x{crop}",
                image_path.display(),
                image.width(),
                image.height(),
                crop = self.crop_size,
            );
            return None;
        }
        Some(Sample {
            image: normalize_image(&image, self.scale),
            quads,
        })
    }
}

impl Iterator for SampleSource {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        loop {
            let path = self.paths.choose(&mut self.rng)?.clone();
            if let Some(sample) = self.try_load(&path) {
                return Some(sample);
            }
        }
    }
}

/// Applies zone classification and label synthesis to every sample.
pub struct Labeler<I> {
    source: I,
    synthesizer: LabelSynthesizer,
    classifier: Box<dyn ZoneClassifier>,
}

impl<I> Labeler<I> {
    pub fn new(source: I, synthesizer: LabelSynthesizer, classifier: Box<dyn ZoneClassifier>) -> Self {
        Self {
            source,
            synthesizer,
            classifier,
        }
    }
}

impl<I: Iterator<Item = Sample>> Iterator for Labeler<I> {
    type Item = TrainingExample;

    fn next(&mut self) -> Option<TrainingExample> {
        let Sample { image, quads } = self.source.next()?;
        let (height, width, _) = image.dim();
        let grids = self.synthesizer.synthesize(
            width as u32,
            height as u32,
            &quads,
            self.classifier.as_ref(),
        );
        Some(TrainingExample {
            image,
            cls: grids.cls_targets(),
            merged: grids.merged_targets(),
        })
    }
}

/// Groups examples into fixed-size stacked batches. Never terminates over
/// an infinite input; an input that ends mid-batch drops the partial batch.
pub struct Batcher<I> {
    examples: I,
    batch_size: usize,
}

impl<I> Batcher<I> {
    pub fn new(examples: I, batch_size: usize) -> Self {
        Self {
            examples,
            batch_size,
        }
    }
}

impl<I: Iterator<Item = TrainingExample>> Iterator for Batcher<I> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let mut images = Vec::with_capacity(self.batch_size);
        let mut cls = Vec::with_capacity(self.batch_size);
        let mut merged = Vec::with_capacity(self.batch_size);
        for _ in 0..self.batch_size {
            let example = self.examples.next()?;
            images.push(example.image);
            cls.push(example.cls);
            merged.push(example.merged);
        }
        Some(Batch {
            images: stack_examples(&images),
            cls: stack_examples(&cls),
            merged: stack_examples(&merged),
        })
    }
}

fn stack_examples(fields: &[Array3<f32>]) -> Array4<f32> {
    let views = fields.iter().map(Array3::view).collect::<Vec<_>>();
    ndarray::stack(Axis(0), &views).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones::AllPositive;

    const CROP: usize = 32;
    const GRID: usize = 8;

    fn sample(with_quad: bool) -> Sample {
        let quads = if with_quad {
            vec![Quad::new([
                [0.0, 0.0],
                [CROP as f32, 0.0],
                [CROP as f32, CROP as f32],
                [0.0, CROP as f32],
            ])]
        } else {
            Vec::new()
        };
        Sample {
            image: Array3::zeros((CROP, CROP, 3)),
            quads,
        }
    }

    fn labeler(source: impl Iterator<Item = Sample>) -> Labeler<impl Iterator<Item = Sample>> {
        Labeler::new(
            source,
            LabelSynthesizer::new(GRID, CROP as f32 / GRID as f32),
            Box::new(AllPositive),
        )
    }

    #[test]
    fn labeler_emits_grid_shaped_targets() {
        let mut stage = labeler(std::iter::repeat_with(|| sample(true)));
        let example = stage.next().unwrap();
        assert_eq!(example.image.dim(), (CROP, CROP, 3));
        assert_eq!(example.cls.dim(), (GRID, GRID, 2));
        assert_eq!(example.merged.dim(), (GRID, GRID, 10));
        assert!(example.cls.index_axis(Axis(2), 0).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn batcher_stacks_along_a_new_leading_axis() {
        let stage = labeler(std::iter::repeat_with(|| sample(false)));
        let mut batches = Batcher::new(stage, 5);
        let batch = batches.next().unwrap();
        assert_eq!(batch.images.dim(), (5, CROP, CROP, 3));
        assert_eq!(batch.cls.dim(), (5, GRID, GRID, 2));
        assert_eq!(batch.merged.dim(), (5, GRID, GRID, 10));
    }

    #[test]
    fn batcher_keeps_producing_batches() {
        let stage = labeler(std::iter::repeat_with(|| sample(false)));
        let mut batches = Batcher::new(stage, 2);
        for _ in 0..3 {
            assert!(batches.next().is_some());
        }
    }

    #[test]
    fn batcher_drops_a_partial_batch() {
        let stage = labeler(std::iter::repeat_with(|| sample(false)).take(3));
        let mut batches = Batcher::new(stage, 2);
        assert!(batches.next().is_some());
        assert!(batches.next().is_none());
    }

    #[test]
    fn source_skips_unusable_files_and_keeps_drawing() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let valid = dir.path().join("good.png");
        image::RgbImage::new(CROP as u32, CROP as u32)
            .save(&valid)
            .unwrap();
        std::fs::write(dir.path().join("good.txt"), "0,0,32,0,32,32,0,32\n").unwrap();
        // No annotation file.
        image::RgbImage::new(CROP as u32, CROP as u32)
            .save(dir.path().join("orphan.png"))
            .unwrap();
        // Wrong dimensions.
        image::RgbImage::new(16, 16)
            .save(dir.path().join("small.png"))
            .unwrap();
        std::fs::write(dir.path().join("small.txt"), "0,0,8,0,8,8,0,8\n").unwrap();

        let paths = vec![
            valid,
            dir.path().join("orphan.png"),
            dir.path().join("small.png"),
        ];
        let source = SampleSource::new(paths, CROP as u32, 1.0 / 255.0, Some(7));
        for sample in source.take(5) {
            assert_eq!(sample.image.dim(), (CROP, CROP, 3));
            assert_eq!(sample.quads.len(), 1);
        }
    }

    #[test]
    fn source_passes_empty_annotations_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        image::RgbImage::new(CROP as u32, CROP as u32)
            .save(&path)
            .unwrap();
        std::fs::write(dir.path().join("empty.txt"), "").unwrap();
        let mut source = SampleSource::new(vec![path], CROP as u32, 1.0, Some(1));
        let sample = source.next().unwrap();
        assert!(sample.quads.is_empty());
    }

    #[test]
    fn seeded_sources_draw_the_same_sequence() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a", "b"] {
            let path = dir.path().join(format!("{name}.png"));
            image::RgbImage::new(CROP as u32, CROP as u32)
                .save(&path)
                .unwrap();
            std::fs::write(
                dir.path().join(format!("{name}.txt")),
                if name == "a" { "" } else { "0,0,32,0,32,32,0,32\n" },
            )
            .unwrap();
        }
        let paths = vec![dir.path().join("a.png"), dir.path().join("b.png")];
        let counts = |seed| {
            SampleSource::new(paths.clone(), CROP as u32, 1.0, Some(seed))
                .take(8)
                .map(|sample| sample.quads.len())
                .collect::<Vec<_>>()
        };
        assert_eq!(counts(42), counts(42));
    }
}
