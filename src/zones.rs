use crate::Quad;

/// Disjoint split of the annotated quads: every input quad lands in exactly
/// one of the two sets.
#[derive(Debug, Clone, Default)]
pub struct ZonePartition {
    /// Ambiguous instances, excluded from loss via the mask grid.
    pub gray: Vec<Quad>,
    /// Confident text instances.
    pub positive: Vec<Quad>,
}

/// Decides which annotated instances are confident text and which are
/// ambiguous. The crate ships simple implementations; real pipelines are
/// expected to inject their own.
pub trait ZoneClassifier {
    fn classify(&self, quads: &[Quad]) -> ZonePartition;
}

/// Marks quads whose shortest edge is below a pixel threshold as gray:
/// instances that small carry more labeling noise than signal.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct SizeZoneClassifier {
    /// Shortest-edge length (full-resolution pixels) below which a quad is
    /// treated as ambiguous.
    pub min_side_px: f32,
}

impl Default for SizeZoneClassifier {
    fn default() -> Self {
        Self { min_side_px: 8.0 }
    }
}

impl ZoneClassifier for SizeZoneClassifier {
    fn classify(&self, quads: &[Quad]) -> ZonePartition {
        let (gray, positive) = quads
            .iter()
            .copied()
            .partition(|quad| quad.shortest_side() < self.min_side_px);
        ZonePartition { gray, positive }
    }
}

/// Treats every quad as confident text. Useful for clean synthetic data.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllPositive;

impl ZoneClassifier for AllPositive {
    fn classify(&self, quads: &[Quad]) -> ZonePartition {
        ZonePartition {
            gray: Vec::new(),
            positive: quads.to_vec(),
        }
    }
}
