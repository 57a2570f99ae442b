use float_ord::FloatOrd;

/// Tracks the best observed loss and says when a checkpoint is worth
/// writing. Parameter serialization stays with the surrounding framework.
#[derive(Debug, Default)]
pub struct CheckpointMonitor {
    best: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub epoch: usize,
    pub loss: f32,
    /// Suggested checkpoint stem, keyed by epoch and loss.
    pub name: String,
}

impl CheckpointMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some` exactly when `loss` improves on the best seen so
    /// far. A non-finite loss never improves.
    pub fn observe(&mut self, epoch: usize, loss: f32) -> Option<Checkpoint> {
        if !loss.is_finite() {
            log::warn!("epoch {epoch}: non-finite loss {loss}, not checkpointing");
            return None;
        }
        if let Some(best) = self.best {
            if FloatOrd(loss) >= FloatOrd(best) {
                return None;
            }
        }
        self.best = Some(loss);
        Some(Checkpoint {
            epoch,
            loss,
            name: format!("epoch-{epoch:02}-loss-{loss:.2}"),
        })
    }

    pub fn best(&self) -> Option<f32> {
        self.best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoints_only_on_improvement() {
        let mut monitor = CheckpointMonitor::new();
        assert!(monitor.observe(0, 4.0).is_some());
        assert!(monitor.observe(1, 4.5).is_none());
        let better = monitor.observe(2, 3.2).unwrap();
        assert_eq!(better.name, "epoch-02-loss-3.20");
        assert_eq!(monitor.best(), Some(3.2));
    }

    #[test]
    fn non_finite_loss_never_checkpoints() {
        let mut monitor = CheckpointMonitor::new();
        assert!(monitor.observe(0, f32::NAN).is_none());
        assert!(monitor.observe(1, f32::INFINITY).is_none());
        assert!(monitor.observe(2, 1.0).is_some());
        assert!(monitor.observe(3, f32::NAN).is_none());
        assert_eq!(monitor.best(), Some(1.0));
    }
}
