use textgrid::{loss, CheckpointMonitor, DatasetBuilder, DetectionModel, ZeroBaseline};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

fn main() {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let root = std::env::args().nth(1).unwrap_or_else(|| "data/train".into());
    let steps = 8;

    let mut dataset = DatasetBuilder::new(&root)
        .seed(42)
        .build()
        .expect("Failed to build dataset");
    let grid = dataset.options().grid_size;

    let model = ZeroBaseline { grid };
    let mut monitor = CheckpointMonitor::new();
    for step in 0..steps {
        let batch = dataset.next().expect("Dataset stream ended");
        let (cls_pred, reg_pred) = model.forward(batch.images.view());
        let cls_loss = loss::hinge(batch.cls.view(), cls_pred.view()).expect("Classification loss");
        let reg_loss =
            loss::smooth(batch.merged.view(), reg_pred.view(), 1.0).expect("Regression loss");
        let total = cls_loss + reg_loss;
        log::info!("step {step}: cls {cls_loss:.4} reg {reg_loss:.4} total {total:.4}");
        if let Some(checkpoint) = monitor.observe(step, total) {
            log::info!("new best loss, checkpoint {}", checkpoint.name);
        }
    }
}
