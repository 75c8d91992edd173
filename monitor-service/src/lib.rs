pub mod backfill;
pub mod monitor;
pub mod processor;

pub use backfill::{backfill_thread, BackfillReport};
pub use monitor::{shutdown_on, CycleReport, MonitorSettings, ThreadMonitor};
pub use processor::{PostOutcome, PostProcessor, ProcessorSettings};
