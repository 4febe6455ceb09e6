pub mod dashboard;
pub mod learning;
pub mod maintenance;
pub mod scheduler;
pub mod sequencer;

pub use dashboard::DashboardAssembler;
pub use learning::LearningLoop;
pub use maintenance::{service_for, MaintenanceEngine};
pub use scheduler::{EventStride, LearningScheduler};
pub use sequencer::{classify, DiagnosticSequencer};
