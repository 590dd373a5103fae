//! Application Layer - Wiring the pipeline to feeds and sinks

pub mod dispatcher;
pub mod orchestrator;
pub mod pairing;
pub mod pipeline;
pub mod supervisor;

pub use dispatcher::{DispatchStats, EmissionDispatcher, EmissionHandle};
pub use orchestrator::{PipelineOrchestrator, RunStats};
pub use pairing::{BarPairer, PairingEvent};
pub use pipeline::{BarOutcome, BarUpdate, PairPipeline};
pub use supervisor::{PairReport, PairSupervisor};
