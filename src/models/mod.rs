pub mod sample;

pub use sample::{AgentStatus, CaptureOutcome, IdleMerge, NewSample, Sample, SAMPLE_COLUMNS, UNKNOWN};
