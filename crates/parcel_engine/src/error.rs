use thiserror::Error;

/// Every failure or diagnostic the engine can surface.
///
/// `InvalidGeometry` and `ZeroAreaResult` are reported per record and usually
/// travel in [`crate::Consolidation::diagnostics`]; the remaining kinds abort
/// the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid geometry for parcel {identifier}: {reason}")]
    InvalidGeometry { identifier: String, reason: String },

    #[error("parcel {identifier} has non-positive area {area} after consolidation")]
    ZeroAreaResult { identifier: String, area: f64 },

    #[error("clustering diverged between runs at unit {index} (leader {first} vs {second})")]
    NonDeterministicOrderingDetected {
        index: usize,
        first: usize,
        second: usize,
    },

    #[error("component map covers {components} units but {units} were given")]
    ComponentMismatch { units: usize, components: usize },

    #[error("consolidation run cancelled during {stage}")]
    Cancelled { stage: &'static str },
}

impl EngineError {
    /// Per-record diagnostics never abort a run on their own.
    pub fn is_per_record(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidGeometry { .. } | EngineError::ZeroAreaResult { .. }
        )
    }
}
