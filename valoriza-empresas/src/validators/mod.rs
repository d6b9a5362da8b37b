// Validators Module - Tier 3 of the consolidation pipeline
//
// Scores the merged record and checks it against field and cross-field rules.

pub mod documents;
pub mod quality_scorer;
pub mod record_validator;

pub use quality_scorer::{QualityAssessment, QualityScorer, ScoreBreakdown, ScoringWeights, Tier, TierThresholds};
pub use record_validator::{
    Advertencia, RecordValidator, ValidationPolicy, ValidationResult, Violation, ViolationCode,
};
