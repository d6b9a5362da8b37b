//! Consolidation workflow
//!
//! Drives one RUC through the pipeline:
//! 1. Query every configured source concurrently (Tier 1)
//! 2. Merge the results field by field (Tier 2)
//! 3. Score, select the creation mode and validate (Tier 3)
//! 4. Optionally persist the accepted record
//!
//! The orchestrator always answers with a [`CreationDecision`]; source
//! failures, validation failures and persistence conflicts are reported
//! inside it, never raised.

pub mod fallback;
pub mod mode_selector;
pub mod orchestrator;

pub use fallback::{AccionFallback, FallbackAdvisor, FallbackPlan, MotivoFallback};
pub use mode_selector::{CreationMode, ModeError, ModeEvent, ModeSelector, ModeState, SettledSources};
pub use orchestrator::{ConsolidationOrchestrator, RucCheck};

use crate::fusion::{FuenteDatos, MergedRecord};
use crate::sources::ManualInput;
use crate::types::{Fuente, RawSourceResult, SourceStatus};
use crate::validators::{Advertencia, QualityAssessment, ValidationPolicy, Violation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One consolidation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationRequest {
    pub ruc: String,
    #[serde(default)]
    pub manual: Option<ManualInput>,
    /// Store the record when it is accepted
    #[serde(default)]
    pub persistir: bool,
    /// Rank MANUAL ahead of the automated sources
    #[serde(default)]
    pub priorizar_manual: bool,
    #[serde(default)]
    pub validacion_estricta: bool,
    #[serde(default = "default_true")]
    pub permitir_datos_parciales: bool,
}

fn default_true() -> bool {
    true
}

impl ConsolidationRequest {
    pub fn new(ruc: impl Into<String>) -> Self {
        Self {
            ruc: ruc.into(),
            manual: None,
            persistir: false,
            priorizar_manual: false,
            validacion_estricta: false,
            permitir_datos_parciales: true,
        }
    }

    pub fn with_manual(mut self, manual: ManualInput) -> Self {
        self.manual = Some(manual);
        self
    }

    pub fn persist(mut self) -> Self {
        self.persistir = true;
        self
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            estricta: self.validacion_estricta,
            permitir_parciales: self.permitir_datos_parciales,
        }
    }
}

/// Per-source outcome as reported in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceOutcome {
    Success,
    Partial,
    Failed,
    Timeout,
    /// Not queried (malformed RUC)
    Skipped,
}

impl From<SourceStatus> for SourceOutcome {
    fn from(status: SourceStatus) -> Self {
        match status {
            SourceStatus::Success => Self::Success,
            SourceStatus::Partial => Self::Partial,
            SourceStatus::Failed => Self::Failed,
            SourceStatus::Timeout => Self::Timeout,
        }
    }
}

/// Persistence result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resultado", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersistenceOutcome {
    NotAttempted,
    Stored { id: Uuid },
    Conflict { ruc: String },
    Failed { mensaje: String },
}

/// Diagnostic entry
///
/// Ordered: one per source, then validation entries, then persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tipo", rename_all = "snake_case")]
pub enum Diagnostic {
    Source {
        fuente: Fuente,
        estado: SourceOutcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        intentos: u32,
    },
    Validation(Violation),
    Persistence { outcome: PersistenceOutcome },
}

impl Diagnostic {
    pub fn from_result(result: &RawSourceResult) -> Self {
        Self::Source {
            fuente: result.source,
            estado: result.status.into(),
            error: result.error.clone(),
            intentos: result.attempts,
        }
    }

    pub fn skipped(fuente: Fuente) -> Self {
        Self::Source {
            fuente,
            estado: SourceOutcome::Skipped,
            error: None,
            intentos: 0,
        }
    }
}

/// Caller-facing classification of a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// Accepted, not persisted
    Ready,
    Stored,
    /// No data from any source
    AwaitingManual,
    ValidationFailed,
    PersistenceConflict,
    PersistenceFailed,
}

/// Pipeline answer for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationDecision {
    pub ruc: String,
    pub mode: CreationMode,
    pub state: ModeState,
    pub fuente_datos: Option<FuenteDatos>,
    pub record: MergedRecord,
    pub assessment: QualityAssessment,
    pub violations: Vec<Violation>,
    pub advertencias: Vec<Advertencia>,
    pub persistence: PersistenceOutcome,
    pub diagnostics: Vec<Diagnostic>,
    /// Set whenever the mode is not AUTOMATIC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackPlan>,
}

impl CreationDecision {
    pub fn outcome(&self) -> DecisionOutcome {
        match &self.persistence {
            PersistenceOutcome::Stored { .. } => DecisionOutcome::Stored,
            PersistenceOutcome::Conflict { .. } => DecisionOutcome::PersistenceConflict,
            PersistenceOutcome::Failed { .. } => DecisionOutcome::PersistenceFailed,
            PersistenceOutcome::NotAttempted if !self.violations.is_empty() => {
                DecisionOutcome::ValidationFailed
            }
            PersistenceOutcome::NotAttempted if self.mode == CreationMode::ManualRequired => {
                DecisionOutcome::AwaitingManual
            }
            PersistenceOutcome::NotAttempted => DecisionOutcome::Ready,
        }
    }

    /// Diagnostic entry for one source, if it was configured
    pub fn source_diagnostic(&self, fuente: Fuente) -> Option<&Diagnostic> {
        self.diagnostics
            .iter()
            .find(|d| matches!(d, Diagnostic::Source { fuente: f, .. } if *f == fuente))
    }
}
