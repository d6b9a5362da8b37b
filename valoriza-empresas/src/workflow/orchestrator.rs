//! Consolidation orchestrator
//!
//! # Flow
//! ```text
//! RUC check ─┬─ malformed ──────────────────────────────► MANUAL_REQUIRED (sources SKIPPED)
//!            └─ ok ─► fan-out ─► merge ─► score ─► select
//!                                                    ├─ AWAITING_MANUAL ─► MANUAL_REQUIRED (template)
//!                                                    └─ ready ─► validate
//!                                                                ├─ violations ─► MANUAL_REQUIRED
//!                                                                └─ accepted ─► persist? ─► decision
//! ```
//!
//! Every decision that is not AUTOMATIC carries a fallback plan.

use crate::config::ConsolidationConfig;
use crate::fusion::{FieldMerger, MergedRecord};
use crate::persistence::{EmpresaPersistible, EmpresaRepository, PersistenceError};
use crate::sources::{SourceAdapter, SourceFanOut};
use crate::types::{CampoEmpresa, FieldKind, FieldValue, RawSourceResult};
use crate::validators::{
    documents, QualityAssessment, QualityScorer, RecordValidator, Violation, ViolationCode,
};
use crate::workflow::{
    ConsolidationRequest, CreationDecision, CreationMode, Diagnostic, FallbackAdvisor, FallbackPlan,
    ModeSelector, ModeState, PersistenceOutcome, SettledSources,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Verdict of [`ConsolidationOrchestrator::validar_ruc`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RucCheck {
    pub ruc: String,
    pub valido: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Already stored in the repository
    pub existe: bool,
    /// Automated data found, not persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vista_previa: Option<MergedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluacion: Option<QualityAssessment>,
    pub errores_fuentes: Vec<String>,
    pub requiere_entrada_manual: bool,
}

/// Consolidation orchestrator
///
/// Holds no per-request state; one instance serves concurrent requests.
pub struct ConsolidationOrchestrator {
    config: ConsolidationConfig,
    fan_out: SourceFanOut,
    scorer: QualityScorer,
    selector: ModeSelector,
    advisor: FallbackAdvisor,
    repository: Option<Arc<dyn EmpresaRepository>>,
}

impl ConsolidationOrchestrator {
    pub fn new(config: ConsolidationConfig, adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        let fan_out = SourceFanOut::new(adapters, config.timeout, config.retry);
        let scorer = QualityScorer::with_thresholds(config.weights.clone(), config.thresholds);
        let selector = ModeSelector::new(config.thresholds.buena);
        let advisor = FallbackAdvisor::new(config.thresholds.buena);
        Self {
            config,
            fan_out,
            scorer,
            selector,
            advisor,
            repository: None,
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn EmpresaRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    fn merger_for(&self, request: &ConsolidationRequest) -> FieldMerger {
        let policy = self.config.merge_policy();
        if request.priorizar_manual {
            FieldMerger::new(policy.with_manual_first())
        } else {
            FieldMerger::new(policy)
        }
    }

    /// Consolidate one RUC
    pub async fn consolidate(&self, request: &ConsolidationRequest) -> CreationDecision {
        let ruc = request.ruc.trim().to_string();
        info!(
            ruc = %ruc,
            manual = request.manual.is_some(),
            persistir = request.persistir,
            "Consolidation started"
        );

        let merger = self.merger_for(request);
        let validator = RecordValidator::with_policy(request.validation_policy());
        let manual_result = request.manual.as_ref().and_then(|m| m.to_raw_result(&ruc));

        if let Err(e) = documents::validar_ruc(&ruc) {
            warn!(ruc = %ruc, error = %e, "Malformed RUC, sources skipped");
            return self.reject_malformed_ruc(ruc, Violation::ruc(&e), &merger, manual_result);
        }

        let mut results = self.fan_out.fetch_all(&ruc).await;
        if let Some(manual) = manual_result {
            results.push(manual);
        }
        let mut diagnostics: Vec<Diagnostic> = results.iter().map(Diagnostic::from_result).collect();

        let record = merger.merge_for(&ruc, &results);
        let assessment = self.scorer.score(&record);
        let settled = SettledSources::from_results(&results, &record, assessment.score);
        let state = self.selector.select(settled);

        if state == ModeState::AwaitingManual {
            let template = MergedRecord::template(&ruc);
            let assessment = self.scorer.score(&template);
            let fallback = self.fallback(&ruc, &results, &template, &[], settled);
            return CreationDecision {
                ruc,
                mode: CreationMode::ManualRequired,
                state,
                fuente_datos: None,
                record: template,
                assessment,
                violations: Vec::new(),
                advertencias: Vec::new(),
                persistence: PersistenceOutcome::NotAttempted,
                diagnostics,
                fallback: Some(fallback),
            };
        }

        let mut violations = validator.validate(&record).into_violations();
        violations.extend(ruc_echo_violations(&ruc, &results));
        let advertencias = validator.advertencias(&record);
        diagnostics.extend(violations.iter().cloned().map(Diagnostic::Validation));

        if !violations.is_empty() {
            warn!(
                ruc = %ruc,
                violations = violations.len(),
                state = ?state,
                "Validation failed, manual correction required"
            );
            let fallback = self.fallback(&ruc, &results, &record, &violations, settled);
            return CreationDecision {
                ruc,
                mode: CreationMode::ManualRequired,
                state,
                fuente_datos: record.fuente_datos(),
                record,
                assessment,
                violations,
                advertencias,
                persistence: PersistenceOutcome::NotAttempted,
                diagnostics,
                fallback: Some(fallback),
            };
        }

        let mode = state.creation_mode().unwrap_or(CreationMode::ManualRequired);
        let fallback = (mode != CreationMode::Automatic)
            .then(|| self.fallback(&ruc, &results, &record, &violations, settled));

        let persistence = if request.persistir {
            let outcome = self.persist(&record, &assessment, mode).await;
            diagnostics.push(Diagnostic::Persistence {
                outcome: outcome.clone(),
            });
            outcome
        } else {
            PersistenceOutcome::NotAttempted
        };

        info!(
            ruc = %ruc,
            mode = ?mode,
            score = assessment.score,
            tier = ?assessment.tier,
            requiere_verificacion = assessment.requiere_verificacion,
            "Consolidation complete"
        );

        CreationDecision {
            ruc,
            mode,
            state,
            fuente_datos: record.fuente_datos(),
            record,
            assessment,
            violations,
            advertencias,
            persistence,
            diagnostics,
            fallback,
        }
    }

    /// Malformed RUC: skip every source, return the manual data (if any) as template
    fn reject_malformed_ruc(
        &self,
        ruc: String,
        violation: Violation,
        merger: &FieldMerger,
        manual_result: Option<RawSourceResult>,
    ) -> CreationDecision {
        let mut diagnostics: Vec<Diagnostic> = self
            .fan_out
            .fuentes()
            .into_iter()
            .map(Diagnostic::skipped)
            .collect();

        let results: Vec<RawSourceResult> = manual_result.into_iter().collect();
        diagnostics.extend(results.iter().map(Diagnostic::from_result));
        let record = merger.merge_for(&ruc, &results);
        diagnostics.push(Diagnostic::Validation(violation.clone()));
        let assessment = self.scorer.score(&record);
        let settled = SettledSources::from_results(&results, &record, assessment.score);
        let fallback = self.fallback(&ruc, &results, &record, std::slice::from_ref(&violation), settled);

        CreationDecision {
            ruc,
            mode: CreationMode::ManualRequired,
            state: ModeState::AwaitingManual,
            fuente_datos: record.fuente_datos(),
            record,
            assessment,
            violations: vec![violation],
            advertencias: Vec::new(),
            persistence: PersistenceOutcome::NotAttempted,
            diagnostics,
            fallback: Some(fallback),
        }
    }

    fn fallback(
        &self,
        ruc: &str,
        results: &[RawSourceResult],
        record: &MergedRecord,
        violations: &[Violation],
        settled: SettledSources,
    ) -> FallbackPlan {
        let plan = self.advisor.plan(results, record, violations, settled);
        info!(
            ruc = %ruc,
            motivo = ?plan.motivo,
            accion = ?plan.accion,
            faltantes = ?plan.campos_criticos_faltantes,
            "Manual fallback required"
        );
        plan
    }

    async fn persist(
        &self,
        record: &MergedRecord,
        assessment: &QualityAssessment,
        mode: CreationMode,
    ) -> PersistenceOutcome {
        let Some(repository) = &self.repository else {
            return PersistenceOutcome::Failed {
                mensaje: "No hay repositorio configurado".to_string(),
            };
        };
        let Some(empresa) = EmpresaPersistible::build(record, assessment, mode) else {
            return PersistenceOutcome::Failed {
                mensaje: "Registro incompleto: faltan RUC, razón social o fuentes".to_string(),
            };
        };

        match repository.save(&empresa).await {
            Ok(id) => PersistenceOutcome::Stored { id },
            Err(PersistenceError::Conflict { ruc }) => {
                warn!(ruc = %ruc, "Empresa already stored");
                PersistenceOutcome::Conflict { ruc }
            }
            Err(e) => {
                warn!(ruc = %empresa.ruc, error = %e, "Persistence failed");
                PersistenceOutcome::Failed {
                    mensaje: e.to_string(),
                }
            }
        }
    }

    /// Check a RUC and preview what the automated sources know about it
    ///
    /// Nothing is persisted. Stored RUCs are not scraped again.
    pub async fn validar_ruc(&self, ruc: &str) -> RucCheck {
        let ruc = ruc.trim().to_string();
        let mut check = RucCheck {
            ruc: ruc.clone(),
            valido: true,
            error: None,
            existe: false,
            vista_previa: None,
            evaluacion: None,
            errores_fuentes: Vec::new(),
            requiere_entrada_manual: false,
        };

        if let Err(e) = documents::validar_ruc(&ruc) {
            check.valido = false;
            check.error = Some(e.to_string());
            return check;
        }

        if let Some(repository) = &self.repository {
            match repository.exists(&ruc).await {
                Ok(existe) => check.existe = existe,
                Err(e) => check.errores_fuentes.push(format!("repositorio: {}", e)),
            }
        }
        if check.existe {
            info!(ruc = %ruc, "RUC already stored, preview skipped");
            return check;
        }

        let results = self.fan_out.fetch_all(&ruc).await;
        check.errores_fuentes.extend(
            results
                .iter()
                .filter(|r| !r.status.carries_data())
                .map(|r| format!("{}: {}", r.source, r.error.as_deref().unwrap_or("sin detalle"))),
        );

        let record = FieldMerger::new(self.config.merge_policy()).merge_for(&ruc, &results);
        if record.is_empty() {
            check.requiere_entrada_manual = true;
        } else {
            check.evaluacion = Some(self.scorer.score(&record));
            check.vista_previa = Some(record);
        }

        info!(
            ruc = %ruc,
            preview = check.vista_previa.is_some(),
            errores = check.errores_fuentes.len(),
            "RUC validation complete"
        );
        check
    }
}

/// Sources that reported a RUC different from the requested one
fn ruc_echo_violations(ruc: &str, results: &[RawSourceResult]) -> Vec<Violation> {
    results
        .iter()
        .filter(|r| r.status.carries_data())
        .filter_map(|r| {
            let reported = match r.field(CampoEmpresa::Ruc)?.coerce(FieldKind::Text)? {
                FieldValue::Text(text) => text,
                _ => return None,
            };
            (reported != ruc).then(|| {
                Violation::new(
                    "ruc",
                    ViolationCode::RucNoCoincide,
                    format!(
                        "{} reportó el RUC {} pero se solicitó {}",
                        r.source, reported, ruc
                    ),
                )
            })
        })
        .collect()
}
