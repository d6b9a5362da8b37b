//! Manual fallback guidance
//!
//! Whenever a decision is not AUTOMATIC, the caller gets a [`FallbackPlan`]:
//! why automation fell short ([`MotivoFallback`]) and what the operator
//! should do next ([`AccionFallback`]).
//!
//! ```text
//! RUC malformed ─────────────────────────────────► RUC_INVALIDO
//! no automated data ─┬─ source errors/timeouts ──► ERRORES_SCRAPING
//!                    └─ otherwise ───────────────► SIN_DATOS_ENCONTRADOS
//! automated data ─┬─ no RUC or razón social ─────► DATOS_CRITICOS_FALTANTES
//!                 ├─ no dirección/representantes/estado ► CALIDAD_DATOS_INSUFICIENTE
//!                 ├─ violations ─────────────────► VALIDACION_FALLIDA
//!                 ├─ a source timed out ─────────► ERROR_CRITICO_SCRAPING
//!                 ├─ below BUENA or only PARTIAL ► CALIDAD_DATOS_INSUFICIENTE
//!                 └─ manual data merged ─────────► DATOS_MANUALES_APORTADOS
//! ```

use crate::fusion::MergedRecord;
use crate::types::{CampoEmpresa, FailureKind, RawSourceResult};
use crate::validators::{Violation, ViolationCode};
use crate::workflow::SettledSources;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Why the record could not be created automatically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotivoFallback {
    RucInvalido,
    /// Every source answered, none had the RUC
    SinDatosEncontrados,
    /// No data, and at least one source broke or timed out
    ErroresScraping,
    /// Partial data while a source timed out
    ErrorCriticoScraping,
    DatosCriticosFaltantes,
    CalidadDatosInsuficiente,
    ValidacionFallida,
    /// Automated data is good; the manual form contributed on top of it
    DatosManualesAportados,
}

/// What the operator should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccionFallback {
    PlantillaVacia,
    PlantillaPrellenada,
    ComplementarDatosManuales,
    EntradaManualCompleta,
    VerificarDatosManuales,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackPlan {
    pub motivo: MotivoFallback,
    pub accion: AccionFallback,
    /// Critical fields (razón social, dirección, representantes) still missing,
    /// then any field with a violation
    pub campos_criticos_faltantes: Vec<String>,
    /// Share of the core fields present, 0.0-1.0
    pub completitud_estimada: f64,
}

const CAMPOS_CRITICOS: [CampoEmpresa; 2] = [CampoEmpresa::RazonSocial, CampoEmpresa::Direccion];

const CAMPOS_COMPLETITUD: [CampoEmpresa; 5] = [
    CampoEmpresa::RazonSocial,
    CampoEmpresa::Estado,
    CampoEmpresa::Email,
    CampoEmpresa::Telefono,
    CampoEmpresa::Direccion,
];

/// Builds a [`FallbackPlan`] from a settled consolidation
#[derive(Debug, Clone, Copy)]
pub struct FallbackAdvisor {
    buena_threshold: f64,
}

impl FallbackAdvisor {
    pub fn new(buena_threshold: f64) -> Self {
        Self { buena_threshold }
    }

    pub fn plan(
        &self,
        results: &[RawSourceResult],
        record: &MergedRecord,
        violations: &[Violation],
        settled: SettledSources,
    ) -> FallbackPlan {
        let motivo = self.motivo(results, record, violations, &settled);
        let accion = accion_for(motivo, record, settled.manual_supplied);

        let mut campos_criticos_faltantes: Vec<String> = CAMPOS_CRITICOS
            .iter()
            .filter(|c| !record.has(**c))
            .map(|c| c.as_str().to_string())
            .collect();
        if !has_usable_representante(record) {
            campos_criticos_faltantes.push("representantes".to_string());
        }
        for violation in violations {
            if !campos_criticos_faltantes.contains(&violation.campo) {
                campos_criticos_faltantes.push(violation.campo.clone());
            }
        }

        let plan = FallbackPlan {
            motivo,
            accion,
            campos_criticos_faltantes,
            completitud_estimada: completitud(record),
        };
        debug!(
            motivo = ?plan.motivo,
            accion = ?plan.accion,
            completitud = plan.completitud_estimada,
            "Fallback plan built"
        );
        plan
    }

    fn motivo(
        &self,
        results: &[RawSourceResult],
        record: &MergedRecord,
        violations: &[Violation],
        settled: &SettledSources,
    ) -> MotivoFallback {
        if violations.iter().any(|v| v.codigo == ViolationCode::RucInvalido) {
            return MotivoFallback::RucInvalido;
        }

        let automated_failures = || {
            results
                .iter()
                .filter(|r| r.source.is_automated())
                .filter_map(|r| r.failure)
        };

        if !settled.automated_data {
            return if automated_failures().any(|k| k != FailureKind::NotFound) {
                MotivoFallback::ErroresScraping
            } else {
                MotivoFallback::SinDatosEncontrados
            };
        }

        if !record.has(CampoEmpresa::Ruc) || !record.has(CampoEmpresa::RazonSocial) {
            MotivoFallback::DatosCriticosFaltantes
        } else if !record.has(CampoEmpresa::Direccion)
            && !record.has(CampoEmpresa::Estado)
            && record.representantes.is_empty()
        {
            MotivoFallback::CalidadDatosInsuficiente
        } else if !violations.is_empty() {
            MotivoFallback::ValidacionFallida
        } else if automated_failures().any(|k| k == FailureKind::Timeout) {
            MotivoFallback::ErrorCriticoScraping
        } else if !settled.automated_success || settled.score < self.buena_threshold {
            MotivoFallback::CalidadDatosInsuficiente
        } else if settled.manual_supplied {
            MotivoFallback::DatosManualesAportados
        } else {
            MotivoFallback::CalidadDatosInsuficiente
        }
    }
}

fn accion_for(motivo: MotivoFallback, record: &MergedRecord, manual_supplied: bool) -> AccionFallback {
    let plantilla = if record.is_empty() {
        AccionFallback::PlantillaVacia
    } else {
        AccionFallback::PlantillaPrellenada
    };

    match motivo {
        MotivoFallback::RucInvalido => plantilla,
        MotivoFallback::SinDatosEncontrados | MotivoFallback::ErroresScraping if manual_supplied => {
            AccionFallback::VerificarDatosManuales
        }
        MotivoFallback::SinDatosEncontrados => plantilla,
        MotivoFallback::ErroresScraping => AccionFallback::EntradaManualCompleta,
        MotivoFallback::ErrorCriticoScraping => AccionFallback::PlantillaPrellenada,
        MotivoFallback::DatosCriticosFaltantes
        | MotivoFallback::CalidadDatosInsuficiente
        | MotivoFallback::ValidacionFallida => AccionFallback::ComplementarDatosManuales,
        MotivoFallback::DatosManualesAportados => AccionFallback::VerificarDatosManuales,
    }
}

/// First representative carries a name and a document number
fn has_usable_representante(record: &MergedRecord) -> bool {
    record
        .representantes
        .first()
        .map(|r| !r.nombre.trim().is_empty() && !r.numero_documento.trim().is_empty())
        .unwrap_or(false)
}

fn completitud(record: &MergedRecord) -> f64 {
    let total = CAMPOS_COMPLETITUD.len() + 1;
    let present = CAMPOS_COMPLETITUD.iter().filter(|c| record.has(**c)).count()
        + usize::from(has_usable_representante(record));
    present as f64 / total as f64
}
