//! Quality Scorer (Tier 3)
//!
//! Assigns a merged record a 0-100 score and a tier.
//!
//! # Scoring Algorithm
//! Additive weights, each counted once when present:
//! - **Identification**: ruc (20), razon_social (20)
//! - **Contact**: direccion (10), telefono (8), email (8), pagina_web (2), redes_sociales (2)
//! - **Representatives** (20): at least one representative with a valid document
//! - **Source diversity** (10): two or more distinct sources contributed
//!
//! The sum is normalized to 0-100 by the total weight (100 with the defaults).
//! Every term is a non-negative presence bonus, so filling a field never
//! lowers the score.
//!
//! # Tiers
//! - Buena: score ≥ 80
//! - Aceptable: score ≥ 50
//! - Parcial: below 50
//!
//! # Verification
//! A record requires human verification unless it is Buena, was not built
//! from the manual form alone, and carries no manual value left
//! unconfirmed by an automated source.

use crate::fusion::{FuenteDatos, MergedRecord};
use crate::types::CampoEmpresa;
use crate::validators::documents;
use serde::{Deserialize, Serialize};
use tracing::debug;
use valoriza_common::config::PesosConfig;

/// Quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Parcial,
    Aceptable,
    Buena,
}

/// Per-item weights
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWeights {
    pub ruc: f64,
    pub razon_social: f64,
    pub direccion: f64,
    pub telefono: f64,
    pub email: f64,
    pub pagina_web: f64,
    pub redes_sociales: f64,
    pub representantes: f64,
    pub diversidad_fuentes: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::from(&PesosConfig::default())
    }
}

impl From<&PesosConfig> for ScoringWeights {
    fn from(pesos: &PesosConfig) -> Self {
        Self {
            ruc: pesos.ruc,
            razon_social: pesos.razon_social,
            direccion: pesos.direccion,
            telefono: pesos.telefono,
            email: pesos.email,
            pagina_web: pesos.pagina_web,
            redes_sociales: pesos.redes_sociales,
            representantes: pesos.representantes,
            diversidad_fuentes: pesos.diversidad_fuentes,
        }
    }
}

impl ScoringWeights {
    pub fn total(&self) -> f64 {
        self.ruc
            + self.razon_social
            + self.direccion
            + self.telefono
            + self.email
            + self.pagina_web
            + self.redes_sociales
            + self.representantes
            + self.diversidad_fuentes
    }

    fn field_weights(&self) -> [(CampoEmpresa, f64); 7] {
        [
            (CampoEmpresa::Ruc, self.ruc),
            (CampoEmpresa::RazonSocial, self.razon_social),
            (CampoEmpresa::Direccion, self.direccion),
            (CampoEmpresa::Telefono, self.telefono),
            (CampoEmpresa::Email, self.email),
            (CampoEmpresa::PaginaWeb, self.pagina_web),
            (CampoEmpresa::RedesSociales, self.redes_sociales),
        ]
    }
}

/// Tier boundaries (inclusive lower bounds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    pub buena: f64,
    pub aceptable: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            buena: 80.0,
            aceptable: 50.0,
        }
    }
}

impl TierThresholds {
    pub fn tier_for(&self, score: f64) -> Tier {
        if score >= self.buena {
            Tier::Buena
        } else if score >= self.aceptable {
            Tier::Aceptable
        } else {
            Tier::Parcial
        }
    }
}

/// Score per dimension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub identificacion: f64,
    pub contacto: f64,
    pub representantes: f64,
    pub diversidad: f64,
}

/// Scorer output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// 0-100
    pub score: f64,
    pub tier: Tier,
    pub requiere_verificacion: bool,
    pub breakdown: ScoreBreakdown,
    /// Scored items that contributed nothing
    pub faltantes: Vec<String>,
}

/// Quality Scorer
pub struct QualityScorer {
    weights: ScoringWeights,
    thresholds: TierThresholds,
}

impl QualityScorer {
    /// Create scorer with default weights and thresholds
    pub fn new() -> Self {
        Self {
            weights: ScoringWeights::default(),
            thresholds: TierThresholds::default(),
        }
    }

    /// Create scorer with custom weights and thresholds
    pub fn with_thresholds(weights: ScoringWeights, thresholds: TierThresholds) -> Self {
        Self { weights, thresholds }
    }

    pub fn thresholds(&self) -> TierThresholds {
        self.thresholds
    }

    /// Score a merged record
    pub fn score(&self, record: &MergedRecord) -> QualityAssessment {
        let mut breakdown = ScoreBreakdown::default();
        let mut faltantes = Vec::new();

        for (campo, weight) in self.weights.field_weights() {
            if record.has(campo) {
                match campo {
                    CampoEmpresa::Ruc | CampoEmpresa::RazonSocial => breakdown.identificacion += weight,
                    _ => breakdown.contacto += weight,
                }
            } else {
                faltantes.push(campo.as_str().to_string());
            }
        }

        let documented = record
            .representantes
            .iter()
            .any(|r| documents::documento_valido(&r.tipo_documento, &r.numero_documento));
        if documented {
            breakdown.representantes = self.weights.representantes;
        } else {
            faltantes.push("representantes".to_string());
        }

        if record.fuentes_consultadas.len() >= 2 {
            breakdown.diversidad = self.weights.diversidad_fuentes;
        } else {
            faltantes.push("diversidad_fuentes".to_string());
        }

        let raw = breakdown.identificacion + breakdown.contacto + breakdown.representantes + breakdown.diversidad;
        let total = self.weights.total();
        let score = if total > 0.0 {
            (raw * 100.0 / total).clamp(0.0, 100.0)
        } else {
            0.0
        };
        let tier = self.thresholds.tier_for(score);

        let requiere_verificacion = tier != Tier::Buena
            || record.fuente_datos() == Some(FuenteDatos::Manual)
            || record.has_unconfirmed_manual_data();

        debug!(
            score,
            tier = ?tier,
            identificacion = breakdown.identificacion,
            contacto = breakdown.contacto,
            representantes = breakdown.representantes,
            diversidad = breakdown.diversidad,
            requiere_verificacion,
            "Quality scoring complete"
        );

        QualityAssessment {
            score,
            tier,
            requiere_verificacion,
            breakdown,
            faltantes,
        }
    }
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::FieldProvenance;
    use crate::types::{Fuente, Representante};

    fn complete_sunat_record() -> MergedRecord {
        let mut record = MergedRecord::template("20100070970");
        record.razon_social = Some("CONSTRUCTORA ANDINA S.A.C.".to_string());
        record.direccion = Some("AV. JAVIER PRADO 123".to_string());
        record.telefono = Some("987654321".to_string());
        record.email = Some("contacto@andina.pe".to_string());
        record.pagina_web = Some("https://andina.pe".to_string());
        record.redes_sociales = Some("facebook.com/andina".to_string());
        record.representantes = vec![Representante {
            fuente: Some(Fuente::Sunat),
            corroborado: true,
            ..Representante::new("PEREZ JUAN", "GERENTE", "DNI", "45678901").principal()
        }];
        record.fuentes_consultadas.insert(Fuente::Sunat);
        record
    }

    #[test]
    fn test_default_weights_sum_to_100() {
        assert_eq!(ScoringWeights::default().total(), 100.0);
    }

    #[test]
    fn test_complete_single_source_is_buena() {
        let assessment = QualityScorer::new().score(&complete_sunat_record());

        assert_eq!(assessment.score, 90.0);
        assert_eq!(assessment.tier, Tier::Buena);
        assert!(!assessment.requiere_verificacion);
        assert_eq!(assessment.faltantes, vec!["diversidad_fuentes"]);
        assert_eq!(assessment.breakdown.identificacion, 40.0);
    }

    #[test]
    fn test_empty_record_is_parcial() {
        let assessment = QualityScorer::new().score(&MergedRecord::default());

        assert_eq!(assessment.score, 0.0);
        assert_eq!(assessment.tier, Tier::Parcial);
        assert!(assessment.requiere_verificacion);
    }

    #[test]
    fn test_undocumented_representatives_do_not_count() {
        let mut record = complete_sunat_record();
        record.representantes[0].numero_documento = "123".to_string();

        let assessment = QualityScorer::new().score(&record);
        assert_eq!(assessment.score, 70.0);
        assert_eq!(assessment.tier, Tier::Aceptable);
        assert!(assessment.requiere_verificacion);
    }

    #[test]
    fn test_unconfirmed_manual_field_requires_verification() {
        let mut record = complete_sunat_record();
        record.fuentes_consultadas.insert(Fuente::Manual);
        record.procedencia.insert(
            CampoEmpresa::Telefono,
            FieldProvenance {
                fuente: Fuente::Manual,
                corroborado_por: vec![],
            },
        );

        let assessment = QualityScorer::new().score(&record);
        assert_eq!(assessment.score, 100.0);
        assert_eq!(assessment.tier, Tier::Buena);
        assert!(assessment.requiere_verificacion);
    }

    #[test]
    fn test_filling_fields_never_lowers_score() {
        let scorer = QualityScorer::new();
        let mut record = MergedRecord::default();
        let mut previous = scorer.score(&record).score;

        let steps: Vec<Box<dyn Fn(&mut MergedRecord)>> = vec![
            Box::new(|r| r.ruc = Some("20100070970".into())),
            Box::new(|r| r.email = Some("a@b.pe".into())),
            Box::new(|r| {
                r.representantes
                    .push(Representante::new("X", "GERENTE", "DNI", "45678901"))
            }),
            Box::new(|r| {
                r.fuentes_consultadas.insert(Fuente::Osce);
                r.fuentes_consultadas.insert(Fuente::Sunat);
            }),
            Box::new(|r| r.razon_social = Some("X SAC".into())),
            Box::new(|r| r.estado = Some("ACTIVO".into())),
        ];

        for step in steps {
            step(&mut record);
            let current = scorer.score(&record).score;
            assert!(current >= previous, "{} < {}", current, previous);
            previous = current;
        }
    }

    #[test]
    fn test_custom_thresholds() {
        let scorer = QualityScorer::with_thresholds(
            ScoringWeights::default(),
            TierThresholds {
                buena: 95.0,
                aceptable: 60.0,
            },
        );
        assert_eq!(scorer.score(&complete_sunat_record()).tier, Tier::Aceptable);
    }
}
