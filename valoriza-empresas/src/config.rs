//! Pipeline configuration
//!
//! Built once from the `[consolidacion]` TOML section and passed explicitly
//! to the orchestrator; the pipeline never reads the environment.

use crate::fusion::MergePolicy;
use crate::sources::RetryPolicy;
use crate::types::Fuente;
use crate::validators::{ScoringWeights, TierThresholds};
use std::time::Duration;
use valoriza_common::config::ConsolidacionConfig;
use valoriza_common::{Error, Result};

/// Upper bound for either retry count
pub const MAX_REINTENTOS: u32 = 5;

/// Consolidation pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidationConfig {
    /// Source priority, highest first
    pub priority: Vec<Fuente>,
    /// Per-call adapter deadline
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub weights: ScoringWeights,
    pub thresholds: TierThresholds,
    pub name_similarity_threshold: f64,
    pub promote_first_principal: bool,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            priority: vec![Fuente::Sunat, Fuente::Osce, Fuente::Manual],
            timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            weights: ScoringWeights::default(),
            thresholds: TierThresholds::default(),
            name_similarity_threshold: 0.85,
            promote_first_principal: true,
        }
    }
}

impl ConsolidationConfig {
    /// Validate and convert the TOML section
    pub fn from_toml(section: &ConsolidacionConfig) -> Result<Self> {
        let mut priority = Vec::with_capacity(section.prioridad.len());
        for name in &section.prioridad {
            let fuente: Fuente = name.parse().map_err(Error::Config)?;
            if priority.contains(&fuente) {
                return Err(Error::Config(format!("Fuente repetida en prioridad: {}", fuente)));
            }
            priority.push(fuente);
        }
        if priority.is_empty() {
            return Err(Error::Config("prioridad no puede estar vacía".to_string()));
        }

        if section.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms debe ser mayor que 0".to_string()));
        }

        let thresholds = TierThresholds {
            buena: section.umbral_buena,
            aceptable: section.umbral_aceptable,
        };
        if !(0.0..=100.0).contains(&thresholds.aceptable)
            || !(0.0..=100.0).contains(&thresholds.buena)
            || thresholds.aceptable > thresholds.buena
        {
            return Err(Error::Config(format!(
                "Umbrales inválidos: aceptable={} buena={} (0 ≤ aceptable ≤ buena ≤ 100)",
                thresholds.aceptable, thresholds.buena
            )));
        }

        if !(section.umbral_similitud_nombre > 0.0 && section.umbral_similitud_nombre <= 1.0) {
            return Err(Error::Config(format!(
                "umbral_similitud_nombre fuera de rango (0, 1]: {}",
                section.umbral_similitud_nombre
            )));
        }

        for (clave, valor) in [
            ("reintentos_timeout", section.reintentos_timeout),
            ("reintentos_fallo", section.reintentos_fallo),
        ] {
            if valor > MAX_REINTENTOS {
                return Err(Error::Config(format!(
                    "{} = {} excede el máximo de {}",
                    clave, valor, MAX_REINTENTOS
                )));
            }
        }

        let weights = ScoringWeights::from(&section.pesos);
        if weights.total() <= 0.0 {
            return Err(Error::Config("La suma de pesos debe ser positiva".to_string()));
        }

        Ok(Self {
            priority,
            timeout: Duration::from_millis(section.timeout_ms),
            retry: RetryPolicy {
                on_timeout: section.reintentos_timeout,
                on_failure: section.reintentos_fallo,
            },
            weights,
            thresholds,
            name_similarity_threshold: section.umbral_similitud_nombre,
            promote_first_principal: section.promover_primer_principal,
        })
    }

    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy {
            priority: self.priority.clone(),
            name_similarity_threshold: self.name_similarity_threshold,
            promote_first_principal: self.promote_first_principal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_toml_defaults() {
        let config = ConsolidationConfig::from_toml(&ConsolidacionConfig::default()).unwrap();
        assert_eq!(config, ConsolidationConfig::default());
    }

    #[test]
    fn test_custom_priority() {
        let section = ConsolidacionConfig {
            prioridad: vec!["osce".to_string(), "MANUAL".to_string(), "SUNAT".to_string()],
            ..Default::default()
        };
        let config = ConsolidationConfig::from_toml(&section).unwrap();
        assert_eq!(config.priority, vec![Fuente::Osce, Fuente::Manual, Fuente::Sunat]);
        assert_eq!(config.merge_policy().priority, config.priority);
    }

    #[test]
    fn test_rejects_bad_sections() {
        let bad = [
            ConsolidacionConfig {
                prioridad: vec!["SUNAT".to_string(), "SUNAT".to_string()],
                ..Default::default()
            },
            ConsolidacionConfig {
                prioridad: vec!["RENIEC".to_string()],
                ..Default::default()
            },
            ConsolidacionConfig {
                umbral_buena: 40.0,
                umbral_aceptable: 60.0,
                ..Default::default()
            },
            ConsolidacionConfig {
                timeout_ms: 0,
                ..Default::default()
            },
            ConsolidacionConfig {
                umbral_similitud_nombre: 1.5,
                ..Default::default()
            },
            ConsolidacionConfig {
                reintentos_timeout: MAX_REINTENTOS + 1,
                ..Default::default()
            },
            ConsolidacionConfig {
                reintentos_fallo: u32::MAX,
                ..Default::default()
            },
        ];
        for section in bad {
            assert!(
                matches!(ConsolidationConfig::from_toml(&section), Err(Error::Config(_))),
                "{:?}",
                section
            );
        }
    }

    #[test]
    fn test_retry_cap_is_inclusive() {
        let section = ConsolidacionConfig {
            reintentos_timeout: MAX_REINTENTOS,
            reintentos_fallo: MAX_REINTENTOS,
            ..Default::default()
        };
        let config = ConsolidationConfig::from_toml(&section).unwrap();
        assert_eq!(config.retry.on_timeout, MAX_REINTENTOS);
        assert_eq!(config.retry.on_failure, MAX_REINTENTOS);
    }
}
