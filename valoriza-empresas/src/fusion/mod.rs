// Fusion Module - Tier 2 of the consolidation pipeline
//
// Architecture: Tier 1 (Source adapters) → Tier 2 (Field merger) → Tier 3 (Scorer, Validator)

pub mod field_merger;

pub use field_merger::{FieldMerger, MergePolicy};

use crate::types::{CampoEmpresa, FieldKind, FieldValue, Fuente, Representante};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Origin classification of a consolidated record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FuenteDatos {
    /// Only automated sources contributed
    Scraping,
    /// Only the manual form contributed
    Manual,
    /// Both automated sources and the manual form contributed
    Mixto,
}

/// Which source supplied a field and which others agreed with it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub fuente: Fuente,
    /// Lower-priority sources that reported an equivalent value
    pub corroborado_por: Vec<Fuente>,
}

impl FieldProvenance {
    /// Winner is automated, or an automated source reported the same value
    pub fn is_confirmed_by_automation(&self) -> bool {
        self.fuente.is_automated() || self.corroborado_por.iter().any(|f| f.is_automated())
    }
}

/// Conflict between sources on one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub campo: CampoEmpresa,
    pub fuente_elegida: Fuente,
    pub valor_elegido: String,
    pub fuente_descartada: Fuente,
    pub valor_descartado: String,
    /// Normalized Levenshtein similarity between the two values (0.0-1.0)
    pub similitud: f64,
}

/// Consolidated empresa record
///
/// Built only by [`FieldMerger::merge`] (or [`MergedRecord::template`]) and
/// read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub ruc: Option<String>,
    pub razon_social: Option<String>,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub pagina_web: Option<String>,
    pub redes_sociales: Option<String>,
    pub estado: Option<String>,
    pub departamento: Option<String>,
    pub provincia: Option<String>,
    pub distrito: Option<String>,
    pub especialidades: Vec<String>,
    pub capital_social: Option<f64>,
    pub representantes: Vec<Representante>,
    /// Every source that offered at least one non-empty value
    pub fuentes_consultadas: BTreeSet<Fuente>,
    pub procedencia: BTreeMap<CampoEmpresa, FieldProvenance>,
    pub conflictos: Vec<ConflictReport>,
}

impl MergedRecord {
    /// Empty record carrying only the requested RUC, handed to the manual form
    pub fn template(ruc: &str) -> Self {
        Self {
            ruc: Some(ruc.trim().to_string()),
            ..Default::default()
        }
    }

    /// Current value of a field, if set
    pub fn get(&self, campo: CampoEmpresa) -> Option<FieldValue> {
        match campo {
            CampoEmpresa::Especialidades => {
                Some(FieldValue::List(self.especialidades.clone())).filter(|v| !v.is_empty())
            }
            CampoEmpresa::CapitalSocial => self.capital_social.map(FieldValue::Number),
            text => self.text_slot(text).and_then(|s| s.clone()).map(FieldValue::Text),
        }
    }

    pub fn has(&self, campo: CampoEmpresa) -> bool {
        self.get(campo).is_some()
    }

    /// Store a value already coerced to the field's kind
    ///
    /// Returns false (and leaves the record untouched) when the value does
    /// not match the field's kind.
    pub(crate) fn set(&mut self, campo: CampoEmpresa, value: FieldValue) -> bool {
        match (campo.kind(), value) {
            (FieldKind::List, FieldValue::List(items)) => {
                self.especialidades = items;
                true
            }
            (FieldKind::Number, FieldValue::Number(n)) => {
                self.capital_social = Some(n);
                true
            }
            (FieldKind::Text, FieldValue::Text(s)) => match self.text_slot_mut(campo) {
                Some(slot) => {
                    *slot = Some(s);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    fn text_slot(&self, campo: CampoEmpresa) -> Option<&Option<String>> {
        Some(match campo {
            CampoEmpresa::Ruc => &self.ruc,
            CampoEmpresa::RazonSocial => &self.razon_social,
            CampoEmpresa::Email => &self.email,
            CampoEmpresa::Telefono => &self.telefono,
            CampoEmpresa::Direccion => &self.direccion,
            CampoEmpresa::PaginaWeb => &self.pagina_web,
            CampoEmpresa::RedesSociales => &self.redes_sociales,
            CampoEmpresa::Estado => &self.estado,
            CampoEmpresa::Departamento => &self.departamento,
            CampoEmpresa::Provincia => &self.provincia,
            CampoEmpresa::Distrito => &self.distrito,
            CampoEmpresa::Especialidades | CampoEmpresa::CapitalSocial => return None,
        })
    }

    fn text_slot_mut(&mut self, campo: CampoEmpresa) -> Option<&mut Option<String>> {
        Some(match campo {
            CampoEmpresa::Ruc => &mut self.ruc,
            CampoEmpresa::RazonSocial => &mut self.razon_social,
            CampoEmpresa::Email => &mut self.email,
            CampoEmpresa::Telefono => &mut self.telefono,
            CampoEmpresa::Direccion => &mut self.direccion,
            CampoEmpresa::PaginaWeb => &mut self.pagina_web,
            CampoEmpresa::RedesSociales => &mut self.redes_sociales,
            CampoEmpresa::Estado => &mut self.estado,
            CampoEmpresa::Departamento => &mut self.departamento,
            CampoEmpresa::Provincia => &mut self.provincia,
            CampoEmpresa::Distrito => &mut self.distrito,
            CampoEmpresa::Especialidades | CampoEmpresa::CapitalSocial => return None,
        })
    }

    /// Derived from `fuentes_consultadas`; `None` when no source contributed
    pub fn fuente_datos(&self) -> Option<FuenteDatos> {
        let manual = self.fuentes_consultadas.contains(&Fuente::Manual);
        let automated = self.fuentes_consultadas.iter().any(|f| f.is_automated());
        match (automated, manual) {
            (true, true) => Some(FuenteDatos::Mixto),
            (true, false) => Some(FuenteDatos::Scraping),
            (false, true) => Some(FuenteDatos::Manual),
            (false, false) => None,
        }
    }

    /// No field and no representative set (the RUC alone does not count)
    pub fn is_empty(&self) -> bool {
        CampoEmpresa::ALL
            .iter()
            .filter(|c| **c != CampoEmpresa::Ruc)
            .all(|c| !self.has(*c))
            && self.representantes.is_empty()
    }

    /// Some field or representative won from MANUAL without automated agreement
    pub fn has_unconfirmed_manual_data(&self) -> bool {
        let fields = self
            .procedencia
            .values()
            .any(|p| p.fuente == Fuente::Manual && !p.is_confirmed_by_automation());
        let representantes = self
            .representantes
            .iter()
            .any(|r| r.fuente == Some(Fuente::Manual) && !r.corroborado);
        fields || representantes
    }

    /// Index of every representative flagged principal
    pub fn principal_indices(&self) -> Vec<usize> {
        self.representantes
            .iter()
            .enumerate()
            .filter(|(_, r)| r.es_principal)
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_only_carries_ruc() {
        let record = MergedRecord::template(" 20100070970 ");
        assert_eq!(record.ruc.as_deref(), Some("20100070970"));
        assert!(record.is_empty());
        assert_eq!(record.fuente_datos(), None);
    }

    #[test]
    fn test_set_rejects_kind_mismatch() {
        let mut record = MergedRecord::default();
        assert!(!record.set(CampoEmpresa::CapitalSocial, FieldValue::from("mil")));
        assert!(!record.set(CampoEmpresa::Email, FieldValue::Number(3.0)));
        assert!(record.set(CampoEmpresa::Email, FieldValue::from("a@b.pe")));
        assert_eq!(record.get(CampoEmpresa::Email), Some(FieldValue::from("a@b.pe")));
        assert_eq!(record.capital_social, None);
    }

    #[test]
    fn test_fuente_datos_derivation() {
        let mut record = MergedRecord::default();
        record.fuentes_consultadas.insert(Fuente::Osce);
        assert_eq!(record.fuente_datos(), Some(FuenteDatos::Scraping));
        record.fuentes_consultadas.insert(Fuente::Manual);
        assert_eq!(record.fuente_datos(), Some(FuenteDatos::Mixto));
        record.fuentes_consultadas.remove(&Fuente::Osce);
        assert_eq!(record.fuente_datos(), Some(FuenteDatos::Manual));
    }

    #[test]
    fn test_unconfirmed_manual_data() {
        let mut record = MergedRecord::default();
        record.procedencia.insert(
            CampoEmpresa::Email,
            FieldProvenance {
                fuente: Fuente::Manual,
                corroborado_por: vec![Fuente::Osce],
            },
        );
        assert!(!record.has_unconfirmed_manual_data());

        record.procedencia.insert(
            CampoEmpresa::Telefono,
            FieldProvenance {
                fuente: Fuente::Manual,
                corroborado_por: vec![],
            },
        );
        assert!(record.has_unconfirmed_manual_data());
    }
}
