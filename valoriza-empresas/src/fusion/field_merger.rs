// Field Merger - Priority-ordered, field-wise selection
//
// For every canonical field the highest-priority source offering a non-empty
// value wins. Disagreeing lower-priority values are kept as conflict reports.
// Representatives are unioned and deduplicated by document number, falling
// back to name similarity when a row has no document.

use crate::fusion::{ConflictReport, FieldProvenance, MergedRecord};
use crate::types::{CampoEmpresa, FieldValue, Fuente, RawSourceResult, Representante};
use tracing::debug;

/// Merge policy
#[derive(Debug, Clone, PartialEq)]
pub struct MergePolicy {
    /// Source priority, highest first. Sources not listed rank last.
    pub priority: Vec<Fuente>,
    /// Normalized Levenshtein similarity at which two undocumented names match
    pub name_similarity_threshold: f64,
    /// Flag the first representative principal when no source flagged one
    pub promote_first_principal: bool,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            priority: vec![Fuente::Sunat, Fuente::Osce, Fuente::Manual],
            name_similarity_threshold: 0.85,
            promote_first_principal: true,
        }
    }
}

impl MergePolicy {
    fn rank(&self, fuente: Fuente) -> usize {
        self.priority
            .iter()
            .position(|f| *f == fuente)
            .unwrap_or(self.priority.len())
    }

    /// Copy of this policy with MANUAL moved to the front
    pub fn with_manual_first(&self) -> Self {
        let mut priority = vec![Fuente::Manual];
        priority.extend(self.priority.iter().copied().filter(|f| *f != Fuente::Manual));
        Self {
            priority,
            ..self.clone()
        }
    }
}

/// Field merger
pub struct FieldMerger {
    policy: MergePolicy,
}

impl FieldMerger {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MergePolicy {
        &self.policy
    }

    /// Merge source results into one record
    ///
    /// Input order does not matter; results are ranked by the policy's
    /// priority (stable for equal rank). FAILED and TIMEOUT results are ignored.
    pub fn merge(&self, results: &[RawSourceResult]) -> MergedRecord {
        let mut ordered: Vec<&RawSourceResult> = results
            .iter()
            .filter(|r| r.status.carries_data())
            .collect();
        ordered.sort_by_key(|r| self.policy.rank(r.source));

        let mut record = MergedRecord::default();

        for campo in CampoEmpresa::ALL {
            self.merge_field(&mut record, campo, &ordered);
        }

        self.merge_representantes(&mut record, &ordered);

        debug!(
            fuentes = ?record.fuentes_consultadas,
            representantes = record.representantes.len(),
            conflictos = record.conflictos.len(),
            "Merge complete"
        );

        record
    }

    /// Merge for a requested RUC
    ///
    /// Sources often omit the RUC they were queried with; the requested one
    /// fills the slot when no source reported it. A reported RUC is kept as is.
    pub fn merge_for(&self, ruc: &str, results: &[RawSourceResult]) -> MergedRecord {
        let mut record = self.merge(results);
        if record.ruc.is_none() {
            record.ruc = Some(ruc.trim().to_string());
        }
        record
    }

    /// Select one field: first coercible non-empty value wins
    fn merge_field(&self, record: &mut MergedRecord, campo: CampoEmpresa, ordered: &[&RawSourceResult]) {
        let candidates: Vec<(Fuente, FieldValue)> = ordered
            .iter()
            .filter_map(|r| {
                let value = r.field(campo)?.coerce(campo.kind())?;
                Some((r.source, value))
            })
            .collect();

        let Some((winner_source, winner_value)) = candidates.first().cloned() else {
            return;
        };

        for (fuente, _) in &candidates {
            record.fuentes_consultadas.insert(*fuente);
        }

        let winner_key = winner_value.comparison_key();
        let mut corroborado_por = Vec::new();

        for (fuente, value) in candidates.iter().skip(1) {
            let key = value.comparison_key();
            if key == winner_key {
                if !corroborado_por.contains(fuente) && *fuente != winner_source {
                    corroborado_por.push(*fuente);
                }
                continue;
            }

            let similitud = strsim::normalized_levenshtein(&winner_key, &key);
            debug!(
                campo = %campo,
                elegido = %winner_source,
                descartado = %fuente,
                similitud,
                "Field conflict"
            );
            record.conflictos.push(ConflictReport {
                campo,
                fuente_elegida: winner_source,
                valor_elegido: winner_value.to_string(),
                fuente_descartada: *fuente,
                valor_descartado: value.to_string(),
                similitud,
            });
        }

        if record.set(campo, winner_value) {
            record.procedencia.insert(
                campo,
                FieldProvenance {
                    fuente: winner_source,
                    corroborado_por,
                },
            );
        }
    }

    /// Union representatives across sources
    fn merge_representantes(&self, record: &mut MergedRecord, ordered: &[&RawSourceResult]) {
        let mut merged: Vec<Representante> = Vec::new();
        // Source whose principal flag is honored; later sources cannot add another
        let mut principal_source: Option<Fuente> = None;

        for result in ordered {
            for incoming in result.representantes.iter().filter(|r| !r.is_empty()) {
                record.fuentes_consultadas.insert(result.source);

                match self.find_match(&merged, incoming) {
                    Some(idx) => {
                        let existing = &mut merged[idx];
                        fill_missing(existing, incoming);
                        if result.source.is_automated() {
                            existing.corroborado = true;
                        }
                        if incoming.es_principal
                            && !existing.es_principal
                            && claim_principal(&mut principal_source, result.source)
                        {
                            existing.es_principal = true;
                        }
                    }
                    None => {
                        let mut nuevo = normalized_copy(incoming);
                        nuevo.fuente = Some(result.source);
                        nuevo.corroborado = result.source.is_automated();
                        nuevo.es_principal = incoming.es_principal
                            && claim_principal(&mut principal_source, result.source);
                        if incoming.es_principal && !nuevo.es_principal {
                            debug!(
                                nombre = %nuevo.nombre,
                                fuente = %result.source,
                                "Principal flag dropped: a higher-priority source already named one"
                            );
                        }
                        merged.push(nuevo);
                    }
                }
            }
        }

        if self.policy.promote_first_principal && !merged.iter().any(|r| r.es_principal) {
            if let Some(first) = merged.first_mut() {
                first.es_principal = true;
            }
        }

        record.representantes = merged;
    }

    /// Find the merged row describing the same person
    fn find_match(&self, merged: &[Representante], incoming: &Representante) -> Option<usize> {
        let documento = incoming.documento_normalizado();

        if !documento.is_empty() {
            if let Some(idx) = merged.iter().position(|r| r.documento_normalizado() == documento) {
                return Some(idx);
            }
            // A documented row may still complete an undocumented one
            return merged.iter().position(|r| {
                r.documento_normalizado().is_empty() && self.same_name(r, incoming)
            });
        }

        merged.iter().position(|r| self.same_name(r, incoming))
    }

    fn same_name(&self, a: &Representante, b: &Representante) -> bool {
        let (na, nb) = (a.nombre_normalizado(), b.nombre_normalizado());
        if na.is_empty() || nb.is_empty() {
            return false;
        }
        na == nb || strsim::normalized_levenshtein(&na, &nb) >= self.policy.name_similarity_threshold
    }
}

/// The first source to flag a principal owns the flag; only it may flag more
fn claim_principal(owner: &mut Option<Fuente>, fuente: Fuente) -> bool {
    match owner {
        None => {
            *owner = Some(fuente);
            true
        }
        Some(current) => *current == fuente,
    }
}

fn normalized_copy(rep: &Representante) -> Representante {
    let mut copy = rep.clone();
    copy.nombre = rep.nombre.trim().to_string();
    copy.cargo = rep.cargo.trim().to_string();
    copy.tipo_documento = rep.tipo_documento.trim().to_uppercase();
    copy.numero_documento = rep.documento_normalizado();
    copy
}

/// Fill blank fields of `existing` from `incoming`; never overwrite
fn fill_missing(existing: &mut Representante, incoming: &Representante) {
    let incoming = normalized_copy(incoming);
    let fill = |slot: &mut String, value: &String| {
        if crate::types::is_blank(slot) && !crate::types::is_blank(value) {
            *slot = value.clone();
        }
    };
    fill(&mut existing.nombre, &incoming.nombre);
    fill(&mut existing.cargo, &incoming.cargo);
    fill(&mut existing.tipo_documento, &incoming.tipo_documento);
    fill(&mut existing.numero_documento, &incoming.numero_documento);
    if existing.fecha_desde.is_none() {
        existing.fecha_desde = incoming.fecha_desde;
    }
    if existing.participacion.is_none() {
        existing.participacion = incoming.participacion;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::FuenteDatos;

    fn merger() -> FieldMerger {
        FieldMerger::new(MergePolicy::default())
    }

    fn sunat() -> RawSourceResult {
        RawSourceResult::success(Fuente::Sunat)
            .with_field(CampoEmpresa::Ruc, "20100070970")
            .with_field(CampoEmpresa::RazonSocial, "CONSTRUCTORA ANDINA S.A.C.")
            .with_field(CampoEmpresa::Direccion, "AV. JAVIER PRADO 123, LIMA")
            .with_representante(
                Representante::new("PEREZ GOMEZ JUAN", "GERENTE GENERAL", "DNI", "45678901").principal(),
            )
    }

    fn osce() -> RawSourceResult {
        RawSourceResult::success(Fuente::Osce)
            .with_field(CampoEmpresa::RazonSocial, "CONSTRUCTORA ANDINA SAC")
            .with_field(CampoEmpresa::Email, "contacto@andina.pe")
            .with_field(CampoEmpresa::Especialidades, vec!["OBRAS CIVILES".to_string()])
            .with_representante(Representante::new("PEREZ GOMEZ JUAN", "SOCIO", "DNI", "45678901"))
            .with_representante(Representante::new("DIAZ ROJAS ANA", "SOCIA", "DNI", "12345678").principal())
    }

    #[test]
    fn test_priority_wins_regardless_of_input_order() {
        let record = merger().merge(&[osce(), sunat()]);

        assert_eq!(record.razon_social.as_deref(), Some("CONSTRUCTORA ANDINA S.A.C."));
        assert_eq!(record.procedencia[&CampoEmpresa::RazonSocial].fuente, Fuente::Sunat);
        assert_eq!(record.email.as_deref(), Some("contacto@andina.pe"));
        assert_eq!(record.procedencia[&CampoEmpresa::Email].fuente, Fuente::Osce);
        assert_eq!(record.especialidades, vec!["OBRAS CIVILES"]);
        assert_eq!(record.fuente_datos(), Some(FuenteDatos::Scraping));
    }

    #[test]
    fn test_conflict_reported_with_similarity() {
        let record = merger().merge(&[sunat(), osce()]);

        assert_eq!(record.conflictos.len(), 1);
        let conflict = &record.conflictos[0];
        assert_eq!(conflict.campo, CampoEmpresa::RazonSocial);
        assert_eq!(conflict.fuente_descartada, Fuente::Osce);
        assert!(conflict.similitud > 0.8 && conflict.similitud < 1.0);
    }

    #[test]
    fn test_equal_values_corroborate_instead_of_conflicting() {
        let manual = RawSourceResult::success(Fuente::Manual)
            .with_field(CampoEmpresa::Direccion, "av. javier  prado 123, lima");
        let record = merger().merge(&[sunat(), manual]);

        assert!(record.conflictos.is_empty());
        assert_eq!(
            record.procedencia[&CampoEmpresa::Direccion].corroborado_por,
            vec![Fuente::Manual]
        );
        assert_eq!(record.fuente_datos(), Some(FuenteDatos::Mixto));
    }

    #[test]
    fn test_failed_results_contribute_nothing() {
        let mut failed = RawSourceResult::failed(Fuente::Sunat, "503");
        // Even if a buggy adapter leaves fields behind
        failed
            .fields
            .insert(CampoEmpresa::RazonSocial, FieldValue::from("FANTASMA SAC"));
        let record = merger().merge(&[failed, osce()]);

        assert_eq!(record.razon_social.as_deref(), Some("CONSTRUCTORA ANDINA SAC"));
        assert!(!record.fuentes_consultadas.contains(&Fuente::Sunat));
    }

    #[test]
    fn test_representatives_deduplicated_by_document() {
        let record = merger().merge(&[sunat(), osce()]);

        assert_eq!(record.representantes.len(), 2);
        let juan = &record.representantes[0];
        assert_eq!(juan.cargo, "GERENTE GENERAL");
        assert_eq!(juan.fuente, Some(Fuente::Sunat));
        assert!(juan.es_principal);
    }

    #[test]
    fn test_cross_source_principal_demoted() {
        let record = merger().merge(&[sunat(), osce()]);

        assert_eq!(record.principal_indices(), vec![0]);
        assert!(!record.representantes[1].es_principal);
    }

    #[test]
    fn test_same_source_principals_kept() {
        let manual = RawSourceResult::success(Fuente::Manual)
            .with_representante(Representante::new("A", "GERENTE", "DNI", "11111111").principal())
            .with_representante(Representante::new("B", "GERENTE", "DNI", "22222222").principal());
        let record = merger().merge(&[manual]);

        assert_eq!(record.principal_indices(), vec![0, 1]);
    }

    #[test]
    fn test_undocumented_row_matched_by_name() {
        let manual = RawSourceResult::success(Fuente::Manual).with_representante(Representante {
            fecha_desde: Some("2015-03-01".to_string()),
            ..Representante::new("Perez Gomez, Juan", "", "", "")
        });
        let record = merger().merge(&[sunat(), manual]);

        assert_eq!(record.representantes.len(), 1);
        assert_eq!(record.representantes[0].fecha_desde.as_deref(), Some("2015-03-01"));
        assert_eq!(record.representantes[0].numero_documento, "45678901");
    }

    #[test]
    fn test_first_representative_promoted() {
        let osce = RawSourceResult::partial(Fuente::Osce)
            .with_representante(Representante::new("ROJAS LUIS", "SOCIO", "DNI", "87654321"))
            .with_representante(Representante::new("DIAZ ANA", "SOCIA", "DNI", "12345678"));
        let record = merger().merge(&[osce.clone()]);
        assert_eq!(record.principal_indices(), vec![0]);

        let no_promotion = FieldMerger::new(MergePolicy {
            promote_first_principal: false,
            ..MergePolicy::default()
        });
        assert!(no_promotion.merge(&[osce]).principal_indices().is_empty());
    }

    #[test]
    fn test_manual_first_policy() {
        let manual = RawSourceResult::success(Fuente::Manual)
            .with_field(CampoEmpresa::RazonSocial, "ANDINA CONSTRUCTORES SAC");
        let merger = FieldMerger::new(MergePolicy::default().with_manual_first());
        let record = merger.merge(&[sunat(), manual]);

        assert_eq!(record.razon_social.as_deref(), Some("ANDINA CONSTRUCTORES SAC"));
        assert_eq!(merger.policy().priority[0], Fuente::Manual);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let inputs = [sunat(), osce()];
        assert_eq!(merger().merge(&inputs), merger().merge(&inputs));
    }

    #[test]
    fn test_requested_ruc_fills_missing_slot() {
        let mut without_ruc = sunat();
        without_ruc.fields.remove(&CampoEmpresa::Ruc);

        let record = merger().merge_for(" 20100070970 ", &[without_ruc]);
        assert_eq!(record.ruc.as_deref(), Some("20100070970"));
        assert!(!record.procedencia.contains_key(&CampoEmpresa::Ruc));
        assert!(record.fuentes_consultadas.iter().eq([Fuente::Sunat].iter()));
    }

    #[test]
    fn test_reported_ruc_kept_over_requested() {
        let record = merger().merge_for("20131312955", &[sunat()]);
        assert_eq!(record.ruc.as_deref(), Some("20100070970"));
        assert_eq!(record.procedencia[&CampoEmpresa::Ruc].fuente, Fuente::Sunat);
    }

    #[test]
    fn test_only_failed_results_merge_to_empty_record() {
        let record = merger().merge(&[
            RawSourceResult::failed(Fuente::Sunat, "RUC no encontrado"),
            RawSourceResult::timed_out(Fuente::Osce, "timeout tras 10000 ms"),
        ]);
        assert_eq!(record, MergedRecord::default());
        assert!(record.fuentes_consultadas.is_empty());
        assert!(record.is_empty());
    }
}
