//! Manual form input
//!
//! The user-supplied form has the shape of the merged record. It becomes a
//! MANUAL [`RawSourceResult`]; an empty form produces nothing.

use crate::types::{is_blank, CampoEmpresa, FieldValue, Fuente, RawSourceResult, Representante};
use serde::{Deserialize, Serialize};

/// Manual form contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualInput {
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
}

impl ManualInput {
    fn text_fields(&self) -> [(CampoEmpresa, &Option<String>); 11] {
        [
            (CampoEmpresa::Ruc, &self.ruc),
            (CampoEmpresa::RazonSocial, &self.razon_social),
            (CampoEmpresa::Email, &self.email),
            (CampoEmpresa::Telefono, &self.telefono),
            (CampoEmpresa::Direccion, &self.direccion),
            (CampoEmpresa::PaginaWeb, &self.pagina_web),
            (CampoEmpresa::RedesSociales, &self.redes_sociales),
            (CampoEmpresa::Estado, &self.estado),
            (CampoEmpresa::Departamento, &self.departamento),
            (CampoEmpresa::Provincia, &self.provincia),
            (CampoEmpresa::Distrito, &self.distrito),
        ]
    }

    /// Form carries something besides the RUC
    pub fn is_empty(&self) -> bool {
        let text = self
            .text_fields()
            .iter()
            .filter(|(campo, _)| *campo != CampoEmpresa::Ruc)
            .all(|(_, v)| v.as_deref().map_or(true, is_blank));
        text && self.especialidades.iter().all(|e| is_blank(e))
            && self.capital_social.is_none()
            && self.representantes.iter().all(Representante::is_empty)
    }

    /// Convert to a MANUAL source result
    ///
    /// The form's own RUC is kept when given (a mismatch is caught by the
    /// orchestrator); otherwise the requested RUC is used.
    pub fn to_raw_result(&self, ruc_solicitado: &str) -> Option<RawSourceResult> {
        if self.is_empty() {
            return None;
        }

        let mut result = RawSourceResult::success(Fuente::Manual);

        for (campo, value) in self.text_fields() {
            if let Some(v) = value.as_deref().filter(|v| !is_blank(v)) {
                result = result.with_field(campo, v);
            }
        }
        if !result.fields.contains_key(&CampoEmpresa::Ruc) {
            result = result.with_field(CampoEmpresa::Ruc, ruc_solicitado.trim());
        }

        let especialidades = FieldValue::List(self.especialidades.clone());
        if !especialidades.is_empty() {
            result = result.with_field(CampoEmpresa::Especialidades, especialidades);
        }
        if let Some(capital) = self.capital_social {
            result = result.with_field(CampoEmpresa::CapitalSocial, capital);
        }

        Some(
            self.representantes
                .iter()
                .filter(|r| !r.is_empty())
                .cloned()
                .fold(result, |acc, rep| acc.with_representante(rep)),
        )
    }
}
