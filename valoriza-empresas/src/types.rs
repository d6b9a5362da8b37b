//! Core Types for Empresa Consolidation
//!
//! Data contracts produced by the source adapters (Tier 1) and consumed by the
//! field merger (Tier 2):
//! - [`Fuente`]: which registry or form a value came from
//! - [`CampoEmpresa`]: the fixed canonical field list
//! - [`FieldValue`]: a raw value as reported by a source
//! - [`Representante`]: one legal representative row
//! - [`RawSourceResult`]: the outcome of one adapter call

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Sources
// ============================================================================

/// Data source (for provenance tracking)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Fuente {
    /// Tax authority registry (authoritative for identity)
    Sunat,
    /// Public procurement registry
    Osce,
    /// User-supplied form
    Manual,
}

impl Fuente {
    /// SUNAT and OSCE are scraped; MANUAL is typed by a user
    pub fn is_automated(self) -> bool {
        matches!(self, Self::Sunat | Self::Osce)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sunat => "SUNAT",
            Self::Osce => "OSCE",
            Self::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for Fuente {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Fuente {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SUNAT" => Ok(Self::Sunat),
            // The procurement registry was renamed OECE; both spellings appear in payloads
            "OSCE" | "OECE" => Ok(Self::Osce),
            "MANUAL" => Ok(Self::Manual),
            other => Err(format!("Fuente desconocida: {}", other)),
        }
    }
}

/// Status of one adapter attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceStatus {
    Success,
    Partial,
    Failed,
    Timeout,
}

impl SourceStatus {
    /// SUCCESS and PARTIAL carry fields; FAILED and TIMEOUT never do
    pub fn carries_data(self) -> bool {
        matches!(self, Self::Success | Self::Partial)
    }
}

/// Why a source returned no data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// The registry answered and has no record for the RUC
    NotFound,
    /// Transport error, unusable response or adapter crash
    Error,
    /// No answer within the deadline
    Timeout,
}

// ============================================================================
// Canonical field list
// ============================================================================

/// Canonical empresa fields, in merge order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampoEmpresa {
    Ruc,
    RazonSocial,
    Email,
    Telefono,
    Direccion,
    PaginaWeb,
    RedesSociales,
    Estado,
    Departamento,
    Provincia,
    Distrito,
    Especialidades,
    CapitalSocial,
}

/// Shape of the value a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    List,
    Number,
}

impl CampoEmpresa {
    /// Every field, in the order the merger visits them
    pub const ALL: [CampoEmpresa; 13] = [
        Self::Ruc,
        Self::RazonSocial,
        Self::Email,
        Self::Telefono,
        Self::Direccion,
        Self::PaginaWeb,
        Self::RedesSociales,
        Self::Estado,
        Self::Departamento,
        Self::Provincia,
        Self::Distrito,
        Self::Especialidades,
        Self::CapitalSocial,
    ];

    pub fn kind(self) -> FieldKind {
        match self {
            Self::Especialidades => FieldKind::List,
            Self::CapitalSocial => FieldKind::Number,
            _ => FieldKind::Text,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ruc => "ruc",
            Self::RazonSocial => "razon_social",
            Self::Email => "email",
            Self::Telefono => "telefono",
            Self::Direccion => "direccion",
            Self::PaginaWeb => "pagina_web",
            Self::RedesSociales => "redes_sociales",
            Self::Estado => "estado",
            Self::Departamento => "departamento",
            Self::Provincia => "provincia",
            Self::Distrito => "distrito",
            Self::Especialidades => "especialidades",
            Self::CapitalSocial => "capital_social",
        }
    }
}

impl fmt::Display for CampoEmpresa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Field values
// ============================================================================

/// Raw value reported by a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Whitespace-only text, empty lists and NaN count as empty
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Number(n) => n.is_nan(),
            Self::Text(s) => is_blank(s),
            Self::List(items) => items.iter().all(|i| is_blank(i)),
        }
    }

    /// Coerce into the shape `kind` expects, trimming text and dropping blank
    /// list entries. Returns `None` when the value is empty or cannot be coerced.
    pub fn coerce(&self, kind: FieldKind) -> Option<FieldValue> {
        if self.is_empty() {
            return None;
        }
        match (kind, self) {
            (FieldKind::Text, Self::Text(s)) => Some(Self::Text(s.trim().to_string())),
            (FieldKind::Text, Self::Number(n)) => Some(Self::Text(format_number(*n))),
            (FieldKind::Text, Self::List(items)) => {
                Some(Self::Text(clean_list(items).join(", ")))
            }
            (FieldKind::List, Self::List(items)) => Some(Self::List(clean_list(items))),
            (FieldKind::List, Self::Text(s)) => {
                let items: Vec<String> = s.split([',', ';']).map(str::to_string).collect();
                Some(Self::List(clean_list(&items))).filter(|v| !v.is_empty())
            }
            (FieldKind::List, Self::Number(_)) => None,
            (FieldKind::Number, Self::Number(n)) => Some(Self::Number(*n)),
            (FieldKind::Number, Self::Text(s)) => s
                .trim()
                .replace(',', "")
                .parse::<f64>()
                .ok()
                .filter(|n| !n.is_nan())
                .map(Self::Number),
            (FieldKind::Number, Self::List(_)) => None,
        }
    }

    /// Comparison key: case-insensitive, whitespace collapsed
    pub fn comparison_key(&self) -> String {
        match self {
            Self::Number(n) => format_number(*n),
            Self::Text(s) => collapse_upper(s),
            Self::List(items) => {
                let mut keys: Vec<String> = items.iter().map(|i| collapse_upper(i)).collect();
                keys.sort();
                keys.join("|")
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Scrapers emit "-" for cells they could not read
pub(crate) fn is_blank(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == "-"
}

fn clean_list(items: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .iter()
        .map(|i| i.trim())
        .filter(|i| !is_blank(i))
        .filter(|i| seen.insert(collapse_upper(i)))
        .map(str::to_string)
        .collect()
}

fn collapse_upper(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// ============================================================================
// Representatives
// ============================================================================

/// Legal representative row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Representante {
    pub nombre: String,
    pub cargo: String,
    pub tipo_documento: String,
    pub numero_documento: String,
    pub es_principal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha_desde: Option<String>,
    /// Ownership share as reported by OSCE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participacion: Option<String>,
    /// First source that reported this person (set by the merger)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuente: Option<Fuente>,
    /// Reported by at least one automated source (set by the merger)
    pub corroborado: bool,
}

impl Representante {
    pub fn new(
        nombre: impl Into<String>,
        cargo: impl Into<String>,
        tipo_documento: impl Into<String>,
        numero_documento: impl Into<String>,
    ) -> Self {
        Self {
            nombre: nombre.into(),
            cargo: cargo.into(),
            tipo_documento: tipo_documento.into(),
            numero_documento: numero_documento.into(),
            ..Default::default()
        }
    }

    /// Builder-style principal flag
    pub fn principal(mut self) -> Self {
        self.es_principal = true;
        self
    }

    /// Document number without spaces, dots or dashes, upper-cased
    pub fn documento_normalizado(&self) -> String {
        if is_blank(&self.numero_documento) {
            return String::new();
        }
        self.numero_documento
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_uppercase()
    }

    /// Name upper-cased, punctuation stripped, spaces collapsed
    pub fn nombre_normalizado(&self) -> String {
        let cleaned: String = self
            .nombre
            .chars()
            .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
            .collect();
        collapse_upper(&cleaned)
    }

    /// Neither a name nor a document number
    pub fn is_empty(&self) -> bool {
        is_blank(&self.nombre) && self.documento_normalizado().is_empty()
    }
}

// ============================================================================
// Adapter output
// ============================================================================

/// Outcome of one adapter attempt
///
/// Immutable once built; consumed once by the merger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSourceResult {
    pub source: Fuente,
    pub status: SourceStatus,
    /// Only populated for SUCCESS and PARTIAL
    pub fields: BTreeMap<CampoEmpresa, FieldValue>,
    pub representantes: Vec<Representante>,
    /// Set when status is FAILED or TIMEOUT
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Number of adapter calls that led to this result
    pub attempts: u32,
}

impl RawSourceResult {
    fn with_status(source: Fuente, status: SourceStatus, failure: Option<(FailureKind, String)>) -> Self {
        let (failure, error) = match failure {
            Some((kind, error)) => (Some(kind), Some(error)),
            None => (None, None),
        };
        Self {
            source,
            status,
            fields: BTreeMap::new(),
            representantes: Vec::new(),
            error,
            failure,
            attempts: 1,
        }
    }

    pub fn success(source: Fuente) -> Self {
        Self::with_status(source, SourceStatus::Success, None)
    }

    pub fn partial(source: Fuente) -> Self {
        Self::with_status(source, SourceStatus::Partial, None)
    }

    /// FAILED: the registry has no record for the RUC
    pub fn failed(source: Fuente, error: impl Into<String>) -> Self {
        Self::with_status(
            source,
            SourceStatus::Failed,
            Some((FailureKind::NotFound, error.into())),
        )
    }

    /// FAILED: the lookup itself broke
    pub fn errored(source: Fuente, error: impl Into<String>) -> Self {
        Self::with_status(
            source,
            SourceStatus::Failed,
            Some((FailureKind::Error, error.into())),
        )
    }

    pub fn timed_out(source: Fuente, error: impl Into<String>) -> Self {
        Self::with_status(
            source,
            SourceStatus::Timeout,
            Some((FailureKind::Timeout, error.into())),
        )
    }

    /// Add a field; ignored on FAILED/TIMEOUT results
    pub fn with_field(mut self, campo: CampoEmpresa, value: impl Into<FieldValue>) -> Self {
        if self.status.carries_data() {
            self.fields.insert(campo, value.into());
        }
        self
    }

    /// Add a representative; ignored on FAILED/TIMEOUT results
    pub fn with_representante(mut self, representante: Representante) -> Self {
        if self.status.carries_data() {
            self.representantes.push(representante);
        }
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Status carries data and at least one value is non-empty
    pub fn has_data(&self) -> bool {
        self.status.carries_data()
            && (self.fields.values().any(|v| !v.is_empty())
                || self.representantes.iter().any(|r| !r.is_empty()))
    }

    pub fn field(&self, campo: CampoEmpresa) -> Option<&FieldValue> {
        self.fields.get(&campo)
    }
}
