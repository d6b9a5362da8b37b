//! Record Validator (Tier 3)
//!
//! Checks a merged record against field and cross-field rules and reports
//! every violation found (never fail-fast). Non-blocking findings are
//! returned separately as [`Advertencia`]s.

use crate::fusion::MergedRecord;
use crate::validators::documents;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Minimum characters for a razón social
const RAZON_SOCIAL_MIN_LEN: usize = 3;

/// Trailing company-type abbreviations
const SUFIJOS_SOCIETARIOS: &[&str] = &[
    "SAC", "S.A.C.", "S.A.C", "SAA", "S.A.A.", "SA", "S.A.", "S.A", "SRL", "S.R.L.", "S.R.L", "EIRL",
    "E.I.R.L.", "E.I.R.L",
];

/// Company types written out in full
const FORMAS_SOCIETARIAS: &[&str] = &[
    "SOCIEDAD ANONIMA",
    "SOCIEDAD ANONIMA CERRADA",
    "SOCIEDAD ANONIMA ABIERTA",
    "SOCIEDAD COMERCIAL DE RESPONSABILIDAD LIMITADA",
    "EMPRESA INDIVIDUAL DE RESPONSABILIDAD LIMITADA",
];

const DOMINIOS_PERSONALES: &[&str] = &["gmail.com", "hotmail.com", "yahoo.com", "outlook.com", "live.com"];

const CARGOS_ESTANDAR: &[&str] = &[
    "GERENTE GENERAL",
    "GERENTE",
    "DIRECTOR GENERAL",
    "DIRECTOR EJECUTIVO",
    "DIRECTOR",
    "PRESIDENTE",
    "VICEPRESIDENTE",
    "ADMINISTRADOR GENERAL",
    "ADMINISTRADOR",
    "GERENTE COMERCIAL",
    "GERENTE ADMINISTRATIVO",
    "GERENTE FINANCIERO",
    "GERENTE DE OPERACIONES",
    "GERENTE DE MARKETING",
    "GERENTE TECNICO",
    "REPRESENTANTE LEGAL",
    "APODERADO",
    "APODERADO GENERAL",
    "MANDATARIO",
    "TITULAR-GERENTE",
    "SOCIO",
    "ACCIONISTA",
];

/// Violation category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    Requerido,
    RucInvalido,
    RucNoCoincide,
    RazonSocialCorta,
    EmailInvalido,
    DocumentoInvalido,
    DocumentoDuplicado,
    PrincipalMultiple,
    PoliticaEstricta,
    DatosParciales,
}

/// One rule failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub campo: String,
    pub codigo: ViolationCode,
    pub mensaje: String,
    /// Representative indices involved, when the rule concerns representatives
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entradas: Vec<usize>,
}

impl Violation {
    pub fn new(campo: impl Into<String>, codigo: ViolationCode, mensaje: impl Into<String>) -> Self {
        Self {
            campo: campo.into(),
            codigo,
            mensaje: mensaje.into(),
            entradas: Vec::new(),
        }
    }

    fn with_entradas(mut self, entradas: Vec<usize>) -> Self {
        self.entradas = entradas;
        self
    }

    /// Malformed RUC
    pub fn ruc(error: &documents::RucError) -> Self {
        Self::new("ruc", ViolationCode::RucInvalido, error.to_string())
    }
}

/// Non-blocking finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advertencia {
    pub campo: String,
    pub mensaje: String,
}

impl Advertencia {
    fn new(campo: impl Into<String>, mensaje: impl Into<String>) -> Self {
        Self {
            campo: campo.into(),
            mensaje: mensaje.into(),
        }
    }
}

/// Validation verdict
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Accepted,
    /// Never empty
    Rejected(Vec<Violation>),
}

impl ValidationResult {
    fn from_violations(violations: Vec<Violation>) -> Self {
        if violations.is_empty() {
            Self::Accepted
        } else {
            Self::Rejected(violations)
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Accepted => &[],
            Self::Rejected(v) => v,
        }
    }

    pub fn into_violations(self) -> Vec<Violation> {
        match self {
            Self::Accepted => Vec::new(),
            Self::Rejected(v) => v,
        }
    }
}

/// Per-request policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Require `estado` and at least one representative
    pub estricta: bool,
    /// When false, require `razon_social`, `direccion` and at least one representative
    pub permitir_parciales: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            estricta: false,
            permitir_parciales: true,
        }
    }
}

/// Record Validator
#[derive(Debug, Clone, Default)]
pub struct RecordValidator {
    policy: ValidationPolicy,
}

impl RecordValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    /// Validate a merged record
    pub fn validate(&self, record: &MergedRecord) -> ValidationResult {
        let mut violations = Vec::new();

        self.check_identity(record, &mut violations);
        self.check_email(record, &mut violations);
        self.check_representantes(record, &mut violations);
        self.check_policy(record, &mut violations);

        debug!(
            ruc = ?record.ruc,
            violations = violations.len(),
            "Record validation complete"
        );

        ValidationResult::from_violations(violations)
    }

    fn check_identity(&self, record: &MergedRecord, violations: &mut Vec<Violation>) {
        match record.ruc.as_deref() {
            None => violations.push(Violation::new("ruc", ViolationCode::Requerido, "RUC es obligatorio")),
            Some(ruc) => {
                if let Err(e) = documents::validar_ruc(ruc) {
                    violations.push(Violation::ruc(&e));
                }
            }
        }

        match record.razon_social.as_deref() {
            None => violations.push(Violation::new(
                "razon_social",
                ViolationCode::Requerido,
                "Razón social es obligatoria",
            )),
            Some(razon) if razon.trim().chars().count() < RAZON_SOCIAL_MIN_LEN => {
                violations.push(Violation::new(
                    "razon_social",
                    ViolationCode::RazonSocialCorta,
                    format!("Razón social debe tener al menos {} caracteres", RAZON_SOCIAL_MIN_LEN),
                ))
            }
            Some(_) => {}
        }
    }

    fn check_email(&self, record: &MergedRecord, violations: &mut Vec<Violation>) {
        if let Some(email) = record.email.as_deref() {
            if !documents::email_valido(email) {
                violations.push(Violation::new(
                    "email",
                    ViolationCode::EmailInvalido,
                    format!("Email con formato inválido: '{}'", email),
                ));
            }
        }
    }

    fn check_representantes(&self, record: &MergedRecord, violations: &mut Vec<Violation>) {
        let mut por_documento: BTreeMap<String, Vec<usize>> = BTreeMap::new();

        for (idx, rep) in record.representantes.iter().enumerate() {
            // Rows without a document are allowed; they were matched by name
            let documento = rep.documento_normalizado();
            if documento.is_empty() {
                continue;
            }

            if let Err(reason) = documents::validar_documento(&rep.tipo_documento, &rep.numero_documento) {
                let campo = format!("representantes[{}].numero_documento", idx);
                violations.push(
                    Violation::new(campo, ViolationCode::DocumentoInvalido, reason).with_entradas(vec![idx]),
                );
            }
            por_documento.entry(documento).or_default().push(idx);
        }

        for (documento, indices) in por_documento.into_iter().filter(|(_, i)| i.len() > 1) {
            violations.push(
                Violation::new(
                    "representantes",
                    ViolationCode::DocumentoDuplicado,
                    format!("Documento {} repetido en representantes {:?}", documento, indices),
                )
                .with_entradas(indices),
            );
        }

        let principales = record.principal_indices();
        if principales.len() > 1 {
            let nombres: Vec<String> = principales
                .iter()
                .map(|i| format!("representantes[{}] ({})", i, record.representantes[*i].nombre))
                .collect();
            violations.push(
                Violation::new(
                    "representantes",
                    ViolationCode::PrincipalMultiple,
                    format!("Solo puede haber un representante principal: {}", nombres.join(", ")),
                )
                .with_entradas(principales),
            );
        }
    }

    fn check_policy(&self, record: &MergedRecord, violations: &mut Vec<Violation>) {
        let sin_representantes = record.representantes.is_empty();

        if self.policy.estricta {
            if record.estado.is_none() {
                violations.push(Violation::new(
                    "estado",
                    ViolationCode::PoliticaEstricta,
                    "Validación estricta requiere el estado del contribuyente",
                ));
            }
            if sin_representantes {
                violations.push(Violation::new(
                    "representantes",
                    ViolationCode::PoliticaEstricta,
                    "Validación estricta requiere al menos un representante",
                ));
            }
        }

        if !self.policy.permitir_parciales {
            if record.direccion.is_none() {
                violations.push(Violation::new(
                    "direccion",
                    ViolationCode::DatosParciales,
                    "No se permiten datos parciales: falta la dirección",
                ));
            }
            if record.razon_social.is_none() {
                violations.push(Violation::new(
                    "razon_social",
                    ViolationCode::DatosParciales,
                    "No se permiten datos parciales: falta la razón social",
                ));
            }
            if sin_representantes {
                violations.push(Violation::new(
                    "representantes",
                    ViolationCode::DatosParciales,
                    "No se permiten datos parciales: faltan representantes",
                ));
            }
        }
    }

    /// Non-blocking findings
    pub fn advertencias(&self, record: &MergedRecord) -> Vec<Advertencia> {
        let mut advertencias = Vec::new();

        if let Some(ruc) = record.ruc.as_deref() {
            if !documents::ruc_prefijo_conocido(ruc) {
                advertencias.push(Advertencia::new(
                    "ruc",
                    format!(
                        "Prefijo de RUC poco común: '{}'",
                        ruc.trim().chars().take(2).collect::<String>()
                    ),
                ));
            }
        }

        if let Some(telefono) = record.telefono.as_deref() {
            if !documents::telefono_peruano(telefono) {
                advertencias.push(Advertencia::new(
                    "telefono",
                    format!("Teléfono con formato no peruano: '{}'", telefono),
                ));
            }
        }

        if let Some(web) = record.pagina_web.as_deref() {
            let lower = web.to_lowercase();
            if !(lower.starts_with("http://") || lower.starts_with("https://")) {
                advertencias.push(Advertencia::new(
                    "pagina_web",
                    format!("Página web sin esquema http(s): '{}'", web),
                ));
            }
        }

        // Personas naturales (RUC 10) carry no company type
        let persona_natural = record.ruc.as_deref().map(|r| r.trim().starts_with("10")).unwrap_or(false);
        if let Some(razon) = record.razon_social.as_deref() {
            if !persona_natural && !tiene_forma_societaria(razon) {
                advertencias.push(Advertencia::new(
                    "razon_social",
                    format!("Razón social sin tipo de sociedad reconocible: '{}'", razon),
                ));
            }
        }

        if let Some(email) = record.email.as_deref() {
            let dominio = email.rsplit('@').next().unwrap_or_default().trim().to_lowercase();
            if DOMINIOS_PERSONALES.contains(&dominio.as_str()) {
                advertencias.push(Advertencia::new(
                    "email",
                    format!("Email de dominio personal ({}), se recomienda uno corporativo", dominio),
                ));
            }
        }

        for representante in &record.representantes {
            if representante.nombre.chars().any(|c| c.is_ascii_digit()) {
                advertencias.push(Advertencia::new(
                    "representantes",
                    format!("Nombre del representante contiene números: '{}'", representante.nombre),
                ));
            }
            if !representante.cargo.trim().is_empty() && !cargo_estandar(&representante.cargo) {
                advertencias.push(Advertencia::new(
                    "representantes",
                    format!("Cargo no estándar: '{}'", representante.cargo),
                ));
            }
        }

        advertencias
    }
}

fn tiene_forma_societaria(razon_social: &str) -> bool {
    let upper = razon_social.trim().to_uppercase();
    let last = upper.split_whitespace().last().unwrap_or_default();
    SUFIJOS_SOCIETARIOS.contains(&last) || FORMAS_SOCIETARIAS.iter().any(|f| upper.ends_with(f))
}

/// Known cargo, also accepting the feminine form (-A for -O/-E)
fn cargo_estandar(cargo: &str) -> bool {
    let cargo = cargo.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    let cargo = cargo.replace('É', "E");
    CARGOS_ESTANDAR.iter().any(|estandar| {
        if cargo == *estandar {
            return true;
        }
        // PRESIDENTA, DIRECTORA, SOCIA, APODERADA
        let (head, tail) = match estandar.split_once(' ') {
            Some((head, tail)) => (head, Some(tail)),
            None => (*estandar, None),
        };
        let stem = head.trim_end_matches(['O', 'E']);
        let femenino = match tail {
            Some(tail) => format!("{}A {}", stem, tail),
            None => format!("{}A", stem),
        };
        cargo == femenino
    })
}
