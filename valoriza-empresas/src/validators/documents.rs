//! Peruvian identifier and contact format rules
//!
//! - RUC: 11 digits, modulo-11 check digit (weights 5,4,3,2,7,6,5,4,3,2)
//! - DNI: 8 digits
//! - Carné de extranjería: 9-12 alphanumerics
//! - Pasaporte: 6-12 alphanumerics
//! - Email and phone number patterns

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

const RUC_WEIGHTS: [u32; 10] = [5, 4, 3, 2, 7, 6, 5, 4, 3, 2];

/// Taxpayer-type prefixes currently issued
const RUC_PREFIXES: [&str; 4] = ["10", "15", "17", "20"];

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

/// Mobile (9XXXXXXXX), Lima landline (01XXXXXXX) or provincial landline (0XX XXXXXX),
/// optionally prefixed with +51
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\+?51)?(?:9\d{8}|01\d{7}|0[4-8]\d{7}|[1-8]\d{6})$").expect("valid phone regex")
});

/// RUC format errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RucError {
    #[error("RUC debe tener 11 dígitos (tiene {0})")]
    Longitud(usize),

    #[error("RUC solo puede contener dígitos")]
    NoNumerico,

    #[error("Dígito verificador inválido: se esperaba {esperado}, se encontró {encontrado}")]
    DigitoVerificador { esperado: u32, encontrado: u32 },
}

/// Check digit for the first ten digits of a RUC
pub fn ruc_check_digit(first_ten: &[u32]) -> u32 {
    let sum: u32 = first_ten
        .iter()
        .zip(RUC_WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum();
    match 11 - (sum % 11) {
        10 => 0,
        11 => 1,
        r => r,
    }
}

/// Validate a RUC: length, digits and check digit
pub fn validar_ruc(ruc: &str) -> Result<(), RucError> {
    let ruc = ruc.trim();
    if !ruc.chars().all(|c| c.is_ascii_digit()) {
        return Err(RucError::NoNumerico);
    }
    let digits: Vec<u32> = ruc.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 11 {
        return Err(RucError::Longitud(digits.len()));
    }

    let esperado = ruc_check_digit(&digits[..10]);
    let encontrado = digits[10];
    if esperado != encontrado {
        return Err(RucError::DigitoVerificador { esperado, encontrado });
    }
    Ok(())
}

pub fn is_valid_ruc(ruc: &str) -> bool {
    validar_ruc(ruc).is_ok()
}

/// Prefix belongs to a currently issued taxpayer type (10, 15, 17, 20)
pub fn ruc_prefijo_conocido(ruc: &str) -> bool {
    let ruc = ruc.trim();
    RUC_PREFIXES.iter().any(|p| ruc.starts_with(p))
}

/// Identity document type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipoDocumento {
    Dni,
    CarneExtranjeria,
    Pasaporte,
    Ruc,
    Otro,
}

impl TipoDocumento {
    /// Parse the labels scrapers and forms use, including SUNAT's numeric codes
    pub fn parse(label: &str) -> Self {
        let normalized: String = label
            .trim()
            .to_uppercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect();
        match normalized.as_str() {
            "DNI" | "1" | "LE" | "DOC NACIONAL DE IDENTIDAD" | "DOCUMENTO NACIONAL DE IDENTIDAD" => {
                Self::Dni
            }
            "CE" | "4" | "CARNE DE EXTRANJERIA" | "CARNET DE EXTRANJERIA" => Self::CarneExtranjeria,
            "PASAPORTE" | "7" | "PAS" => Self::Pasaporte,
            "RUC" | "6" => Self::Ruc,
            _ => Self::Otro,
        }
    }
}

/// Check a document number against its type
///
/// Returns a human-readable reason on failure. An unrecognized type only
/// requires 4-15 alphanumerics.
pub fn validar_documento(tipo: &str, numero: &str) -> Result<(), String> {
    let numero: String = numero
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '.')
        .collect();
    if numero.is_empty() {
        return Err("número de documento vacío".to_string());
    }

    let alnum = numero.chars().all(|c| c.is_ascii_alphanumeric());
    let digits = numero.chars().all(|c| c.is_ascii_digit());
    let len = numero.len();

    match TipoDocumento::parse(tipo) {
        TipoDocumento::Dni if !(digits && len == 8) => {
            Err(format!("DNI debe tener 8 dígitos: '{}'", numero))
        }
        TipoDocumento::CarneExtranjeria if !(alnum && (9..=12).contains(&len)) => Err(format!(
            "Carné de extranjería debe tener 9 a 12 caracteres alfanuméricos: '{}'",
            numero
        )),
        TipoDocumento::Pasaporte if !(alnum && (6..=12).contains(&len)) => Err(format!(
            "Pasaporte debe tener 6 a 12 caracteres alfanuméricos: '{}'",
            numero
        )),
        TipoDocumento::Ruc => validar_ruc(&numero).map_err(|e| e.to_string()),
        TipoDocumento::Otro if !(alnum && (4..=15).contains(&len)) => Err(format!(
            "Documento '{}' debe tener 4 a 15 caracteres alfanuméricos",
            numero
        )),
        _ => Ok(()),
    }
}

pub fn documento_valido(tipo: &str, numero: &str) -> bool {
    validar_documento(tipo, numero).is_ok()
}

pub fn email_valido(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Phone numbers are compared without spaces, dashes or parentheses
pub fn telefono_peruano(telefono: &str) -> bool {
    let compact: String = telefono
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')' | '.'))
        .collect();
    PHONE_RE.is_match(&compact)
}
