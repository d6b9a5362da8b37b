//! Configuration loading and config file resolution
//!
//! The TOML file is located following this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `VALORIZA_CONFIG` environment variable
//! 3. User config file (`~/.config/valoriza/valoriza.toml` on Linux)
//! 4. System config file (`/etc/valoriza/valoriza.toml`, Linux only)
//!
//! When no file is found the compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VALORIZA_CONFIG";

/// Config file name searched in the platform config directories
pub const CONFIG_FILE_NAME: &str = "valoriza.toml";

/// Complete TOML configuration
///
/// Every section is optional in the file; missing keys fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub scraper: ScraperConfig,
    pub consolidacion: ConsolidacionConfig,
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. "info" or "valoriza_empresas=debug"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[scraper]` section: the HTTP service fronting the SUNAT/OSCE scrapers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub base_url: String,
    /// Requests per second allowed per source
    pub solicitudes_por_segundo: u32,
    pub connect_timeout_ms: u64,
    /// Overrides the default user agent
    pub user_agent: Option<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            solicitudes_por_segundo: 1,
            connect_timeout_ms: 5_000,
            user_agent: None,
        }
    }
}

/// `[consolidacion]` section: pipeline policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidacionConfig {
    /// Source priority, highest first ("SUNAT", "OSCE", "MANUAL")
    pub prioridad: Vec<String>,
    pub timeout_ms: u64,
    /// Extra attempts after a TIMEOUT
    pub reintentos_timeout: u32,
    /// Extra attempts after a FAILED
    pub reintentos_fallo: u32,
    pub umbral_buena: f64,
    pub umbral_aceptable: f64,
    /// Normalized Levenshtein similarity for matching undocumented representatives
    pub umbral_similitud_nombre: f64,
    pub promover_primer_principal: bool,
    pub pesos: PesosConfig,
}

impl Default for ConsolidacionConfig {
    fn default() -> Self {
        Self {
            prioridad: vec!["SUNAT".to_string(), "OSCE".to_string(), "MANUAL".to_string()],
            timeout_ms: 15_000,
            reintentos_timeout: 1,
            reintentos_fallo: 0,
            umbral_buena: 80.0,
            umbral_aceptable: 50.0,
            umbral_similitud_nombre: 0.85,
            promover_primer_principal: true,
            pesos: PesosConfig::default(),
        }
    }
}

/// `[consolidacion.pesos]` section: quality score weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PesosConfig {
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

impl Default for PesosConfig {
    fn default() -> Self {
        Self {
            ruc: 20.0,
            razon_social: 20.0,
            direccion: 10.0,
            telefono: 8.0,
            email: 8.0,
            pagina_web: 2.0,
            redes_sociales: 2.0,
            representantes: 20.0,
            diversidad_fuentes: 10.0,
        }
    }
}

/// Resolve the config file path
///
/// Explicit locations (CLI, environment) are returned even when the file is
/// missing so that loading reports the mistake. Discovered locations are only
/// returned when they exist.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory
    if let Some(user_config) = dirs::config_dir().map(|d| d.join("valoriza").join(CONFIG_FILE_NAME)) {
        if user_config.exists() {
            return Some(user_config);
        }
    }

    // Priority 4: System config (Linux only)
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/valoriza").join(CONFIG_FILE_NAME);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load configuration, falling back to compiled defaults when no file is found
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    load_config_with_source(cli_arg).map(|(config, _)| config)
}

/// Load configuration and report which file it came from
///
/// `None` means the compiled defaults are in use. Nothing is logged here:
/// this runs before the subscriber exists, so callers log the source once
/// tracing is initialized.
pub fn load_config_with_source(cli_arg: Option<&Path>) -> Result<(TomlConfig, Option<PathBuf>)> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            let config = load_config_file(&path)?;
            Ok((config, Some(path)))
        }
        None => Ok((TomlConfig::default(), None)),
    }
}

/// Read and parse a TOML config file
pub fn load_config_file(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    parse_config(&content)
}

/// Parse TOML text into a configuration
pub fn parse_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Standard user agent for outbound HTTP clients
pub fn get_user_agent() -> String {
    format!("valoriza/{}", env!("CARGO_PKG_VERSION"))
}
