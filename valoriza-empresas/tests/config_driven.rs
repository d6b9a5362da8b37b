// Configuration file to pipeline behavior
//
// Loads TOML files from disk and checks that the settings reach the
// orchestrator: retry counts, priority order and tier thresholds.

mod helpers;

use helpers::{osce_success, sunat_complete, sunat_partial, Behavior, StubAdapter, RUC};
use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use valoriza_common::config::{load_config, load_config_file, CONFIG_ENV_VAR};
use valoriza_empresas::types::{CampoEmpresa, Fuente};
use valoriza_empresas::validators::Tier;
use valoriza_empresas::workflow::{Diagnostic, ModeState, SourceOutcome};
use valoriza_empresas::{ConsolidationConfig, ConsolidationOrchestrator, ConsolidationRequest};

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn config_from(content: &str) -> ConsolidationConfig {
    let file = write_config(content);
    let toml = load_config_file(file.path()).unwrap();
    ConsolidationConfig::from_toml(&toml.consolidacion).unwrap()
}

#[test]
fn test_file_settings_reach_pipeline_config() {
    let config = config_from(
        r#"
        [consolidacion]
        prioridad = ["OSCE", "SUNAT", "MANUAL"]
        timeout_ms = 2500
        reintentos_timeout = 0
        umbral_buena = 90.0
        umbral_aceptable = 60.0
        "#,
    );

    assert_eq!(config.priority, vec![Fuente::Osce, Fuente::Sunat, Fuente::Manual]);
    assert_eq!(config.timeout, Duration::from_millis(2500));
    assert_eq!(config.retry.on_timeout, 0);
    assert_eq!(config.thresholds.buena, 90.0);
    assert_eq!(config.thresholds.aceptable, 60.0);
}

#[test]
fn test_invalid_sections_rejected() {
    for content in [
        "[consolidacion]\nprioridad = [\"SUNAT\", \"SUNAT\"]",
        "[consolidacion]\nprioridad = [\"MEF\"]",
        "[consolidacion]\ntimeout_ms = 0",
        "[consolidacion]\numbral_buena = 40.0\numbral_aceptable = 60.0",
        "[consolidacion]\numbral_similitud_nombre = 1.5",
        "[consolidacion]\nreintentos_timeout = 1000000",
    ] {
        let file = write_config(content);
        let toml = load_config_file(file.path()).unwrap();
        assert!(
            ConsolidationConfig::from_toml(&toml.consolidacion).is_err(),
            "accepted: {}",
            content
        );
    }
}

#[test]
#[serial]
fn test_env_var_config_is_used() {
    let file = write_config("[scraper]\nbase_url = \"http://scraper.test:9000\"\n");
    std::env::set_var(CONFIG_ENV_VAR, file.path());
    let loaded = load_config(None);
    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(loaded.unwrap().scraper.base_url, "http://scraper.test:9000");
}

#[tokio::test(start_paused = true)]
async fn test_retry_disabled_by_config() {
    let config = config_from("[consolidacion]\nreintentos_timeout = 0\n");
    let sunat = StubAdapter::new(Fuente::Sunat, vec![Behavior::Hang]);
    let decision = ConsolidationOrchestrator::new(config, vec![sunat.clone()])
        .consolidate(&ConsolidationRequest::new(RUC))
        .await;

    assert_eq!(sunat.calls(), 1);
    assert!(matches!(
        decision.source_diagnostic(Fuente::Sunat),
        Some(Diagnostic::Source { estado: SourceOutcome::Timeout, intentos: 1, .. })
    ));
}

#[tokio::test]
async fn test_configured_priority_changes_winner() {
    let config = config_from("[consolidacion]\nprioridad = [\"OSCE\", \"SUNAT\", \"MANUAL\"]\n");
    let decision = ConsolidationOrchestrator::new(
        config,
        vec![
            StubAdapter::responding(sunat_partial()),
            StubAdapter::responding(osce_success()),
        ],
    )
    .consolidate(&ConsolidationRequest::new(RUC))
    .await;

    assert_eq!(decision.record.razon_social.as_deref(), Some("SUPERMERCADOS PERUANOS S.A."));
    assert_eq!(
        decision.record.procedencia[&CampoEmpresa::RazonSocial].fuente,
        Fuente::Osce
    );
}

#[tokio::test]
async fn test_configured_threshold_changes_mode() {
    // SUNAT alone scores 90; a 95 bar makes it MIXED
    let config = config_from("[consolidacion]\numbral_buena = 95.0\n");
    let decision = ConsolidationOrchestrator::new(config, vec![StubAdapter::responding(sunat_complete())])
        .consolidate(&ConsolidationRequest::new(RUC))
        .await;

    assert_eq!(decision.assessment.score, 90.0);
    assert_eq!(decision.assessment.tier, Tier::Aceptable);
    assert_eq!(decision.state, ModeState::MixedReady);
    assert!(decision.assessment.requiere_verificacion);
}
