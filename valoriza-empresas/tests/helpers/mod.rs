//! Shared fixtures for integration tests

#![allow(dead_code)]

pub mod log_capture;

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use valoriza_empresas::sources::{SourceAdapter, SourceError};
use valoriza_empresas::types::{CampoEmpresa, Fuente, RawSourceResult, Representante};
use valoriza_empresas::{ConsolidationConfig, ConsolidationOrchestrator};

pub const RUC: &str = "20100070970";

/// What a stub does on one call
#[derive(Clone)]
pub enum Behavior {
    Respond(RawSourceResult),
    /// Respond after a delay (tests run with a paused clock)
    Delayed(Duration, RawSourceResult),
    Error(&'static str),
    Hang,
    Panic,
}

/// Scripted source adapter
///
/// Replays `script` call by call; the last entry repeats.
pub struct StubAdapter {
    fuente: Fuente,
    script: Vec<Behavior>,
    calls: AtomicU32,
}

impl StubAdapter {
    pub fn new(fuente: Fuente, script: Vec<Behavior>) -> Arc<Self> {
        Arc::new(Self {
            fuente,
            script,
            calls: AtomicU32::new(0),
        })
    }

    pub fn responding(result: RawSourceResult) -> Arc<Self> {
        Self::new(result.source, vec![Behavior::Respond(result)])
    }

    pub fn failing(fuente: Fuente) -> Arc<Self> {
        Self::responding(RawSourceResult::failed(fuente, "RUC no encontrado"))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for StubAdapter {
    fn fuente(&self) -> Fuente {
        self.fuente
    }

    async fn fetch(&self, _ruc: &str, _timeout: Duration) -> Result<RawSourceResult, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let behavior = self
            .script
            .get(call)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or(Behavior::Error("empty script"));

        match behavior {
            Behavior::Respond(result) => Ok(result),
            Behavior::Delayed(delay, result) => {
                tokio::time::sleep(delay).await;
                Ok(result)
            }
            Behavior::Error(message) => Err(SourceError::Http(message.to_string())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Err(SourceError::Internal("hung call resumed".to_string()))
            }
            Behavior::Panic => panic!("stub adapter panic"),
        }
    }
}

pub fn orchestrator(adapters: Vec<Arc<dyn SourceAdapter>>) -> ConsolidationOrchestrator {
    ConsolidationOrchestrator::new(ConsolidationConfig::default(), adapters)
}

pub fn gerente() -> Representante {
    Representante::new("ROBLES LOPEZ CARLOS", "GERENTE GENERAL", "DNI", "10223344").principal()
}

/// SUNAT answer with every scored field
pub fn sunat_complete() -> RawSourceResult {
    RawSourceResult::success(Fuente::Sunat)
        .with_field(CampoEmpresa::Ruc, RUC)
        .with_field(CampoEmpresa::RazonSocial, "SUPERMERCADOS PERUANOS SOCIEDAD ANONIMA")
        .with_field(CampoEmpresa::Direccion, "CAL. MORELLI NRO. 181 INT. P-2, SAN BORJA")
        .with_field(CampoEmpresa::Telefono, "016188000")
        .with_field(CampoEmpresa::Email, "contacto@spsa.com.pe")
        .with_field(CampoEmpresa::PaginaWeb, "https://www.spsa.com.pe")
        .with_field(CampoEmpresa::RedesSociales, "facebook.com/plazavea")
        .with_field(CampoEmpresa::Estado, "ACTIVO")
        .with_representante(gerente())
}

/// SUNAT answer without direccion
pub fn sunat_partial() -> RawSourceResult {
    RawSourceResult::partial(Fuente::Sunat)
        .with_field(CampoEmpresa::Ruc, RUC)
        .with_field(CampoEmpresa::RazonSocial, "SUPERMERCADOS PERUANOS SOCIEDAD ANONIMA")
        .with_field(CampoEmpresa::Estado, "ACTIVO")
        .with_representante(gerente())
}

/// OSCE answer supplying direccion and contact data
pub fn osce_success() -> RawSourceResult {
    RawSourceResult::success(Fuente::Osce)
        .with_field(CampoEmpresa::Ruc, RUC)
        .with_field(CampoEmpresa::RazonSocial, "SUPERMERCADOS PERUANOS S.A.")
        .with_field(CampoEmpresa::Direccion, "CALLE MORELLI 181, SAN BORJA, LIMA")
        .with_field(CampoEmpresa::Email, "licitaciones@spsa.com.pe")
        .with_field(CampoEmpresa::Especialidades, vec!["BIENES".to_string(), "SERVICIOS".to_string()])
        .with_representante(
            Representante::new("ROBLES LOPEZ CARLOS", "SOCIO", "DNI", "10223344"),
        )
}
