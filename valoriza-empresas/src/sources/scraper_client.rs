// Tier 1: Scraping service client (SUNAT and OSCE)
//
// Both registries are scraped by a companion HTTP service; this adapter
// queries it and maps the JSON payload to canonical fields.
//
// SUNAT: GET {base}/consulta-ruc/{ruc}
// OSCE:  GET {base}/api/v1/osce/consultar/{ruc}

use crate::sources::{SourceAdapter, SourceError};
use crate::types::{is_blank, CampoEmpresa, FieldValue, Fuente, RawSourceResult, Representante};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, info};
use valoriza_common::config::ScraperConfig;

/// Scraper payload (union of the SUNAT and OSCE response shapes)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ScraperPayload {
    error: bool,
    message: Option<String>,
    ruc: Option<String>,
    razon_social: Option<String>,
    domicilio_fiscal: Option<String>,
    direccion: Option<String>,
    telefono: Option<String>,
    email: Option<String>,
    estado: Option<String>,
    estado_registro: Option<String>,
    pagina_web: Option<String>,
    especialidades: Vec<String>,
    representantes: Vec<RepresentantePayload>,
    integrantes: Vec<RepresentantePayload>,
    contacto: Option<ContactoPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RepresentantePayload {
    nombre: String,
    cargo: Option<String>,
    #[serde(alias = "tipo_doc")]
    tipo_documento: Option<String>,
    #[serde(alias = "numero_doc")]
    numero_documento: Option<String>,
    fecha_desde: Option<String>,
    participacion: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContactoPayload {
    telefono: Option<String>,
    email: Option<String>,
    direccion: Option<String>,
    ciudad: Option<String>,
    departamento: Option<String>,
}

type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Scraping service adapter
///
/// One instance per registry; each carries its own rate limiter.
pub struct ScraperServiceAdapter {
    fuente: Fuente,
    client: Client,
    base_url: String,
    user_agent: String,
    rate_limiter: DirectRateLimiter,
}

impl ScraperServiceAdapter {
    /// Create an adapter for an automated source
    ///
    /// # Errors
    /// Rejects [`Fuente::Manual`] and HTTP client build failures.
    pub fn new(fuente: Fuente, config: &ScraperConfig) -> Result<Self, SourceError> {
        if !fuente.is_automated() {
            return Err(SourceError::Config(format!(
                "{} is not served by the scraping service",
                fuente
            )));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| SourceError::Config(format!("HTTP client build failed: {}", e)))?;

        let per_second = NonZeroU32::new(config.solicitudes_por_segundo)
            .ok_or_else(|| SourceError::Config("solicitudes_por_segundo must be > 0".to_string()))?;

        Ok(Self {
            fuente,
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config
                .user_agent
                .clone()
                .unwrap_or_else(valoriza_common::config::get_user_agent),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    pub fn sunat(config: &ScraperConfig) -> Result<Self, SourceError> {
        Self::new(Fuente::Sunat, config)
    }

    pub fn osce(config: &ScraperConfig) -> Result<Self, SourceError> {
        Self::new(Fuente::Osce, config)
    }

    fn url(&self, ruc: &str) -> String {
        match self.fuente {
            Fuente::Osce => format!("{}/api/v1/osce/consultar/{}", self.base_url, ruc),
            _ => format!("{}/consulta-ruc/{}", self.base_url, ruc),
        }
    }
}

#[async_trait]
impl SourceAdapter for ScraperServiceAdapter {
    fn fuente(&self) -> Fuente {
        self.fuente
    }

    async fn fetch(&self, ruc: &str, timeout: Duration) -> Result<RawSourceResult, SourceError> {
        self.rate_limiter.until_ready().await;

        let url = self.url(ruc);
        debug!(source = %self.fuente, url = %url, "Querying scraping service");

        let response = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(RawSourceResult::failed(
                self.fuente,
                format!("RUC {} no encontrado en {}", ruc, self.fuente),
            ));
        } else if !status.is_success() {
            return Err(SourceError::Http(format!(
                "{} returned status {}",
                self.fuente, status
            )));
        }

        let payload: ScraperPayload = response.json().await?;
        let result = map_payload(self.fuente, ruc, payload);

        info!(
            source = %self.fuente,
            ruc = %ruc,
            status = ?result.status,
            fields = result.fields.len(),
            representantes = result.representantes.len(),
            "Scraping service lookup complete"
        );

        Ok(result)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !is_blank(v)).map(|v| v.trim().to_string())
}

/// Map a scraper payload to canonical fields
pub(crate) fn map_payload(fuente: Fuente, ruc: &str, payload: ScraperPayload) -> RawSourceResult {
    if payload.error {
        return RawSourceResult::errored(
            fuente,
            payload
                .message
                .unwrap_or_else(|| format!("{} reported an error", fuente)),
        );
    }

    let contacto = payload.contacto.unwrap_or_default();
    let razon_social = non_blank(payload.razon_social);

    let representantes: Vec<Representante> = payload
        .representantes
        .into_iter()
        .chain(payload.integrantes)
        .filter(|r| !is_blank(&r.nombre))
        .map(|r| Representante {
            nombre: r.nombre.trim().to_string(),
            cargo: non_blank(r.cargo).unwrap_or_default(),
            tipo_documento: non_blank(r.tipo_documento).unwrap_or_default(),
            numero_documento: non_blank(r.numero_documento).unwrap_or_default(),
            fecha_desde: non_blank(r.fecha_desde),
            participacion: non_blank(r.participacion),
            ..Default::default()
        })
        .collect();

    let fields: Vec<(CampoEmpresa, Option<FieldValue>)> = vec![
        (
            CampoEmpresa::Ruc,
            Some(non_blank(payload.ruc).unwrap_or_else(|| ruc.to_string()).into()),
        ),
        (CampoEmpresa::RazonSocial, razon_social.clone().map(Into::into)),
        (
            CampoEmpresa::Direccion,
            non_blank(payload.domicilio_fiscal)
                .or_else(|| non_blank(payload.direccion))
                .or_else(|| non_blank(contacto.direccion))
                .map(Into::into),
        ),
        (
            CampoEmpresa::Telefono,
            non_blank(payload.telefono)
                .or_else(|| non_blank(contacto.telefono))
                .map(Into::into),
        ),
        (
            CampoEmpresa::Email,
            non_blank(payload.email)
                .or_else(|| non_blank(contacto.email))
                .map(Into::into),
        ),
        (
            CampoEmpresa::Estado,
            non_blank(payload.estado)
                .or_else(|| non_blank(payload.estado_registro))
                .map(Into::into),
        ),
        (CampoEmpresa::PaginaWeb, non_blank(payload.pagina_web).map(Into::into)),
        (
            CampoEmpresa::Departamento,
            non_blank(contacto.departamento)
                .or_else(|| non_blank(contacto.ciudad))
                .map(Into::into),
        ),
        (
            CampoEmpresa::Especialidades,
            Some(FieldValue::List(payload.especialidades)).filter(|v| !v.is_empty()),
        ),
    ];

    let has_payload_data = razon_social.is_some()
        || !representantes.is_empty()
        || fields.iter().skip(1).any(|(_, v)| v.is_some());
    if !has_payload_data {
        return RawSourceResult::failed(fuente, format!("{} devolvió una respuesta vacía", fuente));
    }

    let base = if razon_social.is_some() && !representantes.is_empty() {
        RawSourceResult::success(fuente)
    } else {
        RawSourceResult::partial(fuente)
    };

    let result = fields
        .into_iter()
        .filter_map(|(campo, value)| value.map(|v| (campo, v)))
        .fold(base, |acc, (campo, value)| acc.with_field(campo, value));

    representantes
        .into_iter()
        .fold(result, |acc, rep| acc.with_representante(rep))
}
