//! Empresa persistence seam
//!
//! The pipeline stores accepted records through [`EmpresaRepository`]. The
//! in-memory implementation backs the CLI preview and the tests.

use crate::fusion::{FuenteDatos, MergedRecord};
use crate::types::{Fuente, Representante};
use crate::validators::{QualityAssessment, Tier};
use crate::workflow::CreationMode;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersistenceError {
    #[error("Empresa con RUC {ruc} ya existe")]
    Conflict { ruc: String },

    #[error("Persistence backend error: {0}")]
    Backend(String),
}

/// Persisted shape: merged record plus quality metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmpresaPersistible {
    pub ruc: String,
    pub razon_social: String,
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
    pub fuente_datos: FuenteDatos,
    pub calidad_datos: Tier,
    pub requiere_verificacion: bool,
    pub puntuacion_calidad: f64,
    pub fuentes_consultadas: Vec<Fuente>,
    pub modo_creacion: CreationMode,
    pub creado_en: DateTime<Utc>,
}

impl EmpresaPersistible {
    /// Build the persisted shape
    ///
    /// Returns `None` when the record lacks `ruc`, `razon_social`, or any
    /// contributing source.
    pub fn build(record: &MergedRecord, assessment: &QualityAssessment, modo: CreationMode) -> Option<Self> {
        Some(Self {
            ruc: record.ruc.clone()?,
            razon_social: record.razon_social.clone()?,
            email: record.email.clone(),
            telefono: record.telefono.clone(),
            direccion: record.direccion.clone(),
            pagina_web: record.pagina_web.clone(),
            redes_sociales: record.redes_sociales.clone(),
            estado: record.estado.clone(),
            departamento: record.departamento.clone(),
            provincia: record.provincia.clone(),
            distrito: record.distrito.clone(),
            especialidades: record.especialidades.clone(),
            capital_social: record.capital_social,
            representantes: record.representantes.clone(),
            fuente_datos: record.fuente_datos()?,
            calidad_datos: assessment.tier,
            requiere_verificacion: assessment.requiere_verificacion,
            puntuacion_calidad: assessment.score,
            fuentes_consultadas: record.fuentes_consultadas.iter().copied().collect(),
            modo_creacion: modo,
            creado_en: Utc::now(),
        })
    }
}

/// Storage for consolidated empresas
#[async_trait]
pub trait EmpresaRepository: Send + Sync {
    async fn exists(&self, ruc: &str) -> Result<bool, PersistenceError>;

    /// Store a new empresa; a RUC already present is a [`PersistenceError::Conflict`]
    async fn save(&self, empresa: &EmpresaPersistible) -> Result<Uuid, PersistenceError>;
}

/// In-memory repository keyed by RUC
#[derive(Default)]
pub struct InMemoryEmpresaRepository {
    empresas: RwLock<HashMap<String, (Uuid, EmpresaPersistible)>>,
}

impl InMemoryEmpresaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, ruc: &str) -> Option<(Uuid, EmpresaPersistible)> {
        self.empresas.read().await.get(ruc).cloned()
    }

    pub async fn len(&self) -> usize {
        self.empresas.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EmpresaRepository for InMemoryEmpresaRepository {
    async fn exists(&self, ruc: &str) -> Result<bool, PersistenceError> {
        Ok(self.empresas.read().await.contains_key(ruc))
    }

    async fn save(&self, empresa: &EmpresaPersistible) -> Result<Uuid, PersistenceError> {
        let mut empresas = self.empresas.write().await;
        if empresas.contains_key(&empresa.ruc) {
            debug!(ruc = %empresa.ruc, "Duplicate RUC rejected");
            return Err(PersistenceError::Conflict {
                ruc: empresa.ruc.clone(),
            });
        }

        let id = Uuid::new_v4();
        empresas.insert(empresa.ruc.clone(), (id, empresa.clone()));
        info!(ruc = %empresa.ruc, id = %id, fuente_datos = ?empresa.fuente_datos, "Empresa stored");
        Ok(id)
    }
}
