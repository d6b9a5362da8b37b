//! Creation mode state machine
//!
//! ```text
//! INIT --Start--> ATTEMPTING_AUTOMATIC --Settled--> AUTOMATIC_READY
//!                                                   AWAITING_MANUAL
//!                                                   MIXED_READY
//!                                                   MANUAL_READY
//! ```
//!
//! Terminal states accept no further events.

use crate::fusion::MergedRecord;
use crate::types::{Fuente, RawSourceResult, SourceStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Selector state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModeState {
    Init,
    AttemptingAutomatic,
    AutomaticReady,
    AwaitingManual,
    MixedReady,
    ManualReady,
}

/// How the empresa is (to be) created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreationMode {
    Automatic,
    ManualRequired,
    Mixed,
    /// Manual form only, no automated data
    Manual,
}

impl ModeState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Init | Self::AttemptingAutomatic)
    }

    /// Creation mode a terminal state implies
    pub fn creation_mode(self) -> Option<CreationMode> {
        match self {
            Self::AutomaticReady => Some(CreationMode::Automatic),
            Self::AwaitingManual => Some(CreationMode::ManualRequired),
            Self::MixedReady => Some(CreationMode::Mixed),
            Self::ManualReady => Some(CreationMode::Manual),
            Self::Init | Self::AttemptingAutomatic => None,
        }
    }
}

/// What the sources produced, once every call settled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettledSources {
    /// Some automated source returned SUCCESS with data
    pub automated_success: bool,
    /// Some automated source contributed to the merged record
    pub automated_data: bool,
    /// The manual form contributed to the merged record
    pub manual_supplied: bool,
    pub score: f64,
}

impl SettledSources {
    pub fn from_results(results: &[RawSourceResult], record: &MergedRecord, score: f64) -> Self {
        Self {
            automated_success: results
                .iter()
                .any(|r| r.source.is_automated() && r.status == SourceStatus::Success && r.has_data()),
            automated_data: record.fuentes_consultadas.iter().any(|f| f.is_automated()),
            manual_supplied: record.fuentes_consultadas.contains(&Fuente::Manual),
            score,
        }
    }
}

/// Selector events
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModeEvent {
    Start,
    Settled(SettledSources),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModeError {
    #[error("Invalid transition from {state:?} on {event}")]
    InvalidTransition { state: ModeState, event: &'static str },
}

impl ModeEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::Settled(_) => "Settled",
        }
    }
}

/// Mode selector
#[derive(Debug, Clone, Copy)]
pub struct ModeSelector {
    buena_threshold: f64,
}

impl ModeSelector {
    pub fn new(buena_threshold: f64) -> Self {
        Self { buena_threshold }
    }

    /// Apply one event
    pub fn transition(&self, state: ModeState, event: ModeEvent) -> Result<ModeState, ModeError> {
        match (state, event) {
            (ModeState::Init, ModeEvent::Start) => Ok(ModeState::AttemptingAutomatic),
            (ModeState::AttemptingAutomatic, ModeEvent::Settled(settled)) => Ok(self.settle(&settled)),
            (state, event) => Err(ModeError::InvalidTransition {
                state,
                event: event.name(),
            }),
        }
    }

    fn settle(&self, s: &SettledSources) -> ModeState {
        if !s.automated_data {
            return if s.manual_supplied {
                ModeState::ManualReady
            } else {
                ModeState::AwaitingManual
            };
        }

        if s.automated_success && s.score >= self.buena_threshold && !s.manual_supplied {
            ModeState::AutomaticReady
        } else {
            ModeState::MixedReady
        }
    }

    /// Terminal state reached from INIT once the sources settle
    ///
    /// Same result as stepping [`ModeEvent::Start`] then [`ModeEvent::Settled`]
    /// through [`ModeSelector::transition`].
    pub fn select(&self, settled: SettledSources) -> ModeState {
        let state = self.settle(&settled);
        debug!(
            state = ?state,
            score = settled.score,
            automated_success = settled.automated_success,
            manual = settled.manual_supplied,
            "Creation mode selected"
        );
        state
    }
}
