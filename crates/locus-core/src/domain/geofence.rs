use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Location, UtcDateTime, ValidationError};

/// Geofence transition kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceTransition {
    Enter,
    Exit,
    Dwell,
}

impl GeofenceTransition {
    pub const ALL: [Self; 3] = [Self::Enter, Self::Exit, Self::Dwell];

    const fn bit(self) -> u8 {
        match self {
            Self::Enter => 0b001,
            Self::Exit => 0b010,
            Self::Dwell => 0b100,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enter => "enter",
            Self::Exit => "exit",
            Self::Dwell => "dwell",
        }
    }
}

impl Display for GeofenceTransition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of transitions a geofence reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionSet(u8);

impl TransitionSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn enter_exit() -> Self {
        Self(GeofenceTransition::Enter.bit() | GeofenceTransition::Exit.bit())
    }

    pub const fn with(self, transition: GeofenceTransition) -> Self {
        Self(self.0 | transition.bit())
    }

    pub const fn contains(self, transition: GeofenceTransition) -> bool {
        self.0 & transition.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// A circular region to monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f32,
    pub transitions: TransitionSet,
    /// Absent means the geofence never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<UtcDateTime>,
    /// Time inside the region before a dwell transition is reported.
    #[serde(default, with = "crate::params::duration_millis")]
    pub loitering_delay: Duration,
}

impl Geofence {
    pub fn new(
        id: impl Into<String>,
        center: &Location,
        radius_m: f32,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyGeofenceId);
        }
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(ValidationError::InvalidRadius { value: radius_m });
        }

        Ok(Self {
            id,
            latitude: center.latitude,
            longitude: center.longitude,
            radius_m,
            transitions: TransitionSet::enter_exit(),
            expires_at: None,
            loitering_delay: Duration::ZERO,
        })
    }

    pub fn with_transitions(mut self, transitions: TransitionSet) -> Result<Self, ValidationError> {
        if transitions.is_empty() {
            return Err(ValidationError::NoGeofenceTransitions {
                id: self.id.clone(),
            });
        }
        self.transitions = transitions;
        Ok(self)
    }

    pub fn with_expiration(mut self, expires_at: UtcDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_loitering_delay(mut self, delay: Duration) -> Self {
        self.loitering_delay = delay;
        self.transitions = self.transitions.with(GeofenceTransition::Dwell);
        self
    }

    pub fn center(&self) -> Result<Location, ValidationError> {
        Location::new(self.latitude, self.longitude)
    }

    pub fn contains(&self, location: &Location) -> bool {
        self.center()
            .map(|center| center.distance_to(location) <= f64::from(self.radius_m))
            .unwrap_or(false)
    }
}

/// A batch of geofences to register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceRequest {
    geofences: Vec<Geofence>,
}

impl GeofenceRequest {
    pub fn new(geofences: Vec<Geofence>) -> Result<Self, ValidationError> {
        if geofences.is_empty() {
            return Err(ValidationError::EmptyGeofenceList);
        }
        let mut seen = HashSet::with_capacity(geofences.len());
        for geofence in &geofences {
            if !seen.insert(geofence.id.as_str()) {
                return Err(ValidationError::DuplicateGeofenceId {
                    id: geofence.id.clone(),
                });
            }
        }
        Ok(Self { geofences })
    }

    pub fn geofences(&self) -> &[Geofence] {
        &self.geofences
    }

    pub fn ids(&self) -> Vec<String> {
        self.geofences.iter().map(|g| g.id.clone()).collect()
    }
}

/// Opaque registration handle returned by a provider when geofences are added.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeofenceHandle(pub String);

/// What to remove. Removing "nothing" cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceRemoval {
    Ids(Vec<String>),
    Handle(GeofenceHandle),
}

impl GeofenceRemoval {
    pub fn by_ids<I, S>(ids: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = ids.into_iter().map(Into::into).collect::<Vec<String>>();
        if ids.is_empty() {
            return Err(ValidationError::EmptyGeofenceIds);
        }
        if ids.iter().any(|id| id.trim().is_empty()) {
            return Err(ValidationError::EmptyGeofenceId);
        }
        Ok(Self::Ids(ids))
    }

    pub fn by_handle(handle: GeofenceHandle) -> Self {
        Self::Handle(handle)
    }
}

/// Values emitted by a geofence-add provider: one registration, then transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GeofenceEvent {
    Registered {
        handle: GeofenceHandle,
        ids: Vec<String>,
    },
    Transition {
        geofence_id: String,
        transition: GeofenceTransition,
        location: Location,
    },
}

/// Result of a geofence removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeofenceRemoved {
    pub removal: GeofenceRemoval,
}
