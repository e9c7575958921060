//! Location tracking and visit history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single stay at a location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationVisit {
    /// Location name
    pub location: String,
    /// When the player arrived
    pub entry_time: DateTime<Utc>,
    /// When the player left; `None` while the visit is open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<DateTime<Utc>>,
    /// Whole minutes spent, set on exit
    #[serde(default)]
    pub duration_minutes: i64,
}

impl LocationVisit {
    fn open(location: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            location: location.into(),
            entry_time: at,
            exit_time: None,
            duration_minutes: 0,
        }
    }

    /// True while the player is still here
    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }

    fn close(&mut self, at: DateTime<Utc>) {
        self.exit_time = Some(at);
        self.duration_minutes = (at - self.entry_time).num_minutes().max(0);
    }
}

/// Where the player is and where they have been.
///
/// The visit list holds exactly one open entry, and it matches `current`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationState {
    /// Current location
    pub current: String,
    /// Location before the last move, empty if none
    #[serde(default)]
    pub previous: String,
    /// Number of distinct arrivals recorded
    pub visit_count: u32,
    /// First time any location was entered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_visit: Option<DateTime<Utc>>,
    /// Chronological visits
    #[serde(default)]
    pub history: Vec<LocationVisit>,
}

impl LocationState {
    /// Start at `location` with one open visit
    pub fn starting_at(location: impl Into<String>, at: DateTime<Utc>) -> Self {
        let location = location.into();
        Self {
            history: vec![LocationVisit::open(location.clone(), at)],
            current: location,
            previous: String::new(),
            visit_count: 1,
            first_visit: Some(at),
        }
    }

    /// Placeholder for a session whose location is not yet known
    pub fn unknown(at: DateTime<Utc>) -> Self {
        let mut state = Self::starting_at("unknown", at);
        state.visit_count = 0;
        state.first_visit = None;
        state
    }

    /// Move to `location`. Returns false (and changes nothing) when the
    /// player is already there.
    pub fn move_to(&mut self, location: &str, at: DateTime<Utc>) -> bool {
        if self.current == location {
            return false;
        }

        if let Some(visit) = self.history.iter_mut().rev().find(|v| v.is_open()) {
            visit.close(at);
        }

        self.previous = std::mem::replace(&mut self.current, location.to_string());
        self.history.push(LocationVisit::open(location, at));
        self.visit_count += 1;
        if self.first_visit.is_none() {
            self.first_visit = Some(at);
        }
        true
    }

    /// The visit the player is currently in
    pub fn open_visit(&self) -> Option<&LocationVisit> {
        self.history.iter().rev().find(|v| v.is_open())
    }

    /// Minutes spent at the current location so far
    pub fn minutes_here(&self, now: DateTime<Utc>) -> i64 {
        self.open_visit()
            .map(|v| (now - v.entry_time).num_minutes().max(0))
            .unwrap_or(0)
    }
}
