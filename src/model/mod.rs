//! Normalized entity model for galaxy data
//!
//! These records mirror the relational tables one-to-one. Ownership is a
//! tree (system → bodies/stations → markets, ...) except for factions and
//! powers, which are shared by name and live in a per-aggregate arena
//! (see [`crate::mapping::SystemAggregate`]).

mod body;
mod station;

pub use body::*;
pub use station::*;

use chrono::{DateTime, Utc};

/// A minor faction. Globally unique by name.
///
/// Fleet carriers are controlled by a virtual faction named `FleetCarrier`
/// with neither allegiance nor government.
#[derive(Debug, Clone, PartialEq)]
pub struct Faction {
    pub name: String,
    pub allegiance: Option<String>,
    pub government: Option<String>,
}

impl Faction {
    /// A faction known only by name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allegiance: None,
            government: None,
        }
    }
}

/// A faction's influence and state within one system
#[derive(Debug, Clone, PartialEq)]
pub struct FactionState {
    pub faction_name: String,
    pub influence: f64,
    pub state: String,
}

/// A major political power. Globally unique by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Power {
    pub name: String,
}

/// A power's presence in one system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerPlay {
    pub power_name: String,
}

/// State of the Thargoid war in an affected system
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThargoidWar {
    pub current_state: Option<String>,
    pub success_state: Option<String>,
    pub failure_state: Option<String>,
    pub progress: Option<f64>,
    pub days_remaining: Option<i64>,
    pub ports_remaining: Option<i64>,
    pub success_reached: Option<bool>,
}

/// A star system: the root of every imported document
#[derive(Debug, Clone, PartialEq)]
pub struct System {
    pub id64: u64,
    /// Not unique (e.g. "AH Cancri")
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub allegiance: Option<String>,
    pub government: Option<String>,
    pub primary_economy: Option<String>,
    pub secondary_economy: Option<String>,
    pub security: Option<String>,
    pub population: Option<i64>,
    pub body_count: Option<i64>,
    /// Name of the controlling faction in the aggregate's faction arena
    pub controlling_faction: Option<String>,
    pub factions: Vec<FactionState>,
    pub powers: Vec<PowerPlay>,
    pub power_state: Option<String>,
    pub thargoid_war: Option<ThargoidWar>,
    pub date: DateTime<Utc>,
    pub bodies: Vec<Body>,
    pub stations: Vec<Station>,
}

impl System {
    pub fn key(&self) -> String {
        format!("id64={}", self.id64)
    }

    /// Every station in the system, including surface ports held by bodies
    pub fn all_stations(&self) -> impl Iterator<Item = &Station> {
        self.stations
            .iter()
            .chain(self.bodies.iter().flat_map(|b| b.stations.iter()))
    }
}
