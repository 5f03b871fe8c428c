use chrono::{DateTime, Utc};

use super::Station;

/// One named share of a body's atmosphere, solids or raw materials
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub name: String,
    pub percentage: f64,
}

/// One step of a body's orbital parent chain, e.g. `{"Star": 0}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parent {
    /// "Star", "Planet", "Ring" or "Null" (barycentre)
    pub kind: String,
    pub body_id: i64,
}

/// Detected signal counts and biological genuses on a body or ring
#[derive(Debug, Clone, PartialEq)]
pub struct Signals {
    pub signals: Vec<DetectedSignal>,
    pub genuses: Vec<String>,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedSignal {
    pub name: String,
    pub quantity: i64,
}

/// Debris orbiting one or more stars
#[derive(Debug, Clone, PartialEq)]
pub struct Belt {
    pub name: String,
    pub belt_type: String,
    pub mass: i64,
    pub inner_radius: i64,
    pub outer_radius: i64,
    pub id64: Option<u64>,
}

/// Debris in close orbit around a body
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    pub name: String,
    pub ring_type: String,
    pub mass: i64,
    pub inner_radius: i64,
    pub outer_radius: i64,
    pub id64: Option<u64>,
    pub signals: Option<Signals>,
}

/// When one of a body's fields was last scanned
#[derive(Debug, Clone, PartialEq)]
pub struct BodyTimestamp {
    pub name: String,
    pub value: DateTime<Utc>,
}

/// A star, planet or moon
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Body {
    pub id64: u64,
    pub body_id: i64,
    pub name: String,
    pub body_type: String,
    pub sub_type: Option<String>,
    pub distance_to_arrival: Option<f64>,
    pub main_star: Option<bool>,
    pub age: Option<i64>,
    pub spectral_class: Option<String>,
    pub luminosity: Option<String>,
    pub absolute_magnitude: Option<f64>,
    pub solar_masses: Option<f64>,
    pub solar_radius: Option<f64>,
    pub is_landable: Option<bool>,
    pub gravity: Option<f64>,
    pub earth_masses: Option<f64>,
    pub radius: Option<f64>,
    pub surface_temperature: Option<f64>,
    pub surface_pressure: Option<f64>,
    pub volcanism_type: Option<String>,
    pub atmosphere_type: Option<String>,
    pub atmosphere_composition: Vec<Composition>,
    pub solid_composition: Vec<Composition>,
    pub terraforming_state: Option<String>,
    pub materials: Vec<Composition>,
    pub signals: Option<Signals>,
    pub reserve_level: Option<String>,
    pub rotational_period: Option<f64>,
    pub rotational_period_tidally_locked: Option<bool>,
    pub axial_tilt: Option<f64>,
    pub parents: Vec<Parent>,
    pub orbital_period: Option<f64>,
    pub semi_major_axis: Option<f64>,
    pub orbital_eccentricity: Option<f64>,
    pub orbital_inclination: Option<f64>,
    pub arg_of_periapsis: Option<f64>,
    pub mean_anomaly: Option<f64>,
    pub ascending_node: Option<f64>,
    pub belts: Vec<Belt>,
    pub rings: Vec<Ring>,
    pub timestamps: Vec<BodyTimestamp>,
    /// Surface ports and orbital stations attached to this body
    pub stations: Vec<Station>,
    pub update_time: DateTime<Utc>,
    /// `None` while the owning system is not yet known
    pub system_id64: Option<u64>,
}

impl Body {
    pub fn key(&self) -> String {
        format!("id64={}", self.id64)
    }
}
