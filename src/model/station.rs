use chrono::{DateTime, Utc};

/// A weighted market economy of a station
#[derive(Debug, Clone, PartialEq)]
pub struct StationEconomy {
    pub name: String,
    pub weight: f64,
}

/// A commodity line in a station's market
#[derive(Debug, Clone, PartialEq)]
pub struct MarketOrder {
    pub symbol: String,
    pub name: Option<String>,
    pub category: String,
    pub commodity_id: Option<i64>,
    pub demand: i64,
    pub supply: i64,
    pub buy_price: i64,
    pub sell_price: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    pub commodities: Vec<MarketOrder>,
    pub prohibited_commodities: Vec<String>,
    pub update_time: DateTime<Utc>,
}

/// A hull for sale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipyardStock {
    pub name: String,
    pub symbol: String,
    pub ship_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shipyard {
    pub ships: Vec<ShipyardStock>,
    pub update_time: DateTime<Utc>,
}

/// A module for sale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutfittingStock {
    pub name: String,
    pub symbol: String,
    pub module_id: i64,
    pub class: i64,
    pub rating: String,
    pub category: String,
    pub ship: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outfitting {
    pub modules: Vec<OutfittingStock>,
    pub update_time: DateTime<Utc>,
}

/// A station, mega ship, fleet carrier, surface port or settlement.
///
/// Fleet carriers and mega ships are mobile and may belong to neither a
/// system nor a body.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: u64,
    pub name: String,
    pub update_time: DateTime<Utc>,
    /// Name of the controlling faction in the aggregate's faction arena
    pub controlling_faction: Option<String>,
    pub controlling_faction_state: Option<String>,
    pub distance_to_arrival: Option<f64>,
    pub primary_economy: Option<String>,
    pub economies: Vec<StationEconomy>,
    pub allegiance: Option<String>,
    pub government: Option<String>,
    pub services: Vec<String>,
    pub station_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub large_landing_pads: Option<i64>,
    pub medium_landing_pads: Option<i64>,
    pub small_landing_pads: Option<i64>,
    pub market: Option<Market>,
    pub shipyard: Option<Shipyard>,
    pub outfitting: Option<Outfitting>,
    pub body_id64: Option<u64>,
    pub system_id64: Option<u64>,
}

impl Station {
    pub fn key(&self) -> String {
        format!("id={}", self.id)
    }
}
