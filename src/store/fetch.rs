//! Rebuilding aggregates from stored rows

use rusqlite::Connection;
use std::collections::BTreeMap;

use super::row::{select_one, select_where, Row, SqlValue};
use crate::error::Result;
use crate::mapping::{Aggregate, BodyAggregate, StationAggregate, SystemAggregate};
use crate::model::*;
use crate::schema::tables::*;
use crate::schema::TableSchema;

/// Every stored system id, in rowid order
pub fn system_ids(conn: &Connection) -> Result<Vec<u64>> {
    let mut stmt = conn.prepare_cached("SELECT id64 FROM system ORDER BY rowid")?;
    let ids = stmt.query_map([], |r| r.get::<_, i64>(0))?;
    Ok(ids
        .map(|id| id.map(|id| id as u64))
        .collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn fetch_system(conn: &Connection, id64: u64) -> Result<Option<SystemAggregate>> {
    let key = [SqlValue::from(id64)];
    let Some(row) = select_one(conn, &SYSTEM, &key)? else {
        return Ok(None);
    };

    let factions = children(conn, &FACTION_STATE, "system_id64", id64)?
        .iter()
        .map(|r| {
            Ok(FactionState {
                faction_name: r.text("faction_name")?,
                influence: r.real("influence")?,
                state: r.text("state")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let powers = children(conn, &POWER_PLAY, "system_id64", id64)?
        .iter()
        .map(|r| {
            Ok(PowerPlay {
                power_name: r.text("power_name")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let thargoid_war = select_one(conn, &THARGOID_WAR, &key)?
        .map(|r| thargoid_war(&r))
        .transpose()?;

    let bodies = children(conn, &BODY, "system_id64", id64)?
        .iter()
        .map(|r| body(conn, r))
        .collect::<Result<Vec<_>>>()?;
    let stations = select_where(
        conn,
        &STATION,
        &["system_id64", "body_id64"],
        &[SqlValue::from(id64), SqlValue::Null],
    )?
    .iter()
    .map(|r| station(conn, r))
    .collect::<Result<Vec<_>>>()?;

    let system = System {
        id64,
        name: row.text("name")?,
        x: row.real("x")?,
        y: row.real("y")?,
        z: row.real("z")?,
        allegiance: row.opt_text("allegiance")?,
        government: row.opt_text("government")?,
        primary_economy: row.opt_text("primary_economy")?,
        secondary_economy: row.opt_text("secondary_economy")?,
        security: row.opt_text("security")?,
        population: row.opt_int("population")?,
        body_count: row.opt_int("body_count")?,
        controlling_faction: row.opt_text("controlling_faction")?,
        factions,
        powers,
        power_state: row.opt_text("power_state")?,
        thargoid_war,
        date: row.time("date")?,
        bodies,
        stations,
    };

    let names = system
        .controlling_faction
        .iter()
        .chain(system.factions.iter().map(|f| &f.faction_name))
        .chain(system.all_stations().filter_map(|s| s.controlling_faction.as_ref()));
    let factions = faction_arena(conn, names)?;
    let powers = system
        .powers
        .iter()
        .map(|p| {
            (
                p.power_name.clone(),
                Power {
                    name: p.power_name.clone(),
                },
            )
        })
        .collect();

    Ok(Some(Aggregate {
        root: system,
        factions,
        powers,
    }))
}

pub fn fetch_body(conn: &Connection, id64: u64) -> Result<Option<BodyAggregate>> {
    let Some(row) = select_one(conn, &BODY, &[SqlValue::from(id64)])? else {
        return Ok(None);
    };
    let body = body(conn, &row)?;
    let factions = faction_arena(
        conn,
        body.stations.iter().filter_map(|s| s.controlling_faction.as_ref()),
    )?;
    Ok(Some(Aggregate {
        root: body,
        factions,
        powers: BTreeMap::new(),
    }))
}

pub fn fetch_station(conn: &Connection, id: u64) -> Result<Option<StationAggregate>> {
    let Some(row) = select_one(conn, &STATION, &[SqlValue::from(id)])? else {
        return Ok(None);
    };
    let station = station(conn, &row)?;
    let factions = faction_arena(conn, station.controlling_faction.iter())?;
    Ok(Some(Aggregate {
        root: station,
        factions,
        powers: BTreeMap::new(),
    }))
}

fn children(conn: &Connection, schema: &TableSchema, column: &str, id: u64) -> Result<Vec<Row>> {
    select_where(conn, schema, &[column], &[SqlValue::from(id)])
}

fn faction_arena<'a>(
    conn: &Connection,
    names: impl Iterator<Item = &'a String>,
) -> Result<BTreeMap<String, Faction>> {
    let mut arena = BTreeMap::new();
    for name in names {
        if arena.contains_key(name) {
            continue;
        }
        let faction = match select_one(conn, &FACTION, &[name.as_str().into()])? {
            Some(r) => Faction {
                name: name.clone(),
                allegiance: r.opt_text("allegiance")?,
                government: r.opt_text("government")?,
            },
            None => Faction::named(name.as_str()),
        };
        arena.insert(name.clone(), faction);
    }
    Ok(arena)
}

fn thargoid_war(row: &Row) -> Result<ThargoidWar> {
    Ok(ThargoidWar {
        current_state: row.opt_text("current_state")?,
        success_state: row.opt_text("success_state")?,
        failure_state: row.opt_text("failure_state")?,
        progress: row.opt_real("progress")?,
        days_remaining: row.opt_int("days_remaining")?,
        ports_remaining: row.opt_int("ports_remaining")?,
        success_reached: row.opt_bool("success_reached")?,
    })
}

fn compositions(conn: &Connection, schema: &TableSchema, id64: u64) -> Result<Vec<Composition>> {
    children(conn, schema, "body_id64", id64)?
        .iter()
        .map(|r| {
            Ok(Composition {
                name: r.text("name")?,
                percentage: r.real("percentage")?,
            })
        })
        .collect()
}

fn signals(conn: &Connection, id64: u64, ring_name: &str) -> Result<Option<Signals>> {
    let key = [SqlValue::from(id64), ring_name.into()];
    let Some(row) = select_one(conn, &SIGNALS, &key)? else {
        return Ok(None);
    };
    let owner = &["body_id64", "ring_name"];
    let signals = select_where(conn, &DETECTED_SIGNAL, owner, &key)?
        .iter()
        .map(|r| {
            Ok(DetectedSignal {
                name: r.text("name")?,
                quantity: r.int("quantity")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let genuses = select_where(conn, &DETECTED_GENUS, owner, &key)?
        .iter()
        .map(|r| r.text("name"))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(Signals {
        signals,
        genuses,
        update_time: row.time("update_time")?,
    }))
}

fn body(conn: &Connection, row: &Row) -> Result<Body> {
    let id64 = row.id("id64")?;

    let parents = children(conn, &PARENT, "body_id64", id64)?
        .iter()
        .map(|r| {
            Ok(Parent {
                kind: r.text("kind")?,
                body_id: r.int("body_id")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let belts = children(conn, &BELT, "body_id64", id64)?
        .iter()
        .map(|r| {
            Ok(Belt {
                name: r.text("name")?,
                belt_type: r.text("type")?,
                mass: r.int("mass")?,
                inner_radius: r.int("inner_radius")?,
                outer_radius: r.int("outer_radius")?,
                id64: r.opt_id("id64")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let rings = children(conn, &RING, "body_id64", id64)?
        .iter()
        .map(|r| {
            let name = r.text("name")?;
            Ok(Ring {
                signals: signals(conn, id64, &name)?,
                name,
                ring_type: r.text("type")?,
                mass: r.int("mass")?,
                inner_radius: r.int("inner_radius")?,
                outer_radius: r.int("outer_radius")?,
                id64: r.opt_id("id64")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let timestamps = children(conn, &BODY_TIMESTAMP, "body_id64", id64)?
        .iter()
        .map(|r| {
            Ok(BodyTimestamp {
                name: r.text("name")?,
                value: r.time("value")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let stations = children(conn, &STATION, "body_id64", id64)?
        .iter()
        .map(|r| station(conn, r))
        .collect::<Result<Vec<_>>>()?;

    Ok(Body {
        id64,
        body_id: row.int("body_id")?,
        name: row.text("name")?,
        body_type: row.text("type")?,
        sub_type: row.opt_text("sub_type")?,
        distance_to_arrival: row.opt_real("distance_to_arrival")?,
        main_star: row.opt_bool("main_star")?,
        age: row.opt_int("age")?,
        spectral_class: row.opt_text("spectral_class")?,
        luminosity: row.opt_text("luminosity")?,
        absolute_magnitude: row.opt_real("absolute_magnitude")?,
        solar_masses: row.opt_real("solar_masses")?,
        solar_radius: row.opt_real("solar_radius")?,
        is_landable: row.opt_bool("is_landable")?,
        gravity: row.opt_real("gravity")?,
        earth_masses: row.opt_real("earth_masses")?,
        radius: row.opt_real("radius")?,
        surface_temperature: row.opt_real("surface_temperature")?,
        surface_pressure: row.opt_real("surface_pressure")?,
        volcanism_type: row.opt_text("volcanism_type")?,
        atmosphere_type: row.opt_text("atmosphere_type")?,
        atmosphere_composition: compositions(conn, &ATMOSPHERE_COMPOSITION, id64)?,
        solid_composition: compositions(conn, &SOLID_COMPOSITION, id64)?,
        terraforming_state: row.opt_text("terraforming_state")?,
        materials: compositions(conn, &MATERIAL, id64)?,
        signals: signals(conn, id64, "")?,
        reserve_level: row.opt_text("reserve_level")?,
        rotational_period: row.opt_real("rotational_period")?,
        rotational_period_tidally_locked: row.opt_bool("rotational_period_tidally_locked")?,
        axial_tilt: row.opt_real("axial_tilt")?,
        parents,
        orbital_period: row.opt_real("orbital_period")?,
        semi_major_axis: row.opt_real("semi_major_axis")?,
        orbital_eccentricity: row.opt_real("orbital_eccentricity")?,
        orbital_inclination: row.opt_real("orbital_inclination")?,
        arg_of_periapsis: row.opt_real("arg_of_periapsis")?,
        mean_anomaly: row.opt_real("mean_anomaly")?,
        ascending_node: row.opt_real("ascending_node")?,
        belts,
        rings,
        timestamps,
        stations,
        update_time: row.time("update_time")?,
        system_id64: row.opt_id("system_id64")?,
    })
}

fn station(conn: &Connection, row: &Row) -> Result<Station> {
    let id = row.id("id")?;
    let key = [SqlValue::from(id)];

    let economies = children(conn, &STATION_ECONOMY, "station_id", id)?
        .iter()
        .map(|r| {
            Ok(StationEconomy {
                name: r.text("name")?,
                weight: r.real("weight")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let services = children(conn, &STATION_SERVICE, "station_id", id)?
        .iter()
        .map(|r| r.text("name"))
        .collect::<Result<Vec<_>>>()?;

    let market = match select_one(conn, &MARKET, &key)? {
        None => None,
        Some(m) => Some(Market {
            commodities: children(conn, &MARKET_ORDER, "station_id", id)?
                .iter()
                .map(|r| {
                    Ok(MarketOrder {
                        symbol: r.text("symbol")?,
                        name: r.opt_text("name")?,
                        category: r.text("category")?,
                        commodity_id: r.opt_int("commodity_id")?,
                        demand: r.int("demand")?,
                        supply: r.int("supply")?,
                        buy_price: r.int("buy_price")?,
                        sell_price: r.int("sell_price")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            prohibited_commodities: children(conn, &PROHIBITED_COMMODITY, "station_id", id)?
                .iter()
                .map(|r| r.text("name"))
                .collect::<Result<Vec<_>>>()?,
            update_time: m.time("update_time")?,
        }),
    };
    let shipyard = match select_one(conn, &SHIPYARD, &key)? {
        None => None,
        Some(s) => Some(Shipyard {
            ships: children(conn, &SHIPYARD_STOCK, "station_id", id)?
                .iter()
                .map(|r| {
                    Ok(ShipyardStock {
                        name: r.text("name")?,
                        symbol: r.text("symbol")?,
                        ship_id: r.int("ship_id")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            update_time: s.time("update_time")?,
        }),
    };
    let outfitting = match select_one(conn, &OUTFITTING, &key)? {
        None => None,
        Some(o) => Some(Outfitting {
            modules: children(conn, &OUTFITTING_STOCK, "station_id", id)?
                .iter()
                .map(|r| {
                    Ok(OutfittingStock {
                        name: r.text("name")?,
                        symbol: r.text("symbol")?,
                        module_id: r.int("module_id")?,
                        class: r.int("class")?,
                        rating: r.text("rating")?,
                        category: r.text("category")?,
                        ship: r.opt_text("ship")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            update_time: o.time("update_time")?,
        }),
    };

    Ok(Station {
        id,
        name: row.text("name")?,
        update_time: row.time("update_time")?,
        controlling_faction: row.opt_text("controlling_faction")?,
        controlling_faction_state: row.opt_text("controlling_faction_state")?,
        distance_to_arrival: row.opt_real("distance_to_arrival")?,
        primary_economy: row.opt_text("primary_economy")?,
        economies,
        allegiance: row.opt_text("allegiance")?,
        government: row.opt_text("government")?,
        services,
        station_type: row.opt_text("type")?,
        latitude: row.opt_real("latitude")?,
        longitude: row.opt_real("longitude")?,
        large_landing_pads: row.opt_int("large_landing_pads")?,
        medium_landing_pads: row.opt_int("medium_landing_pads")?,
        small_landing_pads: row.opt_int("small_landing_pads")?,
        market,
        shipyard,
        outfitting,
        body_id64: row.opt_id("body_id64")?,
        system_id64: row.opt_id("system_id64")?,
    })
}

#[cfg(test)]
mod tests {
    use crate::mapping::{dump_station, dump_system, load_station, load_system};
    use crate::store::GalaxyStore;
    use serde_json::json;

    #[test]
    fn test_missing_rows_fetch_as_none() {
        let store = GalaxyStore::open_in_memory().unwrap();
        store.create_tables().unwrap();
        assert!(store.fetch_system(1).unwrap().is_none());
        assert!(store.fetch_body(1).unwrap().is_none());
        assert!(store.fetch_station(1).unwrap().is_none());
        assert!(store.system_ids().unwrap().is_empty());
    }

    #[test]
    fn test_system_round_trips_through_store() {
        let doc = json!({
            "id64": 10477373803u64,
            "name": "Sol",
            "coords": {"x": 0, "y": 0, "z": 0},
            "allegiance": "Federation",
            "government": "Democracy",
            "primaryEconomy": "Refinery",
            "secondaryEconomy": "Service",
            "security": "High",
            "population": 22780919531u64,
            "bodyCount": 40,
            "controllingFaction": {"name": "Mother Gaia", "allegiance": "Federation", "government": "Democracy"},
            "factions": [
                {"name": "Mother Gaia", "allegiance": "Federation", "government": "Democracy", "influence": 0.6, "state": "Boom"},
                {"name": "Sol Workers' Party", "allegiance": "Independent", "government": "Democracy", "influence": 0.4, "state": "None"}
            ],
            "powers": ["Zachary Hudson"],
            "powerState": "Controlled",
            "date": "2023-06-12 05:05:24+00",
            "bodies": [{
                "id64": 10477373803u64,
                "bodyId": 0,
                "name": "Sol",
                "type": "Star",
                "subType": "G (White-Yellow) Star",
                "mainStar": true,
                "solidComposition": {"Ice": 0.5, "Rock": 0.5},
                "parents": [{"Null": 0}],
                "updateTime": "2023-06-12 05:05:24+00",
                "stations": [{"name": "Surface", "id": 2, "updateTime": "2023-06-12 05:05:24+00"}]
            }],
            "stations": [{
                "name": "Abraham Lincoln",
                "id": 1,
                "updateTime": "2023-06-12 05:05:24+00",
                "controllingFaction": "Mother Gaia",
                "controllingFactionState": "Boom",
                "services": ["Market", "Shipyard"],
                "shipyard": {"ships": [{"name": "Sidewinder", "symbol": "SideWinder", "shipId": 128049249}], "updateTime": "2023-06-12 05:05:24+00"}
            }]
        });
        let loaded = load_system(&doc).unwrap();

        let mut store = GalaxyStore::open_in_memory().unwrap();
        store.create_tables().unwrap();
        store.apply_system(&loaded).unwrap();

        let fetched = store.fetch_system(10477373803).unwrap().unwrap();
        assert_eq!(fetched, loaded);
        assert_eq!(dump_system(&fetched), dump_system(&loaded));
        assert_eq!(store.system_ids().unwrap(), vec![10477373803]);
    }

    #[test]
    fn test_large_ids_keep_their_value() {
        let doc = json!({
            "name": "Carrier",
            "id": 18446744073709551000u64,
            "updateTime": "2023-06-12 05:05:24+00",
            "controllingFaction": "FleetCarrier",
            "government": "Fleet Carrier"
        });
        let loaded = load_station(&doc).unwrap();
        let mut store = GalaxyStore::open_in_memory().unwrap();
        store.create_tables().unwrap();
        store.apply_station(&loaded).unwrap();

        let fetched = store.fetch_station(18446744073709551000).unwrap().unwrap();
        assert_eq!(dump_station(&fetched), dump_station(&loaded));
        assert_eq!(
            fetched.faction("FleetCarrier").unwrap().government.as_deref(),
            Some("Fleet Carrier")
        );
    }
}
