//! Guarded writes of decoded aggregates
//!
//! Every timestamped entity is looked up by primary key, checked against
//! its own clock and only then written. Owned lists (compositions,
//! economies, stock, ...) are replaced wholesale whenever their owner is
//! applied. Rows are updated in place, never replaced, so foreign keys
//! pointing at them survive.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::BTreeMap;
use tracing::debug;

use super::row::{delete_where, insert, select_one, select_where, update, Row, SqlValue};
use crate::error::Result;
use crate::guard::{self, Verdict};
use crate::mapping::{BodyAggregate, StationAggregate, SystemAggregate};
use crate::model::{
    Body, Composition, Faction, Market, Outfitting, Power, Shipyard, Signals, Station, System,
};
use crate::schema::tables::*;
use crate::schema::TableSchema;

/// How many timestamped entities a document applied or left alone
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Changes {
    pub applied: usize,
    pub skipped: usize,
}

/// Stages one document inside an open transaction
pub struct Writer<'a> {
    conn: &'a Connection,
    changes: Changes,
}

impl<'a> Writer<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            changes: Changes::default(),
        }
    }

    pub fn into_changes(self) -> Changes {
        self.changes
    }

    fn check(
        &mut self,
        entity: &'static str,
        key: &str,
        stored: Option<&Row>,
        column: &str,
        incoming: DateTime<Utc>,
    ) -> Result<Verdict> {
        let stored = stored.map(|row| row.time(column)).transpose()?;
        let verdict = guard::check(entity, key, stored, incoming)?;
        match verdict {
            Verdict::Apply => self.changes.applied += 1,
            Verdict::Skip => self.changes.skipped += 1,
        }
        Ok(verdict)
    }

    fn upsert(&self, schema: &TableSchema, row: &Row, exists: bool) -> Result<()> {
        if exists {
            update(self.conn, schema, row)?;
            Ok(())
        } else {
            insert(self.conn, schema, row)
        }
    }

    /// Delete the rows owned by `key` and insert `rows` in their place
    fn replace(
        &self,
        schema: &TableSchema,
        owner: &[&str],
        key: &[SqlValue],
        rows: impl IntoIterator<Item = Row>,
    ) -> Result<()> {
        delete_where(self.conn, schema, owner, key)?;
        for row in rows {
            insert(self.conn, schema, &row)?;
        }
        Ok(())
    }

    /// Set a pending association column if it is still NULL
    fn adopt(
        &self,
        schema: &TableSchema,
        key_column: &str,
        key: SqlValue,
        column: &str,
        value: Option<u64>,
    ) -> Result<bool> {
        let Some(value) = value else {
            return Ok(false);
        };
        let sql = format!(
            "UPDATE {} SET {} = ? WHERE {} = ? AND {} IS NULL",
            schema.name, column, key_column, column
        );
        let changed = self
            .conn
            .prepare_cached(&sql)?
            .execute(rusqlite::params![SqlValue::from(value), key])?;
        Ok(changed > 0)
    }

    /// Make sure every shared faction and power exists. A faction already
    /// stored keeps its allegiance/government where the document has none.
    pub fn save_shared(
        &mut self,
        factions: &BTreeMap<String, Faction>,
        powers: &BTreeMap<String, Power>,
    ) -> Result<()> {
        for faction in factions.values() {
            let stored = select_one(self.conn, &FACTION, &[faction.name.as_str().into()])?;
            match stored {
                None => insert(self.conn, &FACTION, &faction_row(faction))?,
                Some(row) => {
                    let merged = Faction {
                        name: faction.name.clone(),
                        allegiance: faction.allegiance.clone().or(row.opt_text("allegiance")?),
                        government: faction.government.clone().or(row.opt_text("government")?),
                    };
                    update(self.conn, &FACTION, &faction_row(&merged))?;
                }
            }
        }

        for power in powers.values() {
            let key = [SqlValue::from(power.name.as_str())];
            if select_one(self.conn, &POWER, &key)?.is_none() {
                insert(self.conn, &POWER, &Row::new(&POWER).set("name", &power.name))?;
            }
        }
        Ok(())
    }

    pub fn save_system(&mut self, aggregate: &SystemAggregate) -> Result<()> {
        self.save_shared(&aggregate.factions, &aggregate.powers)?;

        let system = &aggregate.root;
        let key = [SqlValue::from(system.id64)];
        let stored = select_one(self.conn, &SYSTEM, &key)?;
        let verdict = self.check("System", &system.key(), stored.as_ref(), "date", system.date)?;

        if verdict == Verdict::Apply {
            debug!(system = %system.key(), "applying system");
            self.upsert(&SYSTEM, &system_row(system), stored.is_some())?;
            self.replace(
                &FACTION_STATE,
                &["system_id64"],
                &key,
                system.factions.iter().map(|state| {
                    Row::new(&FACTION_STATE)
                        .set("faction_name", &state.faction_name)
                        .set("system_id64", system.id64)
                        .set("influence", state.influence)
                        .set("state", &state.state)
                }),
            )?;
            self.replace(
                &POWER_PLAY,
                &["system_id64"],
                &key,
                system.powers.iter().map(|p| {
                    Row::new(&POWER_PLAY)
                        .set("power_name", &p.power_name)
                        .set("system_id64", system.id64)
                }),
            )?;
            self.replace(
                &THARGOID_WAR,
                &["system_id64"],
                &key,
                system.thargoid_war.iter().map(|war| {
                    Row::new(&THARGOID_WAR)
                        .set("system_id64", system.id64)
                        .set("current_state", war.current_state.clone())
                        .set("success_state", war.success_state.clone())
                        .set("failure_state", war.failure_state.clone())
                        .set("progress", war.progress)
                        .set("days_remaining", war.days_remaining)
                        .set("ports_remaining", war.ports_remaining)
                        .set("success_reached", war.success_reached)
                }),
            )?;
        }

        // children run on their own clocks whatever the system verdict
        for body in &system.bodies {
            self.save_body(body)?;
        }
        for station in &system.stations {
            self.save_station(station)?;
        }
        Ok(())
    }

    pub fn save_body_document(&mut self, aggregate: &BodyAggregate) -> Result<()> {
        self.save_shared(&aggregate.factions, &aggregate.powers)?;
        self.save_body(&aggregate.root)
    }

    pub fn save_station_document(&mut self, aggregate: &StationAggregate) -> Result<()> {
        self.save_shared(&aggregate.factions, &aggregate.powers)?;
        self.save_station(&aggregate.root)
    }

    pub fn save_body(&mut self, body: &Body) -> Result<()> {
        let key = [SqlValue::from(body.id64)];
        let stored = select_one(self.conn, &BODY, &key)?;
        let verdict = self.check("Body", &body.key(), stored.as_ref(), "update_time", body.update_time)?;

        match verdict {
            Verdict::Apply => {
                let system_id64 = match (body.system_id64, &stored) {
                    (Some(id), _) => Some(id),
                    (None, Some(row)) => row.opt_id("system_id64")?,
                    (None, None) => None,
                };
                self.upsert(&BODY, &body_row(body, system_id64), stored.is_some())?;
                self.replace_body_children(body, &key)?;
            }
            Verdict::Skip => {
                if self.adopt(&BODY, "id64", key[0].clone(), "system_id64", body.system_id64)? {
                    debug!(body = %body.key(), "adopted pending body");
                }
            }
        }

        if let Some(signals) = &body.signals {
            self.save_signals(body, "", signals)?;
        }
        for ring in &body.rings {
            if let Some(signals) = &ring.signals {
                self.save_signals(body, &ring.name, signals)?;
            }
        }

        for timestamp in &body.timestamps {
            let ts_key = [SqlValue::from(body.id64), timestamp.name.as_str().into()];
            let stored = select_one(self.conn, &BODY_TIMESTAMP, &ts_key)?;
            let verdict = self.check(
                "BodyTimestamp",
                &format!("{} name={}", body.key(), timestamp.name),
                stored.as_ref(),
                "value",
                timestamp.value,
            )?;
            if verdict == Verdict::Apply {
                let row = Row::new(&BODY_TIMESTAMP)
                    .set("body_id64", body.id64)
                    .set("name", &timestamp.name)
                    .set("value", timestamp.value);
                self.upsert(&BODY_TIMESTAMP, &row, stored.is_some())?;
            }
        }

        for station in &body.stations {
            self.save_station(station)?;
        }
        Ok(())
    }

    fn replace_body_children(&self, body: &Body, key: &[SqlValue]) -> Result<()> {
        let owner = &["body_id64"];
        let compositions = |schema: &'static TableSchema, rows: &[Composition]| {
            rows.iter()
                .map(|c| {
                    Row::new(schema)
                        .set("body_id64", body.id64)
                        .set("name", &c.name)
                        .set("percentage", c.percentage)
                })
                .collect::<Vec<_>>()
        };

        self.replace(
            &ATMOSPHERE_COMPOSITION,
            owner,
            key,
            compositions(&ATMOSPHERE_COMPOSITION, &body.atmosphere_composition),
        )?;
        self.replace(
            &SOLID_COMPOSITION,
            owner,
            key,
            compositions(&SOLID_COMPOSITION, &body.solid_composition),
        )?;
        self.replace(&MATERIAL, owner, key, compositions(&MATERIAL, &body.materials))?;
        self.replace(
            &PARENT,
            owner,
            key,
            body.parents.iter().enumerate().map(|(position, p)| {
                Row::new(&PARENT)
                    .set("body_id64", body.id64)
                    .set("position", position)
                    .set("kind", &p.kind)
                    .set("body_id", p.body_id)
            }),
        )?;
        self.replace(
            &BELT,
            owner,
            key,
            body.belts.iter().map(|b| {
                Row::new(&BELT)
                    .set("body_id64", body.id64)
                    .set("name", &b.name)
                    .set("type", &b.belt_type)
                    .set("mass", b.mass)
                    .set("inner_radius", b.inner_radius)
                    .set("outer_radius", b.outer_radius)
                    .set("id64", b.id64)
            }),
        )?;
        self.replace(
            &RING,
            owner,
            key,
            body.rings.iter().map(|r| {
                Row::new(&RING)
                    .set("body_id64", body.id64)
                    .set("name", &r.name)
                    .set("type", &r.ring_type)
                    .set("mass", r.mass)
                    .set("inner_radius", r.inner_radius)
                    .set("outer_radius", r.outer_radius)
                    .set("id64", r.id64)
            }),
        )?;
        self.drop_vanished_ring_signals(body)
    }

    /// Signals of rings the body no longer lists
    fn drop_vanished_ring_signals(&self, body: &Body) -> Result<()> {
        let body_key = [SqlValue::from(body.id64)];
        for row in select_where(self.conn, &SIGNALS, &["body_id64"], &body_key)? {
            let ring_name = row.text("ring_name")?;
            if ring_name.is_empty() || body.rings.iter().any(|r| r.name == ring_name) {
                continue;
            }
            let key = [SqlValue::from(body.id64), ring_name.as_str().into()];
            let owner = &["body_id64", "ring_name"];
            delete_where(self.conn, &DETECTED_SIGNAL, owner, &key)?;
            delete_where(self.conn, &DETECTED_GENUS, owner, &key)?;
            delete_where(self.conn, &SIGNALS, owner, &key)?;
            debug!(body = %body.key(), ring = %ring_name, "dropped signals of vanished ring");
        }
        Ok(())
    }

    fn save_signals(&mut self, body: &Body, ring_name: &str, signals: &Signals) -> Result<()> {
        let key = [SqlValue::from(body.id64), ring_name.into()];
        let stored = select_one(self.conn, &SIGNALS, &key)?;
        let label = if ring_name.is_empty() {
            body.key()
        } else {
            format!("{} ring={}", body.key(), ring_name)
        };
        let verdict = self.check("Signals", &label, stored.as_ref(), "update_time", signals.update_time)?;
        if verdict == Verdict::Skip {
            return Ok(());
        }

        let row = Row::new(&SIGNALS)
            .set("body_id64", body.id64)
            .set("ring_name", ring_name)
            .set("update_time", signals.update_time);
        self.upsert(&SIGNALS, &row, stored.is_some())?;

        let owner = &["body_id64", "ring_name"];
        self.replace(
            &DETECTED_SIGNAL,
            owner,
            &key,
            signals.signals.iter().map(|s| {
                Row::new(&DETECTED_SIGNAL)
                    .set("body_id64", body.id64)
                    .set("ring_name", ring_name)
                    .set("name", &s.name)
                    .set("quantity", s.quantity)
            }),
        )?;
        self.replace(
            &DETECTED_GENUS,
            owner,
            &key,
            signals.genuses.iter().map(|g| {
                Row::new(&DETECTED_GENUS)
                    .set("body_id64", body.id64)
                    .set("ring_name", ring_name)
                    .set("name", g)
            }),
        )
    }

    pub fn save_station(&mut self, station: &Station) -> Result<()> {
        let key = [SqlValue::from(station.id)];
        let stored = select_one(self.conn, &STATION, &key)?;
        let verdict = self.check(
            "Station",
            &station.key(),
            stored.as_ref(),
            "update_time",
            station.update_time,
        )?;

        match verdict {
            Verdict::Apply => {
                let keep = |column: &str, incoming: Option<u64>| -> Result<Option<u64>> {
                    match (incoming, &stored) {
                        (Some(id), _) => Ok(Some(id)),
                        (None, Some(row)) => row.opt_id(column),
                        (None, None) => Ok(None),
                    }
                };
                // a system document decides the body link
                let body_id64 = match station.system_id64 {
                    Some(_) => station.body_id64,
                    None => keep("body_id64", station.body_id64)?,
                };
                let row = station_row(station, keep("system_id64", station.system_id64)?, body_id64);
                self.upsert(&STATION, &row, stored.is_some())?;

                self.replace(
                    &STATION_ECONOMY,
                    &["station_id"],
                    &key,
                    station.economies.iter().map(|e| {
                        Row::new(&STATION_ECONOMY)
                            .set("station_id", station.id)
                            .set("name", &e.name)
                            .set("weight", e.weight)
                    }),
                )?;
                self.replace(
                    &STATION_SERVICE,
                    &["station_id"],
                    &key,
                    station.services.iter().map(|s| {
                        Row::new(&STATION_SERVICE)
                            .set("station_id", station.id)
                            .set("name", s)
                    }),
                )?;
            }
            Verdict::Skip => {
                let system = self.adopt(&STATION, "id", key[0].clone(), "system_id64", station.system_id64)?;
                let body = self.adopt(&STATION, "id", key[0].clone(), "body_id64", station.body_id64)?;
                if system || body {
                    debug!(station = %station.key(), "adopted pending station");
                }
            }
        }

        if let Some(market) = &station.market {
            self.save_market(station, market)?;
        }
        if let Some(shipyard) = &station.shipyard {
            self.save_shipyard(station, shipyard)?;
        }
        if let Some(outfitting) = &station.outfitting {
            self.save_outfitting(station, outfitting)?;
        }
        Ok(())
    }

    /// Guard and write a one-to-one station service row; returns whether
    /// its stock should be replaced
    fn save_service(
        &mut self,
        entity: &'static str,
        schema: &TableSchema,
        station: &Station,
        update_time: DateTime<Utc>,
    ) -> Result<bool> {
        let key = [SqlValue::from(station.id)];
        let stored = select_one(self.conn, schema, &key)?;
        let verdict = self.check(entity, &station.key(), stored.as_ref(), "update_time", update_time)?;
        if verdict == Verdict::Skip {
            return Ok(false);
        }
        let row = Row::new(schema)
            .set("station_id", station.id)
            .set("update_time", update_time);
        self.upsert(schema, &row, stored.is_some())?;
        Ok(true)
    }

    fn save_market(&mut self, station: &Station, market: &Market) -> Result<()> {
        if !self.save_service("Market", &MARKET, station, market.update_time)? {
            return Ok(());
        }
        let key = [SqlValue::from(station.id)];
        self.replace(
            &MARKET_ORDER,
            &["station_id"],
            &key,
            market.commodities.iter().map(|c| {
                Row::new(&MARKET_ORDER)
                    .set("station_id", station.id)
                    .set("symbol", &c.symbol)
                    .set("name", c.name.clone())
                    .set("category", &c.category)
                    .set("commodity_id", c.commodity_id)
                    .set("demand", c.demand)
                    .set("supply", c.supply)
                    .set("buy_price", c.buy_price)
                    .set("sell_price", c.sell_price)
            }),
        )?;
        self.replace(
            &PROHIBITED_COMMODITY,
            &["station_id"],
            &key,
            market.prohibited_commodities.iter().map(|name| {
                Row::new(&PROHIBITED_COMMODITY)
                    .set("station_id", station.id)
                    .set("name", name)
            }),
        )
    }

    fn save_shipyard(&mut self, station: &Station, shipyard: &Shipyard) -> Result<()> {
        if !self.save_service("Shipyard", &SHIPYARD, station, shipyard.update_time)? {
            return Ok(());
        }
        self.replace(
            &SHIPYARD_STOCK,
            &["station_id"],
            &[SqlValue::from(station.id)],
            shipyard.ships.iter().map(|s| {
                Row::new(&SHIPYARD_STOCK)
                    .set("station_id", station.id)
                    .set("symbol", &s.symbol)
                    .set("name", &s.name)
                    .set("ship_id", s.ship_id)
            }),
        )
    }

    fn save_outfitting(&mut self, station: &Station, outfitting: &Outfitting) -> Result<()> {
        if !self.save_service("Outfitting", &OUTFITTING, station, outfitting.update_time)? {
            return Ok(());
        }
        self.replace(
            &OUTFITTING_STOCK,
            &["station_id"],
            &[SqlValue::from(station.id)],
            outfitting.modules.iter().map(|m| {
                Row::new(&OUTFITTING_STOCK)
                    .set("station_id", station.id)
                    .set("symbol", &m.symbol)
                    .set("name", &m.name)
                    .set("module_id", m.module_id)
                    .set("class", m.class)
                    .set("rating", &m.rating)
                    .set("category", &m.category)
                    .set("ship", m.ship.clone())
            }),
        )
    }
}

fn faction_row(faction: &Faction) -> Row {
    Row::new(&FACTION)
        .set("name", &faction.name)
        .set("allegiance", faction.allegiance.clone())
        .set("government", faction.government.clone())
}

fn system_row(system: &System) -> Row {
    Row::new(&SYSTEM)
        .set("id64", system.id64)
        .set("name", &system.name)
        .set("x", system.x)
        .set("y", system.y)
        .set("z", system.z)
        .set("allegiance", system.allegiance.clone())
        .set("government", system.government.clone())
        .set("primary_economy", system.primary_economy.clone())
        .set("secondary_economy", system.secondary_economy.clone())
        .set("security", system.security.clone())
        .set("population", system.population)
        .set("body_count", system.body_count)
        .set("controlling_faction", system.controlling_faction.clone())
        .set("power_state", system.power_state.clone())
        .set("date", system.date)
}

fn body_row(body: &Body, system_id64: Option<u64>) -> Row {
    Row::new(&BODY)
        .set("id64", body.id64)
        .set("system_id64", system_id64)
        .set("body_id", body.body_id)
        .set("name", &body.name)
        .set("type", &body.body_type)
        .set("sub_type", body.sub_type.clone())
        .set("distance_to_arrival", body.distance_to_arrival)
        .set("main_star", body.main_star)
        .set("age", body.age)
        .set("spectral_class", body.spectral_class.clone())
        .set("luminosity", body.luminosity.clone())
        .set("absolute_magnitude", body.absolute_magnitude)
        .set("solar_masses", body.solar_masses)
        .set("solar_radius", body.solar_radius)
        .set("is_landable", body.is_landable)
        .set("gravity", body.gravity)
        .set("earth_masses", body.earth_masses)
        .set("radius", body.radius)
        .set("surface_temperature", body.surface_temperature)
        .set("surface_pressure", body.surface_pressure)
        .set("volcanism_type", body.volcanism_type.clone())
        .set("atmosphere_type", body.atmosphere_type.clone())
        .set("terraforming_state", body.terraforming_state.clone())
        .set("reserve_level", body.reserve_level.clone())
        .set("rotational_period", body.rotational_period)
        .set(
            "rotational_period_tidally_locked",
            body.rotational_period_tidally_locked,
        )
        .set("axial_tilt", body.axial_tilt)
        .set("orbital_period", body.orbital_period)
        .set("semi_major_axis", body.semi_major_axis)
        .set("orbital_eccentricity", body.orbital_eccentricity)
        .set("orbital_inclination", body.orbital_inclination)
        .set("arg_of_periapsis", body.arg_of_periapsis)
        .set("mean_anomaly", body.mean_anomaly)
        .set("ascending_node", body.ascending_node)
        .set("update_time", body.update_time)
}

fn station_row(station: &Station, system_id64: Option<u64>, body_id64: Option<u64>) -> Row {
    Row::new(&STATION)
        .set("id", station.id)
        .set("name", &station.name)
        .set("system_id64", system_id64)
        .set("body_id64", body_id64)
        .set("update_time", station.update_time)
        .set("controlling_faction", station.controlling_faction.clone())
        .set(
            "controlling_faction_state",
            station.controlling_faction_state.clone(),
        )
        .set("distance_to_arrival", station.distance_to_arrival)
        .set("primary_economy", station.primary_economy.clone())
        .set("allegiance", station.allegiance.clone())
        .set("government", station.government.clone())
        .set("type", station.station_type.clone())
        .set("latitude", station.latitude)
        .set("longitude", station.longitude)
        .set("large_landing_pads", station.large_landing_pads)
        .set("medium_landing_pads", station.medium_landing_pads)
        .set("small_landing_pads", station.small_landing_pads)
}
