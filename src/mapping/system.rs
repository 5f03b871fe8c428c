//! Whole-document loading and dumping
//!
//! A system document is decoded in a fixed order: the `factions` influence
//! list first, then `controllingFaction`, powers, the Thargoid war, bodies
//! and finally stations. Faction data embedded in stations is unreliable,
//! so the system-level list has to be in the identity index before any
//! station reference is settled by [`repair`].

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::debug;

use super::faction::encode_controlling_faction;
use super::{
    decode_body, decode_controlling_faction, decode_faction_state, decode_station,
    decode_thargoid_war, encode_body, encode_faction_state, encode_station, encode_thargoid_war,
    number, prune, Fields,
};
use crate::error::Result;
use crate::identity::IdentityIndex;
use crate::model::{Body, Faction, Power, PowerPlay, Station, System};

/// Keys the producer writes for every system, even when null
const SYSTEM_REQUIRED: &[&str] = &[
    "id64",
    "name",
    "coords",
    "allegiance",
    "government",
    "primaryEconomy",
    "secondaryEconomy",
    "security",
    "population",
    "date",
];

/// A decoded document: the root entity plus the canonical faction and
/// power instances its references point at.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate<T> {
    pub root: T,
    pub factions: BTreeMap<String, Faction>,
    pub powers: BTreeMap<String, Power>,
}

pub type SystemAggregate = Aggregate<System>;
pub type BodyAggregate = Aggregate<Body>;
pub type StationAggregate = Aggregate<Station>;

impl<T> Aggregate<T> {
    pub fn faction(&self, name: &str) -> Option<&Faction> {
        self.factions.get(name)
    }
}

/// Decode a full system document with a fresh identity index
pub fn load_system(value: &Value) -> Result<SystemAggregate> {
    let fields = Fields::new("System", value)?;
    let id64 = fields.req_u64("id64")?;
    let fields = fields.keyed(format!("id64={}", id64));
    let key = fields.key().to_string();

    let coords = fields
        .opt_object("coords")?
        .ok_or_else(|| fields.error("missing required field 'coords'"))?;
    let axis = |name: &str| {
        coords
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| fields.error(format!("coords.{} should be a number", name)))
    };
    let (x, y, z) = (axis("x")?, axis("y")?, axis("z")?);

    let mut index = IdentityIndex::new();

    let mut factions = Vec::new();
    for entry in fields.array("factions")? {
        let state =
            decode_faction_state(entry, &mut index).map_err(|e| e.within("System", &key))?;
        factions.push(state);
    }

    let controlling_faction = match fields.get("controllingFaction") {
        Some(v) => {
            Some(decode_controlling_faction(v, &mut index).map_err(|e| e.within("System", &key))?)
        }
        None => None,
    };

    let mut powers: Vec<PowerPlay> = Vec::new();
    for name in fields.strings("powers")? {
        let power_name = index.intern_power(&name);
        if !powers.iter().any(|p| p.power_name == power_name) {
            powers.push(PowerPlay { power_name });
        }
    }

    let thargoid_war = fields
        .get("thargoidWar")
        .map(decode_thargoid_war)
        .transpose()
        .map_err(|e| e.within("System", &key))?;

    let mut bodies = Vec::new();
    for entry in fields.array("bodies")? {
        let mut body = decode_body(entry).map_err(|e| e.within("System", &key))?;
        body.system_id64 = Some(id64);
        for station in &mut body.stations {
            station.system_id64 = Some(id64);
        }
        bodies.push(body);
    }

    let mut stations = Vec::new();
    for entry in fields.array("stations")? {
        let mut station = decode_station(entry).map_err(|e| e.within("System", &key))?;
        station.system_id64 = Some(id64);
        stations.push(station);
    }

    let system = System {
        id64,
        name: fields.req_str("name")?,
        x,
        y,
        z,
        allegiance: fields.opt_str("allegiance")?,
        government: fields.opt_str("government")?.or_else(|| Some("None".into())),
        primary_economy: fields.opt_str("primaryEconomy")?.or_else(|| Some("None".into())),
        secondary_economy: fields
            .opt_str("secondaryEconomy")?
            .or_else(|| Some("None".into())),
        security: fields.opt_str("security")?.or_else(|| Some("Anarchy".into())),
        population: fields.opt_i64("population")?.or(Some(0)),
        body_count: fields.opt_i64("bodyCount")?,
        controlling_faction,
        factions,
        powers,
        power_state: fields.opt_str("powerState")?,
        thargoid_war,
        date: fields.req_time("date")?,
        bodies,
        stations,
    };

    debug!(
        system = %system.key(),
        bodies = system.bodies.len(),
        stations = system.all_stations().count(),
        "decoded system"
    );
    Ok(repair(system, index))
}

/// Settle station faction references against the identity index.
///
/// Every station reference whose name is already indexed keeps pointing at
/// the canonical instance, so the station's own allegiance and government
/// never overwrite the system-level faction. A name seen nowhere else in
/// the document (e.g. `FleetCarrier`) is registered from the station's
/// data instead of being rejected.
pub fn repair(system: System, mut index: IdentityIndex) -> SystemAggregate {
    settle_station_factions(system.all_stations(), &mut index);
    let (factions, powers) = index.into_arenas();
    Aggregate {
        root: system,
        factions,
        powers,
    }
}

fn settle_station_factions<'a>(
    stations: impl Iterator<Item = &'a Station>,
    index: &mut IdentityIndex,
) {
    for station in stations {
        let Some(name) = &station.controlling_faction else {
            continue;
        };
        if index.resolve_faction(name).is_none() {
            debug!(station = %station.key(), faction = %name, "registering station-only faction");
            index.register_faction(Faction {
                name: name.clone(),
                allegiance: station.allegiance.clone(),
                government: station.government.clone(),
            });
        }
    }
}

/// Encode a system aggregate in the producer's layout
pub fn dump_system(aggregate: &SystemAggregate) -> Value {
    let system = &aggregate.root;

    let controlling_faction = system.controlling_faction.as_ref().map(|name| {
        aggregate
            .faction(name)
            .map(encode_controlling_faction)
            .unwrap_or_else(|| encode_controlling_faction(&Faction::named(name.as_str())))
    });

    let mut out = super::Out::new();
    out.put("id64", system.id64)
        .put("name", system.name.as_str())
        .put(
            "coords",
            json!({"x": number(system.x), "y": number(system.y), "z": number(system.z)}),
        )
        .put("allegiance", system.allegiance.clone())
        .put("government", system.government.clone())
        .put("primaryEconomy", system.primary_economy.clone())
        .put("secondaryEconomy", system.secondary_economy.clone())
        .put("security", system.security.clone())
        .put("population", system.population)
        .put("bodyCount", system.body_count)
        .put("controllingFaction", controlling_faction)
        .put(
            "factions",
            system
                .factions
                .iter()
                .map(|s| encode_faction_state(s, &aggregate.factions))
                .collect::<Vec<_>>(),
        )
        .put(
            "powers",
            system
                .powers
                .iter()
                .map(|p| Value::from(p.power_name.as_str()))
                .collect::<Vec<_>>(),
        )
        .put("powerState", system.power_state.clone())
        .put("thargoidWar", system.thargoid_war.as_ref().map(encode_thargoid_war))
        .time("date", &system.date)
        .put(
            "bodies",
            system.bodies.iter().map(encode_body).collect::<Vec<_>>(),
        )
        .put(
            "stations",
            system.stations.iter().map(encode_station).collect::<Vec<_>>(),
        );

    let mut value = out.build();
    prune(&mut value, SYSTEM_REQUIRED);
    value
}

/// Decode a body document that arrives without its system
pub fn load_body(value: &Value) -> Result<BodyAggregate> {
    let body = decode_body(value)?;
    let mut index = IdentityIndex::new();
    settle_station_factions(body.stations.iter(), &mut index);
    let (factions, powers) = index.into_arenas();
    Ok(Aggregate {
        root: body,
        factions,
        powers,
    })
}

pub fn dump_body(aggregate: &BodyAggregate) -> Value {
    encode_body(&aggregate.root)
}

/// Decode a station document that arrives without its system, such as a
/// fleet carrier or mega ship
pub fn load_station(value: &Value) -> Result<StationAggregate> {
    let station = decode_station(value)?;
    let mut index = IdentityIndex::new();
    settle_station_factions(std::iter::once(&station), &mut index);
    let (factions, powers) = index.into_arenas();
    Ok(Aggregate {
        root: station,
        factions,
        powers,
    })
}

pub fn dump_station(aggregate: &StationAggregate) -> Value {
    encode_station(&aggregate.root)
}
