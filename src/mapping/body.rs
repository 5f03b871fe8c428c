use serde_json::{Map, Value};

use super::station::{decode_station, encode_station};
use super::{format_timestamp, number, whole_number, Fields, Out};
use crate::error::{Error, Result};
use crate::model::{Belt, Body, BodyTimestamp, Composition, DetectedSignal, Parent, Ring, Signals};

/// Decode one body, including its surface ports. The system association
/// is left pending; the system loader fills it in, and faction references
/// of the surface ports are settled by [`super::repair`].
pub fn decode_body(value: &Value) -> Result<Body> {
    let fields = Fields::new("Body", value)?;
    let id64 = fields.req_u64("id64")?;
    let fields = fields.keyed(format!("id64={}", id64));

    let stations = fields
        .array("stations")?
        .iter()
        .map(decode_station)
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .map(|mut s| {
            s.body_id64 = Some(id64);
            s
        })
        .collect();

    Ok(Body {
        id64,
        body_id: fields.req_i64("bodyId")?,
        name: fields.req_str("name")?,
        body_type: fields.req_str("type")?,
        sub_type: fields.opt_str("subType")?,
        distance_to_arrival: fields.opt_f64("distanceToArrival")?,
        main_star: fields.opt_bool("mainStar")?,
        age: fields.opt_i64("age")?,
        spectral_class: fields.opt_str("spectralClass")?,
        luminosity: fields.opt_str("luminosity")?,
        absolute_magnitude: fields.opt_f64("absoluteMagnitude")?,
        solar_masses: fields.opt_f64("solarMasses")?,
        solar_radius: fields.opt_f64("solarRadius")?,
        is_landable: fields.opt_bool("isLandable")?,
        gravity: fields.opt_f64("gravity")?,
        earth_masses: fields.opt_f64("earthMasses")?,
        radius: fields.opt_f64("radius")?,
        surface_temperature: fields.opt_f64("surfaceTemperature")?,
        surface_pressure: fields.opt_f64("surfacePressure")?,
        volcanism_type: fields.opt_str("volcanismType")?,
        atmosphere_type: fields.opt_str("atmosphereType")?,
        atmosphere_composition: compositions(&fields, "atmosphereComposition")?,
        solid_composition: compositions(&fields, "solidComposition")?,
        terraforming_state: fields.opt_str("terraformingState")?,
        materials: compositions(&fields, "materials")?,
        signals: fields
            .get("signals")
            .map(decode_signals)
            .transpose()
            .map_err(|e| e.within("Body", fields.key()))?,
        reserve_level: fields.opt_str("reserveLevel")?,
        rotational_period: fields.opt_f64("rotationalPeriod")?,
        rotational_period_tidally_locked: fields.opt_bool("rotationalPeriodTidallyLocked")?,
        axial_tilt: fields.opt_f64("axialTilt")?,
        parents: fields
            .array("parents")?
            .iter()
            .map(decode_parent)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.within("Body", fields.key()))?,
        orbital_period: fields.opt_f64("orbitalPeriod")?,
        semi_major_axis: fields.opt_f64("semiMajorAxis")?,
        orbital_eccentricity: fields.opt_f64("orbitalEccentricity")?,
        orbital_inclination: fields.opt_f64("orbitalInclination")?,
        arg_of_periapsis: fields.opt_f64("argOfPeriapsis")?,
        mean_anomaly: fields.opt_f64("meanAnomaly")?,
        ascending_node: fields.opt_f64("ascendingNode")?,
        belts: fields
            .array("belts")?
            .iter()
            .map(decode_belt)
            .collect::<Result<Vec<_>>>()?,
        rings: fields
            .array("rings")?
            .iter()
            .map(decode_ring)
            .collect::<Result<Vec<_>>>()?,
        timestamps: fields
            .time_pairs("timestamps")?
            .into_iter()
            .map(|(name, value)| BodyTimestamp { name, value })
            .collect(),
        stations,
        update_time: fields.req_time("updateTime")?,
        system_id64: None,
    })
}

pub fn encode_body(body: &Body) -> Value {
    Out::new()
        .put("id64", body.id64)
        .put("bodyId", body.body_id)
        .put("name", body.name.as_str())
        .put("type", body.body_type.as_str())
        .opt("subType", body.sub_type.clone())
        .opt("distanceToArrival", body.distance_to_arrival.map(whole_number))
        .opt("mainStar", body.main_star)
        .opt("age", body.age)
        .opt("spectralClass", body.spectral_class.clone())
        .opt("luminosity", body.luminosity.clone())
        .opt_num("absoluteMagnitude", body.absolute_magnitude)
        .opt_num("solarMasses", body.solar_masses)
        .opt_num("solarRadius", body.solar_radius)
        .opt("isLandable", body.is_landable)
        .opt_num("gravity", body.gravity)
        .opt_num("earthMasses", body.earth_masses)
        .opt_num("radius", body.radius)
        .opt_num("surfaceTemperature", body.surface_temperature)
        .opt_num("surfacePressure", body.surface_pressure)
        .opt("volcanismType", body.volcanism_type.clone())
        .opt("atmosphereType", body.atmosphere_type.clone())
        .pairs("atmosphereComposition", composition_pairs(&body.atmosphere_composition))
        .pairs("solidComposition", composition_pairs(&body.solid_composition))
        .opt("terraformingState", body.terraforming_state.clone())
        .pairs("materials", composition_pairs(&body.materials))
        .opt("signals", body.signals.as_ref().map(encode_signals))
        .opt("reserveLevel", body.reserve_level.clone())
        .opt_num("rotationalPeriod", body.rotational_period)
        .opt("rotationalPeriodTidallyLocked", body.rotational_period_tidally_locked)
        .opt_num("axialTilt", body.axial_tilt)
        .list("parents", body.parents.iter().map(encode_parent).collect())
        .opt_num("orbitalPeriod", body.orbital_period)
        .opt_num("semiMajorAxis", body.semi_major_axis)
        .opt_num("orbitalEccentricity", body.orbital_eccentricity)
        .opt_num("orbitalInclination", body.orbital_inclination)
        .opt_num("argOfPeriapsis", body.arg_of_periapsis)
        .opt_num("meanAnomaly", body.mean_anomaly)
        .opt_num("ascendingNode", body.ascending_node)
        .list("belts", body.belts.iter().map(encode_belt).collect())
        .list("rings", body.rings.iter().map(encode_ring).collect())
        .pairs(
            "timestamps",
            body.timestamps
                .iter()
                .map(|t| (t.name.clone(), Value::from(format_timestamp(&t.value))))
                .collect(),
        )
        .list("stations", body.stations.iter().map(encode_station).collect())
        .time("updateTime", &body.update_time)
        .build()
}

fn compositions(fields: &Fields, field: &str) -> Result<Vec<Composition>> {
    fields.pairs(field, |name, value| {
        value.as_f64().map(|percentage| Composition {
            name: name.to_string(),
            percentage,
        })
    })
}

fn composition_pairs(rows: &[Composition]) -> Map<String, Value> {
    rows.iter()
        .map(|c| (c.name.clone(), number(c.percentage)))
        .collect()
}

/// `{"Star": 0}` → `Parent { kind: "Star", body_id: 0 }`
fn decode_parent(value: &Value) -> Result<Parent> {
    let entry = value.as_object().filter(|m| m.len() == 1).and_then(|m| {
        let (kind, id) = m.iter().next()?;
        Some(Parent {
            kind: kind.clone(),
            body_id: id.as_i64()?,
        })
    });
    entry.ok_or_else(|| {
        Error::decode(
            "Parent",
            "",
            format!("expected a single {{kind: bodyId}} entry, found {}", value),
        )
    })
}

fn encode_parent(parent: &Parent) -> Value {
    let mut map = Map::new();
    map.insert(parent.kind.clone(), Value::from(parent.body_id));
    Value::Object(map)
}

pub(crate) fn decode_signals(value: &Value) -> Result<Signals> {
    let fields = Fields::new("Signals", value)?;
    Ok(Signals {
        signals: fields.pairs("signals", |name, quantity| {
            quantity.as_i64().map(|quantity| DetectedSignal {
                name: name.to_string(),
                quantity,
            })
        })?,
        genuses: fields.strings("genuses")?,
        update_time: fields.req_time("updateTime")?,
    })
}

pub(crate) fn encode_signals(signals: &Signals) -> Value {
    let counts: Map<String, Value> = signals
        .signals
        .iter()
        .map(|s| (s.name.clone(), Value::from(s.quantity)))
        .collect();
    Out::new()
        .put("signals", Value::Object(counts))
        .list(
            "genuses",
            signals.genuses.iter().map(|g| Value::from(g.as_str())).collect(),
        )
        .time("updateTime", &signals.update_time)
        .build()
}

fn decode_belt(value: &Value) -> Result<Belt> {
    let fields = Fields::new("Belt", value)?;
    let name = fields.req_str("name")?;
    let fields = fields.keyed(&name);
    Ok(Belt {
        name,
        belt_type: fields.req_str("type")?,
        mass: fields.req_i64("mass")?,
        inner_radius: fields.req_i64("innerRadius")?,
        outer_radius: fields.req_i64("outerRadius")?,
        id64: fields.opt_u64("id64")?,
    })
}

fn encode_belt(belt: &Belt) -> Value {
    Out::new()
        .put("name", belt.name.as_str())
        .put("type", belt.belt_type.as_str())
        .put("mass", belt.mass)
        .put("innerRadius", belt.inner_radius)
        .put("outerRadius", belt.outer_radius)
        .opt("id64", belt.id64)
        .build()
}

fn decode_ring(value: &Value) -> Result<Ring> {
    let fields = Fields::new("Ring", value)?;
    let name = fields.req_str("name")?;
    let fields = fields.keyed(&name);
    Ok(Ring {
        name,
        ring_type: fields.req_str("type")?,
        mass: fields.req_i64("mass")?,
        inner_radius: fields.req_i64("innerRadius")?,
        outer_radius: fields.req_i64("outerRadius")?,
        id64: fields.opt_u64("id64")?,
        signals: fields
            .get("signals")
            .map(decode_signals)
            .transpose()
            .map_err(|e| e.within("Ring", fields.key()))?,
    })
}

fn encode_ring(ring: &Ring) -> Value {
    Out::new()
        .put("name", ring.name.as_str())
        .put("type", ring.ring_type.as_str())
        .put("mass", ring.mass)
        .put("innerRadius", ring.inner_radius)
        .put("outerRadius", ring.outer_radius)
        .opt("id64", ring.id64)
        .opt("signals", ring.signals.as_ref().map(encode_signals))
        .build()
}
