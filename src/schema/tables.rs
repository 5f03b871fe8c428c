//! Table schema definitions for the galaxy store

use super::types::*;

// =============================================================================
// Shared entities (no FK dependencies)
// =============================================================================

pub static FACTION: TableSchema = TableSchema {
    name: "faction",
    columns: &[
        Column::required("name", ColumnType::Text),
        Column::new("allegiance", ColumnType::Text),
        Column::new("government", ColumnType::Text),
    ],
    primary_key: &["name"],
    foreign_keys: &[],
    child_tables: &[],
};

pub static POWER: TableSchema = TableSchema {
    name: "power",
    columns: &[Column::required("name", ColumnType::Text)],
    primary_key: &["name"],
    foreign_keys: &[],
    child_tables: &[],
};

// =============================================================================
// Systems
// =============================================================================

pub static SYSTEM: TableSchema = TableSchema {
    name: "system",
    columns: &[
        Column::required("id64", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
        Column::required("x", ColumnType::Real),
        Column::required("y", ColumnType::Real),
        Column::required("z", ColumnType::Real),
        Column::new("allegiance", ColumnType::Text),
        Column::new("government", ColumnType::Text).default("'None'"),
        Column::new("primary_economy", ColumnType::Text).default("'None'"),
        Column::new("secondary_economy", ColumnType::Text).default("'None'"),
        Column::new("security", ColumnType::Text).default("'Anarchy'"),
        Column::new("population", ColumnType::Integer).default("0"),
        Column::new("body_count", ColumnType::Integer),
        Column::new("controlling_faction", ColumnType::Text),
        Column::new("power_state", ColumnType::Text),
        Column::required("date", ColumnType::Timestamp),
    ],
    primary_key: &["id64"],
    foreign_keys: &[ForeignKey::new(&["controlling_faction"], "faction", &["name"])],
    child_tables: &["faction_state", "power_play", "thargoid_war"],
};

pub static FACTION_STATE: TableSchema = TableSchema {
    name: "faction_state",
    columns: &[
        Column::required("faction_name", ColumnType::Text),
        Column::required("system_id64", ColumnType::Integer),
        Column::required("influence", ColumnType::Real),
        Column::required("state", ColumnType::Text),
    ],
    primary_key: &["faction_name", "system_id64"],
    foreign_keys: &[
        ForeignKey::new(&["faction_name"], "faction", &["name"]),
        ForeignKey::new(&["system_id64"], "system", &["id64"]).cascade(),
    ],
    child_tables: &[],
};

pub static POWER_PLAY: TableSchema = TableSchema {
    name: "power_play",
    columns: &[
        Column::required("power_name", ColumnType::Text),
        Column::required("system_id64", ColumnType::Integer),
    ],
    primary_key: &["power_name", "system_id64"],
    foreign_keys: &[
        ForeignKey::new(&["power_name"], "power", &["name"]),
        ForeignKey::new(&["system_id64"], "system", &["id64"]).cascade(),
    ],
    child_tables: &[],
};

pub static THARGOID_WAR: TableSchema = TableSchema {
    name: "thargoid_war",
    columns: &[
        Column::required("system_id64", ColumnType::Integer),
        Column::new("current_state", ColumnType::Text),
        Column::new("success_state", ColumnType::Text),
        Column::new("failure_state", ColumnType::Text),
        Column::new("progress", ColumnType::Real),
        Column::new("days_remaining", ColumnType::Integer),
        Column::new("ports_remaining", ColumnType::Integer),
        Column::new("success_reached", ColumnType::Boolean),
    ],
    primary_key: &["system_id64"],
    foreign_keys: &[ForeignKey::new(&["system_id64"], "system", &["id64"]).cascade()],
    child_tables: &[],
};

// =============================================================================
// Bodies
// =============================================================================

pub static BODY: TableSchema = TableSchema {
    name: "body",
    columns: &[
        Column::required("id64", ColumnType::Integer),
        Column::new("system_id64", ColumnType::Integer),
        Column::required("body_id", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
        Column::required("type", ColumnType::Text),
        Column::new("sub_type", ColumnType::Text),
        Column::new("distance_to_arrival", ColumnType::Real),
        Column::new("main_star", ColumnType::Boolean),
        Column::new("age", ColumnType::Integer),
        Column::new("spectral_class", ColumnType::Text),
        Column::new("luminosity", ColumnType::Text),
        Column::new("absolute_magnitude", ColumnType::Real),
        Column::new("solar_masses", ColumnType::Real),
        Column::new("solar_radius", ColumnType::Real),
        Column::new("is_landable", ColumnType::Boolean),
        Column::new("gravity", ColumnType::Real),
        Column::new("earth_masses", ColumnType::Real),
        Column::new("radius", ColumnType::Real),
        Column::new("surface_temperature", ColumnType::Real),
        Column::new("surface_pressure", ColumnType::Real),
        Column::new("volcanism_type", ColumnType::Text),
        Column::new("atmosphere_type", ColumnType::Text),
        Column::new("terraforming_state", ColumnType::Text),
        Column::new("reserve_level", ColumnType::Text),
        Column::new("rotational_period", ColumnType::Real),
        Column::new("rotational_period_tidally_locked", ColumnType::Boolean),
        Column::new("axial_tilt", ColumnType::Real),
        Column::new("orbital_period", ColumnType::Real),
        Column::new("semi_major_axis", ColumnType::Real),
        Column::new("orbital_eccentricity", ColumnType::Real),
        Column::new("orbital_inclination", ColumnType::Real),
        Column::new("arg_of_periapsis", ColumnType::Real),
        Column::new("mean_anomaly", ColumnType::Real),
        Column::new("ascending_node", ColumnType::Real),
        Column::required("update_time", ColumnType::Timestamp),
    ],
    primary_key: &["id64"],
    foreign_keys: &[ForeignKey::new(&["system_id64"], "system", &["id64"]).set_null()],
    child_tables: &[
        "atmosphere_composition",
        "solid_composition",
        "material",
        "parent",
        "belt",
        "ring",
        "signals",
        "body_timestamp",
    ],
};

pub static ATMOSPHERE_COMPOSITION: TableSchema = TableSchema {
    name: "atmosphere_composition",
    columns: &[
        Column::required("body_id64", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
        Column::required("percentage", ColumnType::Real),
    ],
    primary_key: &["body_id64", "name"],
    foreign_keys: &[ForeignKey::new(&["body_id64"], "body", &["id64"]).cascade()],
    child_tables: &[],
};

pub static SOLID_COMPOSITION: TableSchema = TableSchema {
    name: "solid_composition",
    columns: &[
        Column::required("body_id64", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
        Column::required("percentage", ColumnType::Real),
    ],
    primary_key: &["body_id64", "name"],
    foreign_keys: &[ForeignKey::new(&["body_id64"], "body", &["id64"]).cascade()],
    child_tables: &[],
};

pub static MATERIAL: TableSchema = TableSchema {
    name: "material",
    columns: &[
        Column::required("body_id64", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
        Column::required("percentage", ColumnType::Real),
    ],
    primary_key: &["body_id64", "name"],
    foreign_keys: &[ForeignKey::new(&["body_id64"], "body", &["id64"]).cascade()],
    child_tables: &[],
};

/// One link of the orbital parent chain, nearest parent first
pub static PARENT: TableSchema = TableSchema {
    name: "parent",
    columns: &[
        Column::required("body_id64", ColumnType::Integer),
        Column::required("position", ColumnType::Integer),
        Column::required("kind", ColumnType::Text),
        Column::required("body_id", ColumnType::Integer),
    ],
    primary_key: &["body_id64", "position"],
    foreign_keys: &[ForeignKey::new(&["body_id64"], "body", &["id64"]).cascade()],
    child_tables: &[],
};

pub static BELT: TableSchema = TableSchema {
    name: "belt",
    columns: &[
        Column::required("body_id64", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
        Column::required("type", ColumnType::Text),
        Column::required("mass", ColumnType::Integer),
        Column::required("inner_radius", ColumnType::Integer),
        Column::required("outer_radius", ColumnType::Integer),
        Column::new("id64", ColumnType::Integer),
    ],
    primary_key: &["body_id64", "name"],
    foreign_keys: &[ForeignKey::new(&["body_id64"], "body", &["id64"]).cascade()],
    child_tables: &[],
};

pub static RING: TableSchema = TableSchema {
    name: "ring",
    columns: &[
        Column::required("body_id64", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
        Column::required("type", ColumnType::Text),
        Column::required("mass", ColumnType::Integer),
        Column::required("inner_radius", ColumnType::Integer),
        Column::required("outer_radius", ColumnType::Integer),
        Column::new("id64", ColumnType::Integer),
    ],
    primary_key: &["body_id64", "name"],
    foreign_keys: &[ForeignKey::new(&["body_id64"], "body", &["id64"]).cascade()],
    child_tables: &[],
};

/// Signal scan of a body (`ring_name` empty) or of one of its rings
pub static SIGNALS: TableSchema = TableSchema {
    name: "signals",
    columns: &[
        Column::required("body_id64", ColumnType::Integer),
        Column::required("ring_name", ColumnType::Text).default("''"),
        Column::required("update_time", ColumnType::Timestamp),
    ],
    primary_key: &["body_id64", "ring_name"],
    foreign_keys: &[ForeignKey::new(&["body_id64"], "body", &["id64"]).cascade()],
    child_tables: &["detected_signal", "detected_genus"],
};

pub static DETECTED_SIGNAL: TableSchema = TableSchema {
    name: "detected_signal",
    columns: &[
        Column::required("body_id64", ColumnType::Integer),
        Column::required("ring_name", ColumnType::Text),
        Column::required("name", ColumnType::Text),
        Column::required("quantity", ColumnType::Integer),
    ],
    primary_key: &["body_id64", "ring_name", "name"],
    foreign_keys: &[ForeignKey::new(
        &["body_id64", "ring_name"],
        "signals",
        &["body_id64", "ring_name"],
    )
    .cascade()],
    child_tables: &[],
};

pub static DETECTED_GENUS: TableSchema = TableSchema {
    name: "detected_genus",
    columns: &[
        Column::required("body_id64", ColumnType::Integer),
        Column::required("ring_name", ColumnType::Text),
        Column::required("name", ColumnType::Text),
    ],
    primary_key: &["body_id64", "ring_name", "name"],
    foreign_keys: &[ForeignKey::new(
        &["body_id64", "ring_name"],
        "signals",
        &["body_id64", "ring_name"],
    )
    .cascade()],
    child_tables: &[],
};

pub static BODY_TIMESTAMP: TableSchema = TableSchema {
    name: "body_timestamp",
    columns: &[
        Column::required("body_id64", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
        Column::required("value", ColumnType::Timestamp),
    ],
    primary_key: &["body_id64", "name"],
    foreign_keys: &[ForeignKey::new(&["body_id64"], "body", &["id64"]).cascade()],
    child_tables: &[],
};

// =============================================================================
// Stations
// =============================================================================

pub static STATION: TableSchema = TableSchema {
    name: "station",
    columns: &[
        Column::required("id", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
        Column::new("system_id64", ColumnType::Integer),
        Column::new("body_id64", ColumnType::Integer),
        Column::required("update_time", ColumnType::Timestamp),
        Column::new("controlling_faction", ColumnType::Text),
        Column::new("controlling_faction_state", ColumnType::Text),
        Column::new("distance_to_arrival", ColumnType::Real),
        Column::new("primary_economy", ColumnType::Text),
        Column::new("allegiance", ColumnType::Text),
        Column::new("government", ColumnType::Text),
        Column::new("type", ColumnType::Text),
        Column::new("latitude", ColumnType::Real),
        Column::new("longitude", ColumnType::Real),
        Column::new("large_landing_pads", ColumnType::Integer),
        Column::new("medium_landing_pads", ColumnType::Integer),
        Column::new("small_landing_pads", ColumnType::Integer),
    ],
    primary_key: &["id"],
    foreign_keys: &[
        ForeignKey::new(&["system_id64"], "system", &["id64"]).set_null(),
        ForeignKey::new(&["body_id64"], "body", &["id64"]).set_null(),
        ForeignKey::new(&["controlling_faction"], "faction", &["name"]),
    ],
    child_tables: &[
        "station_economy",
        "station_service",
        "market",
        "shipyard",
        "outfitting",
    ],
};

pub static STATION_ECONOMY: TableSchema = TableSchema {
    name: "station_economy",
    columns: &[
        Column::required("station_id", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
        Column::required("weight", ColumnType::Real),
    ],
    primary_key: &["station_id", "name"],
    foreign_keys: &[ForeignKey::new(&["station_id"], "station", &["id"]).cascade()],
    child_tables: &[],
};

pub static STATION_SERVICE: TableSchema = TableSchema {
    name: "station_service",
    columns: &[
        Column::required("station_id", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
    ],
    primary_key: &["station_id", "name"],
    foreign_keys: &[ForeignKey::new(&["station_id"], "station", &["id"]).cascade()],
    child_tables: &[],
};

pub static MARKET: TableSchema = TableSchema {
    name: "market",
    columns: &[
        Column::required("station_id", ColumnType::Integer),
        Column::required("update_time", ColumnType::Timestamp),
    ],
    primary_key: &["station_id"],
    foreign_keys: &[ForeignKey::new(&["station_id"], "station", &["id"]).cascade()],
    child_tables: &["market_order", "prohibited_commodity"],
};

pub static MARKET_ORDER: TableSchema = TableSchema {
    name: "market_order",
    columns: &[
        Column::required("station_id", ColumnType::Integer),
        Column::required("symbol", ColumnType::Text),
        Column::new("name", ColumnType::Text),
        Column::required("category", ColumnType::Text),
        Column::new("commodity_id", ColumnType::Integer),
        Column::required("demand", ColumnType::Integer),
        Column::required("supply", ColumnType::Integer),
        Column::required("buy_price", ColumnType::Integer),
        Column::required("sell_price", ColumnType::Integer),
    ],
    primary_key: &["station_id", "symbol"],
    foreign_keys: &[ForeignKey::new(&["station_id"], "market", &["station_id"]).cascade()],
    child_tables: &[],
};

pub static PROHIBITED_COMMODITY: TableSchema = TableSchema {
    name: "prohibited_commodity",
    columns: &[
        Column::required("station_id", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
    ],
    primary_key: &["station_id", "name"],
    foreign_keys: &[ForeignKey::new(&["station_id"], "market", &["station_id"]).cascade()],
    child_tables: &[],
};

pub static SHIPYARD: TableSchema = TableSchema {
    name: "shipyard",
    columns: &[
        Column::required("station_id", ColumnType::Integer),
        Column::required("update_time", ColumnType::Timestamp),
    ],
    primary_key: &["station_id"],
    foreign_keys: &[ForeignKey::new(&["station_id"], "station", &["id"]).cascade()],
    child_tables: &["shipyard_stock"],
};

pub static SHIPYARD_STOCK: TableSchema = TableSchema {
    name: "shipyard_stock",
    columns: &[
        Column::required("station_id", ColumnType::Integer),
        Column::required("symbol", ColumnType::Text),
        Column::required("name", ColumnType::Text),
        Column::required("ship_id", ColumnType::Integer),
    ],
    primary_key: &["station_id", "symbol"],
    foreign_keys: &[ForeignKey::new(&["station_id"], "shipyard", &["station_id"]).cascade()],
    child_tables: &[],
};

pub static OUTFITTING: TableSchema = TableSchema {
    name: "outfitting",
    columns: &[
        Column::required("station_id", ColumnType::Integer),
        Column::required("update_time", ColumnType::Timestamp),
    ],
    primary_key: &["station_id"],
    foreign_keys: &[ForeignKey::new(&["station_id"], "station", &["id"]).cascade()],
    child_tables: &["outfitting_stock"],
};

pub static OUTFITTING_STOCK: TableSchema = TableSchema {
    name: "outfitting_stock",
    columns: &[
        Column::required("station_id", ColumnType::Integer),
        Column::required("symbol", ColumnType::Text),
        Column::required("name", ColumnType::Text),
        Column::required("module_id", ColumnType::Integer),
        Column::required("class", ColumnType::Integer),
        Column::required("rating", ColumnType::Text),
        Column::required("category", ColumnType::Text),
        Column::new("ship", ColumnType::Text),
    ],
    primary_key: &["station_id", "symbol"],
    foreign_keys: &[
        ForeignKey::new(&["station_id"], "outfitting", &["station_id"]).cascade(),
    ],
    child_tables: &[],
};

// =============================================================================
// Registry
// =============================================================================

/// All tables, parents before children
pub static ALL_TABLES: &[&TableSchema] = &[
    // Wave 1: No dependencies
    &FACTION,
    &POWER,
    // Wave 2
    &SYSTEM,
    // Wave 3
    &FACTION_STATE,
    &POWER_PLAY,
    &THARGOID_WAR,
    &BODY,
    // Wave 4
    &ATMOSPHERE_COMPOSITION,
    &SOLID_COMPOSITION,
    &MATERIAL,
    &PARENT,
    &BELT,
    &RING,
    &SIGNALS,
    &BODY_TIMESTAMP,
    &STATION,
    // Wave 5
    &DETECTED_SIGNAL,
    &DETECTED_GENUS,
    &STATION_ECONOMY,
    &STATION_SERVICE,
    &MARKET,
    &SHIPYARD,
    &OUTFITTING,
    // Wave 6
    &MARKET_ORDER,
    &PROHIBITED_COMMODITY,
    &SHIPYARD_STOCK,
    &OUTFITTING_STOCK,
];

/// Get a table schema by name
pub fn get_table(name: &str) -> Option<&'static TableSchema> {
    ALL_TABLES.iter().find(|t| t.name == name).copied()
}

/// Get all table names
pub fn table_names() -> Vec<&'static str> {
    ALL_TABLES.iter().map(|t| t.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_and_reference_is_a_column() {
        for table in ALL_TABLES {
            for key in table.primary_key {
                assert!(table.column(key).is_some(), "{}.{}", table.name, key);
            }
            for fk in table.foreign_keys {
                let parent = get_table(fk.references_table).unwrap();
                assert_eq!(fk.columns.len(), fk.references_columns.len());
                for (col, target) in fk.columns.iter().zip(fk.references_columns) {
                    assert!(table.column(col).is_some(), "{}.{}", table.name, col);
                    assert!(parent.column(target).is_some(), "{}.{}", parent.name, target);
                }
            }
            for child in table.child_tables {
                assert!(get_table(child).is_some(), "{} -> {}", table.name, child);
            }
        }
    }

    #[test]
    fn test_registry_is_complete() {
        assert_eq!(ALL_TABLES.len(), 27);
        assert!(get_table("market_order").is_some());
        assert!(get_table("types").is_none());
    }
}
