use crate::schema::{OnDelete, TableSchema};

/// Generate CREATE TABLE SQL for a table schema
pub fn generate_create_table(schema: &TableSchema) -> String {
    let mut sql = format!("CREATE TABLE IF NOT EXISTS {} (\n", schema.name);
    let mut columns = Vec::new();

    for col in schema.columns {
        let null_constraint = if !col.nullable { " NOT NULL" } else { "" };
        let default = col
            .default
            .map(|d| format!(" DEFAULT {}", d))
            .unwrap_or_default();

        columns.push(format!(
            "    {} {}{}{}",
            col.name,
            col.col_type.sql_type(),
            null_constraint,
            default
        ));
    }

    columns.push(format!("    PRIMARY KEY ({})", schema.primary_key.join(", ")));

    for fk in schema.foreign_keys {
        let on_delete = match fk.on_delete {
            OnDelete::NoAction => "",
            OnDelete::Cascade => " ON DELETE CASCADE",
            OnDelete::SetNull => " ON DELETE SET NULL",
        };
        columns.push(format!(
            "    FOREIGN KEY ({}) REFERENCES {}({}){}",
            fk.columns.join(", "),
            fk.references_table,
            fk.references_columns.join(", "),
            on_delete
        ));
    }

    sql.push_str(&columns.join(",\n"));
    sql.push_str("\n)");

    sql
}

/// Generate CREATE INDEX statements for foreign key columns that are not
/// already covered by the leading primary key columns
pub fn generate_indexes(schema: &TableSchema) -> Vec<String> {
    schema
        .foreign_keys
        .iter()
        .filter(|fk| !schema.primary_key.starts_with(fk.columns))
        .map(|fk| {
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{}_{} ON {}({})",
                schema.name,
                fk.columns.join("_"),
                schema.name,
                fk.columns.join(", ")
            )
        })
        .collect()
}

pub fn generate_drop_table(schema: &TableSchema) -> String {
    format!("DROP TABLE IF EXISTS {}", schema.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tables::{DETECTED_SIGNAL, FACTION, FACTION_STATE, POWER, STATION, SYSTEM};

    #[test]
    fn test_generate_create_table() {
        let sql = generate_create_table(&SYSTEM);
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS system"));
        assert!(sql.contains("id64 INTEGER NOT NULL"));
        assert!(sql.contains("security TEXT DEFAULT 'Anarchy'"));
        assert!(sql.contains("PRIMARY KEY (id64)"));
        assert!(sql.contains("FOREIGN KEY (controlling_faction) REFERENCES faction(name)"));
    }

    #[test]
    fn test_shared_entities_keyed_by_name() {
        for schema in [&FACTION, &POWER] {
            let sql = generate_create_table(schema);
            assert!(sql.contains("PRIMARY KEY (name)"), "{sql}");
            assert!(!sql.contains("UNIQUE"), "{sql}");
        }
    }

    #[test]
    fn test_composite_keys() {
        let sql = generate_create_table(&FACTION_STATE);
        assert!(sql.contains("PRIMARY KEY (faction_name, system_id64)"));
        assert!(sql.contains("REFERENCES system(id64) ON DELETE CASCADE"));

        let sql = generate_create_table(&DETECTED_SIGNAL);
        assert!(sql.contains(
            "FOREIGN KEY (body_id64, ring_name) REFERENCES signals(body_id64, ring_name)"
        ));
    }

    #[test]
    fn test_generate_indexes() {
        let indexes = generate_indexes(&STATION);
        assert!(indexes.iter().any(|i| i.contains("idx_station_system_id64")));
        assert!(indexes.iter().any(|i| i.contains("idx_station_body_id64")));

        // faction_name leads the primary key, system_id64 does not
        let indexes = generate_indexes(&FACTION_STATE);
        assert_eq!(indexes.len(), 1);
        assert!(indexes[0].contains("idx_faction_state_system_id64"));
    }
}
