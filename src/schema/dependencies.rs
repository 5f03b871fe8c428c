use super::tables::{get_table, ALL_TABLES};
use super::types::TableSchema;
use std::collections::{BTreeMap, BTreeSet};

/// Foreign-key graph over the table registry
pub struct DependencyResolver {
    /// table -> tables it references
    parents: BTreeMap<&'static str, BTreeSet<&'static str>>,
    /// table -> tables referencing it
    children: BTreeMap<&'static str, BTreeSet<&'static str>>,
}

impl DependencyResolver {
    pub fn new() -> Self {
        let mut parents = BTreeMap::new();
        let mut children: BTreeMap<_, BTreeSet<_>> = BTreeMap::new();

        for table in ALL_TABLES {
            let referenced: BTreeSet<_> = table
                .dependencies()
                .into_iter()
                .filter(|&p| p != table.name)
                .collect();
            for &parent in &referenced {
                children.entry(parent).or_default().insert(table.name);
            }
            parents.insert(table.name, referenced);
        }

        Self { parents, children }
    }

    /// The requested tables, everything they reference and the tables
    /// they own, parents first
    pub fn resolve_includes(
        &self,
        requested: &[&str],
    ) -> Result<Vec<&'static TableSchema>, String> {
        let mut closure = BTreeSet::new();
        let mut pending: Vec<&'static str> = requested
            .iter()
            .map(|&name| {
                get_table(name)
                    .map(|t| t.name)
                    .ok_or_else(|| format!("Unknown table: {}", name))
            })
            .collect::<Result<_, _>>()?;

        while let Some(name) = pending.pop() {
            let Some(table) = get_table(name) else {
                continue;
            };
            if !closure.insert(table.name) {
                continue;
            }
            pending.extend(self.parents_of(table.name));
            pending.extend(table.child_tables.iter().copied());
        }

        self.order(&closure)
    }

    /// All tables in creation order
    pub fn creation_order(&self) -> Result<Vec<&'static TableSchema>, String> {
        self.order(&ALL_TABLES.iter().map(|t| t.name).collect())
    }

    /// All tables in the order they can be dropped
    pub fn drop_order(&self) -> Result<Vec<&'static TableSchema>, String> {
        let mut tables = self.creation_order()?;
        tables.reverse();
        Ok(tables)
    }

    /// Tables holding rows that reference `table`, by name
    pub fn dependents(&self, table: &str) -> Vec<&'static str> {
        self.children
            .get(table)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn parents_of(&self, table: &str) -> impl Iterator<Item = &'static str> + '_ {
        self.parents.get(table).into_iter().flatten().copied()
    }

    /// Repeatedly emit every table whose parents are already placed.
    /// Within one round tables keep their registry order.
    fn order(&self, include: &BTreeSet<&str>) -> Result<Vec<&'static TableSchema>, String> {
        let mut remaining: Vec<&'static TableSchema> = ALL_TABLES
            .iter()
            .copied()
            .filter(|t| include.contains(t.name))
            .collect();
        let mut placed: BTreeSet<&str> = BTreeSet::new();
        let mut ordered = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|t| {
                self.parents_of(t.name)
                    .all(|p| placed.contains(p) || !include.contains(p))
            });
            if ready.is_empty() {
                let names: Vec<_> = blocked.iter().map(|t| t.name).collect();
                return Err(format!("Circular dependency between: {}", names.join(", ")));
            }
            placed.extend(ready.iter().map(|t| t.name));
            ordered.extend(ready);
            remaining = blocked;
        }

        Ok(ordered)
    }
}

impl Default for DependencyResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(names: &[&str], name: &str) -> usize {
        names.iter().position(|&n| n == name).unwrap()
    }

    #[test]
    fn test_resolve_market_order_includes_parents() {
        let resolver = DependencyResolver::new();
        let tables = resolver.resolve_includes(&["market_order"]).unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name).collect();

        assert!(names.contains(&"market"));
        assert!(names.contains(&"station"));
        assert!(names.contains(&"system"));
        assert!(names.contains(&"faction"));

        assert!(position(&names, "station") < position(&names, "market"));
        assert!(position(&names, "market") < position(&names, "market_order"));
    }

    #[test]
    fn test_resolve_owned_names() {
        let requested: Vec<String> = vec!["ring".to_string(), "ring".to_string()];
        let refs: Vec<&str> = requested.iter().map(String::as_str).collect();
        let tables = DependencyResolver::new().resolve_includes(&refs).unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name).collect();

        assert_eq!(names.iter().filter(|&&n| n == "ring").count(), 1);
        assert!(position(&names, "body") < position(&names, "ring"));
    }

    #[test]
    fn test_creation_order_respects_every_foreign_key() {
        let resolver = DependencyResolver::new();
        let tables = resolver.creation_order().unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name).collect();
        assert_eq!(names.len(), ALL_TABLES.len());

        for table in &tables {
            for fk in table.foreign_keys {
                assert!(
                    position(&names, fk.references_table) < position(&names, table.name),
                    "{} before {}",
                    fk.references_table,
                    table.name
                );
            }
        }
    }

    #[test]
    fn test_drop_order_is_reversed() {
        let resolver = DependencyResolver::new();
        let drop = resolver.drop_order().unwrap();
        let create = resolver.creation_order().unwrap();
        assert_eq!(drop.first().unwrap().name, create.last().unwrap().name);
        assert_eq!(drop.last().unwrap().name, "faction");
    }

    #[test]
    fn test_dependents_of_body() {
        let resolver = DependencyResolver::new();
        let dependents = resolver.dependents("body");
        assert!(dependents.contains(&"station"));
        assert!(dependents.contains(&"ring"));
        assert!(!dependents.contains(&"market"));
        assert!(resolver.dependents("outfitting_stock").is_empty());
    }

    #[test]
    fn test_unknown_table_error() {
        let resolver = DependencyResolver::new();
        let err = resolver.resolve_includes(&["nonexistent"]).unwrap_err();
        assert!(err.contains("nonexistent"));
    }
}
