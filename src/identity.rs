//! Per-document de-duplication of shared entities
//!
//! The same faction shows up several times in one system document: in the
//! `factions` influence list, as the system's `controllingFaction`, and as
//! each station's `controllingFaction`. The store enforces a unique name per
//! faction, so one document must never materialize two of them. An
//! [`IdentityIndex`] is created for each document load, threaded explicitly
//! through every decode function that meets a faction or power, and
//! discarded afterwards.

use std::collections::BTreeMap;

use crate::model::{Faction, Power};

#[derive(Debug, Default)]
pub struct IdentityIndex {
    factions: BTreeMap<String, Faction>,
    powers: BTreeMap<String, Power>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve_faction(&self, name: &str) -> Option<&Faction> {
        self.factions.get(name)
    }

    /// Register a faction under its name. An already registered faction
    /// wins; the candidate is dropped.
    pub fn register_faction(&mut self, faction: Faction) -> &Faction {
        self.factions
            .entry(faction.name.clone())
            .or_insert(faction)
    }

    /// Return the canonical faction for `candidate.name`, registering the
    /// candidate if the name is new. Returns the name to reference.
    pub fn intern_faction(&mut self, candidate: Faction) -> String {
        if let Some(existing) = self.factions.get(&candidate.name) {
            if existing != &candidate {
                tracing::debug!(
                    faction = %candidate.name,
                    "discarding duplicate faction record in favour of the first one seen"
                );
            }
            return existing.name.clone();
        }
        let name = candidate.name.clone();
        self.factions.insert(name.clone(), candidate);
        name
    }

    pub fn resolve_power(&self, name: &str) -> Option<&Power> {
        self.powers.get(name)
    }

    pub fn register_power(&mut self, power: Power) -> &Power {
        self.powers.entry(power.name.clone()).or_insert(power)
    }

    pub fn intern_power(&mut self, name: &str) -> String {
        self.register_power(Power {
            name: name.to_string(),
        })
        .name
        .clone()
    }

    pub fn faction_count(&self) -> usize {
        self.factions.len()
    }

    /// Consume the index, yielding the arenas of canonical instances
    pub fn into_arenas(self) -> (BTreeMap<String, Faction>, BTreeMap<String, Power>) {
        (self.factions, self.powers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faction(name: &str, allegiance: Option<&str>) -> Faction {
        Faction {
            name: name.to_string(),
            allegiance: allegiance.map(str::to_string),
            government: None,
        }
    }

    #[test]
    fn test_first_registration_wins() {
        let mut index = IdentityIndex::new();
        index.intern_faction(faction("Alpha", Some("Federation")));
        let name = index.intern_faction(faction("Alpha", Some("Empire")));

        assert_eq!(name, "Alpha");
        assert_eq!(index.faction_count(), 1);
        assert_eq!(
            index.resolve_faction("Alpha").unwrap().allegiance.as_deref(),
            Some("Federation")
        );
    }

    #[test]
    fn test_unknown_name_resolves_to_none() {
        let index = IdentityIndex::new();
        assert!(index.resolve_faction("FleetCarrier").is_none());
        assert!(index.resolve_power("Zemina Torval").is_none());
    }

    #[test]
    fn test_powers_are_deduplicated() {
        let mut index = IdentityIndex::new();
        index.intern_power("Zemina Torval");
        index.intern_power("Zemina Torval");
        let (_, powers) = index.into_arenas();
        assert_eq!(powers.len(), 1);
    }
}
