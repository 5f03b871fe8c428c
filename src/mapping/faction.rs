//! Factions, powers and the Thargoid war sub-record of a system

use std::collections::BTreeMap;

use serde_json::Value;

use super::{Fields, Out};
use crate::error::Result;
use crate::identity::IdentityIndex;
use crate::model::{Faction, FactionState, ThargoidWar};

/// Decode one entry of a system's `factions` list.
///
/// The entry carries the faction itself (name, allegiance, government) and
/// the per-system state (influence, state); the faction half goes through
/// the identity index.
pub fn decode_faction_state(value: &Value, index: &mut IdentityIndex) -> Result<FactionState> {
    let fields = Fields::new("FactionState", value)?;
    let name = fields.req_str("name")?;
    let fields = fields.keyed(&name);

    let faction = Faction {
        name,
        allegiance: fields.opt_str("allegiance")?,
        government: fields.opt_str("government")?,
    };
    let influence = fields.req_f64("influence")?;
    let state = fields.req_str("state")?;

    Ok(FactionState {
        faction_name: index.intern_faction(faction),
        influence,
        state,
    })
}

/// Flatten the faction back into its state entry
pub fn encode_faction_state(state: &FactionState, factions: &BTreeMap<String, Faction>) -> Value {
    let faction = factions.get(&state.faction_name);
    Out::new()
        .put("name", state.faction_name.as_str())
        .opt("allegiance", faction.and_then(|f| f.allegiance.clone()))
        .opt("government", faction.and_then(|f| f.government.clone()))
        .num("influence", state.influence)
        .put("state", state.state.as_str())
        .build()
}

/// Decode a system's `controllingFaction`, either a `{name, allegiance,
/// government}` object or a bare name.
pub fn decode_controlling_faction(value: &Value, index: &mut IdentityIndex) -> Result<String> {
    if let Some(name) = value.as_str() {
        return Ok(index.intern_faction(Faction::named(name)));
    }
    let fields = Fields::new("Faction", value)?;
    let name = fields.req_str("name")?;
    let fields = fields.keyed(&name);
    let faction = Faction {
        name,
        allegiance: fields.opt_str("allegiance")?,
        government: fields.opt_str("government")?,
    };
    Ok(index.intern_faction(faction))
}

pub(crate) fn encode_controlling_faction(faction: &Faction) -> Value {
    Out::new()
        .put("name", faction.name.as_str())
        .opt("allegiance", faction.allegiance.clone())
        .opt("government", faction.government.clone())
        .build()
}

pub fn decode_thargoid_war(value: &Value) -> Result<ThargoidWar> {
    let fields = Fields::new("ThargoidWar", value)?;
    Ok(ThargoidWar {
        current_state: fields.opt_str("currentState")?,
        success_state: fields.opt_str("successState")?,
        failure_state: fields.opt_str("failureState")?,
        progress: fields.opt_f64("progress")?,
        days_remaining: fields.opt_i64("daysRemaining")?,
        ports_remaining: fields.opt_i64("portsRemaining")?,
        success_reached: fields.opt_bool("successReached")?,
    })
}

pub fn encode_thargoid_war(war: &ThargoidWar) -> Value {
    Out::new()
        .opt("currentState", war.current_state.clone())
        .opt("successState", war.success_state.clone())
        .opt("failureState", war.failure_state.clone())
        .opt_num("progress", war.progress)
        .opt("daysRemaining", war.days_remaining)
        .opt("portsRemaining", war.ports_remaining)
        .opt("successReached", war.success_reached)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_faction_state_wraps_and_flattens() {
        let mut index = IdentityIndex::new();
        let input = json!({
            "name": "Alpha",
            "allegiance": "Independent",
            "government": "Cooperative",
            "influence": 0.5,
            "state": "Boom"
        });
        let state = decode_faction_state(&input, &mut index).unwrap();
        assert_eq!(state.faction_name, "Alpha");
        assert_eq!(state.state, "Boom");

        let (factions, _) = index.into_arenas();
        assert_eq!(encode_faction_state(&state, &factions), input);
    }

    #[test]
    fn test_controlling_faction_reuses_indexed_instance() {
        let mut index = IdentityIndex::new();
        decode_faction_state(
            &json!({"name": "Alpha", "allegiance": "Federation", "influence": 1.0, "state": "None"}),
            &mut index,
        )
        .unwrap();
        let name = decode_controlling_faction(&json!({"name": "Alpha"}), &mut index).unwrap();

        assert_eq!(name, "Alpha");
        assert_eq!(index.faction_count(), 1);
        assert_eq!(
            index.resolve_faction("Alpha").unwrap().allegiance.as_deref(),
            Some("Federation")
        );
    }

    #[test]
    fn test_controlling_faction_accepts_bare_name() {
        let mut index = IdentityIndex::new();
        let name = decode_controlling_faction(&json!("Beta"), &mut index).unwrap();
        assert_eq!(name, "Beta");
        assert!(index.resolve_faction("Beta").is_some());
    }

    #[test]
    fn test_faction_state_missing_influence_names_faction() {
        let mut index = IdentityIndex::new();
        let err = decode_faction_state(&json!({"name": "Gamma", "state": "None"}), &mut index)
            .unwrap_err()
            .to_string();
        assert!(err.contains("FactionState Gamma"), "{}", err);
        assert!(err.contains("influence"), "{}", err);
    }

    #[test]
    fn test_thargoid_war_omits_nulls() {
        let input = json!({
            "currentState": "Thargoid Controlled",
            "successState": "Thargoid Recovery",
            "failureState": "Thargoid Controlled",
            "progress": 0.5,
            "daysRemaining": 2,
            "portsRemaining": 3,
            "successReached": false
        });
        let war = decode_thargoid_war(&input).unwrap();
        assert_eq!(encode_thargoid_war(&war), input);

        let sparse = decode_thargoid_war(&json!({"currentState": "None", "progress": null})).unwrap();
        assert_eq!(encode_thargoid_war(&sparse), json!({"currentState": "None"}));
    }
}
