use serde_json::{Map, Value};

use super::{whole_number, Fields, Out};
use crate::error::Result;
use crate::model::{
    Market, MarketOrder, Outfitting, OutfittingStock, Shipyard, ShipyardStock, Station,
    StationEconomy,
};

/// Decode one station.
///
/// `controllingFaction` is only a name here. The station's own allegiance
/// and government stay on the station; whether they also describe the
/// faction is decided by [`super::repair`], which prefers the system-level
/// faction list because station copies are sometimes wrong.
pub fn decode_station(value: &Value) -> Result<Station> {
    let fields = Fields::new("Station", value)?;
    let id = fields.req_u64("id")?;
    let fields = fields.keyed(format!("id={}", id));

    let pads = fields.opt_object("landingPads")?;
    let pad = |size: &str| -> Result<Option<i64>> {
        match pads.and_then(|p| p.get(size)).filter(|v| !v.is_null()) {
            None => Ok(None),
            Some(v) => v
                .as_i64()
                .map(Some)
                .ok_or_else(|| fields.error(format!("landingPads.{} should be an integer", size))),
        }
    };

    Ok(Station {
        id,
        name: fields.req_str("name")?,
        update_time: fields.req_time("updateTime")?,
        controlling_faction: fields.opt_str("controllingFaction")?,
        controlling_faction_state: fields.opt_str("controllingFactionState")?,
        distance_to_arrival: fields.opt_f64("distanceToArrival")?,
        primary_economy: fields.opt_str("primaryEconomy")?,
        economies: fields.pairs("economies", |name, weight| {
            weight.as_f64().map(|weight| StationEconomy {
                name: name.to_string(),
                weight,
            })
        })?,
        allegiance: fields.opt_str("allegiance")?,
        government: fields.opt_str("government")?,
        services: fields.strings("services")?,
        station_type: fields.opt_str("type")?,
        latitude: fields.opt_f64("latitude")?,
        longitude: fields.opt_f64("longitude")?,
        large_landing_pads: pad("large")?,
        medium_landing_pads: pad("medium")?,
        small_landing_pads: pad("small")?,
        market: fields
            .get("market")
            .map(decode_market)
            .transpose()
            .map_err(|e| e.within("Station", fields.key()))?,
        shipyard: fields
            .get("shipyard")
            .map(decode_shipyard)
            .transpose()
            .map_err(|e| e.within("Station", fields.key()))?,
        outfitting: fields
            .get("outfitting")
            .map(decode_outfitting)
            .transpose()
            .map_err(|e| e.within("Station", fields.key()))?,
        body_id64: None,
        system_id64: None,
    })
}

pub fn encode_station(station: &Station) -> Value {
    let mut out = Out::new();
    out.put("name", station.name.as_str())
        .put("id", station.id)
        .time("updateTime", &station.update_time);

    if let Some(faction) = &station.controlling_faction {
        // the producer always pairs the name with a (possibly null) state
        out.put("controllingFaction", faction.as_str()).put(
            "controllingFactionState",
            station.controlling_faction_state.clone(),
        );
    } else {
        out.opt("controllingFactionState", station.controlling_faction_state.clone());
    }

    let economies: Map<String, Value> = station
        .economies
        .iter()
        .map(|e| (e.name.clone(), whole_number(e.weight)))
        .collect();

    out.opt("distanceToArrival", station.distance_to_arrival.map(whole_number))
        .opt("primaryEconomy", station.primary_economy.clone())
        .pairs("economies", economies)
        .opt("allegiance", station.allegiance.clone())
        .opt("government", station.government.clone())
        .list(
            "services",
            station.services.iter().map(|s| Value::from(s.as_str())).collect(),
        )
        .opt("type", station.station_type.clone())
        .opt_num("latitude", station.latitude)
        .opt_num("longitude", station.longitude)
        .pairs("landingPads", landing_pads(station))
        .opt("market", station.market.as_ref().map(encode_market))
        .opt("shipyard", station.shipyard.as_ref().map(encode_shipyard))
        .opt("outfitting", station.outfitting.as_ref().map(encode_outfitting))
        .build()
}

fn landing_pads(station: &Station) -> Map<String, Value> {
    [
        ("large", station.large_landing_pads),
        ("medium", station.medium_landing_pads),
        ("small", station.small_landing_pads),
    ]
    .into_iter()
    .filter_map(|(size, count)| count.map(|c| (size.to_string(), Value::from(c))))
    .collect()
}

fn decode_market(value: &Value) -> Result<Market> {
    let fields = Fields::new("Market", value)?;
    Ok(Market {
        commodities: fields
            .array("commodities")?
            .iter()
            .map(decode_market_order)
            .collect::<Result<Vec<_>>>()?,
        prohibited_commodities: fields.strings("prohibitedCommodities")?,
        update_time: fields.req_time("updateTime")?,
    })
}

fn encode_market(market: &Market) -> Value {
    Out::new()
        .list(
            "commodities",
            market.commodities.iter().map(encode_market_order).collect(),
        )
        .list(
            "prohibitedCommodities",
            market
                .prohibited_commodities
                .iter()
                .map(|c| Value::from(c.as_str()))
                .collect(),
        )
        .time("updateTime", &market.update_time)
        .build()
}

fn decode_market_order(value: &Value) -> Result<MarketOrder> {
    let fields = Fields::new("MarketOrder", value)?;
    let symbol = fields.req_str("symbol")?;
    let fields = fields.keyed(&symbol);
    Ok(MarketOrder {
        symbol,
        name: fields.opt_str("name")?,
        category: fields.req_str("category")?,
        commodity_id: fields.opt_i64("commodityId")?,
        demand: fields.req_i64("demand")?,
        supply: fields.req_i64("supply")?,
        buy_price: fields.req_i64("buyPrice")?,
        sell_price: fields.req_i64("sellPrice")?,
    })
}

fn encode_market_order(order: &MarketOrder) -> Value {
    Out::new()
        .opt("name", order.name.clone())
        .put("symbol", order.symbol.as_str())
        .put("category", order.category.as_str())
        .opt("commodityId", order.commodity_id)
        .put("demand", order.demand)
        .put("supply", order.supply)
        .put("buyPrice", order.buy_price)
        .put("sellPrice", order.sell_price)
        .build()
}

fn decode_shipyard(value: &Value) -> Result<Shipyard> {
    let fields = Fields::new("Shipyard", value)?;
    let ships = fields
        .array("ships")?
        .iter()
        .map(|v| {
            let ship = Fields::new("ShipyardStock", v)?;
            let symbol = ship.req_str("symbol")?;
            let ship = ship.keyed(&symbol);
            Ok(ShipyardStock {
                name: ship.req_str("name")?,
                symbol,
                ship_id: ship.req_i64("shipId")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Shipyard {
        ships,
        update_time: fields.req_time("updateTime")?,
    })
}

fn encode_shipyard(shipyard: &Shipyard) -> Value {
    let ships = shipyard
        .ships
        .iter()
        .map(|s| {
            Out::new()
                .put("name", s.name.as_str())
                .put("symbol", s.symbol.as_str())
                .put("shipId", s.ship_id)
                .build()
        })
        .collect();
    Out::new()
        .list("ships", ships)
        .time("updateTime", &shipyard.update_time)
        .build()
}

fn decode_outfitting(value: &Value) -> Result<Outfitting> {
    let fields = Fields::new("Outfitting", value)?;
    let modules = fields
        .array("modules")?
        .iter()
        .map(|v| {
            let module = Fields::new("OutfittingStock", v)?;
            let symbol = module.req_str("symbol")?;
            let module = module.keyed(&symbol);
            Ok(OutfittingStock {
                name: module.req_str("name")?,
                symbol,
                module_id: module.req_i64("moduleId")?,
                class: module.req_i64("class")?,
                rating: module.req_str("rating")?,
                category: module.req_str("category")?,
                ship: module.opt_str("ship")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Outfitting {
        modules,
        update_time: fields.req_time("updateTime")?,
    })
}

fn encode_outfitting(outfitting: &Outfitting) -> Value {
    let modules = outfitting
        .modules
        .iter()
        .map(|m| {
            Out::new()
                .put("name", m.name.as_str())
                .put("symbol", m.symbol.as_str())
                .put("moduleId", m.module_id)
                .put("class", m.class)
                .put("rating", m.rating.as_str())
                .put("category", m.category.as_str())
                .opt("ship", m.ship.clone())
                .build()
        })
        .collect();
    Out::new()
        .list("modules", modules)
        .time("updateTime", &outfitting.update_time)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn starport() -> Value {
        json!({
            "name": "Test Station 1",
            "id": 128000001,
            "updateTime": "2023-06-12 05:05:24+00",
            "controllingFaction": "Alpha",
            "controllingFactionState": "Boom",
            "distanceToArrival": 0,
            "primaryEconomy": "Private Enterprise",
            "economies": {"Private Enterprise": 100},
            "allegiance": "Independent",
            "government": "Cooperative",
            "services": ["Market", "Outfitting", "Shipyard"],
            "type": "Coriolis Starport",
            "landingPads": {"large": 4, "medium": 4, "small": 8},
            "market": {
                "commodities": [{
                    "name": "Bertrandite",
                    "symbol": "Bertrandite",
                    "category": "Minerals",
                    "commodityId": 128049156,
                    "demand": 0,
                    "supply": 1628,
                    "buyPrice": 17441,
                    "sellPrice": 0
                }],
                "prohibitedCommodities": ["Bad Commodity 1", "Bad Commodity 2"],
                "updateTime": "2023-06-12 05:05:24+00"
            },
            "shipyard": {
                "ships": [{"name": "Adder", "symbol": "Adder", "shipId": 128049267}],
                "updateTime": "2023-06-12 05:05:25+00"
            },
            "outfitting": {
                "modules": [{
                    "name": "Test Stock 1",
                    "symbol": "test_stock_1",
                    "moduleId": 1,
                    "class": 1,
                    "rating": "E",
                    "category": "Testing",
                    "ship": "Adder"
                }],
                "updateTime": "2023-06-12 05:05:26+00"
            }
        })
    }

    #[test]
    fn test_station_round_trip() {
        let station = decode_station(&starport()).unwrap();
        assert_eq!(station.large_landing_pads, Some(4));
        assert_eq!(station.economies[0].weight, 100.0);
        assert_eq!(station.controlling_faction.as_deref(), Some("Alpha"));
        assert_eq!(encode_station(&station), starport());
    }

    #[test]
    fn test_missing_faction_state_encodes_as_null() {
        let doc = json!({
            "name": "Carrier",
            "id": 3700000000u64,
            "updateTime": "2023-06-12 05:05:24+00",
            "controllingFaction": "FleetCarrier"
        });
        let encoded = encode_station(&decode_station(&doc).unwrap());
        assert_eq!(encoded["controllingFactionState"], Value::Null);
        assert!(encoded.as_object().unwrap().contains_key("controllingFactionState"));
    }

    #[test]
    fn test_minimal_station_has_only_required_keys() {
        let doc = json!({
            "name": "Outpost",
            "id": 7,
            "updateTime": "2023-06-12 05:05:24+00"
        });
        assert_eq!(encode_station(&decode_station(&doc).unwrap()), doc);
    }

    #[test]
    fn test_sub_services_absent_without_data() {
        let mut doc = starport();
        doc.as_object_mut().unwrap().remove("shipyard");
        let station = decode_station(&doc).unwrap();
        assert!(station.shipyard.is_none());
        assert!(encode_station(&station).get("shipyard").is_none());
    }

    #[test]
    fn test_market_error_names_station() {
        let mut doc = starport();
        doc["market"]["updateTime"] = json!(12);
        let err = decode_station(&doc).unwrap_err().to_string();
        assert!(err.contains("Station id=128000001"), "{}", err);
        assert!(err.contains("updateTime"), "{}", err);
    }
}
