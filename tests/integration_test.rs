//! Integration tests that verify dump documents survive a trip through SQLite.
//!
//! These tests:
//! 1. Import documents into a temporary database
//! 2. Fetch the same systems back and re-encode them
//! 3. Compare against the input, modulo ordering, nulls and float noise
//!
//! The sampling test against a real dump is ignored by default. Run with:
//! ```sh
//! SPANSH_TEST_DATA=/path/to/galaxy_1day.json.gz cargo test --test integration_test -- --ignored
//! ```

use indicatif::ProgressBar;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::{NamedTempFile, TempDir};

use spansh_galaxy_store::batch::{export_file, open_dump, ImportOptions, Importer};
use spansh_galaxy_store::mapping::parse_timestamp;
use spansh_galaxy_store::schema::tables::{
    BODY, FACTION, MARKET_ORDER, POWER, STATION, SYSTEM,
};
use spansh_galaxy_store::{dump_system, load_body, load_system, Error, GalaxyStore};

// =============================================================================
// Test Configuration
// =============================================================================

/// Number of random documents sampled from a real dump
const SAMPLE_SIZE: usize = 25;

/// Random seed for reproducible sampling
const RANDOM_SEED: u64 = 42;

/// Relative tolerance for float comparison
const TOLERANCE: f64 = 1e-9;

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/mock-galaxy-data.json")
}

/// Every document of the fixture dump, in file order
fn fixture_documents() -> Vec<Value> {
    open_dump(&fixture_path())
        .expect("Failed to open fixture")
        .map(|doc| serde_json::from_str(&doc.expect("Failed to read fixture").text).unwrap())
        .collect()
}

fn fixture_system(name: &str) -> Value {
    fixture_documents()
        .into_iter()
        .find(|doc| doc["name"] == name)
        .unwrap_or_else(|| panic!("No system named {} in fixture", name))
}

// =============================================================================
// Shared Test Database
// =============================================================================

/// The fixture imported once and shared by the read-only tests
static FIXTURE_DB: Lazy<Mutex<TestDatabase>> =
    Lazy::new(|| Mutex::new(TestDatabase::import(&fixture_path())));

struct TestDatabase {
    _temp_file: NamedTempFile,
    db_path: PathBuf,
}

impl TestDatabase {
    fn import(input: &Path) -> Self {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_path_buf();

        let report = importer(&db_path)
            .import_file(input, &ProgressBar::hidden())
            .expect("Failed to import dump");
        for failure in report.failures() {
            panic!("{}: {:?}", failure.label(), failure.result);
        }

        Self {
            _temp_file: temp_file,
            db_path,
        }
    }

    fn store(&self) -> GalaxyStore {
        GalaxyStore::open(&self.db_path).expect("Failed to open test database")
    }
}

fn fixture_store() -> GalaxyStore {
    FIXTURE_DB.lock().unwrap().store()
}

fn importer(db_path: &Path) -> Importer {
    let options = ImportOptions {
        jobs: 2,
        ..ImportOptions::default()
    };
    Importer::new(db_path, options).expect("Failed to prepare database")
}

/// A fresh, empty database in its own directory
fn empty_store() -> (TempDir, GalaxyStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = GalaxyStore::open(&dir.path().join("galaxy.sqlite3")).unwrap();
    store.create_tables().unwrap();
    (dir, store)
}

// =============================================================================
// Value Comparison Utilities
// =============================================================================

/// Bring a document into a canonical form for comparison:
/// - null values and empty lists/objects are dropped
/// - numbers become floats
/// - date/time strings become RFC 3339 UTC
/// - lists are sorted by their natural key
fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize(v)))
                .filter(|(_, v)| !is_empty(v))
                .collect(),
        ),
        Value::Array(items) => {
            let mut items: Vec<Value> = items.iter().map(normalize).collect();
            items.sort_by_key(natural_key);
            Value::Array(items)
        }
        Value::Number(n) => n.as_f64().map(|f| json!(f)).unwrap_or(Value::Null),
        Value::String(s) => match parse_timestamp(s) {
            Some(t) if s.starts_with(|c: char| c.is_ascii_digit()) => json!(t.to_rfc3339()),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn natural_key(v: &Value) -> String {
    for key in ["id64", "id", "symbol", "name"] {
        if let Some(k) = v.get(key) {
            return k.to_string();
        }
    }
    v.to_string()
}

/// Structural equality with relative float tolerance
fn assert_same(expected: &Value, actual: &Value, path: &str) {
    match (expected, actual) {
        (Value::Object(e), Value::Object(a)) => {
            let mut keys: Vec<_> = e.keys().chain(a.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                let field = format!("{}/{}", path, key);
                match (e.get(key), a.get(key)) {
                    (Some(ev), Some(av)) => assert_same(ev, av, &field),
                    (ev, av) => panic!("Mismatch at {}: {:?} vs {:?}", field, ev, av),
                }
            }
        }
        (Value::Array(e), Value::Array(a)) => {
            assert_eq!(e.len(), a.len(), "Length mismatch at {}", path);
            for (i, (ev, av)) in e.iter().zip(a).enumerate() {
                assert_same(ev, av, &format!("{}/{}", path, i));
            }
        }
        (Value::Number(e), Value::Number(a)) => {
            let (e, a) = (e.as_f64().unwrap(), a.as_f64().unwrap());
            let scale = e.abs().max(a.abs()).max(1.0);
            assert!(
                (e - a).abs() <= TOLERANCE * scale,
                "Number mismatch at {}: {} vs {}",
                path,
                e,
                a
            );
        }
        _ => assert_eq!(expected, actual, "Mismatch at {}", path),
    }
}

/// The round-trip law: importing a document and exporting it again gives
/// back the same document
fn assert_round_trip(store: &GalaxyStore, doc: &Value) {
    let id64 = doc["id64"].as_u64().expect("Missing id64");
    let fetched = store
        .fetch_system(id64)
        .unwrap()
        .unwrap_or_else(|| panic!("System {} not found", id64));
    assert_same(
        &normalize(doc),
        &normalize(&dump_system(&fetched)),
        &format!("id64={}", id64),
    );
}

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_fixture_round_trip() {
    let store = fixture_store();
    for doc in fixture_documents() {
        assert_round_trip(&store, &doc);
    }
}

#[test]
fn test_fixture_row_counts() {
    let store = fixture_store();
    assert_eq!(store.count_rows(&SYSTEM).unwrap(), 3);
    assert_eq!(store.count_rows(&BODY).unwrap(), 3);
    assert_eq!(store.count_rows(&STATION).unwrap(), 3);
    assert_eq!(store.count_rows(&MARKET_ORDER).unwrap(), 2);
    assert_eq!(store.count_rows(&POWER).unwrap(), 1);
}

#[test]
fn test_shared_faction_stored_once() {
    let store = fixture_store();
    // three Sol factions plus the fleet carrier owner
    assert_eq!(store.count_rows(&FACTION).unwrap(), 4);

    let count: i64 = store
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM faction WHERE name = ?",
            ["Sol Workers' Party"],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);

    let government: String = store
        .connection()
        .query_row(
            "SELECT government FROM faction WHERE name = 'FleetCarrier'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(government, "Fleet Carrier");
}

#[test]
fn test_export_then_reimport() {
    let source = fixture_store();
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("export.json.gz");
    let written = export_file(&source, &[], &dump, &ProgressBar::hidden()).unwrap();
    assert_eq!(written, 3);

    let copy = TestDatabase::import(&dump);
    let copy = copy.store();
    for id64 in source.system_ids().unwrap() {
        assert_eq!(
            copy.fetch_system(id64).unwrap(),
            source.fetch_system(id64).unwrap(),
            "System {} differs after export and re-import",
            id64
        );
    }
}

// =============================================================================
// Monotonicity Tests
// =============================================================================

#[test]
fn test_reapplying_fixture_changes_nothing() {
    let (_dir, mut store) = empty_store();
    let sol = load_system(&fixture_system("Sol")).unwrap();

    let first = store.apply_system(&sol).unwrap();
    assert_eq!(first.skipped, 0);

    let second = store.apply_system(&sol).unwrap();
    assert_eq!(second.applied, 0);
    assert_eq!(second.skipped, first.applied);
    assert_round_trip(&store, &fixture_system("Sol"));
}

/// Move one timestamp of the Sol document into the past and expect the
/// whole document to be rejected for that entity
macro_rules! monotonicity_test {
    ($test_name:ident, $pointer:expr, $entity:expr) => {
        #[test]
        fn $test_name() {
            check_outdated_rejected($pointer, $entity);
        }
    };
}

fn check_outdated_rejected(pointer: &str, entity: &str) {
    let (_dir, mut store) = empty_store();
    let original = fixture_system("Sol");
    store.apply_system(&load_system(&original).unwrap()).unwrap();

    let mut outdated = original.clone();
    *outdated.pointer_mut(pointer).unwrap_or_else(|| panic!("No field {}", pointer)) =
        json!("2020-01-01 00:00:00+00");
    // a newer system date must not help the outdated child
    outdated["date"] = json!("2024-01-01 00:00:00+00");
    outdated["population"] = json!(1);

    match store.apply_system(&load_system(&outdated).unwrap()) {
        Err(Error::Monotonicity { entity: found, .. }) => assert_eq!(found, entity),
        other => panic!("Expected {} monotonicity failure, got {:?}", entity, other),
    }

    // nothing of the rejected document was kept
    assert_round_trip(&store, &original);
}

monotonicity_test!(test_outdated_body, "/bodies/1/updateTime", "Body");
monotonicity_test!(test_outdated_station, "/stations/0/updateTime", "Station");
monotonicity_test!(
    test_outdated_body_station,
    "/bodies/1/stations/0/updateTime",
    "Station"
);
monotonicity_test!(
    test_outdated_market,
    "/bodies/1/stations/0/market/updateTime",
    "Market"
);
monotonicity_test!(
    test_outdated_outfitting,
    "/bodies/1/stations/0/outfitting/updateTime",
    "Outfitting"
);
monotonicity_test!(
    test_outdated_shipyard,
    "/stations/0/shipyard/updateTime",
    "Shipyard"
);
monotonicity_test!(test_outdated_signals, "/bodies/1/signals/updateTime", "Signals");
monotonicity_test!(
    test_outdated_ring_signals,
    "/bodies/2/rings/0/signals/updateTime",
    "Signals"
);
monotonicity_test!(
    test_outdated_body_timestamp,
    "/bodies/1/timestamps/meanAnomaly",
    "BodyTimestamp"
);

#[test]
fn test_outdated_system() {
    let (_dir, mut store) = empty_store();
    let original = fixture_system("Sol");
    store.apply_system(&load_system(&original).unwrap()).unwrap();

    let mut outdated = original.clone();
    outdated["date"] = json!("2020-01-01 00:00:00+00");
    let err = store
        .apply_system(&load_system(&outdated).unwrap())
        .unwrap_err();
    assert!(matches!(err, Error::Monotonicity { entity: "System", .. }), "{}", err);
    assert!(err.to_string().contains("id64=10477373803"), "{}", err);
}

#[test]
fn test_newer_child_applies_under_unchanged_system() {
    let (_dir, mut store) = empty_store();
    let original = fixture_system("Sol");
    store.apply_system(&load_system(&original).unwrap()).unwrap();

    let mut update = original.clone();
    update["bodies"][2]["updateTime"] = json!("2024-01-01 00:00:00+00");
    update["bodies"][2]["reserveLevel"] = json!("Depleted");
    let changes = store.apply_system(&load_system(&update).unwrap()).unwrap();
    assert_eq!(changes.applied, 1);
    assert_round_trip(&store, &update);
}

// =============================================================================
// Association Tests
// =============================================================================

#[test]
fn test_orphan_body_adopted_by_system() {
    let (_dir, mut store) = empty_store();
    let sol = fixture_system("Sol");

    let mut orphan = sol["bodies"][2].clone();
    orphan.as_object_mut().unwrap().remove("stations");
    store.apply_body(&load_body(&orphan).unwrap()).unwrap();
    let pending = store.fetch_body(108086091658561451).unwrap().unwrap();
    assert_eq!(pending.root.system_id64, None);

    store.apply_system(&load_system(&sol).unwrap()).unwrap();
    assert_eq!(store.count_rows(&BODY).unwrap(), 3);
    let adopted = store.fetch_body(108086091658561451).unwrap().unwrap();
    assert_eq!(adopted.root.system_id64, Some(10477373803));
    assert_round_trip(&store, &sol);
}

#[test]
fn test_mobile_station_moves_between_systems() {
    let (_dir, mut store) = empty_store();
    let carrier_system = fixture_system("HIP 22460");
    store
        .apply_system(&load_system(&carrier_system).unwrap())
        .unwrap();

    let mut sol = fixture_system("Sol");
    let mut carrier = carrier_system["stations"][0].clone();
    carrier["updateTime"] = json!("2024-01-01 00:00:00+00");
    sol["stations"].as_array_mut().unwrap().push(carrier);
    store.apply_system(&load_system(&sol).unwrap()).unwrap();

    let moved = store.fetch_station(3700543232).unwrap().unwrap();
    assert_eq!(moved.root.system_id64, Some(10477373803));
    assert_eq!(store.count_rows(&STATION).unwrap(), 3);
    let left_behind = store.fetch_system(2007930963706).unwrap().unwrap();
    assert!(left_behind.root.stations.is_empty());
}

// =============================================================================
// Batch Tests
// =============================================================================

#[test]
fn test_batch_isolates_failing_documents() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("mixed.json");
    let docs = fixture_documents();
    let mut broken = docs[0].clone();
    broken["bodies"][0].as_object_mut().unwrap().remove("type");
    let lines = [
        docs[1].to_string(),
        broken.to_string(),
        "{\"id64\": ".to_string(),
        docs[2].to_string(),
    ];
    std::fs::write(&input, format!("[\n{}\n]\n", lines.join(",\n"))).unwrap();

    let db_path = dir.path().join("galaxy.sqlite3");
    let report = importer(&db_path)
        .import_file(&input, &ProgressBar::hidden())
        .unwrap();
    assert_eq!(report.documents(), 4);
    assert_eq!(report.succeeded(), 2);

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].line, 3);
    assert!(matches!(failures[0].result, Err(Error::Decode { entity: "Body", .. })));
    assert_eq!(failures[1].line, 4);
    assert!(matches!(failures[1].result, Err(Error::Json(_))));

    let store = GalaxyStore::open(&db_path).unwrap();
    assert_eq!(store.count_rows(&SYSTEM).unwrap(), 2);
    assert!(store.fetch_system(10477373803).unwrap().is_none());
}

// =============================================================================
// Real Dump Sampling
// =============================================================================

/// Get the dump named by SPANSH_TEST_DATA
fn get_dump_path() -> PathBuf {
    std::env::var("SPANSH_TEST_DATA")
        .map(PathBuf::from)
        .expect("SPANSH_TEST_DATA environment variable must be set to a Spansh dump file")
}

/// Sample random documents from a dump file
fn sample_documents(path: &Path, count: usize) -> Vec<Value> {
    let texts: Vec<String> = open_dump(path)
        .expect("Failed to open dump")
        .filter_map(|doc| doc.ok())
        .map(|doc| doc.text)
        .collect();

    let mut rng = rand::rngs::StdRng::seed_from_u64(RANDOM_SEED);
    texts
        .choose_multiple(&mut rng, count.min(texts.len()))
        .map(|text| serde_json::from_str(text).expect("Failed to parse document"))
        .collect()
}

#[test]
#[ignore]
fn test_sampled_dump_round_trip() {
    let samples = sample_documents(&get_dump_path(), SAMPLE_SIZE);
    let (_dir, mut store) = empty_store();

    for doc in &samples {
        let aggregate = load_system(doc)
            .unwrap_or_else(|e| panic!("Failed to load {}: {}", doc["id64"], e));
        store.apply_system(&aggregate).unwrap();
        assert_round_trip(&store, doc);
    }
    println!("Verified {} sampled systems", samples.len());
}
