use relay_storage::{
    InMemoryInstrumentStore, InMemoryOutputStore, InstrumentRecord, InstrumentStore, OutputRecord,
    OutputStore, SeedData, load_seed,
};
use serde_json::json;

fn output(output_id: &str, instrument_id: &str, enabled: bool) -> OutputRecord {
    OutputRecord {
        output_id: output_id.to_string(),
        instrument_id: instrument_id.to_string(),
        enabled,
        output_type: "mqtt".to_string(),
        config: json!({ "frequency": 10 }),
    }
}

#[tokio::test]
async fn enabled_outputs_keep_insertion_order() {
    let store = InMemoryOutputStore::new();
    store.insert_output(output("out-b", "geiger-1", true)).expect("insert");
    store.insert_output(output("out-a", "geiger-1", true)).expect("insert");
    store.insert_output(output("out-c", "geiger-1", false)).expect("insert");
    store.insert_output(output("out-d", "geiger-2", true)).expect("insert");

    let enabled = store.list_enabled_outputs("geiger-1").await.expect("list");
    let ids: Vec<&str> = enabled.iter().map(|item| item.output_id.as_str()).collect();
    assert_eq!(ids, vec!["out-b", "out-a"]);

    let all = store.list_outputs("geiger-1").await.expect("list");
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn toggling_and_removing_outputs() {
    let store = InMemoryOutputStore::new();
    store.insert_output(output("out-1", "geiger-1", true)).expect("insert");
    assert!(store.insert_output(output("out-1", "geiger-1", true)).is_err());

    assert!(store.set_enabled("out-1", false).expect("toggle"));
    assert!(!store.set_enabled("missing", false).expect("toggle"));
    assert!(store.list_enabled_outputs("geiger-1").await.expect("list").is_empty());

    assert!(store.remove_output("out-1").expect("remove"));
    assert!(store.list_outputs("geiger-1").await.expect("list").is_empty());
}

#[tokio::test]
async fn instrument_lookup() {
    let store = InMemoryInstrumentStore::new();
    store
        .insert_instrument(InstrumentRecord {
            instrument_id: "geiger-1".to_string(),
            name: "Lab counter".to_string(),
            instrument_type: "usb_geiger".to_string(),
            port_config: json!({ "type": "serial", "path": "/dev/ttyUSB0" }),
        })
        .expect("insert");

    let found = store.find_instrument("geiger-1").await.expect("find");
    assert_eq!(found.map(|item| item.name), Some("Lab counter".to_string()));
    assert!(store.find_instrument("missing").await.expect("find").is_none());
    assert_eq!(store.list_instruments().await.expect("list").len(), 1);
}

#[tokio::test]
async fn seed_file_builds_stores() {
    let seed = json!({
        "instruments": [
            { "instrument_id": "geiger-1", "name": "Lab", "port_config": { "type": "tcp", "host": "127.0.0.1", "port": 4001 } }
        ],
        "outputs": [
            { "output_id": "out-1", "instrument_id": "geiger-1", "output_type": "rest", "config": { "url": "http://localhost/ingest" } },
            { "output_id": "out-2", "instrument_id": "geiger-1", "enabled": false, "output_type": "mqtt" }
        ]
    });
    let path = std::env::temp_dir().join(format!("relay-seed-{}.json", std::process::id()));
    std::fs::write(&path, seed.to_string()).expect("write seed");

    let data = load_seed(&path).expect("load");
    std::fs::remove_file(&path).ok();
    assert_eq!(data.instruments[0].instrument_type, "usb_geiger");

    let (instruments, outputs) = data.into_stores().expect("stores");
    assert!(instruments.find_instrument("geiger-1").await.expect("find").is_some());
    let enabled = outputs.list_enabled_outputs("geiger-1").await.expect("list");
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].output_type, "rest");
}

#[test]
fn invalid_seed_is_reported() {
    assert!(SeedData::from_json("{ not json").is_err());
    assert!(load_seed("/nonexistent/relay-seed.json").is_err());
}
