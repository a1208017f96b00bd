//! End-to-end value store tests over an in-memory blob store: format
//! negotiation, the decode pipeline, tombstones, migration recovery, and
//! stable hashing.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use strata_blob::{BlobStore, MemSource};
use strata_core::{BlobRead, BlobSource, Identifier, Result};
use strata_value::{
    Migrator, SnapshotCache, SnapshotMerge, ValueCodec, ValueFormat, ValueStore,
    VariableSubstitution, VersionedDecode, VersionedEntity,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DeviceRecord {
    uid: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(rename = "storageVersion", default)]
    storage_version: u32,
}

impl VersionedEntity for DeviceRecord {
    const SCHEMA_VERSION: u32 = 2;
}

impl DeviceRecord {
    fn new(uid: &str, name: &str) -> Self {
        Self {
            uid: uid.to_string(),
            name: name.to_string(),
            location: None,
            tags: Vec::new(),
            storage_version: Self::SCHEMA_VERSION,
        }
    }
}

/// v1 documents used `label` instead of `name`.
struct DeviceV1Migrator;

impl Migrator<DeviceRecord> for DeviceV1Migrator {
    fn applies_to(&self, version: u32) -> bool {
        version < 2
    }

    fn migrate(&self, _id: &Identifier, doc: JsonValue) -> Result<DeviceRecord> {
        Ok(DeviceRecord {
            uid: doc
                .get("uid")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string(),
            name: doc
                .get("label")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string(),
            location: doc
                .get("location")
                .and_then(JsonValue::as_str)
                .map(str::to_string),
            tags: Vec::new(),
            storage_version: DeviceRecord::SCHEMA_VERSION,
        })
    }
}

#[derive(Debug, Default)]
struct MapSnapshots {
    entries: Mutex<HashMap<String, JsonValue>>,
}

impl MapSnapshots {
    fn record(&self, id: &Identifier, doc: JsonValue) {
        self.entries.lock().unwrap().insert(id.to_path(), doc);
    }
}

impl SnapshotCache for MapSnapshots {
    fn snapshot(&self, id: &Identifier) -> Option<JsonValue> {
        self.entries.lock().unwrap().get(&id.to_path()).cloned()
    }
}

fn blob_store() -> (Arc<BlobStore>, Arc<MemSource>) {
    let source = Arc::new(MemSource::new("mem"));
    let store = Arc::new(BlobStore::from_sources(vec![(
        source.clone() as Arc<dyn BlobSource>,
        true,
    )]));
    (store, source)
}

fn plain_store(blobs: Arc<BlobStore>) -> ValueStore<DeviceRecord> {
    ValueStore::new(blobs, ValueCodec::new())
}

#[tokio::test]
async fn put_get_roundtrip_default_format() {
    let (blobs, source) = blob_store();
    let store = plain_store(blobs);
    let id = Identifier::parse("devices/lamp").unwrap();
    let record = DeviceRecord::new("d1", "Lamp");

    store.put(&id, &record).await.unwrap();
    // Default format lands under a .json suffix.
    assert!(source.has("devices/lamp.json").await);

    let loaded = store.get(&id).await.unwrap().unwrap();
    assert_eq!(loaded, record);
}

#[tokio::test]
async fn extension_inference_yaml() {
    let (blobs, source) = blob_store();
    let store = plain_store(blobs);
    let id = Identifier::parse("devices/sensor").unwrap();

    source.insert(
        "devices/sensor.yaml",
        b"uid: d2\nname: Sensor\nstorageVersion: 2\n".to_vec(),
    );

    let loaded = store.get(&id).await.unwrap().unwrap();
    assert_eq!(loaded.uid, "d2");
    assert_eq!(loaded.name, "Sensor");
}

#[tokio::test]
async fn legacy_unsuffixed_file_decodes_as_default() {
    let (blobs, source) = blob_store();
    let store = plain_store(blobs);
    let id = Identifier::parse("devices/old").unwrap();

    source.insert(
        "devices/old",
        br#"{"uid": "d3", "name": "Old", "storageVersion": 2}"#.to_vec(),
    );

    let loaded = store.get(&id).await.unwrap().unwrap();
    assert_eq!(loaded.uid, "d3");
}

#[tokio::test]
async fn tombstones_in_both_text_formats() {
    let (blobs, source) = blob_store();
    let store = plain_store(blobs);

    source.insert("devices/gone-json.json", b"null".to_vec());
    source.insert("devices/gone-yaml.yaml", b"~\n".to_vec());

    let json_id = Identifier::parse("devices/gone-json").unwrap();
    let yaml_id = Identifier::parse("devices/gone-yaml").unwrap();
    assert!(store.get(&json_id).await.unwrap().is_none());
    assert!(store.get(&yaml_id).await.unwrap().is_none());

    // put_tombstone writes the explicit null payload.
    let id = Identifier::parse("devices/removed").unwrap();
    store.put_tombstone(&id).await.unwrap();
    assert_eq!(source.content("devices/removed.json").await.unwrap(), b"null");
    assert!(store.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_removes_every_representation() {
    let (blobs, source) = blob_store();
    let store = plain_store(blobs);
    let id = Identifier::parse("devices/dual").unwrap();

    source.insert(
        "devices/dual.json",
        br#"{"uid": "d", "name": "Dual", "storageVersion": 2}"#.to_vec(),
    );
    source.insert(
        "devices/dual.yaml",
        b"uid: d\nname: Dual\nstorageVersion: 2\n".to_vec(),
    );

    store.delete(&id).await.unwrap();
    assert!(!source.has("devices/dual.json").await);
    assert!(!source.has("devices/dual.yaml").await);
    assert!(store.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn keys_enumerate_in_identifier_order() {
    let (blobs, _source) = blob_store();
    let store = plain_store(blobs);

    for path in ["things/b/deep", "things/a", "things/z", "things/a/nested"] {
        let id = Identifier::parse(path).unwrap();
        store
            .put(&id, &DeviceRecord::new(path, path))
            .await
            .unwrap();
    }

    let keys = store.keys("things").await;
    let paths: Vec<String> = keys.iter().map(Identifier::to_path).collect();
    // Shorter paths sort first, then segment-by-segment, then id.
    assert_eq!(
        paths,
        vec!["things/a", "things/z", "things/a/nested", "things/b/deep"]
    );
}

#[tokio::test]
async fn pipeline_merges_override_fragment_over_snapshot() {
    let (blobs, source) = blob_store();
    let snapshots = Arc::new(MapSnapshots::default());

    let codec = ValueCodec::new()
        .with_middleware(Arc::new(SnapshotMerge::new(snapshots.clone())))
        .with_middleware(Arc::new(
            VersionedDecode::new().with_migrator(Arc::new(DeviceV1Migrator)),
        ));
    let store: ValueStore<DeviceRecord> = ValueStore::new(blobs, codec);

    let id = Identifier::parse("devices/thermostat").unwrap();
    snapshots.record(
        &id,
        json!({"uid": "d9", "name": "Thermostat", "location": "hall", "storageVersion": 2}),
    );

    // A sparse override: only the changed field is stored.
    source.insert(
        "devices/thermostat.json",
        br#"{"location": "kitchen"}"#.to_vec(),
    );

    let loaded = store.get(&id).await.unwrap().unwrap();
    assert_eq!(loaded.uid, "d9");
    assert_eq!(loaded.name, "Thermostat");
    assert_eq!(loaded.location.as_deref(), Some("kitchen"));
}

#[tokio::test]
async fn failed_decode_recovers_through_migration() {
    let (blobs, source) = blob_store();
    let snapshots = Arc::new(MapSnapshots::default());

    let codec = ValueCodec::new()
        .with_middleware(Arc::new(SnapshotMerge::new(snapshots)))
        .with_middleware(Arc::new(
            VersionedDecode::new().with_migrator(Arc::new(DeviceV1Migrator)),
        ));
    let store: ValueStore<DeviceRecord> = ValueStore::new(blobs, codec);

    // A v1 document: no "name" field, so the structural merge stage
    // cannot decode it; recovery routes through the migrator.
    source.insert(
        "devices/antique.json",
        br#"{"uid": "d0", "label": "Antique", "storageVersion": 1}"#.to_vec(),
    );

    let id = Identifier::parse("devices/antique").unwrap();
    let loaded = store.get(&id).await.unwrap().unwrap();
    assert_eq!(loaded.name, "Antique");
    assert_eq!(loaded.storage_version, 2);
}

#[tokio::test]
async fn migration_failure_reports_both_errors() {
    let (blobs, source) = blob_store();
    let snapshots = Arc::new(MapSnapshots::default());

    // Recovery middleware with no migrators: recovery itself must fail.
    let codec = ValueCodec::new()
        .with_middleware(Arc::new(SnapshotMerge::new(snapshots)))
        .with_middleware(Arc::new(VersionedDecode::<DeviceRecord>::new()));
    let store: ValueStore<DeviceRecord> = ValueStore::new(blobs, codec);

    source.insert(
        "devices/broken.json",
        br#"{"uid": "dx", "label": "Broken", "storageVersion": 1}"#.to_vec(),
    );

    let id = Identifier::parse("devices/broken").unwrap();
    let err = store.get(&id).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("recovery also failed"), "got: {}", msg);
}

#[tokio::test]
async fn variable_substitution_preprocessor() {
    let (blobs, source) = blob_store();
    let mut vars = HashMap::new();
    vars.insert("SITE".to_string(), "attic".to_string());

    let codec = ValueCodec::new()
        .with_preprocessor(Arc::new(VariableSubstitution::with_vars_only(vars)));
    let store: ValueStore<DeviceRecord> = ValueStore::new(blobs, codec);

    source.insert(
        "devices/sub.json",
        br#"{"uid": "d5", "name": "Sub", "location": "${SITE}", "storageVersion": 2}"#.to_vec(),
    );

    let id = Identifier::parse("devices/sub").unwrap();
    let loaded = store.get(&id).await.unwrap().unwrap();
    assert_eq!(loaded.location.as_deref(), Some("attic"));
}

#[tokio::test]
async fn stable_hash_survives_storage_roundtrip() {
    let (blobs, _source) = blob_store();
    let store = plain_store(blobs);
    let id = Identifier::parse("devices/hashed").unwrap();

    let record = DeviceRecord {
        uid: "d7".to_string(),
        name: "Hashed".to_string(),
        location: Some("attic".to_string()),
        tags: vec!["a".to_string()],
        storage_version: 2,
    };
    let before = store.stable_hash(&record).unwrap();

    store.put(&id, &record).await.unwrap();
    let loaded = store.get(&id).await.unwrap().unwrap();

    // Same logical value via a different code path: same digest.
    assert_eq!(store.stable_hash(&loaded).unwrap(), before);

    // Any field change moves the digest.
    let mut changed = record.clone();
    changed.location = Some("cellar".to_string());
    assert_ne!(store.stable_hash(&changed).unwrap(), before);

    assert_eq!(store.content_hash(&record).unwrap().len(), 32);
}

#[tokio::test]
async fn serialize_idempotent_after_roundtrip() {
    let (blobs, _source) = blob_store();
    let store = plain_store(blobs);

    let record = DeviceRecord::new("d8", "Idempotent");
    let codec = store.codec();
    let first = codec.encode(&record, ValueFormat::Json).unwrap();
    let reparsed: DeviceRecord = ValueFormat::Json.deserialize(&first).unwrap();
    let second = codec.encode(&reparsed, ValueFormat::Json).unwrap();
    assert_eq!(first, second);
}
