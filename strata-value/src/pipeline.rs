//! Decode pipeline: byte pre-processors and typed decode middlewares.
//!
//! Deserialization is a two-stage pipeline over raw bytes. Byte
//! pre-processors run first, in registration order, each transforming raw
//! bytes to raw bytes (text formats only). Typed middlewares run next,
//! each given the identifier, the current bytes, and the running
//! partially-built value, and returning a new value.
//!
//! Schema migration is a checked branch on the stored version, not
//! error-driven control flow; the `recover` hook exists only as the
//! last-resort path when another middleware fails to decode.

use crate::format::ValueFormat;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use strata_core::{Error, Identifier, Result};
use tracing::debug;

/// Field carrying the stored schema version of a serialized value.
///
/// A document without the field reads as version 0.
pub const STORAGE_VERSION_FIELD: &str = "storageVersion";

/// A byte-to-byte transform applied before structural parsing.
pub trait BytePreprocessor: Send + Sync {
    /// Transform raw bytes into raw bytes.
    fn process(&self, id: &Identifier, bytes: Vec<u8>) -> Result<Vec<u8>>;
}

/// `${NAME}` variable substitution over the decoded text.
///
/// Lookup order: the explicit variable map, then the process environment.
/// Unresolved references are left intact.
#[derive(Debug, Default)]
pub struct VariableSubstitution {
    vars: HashMap<String, String>,
    use_env: bool,
}

impl VariableSubstitution {
    /// Substitution against the process environment only.
    pub fn from_env() -> Self {
        Self {
            vars: HashMap::new(),
            use_env: true,
        }
    }

    /// Substitution against an explicit map, then the environment.
    pub fn with_vars(vars: HashMap<String, String>) -> Self {
        Self {
            vars,
            use_env: true,
        }
    }

    /// Substitution against an explicit map only (hermetic; for tests).
    pub fn with_vars_only(vars: HashMap<String, String>) -> Self {
        Self {
            vars,
            use_env: false,
        }
    }

    fn resolve(&self, name: &str) -> Option<String> {
        if let Some(value) = self.vars.get(name) {
            return Some(value.clone());
        }
        if self.use_env {
            if let Ok(value) = std::env::var(name) {
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
        None
    }
}

impl BytePreprocessor for VariableSubstitution {
    fn process(&self, _id: &Identifier, bytes: Vec<u8>) -> Result<Vec<u8>> {
        // Non-UTF-8 payloads pass through untouched.
        let Ok(text) = std::str::from_utf8(&bytes) else {
            return Ok(bytes);
        };

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let name = &after[..end];
                    match self.resolve(name) {
                        Some(value) => out.push_str(&value),
                        None => {
                            out.push_str("${");
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        Ok(out.into_bytes())
    }
}

/// One stage of the typed decode pipeline.
#[async_trait::async_trait]
pub trait DecodeMiddleware<T>: Send + Sync {
    /// Produce a new running value from the current bytes.
    ///
    /// `current` is the value built by earlier stages, if any.
    async fn decode(
        &self,
        id: &Identifier,
        format: ValueFormat,
        bytes: &[u8],
        current: Option<T>,
    ) -> Result<Option<T>>;

    /// Whether this middleware can recover a failed decode.
    fn supports_recovery(&self) -> bool {
        false
    }

    /// Last-resort decode attempt after another stage failed.
    async fn recover(
        &self,
        id: &Identifier,
        format: ValueFormat,
        bytes: &[u8],
    ) -> Result<Option<T>> {
        let _ = (id, format, bytes);
        Err(Error::decode("middleware does not support recovery"))
    }
}

/// Previous-snapshot lookup used to seed partial-update merges.
///
/// Implemented by the host's value cache; the pipeline only reads it.
pub trait SnapshotCache: Send + Sync {
    /// The last known decoded tree for the identifier, if any.
    fn snapshot(&self, id: &Identifier) -> Option<JsonValue>;
}

/// Merge a sparse patch document over a base tree, field-presence-aware.
///
/// Keys present in the patch override the base; nested maps merge
/// recursively; an explicit null in the patch removes the key.
pub fn merge_fields(base: JsonValue, patch: JsonValue) -> JsonValue {
    match (base, patch) {
        (JsonValue::Object(mut base_map), JsonValue::Object(patch_map)) => {
            for (key, value) in patch_map {
                if value.is_null() {
                    base_map.remove(&key);
                } else {
                    let merged = match base_map.remove(&key) {
                        Some(prev) => merge_fields(prev, value),
                        None => value,
                    };
                    base_map.insert(key, merged);
                }
            }
            JsonValue::Object(base_map)
        }
        (_, patch) => patch,
    }
}

/// Cache-aware partial-merge decode stage.
///
/// Seeds the decode from the previous snapshot (or the running value)
/// and merges the new document's fields on top, so stored documents may
/// be sparse override fragments that only specify changed fields.
pub struct SnapshotMerge<T> {
    cache: Arc<dyn SnapshotCache>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SnapshotMerge<T> {
    /// Create a merge stage over the given snapshot cache.
    pub fn new(cache: Arc<dyn SnapshotCache>) -> Self {
        Self {
            cache,
            _marker: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<T> DecodeMiddleware<T> for SnapshotMerge<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn decode(
        &self,
        id: &Identifier,
        format: ValueFormat,
        bytes: &[u8],
        current: Option<T>,
    ) -> Result<Option<T>> {
        // Binary documents are complete by construction; no merge.
        if !format.is_text() {
            return Ok(Some(format.deserialize(bytes)?));
        }

        let patch = format.to_tree(bytes)?;
        let base = match current {
            Some(value) => Some(serde_json::to_value(&value)?),
            None => self.cache.snapshot(id),
        };

        let merged = match base {
            Some(base) => {
                debug!(id = %id, "merging document over previous snapshot");
                merge_fields(base, patch)
            }
            None => patch,
        };
        Ok(Some(serde_json::from_value(merged)?))
    }
}

/// A value type carrying a schema version.
pub trait VersionedEntity: Serialize + DeserializeOwned + Send + Sync {
    /// Current schema version of this type.
    const SCHEMA_VERSION: u32;
}

/// Transforms a historical-schema document into the current schema.
pub trait Migrator<T>: Send + Sync {
    /// Whether this migrator handles documents stored at `version`.
    fn applies_to(&self, version: u32) -> bool;

    /// Decode the historical document and transform it to the current
    /// schema.
    fn migrate(&self, id: &Identifier, doc: JsonValue) -> Result<T>;
}

/// Stored version of a document tree (missing field reads as 0).
pub fn stored_version(doc: &JsonValue) -> u32 {
    doc.get(STORAGE_VERSION_FIELD)
        .and_then(JsonValue::as_u64)
        .unwrap_or(0) as u32
}

/// Version-checking decode stage with migration support.
///
/// Structural decode against the current schema when versions line up;
/// when the stored version is behind and a migrator applies, the
/// historical document is decoded and transformed instead. Also serves
/// as the pipeline's recovery middleware.
pub struct VersionedDecode<T> {
    migrators: Vec<Arc<dyn Migrator<T>>>,
}

impl<T> VersionedDecode<T> {
    /// Stage with no migrators (plain version-checked decode).
    pub fn new() -> Self {
        Self {
            migrators: Vec::new(),
        }
    }

    /// Register a migrator.
    pub fn with_migrator(mut self, migrator: Arc<dyn Migrator<T>>) -> Self {
        self.migrators.push(migrator);
        self
    }

    fn migrator_for(&self, version: u32) -> Option<&Arc<dyn Migrator<T>>> {
        self.migrators.iter().find(|m| m.applies_to(version))
    }
}

impl<T> Default for VersionedDecode<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<T> DecodeMiddleware<T> for VersionedDecode<T>
where
    T: VersionedEntity,
{
    async fn decode(
        &self,
        id: &Identifier,
        format: ValueFormat,
        bytes: &[u8],
        current: Option<T>,
    ) -> Result<Option<T>> {
        // An earlier stage already built the value (e.g. a sparse
        // fragment merged over a snapshot); version-checking the raw
        // fragment would misfire, so pass the value through. Historical
        // whole documents fail that stage's structural decode and reach
        // this middleware via `recover` instead.
        if let Some(value) = current {
            return Ok(Some(value));
        }

        if !format.is_text() {
            return Ok(Some(format.deserialize(bytes)?));
        }

        let doc = format.to_tree(bytes)?;
        let stored = stored_version(&doc);

        if stored < T::SCHEMA_VERSION {
            if let Some(migrator) = self.migrator_for(stored) {
                debug!(id = %id, stored, schema = T::SCHEMA_VERSION, "migrating stored value");
                return Ok(Some(migrator.migrate(id, doc)?));
            }
        }

        Ok(Some(serde_json::from_value(doc)?))
    }

    fn supports_recovery(&self) -> bool {
        true
    }

    async fn recover(
        &self,
        id: &Identifier,
        format: ValueFormat,
        bytes: &[u8],
    ) -> Result<Option<T>> {
        let doc = format.to_tree(bytes)?;
        let stored = stored_version(&doc);
        let migrator = self.migrator_for(stored).ok_or_else(|| {
            Error::decode(format!(
                "no migrator for stored version {} of '{}'",
                stored, id
            ))
        })?;
        debug!(id = %id, stored, "recovering decode via migration");
        Ok(Some(migrator.migrate(id, doc)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn ident(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    #[test]
    fn test_substitution_map_and_unresolved() {
        let mut vars = HashMap::new();
        vars.insert("HOST".to_string(), "example.org".to_string());
        let sub = VariableSubstitution::with_vars_only(vars);

        let out = sub
            .process(&ident("a/x"), b"host: ${HOST}, other: ${MISSING}".to_vec())
            .unwrap();
        assert_eq!(out, b"host: example.org, other: ${MISSING}");
    }

    #[test]
    fn test_substitution_env_fallback() {
        std::env::set_var("STRATA_TEST_SUB_VAR", "from-env");
        let sub = VariableSubstitution::from_env();
        let out = sub
            .process(&ident("a/x"), b"v=${STRATA_TEST_SUB_VAR}".to_vec())
            .unwrap();
        assert_eq!(out, b"v=from-env");
    }

    #[test]
    fn test_substitution_unterminated_reference() {
        let sub = VariableSubstitution::with_vars_only(HashMap::new());
        let out = sub.process(&ident("a/x"), b"tail ${OPEN".to_vec()).unwrap();
        assert_eq!(out, b"tail ${OPEN");
    }

    #[test]
    fn test_merge_fields_override_and_removal() {
        let base = json!({"a": 1, "b": {"x": 1, "y": 2}, "c": 3});
        let patch = json!({"b": {"y": 20, "z": 30}, "c": null, "d": 4});
        let merged = merge_fields(base, patch);
        assert_eq!(
            merged,
            json!({"a": 1, "b": {"x": 1, "y": 20, "z": 30}, "d": 4})
        );
    }

    #[test]
    fn test_merge_fields_scalar_replaces() {
        assert_eq!(merge_fields(json!([1, 2]), json!([3])), json!([3]));
        assert_eq!(merge_fields(json!({"a": 1}), json!(7)), json!(7));
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(rename = "storageVersion", default)]
        storage_version: u32,
    }

    impl VersionedEntity for Widget {
        const SCHEMA_VERSION: u32 = 2;
    }

    struct FixedSnapshot(Option<JsonValue>);

    impl SnapshotCache for FixedSnapshot {
        fn snapshot(&self, _id: &Identifier) -> Option<JsonValue> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_snapshot_merge_seeds_from_cache() {
        let snapshot = json!({"name": "widget", "color": "red", "storageVersion": 2});
        let stage: SnapshotMerge<Widget> =
            SnapshotMerge::new(Arc::new(FixedSnapshot(Some(snapshot))));

        // A sparse override fragment: only the changed field.
        let fragment = br#"{"color": "blue"}"#;
        let widget = stage
            .decode(&ident("widgets/w1"), ValueFormat::Json, fragment, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(widget.name, "widget");
        assert_eq!(widget.color.as_deref(), Some("blue"));
    }

    #[tokio::test]
    async fn test_snapshot_merge_without_cache_decodes_whole() {
        let stage: SnapshotMerge<Widget> = SnapshotMerge::new(Arc::new(FixedSnapshot(None)));
        let doc = br#"{"name": "solo", "storageVersion": 2}"#;
        let widget = stage
            .decode(&ident("widgets/w1"), ValueFormat::Json, doc, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(widget.name, "solo");
    }

    struct WidgetV1Migrator;

    impl Migrator<Widget> for WidgetV1Migrator {
        fn applies_to(&self, version: u32) -> bool {
            version < 2
        }

        fn migrate(&self, _id: &Identifier, doc: JsonValue) -> Result<Widget> {
            // v1 used "label" for what v2 calls "name".
            let name = doc
                .get("label")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(Widget {
                name,
                color: doc
                    .get("color")
                    .and_then(JsonValue::as_str)
                    .map(str::to_string),
                storage_version: Widget::SCHEMA_VERSION,
            })
        }
    }

    #[tokio::test]
    async fn test_versioned_decode_current_schema() {
        let stage: VersionedDecode<Widget> = VersionedDecode::new();
        let doc = br#"{"name": "fresh", "storageVersion": 2}"#;
        let widget = stage
            .decode(&ident("widgets/w1"), ValueFormat::Json, doc, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(widget.name, "fresh");
    }

    #[tokio::test]
    async fn test_versioned_decode_migrates_old_version() {
        let stage = VersionedDecode::new().with_migrator(Arc::new(WidgetV1Migrator));
        let doc = br#"{"label": "legacy", "storageVersion": 1}"#;
        let widget = stage
            .decode(&ident("widgets/w1"), ValueFormat::Json, doc, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(widget.name, "legacy");
        assert_eq!(widget.storage_version, 2);
    }

    #[tokio::test]
    async fn test_versioned_decode_missing_field_is_version_zero() {
        let stage = VersionedDecode::new().with_migrator(Arc::new(WidgetV1Migrator));
        let doc = br#"{"label": "ancient"}"#;
        let widget = stage
            .decode(&ident("widgets/w1"), ValueFormat::Json, doc, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(widget.name, "ancient");
    }

    #[tokio::test]
    async fn test_recover_requires_matching_migrator() {
        let with_migrator = VersionedDecode::new().with_migrator(Arc::new(WidgetV1Migrator));
        let doc = br#"{"label": "old", "storageVersion": 1}"#;
        let widget = with_migrator
            .recover(&ident("widgets/w1"), ValueFormat::Json, doc)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(widget.name, "old");

        let without: VersionedDecode<Widget> = VersionedDecode::new();
        assert!(without
            .recover(&ident("widgets/w1"), ValueFormat::Json, doc)
            .await
            .is_err());
    }
}
