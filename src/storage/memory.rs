use super::query;
use crate::core::path;
use crate::interface::{
    ADD_ALLOWED_CHILD_TYPES_ACTION, ALLOWED_CHILD_TYPES_FIELD, ContentObject, QueryRequest,
    RemoteError, RemoteStore,
};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Value as JsonValue, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

lazy_static! {
    static ref DEFINITION_NAME: Regex =
        Regex::new(r#"<ContentType\s[^>]*?\bname="([^"]*)""#).expect("name pattern is valid");
    static ref DEFINITION_PARENT: Regex =
        Regex::new(r#"<ContentType\s[^>]*?\bparentType="([^"]*)""#).expect("parent pattern is valid");
}

const SCHEMA_TYPES_PATH: &str = "/Root/System/Schema/ContentTypes";
const CONTENT_TYPE_TYPE: &str = "ContentType";
const DEFINITION_FIELD: &str = "Binary";

/// Built-in types with their schema path below `SCHEMA_TYPES_PATH`.
const BUILTIN_TYPES: &[(&str, &str)] = &[
    ("ContentType", "ContentType"),
    ("GenericContent", "GenericContent"),
    ("Folder", "GenericContent/Folder"),
    ("Workspace", "GenericContent/Folder/Workspace"),
    ("SystemFolder", "GenericContent/Folder/SystemFolder"),
    ("PortalRoot", "GenericContent/Folder/PortalRoot"),
];

/// A remote call as observed by [`MemoryContentStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Load { path: String },
    Save { path: String, type_name: String },
    Query { content_query: String },
    Upload { target_path: String, type_name: String },
    Invoke { path: String, action: String },
    Ping,
}

impl StoreCall {
    /// True for calls that can change repository state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Save { .. } | Self::Upload { .. } | Self::Invoke { .. }
        )
    }
}

#[derive(Default)]
struct StoreState {
    objects: BTreeMap<String, ContentObject>,
    /// Installed content types by name, with their schema path.
    types: BTreeMap<String, String>,
    next_id: u64,
    calls: Vec<StoreCall>,
}

impl StoreState {
    fn insert(&mut self, mut object: ContentObject) -> ContentObject {
        self.next_id += 1;
        object.id = Some(self.next_id);
        self.objects.insert(object.path(), object.clone());
        object
    }

    fn bootstrap_object(&mut self, object_path: &str, type_name: &str) -> ContentObject {
        let parent = path::parent_path(object_path).unwrap_or("");
        self.insert(ContentObject::new(parent, type_name, path::file_name(object_path)))
    }

    /// Nearest ancestor (starting at `parent_path`) with an explicit allowed list.
    fn allowed_child_types(&self, parent_path: &str) -> Option<Vec<String>> {
        let mut current = Some(parent_path);
        while let Some(p) = current {
            if let Some(object) = self.objects.get(p) {
                let allowed = object.string_list_field(ALLOWED_CHILD_TYPES_FIELD);
                if !allowed.is_empty() {
                    return Some(allowed);
                }
            }
            current = path::parent_path(p);
        }
        None
    }

    fn save_new(&mut self, object: &ContentObject) -> Result<ContentObject, RemoteError> {
        let object_path = object.path();
        if path::validate(&object_path).is_err() || path::validate_name(&object.name).is_err() {
            return Err(RemoteError::rejected(format!(
                "Invalid content name '{}'",
                object.name
            )));
        }
        if !self.objects.contains_key(&object.parent_path) {
            return Err(RemoteError::rejected(format!(
                "Cannot save the content. Parent '{}' does not exist",
                object.parent_path
            )));
        }
        if !self.types.contains_key(&object.type_name) {
            return Err(RemoteError::rejected(format!(
                "Unknown content type: '{}'",
                object.type_name
            )));
        }
        if self.objects.contains_key(&object_path) {
            return Err(RemoteError::rejected(format!(
                "Content already exists: '{object_path}'"
            )));
        }
        if let Some(allowed) = self.allowed_child_types(&object.parent_path) {
            if !allowed.iter().any(|t| *t == object.type_name) {
                return Err(RemoteError::rejected(format!(
                    "Cannot save the content '{}' because its ancestor does not allow the type '{}'",
                    object_path, object.type_name
                )));
            }
        }
        Ok(self.insert(object.clone()))
    }

    fn save_existing(&mut self, object: &ContentObject) -> Result<ContentObject, RemoteError> {
        let object_path = object.path();
        match self.objects.get_mut(&object_path) {
            Some(existing) if existing.id == object.id => {
                existing.fields = object.fields.clone();
                Ok(existing.clone())
            }
            _ => Err(RemoteError::rejected(format!(
                "Content '{object_path}' not found"
            ))),
        }
    }

    fn install_type(
        &mut self,
        target_path: &str,
        type_name: &str,
        document: &str,
    ) -> Result<(), RemoteError> {
        if !self.objects.contains_key(target_path) {
            return Err(RemoteError::rejected(format!(
                "Cannot upload to '{target_path}': target does not exist"
            )));
        }
        if self.types.contains_key(type_name) {
            return Err(RemoteError::rejected(format!(
                "Content type '{type_name}' already exists"
            )));
        }

        let declared = DEFINITION_NAME
            .captures(document)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
        if declared != Some(type_name) {
            return Err(RemoteError::rejected(format!(
                "Invalid content type definition: expected name '{type_name}', found {declared:?}"
            )));
        }
        if let Some(parent) = DEFINITION_PARENT
            .captures(document)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
        {
            if !self.types.contains_key(parent) {
                return Err(RemoteError::rejected(format!(
                    "Invalid content type definition: parent type '{parent}' is not installed"
                )));
            }
        }

        let mut schema = ContentObject::new(target_path, CONTENT_TYPE_TYPE, type_name);
        schema.set_field(DEFINITION_FIELD, document);
        let schema = self.insert(schema);
        self.types.insert(type_name.to_string(), schema.path());
        Ok(())
    }

    fn add_allowed_child_types(
        &mut self,
        object_path: &str,
        payload: &JsonValue,
    ) -> Result<JsonValue, RemoteError> {
        let requested: Vec<String> = payload
            .get("contentTypes")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| {
                RemoteError::rejected("Invalid payload: 'contentTypes' must be an array")
            })?
            .iter()
            .filter_map(|t| t.as_str().map(str::to_string))
            .collect();

        let object = self
            .objects
            .get_mut(object_path)
            .ok_or_else(|| RemoteError::rejected(format!("Content '{object_path}' not found")))?;

        let mut allowed = object.string_list_field(ALLOWED_CHILD_TYPES_FIELD);
        for type_name in requested {
            if !allowed.contains(&type_name) {
                allowed.push(type_name);
            }
        }
        object.set_field(ALLOWED_CHILD_TYPES_FIELD, json!(allowed));
        Ok(json!({ ALLOWED_CHILD_TYPES_FIELD: allowed }))
    }
}

/// In-process content repository.
///
/// Behaves like the remote store as far as the recorder can observe it:
/// saves are checked against the installed types and the nearest ancestor's
/// allowed child types, failures carry the repository's error messages, and
/// every call is journaled for inspection.
pub struct MemoryContentStore {
    state: Mutex<StoreState>,
    latency: Option<Duration>,
    online: AtomicBool,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        let mut state = StoreState::default();

        state.bootstrap_object("/Root", "PortalRoot");
        let mut content = ContentObject::new("/Root", "Workspace", "Content");
        content.set_field(ALLOWED_CHILD_TYPES_FIELD, json!(["Folder", "Workspace"]));
        state.insert(content);
        for folder in ["/Root/System", "/Root/System/Schema", SCHEMA_TYPES_PATH] {
            state.bootstrap_object(folder, "SystemFolder");
        }

        for (type_name, relative) in BUILTIN_TYPES {
            let schema_path = path::join(SCHEMA_TYPES_PATH, relative);
            let mut schema = state.bootstrap_object(&schema_path, CONTENT_TYPE_TYPE);
            schema.set_field(DEFINITION_FIELD, format!("<ContentType name=\"{type_name}\" />"));
            state.objects.insert(schema_path.clone(), schema);
            state.types.insert(type_name.to_string(), schema_path);
        }

        Self {
            state: Mutex::new(state),
            latency: None,
            online: AtomicBool::new(true),
        }
    }

    /// Delays every call by `latency`, so concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes [`RemoteStore::ping`] fail while offline.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }

    /// Journaled calls that can change state, in call order.
    pub async fn mutations(&self) -> Vec<StoreCall> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    pub async fn installed_types(&self) -> Vec<String> {
        self.state.lock().await.types.keys().cloned().collect()
    }

    pub async fn object_count(&self) -> usize {
        self.state.lock().await.objects.len()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryContentStore {
    async fn load_by_path(&self, path: &str) -> Result<Option<ContentObject>, RemoteError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Load {
            path: path.to_string(),
        });
        Ok(state.objects.get(path).cloned())
    }

    async fn save(&self, object: &ContentObject) -> Result<ContentObject, RemoteError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Save {
            path: object.path(),
            type_name: object.type_name.clone(),
        });
        if object.is_new() {
            state.save_new(object)
        } else {
            state.save_existing(object)
        }
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<ContentObject>, RemoteError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Query {
            content_query: request.content_query.clone(),
        });
        query::evaluate(state.objects.values(), request)
    }

    async fn upload_schema_definition(
        &self,
        target_path: &str,
        type_name: &str,
        document: &str,
    ) -> Result<(), RemoteError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Upload {
            target_path: target_path.to_string(),
            type_name: type_name.to_string(),
        });
        state.install_type(target_path, type_name, document)
    }

    async fn invoke_action(
        &self,
        path: &str,
        action_name: &str,
        payload: JsonValue,
    ) -> Result<JsonValue, RemoteError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::Invoke {
            path: path.to_string(),
            action: action_name.to_string(),
        });
        match action_name {
            ADD_ALLOWED_CHILD_TYPES_ACTION => state.add_allowed_child_types(path, &payload),
            other => Err(RemoteError::rejected(format!("Unknown action '{other}'"))),
        }
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        self.simulate_latency().await;
        self.state.lock().await.calls.push(StoreCall::Ping);
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Transport("store is offline".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA_ROOT: &str = "/Root/System/Schema/ContentTypes/GenericContent";

    #[tokio::test]
    async fn test_bootstrap_layout() {
        let store = MemoryContentStore::new();
        assert!(store.load_by_path("/Root/Content").await.unwrap().is_some());
        assert!(
            store
                .load_by_path("/Root/System/Schema/ContentTypes/GenericContent/Folder")
                .await
                .unwrap()
                .is_some()
        );
        assert!(store.load_by_path("/Root/Content/Apps").await.unwrap().is_none());
        assert!(store.installed_types().await.contains(&"Folder".to_string()));
    }

    #[tokio::test]
    async fn test_save_error_messages() {
        let store = MemoryContentStore::new();

        let orphan = store.create_child("/Root/Content/Missing", "Folder", "x");
        let err = store.save(&orphan).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        let unknown = store.create_child("/Root/Content", "BloodPressure", "x");
        let err = store.save(&unknown).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown content type: 'BloodPressure'");

        let folder = store.create_child("/Root/Content", "Folder", "Apps");
        store.save(&folder).await.unwrap();
        let err = store.save(&folder).await.unwrap_err();
        assert_eq!(err.to_string(), "Content already exists: '/Root/Content/Apps'");

        let disallowed = store.create_child("/Root/Content/Apps", "SystemFolder", "sys");
        let err = store.save(&disallowed).await.unwrap_err();
        assert!(err.to_string().starts_with(
            "Cannot save the content '/Root/Content/Apps/sys' because its ancestor does not allow the type"
        ));
    }

    #[tokio::test]
    async fn test_upload_and_grant() {
        let store = MemoryContentStore::new();
        let doc = crate::catalog::CONTAINER_SCHEMA.to_document();
        let target = format!("{SCHEMA_ROOT}/Folder");

        store
            .upload_schema_definition(&target, "ClientApplicationFolderV0_1", &doc)
            .await
            .unwrap();
        let again = store
            .upload_schema_definition(&target, "ClientApplicationFolderV0_1", &doc)
            .await
            .unwrap_err();
        assert!(again.to_string().contains("already exists"));

        let mismatch = store
            .upload_schema_definition(SCHEMA_ROOT, "Other", &doc)
            .await
            .unwrap_err();
        assert!(mismatch.to_string().contains("expected name 'Other'"));

        let payload = json!({ "contentTypes": ["ClientApplicationFolderV0_1"] });
        store
            .invoke_action("/Root/Content", ADD_ALLOWED_CHILD_TYPES_ACTION, payload.clone())
            .await
            .unwrap();
        let response = store
            .invoke_action("/Root/Content", ADD_ALLOWED_CHILD_TYPES_ACTION, payload)
            .await
            .unwrap();
        assert_eq!(
            response[ALLOWED_CHILD_TYPES_FIELD],
            json!(["Folder", "Workspace", "ClientApplicationFolderV0_1"])
        );
    }

    #[tokio::test]
    async fn test_update_existing_object() {
        let store = MemoryContentStore::new();
        let folder = store.create_child("/Root/Content", "Folder", "Apps");
        let mut saved = store.save(&folder).await.unwrap();
        saved.set_field("Description", "apps");
        store.save(&saved).await.unwrap();

        let loaded = store.load_by_path("/Root/Content/Apps").await.unwrap().unwrap();
        assert_eq!(loaded.str_field("Description"), Some("apps"));
    }

    #[tokio::test]
    async fn test_ping_and_journal() {
        let store = MemoryContentStore::new();
        assert!(store.ping().await.is_ok());
        store.set_online(false);
        assert!(matches!(store.ping().await, Err(RemoteError::Transport(_))));
        assert_eq!(store.calls().await, vec![StoreCall::Ping, StoreCall::Ping]);
        assert!(store.mutations().await.is_empty());
    }
}
