use crate::core::path;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// Field holding the human readable title of a content object.
pub const DISPLAY_NAME_FIELD: &str = "DisplayName";
/// Field listing the type names a content object accepts as children.
pub const ALLOWED_CHILD_TYPES_FIELD: &str = "AllowedChildTypes";
/// Server action that extends the allowed child types of a content object.
pub const ADD_ALLOWED_CHILD_TYPES_ACTION: &str = "AddAllowedChildTypes";

/// Error returned by a [`RemoteStore`] call.
///
/// `Rejected` carries the free-text message of a structured server error. The
/// text is only ever inspected by `provisioning::fault`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("{message}")]
    Rejected { message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote operation cancelled")]
    Cancelled,
}

impl RemoteError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message } => Some(message),
            _ => None,
        }
    }
}

/// A content object as seen by the client: either a fresh handle built by
/// [`RemoteStore::create_child`] (no `id` yet) or an object loaded from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentObject {
    pub id: Option<u64>,
    pub parent_path: String,
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub fields: Map<String, JsonValue>,
}

impl ContentObject {
    pub fn new(parent_path: &str, type_name: &str, name: &str) -> Self {
        Self {
            id: None,
            parent_path: parent_path.to_string(),
            name: name.to_string(),
            type_name: type_name.to_string(),
            fields: Map::new(),
        }
    }

    pub fn path(&self) -> String {
        path::join(&self.parent_path, &self.name)
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn field(&self, name: &str) -> Option<&JsonValue> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<JsonValue>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(JsonValue::as_str)
    }

    pub fn i64_field(&self, name: &str) -> Option<i64> {
        self.field(name).and_then(JsonValue::as_i64)
    }

    /// Reads a list of strings; non-string entries are skipped.
    pub fn string_list_field(&self, name: &str) -> Vec<String> {
        self.field(name)
            .and_then(JsonValue::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Structured content query.
///
/// `content_query` uses the repository query syntax
/// (`+InTree:'/Root/Content' +TypeIs:'Folder'`), `order_by` entries are
/// `"<Field> [asc|desc]"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub content_query: String,
    pub order_by: Vec<String>,
    pub select: Vec<String>,
}

impl QueryRequest {
    pub fn new(content_query: impl Into<String>) -> Self {
        Self {
            content_query: content_query.into(),
            ..Self::default()
        }
    }

    pub fn order_by(mut self, key: impl Into<String>) -> Self {
        self.order_by.push(key.into());
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(fields.into_iter().map(Into::into));
        self
    }
}

/// Client side of the remote content repository.
///
/// Timeouts, authentication and transport belong to the implementation.
/// Cancellation follows the usual async rule: dropping a returned future
/// abandons the call, and an implementation that observes an aborted request
/// reports [`RemoteError::Cancelled`].
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Loads the object at `path`, `Ok(None)` when nothing is stored there.
    async fn load_by_path(&self, path: &str) -> Result<Option<ContentObject>, RemoteError>;

    /// Builds an unsaved handle for a new child of `parent_path`.
    fn create_child(&self, parent_path: &str, type_name: &str, name: &str) -> ContentObject {
        ContentObject::new(parent_path, type_name, name)
    }

    /// Persists `object`, returning the stored version (with its `id`).
    async fn save(&self, object: &ContentObject) -> Result<ContentObject, RemoteError>;

    async fn query(&self, request: &QueryRequest) -> Result<Vec<ContentObject>, RemoteError>;

    /// Installs a schema definition document as `target_path/type_name`.
    async fn upload_schema_definition(
        &self,
        target_path: &str,
        type_name: &str,
        document: &str,
    ) -> Result<(), RemoteError>;

    /// Invokes a named server action on the object at `path`.
    async fn invoke_action(
        &self,
        path: &str,
        action_name: &str,
        payload: JsonValue,
    ) -> Result<JsonValue, RemoteError>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<(), RemoteError>;
}
