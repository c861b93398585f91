#![allow(dead_code)]

use async_trait::async_trait;
use bp_recorder::{
    ContentObject, MemoryContentStore, QueryRequest, RecordStore, RemoteError, RemoteStore,
};
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const UNKNOWN_TYPE_MESSAGE: &str = "Unknown content type: 'BloodPressure'";
pub const DISALLOWED_MESSAGE: &str = "Cannot save the content '/Root/Content/Apps/BPR-V0_1/x' \
     because its ancestor does not allow the type 'BloodPressure'";

/// Memory store whose saves of one content type can be made to fail.
pub struct FaultyStore {
    pub inner: MemoryContentStore,
    failing_type: String,
    queued: Mutex<VecDeque<RemoteError>>,
    persistent: Mutex<Option<RemoteError>>,
    saves: AtomicUsize,
}

impl FaultyStore {
    pub fn new(failing_type: &str) -> Self {
        Self::wrapping(MemoryContentStore::new(), failing_type)
    }

    pub fn wrapping(inner: MemoryContentStore, failing_type: &str) -> Self {
        Self {
            inner,
            failing_type: failing_type.to_string(),
            queued: Mutex::new(VecDeque::new()),
            persistent: Mutex::new(None),
            saves: AtomicUsize::new(0),
        }
    }

    /// Fails the next save of the watched type with `err`.
    pub fn fail_next(&self, err: RemoteError) {
        self.queued.lock().unwrap().push_back(err);
    }

    /// Fails every save of the watched type with `err`.
    pub fn fail_always(&self, err: RemoteError) {
        *self.persistent.lock().unwrap() = Some(err);
    }

    /// Saves of the watched type, failed ones included.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn injected_failure(&self) -> Option<RemoteError> {
        if let Some(err) = self.queued.lock().unwrap().pop_front() {
            return Some(err);
        }
        self.persistent.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStore for FaultyStore {
    async fn load_by_path(&self, path: &str) -> Result<Option<ContentObject>, RemoteError> {
        self.inner.load_by_path(path).await
    }

    async fn save(&self, object: &ContentObject) -> Result<ContentObject, RemoteError> {
        if object.type_name == self.failing_type {
            self.saves.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.injected_failure() {
                return Err(err);
            }
        }
        self.inner.save(object).await
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<ContentObject>, RemoteError> {
        self.inner.query(request).await
    }

    async fn upload_schema_definition(
        &self,
        target_path: &str,
        type_name: &str,
        document: &str,
    ) -> Result<(), RemoteError> {
        self.inner
            .upload_schema_definition(target_path, type_name, document)
            .await
    }

    async fn invoke_action(
        &self,
        path: &str,
        action_name: &str,
        payload: JsonValue,
    ) -> Result<JsonValue, RemoteError> {
        self.inner.invoke_action(path, action_name, payload).await
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        self.inner.ping().await
    }
}

pub fn memory_recorder() -> (Arc<MemoryContentStore>, RecordStore<MemoryContentStore>) {
    let store = Arc::new(MemoryContentStore::new());
    let recorder = RecordStore::open(Arc::clone(&store)).unwrap();
    (store, recorder)
}

pub fn faulty_recorder(failing_type: &str) -> (Arc<FaultyStore>, RecordStore<FaultyStore>) {
    let store = Arc::new(FaultyStore::new(failing_type));
    let recorder = RecordStore::open(Arc::clone(&store)).unwrap();
    (store, recorder)
}
