use crate::catalog::{
    DIASTOLIC_FIELD, PULSE_FIELD, RECORDED_FIELD, SYSTOLIC_FIELD,
};
use crate::config::RecorderConfig;
use crate::core::path;
use crate::core::{Container, Record, RecorderError, Result};
use crate::interface::{QueryRequest, RemoteStore};
use crate::provisioning::SchemaProvisioner;
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

/// Highest suffix tried when a record name is already taken
/// (`"2024-01-01 10:00:00 (2)"` .. `"(10)"`).
pub const MAX_NAME_SUFFIX: u32 = 10;

/// Reachability of the remote store as last observed by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Offline,
    Connecting,
    Connected,
}

/// Appends measurement records to the application container and reads them back.
///
/// The container is provisioned lazily on the first save or history load and
/// cached for the lifetime of the store.
///
/// # Examples
///
/// ```
/// use bp_recorder::{MemoryContentStore, Record, RecordStore};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let recorder = RecordStore::open(Arc::new(MemoryContentStore::new())).unwrap();
/// recorder.save_record(&Record::now(120, 80, 60)).await.unwrap();
///
/// let history = recorder.load_history().await.unwrap();
/// assert_eq!(history.len(), 1);
/// # });
/// ```
pub struct RecordStore<S: RemoteStore + ?Sized> {
    provisioner: SchemaProvisioner<S>,
}

impl<S: RemoteStore + ?Sized> RecordStore<S> {
    pub fn new(store: Arc<S>, config: RecorderConfig) -> Result<Self> {
        Ok(Self {
            provisioner: SchemaProvisioner::new(store, config)?,
        })
    }

    /// Opens a record store with the default configuration.
    pub fn open(store: Arc<S>) -> Result<Self> {
        Self::new(store, RecorderConfig::default())
    }

    pub fn provisioner(&self) -> &SchemaProvisioner<S> {
        &self.provisioner
    }

    pub async fn ensure_container(&self) -> Result<Container> {
        self.provisioner.ensure_container().await
    }

    /// Stores `record` under the container and returns its repository path.
    ///
    /// If a record with the same second-precision name exists, the next free
    /// `" (n)"` suffix is used. Nothing is buffered locally: a failed save is
    /// reported and the record is not kept.
    pub async fn save_record(&self, record: &Record) -> Result<String> {
        let container = self.provisioner.ensure_container().await?;
        let base_name = record.name();
        let span = info_span!("recorder.save_record", record = %base_name);

        async move {
            let type_name = self.provisioner.catalog().record.type_name;
            for attempt in 1..=MAX_NAME_SUFFIX {
                let name = if attempt == 1 {
                    base_name.clone()
                } else {
                    format!("{base_name} ({attempt})")
                };

                let mut object = self
                    .provisioner
                    .store()
                    .create_child(&container.path, type_name, &name);
                record.apply_to(&mut object);

                match self.provisioner.save_with_healing(&object).await {
                    Ok(saved) => {
                        let saved_path = saved.path();
                        event!(Level::DEBUG, path = %saved_path, "record saved");
                        return Ok(saved_path);
                    }
                    Err(RecorderError::AlreadyExists { path }) => {
                        event!(Level::DEBUG, %path, "record name taken");
                    }
                    Err(err) => return Err(err),
                }
            }

            Err(RecorderError::AlreadyExists {
                path: path::join(&container.path, &base_name),
            })
        }
        .instrument(span)
        .await
    }

    /// All records of the container, newest first.
    ///
    /// Records sharing a timestamp keep the order the store returned them in.
    pub async fn load_history(&self) -> Result<Vec<Record>> {
        let container = self.provisioner.ensure_container().await?;
        let request = history_query(&container.path, self.provisioner.catalog().record.type_name);

        let objects = self
            .provisioner
            .store()
            .query(&request)
            .await
            .map_err(|err| RecorderError::remote("query history", err))?;

        let mut records = objects
            .iter()
            .map(Record::from_object)
            .collect::<Result<Vec<_>>>()?;
        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));

        event!(Level::DEBUG, count = records.len(), "history loaded");
        Ok(records)
    }

    /// Pings the store. Never fails: an unreachable store reads as `Offline`.
    pub async fn check_connection(&self) -> ConnectionStatus {
        match self.provisioner.store().ping().await {
            Ok(()) => ConnectionStatus::Connected,
            Err(err) => {
                event!(Level::DEBUG, error = %err, "remote store unreachable");
                ConnectionStatus::Offline
            }
        }
    }
}

/// Query selecting every record below `container_path`, newest first.
pub fn history_query(container_path: &str, record_type_name: &str) -> QueryRequest {
    QueryRequest::new(format!(
        "+InTree:'{container_path}' +TypeIs:'{record_type_name}'"
    ))
    .order_by(format!("{RECORDED_FIELD} desc"))
    .select([
        "Id",
        "Path",
        "Name",
        "Type",
        RECORDED_FIELD,
        SYSTOLIC_FIELD,
        DIASTOLIC_FIELD,
        PULSE_FIELD,
    ])
}
