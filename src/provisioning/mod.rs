//! Schema provisioning
//!
//! Makes sure the application container exists on the remote store together
//! with everything it depends on: the ancestor folders, the two schema
//! definitions and the allowed-child-type grant on the workspace. Every step
//! checks before acting and treats "already exists" as success, so several
//! processes can provision the same store at once.
//!
//! Within one process the resolved container is kept in a single-initialization
//! slot. Concurrent callers share one in-flight resolution and all of them see
//! its outcome, success or failure. A failed or cancelled resolution leaves the
//! slot empty for the next caller.

pub mod fault;

pub use fault::{CorrectiveAction, HealState, ProvisioningFault, RemoteFailure};

use crate::catalog::{
    APP_INFO_FIELD, APP_NAME_FIELD, FOLDER_TYPE_NAME, SchemaCatalog,
};
use crate::config::RecorderConfig;
use crate::core::path;
use crate::core::{Container, RecorderError, Result};
use crate::interface::{
    ADD_ALLOWED_CHILD_TYPES_ACTION, ALLOWED_CHILD_TYPES_FIELD, ContentObject,
    DISPLAY_NAME_FIELD, RemoteStore,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, OnceCell};
use tracing::{Instrument, Level, event, info_span};

pub struct SchemaProvisioner<S: RemoteStore + ?Sized> {
    store: Arc<S>,
    config: RecorderConfig,
    catalog: SchemaCatalog,
    container: OnceCell<Container>,
    /// Held for the duration of a resolution; keeps the last failure.
    resolution: Mutex<Option<RecorderError>>,
    /// Number of resolutions that ran to completion.
    completed: AtomicU64,
}

impl<S: RemoteStore + ?Sized> SchemaProvisioner<S> {
    pub fn new(store: Arc<S>, config: RecorderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            catalog: SchemaCatalog::standard(),
            container: OnceCell::new(),
            resolution: Mutex::new(None),
            completed: AtomicU64::new(0),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// The container, if a previous call already resolved it.
    pub fn cached_container(&self) -> Option<&Container> {
        self.container.get()
    }

    /// Resolves the configured container, provisioning it on first use.
    ///
    /// The result is cached for the lifetime of the provisioner. Calls made
    /// while a resolution is in flight wait for it and get its outcome instead
    /// of starting another; a failure is shared the same way but not cached.
    pub async fn ensure_container(&self) -> Result<Container> {
        if let Some(container) = self.container.get() {
            return Ok(container.clone());
        }

        let joined = self.completed.load(Ordering::Acquire);
        let mut last_failure = self.resolution.lock().await;
        if let Some(container) = self.container.get() {
            return Ok(container.clone());
        }
        if self.completed.load(Ordering::Acquire) != joined {
            // The resolution we waited for finished without a container.
            if let Some(err) = last_failure.as_ref() {
                return Err(err.clone());
            }
        }

        let result = self
            .provision(&self.config.apps_path, &self.config.app_name)
            .await;
        match &result {
            Ok(container) => {
                let _ = self.container.set(container.clone());
                *last_failure = None;
            }
            Err(err) => {
                event!(Level::DEBUG, error = %err, "container resolution failed");
                *last_failure = Some(err.clone());
            }
        }
        self.completed.fetch_add(1, Ordering::Release);
        result
    }

    /// Loads `root_path/container_name`, creating it and its prerequisites
    /// when absent. Not cached; see [`Self::ensure_container`].
    pub async fn provision(&self, root_path: &str, container_name: &str) -> Result<Container> {
        path::validate(root_path)?;
        path::validate_name(container_name)?;
        let container_path = path::join(root_path, container_name);
        let span = info_span!("recorder.provision", container = %container_path);

        async move {
            if let Some(existing) = self.load(&container_path).await? {
                let container = Container::from_object(&existing);
                let record_type = self.catalog.record.type_name;
                if container.accepts(record_type) {
                    event!(Level::DEBUG, "container already provisioned");
                } else {
                    event!(
                        Level::WARN,
                        content_type = %record_type,
                        allowed = ?container.allowed_child_types,
                        "existing container does not accept records"
                    );
                }
                return Ok(container);
            }

            self.ensure_folder(root_path).await?;
            self.ensure_schemas().await?;
            self.grant_allowed_child_types().await?;

            let object = self.container_object(root_path, container_name);
            match self.save_with_healing(&object).await {
                Ok(saved) => {
                    event!(Level::DEBUG, id = ?saved.id, "container created");
                    Ok(Container::from_object(&saved))
                }
                Err(RecorderError::AlreadyExists { path }) => {
                    // Another client created it between our load and save.
                    event!(Level::DEBUG, "container created concurrently");
                    self.load(&path)
                        .await?
                        .map(|existing| Container::from_object(&existing))
                        .ok_or(RecorderError::AlreadyExists { path })
                }
                Err(err) => Err(err),
            }
        }
        .instrument(span)
        .await
    }

    fn container_object(&self, root_path: &str, container_name: &str) -> ContentObject {
        let mut object =
            self.store
                .create_child(root_path, self.catalog.container.type_name, container_name);
        object.set_field(DISPLAY_NAME_FIELD, self.config.display_name.as_str());
        object.set_field(APP_NAME_FIELD, self.config.display_name.as_str());
        if let Some(info) = &self.config.app_info {
            object.set_field(APP_INFO_FIELD, info.as_str());
        }
        object.set_field(
            ALLOWED_CHILD_TYPES_FIELD,
            json!(self.catalog.container_child_types()),
        );
        object
    }

    /// Creates every missing folder of `folder_path`.
    ///
    /// Walks up to the first existing ancestor, then creates the missing
    /// segments top-down.
    pub async fn ensure_folder(&self, folder_path: &str) -> Result<()> {
        path::validate(folder_path)?;

        let mut missing: Vec<(String, String)> = Vec::new();
        let mut current = folder_path.to_string();
        while self.load(&current).await?.is_none() {
            let Some(parent) = path::parent_path(&current) else {
                return Err(RecorderError::InvalidPath(format!(
                    "no existing ancestor for '{folder_path}'"
                )));
            };
            let parent = parent.to_string();
            missing.push((parent.clone(), path::file_name(&current).to_string()));
            current = parent;
        }

        for (parent, name) in missing.iter().rev() {
            let folder = self.store.create_child(parent, FOLDER_TYPE_NAME, name);
            match self.store.save(&folder).await {
                Ok(_) => event!(Level::DEBUG, folder = %folder.path(), "folder created"),
                Err(err) => match RemoteFailure::classify(&err) {
                    RemoteFailure::AlreadyExists => {
                        event!(Level::DEBUG, folder = %folder.path(), "folder created concurrently")
                    }
                    _ => return Err(RecorderError::remote("create folder", err)),
                },
            }
        }
        Ok(())
    }

    /// Uploads every schema definition that is not installed yet.
    pub async fn ensure_schemas(&self) -> Result<()> {
        let schema_root = &self.config.schema_root;
        for definition in self.catalog.definitions() {
            let schema_path = definition.schema_path(schema_root);
            if self.load(&schema_path).await?.is_some() {
                continue;
            }

            let result = self
                .store
                .upload_schema_definition(
                    &definition.upload_target(schema_root),
                    definition.type_name,
                    &definition.to_document(),
                )
                .await;
            match result {
                Ok(()) => event!(Level::DEBUG, content_type = %definition.type_name, "schema installed"),
                Err(err) => match RemoteFailure::classify(&err) {
                    RemoteFailure::AlreadyExists => event!(
                        Level::DEBUG,
                        content_type = %definition.type_name,
                        "schema installed concurrently"
                    ),
                    _ => return Err(RecorderError::remote("upload schema definition", err)),
                },
            }
        }
        Ok(())
    }

    /// Grants the application types as allowed children of the workspace.
    /// Re-granting is a no-op on the server.
    pub async fn grant_allowed_child_types(&self) -> Result<()> {
        let payload = json!({ "contentTypes": self.catalog.granted_type_names() });
        self.store
            .invoke_action(
                &self.config.workspace_path,
                ADD_ALLOWED_CHILD_TYPES_ACTION,
                payload,
            )
            .await
            .map_err(|err| RecorderError::remote("grant allowed child types", err))?;
        event!(Level::DEBUG, workspace = %self.config.workspace_path, "allowed child types granted");
        Ok(())
    }

    /// Saves `object`, repairing missing schema or permissions on the way.
    ///
    /// A recoverable failure triggers its corrective action and one more
    /// attempt. If the same fault shows up again after its action ran, the
    /// save fails with [`RecorderError::NotConverged`]. Unrecognized failures
    /// are returned at once.
    pub async fn save_with_healing(&self, object: &ContentObject) -> Result<ContentObject> {
        let mut state = HealState::new();
        loop {
            let err = match self.store.save(object).await {
                Ok(saved) => return Ok(saved),
                Err(err) => err,
            };

            let fault = match RemoteFailure::classify(&err) {
                RemoteFailure::Recoverable(fault) => fault,
                RemoteFailure::AlreadyExists => {
                    return Err(RecorderError::AlreadyExists {
                        path: object.path(),
                    });
                }
                RemoteFailure::Cancelled => return Err(RecorderError::Cancelled),
                RemoteFailure::Fatal => return Err(RecorderError::remote("save", err)),
            };

            let Some(action) = state.next_action(fault) else {
                event!(
                    Level::WARN,
                    path = %object.path(),
                    %fault,
                    applied = ?state.applied().collect::<Vec<_>>(),
                    "save still fails after corrective actions"
                );
                return Err(RecorderError::NotConverged {
                    path: object.path(),
                    fault,
                    message: err.to_string(),
                });
            };

            event!(
                Level::WARN,
                path = %object.path(),
                %fault,
                %action,
                attempt = state.attempts(),
                "save failed, applying corrective action"
            );
            self.apply(action).await?;
        }
    }

    async fn apply(&self, action: CorrectiveAction) -> Result<()> {
        match action {
            CorrectiveAction::InstallSchemas => self.ensure_schemas().await,
            CorrectiveAction::GrantAllowedChildTypes => self.grant_allowed_child_types().await,
        }
    }

    async fn load(&self, path: &str) -> Result<Option<ContentObject>> {
        self.store
            .load_by_path(path)
            .await
            .map_err(|err| RecorderError::remote("load", err))
    }
}
