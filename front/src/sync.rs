//! Fire-and-forget mirroring of local mutations to the remote collection.
//!
//! Every call spawns a detached task on the runtime captured at construction.
//! Results are only logged; nothing here ever reaches back into local state.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Arc,
    },
};

use chrono::{DateTime, Utc};
use tidy_api::v1::{Todo, TodoId, TodoPatch};
use tokio::runtime::Handle;
use tracing::error;

use crate::api::ApiClient;

#[derive(Clone, Debug)]
pub struct Syncer {
    api: ApiClient,
    runtime: Handle,
    last_sync: Arc<AtomicI64>,
    in_flight: Arc<AtomicUsize>,
}

impl Syncer {
    pub fn new(api: ApiClient, runtime: Handle) -> Self {
        Self {
            api,
            runtime,
            last_sync: Arc::new(AtomicI64::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Uses the runtime the caller is running on.
    pub fn current(api: ApiClient) -> eyre::Result<Self> {
        Ok(Self::new(api, Handle::try_current()?))
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Time of the last remote call that succeeded.
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        match self.last_sync.load(Ordering::Relaxed) {
            0 => None,
            millis => DateTime::from_timestamp_millis(millis),
        }
    }

    pub fn mark_synced(&self) {
        self.last_sync
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Number of spawned calls that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn create(&self, todo: Todo) {
        let api = self.api.clone();
        self.detach("create todo on server", async move {
            api.create_todo(&todo).await.map(drop)
        });
    }

    pub fn update(&self, id: TodoId, patch: TodoPatch) {
        let api = self.api.clone();
        self.detach("update todo on server", async move {
            api.update_todo(&id, &patch).await.map(drop)
        });
    }

    pub fn delete(&self, id: TodoId) {
        let api = self.api.clone();
        self.detach("delete todo on server", async move { api.delete_todo(&id).await });
    }

    /// Deletes `ids` one after another inside a single task.
    pub fn delete_many(&self, ids: Vec<TodoId>) {
        let api = self.api.clone();
        self.detach("clear completed on server", async move {
            for id in &ids {
                api.delete_todo(id).await?;
            }
            Ok(())
        });
    }

    pub fn push_all(&self, todos: Vec<Todo>) {
        let api = self.api.clone();
        self.detach("sync with server", async move { api.sync_todos(&todos).await });
    }

    fn detach<F>(&self, action: &'static str, fut: F)
    where
        F: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        let last_sync = self.last_sync.clone();
        let in_flight = self.in_flight.clone();
        in_flight.fetch_add(1, Ordering::Relaxed);

        self.runtime.spawn(async move {
            match fut.await {
                Ok(()) => last_sync.store(Utc::now().timestamp_millis(), Ordering::Relaxed),
                Err(err) => error!("Failed to {}: {:?}", action, err),
            }

            in_flight.fetch_sub(1, Ordering::Relaxed);
        });
    }
}
