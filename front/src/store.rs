//! The authoritative in-memory todo collection.
//!
//! Each mutation is one transition: build the next [`Snapshot`], persist it,
//! publish it to subscribers, and only then hand the change to the remote
//! syncer. Remote results never feed back into local state.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Local, TimeZone, Utc};
use thiserror::Error;
use tidy_api::v1::{Category, Priority, Todo, TodoId, TodoPatch};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::{
    achievements::{self, AchievementLedger},
    api::{self, ApiClient},
    config::Config,
    stats::Stats,
    storage::{FileStorage, Persistence},
    sync::Syncer,
    transfer::{self, TransferError},
    view::{self, Filters, SortMode, ViewQuery},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("todo text must not be empty")]
    EmptyText,
}

/// Immutable view of the store after a transition.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub version: u64,
    pub todos: Vec<Todo>,
    pub manual_order: Vec<TodoId>,
    pub sort: SortMode,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

pub struct Store {
    state: Arc<Snapshot>,
    ledger: AchievementLedger,
    persistence: Persistence,
    syncer: Option<Syncer>,
    sync_enabled: bool,
    updates: watch::Sender<Arc<Snapshot>>,
}

impl Store {
    pub fn new(persistence: Persistence) -> Self {
        let state = Arc::new(Snapshot::default());
        let (updates, _) = watch::channel(state.clone());

        Self {
            state,
            ledger: AchievementLedger::default(),
            persistence,
            syncer: None,
            sync_enabled: false,
            updates,
        }
    }

    pub fn with_syncer(mut self, syncer: Syncer, enabled: bool) -> Self {
        self.syncer = Some(syncer);
        self.sync_enabled = enabled;
        self
    }

    /// Opens the on-disk store described by `config` and loads it.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open(config: &Config) -> eyre::Result<Self> {
        let storage = FileStorage::open(&config.data_dir)?;
        let syncer = Syncer::current(ApiClient::new(&config.api_url))?;

        let mut store =
            Self::new(Persistence::new(storage)).with_syncer(syncer, config.sync_enabled);
        store.load().await;

        Ok(store)
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.updates.subscribe()
    }

    pub fn version(&self) -> u64 {
        self.state.version
    }

    pub fn todos(&self) -> &[Todo] {
        &self.state.todos
    }

    pub fn manual_order(&self) -> &[TodoId] {
        &self.state.manual_order
    }

    pub fn sort(&self) -> SortMode {
        self.state.sort
    }

    pub fn get(&self, id: impl AsRef<str>) -> Option<&Todo> {
        self.position(id.as_ref()).map(|index| &self.state.todos[index])
    }

    pub fn counts(&self) -> Counts {
        let total = self.state.todos.len();
        let completed = self.state.todos.iter().filter(|todo| todo.completed).count();

        Counts {
            total,
            completed,
            pending: total - completed,
        }
    }

    pub fn visible(&self, filters: &Filters) -> Vec<Todo> {
        let query = ViewQuery {
            filters: filters.clone(),
            sort: self.state.sort,
        };

        view::project(&self.state.todos, &self.state.manual_order, &query)
    }

    pub fn stats<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Stats {
        Stats::compute(&self.state.todos, now)
    }

    pub fn achievements(&self) -> &AchievementLedger {
        &self.ledger
    }

    pub fn syncer(&self) -> Option<&Syncer> {
        self.syncer.as_ref()
    }

    pub fn sync_enabled(&self) -> bool {
        self.sync_enabled
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.syncer.as_ref().and_then(Syncer::last_sync)
    }

    /// The syncer, if mirroring is switched on.
    fn remote(&self) -> Option<&Syncer> {
        self.syncer.as_ref().filter(|_| self.sync_enabled)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.state.todos.iter().position(|todo| todo.id.as_str() == id)
    }

    fn next(&self) -> Snapshot {
        Snapshot::clone(&self.state)
    }

    fn commit(&mut self, mut next: Snapshot) {
        next.version = self.state.version + 1;

        if let Err(err) = self.persistence.save(&next.todos, &next.manual_order) {
            error!("Failed to store todos: {:?}", err);
        }

        self.state = Arc::new(next);
        self.refresh_achievements();
        self.updates.send_replace(self.state.clone());
    }

    fn refresh_achievements(&mut self) {
        let earned = achievements::evaluate(&self.state.todos, &Local::now());
        for achievement in earned.iter().filter(|a| !self.ledger.is_unlocked(**a)) {
            info!(achievement = achievement.id(), "unlocked achievement");
        }

        if !self.ledger.merge(&earned, Utc::now()) {
            return;
        }

        if let Err(err) = self.persistence.save_ledger(&self.ledger) {
            error!("Failed to store achievements: {:?}", err);
        }
    }

    pub fn add(
        &mut self,
        text: &str,
        category: Category,
        priority: Priority,
        due_date: Option<String>,
    ) -> Result<Todo, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::EmptyText);
        }

        let todo = Todo::new(text, category, priority, non_blank(due_date), Utc::now());

        let mut next = self.next();
        next.todos.insert(0, todo.clone());
        next.manual_order.insert(0, todo.id.clone());
        next.sort = SortMode::Manual;
        self.commit(next);

        info!(id = %todo.id, text = %todo.text, "created todo");

        if let Some(remote) = self.remote() {
            remote.create(todo.clone());
        }

        Ok(todo)
    }

    /// Returns `false` if no todo has this id.
    pub fn toggle(&mut self, id: impl AsRef<str>) -> bool {
        let Some(index) = self.position(id.as_ref()) else {
            return false;
        };

        let mut next = self.next();
        let todo = &mut next.todos[index];
        todo.toggle(Utc::now());

        info!(id = %todo.id, completed = todo.completed, "toggled todo");

        let (id, patch) = (todo.id.clone(), TodoPatch::from(&*todo));
        self.commit(next);

        if let Some(remote) = self.remote() {
            remote.update(id, patch);
        }

        true
    }

    /// Replaces text, category, priority and due date.
    ///
    /// Returns `Ok(false)` if no todo has this id.
    pub fn edit(
        &mut self,
        id: impl AsRef<str>,
        text: &str,
        category: Category,
        priority: Priority,
        due_date: Option<String>,
    ) -> Result<bool, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::EmptyText);
        }

        let Some(index) = self.position(id.as_ref()) else {
            return Ok(false);
        };

        let patch = TodoPatch::edit(text, category, priority, non_blank(due_date));

        let mut next = self.next();
        let todo = &mut next.todos[index];
        todo.apply(&patch);

        info!(id = %todo.id, text = %todo.text, "edited todo");

        let id = todo.id.clone();
        self.commit(next);

        if let Some(remote) = self.remote() {
            remote.update(id, patch);
        }

        Ok(true)
    }

    /// Returns `false` if no todo has this id.
    pub fn delete(&mut self, id: impl AsRef<str>) -> bool {
        let Some(index) = self.position(id.as_ref()) else {
            return false;
        };

        let mut next = self.next();
        let removed = next.todos.remove(index);
        next.manual_order.retain(|id| *id != removed.id);
        self.commit(next);

        info!(id = %removed.id, "deleted todo");

        if let Some(remote) = self.remote() {
            remote.delete(removed.id);
        }

        true
    }

    /// Removes every completed todo in a single transition.
    pub fn clear_completed(&mut self) -> Vec<TodoId> {
        let removed: Vec<TodoId> = (self.state.todos.iter())
            .filter(|todo| todo.completed)
            .map(|todo| todo.id.clone())
            .collect();

        if removed.is_empty() {
            return removed;
        }

        let gone: HashSet<&TodoId> = removed.iter().collect();

        let mut next = self.next();
        next.todos.retain(|todo| !todo.completed);
        next.manual_order.retain(|id| !gone.contains(id));
        self.commit(next);

        info!(count = removed.len(), "cleared completed todos");

        if let Some(remote) = self.remote() {
            remote.delete_many(removed.clone());
        }

        removed
    }

    /// Moves the manual-order entry at `from` to `to` and switches to
    /// manual sorting.
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        let len = self.state.manual_order.len();
        if from == to || from >= len || to >= len {
            return false;
        }

        let mut next = self.next();
        let id = next.manual_order.remove(from);
        next.manual_order.insert(to, id);
        next.sort = SortMode::Manual;
        self.commit(next);

        true
    }

    pub fn set_sort(&mut self, sort: SortMode) {
        if self.state.sort == sort {
            return;
        }

        let mut next = self.next();
        next.sort = sort;
        self.commit(next);
    }

    /// Replaces the whole collection after validating every item.
    ///
    /// Nothing changes if any item is invalid.
    pub fn import_replace(&mut self, mut todos: Vec<Todo>) -> Result<(), TransferError> {
        transfer::validate(&todos)?;
        todos.iter_mut().for_each(Todo::normalize);

        let mut next = self.next();
        next.manual_order = ids(&todos);
        next.todos = todos;
        self.commit(next);

        info!(count = self.state.todos.len(), "imported todos");

        if let Some(remote) = self.remote() {
            remote.push_all(self.state.todos.clone());
        }

        Ok(())
    }

    pub fn import_json(&mut self, document: &str) -> Result<usize, TransferError> {
        let todos = transfer::parse_import(document)?;
        let count = todos.len();
        self.import_replace(todos)?;
        Ok(count)
    }

    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        transfer::export_json(&self.state.todos)
    }

    pub fn set_sync_enabled(&mut self, enabled: bool) {
        if self.sync_enabled == enabled {
            return;
        }

        if enabled && self.syncer.is_none() {
            warn!("Sync requested but no server is configured");
            return;
        }

        self.sync_enabled = enabled;
        info!(enabled, "changed sync mode");

        if enabled && !self.state.todos.is_empty() {
            self.sync_now();
        }
    }

    /// Pushes the whole local collection to the server, replacing what is
    /// there. Returns `false` when sync is off.
    pub fn sync_now(&self) -> bool {
        match self.remote() {
            Some(remote) => {
                remote.push_all(self.state.todos.clone());
                true
            }
            None => false,
        }
    }

    /// Loads the collection, from the server when sync is on and it has
    /// data, otherwise from local storage.
    pub async fn load(&mut self) {
        let remote = match self.remote().cloned() {
            Some(syncer) => fetch_remote(syncer).await,
            None => None,
        };

        let (mut todos, manual_order) = match remote {
            Some(todos) => {
                let order = ids(&todos);
                (todos, order)
            }
            None => self.read_local(),
        };

        self.ledger = self.persistence.load_ledger().unwrap_or_else(|err| {
            error!("Failed to load achievements: {:?}", err);
            AchievementLedger::default()
        });

        todos.iter_mut().for_each(Todo::normalize);

        info!(count = todos.len(), "loaded todos");

        let mut next = self.next();
        next.todos = todos;
        next.manual_order = manual_order;
        self.commit(next);
    }

    fn read_local(&self) -> (Vec<Todo>, Vec<TodoId>) {
        let todos = self.persistence.load_todos().unwrap_or_else(|err| {
            error!("Failed to load todos: {:?}", err);
            Vec::new()
        });

        let order = match self.persistence.load_order() {
            Ok(Some(order)) => order,
            Ok(None) => ids(&todos),
            Err(err) => {
                error!("Failed to load manual order: {:?}", err);
                ids(&todos)
            }
        };

        (todos, order)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("version", &self.state.version)
            .field("todos", &self.state.todos.len())
            .field("sync_enabled", &self.sync_enabled)
            .finish_non_exhaustive()
    }
}

async fn fetch_remote(syncer: Syncer) -> Option<Vec<Todo>> {
    let api = syncer.api().clone();

    match api::spawn(async move { api.get_todos().await }).await {
        Ok(todos) if !todos.is_empty() => {
            syncer.mark_synced();
            Some(todos)
        }
        Ok(_) => {
            info!("server has no todos, using local data");
            None
        }
        Err(err) => {
            warn!("Could not reach server, using local data: {:?}", err);
            None
        }
    }
}

fn ids(todos: &[Todo]) -> Vec<TodoId> {
    todos.iter().map(|todo| todo.id.clone()).collect()
}

fn non_blank(due_date: Option<String>) -> Option<String> {
    due_date.filter(|date| !date.trim().is_empty())
}
