pub mod v1;

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use axum::Router;
use serde::{Deserialize, Serialize};
use tidy_api::v1::{Todo, TodoId};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Default, Debug)]
pub struct AppState {
    pub generation: AtomicU64,
    pub todos: Mutex<HashMap<TodoId, Todo>>,
    data_file: Option<PathBuf>,
}

impl AppState {
    /// Reads `data_file` if it exists; later [`store`](Self::store) calls
    /// write back to it.
    pub fn load(data_file: impl Into<PathBuf>) -> eyre::Result<Self> {
        let data_file = data_file.into();

        let file = match fs::File::open(&data_file) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Self {
                    data_file: Some(data_file),
                    ..Self::default()
                });
            }
            Err(err) => eyre::bail!(err),
        };
        let data: DataOwned = ron::de::from_reader(file)?;

        match data {
            DataOwned::V1 { todos } => Ok(Self::from_v1(todos, data_file)),
        }
    }

    /// State that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    fn from_v1(todos: HashMap<TodoId, Todo>, data_file: PathBuf) -> Self {
        Self {
            generation: AtomicU64::new(0),
            todos: Mutex::new(todos),
            data_file: Some(data_file),
        }
    }

    pub fn data_file(&self) -> Option<&Path> {
        self.data_file.as_deref()
    }

    pub fn increment_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn store(&self) -> eyre::Result<()> {
        let Some(path) = &self.data_file else {
            return Ok(());
        };

        let todos = self.todos.lock().await;
        let data = DataBorrowd::V1 { todos: &todos };

        let file = fs::File::create(path)?;
        let mut ron = ron::Serializer::new(file, Some(Default::default()))?;
        data.serialize(&mut ron)?;

        Ok(())
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", v1::router())
        .with_state(state)
}

/// Serves the API on an already bound plain TCP listener.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> io::Result<()> {
    axum::serve(listener, app(state)).await
}

#[derive(Serialize)]
enum DataBorrowd<'a> {
    V1 { todos: &'a HashMap<TodoId, Todo> },
}

#[derive(Deserialize)]
enum DataOwned {
    V1 { todos: HashMap<TodoId, Todo> },
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tidy_api::v1::{Category, Priority};

    use super::*;

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::load(dir.path().join("data.ron")).unwrap();

        assert!(state.todos.lock().await.is_empty());
    }

    #[tokio::test]
    async fn stored_todos_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.ron");
        let todo = Todo::new("Buy milk", Category::Shopping, Priority::Low, None, Utc::now());

        let state = AppState::load(&path).unwrap();
        state
            .todos
            .lock()
            .await
            .insert(todo.id.clone(), todo.clone());
        state.store().await.unwrap();

        let reloaded = AppState::load(&path).unwrap();
        assert_eq!(reloaded.todos.lock().await.get(&todo.id), Some(&todo));
    }

    #[tokio::test]
    async fn in_memory_state_never_writes() {
        let state = AppState::in_memory();

        assert!(state.data_file().is_none());
        state.store().await.unwrap();
    }
}
