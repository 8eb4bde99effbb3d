use std::future::Future;

use eyre::{eyre, Context};
use reqwest::Url;
use tidy_api::v1::{Todo, TodoId, TodoPatch};
use tracing::{debug, info};

pub const DEFAULT_API_URL: &str = "http://localhost:3001/api/v1";

/// Client for the remote `/todos` collection.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `<base>/todos/<id>` with the id percent-encoded as one path segment.
    fn todo_url(&self, id: &TodoId) -> eyre::Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| eyre!("{} cannot be a base url", self.base_url))?
            .pop_if_empty()
            .extend(["todos", id.as_str()]);
        Ok(url)
    }

    pub async fn get_todos(&self) -> eyre::Result<Vec<Todo>> {
        let response = self.client.get(self.url("/todos")).send().await?;
        let todos: Vec<Todo> = response.error_for_status()?.json().await?;

        debug!(count = todos.len(), "fetched remote todos");

        Ok(todos)
    }

    pub async fn create_todo(&self, todo: &Todo) -> eyre::Result<Todo> {
        let response = self
            .client
            .post(self.url("/todos"))
            .json(todo)
            .send()
            .await?;

        let created: Todo = response.error_for_status()?.json().await?;

        debug!(id = %created.id, "created remote todo");

        Ok(created)
    }

    pub async fn update_todo(&self, id: &TodoId, patch: &TodoPatch) -> eyre::Result<Todo> {
        let response = self
            .client
            .put(self.todo_url(id)?)
            .json(patch)
            .send()
            .await?;

        let updated: Todo = response.error_for_status()?.json().await?;

        debug!(%id, "updated remote todo");

        Ok(updated)
    }

    pub async fn delete_todo(&self, id: &TodoId) -> eyre::Result<()> {
        let response = self
            .client
            .delete(self.todo_url(id)?)
            .send()
            .await?;

        response.error_for_status()?;

        debug!(%id, "deleted remote todo");

        Ok(())
    }

    pub async fn get_generation(&self) -> eyre::Result<u64> {
        let response = self.client.get(self.url("/generation")).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }

    /// Replaces the remote collection with `todos`.
    ///
    /// Deletes every remote record, then recreates the local ones one by one.
    /// Remote writes made by anyone else in the meantime are lost.
    pub async fn sync_todos(&self, todos: &[Todo]) -> eyre::Result<()> {
        info!(count = todos.len(), "syncing todos with server");

        let existing = self
            .get_todos()
            .await
            .wrap_err("Failed to fetch remote todos")?;

        for todo in &existing {
            self.delete_todo(&todo.id)
                .await
                .wrap_err_with(|| format!("Failed to delete remote todo {}", todo.id))?;
        }

        for todo in todos {
            self.create_todo(todo)
                .await
                .wrap_err_with(|| format!("Failed to create remote todo {}", todo.id))?;
        }

        info!(
            removed = existing.len(),
            created = todos.len(),
            "sync completed"
        );

        Ok(())
    }

    /// Whether the collection endpoint answers with a success status.
    pub async fn check_connection(&self) -> bool {
        match self.client.get(self.url("/todos")).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Runs `fut` on its own task and waits for it.
pub async fn spawn<T: Send + 'static>(
    fut: impl Future<Output = eyre::Result<T>> + Send + 'static,
) -> eyre::Result<T> {
    tokio::spawn(fut)
        .await
        .wrap_err("Tokio error")
        .and_then(|r| r)
}
