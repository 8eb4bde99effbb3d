use std::sync::{atomic::Ordering, Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use tidy_api::v1::{Todo, TodoId, TodoPatch};
use tracing::info;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/todos", get(get_todos).post(add_todo))
        .route("/todos/:id", get(get_todo).put(update_todo).delete(delete_todo))
        .route("/generation", get(get_generation))
}

async fn get_generation(State(state): State<Arc<AppState>>) -> Json<u64> {
    Json(state.generation.load(Ordering::Relaxed))
}

async fn get_todos(State(state): State<Arc<AppState>>) -> Json<Vec<Todo>> {
    let todos = state.todos.lock().await;
    let mut todos: Vec<_> = todos.values().cloned().collect();
    todos.sort_unstable_by(|a, b| {
        (b.created_at.cmp(&a.created_at)).then_with(|| a.id.cmp(&b.id))
    });
    Json(todos)
}

async fn get_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TodoId>,
) -> Result<Json<Todo>, StatusCode> {
    let todos = state.todos.lock().await;
    let todo = todos.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(todo.clone()))
}

async fn add_todo(
    State(state): State<Arc<AppState>>,
    Json(mut todo): Json<Todo>,
) -> Result<(StatusCode, Json<Todo>), StatusCode> {
    if todo.text.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    if todo.id.is_empty() {
        todo.id = TodoId::generate(Utc::now());
    }

    let mut todos = state.todos.lock().await;
    todos.insert(todo.id.clone(), todo.clone());
    state.increment_generation();

    info!(
        id = %todo.id,
        text = %todo.text,
        "created todo"
    );

    Ok((StatusCode::CREATED, Json(todo)))
}

async fn update_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TodoId>,
    Json(patch): Json<TodoPatch>,
) -> Result<Json<Todo>, StatusCode> {
    if patch.text.as_deref().is_some_and(|text| text.trim().is_empty()) {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let mut todos = state.todos.lock().await;
    let todo = todos.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    todo.apply(&patch);

    state.increment_generation();

    info!(
        id = %todo.id,
        completed = todo.completed,
        "updated todo"
    );

    Ok(Json(todo.clone()))
}

async fn delete_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TodoId>,
) -> StatusCode {
    let mut todos = state.todos.lock().await;
    if todos.remove(&id).is_none() {
        return StatusCode::NOT_FOUND;
    }

    state.increment_generation();

    info!(%id, "deleted todo");

    StatusCode::NO_CONTENT
}
