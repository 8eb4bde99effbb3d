//! JSON export and all-or-nothing import of the todo collection.

use std::{collections::HashSet, fs, io, path::Path};

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;
use tidy_api::v1::Todo;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document does not contain an array of todos")]
    NotAnArray,

    #[error("invalid todo at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: &'static str },

    #[error("could not access file: {0}")]
    Io(#[from] io::Error),
}

pub fn export_json(todos: &[Todo]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(todos)
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("todos-backup-{}.json", date.format("%Y-%m-%d"))
}

pub fn export_to_file(path: impl AsRef<Path>, todos: &[Todo]) -> Result<(), TransferError> {
    fs::write(path, export_json(todos)?)?;
    Ok(())
}

/// Parses an exported document.
///
/// Every element must be an object with a non-empty string `id`, non-empty
/// `text` and a boolean `completed`. One bad element rejects the document.
/// `completedAt` is brought in line with `completed` (see [`Todo::normalize`]).
pub fn parse_import(document: &str) -> Result<Vec<Todo>, TransferError> {
    let Value::Array(items) = serde_json::from_str::<Value>(document)? else {
        return Err(TransferError::NotAnArray);
    };

    for (index, item) in items.iter().enumerate() {
        check_record(item).map_err(|reason| TransferError::InvalidRecord { index, reason })?;
    }

    let mut todos: Vec<Todo> = serde_json::from_value(Value::Array(items))?;
    validate(&todos)?;
    todos.iter_mut().for_each(Todo::normalize);

    Ok(todos)
}

pub fn import_from_file(path: impl AsRef<Path>) -> Result<Vec<Todo>, TransferError> {
    parse_import(&fs::read_to_string(path)?)
}

/// Checks already typed todos before they replace a collection.
pub fn validate(todos: &[Todo]) -> Result<(), TransferError> {
    let mut seen = HashSet::new();

    for (index, todo) in todos.iter().enumerate() {
        let invalid = |reason| TransferError::InvalidRecord { index, reason };

        if todo.id.is_empty() {
            return Err(invalid("missing id"));
        }
        if todo.text.trim().is_empty() {
            return Err(invalid("missing text"));
        }
        if !seen.insert(&todo.id) {
            return Err(invalid("duplicate id"));
        }
    }

    Ok(())
}

fn check_record(item: &Value) -> Result<(), &'static str> {
    let Value::Object(fields) = item else {
        return Err("not an object");
    };

    match fields.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => {}
        _ => return Err("missing id"),
    }

    match fields.get("text") {
        Some(Value::String(text)) if !text.trim().is_empty() => {}
        _ => return Err("missing text"),
    }

    match fields.get("completed") {
        Some(Value::Bool(_)) => Ok(()),
        _ => Err("completed is not a boolean"),
    }
}
