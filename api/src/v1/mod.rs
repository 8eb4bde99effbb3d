use std::{borrow::Borrow, fmt, str::FromStr};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Opaque todo identifier, `<epoch millis>-<random suffix>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    const SUFFIX_LEN: usize = 7;

    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}-{}",
            now.timestamp_millis(),
            &suffix[..Self::SUFFIX_LEN]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TodoId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for TodoId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for TodoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TodoId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} `{}`", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Personal,
    Work,
    Study,
    Health,
    Shopping,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::Personal,
        Self::Work,
        Self::Study,
        Self::Health,
        Self::Shopping,
        Self::Other,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Work => "work",
            Self::Study => "study",
            Self::Health => "health",
            Self::Shopping => "shopping",
            Self::Other => "other",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Personal => "Personal",
            Self::Work => "Work",
            Self::Study => "Study",
            Self::Health => "Health",
            Self::Shopping => "Shopping",
            Self::Other => "Other",
        }
    }

    /// Accent color as a CSS hex string.
    pub const fn color(self) -> &'static str {
        match self {
            Self::Personal => "#3b82f6",
            Self::Work => "#8b5cf6",
            Self::Study => "#10b981",
            Self::Health => "#f59e0b",
            Self::Shopping => "#ec4899",
            Self::Other => "#6b7280",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "category",
                value: s.to_owned(),
            })
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Urgent => "Urgent",
        }
    }

    pub const fn color(self) -> &'static str {
        match self {
            Self::Low => "#16a34a",
            Self::Medium => "#d97706",
            Self::High => "#ea580c",
            Self::Urgent => "#dc2626",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "priority",
                value: s.to_owned(),
            })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub text: String,
    pub completed: bool,
    /// Epoch millis.
    #[serde(default)]
    pub created_at: i64,
    /// Epoch millis of the last transition to completed.
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl Todo {
    pub fn new(
        text: impl Into<String>,
        category: Category,
        priority: Priority,
        due_date: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TodoId::generate(now),
            text: text.into(),
            completed: false,
            created_at: now.timestamp_millis(),
            completed_at: None,
            category,
            priority,
            due_date,
        }
    }

    pub fn completed_time(&self) -> Option<DateTime<Utc>> {
        self.completed_at
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
    }

    /// Brings `completed_at` in line with `completed` for records from
    /// outside: cleared when not completed, `created_at` when a completed
    /// record carries no time.
    pub fn normalize(&mut self) {
        match self.completed {
            true => {
                self.completed_at.get_or_insert(self.created_at);
            }
            false => self.completed_at = None,
        }
    }

    /// Flips `completed`, keeping `completed_at` in step with it.
    pub fn toggle(&mut self, now: DateTime<Utc>) {
        self.completed = !self.completed;
        self.completed_at = match self.completed {
            true => Some(now.timestamp_millis()),
            false => None,
        };
    }

    pub fn apply(&mut self, patch: &TodoPatch) {
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = completed_at;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due_date) = &patch.due_date {
            self.due_date = due_date.clone();
        }
    }
}

/// Partial update body for `PUT /todos/{id}`.
///
/// The nullable fields use a double option: absent leaves the field alone,
/// `null` clears it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub completed_at: Option<Option<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub due_date: Option<Option<String>>,
}

impl TodoPatch {
    pub fn edit(
        text: impl Into<String>,
        category: Category,
        priority: Priority,
        due_date: Option<String>,
    ) -> Self {
        Self {
            text: Some(text.into()),
            category: Some(category),
            priority: Some(priority),
            due_date: Some(due_date),
            ..Self::default()
        }
    }
}

impl From<&Todo> for TodoPatch {
    fn from(todo: &Todo) -> Self {
        Self {
            text: Some(todo.text.clone()),
            completed: Some(todo.completed),
            completed_at: Some(todo.completed_at),
            category: Some(todo.category),
            priority: Some(todo.priority),
            due_date: Some(todo.due_date.clone()),
        }
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn generated_ids_carry_timestamp_and_suffix() {
        let id = TodoId::generate(at(1_700_000_000_000));
        let (millis, suffix) = id.as_str().split_once('-').unwrap();

        assert_eq!(millis, "1700000000000");
        assert_eq!(suffix.len(), 7);
        assert_ne!(id, TodoId::generate(at(1_700_000_000_000)));
    }

    #[test]
    fn toggle_keeps_completed_at_in_step() {
        let mut todo = Todo::new("Buy milk", Category::Shopping, Priority::Low, None, at(100));

        todo.toggle(at(5_000));
        assert!(todo.completed);
        assert_eq!(todo.completed_at, Some(5_000));

        todo.toggle(at(6_000));
        assert!(!todo.completed);
        assert_eq!(todo.completed_at, None);
    }

    #[test]
    fn serializes_with_original_field_names() {
        let todo = Todo::new("Read", Category::Study, Priority::Urgent, None, at(42));
        let value = serde_json::to_value(&todo).unwrap();

        assert_eq!(value["createdAt"], 42);
        assert_eq!(value["completedAt"], serde_json::Value::Null);
        assert_eq!(value["category"], "study");
        assert_eq!(value["priority"], "urgent");
        assert_eq!(value["dueDate"], serde_json::Value::Null);
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let todo: Todo =
            serde_json::from_str(r#"{"id":"a","text":"Buy milk","completed":false}"#).unwrap();

        assert_eq!(todo.created_at, 0);
        assert_eq!(todo.category, Category::Personal);
        assert_eq!(todo.priority, Priority::Medium);
        assert_eq!(todo.due_date, None);
    }

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let clear: TodoPatch = serde_json::from_str(r#"{"dueDate":null}"#).unwrap();
        let keep: TodoPatch = serde_json::from_str(r#"{"text":"x"}"#).unwrap();

        assert_eq!(clear.due_date, Some(None));
        assert_eq!(keep.due_date, None);

        let mut todo = Todo::new("a", Category::Work, Priority::High, None, at(1));
        todo.due_date = Some("2024-05-01".into());

        todo.apply(&keep);
        assert_eq!(todo.text, "x");
        assert_eq!(todo.due_date.as_deref(), Some("2024-05-01"));

        todo.apply(&clear);
        assert_eq!(todo.due_date, None);
    }

    #[test]
    fn full_patch_reproduces_todo() {
        let mut source = Todo::new("a", Category::Health, Priority::Low, None, at(1));
        source.toggle(at(9));

        let mut target = Todo::new("b", Category::Work, Priority::High, None, at(1));
        target.apply(&TodoPatch::from(&source));

        assert_eq!(target.text, source.text);
        assert_eq!(target.completed_at, Some(9));
        assert_eq!(target.category, Category::Health);
    }

    #[test]
    fn normalize_pairs_completed_at_with_completed() {
        let mut stale: Todo = serde_json::from_str(
            r#"{"id":"a","text":"x","completed":false,"completedAt":5}"#,
        )
        .unwrap();
        stale.normalize();
        assert_eq!(stale.completed_at, None);

        let mut untimed: Todo = serde_json::from_str(
            r#"{"id":"b","text":"y","completed":true,"createdAt":40}"#,
        )
        .unwrap();
        untimed.normalize();
        assert_eq!(untimed.completed_at, Some(40));

        let mut timed = untimed.clone();
        timed.completed_at = Some(90);
        timed.normalize();
        assert_eq!(timed.completed_at, Some(90));
    }

    #[test]
    fn completed_time_reads_millis() {
        let mut todo = Todo::new("a", Category::Work, Priority::Low, None, at(1));
        assert_eq!(todo.completed_time(), None);

        todo.toggle(at(1_700_000_000_000));
        assert_eq!(todo.completed_time(), Some(at(1_700_000_000_000)));
    }

    #[test]
    fn labels_and_colors_per_variant() {
        assert_eq!(Category::Shopping.label(), "Shopping");
        assert_eq!(Priority::Urgent.label(), "Urgent");

        let colors: Vec<_> = (Category::ALL.iter().map(|c| c.color()))
            .chain(Priority::ALL.iter().map(|p| p.color()))
            .collect();
        for color in &colors {
            assert!(color.starts_with('#') && color.len() == 7, "{color}");
        }

        let distinct: std::collections::HashSet<_> =
            Category::ALL.iter().map(|c| c.color()).collect();
        assert_eq!(distinct.len(), Category::ALL.len());
    }

    #[test]
    fn kinds_parse_from_wire_names() {
        assert_eq!("shopping".parse::<Category>(), Ok(Category::Shopping));
        assert_eq!("urgent".parse::<Priority>(), Ok(Priority::Urgent));
        assert!("errands".parse::<Category>().is_err());
    }
}
