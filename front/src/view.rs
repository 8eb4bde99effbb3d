use std::{cmp::Ordering, collections::HashMap, fmt, str::FromStr, sync::Arc};

use tidy_api::v1::{Category, Priority, Todo, TodoId, UnknownVariant};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::store::Snapshot;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortMode {
    #[default]
    Newest,
    Oldest,
    Alpha,
    CompletedAt,
    Manual,
}

impl SortMode {
    pub const ALL: [SortMode; 5] = [
        Self::Newest,
        Self::Oldest,
        Self::Alpha,
        Self::CompletedAt,
        Self::Manual,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Alpha => "alpha",
            Self::CompletedAt => "completedAt",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "sort mode",
                value: s.to_owned(),
            })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub fn matches(self, todo: &Todo) -> bool {
        match self {
            Self::All => true,
            Self::Active => !todo.completed,
            Self::Completed => todo.completed,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            _ => Err(UnknownVariant {
                kind: "status filter",
                value: s.to_owned(),
            }),
        }
    }
}

/// Parses a category filter, `"all"` meaning no filter.
pub fn category_filter(s: &str) -> Result<Option<Category>, UnknownVariant> {
    match s {
        "all" => Ok(None),
        _ => s.parse().map(Some),
    }
}

/// Parses a priority filter, `"all"` meaning no filter.
pub fn priority_filter(s: &str) -> Result<Option<Priority>, UnknownVariant> {
    match s {
        "all" => Ok(None),
        _ => s.parse().map(Some),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Filters {
    pub search: String,
    pub status: StatusFilter,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
}

impl Filters {
    pub fn matches(&self, todo: &Todo) -> bool {
        let query = self.search.trim().to_lowercase();

        (query.is_empty() || todo.text.to_lowercase().contains(&query))
            && self.status.matches(todo)
            && self.category.map_or(true, |category| todo.category == category)
            && self.priority.map_or(true, |priority| todo.priority == priority)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ViewQuery {
    pub filters: Filters,
    pub sort: SortMode,
}

/// The visible list for `query`.
///
/// Filtering never reorders, and every sort is stable, so ties keep the
/// order of the base sequence.
pub fn project(todos: &[Todo], manual_order: &[TodoId], query: &ViewQuery) -> Vec<Todo> {
    let base = match query.sort {
        SortMode::Manual => in_manual_order(todos, manual_order),
        _ => todos.iter().collect(),
    };

    let mut list: Vec<Todo> = base
        .into_iter()
        .filter(|todo| query.filters.matches(todo))
        .cloned()
        .collect();

    match query.sort {
        SortMode::Newest => list.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortMode::Oldest => list.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortMode::Alpha => list.sort_by(|a, b| compare_text(&a.text, &b.text)),
        SortMode::CompletedAt => list.sort_by(|a, b| compare_completed(a, b)),
        SortMode::Manual => {}
    }

    list
}

/// `manual_order` resolved against the collection, skipping stale and
/// repeated ids. An empty order falls back to collection order.
pub fn in_manual_order<'a>(todos: &'a [Todo], manual_order: &[TodoId]) -> Vec<&'a Todo> {
    if manual_order.is_empty() {
        return todos.iter().collect();
    }

    let mut by_id: HashMap<&str, &Todo> = todos
        .iter()
        .map(|todo| (todo.id.as_str(), todo))
        .collect();

    manual_order
        .iter()
        .filter_map(|id| by_id.remove(id.as_str()))
        .collect()
}

/// Collation-style text order.
///
/// Base letters decide first, ignoring case and accents. Accents break ties
/// next (unaccented first), then case (lower case first).
pub fn compare_text(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| accented(a).cmp(accented(b)))
        .then_with(|| b.cmp(a))
}

fn base_letters(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

fn accented(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd().flat_map(char::to_lowercase)
}

fn compare_completed(a: &Todo, b: &Todo) -> Ordering {
    match (a.completed_at, b.completed_at) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Remembers the last projection, keyed by snapshot version and query.
#[derive(Debug, Default)]
pub struct ProjectionCache {
    key: Option<(u64, ViewQuery)>,
    value: Arc<Vec<Todo>>,
}

impl ProjectionCache {
    pub fn get(&mut self, snapshot: &Snapshot, filters: &Filters) -> Arc<Vec<Todo>> {
        let query = ViewQuery {
            filters: filters.clone(),
            sort: snapshot.sort,
        };

        let hit = matches!(
            &self.key,
            Some((version, cached)) if *version == snapshot.version && *cached == query
        );

        if !hit {
            self.value = Arc::new(project(&snapshot.todos, &snapshot.manual_order, &query));
            self.key = Some((snapshot.version, query));
        }

        self.value.clone()
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn todo(id: &str, text: &str, created_at: i64) -> Todo {
        let mut todo = Todo::new(
            text,
            Category::Personal,
            Priority::Medium,
            None,
            Utc.timestamp_millis_opt(created_at).unwrap(),
        );
        todo.id = id.into();
        todo
    }

    fn ids(list: &[Todo]) -> Vec<&str> {
        list.iter().map(|todo| todo.id.as_str()).collect()
    }

    fn sorted(sort: SortMode) -> ViewQuery {
        ViewQuery {
            sort,
            ..ViewQuery::default()
        }
    }

    fn sample() -> Vec<Todo> {
        let mut todos = vec![
            todo("a", "Buy milk", 300),
            todo("b", "call mom", 100),
            todo("c", "Write report", 200),
            todo("d", "buy stamps", 200),
        ];
        todos[1].category = Category::Health;
        todos[2].priority = Priority::Urgent;
        todos[3].completed = true;
        todos[3].completed_at = Some(50);
        todos
    }

    #[test]
    fn created_sorts_are_stable() {
        let todos = sample();

        assert_eq!(ids(&project(&todos, &[], &sorted(SortMode::Newest))), ["a", "c", "d", "b"]);
        assert_eq!(ids(&project(&todos, &[], &sorted(SortMode::Oldest))), ["b", "c", "d", "a"]);
    }

    #[test]
    fn alpha_ignores_case() {
        let todos = sample();

        assert_eq!(
            ids(&project(&todos, &[], &sorted(SortMode::Alpha))),
            ["a", "d", "b", "c"]
        );
    }

    #[test]
    fn alpha_orders_case_only_differences_lower_first() {
        assert_eq!(compare_text("apple", "Apple"), Ordering::Less);
        assert_eq!(compare_text("Apple", "apple"), Ordering::Greater);
        assert_eq!(compare_text("apple", "apple"), Ordering::Equal);
        assert_eq!(compare_text("Zebra", "apple"), Ordering::Greater);
    }

    #[test]
    fn alpha_sorts_accents_with_their_base_letter() {
        let todos: Vec<_> = ["zebra", "Éclair", "apple", "éte", "ete", "Eclair"]
            .into_iter()
            .enumerate()
            .map(|(i, text)| todo(&i.to_string(), text, 0))
            .collect();

        let list = project(&todos, &[], &sorted(SortMode::Alpha));
        let texts: Vec<_> = list.iter().map(|todo| todo.text.as_str()).collect();
        assert_eq!(texts, ["apple", "Eclair", "Éclair", "ete", "éte", "zebra"]);

        assert_eq!(compare_text("resume", "résumé"), Ordering::Less);
        assert_eq!(compare_text("Ángel", "angel"), Ordering::Greater);
        assert_eq!(compare_text("ñandú", "nube"), Ordering::Less);
    }

    #[test]
    fn equal_keys_keep_input_order() {
        let mut todos = vec![
            todo("a", "Buy milk", 200),
            todo("b", "call mom", 100),
            todo("c", "Buy milk", 200),
            todo("d", "Buy milk", 300),
            todo("e", "call mom", 200),
        ];
        for todo in &mut todos[1..4] {
            todo.completed = true;
            todo.completed_at = Some(70);
        }

        assert_eq!(
            ids(&project(&todos, &[], &sorted(SortMode::Alpha))),
            ["a", "c", "d", "b", "e"]
        );
        assert_eq!(
            ids(&project(&todos, &[], &sorted(SortMode::Newest))),
            ["d", "a", "c", "e", "b"]
        );
        assert_eq!(
            ids(&project(&todos, &[], &sorted(SortMode::Oldest))),
            ["b", "a", "c", "e", "d"]
        );
        assert_eq!(
            ids(&project(&todos, &[], &sorted(SortMode::CompletedAt))),
            ["b", "c", "d", "a", "e"]
        );
    }

    #[test]
    fn completed_at_puts_missing_last_in_input_order() {
        let mut todos = sample();
        todos[0].completed_at = Some(10);
        todos[0].completed = true;

        // d (50) before a (10), then b and c as they came
        assert_eq!(
            ids(&project(&todos, &[], &sorted(SortMode::CompletedAt))),
            ["d", "a", "b", "c"]
        );
    }

    #[test]
    fn filters_apply_in_sequence() {
        let todos = sample();
        let mut query = sorted(SortMode::Oldest);

        query.filters.search = "  BUY ".into();
        assert_eq!(ids(&project(&todos, &[], &query)), ["d", "a"]);

        query.filters.status = StatusFilter::Active;
        assert_eq!(ids(&project(&todos, &[], &query)), ["a"]);

        query.filters = Filters {
            category: Some(Category::Health),
            ..Filters::default()
        };
        assert_eq!(ids(&project(&todos, &[], &query)), ["b"]);

        query.filters = Filters {
            priority: Some(Priority::Urgent),
            ..Filters::default()
        };
        assert_eq!(ids(&project(&todos, &[], &query)), ["c"]);

        query.filters.status = StatusFilter::Completed;
        assert!(project(&todos, &[], &query).is_empty());
    }

    #[test]
    fn manual_order_skips_unknown_and_repeated_ids() {
        let todos = sample();
        let order: Vec<TodoId> = ["c", "gone", "a", "c", "b"]
            .into_iter()
            .map(TodoId::from)
            .collect();

        let list = project(&todos, &order, &sorted(SortMode::Manual));
        assert_eq!(ids(&list), ["c", "a", "b"]);
    }

    #[test]
    fn empty_manual_order_uses_collection_order() {
        let todos = sample();
        assert_eq!(
            ids(&project(&todos, &[], &sorted(SortMode::Manual))),
            ["a", "b", "c", "d"]
        );
    }

    #[test]
    fn projection_is_idempotent() {
        let todos = sample();
        let query = ViewQuery {
            filters: Filters {
                search: "b".into(),
                ..Filters::default()
            },
            sort: SortMode::Alpha,
        };

        let once = project(&todos, &[], &query);
        assert_eq!(project(&todos, &[], &query), once);
        assert_eq!(project(&once, &[], &query), once);
    }

    #[test]
    fn filter_strings_parse() {
        assert_eq!("completedAt".parse::<SortMode>(), Ok(SortMode::CompletedAt));
        assert_eq!("active".parse::<StatusFilter>(), Ok(StatusFilter::Active));
        assert_eq!(category_filter("all"), Ok(None));
        assert_eq!(category_filter("work"), Ok(Some(Category::Work)));
        assert_eq!(priority_filter("low"), Ok(Some(Priority::Low)));
        assert!(priority_filter("whenever").is_err());
        assert!("random".parse::<SortMode>().is_err());
    }

    #[test]
    fn cache_recomputes_on_new_version_or_query() {
        let mut snapshot = Snapshot {
            todos: sample(),
            ..Snapshot::default()
        };
        let mut cache = ProjectionCache::default();
        let all = Filters::default();

        let first = cache.get(&snapshot, &all);
        assert!(Arc::ptr_eq(&first, &cache.get(&snapshot, &all)));

        let search = Filters {
            search: "milk".into(),
            ..Filters::default()
        };
        assert_eq!(ids(&cache.get(&snapshot, &search)), ["a"]);

        snapshot.version += 1;
        snapshot.todos.remove(0);
        assert!(cache.get(&snapshot, &search).is_empty());

        cache.invalidate();
        assert_eq!(cache.get(&snapshot, &all).len(), 3);
    }
}
