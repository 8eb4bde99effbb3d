use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tidy_api::v1::Todo;

use crate::stats;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    /// The collection is non-empty.
    FirstTask,
    /// At least ten todos completed.
    TaskMaster,
    /// A completion streak of three days or more.
    ProductiveStreak,
    /// Four or more distinct categories in use.
    CategoryExplorer,
}

impl Achievement {
    pub const ALL: [Achievement; 4] = [
        Self::FirstTask,
        Self::TaskMaster,
        Self::ProductiveStreak,
        Self::CategoryExplorer,
    ];

    pub const fn id(self) -> &'static str {
        match self {
            Self::FirstTask => "first_task",
            Self::TaskMaster => "task_master",
            Self::ProductiveStreak => "productive_streak",
            Self::CategoryExplorer => "category_explorer",
        }
    }
}

const TASK_MASTER_COMPLETED: usize = 10;
const PRODUCTIVE_STREAK_DAYS: u32 = 3;
const CATEGORY_EXPLORER_CATEGORIES: usize = 4;

/// Achievements the collection qualifies for right now.
pub fn evaluate<Tz: TimeZone>(todos: &[Todo], now: &DateTime<Tz>) -> BTreeSet<Achievement> {
    let mut unlocked = BTreeSet::new();

    if !todos.is_empty() {
        unlocked.insert(Achievement::FirstTask);
    }

    if todos.iter().filter(|todo| todo.completed).count() >= TASK_MASTER_COMPLETED {
        unlocked.insert(Achievement::TaskMaster);
    }

    if stats::streak(todos, now) >= PRODUCTIVE_STREAK_DAYS {
        unlocked.insert(Achievement::ProductiveStreak);
    }

    let categories: BTreeSet<_> = todos.iter().map(|todo| todo.category).collect();
    if categories.len() >= CATEGORY_EXPLORER_CATEGORIES {
        unlocked.insert(Achievement::CategoryExplorer);
    }

    unlocked
}

/// Every achievement ever earned, with its unlock time in epoch millis.
///
/// Entries are only ever added.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AchievementLedger {
    unlocked: BTreeMap<Achievement, i64>,
}

impl AchievementLedger {
    /// Records newly earned achievements, returns whether anything changed.
    pub fn merge(&mut self, earned: &BTreeSet<Achievement>, now: DateTime<Utc>) -> bool {
        let mut changed = false;

        for achievement in earned {
            if !self.unlocked.contains_key(achievement) {
                self.unlocked
                    .insert(*achievement, now.timestamp_millis());
                changed = true;
            }
        }

        changed
    }

    pub fn is_unlocked(&self, achievement: Achievement) -> bool {
        self.unlocked.contains_key(&achievement)
    }

    pub fn unlocked_at(&self, achievement: Achievement) -> Option<i64> {
        self.unlocked.get(&achievement).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Achievement> + '_ {
        self.unlocked.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.unlocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unlocked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveTime};
    use tidy_api::v1::{Category, Priority};

    use super::*;

    fn todo(category: Category) -> Todo {
        Todo::new("task", category, Priority::Medium, None, Utc::now())
    }

    #[test]
    fn nothing_unlocked_for_empty_collection() {
        assert!(evaluate(&[], &Utc::now()).is_empty());
    }

    #[test]
    fn first_task_and_explorer() {
        let todos: Vec<_> = [
            Category::Work,
            Category::Study,
            Category::Health,
            Category::Health,
        ]
        .into_iter()
        .map(todo)
        .collect();

        let unlocked = evaluate(&todos, &Utc::now());
        assert!(unlocked.contains(&Achievement::FirstTask));
        assert!(!unlocked.contains(&Achievement::CategoryExplorer));

        let mut todos = todos;
        todos.push(todo(Category::Shopping));
        assert!(evaluate(&todos, &Utc::now()).contains(&Achievement::CategoryExplorer));
    }

    #[test]
    fn task_master_needs_ten_completions() {
        let now = Utc::now();
        let mut todos: Vec<_> = (0..10).map(|_| todo(Category::Work)).collect();
        for todo in &mut todos[..9] {
            todo.toggle(now);
        }
        assert!(!evaluate(&todos, &now).contains(&Achievement::TaskMaster));

        todos[9].toggle(now);
        assert!(evaluate(&todos, &now).contains(&Achievement::TaskMaster));
    }

    #[test]
    fn streak_of_three_days() {
        let now = Utc::now()
            .date_naive()
            .and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap())
            .and_utc();
        let todos: Vec<_> = (0..3)
            .map(|days| {
                let mut todo = todo(Category::Work);
                todo.toggle(now - Duration::days(days));
                todo
            })
            .collect();

        assert!(evaluate(&todos, &now).contains(&Achievement::ProductiveStreak));
    }

    #[test]
    fn ledger_never_revokes() {
        let mut ledger = AchievementLedger::default();
        let first = Utc::now();

        assert!(ledger.merge(&BTreeSet::from([Achievement::FirstTask]), first));
        assert!(!ledger.merge(&BTreeSet::new(), first + Duration::hours(1)));
        assert!(!ledger.merge(
            &BTreeSet::from([Achievement::FirstTask]),
            first + Duration::hours(2)
        ));

        assert!(ledger.is_unlocked(Achievement::FirstTask));
        assert_eq!(
            ledger.unlocked_at(Achievement::FirstTask),
            Some(first.timestamp_millis())
        );
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn ids_match_stored_names() {
        for achievement in Achievement::ALL {
            let stored = serde_json::to_value(achievement).unwrap();
            assert_eq!(stored, achievement.id());
        }
    }

    #[test]
    fn ledger_serializes_as_map_of_ids() {
        let mut ledger = AchievementLedger::default();
        ledger.merge(
            &BTreeSet::from([Achievement::TaskMaster]),
            DateTime::from_timestamp_millis(7).unwrap(),
        );

        let json = serde_json::to_string(&ledger).unwrap();
        assert_eq!(json, r#"{"task_master":7}"#);
        assert_eq!(
            serde_json::from_str::<AchievementLedger>(&json).unwrap(),
            ledger
        );
    }
}
