//! Read-only aggregates over the todo collection.
//!
//! All day-level arithmetic happens on [`NaiveDate`]s taken from the caller's
//! time zone, never on raw instants.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tidy_api::v1::{Category, Priority, Todo};

const UPCOMING_DAYS: u64 = 7;
const TREND_DAYS: u32 = 30;
const DUE_SOON_MINUTES: i64 = 60;

const LOCAL_DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Bucket {
    pub total: usize,
    pub completed: usize,
}

impl Bucket {
    pub fn pending(&self) -> usize {
        self.total - self.completed
    }

    fn count(&mut self, todo: &Todo) {
        self.total += 1;
        if todo.completed {
            self.completed += 1;
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Trends {
    pub average_daily: f64,
    pub best_day: usize,
    /// Share of the last 30 days with at least one completion, in percent.
    pub consistency: f64,
    pub total_last_30_days: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub completion_rate: u32,
    pub categories: BTreeMap<Category, Bucket>,
    pub priorities: BTreeMap<Priority, Bucket>,
    pub overdue: usize,
    pub upcoming: usize,
    pub completed_this_week: usize,
    pub streak: u32,
    pub trends: Trends,
}

impl Stats {
    pub fn compute<Tz: TimeZone>(todos: &[Todo], now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let today = now.date_naive();
        let week_ahead = today + Days::new(UPCOMING_DAYS);
        let week_ago = (now.clone() - Duration::days(7)).timestamp_millis();

        let mut stats = Self {
            total: todos.len(),
            ..Self::default()
        };

        for todo in todos {
            stats.categories.entry(todo.category).or_default().count(todo);
            stats.priorities.entry(todo.priority).or_default().count(todo);

            if todo.completed {
                stats.completed += 1;
            } else if let Some(due) = todo.due_date.as_deref().and_then(|d| due_day(d, &tz)) {
                if due < today {
                    stats.overdue += 1;
                } else if due <= week_ahead {
                    stats.upcoming += 1;
                }
            }

            if todo.completed_at.is_some_and(|at| at > week_ago) {
                stats.completed_this_week += 1;
            }
        }

        stats.pending = stats.total - stats.completed;
        stats.completion_rate = completion_rate(stats.completed, stats.total);
        stats.streak = streak(todos, now);
        stats.trends = trends(todos, now);
        stats
    }
}

pub fn completion_rate(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }

    (completed as f64 / total as f64 * 100.0).round() as u32
}

/// Calendar date a due-date string refers to in `tz`.
///
/// Plain dates and local date-times are taken at face value, RFC 3339
/// instants are moved into `tz` first.
pub fn due_day<Tz: TimeZone>(due: &str, tz: &Tz) -> Option<NaiveDate> {
    let due = due.trim();

    if let Ok(date) = NaiveDate::parse_from_str(due, "%Y-%m-%d") {
        return Some(date);
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(due) {
        return Some(instant.with_timezone(tz).date_naive());
    }

    parse_local_date_time(due).map(|local| local.date())
}

fn parse_local_date_time(due: &str) -> Option<NaiveDateTime> {
    LOCAL_DATE_TIME_FORMATS
        .into_iter()
        .find_map(|format| NaiveDateTime::parse_from_str(due, format).ok())
}

/// Instant a due-date string refers to.
///
/// Plain dates mean midnight UTC, local date-times are read in `tz`.
pub fn due_instant<Tz: TimeZone>(due: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let due = due.trim();

    if let Ok(date) = NaiveDate::parse_from_str(due, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(due) {
        return Some(instant.with_timezone(&Utc));
    }

    let local = parse_local_date_time(due)?;
    let at = tz.from_local_datetime(&local).earliest()?;
    Some(at.with_timezone(&Utc))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DueStatus {
    /// The deadline has passed.
    Overdue,
    /// The deadline is at most an hour away.
    DueSoon,
}

/// Deadline state of an incomplete todo; `None` for completed todos, todos
/// without a readable due date and deadlines further out.
pub fn due_status<Tz: TimeZone>(todo: &Todo, now: &DateTime<Tz>) -> Option<DueStatus> {
    if todo.completed {
        return None;
    }

    let due = due_instant(todo.due_date.as_deref()?, &now.timezone())?;
    let now = now.with_timezone(&Utc);

    if due < now {
        Some(DueStatus::Overdue)
    } else if due <= now + Duration::minutes(DUE_SOON_MINUTES) {
        Some(DueStatus::DueSoon)
    } else {
        None
    }
}

/// Calendar date of the last completion in `tz`.
pub fn completion_day<Tz: TimeZone>(todo: &Todo, tz: &Tz) -> Option<NaiveDate> {
    let at = todo.completed_time()?;
    Some(at.with_timezone(tz).date_naive())
}

/// Consecutive days with at least one completion, ending today.
///
/// A day without completions yet does not break a streak that reaches
/// yesterday.
pub fn streak<Tz: TimeZone>(todos: &[Todo], now: &DateTime<Tz>) -> u32 {
    let tz = now.timezone();
    let days: BTreeSet<NaiveDate> = todos
        .iter()
        .filter_map(|todo| completion_day(todo, &tz))
        .collect();

    let today = now.date_naive();
    let mut day = match days.contains(&today) {
        true => today,
        false => match today.pred_opt() {
            Some(yesterday) if days.contains(&yesterday) => yesterday,
            _ => return 0,
        },
    };

    let mut streak = 0;
    while days.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }

    streak
}

/// Completion trends over the last thirty days.
pub fn trends<Tz: TimeZone>(todos: &[Todo], now: &DateTime<Tz>) -> Trends {
    let tz = now.timezone();
    let since = (now.clone() - Duration::days(TREND_DAYS.into())).timestamp_millis();

    let mut daily: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for todo in todos {
        if todo.completed_at.is_some_and(|at| at > since) {
            if let Some(day) = completion_day(todo, &tz) {
                *daily.entry(day).or_default() += 1;
            }
        }
    }

    let total: usize = daily.values().sum();

    Trends {
        average_daily: total as f64 / f64::from(TREND_DAYS),
        best_day: daily.values().copied().max().unwrap_or(0),
        consistency: daily.len() as f64 / f64::from(TREND_DAYS) * 100.0,
        total_last_30_days: total,
    }
}
