mod comments;
mod communities;
mod follows;
mod messages;
mod notifications;
mod posts;
mod reactions;
mod reports;
mod themes;
mod uploads;
mod users;

use rusqlite::types::ToSql;

/// `?1, ?2, ...` placeholders for an `IN (...)` list.
fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

fn as_params(values: &[String]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
}
