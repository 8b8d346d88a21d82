//! One-day cache of GitHub contributor lookups

use std::collections::HashMap;

use chrono::{NaiveDateTime, TimeDelta, Utc};
use sqlx::SqlitePool;
use tracing::info;
use ttmd_common::Result;

use super::now_stamp;

/// Cached contributor details
#[derive(Debug, Clone)]
pub struct ContributorInfo {
    pub login: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub last_updated: Option<String>,
}

impl ContributorInfo {
    /// Cache entries older than one day are refreshed from the API
    pub fn is_stale(&self) -> bool {
        let Some(raw) = &self.last_updated else {
            return true;
        };
        let Ok(stamp) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") else {
            return true;
        };
        Utc::now().naive_utc() - stamp > TimeDelta::days(1)
    }
}

/// Known contributor details for the given GitHub ids
pub async fn get_contributors(
    db: &SqlitePool,
    github_ids: &[String],
) -> Result<HashMap<String, ContributorInfo>> {
    if github_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = vec!["?"; github_ids.len()].join(",");
    let sql = format!(
        "SELECT github_id, login, name, avatar_url, last_updated FROM contributors WHERE github_id IN ({placeholders})"
    );

    let mut query = sqlx::query_as::<
        _,
        (
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
        ),
    >(&sql);
    for github_id in github_ids {
        query = query.bind(github_id);
    }

    let rows = query.fetch_all(db).await?;
    Ok(rows
        .into_iter()
        .map(|(github_id, login, name, avatar_url, last_updated)| {
            (
                github_id,
                ContributorInfo {
                    login,
                    name,
                    avatar_url,
                    last_updated,
                },
            )
        })
        .collect())
}

/// Batch insert or refresh contributor details
pub async fn upsert_contributors(
    db: &SqlitePool,
    contributors: &HashMap<String, ContributorInfo>,
) -> Result<()> {
    if contributors.is_empty() {
        return Ok(());
    }
    let now = now_stamp();
    for (github_id, info) in contributors {
        sqlx::query(
            r#"
            INSERT INTO contributors (github_id, login, name, avatar_url, last_updated)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(github_id) DO UPDATE SET
                login = excluded.login,
                name = excluded.name,
                avatar_url = excluded.avatar_url,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(github_id)
        .bind(&info.login)
        .bind(&info.name)
        .bind(&info.avatar_url)
        .bind(&now)
        .execute(db)
        .await?;
    }
    info!(count = contributors.len(), "updated contributor cache");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        ttmd_common::db::init_tables(&pool).await.unwrap();
        pool
    }

    fn info(login: &str) -> ContributorInfo {
        ContributorInfo {
            login: Some(login.to_string()),
            name: None,
            avatar_url: None,
            last_updated: None,
        }
    }

    #[tokio::test]
    async fn upsert_then_select_round_trips() {
        let db = pool().await;
        let mut batch = HashMap::new();
        batch.insert("100".to_string(), info("octocat"));
        upsert_contributors(&db, &batch).await.unwrap();

        let found = get_contributors(&db, &["100".to_string()]).await.unwrap();
        assert_eq!(found["100"].login.as_deref(), Some("octocat"));
        // last_updated is stamped on write
        assert!(!found["100"].is_stale());
    }

    #[test]
    fn missing_or_bad_timestamps_are_stale() {
        assert!(ContributorInfo {
            login: None,
            name: None,
            avatar_url: None,
            last_updated: None,
        }
        .is_stale());
        assert!(ContributorInfo {
            login: None,
            name: None,
            avatar_url: None,
            last_updated: Some("yesterday-ish".to_string()),
        }
        .is_stale());
    }

    #[test]
    fn old_timestamps_are_stale() {
        let info = ContributorInfo {
            login: None,
            name: None,
            avatar_url: None,
            last_updated: Some("2020-01-01 00:00:00".to_string()),
        };
        assert!(info.is_stale());
    }
}
