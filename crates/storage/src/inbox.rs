//! Reading inbox exposed as a data source

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use health_model::Reading;
use reading_aggregator::{DataSource, SourceError};
use std::sync::Arc;

use crate::Repository;

/// Data source fed by readings pushed into the repository inbox
pub struct InboxSource {
    id: String,
    repository: Arc<Repository>,
}

impl InboxSource {
    pub fn new(id: impl Into<String>, repository: Arc<Repository>) -> Self {
        Self {
            id: id.into(),
            repository,
        }
    }
}

#[async_trait]
impl DataSource for InboxSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<Reading>, SourceError> {
        self.repository
            .drain_readings(user_id, since)
            .map_err(|e| SourceError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use health_model::metric;

    #[tokio::test]
    async fn test_fetch_drains_inbox() {
        let repo = Arc::new(Repository::new());
        let source = InboxSource::new("inbox", repo.clone());
        let now = Utc::now();
        repo.push_readings(
            "u1",
            vec![Reading::new("app", metric::OXYGEN_SATURATION, 97.0, "%", now)],
        )
        .unwrap();

        let first = source.fetch("u1", now - chrono::Duration::hours(1)).await.unwrap();
        let second = source.fetch("u1", now - chrono::Duration::hours(1)).await.unwrap();

        assert_eq!(source.id(), "inbox");
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }
}
