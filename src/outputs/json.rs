//! JSON file article store.
//!
//! The whole store is one JSON array of [`StoredArticle`] records. It is
//! read once when opened and rewritten after every successful save, which
//! keeps a crashed or cancelled run's progress on disk.
//!
//! # Output Structure
//!
//! ```text
//! [
//!   { "id": 1, "owner_id": 2, "title": "...", "url": "...", ... },
//!   ...
//! ]
//! ```

use crate::models::{Article, OwnerId};
use crate::repository::{ArticleTable, Repository, StorageResult, StoredArticle};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{error, info, instrument};

#[derive(Debug)]
pub struct JsonFileRepository {
    path: PathBuf,
    table: RwLock<ArticleTable>,
}

impl JsonFileRepository {
    /// Open the store at `path`, starting empty when the file does not exist.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let rows: Vec<StoredArticle> = match fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        info!(rows = rows.len(), "Opened JSON article store");
        Ok(Self {
            path,
            table: RwLock::new(ArticleTable::from_rows(rows)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, table: &ArticleTable) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(table.rows())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl Repository for JsonFileRepository {
    async fn exists_by_url_and_owner(&self, url: &str, owner: OwnerId) -> StorageResult<bool> {
        Ok(self.table.read().await.contains(url, owner))
    }

    async fn save(&self, article: &Article, owner: OwnerId) -> StorageResult<i64> {
        let mut table = self.table.write().await;
        let id = table.insert(article, owner)?;
        if let Err(e) = self.flush(&table).await {
            error!(path = %self.path.display(), error = %e, "Failed to write JSON store");
            table.pop_last();
            return Err(e);
        }
        Ok(id)
    }

    async fn count_for_owner(&self, owner: OwnerId) -> StorageResult<usize> {
        Ok(self.table.read().await.count_for(owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::repository::sample_article;

    #[tokio::test]
    async fn test_saves_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store/articles.json");

        let repo = JsonFileRepository::open(&path).await.unwrap();
        repo.save(&sample_article("https://ex.com/a"), 1).await.unwrap();
        repo.save(&sample_article("https://ex.com/b"), 1).await.unwrap();
        drop(repo);

        let reopened = JsonFileRepository::open(&path).await.unwrap();
        assert_eq!(reopened.count_for_owner(1).await.unwrap(), 2);
        assert!(reopened.exists_by_url_and_owner("https://ex.com/b", 1).await.unwrap());
        assert_eq!(reopened.save(&sample_article("https://ex.com/c"), 1).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("articles.json");
        let repo = JsonFileRepository::open(&path).await.unwrap();

        repo.save(&sample_article("https://ex.com/a"), 1).await.unwrap();
        assert!(matches!(
            repo.save(&sample_article("https://ex.com/a"), 1).await,
            Err(StorageError::UniqueViolation)
        ));

        let raw = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<StoredArticle> = serde_json::from_str(&raw).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].article.url, "https://ex.com/a");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("articles.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileRepository::open(&path).await,
            Err(StorageError::Json(_))
        ));
    }
}
