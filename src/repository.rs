//! Article persistence as seen by the engine.
//!
//! The engine only needs three things from storage: "is this URL already
//! stored for this owner", "store this article", and a count for reporting.
//! Uniqueness is on the `(owner, url)` pair and a conflicting insert is
//! reported as [`StorageError::UniqueViolation`], so concurrent writers
//! racing on the same URL can be told apart from real failures.

use crate::error::StorageError;
use crate::models::{Article, OwnerId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait Repository: Send + Sync {
    async fn exists_by_url_and_owner(&self, url: &str, owner: OwnerId) -> StorageResult<bool>;

    /// Store `article` for `owner` and return its id.
    async fn save(&self, article: &Article, owner: OwnerId) -> StorageResult<i64>;

    async fn count_for_owner(&self, owner: OwnerId) -> StorageResult<usize>;
}

/// An article as it sits in a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArticle {
    pub id: i64,
    pub owner_id: OwnerId,
    #[serde(flatten)]
    pub article: Article,
}

/// Rows plus a `(owner, url)` index. Shared by the in-memory and JSON stores.
#[derive(Debug, Default)]
pub(crate) struct ArticleTable {
    rows: Vec<StoredArticle>,
    index: HashMap<(OwnerId, String), usize>,
}

impl ArticleTable {
    pub(crate) fn from_rows(rows: Vec<StoredArticle>) -> Self {
        let index = rows
            .iter()
            .enumerate()
            .map(|(i, row)| ((row.owner_id, row.article.url.clone()), i))
            .collect();
        Self { rows, index }
    }

    pub(crate) fn rows(&self) -> &[StoredArticle] {
        &self.rows
    }

    pub(crate) fn contains(&self, url: &str, owner: OwnerId) -> bool {
        self.index.contains_key(&(owner, url.to_string()))
    }

    pub(crate) fn insert(&mut self, article: &Article, owner: OwnerId) -> StorageResult<i64> {
        let key = (owner, article.url.clone());
        if self.index.contains_key(&key) {
            return Err(StorageError::UniqueViolation);
        }
        let id = self.rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        self.index.insert(key, self.rows.len());
        self.rows.push(StoredArticle {
            id,
            owner_id: owner,
            article: article.clone(),
        });
        Ok(id)
    }

    /// Undo the most recent [`ArticleTable::insert`].
    pub(crate) fn pop_last(&mut self) {
        if let Some(row) = self.rows.pop() {
            self.index.remove(&(row.owner_id, row.article.url));
        }
    }

    pub(crate) fn count_for(&self, owner: OwnerId) -> usize {
        self.rows.iter().filter(|r| r.owner_id == owner).count()
    }
}

/// Process-local repository backed by a `tokio` `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    table: RwLock<ArticleTable>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything stored, in insertion order.
    pub async fn all(&self) -> Vec<StoredArticle> {
        self.table.read().await.rows().to_vec()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn exists_by_url_and_owner(&self, url: &str, owner: OwnerId) -> StorageResult<bool> {
        Ok(self.table.read().await.contains(url, owner))
    }

    async fn save(&self, article: &Article, owner: OwnerId) -> StorageResult<i64> {
        self.table.write().await.insert(article, owner)
    }

    async fn count_for_owner(&self, owner: OwnerId) -> StorageResult<usize> {
        Ok(self.table.read().await.count_for(owner))
    }
}

#[cfg(test)]
pub(crate) fn sample_article(url: &str) -> Article {
    Article {
        title: "River floods the old town".to_string(),
        url: url.to_string(),
        summary: crate::models::NO_SUMMARY.to_string(),
        image_url: None,
        category: None,
        publish_date: None,
        source_id: 1,
        source_name: "Example".to_string(),
    }
}
