use crate::error::{Result, TubeError};
use sqlx::SqlitePool;
use std::collections::HashSet;

/// Word list stored in SQLite, used to reject searches and filter results
#[derive(Clone)]
pub struct SqlBadWordStore {
    pool: SqlitePool,
}

impl SqlBadWordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load every stored word, lowercased
    pub async fn all_words(&self) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT word FROM bad_words")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TubeError::DatabaseError(format!("Failed to load bad words: {}", e)))?;

        Ok(rows.into_iter().map(|(w,)| w.to_lowercase()).collect())
    }

    /// Returns the given words that are in the list, in input order.
    /// Words are expected to be lowercased already.
    pub async fn find_bad_words(&self, words: &[String]) -> Result<Vec<String>> {
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let bad_words = self.all_words().await?;
        Ok(words
            .iter()
            .filter(|w| bad_words.contains(w.as_str()))
            .cloned()
            .collect())
    }

    pub async fn contains_any(&self, words: &[String]) -> Result<bool> {
        Ok(!self.find_bad_words(words).await?.is_empty())
    }

    /// Insert words, ignoring ones already present. Returns how many were new.
    pub async fn add_words(&self, words: &[String]) -> Result<u64> {
        let mut inserted = 0;
        for word in words {
            let word = word.trim().to_lowercase();
            if word.is_empty() {
                continue;
            }
            let result = sqlx::query("INSERT OR IGNORE INTO bad_words (word) VALUES (?)")
                .bind(&word)
                .execute(&self.pool)
                .await
                .map_err(|e| TubeError::DatabaseError(format!("Failed to add bad word: {}", e)))?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bad_words")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| TubeError::DatabaseError(format!("Failed to count bad words: {}", e)))?;

        Ok(count.0)
    }
}
