//! Feedback submitted from the apps.

use super::models::{Feedback, FeedbackView, UserProfile, FEEDBACK, USERS};
use super::Console;
use crate::error::{AdminError, Result};
use crate::firestore::models::Direction;
use crate::firestore::query::Query;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};

pub struct FeedbackLog<'a> {
    console: &'a Console,
}

impl<'a> FeedbackLog<'a> {
    pub(crate) fn new(console: &'a Console) -> Self {
        Self { console }
    }

    /// The newest `limit` feedback records with their authors resolved.
    pub async fn list(&self, limit: usize) -> Result<Vec<FeedbackView>> {
        let query = Query::new(FEEDBACK)
            .order_by("timestamp", Direction::Descending)
            .limit(i32::try_from(limit).unwrap_or(i32::MAX));
        let records = self.console.firestore.query(query).get().await?.decode_all::<Feedback>()?;
        self.resolve_authors(records).await
    }

    /// All feedback of one user, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<FeedbackView>> {
        let query = Query::new(FEEDBACK).where_eq("userId", user_id)?;
        let mut records = self.console.firestore.query(query).get().await?.decode_all::<Feedback>()?;
        records.sort_by(|(_, a), (_, b)| b.timestamp.cmp(&a.timestamp));
        self.resolve_authors(records).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let doc = self.console.firestore.collection(FEEDBACK).doc(id);
        if !doc.get_snapshot().await?.exists() {
            return Err(AdminError::NotFound(format!("No feedback with id {}.", id)));
        }
        doc.delete().await?;
        tracing::info!(feedback_id = id, "deleted feedback");
        Ok(())
    }

    // Looks up each distinct author once, concurrently. Authors without a
    // profile are left unresolved.
    async fn resolve_authors(&self, records: Vec<(String, Feedback)>) -> Result<Vec<FeedbackView>> {
        let author_ids: Vec<String> = records
            .iter()
            .map(|(_, feedback)| feedback.user_id.clone())
            .filter(|id| !id.is_empty())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let users = self.console.firestore.collection(USERS);
        let lookups = author_ids.iter().map(|id| {
            let doc = users.doc(id);
            async move { doc.get::<UserProfile>().await }
        });

        let profiles = join_all(lookups).await;

        let mut authors: HashMap<String, UserProfile> = HashMap::new();
        for (id, profile) in author_ids.into_iter().zip(profiles) {
            match profile {
                Ok(Some(profile)) => {
                    authors.insert(id, profile);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(user_id = %id, error = %e, "failed to resolve feedback author"),
            }
        }

        Ok(records
            .into_iter()
            .map(|(id, feedback)| {
                let author = authors.get(feedback.user_id.as_str());
                FeedbackView {
                    id,
                    author_email: author.map(|p| p.email.clone()),
                    author_name: author.map(|p| p.name.clone()),
                    feedback,
                }
            })
            .collect())
    }
}
