//! Usage reports over users, datasets and feedback.

use super::models::{Feedback, StoredUser, DATASETS, FEEDBACK, USERS};
use super::Console;
use crate::error::{AdminError, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

const MAX_WINDOW_DAYS: u32 = 365;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub generated_at: DateTime<Utc>,
    pub window_days: u32,
    pub total_users: usize,
    pub admins: usize,
    pub pending_admins: usize,
    pub online_users: usize,
    /// Profiles created inside the window.
    pub new_users: usize,
    pub dataset_entries: usize,
    pub total_feedback: usize,
    /// Feedback submitted inside the window.
    pub recent_feedback: usize,
    /// One entry per day of the window, oldest first, days without feedback included.
    pub feedback_by_day: Vec<DailyCount>,
}

pub struct Reports<'a> {
    console: &'a Console,
}

impl<'a> Reports<'a> {
    pub(crate) fn new(console: &'a Console) -> Self {
        Self { console }
    }

    pub async fn summary(&self, days: u32) -> Result<ReportSummary> {
        self.summary_at(Utc::now(), days).await
    }

    /// Summary for the `days` calendar days (UTC) ending with the day of `now`.
    pub async fn summary_at(&self, now: DateTime<Utc>, days: u32) -> Result<ReportSummary> {
        if days == 0 {
            return Err(AdminError::InvalidArgument(
                "The report window must be at least one day.".to_string(),
            ));
        }
        let days = days.min(MAX_WINDOW_DAYS);

        let firestore = &self.console.firestore;
        let users = firestore.collection(USERS);
        let datasets = firestore.collection(DATASETS);
        let feedback = firestore.collection(FEEDBACK);
        let (users, datasets, feedback) = tokio::try_join!(
            users.get_all::<StoredUser>(),
            datasets.list_documents(),
            feedback.get_all::<Feedback>(),
        )?;

        let today = now.date_naive();
        let first_day = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .unwrap_or(NaiveDate::MIN);
        let in_window = |at: &DateTime<Utc>| {
            let day = at.date_naive();
            day >= first_day && day <= today
        };

        let profiles: Vec<_> = users.iter().filter(|(_, u)| !u.pending).map(|(_, u)| &u.profile).collect();

        let mut by_day: BTreeMap<NaiveDate, usize> = first_day
            .iter_days()
            .take(days as usize)
            .map(|day| (day, 0))
            .collect();
        for (_, record) in &feedback {
            if let Some(count) = by_day.get_mut(&record.timestamp.date_naive()) {
                *count += 1;
            }
        }

        Ok(ReportSummary {
            generated_at: now,
            window_days: days,
            total_users: profiles.len(),
            admins: profiles.iter().filter(|p| p.is_admin()).count(),
            pending_admins: users.len() - profiles.len(),
            online_users: profiles.iter().filter(|p| p.is_online).count(),
            new_users: profiles.iter().filter(|p| in_window(&p.created_at)).count(),
            dataset_entries: datasets.len(),
            total_feedback: feedback.len(),
            recent_feedback: feedback.iter().filter(|(_, f)| in_window(&f.timestamp)).count(),
            feedback_by_day: by_day
                .into_iter()
                .map(|(date, count)| DailyCount { date, count })
                .collect(),
        })
    }
}
