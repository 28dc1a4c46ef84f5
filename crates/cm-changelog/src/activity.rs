//! Activity dashboard summary

use chrono::{DateTime, Duration, NaiveDate, Utc};
use cm_core::traits::Id;
use cm_models::{ChangelogAction, ChangelogEntity, ChangelogEntry};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Days covered by the per-day series, today included
pub const ACTIVITY_DAYS: i64 = 7;
pub const TOP_ACTORS: usize = 5;
pub const LATEST_ENTRIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorCount {
    pub actor_id: Option<Id>,
    pub actor_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

/// Aggregated view of the changelog
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub total: usize,
    pub by_action: BTreeMap<ChangelogAction, usize>,
    pub by_entity: BTreeMap<ChangelogEntity, usize>,
    /// Most active users, busiest first
    pub top_actors: Vec<ActorCount>,
    /// One bucket per day, oldest first, ending today
    pub daily: Vec<DailyCount>,
    pub latest: Vec<ChangelogEntry>,
}

impl ActivitySummary {
    pub fn compute(entries: &[ChangelogEntry], now: DateTime<Utc>) -> Self {
        let mut by_action = BTreeMap::new();
        let mut by_entity = BTreeMap::new();
        let mut actors: HashMap<(Option<Id>, &str), usize> = HashMap::new();

        for entry in entries {
            *by_action.entry(entry.action).or_insert(0) += 1;
            *by_entity.entry(entry.entity).or_insert(0) += 1;
            *actors
                .entry((entry.actor_id, entry.actor_name.as_str()))
                .or_insert(0) += 1;
        }

        let mut top_actors: Vec<ActorCount> = actors
            .into_iter()
            .map(|((actor_id, actor_name), count)| ActorCount {
                actor_id,
                actor_name: actor_name.to_string(),
                count,
            })
            .collect();
        top_actors.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.actor_name.cmp(&b.actor_name))
        });
        top_actors.truncate(TOP_ACTORS);

        let today = now.date_naive();
        let daily = (0..ACTIVITY_DAYS)
            .rev()
            .map(|back| {
                let date = today - Duration::days(back);
                let count = entries
                    .iter()
                    .filter(|e| e.timestamp.date_naive() == date)
                    .count();
                DailyCount { date, count }
            })
            .collect();

        let mut latest = entries.to_vec();
        latest.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        latest.truncate(LATEST_ENTRIES);

        Self {
            total: entries.len(),
            by_action,
            by_entity,
            top_actors,
            daily,
            latest,
        }
    }

    pub fn count_for(&self, action: ChangelogAction) -> usize {
        self.by_action.get(&action).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: Id, action: ChangelogAction, actor: (Id, &str), at: DateTime<Utc>) -> ChangelogEntry {
        ChangelogEntry {
            id,
            timestamp: at,
            actor_id: Some(actor.0),
            actor_name: actor.1.into(),
            action,
            entity: ChangelogEntity::Contact,
            entity_id: Some(id),
            description: format!("entry {}", id),
            details: None,
        }
    }

    #[test]
    fn test_compute_counts() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let entries = vec![
            entry(1, ChangelogAction::Create, (1, "Ada"), now - Duration::hours(1)),
            entry(2, ChangelogAction::Update, (1, "Ada"), now - Duration::days(1)),
            entry(3, ChangelogAction::Update, (2, "Bob"), now - Duration::days(2)),
            entry(4, ChangelogAction::Delete, (1, "Ada"), now - Duration::days(30)),
        ];

        let summary = ActivitySummary::compute(&entries, now);

        assert_eq!(summary.total, 4);
        assert_eq!(summary.count_for(ChangelogAction::Update), 2);
        assert_eq!(summary.count_for(ChangelogAction::Login), 0);
        assert_eq!(summary.by_entity[&ChangelogEntity::Contact], 4);
        assert_eq!(summary.top_actors[0].actor_name, "Ada");
        assert_eq!(summary.top_actors[0].count, 3);
    }

    #[test]
    fn test_daily_series_ends_today() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let entries = vec![
            entry(1, ChangelogAction::Login, (1, "Ada"), now),
            entry(2, ChangelogAction::Login, (1, "Ada"), now - Duration::days(6)),
            entry(3, ChangelogAction::Login, (1, "Ada"), now - Duration::days(7)),
        ];

        let summary = ActivitySummary::compute(&entries, now);

        assert_eq!(summary.daily.len(), 7);
        assert_eq!(summary.daily[0].date, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        assert_eq!(summary.daily[0].count, 1);
        assert_eq!(summary.daily[6].date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!(summary.daily[6].count, 1);
        assert_eq!(summary.daily.iter().map(|d| d.count).sum::<usize>(), 2);
    }

    #[test]
    fn test_latest_is_capped_and_newest_first() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let entries: Vec<_> = (1..=15)
            .map(|i| entry(i, ChangelogAction::Export, (1, "Ada"), now - Duration::minutes(i)))
            .collect();

        let summary = ActivitySummary::compute(&entries, now);
        assert_eq!(summary.latest.len(), LATEST_ENTRIES);
        assert_eq!(summary.latest[0].id, 1);
    }
}
