//! Decides which of an owner's records need work this run.

use chrono::{DateTime, Utc};

use super::EnrichmentSettings;
use crate::db::{DbPerson, EnrichmentState};
use crate::util::is_older_than;

/// Records split into work for this run and records left alone.
#[derive(Debug, Default)]
pub struct Selection {
    pub eligible: Vec<DbPerson>,
    /// Records not selected; counted as skipped up front.
    pub skipped: u32,
}

/// Whether one record should be attempted.
///
/// Never-attempted records always qualify. With `force`, matched records
/// qualify once older than the staleness window and no-match records once
/// older than the retry cooldown.
pub fn needs_enrichment(
    person: &DbPerson,
    force: bool,
    now: DateTime<Utc>,
    settings: &EnrichmentSettings,
) -> bool {
    match person.enrichment_state() {
        EnrichmentState::NeverAttempted => true,
        _ if !force => false,
        EnrichmentState::Matched { attempted_at } => {
            is_older_than(attempted_at, now, settings.staleness_window())
        }
        EnrichmentState::NoMatch { attempted_at } => {
            is_older_than(attempted_at, now, settings.retry_cooldown())
        }
    }
}

/// Partition records, preserving load order among the eligible ones.
pub fn select(
    people: Vec<DbPerson>,
    force: bool,
    now: DateTime<Utc>,
    settings: &EnrichmentSettings,
) -> Selection {
    let mut selection = Selection::default();
    for person in people {
        if needs_enrichment(&person, force, now, settings) {
            selection.eligible.push(person);
        } else {
            selection.skipped += 1;
        }
    }
    selection
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::db::test_utils::sample_person;
    use crate::util::format_timestamp;

    fn person(id: &str, external_id: Option<&str>, attempted: Option<DateTime<Utc>>) -> DbPerson {
        let mut p = sample_person(id, "u1", &format!("{}@acme.com", id));
        p.external_id = external_id.map(str::to_string);
        p.last_enriched_at = attempted.map(format_timestamp);
        p
    }

    #[test]
    fn test_default_mode_only_selects_unattempted() {
        let now = Utc::now();
        let settings = EnrichmentSettings::default();
        let people = vec![
            person("fresh", None, None),
            person("matched-old", Some("x"), Some(now - Duration::days(30))),
            person("nomatch-old", None, Some(now - Duration::days(30))),
        ];
        let selection = select(people, false, now, &settings);
        let ids: Vec<&str> = selection.eligible.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["fresh"]);
        assert_eq!(selection.skipped, 2);
    }

    #[test]
    fn test_force_respects_staleness_window() {
        let now = Utc::now();
        let settings = EnrichmentSettings::default();
        let stale = person("stale", Some("x"), Some(now - Duration::days(8)));
        let recent = person("recent", Some("x"), Some(now - Duration::days(6)));
        assert!(needs_enrichment(&stale, true, now, &settings));
        assert!(!needs_enrichment(&recent, true, now, &settings));
    }

    #[test]
    fn test_force_respects_retry_cooldown() {
        let now = Utc::now();
        let settings = EnrichmentSettings::default();
        let cooled = person("cooled", None, Some(now - Duration::hours(25)));
        let hot = person("hot", None, Some(now - Duration::hours(23)));
        assert!(needs_enrichment(&cooled, true, now, &settings));
        assert!(!needs_enrichment(&hot, true, now, &settings));
    }

    #[test]
    fn test_unparseable_timestamp_is_stale() {
        let now = Utc::now();
        let mut p = person("weird", Some("x"), None);
        p.last_enriched_at = Some("yesterday-ish".to_string());
        assert!(needs_enrichment(&p, true, now, &EnrichmentSettings::default()));
        assert!(!needs_enrichment(&p, false, now, &EnrichmentSettings::default()));
    }
}
