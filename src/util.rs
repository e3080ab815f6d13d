use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Canonical timestamp format for every `*_at` column.
///
/// Fixed-width UTC with millisecond precision, so stored timestamps compare
/// correctly as plain strings in SQL threshold filters.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// True when `timestamp` is more than `window` before `now`.
/// Unparseable timestamps count as stale.
pub fn is_older_than(timestamp: &str, now: DateTime<Utc>, window: Duration) -> bool {
    parse_timestamp(timestamp)
        .map(|dt| now - dt > window)
        .unwrap_or(true)
}

/// Lower-cased domain part of an email address.
///
/// Example: "Sarah.Chen@Acme.com" → Some("acme.com")
pub fn email_domain(email: &str) -> Option<String> {
    let (_, domain) = email.trim().rsplit_once('@')?;
    let domain = domain.trim().trim_end_matches('.');
    if domain.is_empty() || !domain.contains('.') {
        return None;
    }
    Some(domain.to_lowercase())
}

/// Local part (before `@`) of an email address.
pub fn email_local_part(email: &str) -> &str {
    let trimmed = email.trim();
    trimmed.rsplit_once('@').map(|(local, _)| local).unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_roundtrip_is_fixed_width() {
        let now = Utc::now();
        let formatted = format_timestamp(now);
        assert!(formatted.ends_with('Z'));
        assert_eq!(formatted.len(), "2026-01-01T00:00:00.000Z".len());
        let parsed = parse_timestamp(&formatted).expect("parse");
        assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn test_is_older_than() {
        let now = Utc::now();
        let eight_days_ago = format_timestamp(now - Duration::days(8));
        let six_days_ago = format_timestamp(now - Duration::days(6));
        assert!(is_older_than(&eight_days_ago, now, Duration::days(7)));
        assert!(!is_older_than(&six_days_ago, now, Duration::days(7)));
        assert!(is_older_than("garbage", now, Duration::days(7)));
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(email_domain("Sarah.Chen@Acme.com").as_deref(), Some("acme.com"));
        assert_eq!(email_domain(" joe@sub.bigcorp.io ").as_deref(), Some("sub.bigcorp.io"));
        assert_eq!(email_domain("no-at-sign"), None);
        assert_eq!(email_domain("local@localhost"), None);
        assert_eq!(email_domain("trailing@"), None);
    }

    #[test]
    fn test_email_local_part() {
        assert_eq!(email_local_part("info.us@acme.com"), "info.us");
        assert_eq!(email_local_part("bare"), "bare");
    }
}
