// Graduated refresh policy: the older a thread is, the less often its
// metrics change, so the longer a fetch stays good.

use chrono::{DateTime, Duration, Utc};

use crate::types::Post;

/// How long a fetch of content that is `content_age_days` old stays fresh.
/// Bucket upper bounds are inclusive.
pub fn max_fetch_age(content_age_days: i64) -> Duration {
    match content_age_days {
        i64::MIN..=7 => Duration::hours(1),
        8..=14 => Duration::days(1),
        15..=31 => Duration::days(2),
        32..=62 => Duration::days(7),
        63..=93 => Duration::days(14),
        94..=186 => Duration::days(28),
        _ => Duration::days(183),
    }
}

/// Whether `post`'s cached metrics are old enough to refetch.
pub fn is_outdated(post: &Post, now: DateTime<Utc>) -> bool {
    let content_age_days = (now - post.created()).num_days();
    let fetch_age = now - post.fetched;
    fetch_age > max_fetch_age(content_age_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post_at(created: DateTime<Utc>, fetched: DateTime<Utc>) -> Post {
        Post {
            author: "a".into(),
            created_utc: created.timestamp(),
            id: "x".into(),
            is_self: true,
            num_comments: 0,
            over_18: false,
            permalink: String::new(),
            score: 0,
            selftext: None,
            title: String::new(),
            url: String::new(),
            fetched,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 6, 1, 12, 0, 0).unwrap()
    }

    fn outdated(content_age: Duration, fetch_age: Duration) -> bool {
        let now = now();
        is_outdated(&post_at(now - content_age, now - fetch_age), now)
    }

    #[test]
    fn first_week_refreshes_hourly() {
        assert!(!outdated(Duration::days(7), Duration::minutes(59)));
        assert!(outdated(Duration::days(7), Duration::minutes(61)));
        assert!(!outdated(Duration::hours(2), Duration::minutes(30)));
    }

    #[test]
    fn second_week_refreshes_daily() {
        assert!(!outdated(Duration::days(8), Duration::hours(23)));
        assert!(outdated(Duration::days(8), Duration::hours(25)));
        assert!(!outdated(Duration::days(14), Duration::hours(23)));
    }

    #[test]
    fn bucket_boundaries() {
        let cases = [
            (31, Duration::days(2)),
            (32, Duration::days(7)),
            (62, Duration::days(7)),
            (63, Duration::days(14)),
            (93, Duration::days(14)),
            (94, Duration::days(28)),
            (186, Duration::days(28)),
            (187, Duration::days(183)),
        ];
        for (days, max) in cases {
            let content = Duration::days(days);
            assert!(!outdated(content, max - Duration::minutes(1)), "{days} days, just fresh");
            assert!(outdated(content, max + Duration::minutes(1)), "{days} days, just stale");
        }
    }

    #[test]
    fn never_fetched_archive_post_is_outdated() {
        let now = now();
        let created = now - Duration::days(400);
        assert!(is_outdated(&post_at(created, created), now));
    }

    #[test]
    fn future_created_uses_first_bucket() {
        assert_eq!(max_fetch_age(-1), Duration::hours(1));
    }
}
