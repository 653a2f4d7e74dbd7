use media_source_adapters::mapping::{self, MapOptions};
use media_source_adapters::{Config, CredentialPlacement, CredentialPool, MissingTimestamp};
use proptest::prelude::*;

/// Property-based tests for the field mapping helpers
mod mapping_props {
    use super::*;

    const PROXY: &str = "https://imgproxy.example/plain/{}";

    proptest! {
        #[test]
        fn test_duration_is_rounded_milliseconds(secs in 0.001f64..1_000_000.0) {
            let expected = (secs * 1000.0).round() as u64;
            prop_assert_eq!(mapping::duration_ms(Some(secs)), expected);
        }

        #[test]
        fn test_negative_duration_is_zero(secs in -1_000_000.0f64..=0.0) {
            prop_assert_eq!(mapping::duration_ms(Some(secs)), 0);
        }

        #[test]
        fn test_popularity_sums_counters(a in 0u64..u32::MAX as u64, b in 0u64..u32::MAX as u64) {
            prop_assert_eq!(mapping::popularity(Some(a), Some(b)), a + b);
            prop_assert_eq!(mapping::popularity(Some(a), None), a);
            prop_assert_eq!(mapping::popularity(None, Some(b)), b);
        }

        #[test]
        fn test_absolute_thumbnails_pass_through(path in "[a-z0-9/]{1,30}") {
            let url = format!("https://images.example/{path}");
            prop_assert_eq!(mapping::thumbnail_url(Some(&url), PROXY), Some(url.clone()));
        }

        #[test]
        fn test_thumbnail_tokens_use_template(token in "[a-zA-Z0-9]{1,20}") {
            let resolved = mapping::thumbnail_url(Some(&token), PROXY);
            prop_assert_eq!(resolved, Some(format!("https://imgproxy.example/plain/{token}")));
        }

        #[test]
        fn test_non_positive_subscribers_are_unknown(n in i64::MIN..=0) {
            prop_assert_eq!(mapping::subscribers(Some(n)), None);
        }

        #[test]
        fn test_positive_subscribers_are_kept(n in 1i64..i64::MAX) {
            prop_assert_eq!(mapping::subscribers(Some(n)), Some(n as u64));
        }

        #[test]
        fn test_missing_id_is_rejected(record in "[a-z]{1,10}") {
            prop_assert!(mapping::require_id(&record, None).is_err());
        }

        #[test]
        fn test_missing_timestamp_policy(now in 1i64..4_000_000_000_000) {
            let now_policy = MapOptions::at(now, MissingTimestamp::Now);
            let epoch_policy = MapOptions::at(now, MissingTimestamp::Epoch);
            prop_assert_eq!(now_policy.timestamp(None), now);
            prop_assert_eq!(epoch_policy.timestamp(Some("not a date")), 0);
        }

        #[test]
        fn test_clock_format_matches_seconds(h in 0u32..24, m in 0u32..60, s in 0u32..60) {
            let clock = format!("{h:02}:{m:02}:{s:02}");
            let expected = f64::from(h * 3600 + m * 60 + s);
            prop_assert_eq!(mapping::clock_seconds(&clock), Some(expected));
        }
    }
}

mod credential_props {
    use super::*;

    fn pool(size: usize) -> CredentialPool {
        CredentialPool::new(
            (0..size).map(|i| format!("key{i}")).collect(),
            CredentialPlacement::Query("client_id".to_string()),
        )
    }

    proptest! {
        #[test]
        fn test_next_index_wraps(size in 1usize..16, cursor in 0usize..64) {
            prop_assert_eq!(pool(size).next_index(cursor), (cursor + 1) % size);
        }

        #[test]
        fn test_full_rotation_returns_to_start(size in 1usize..16, start in 0usize..16) {
            let pool = pool(size);
            let start = start % size;
            let mut cursor = start;
            for _ in 0..size {
                cursor = pool.next_index(cursor);
            }
            prop_assert_eq!(cursor, start);
        }

        #[test]
        fn test_get_is_always_in_pool(size in 1usize..16, cursor in 0usize..1000) {
            let pool = pool(size);
            let key = pool.get(cursor);
            let expected = Some(format!("key{}", cursor % size));
            prop_assert_eq!(key, expected.as_deref());
        }
    }
}

mod config_validation_props {
    use super::*;

    proptest! {
        #[test]
        fn test_page_size_bounds(size in 0u32..400) {
            let mut config = Config::default();
            config.jamendo.page_size = size;
            let valid = (1..=200).contains(&size);
            prop_assert_eq!(config.validate().is_ok(), valid, "page_size {}", size);
        }

        #[test]
        fn test_positive_attempts_accepted(attempts in 1u32..50) {
            let mut config = Config::default();
            config.retry.max_attempts = attempts;
            prop_assert!(config.validate().is_ok());
        }

        #[test]
        fn test_jitter_range(jitter in -1.0f64..2.0) {
            let mut config = Config::default();
            config.retry.jitter = jitter;
            let valid = (0.0..=1.0).contains(&jitter);
            prop_assert_eq!(config.validate().is_ok(), valid);
        }
    }
}
