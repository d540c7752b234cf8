//! Canonical alert keys.
//!
//! Alert rules are stored under a key derived from the owning service and the
//! alert name. The same derivation is used when removing every alert of a
//! service, so both sides must agree byte for byte.

/// Separator placed between the service name and the alert name in a key.
pub const KEY_SEPARATOR: char = '_';

/// Strips characters that are not usable in an alert identifier.
///
/// Only hyphens are removed; underscores survive because they are the key
/// separator.
#[must_use]
pub fn normalize(name: &str) -> String {
    name.chars().filter(|c| *c != '-').collect()
}

/// Returns the key under which an alert of `service_name` is stored.
#[must_use]
pub fn alert_key(service_name: &str, alert_name: &str) -> String {
    normalize(&format!("{service_name}{KEY_SEPARATOR}{alert_name}"))
}

/// Returns the prefix shared by the keys of every alert owned by `service_name`.
#[must_use]
pub fn service_prefix(service_name: &str) -> String {
    let mut prefix = normalize(service_name);
    prefix.push(KEY_SEPARATOR);
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("my-service", "myservice" ; "hyphens removed")]
    #[test_case("my_service", "my_service" ; "underscores kept")]
    #[test_case("", "" ; "empty")]
    #[test_case("---", "" ; "only hyphens")]
    fn normalize_cases(input: &str, expected: &str) {
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn alert_key_joins_with_separator() {
        assert_eq!(alert_key("my-service", "my-alert"), "myservice_myalert");
    }

    #[test]
    fn service_prefix_does_not_match_longer_service() {
        let key = alert_key("api-gateway", "latency");
        assert!(!key.starts_with(&service_prefix("api")));
        assert!(key.starts_with(&service_prefix("api-gateway")));
    }

    proptest! {
        #[test]
        fn prop_alert_key_is_deterministic(service in "[a-z-]{1,12}", alert in "[a-z-]{1,12}") {
            prop_assert_eq!(alert_key(&service, &alert), alert_key(&service, &alert));
        }

        #[test]
        fn prop_alert_key_starts_with_service_prefix(service in "[a-z-]{1,12}", alert in "[a-z-]{1,12}") {
            prop_assert!(alert_key(&service, &alert).starts_with(&service_prefix(&service)));
        }

        #[test]
        fn prop_normalize_never_contains_hyphen(input in ".*") {
            prop_assert!(!normalize(&input).contains('-'));
        }
    }
}
