//! Property-based tests for checkout key derivation.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::key::{CheckoutKey, Variant};
    use proptest::prelude::*;

    fn tags() -> impl Strategy<Value = Vec<(String, String)>> {
        prop::collection::vec(("[a-z]{1,8}", ".{0,12}"), 0..6)
    }

    proptest! {
        /// Property: derivation is deterministic (same input = same output)
        #[test]
        fn derive_is_deterministic(repo in ".*", rev in ".*", tags in tags()) {
            let variant: Variant = tags.into_iter().collect();
            let key1 = CheckoutKey::derive(&repo, &rev, &variant);
            let key2 = CheckoutKey::derive(&repo, &rev, &variant.clone());
            prop_assert_eq!(key1, key2);
        }

        /// Property: the order tags are supplied in does not change the key
        #[test]
        fn derive_ignores_tag_order(repo in ".*", rev in ".*", tags in tags()) {
            // Duplicate names keep the last value, so dedupe before reversing.
            let mut unique = std::collections::BTreeMap::new();
            for (k, v) in tags {
                unique.insert(k, v);
            }
            let forward: Variant = unique.clone().into_iter().collect();
            let reversed: Variant = unique.into_iter().rev().collect();
            prop_assert_eq!(
                CheckoutKey::derive(&repo, &rev, &forward),
                CheckoutKey::derive(&repo, &rev, &reversed)
            );
        }

        /// Property: the hex form is a safe directory name and parses back
        #[test]
        fn hex_form_is_filesystem_safe(repo in ".*", rev in ".*") {
            let key = CheckoutKey::derive(&repo, &rev, &Variant::new());
            let hex = key.to_hex();
            prop_assert_eq!(hex.len(), 64);
            prop_assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
            prop_assert_eq!(hex.parse::<CheckoutKey>().unwrap(), key);
        }

        /// Property: moving bytes between repository and revision changes the key
        #[test]
        fn split_point_changes_key(s in ".{2,24}", split in 1usize..24) {
            let chars: Vec<char> = s.chars().collect();
            prop_assume!(split < chars.len());
            let head: String = chars[..split].iter().collect();
            let tail: String = chars[split..].iter().collect();
            let joined_first = CheckoutKey::derive(&s, "", &Variant::new());
            let split_key = CheckoutKey::derive(&head, &tail, &Variant::new());
            prop_assert_ne!(joined_first, split_key);
        }
    }
}
