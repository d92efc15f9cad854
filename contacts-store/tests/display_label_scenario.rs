//! Concrete scenario 4 from spec.md §8: last-name lengths sorted under a
//! mock group generator that buckets by digit-count/length rather than by
//! first letter, exercising the pluggable `DisplayLabelGroupGenerator`
//! contract end to end.

use contacts_store::label::DisplayLabelGroupGenerator;

/// A generator whose bucket is the last name's length as a digit, or "E"
/// for 6/7/8-letter names and "Z" for the empty name — deliberately not
/// the English first-letter rule, to prove the trait is truly pluggable.
struct MockLengthGroupGenerator;

impl DisplayLabelGroupGenerator for MockLengthGroupGenerator {
    fn name(&self) -> &str {
        "mock-length"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn preferred_for_locale(&self, _locale: &str) -> bool {
        true
    }

    fn valid_for_locale(&self, _locale: &str) -> bool {
        true
    }

    fn display_label_group(&self, data: &str) -> String {
        match data.len() {
            0 => "Z".to_string(),
            6 | 7 | 8 => "E".to_string(),
            n => n.to_string(),
        }
    }

    fn display_label_groups(&self) -> Vec<String> {
        vec!["1", "2", "3", "4", "5", "E", "Z"].into_iter().map(String::from).collect()
    }
}

#[test]
fn last_name_lengths_map_to_expected_groups() {
    let generator = MockLengthGroupGenerator;
    let last_names = ["a", "abcde", "abcdefgh", "abcdefg", "abc", "", "abcdef", "abcd", "abcdefgh"];
    let expected_groups = ["1", "5", "E", "E", "3", "Z", "E", "4", "E"];

    let groups: Vec<String> = last_names.iter().map(|name| generator.display_label_group(name)).collect();
    assert_eq!(groups, expected_groups);
}

#[test]
fn sorting_by_group_then_name_places_the_empty_name_last_within_its_group() {
    let generator = MockLengthGroupGenerator;
    let mut contacts: Vec<(&str, String)> = ["a", "abcde", "abcdefgh", "abcdefg", "abc", "", "abcdef", "abcd", "abcdefgh"]
        .iter()
        .map(|&last| (last, generator.display_label_group(last)))
        .collect();

    contacts.sort_by(|(name_a, group_a), (name_b, group_b)| group_a.cmp(group_b).then(name_a.cmp(name_b)));

    let zebra_group: Vec<&str> = contacts
        .iter()
        .filter(|(_, group)| group == "Z")
        .map(|(name, _)| *name)
        .collect();
    assert_eq!(zebra_group, vec![""]);

    let last_sorted = contacts.last().unwrap();
    assert_eq!(last_sorted.1, "Z", "the empty-named contact's 'Z' group sorts after digit/E groups");
}
