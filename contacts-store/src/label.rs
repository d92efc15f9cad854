//! Display-label group generation: deciding which "ribbon group" (bucket) a
//! contact belongs to for alphabetical listing UIs — usually the first
//! letter of the last name, but pluggable since that rule doesn't hold for
//! every locale (spec.md §4 external collaborator `DisplayLabelGroupGenerator`).

use contacts_types::{Detail, DetailType, FieldKey, Value};

/// A pluggable strategy for bucketing contacts by display label. Engines are
/// expected to register one generator per supported locale/script and pick
/// the highest-`priority` one that is `valid_for_locale`.
pub trait DisplayLabelGroupGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Higher priority is tried before lower priority when more than one
    /// registered generator is valid for the active locale.
    fn priority(&self) -> i32;

    fn preferred_for_locale(&self, locale: &str) -> bool;

    fn valid_for_locale(&self, locale: &str) -> bool;

    /// Maps an already-extracted piece of label data (the primary sort
    /// string) onto the bucket name it belongs to.
    fn display_label_group(&self, data: &str) -> String;

    /// The full, ordered set of bucket names this generator can produce,
    /// used to build UI ribbons ahead of time.
    fn display_label_groups(&self) -> Vec<String>;
}

/// The default bucketing rule: first letter of the last name (falling back
/// to the first name, then a literal "#" bucket for names that start with a
/// digit or punctuation), uppercased. Valid for any locale; lowest priority
/// so locale-specific generators can take precedence.
pub struct EnglishDisplayLabelGroupGenerator;

impl DisplayLabelGroupGenerator for EnglishDisplayLabelGroupGenerator {
    fn name(&self) -> &str {
        "en"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn preferred_for_locale(&self, locale: &str) -> bool {
        locale.starts_with("en")
    }

    fn valid_for_locale(&self, _locale: &str) -> bool {
        true
    }

    fn display_label_group(&self, data: &str) -> String {
        match data.trim().chars().next() {
            Some(c) if c.is_ascii_alphabetic() => c.to_ascii_uppercase().to_string(),
            Some(_) => "#".to_string(),
            None => "#".to_string(),
        }
    }

    fn display_label_groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = ('A'..='Z').map(|c| c.to_string()).collect();
        groups.push("#".to_string());
        groups
    }
}

/// Extracts the sort string a generator should bucket on: the last name if
/// present, else the first name, else a nickname, else the empty string
/// (which buckets under "#").
pub fn label_sort_data(details: &[Detail]) -> String {
    for detail in details.iter().filter(|d| d.detail_type == DetailType::Name) {
        if let Some(Value::Str(last)) = detail.field(FieldKey::LastName) {
            if !last.is_empty() {
                return last.clone();
            }
        }
        if let Some(Value::Str(first)) = detail.field(FieldKey::FirstName) {
            if !first.is_empty() {
                return first.clone();
            }
        }
    }
    for detail in details.iter().filter(|d| d.detail_type == DetailType::Nickname) {
        if let Some(Value::Str(nick)) = detail.field(FieldKey::Nickname) {
            if !nick.is_empty() {
                return nick.clone();
            }
        }
    }
    String::new()
}

/// Reads the `LabelGroup` an aggregate's already-stored `DisplayLabel`
/// detail carries, if any — used to detect whether a re-promotion actually
/// moved the contact to a different ribbon bucket.
pub fn display_label_group_of(details: &[Detail]) -> Option<String> {
    details
        .iter()
        .find(|d| d.detail_type == DetailType::DisplayLabel)
        .and_then(|d| d.field(FieldKey::LabelGroup))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Builds the synthetic `DisplayLabel` detail for an aggregate from its
/// already-promoted details, via `generator` (spec.md §4 "display label
/// regeneration hook"): the sort data doubles as the label text, bucketed
/// into a ribbon group.
pub fn synthesize_display_label(details: &[Detail], generator: &dyn DisplayLabelGroupGenerator) -> Detail {
    let data = label_sort_data(details);
    let group = generator.display_label_group(&data);
    Detail::new(DetailType::DisplayLabel)
        .with_field(FieldKey::Label, Value::Str(data))
        .with_field(FieldKey::LabelGroup, Value::Str(group))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_detail(first: &str, last: &str) -> Detail {
        Detail::new(DetailType::Name)
            .with_field(FieldKey::FirstName, Value::Str(first.to_string()))
            .with_field(FieldKey::LastName, Value::Str(last.to_string()))
    }

    #[test]
    fn buckets_by_last_name_initial() {
        let gen = EnglishDisplayLabelGroupGenerator;
        let data = label_sort_data(&[name_detail("John", "Smith")]);
        assert_eq!(gen.display_label_group(&data), "S");
    }

    #[test]
    fn falls_back_to_first_name_when_last_name_absent() {
        let data = label_sort_data(&[name_detail("Madonna", "")]);
        assert_eq!(data, "Madonna");
    }

    #[test]
    fn digit_leading_names_bucket_under_hash() {
        let gen = EnglishDisplayLabelGroupGenerator;
        assert_eq!(gen.display_label_group("123 Taxi"), "#");
    }
}
