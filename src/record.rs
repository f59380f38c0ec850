//! The 15-field record extracted from one dossier.
//!
//! Field names double as spreadsheet headers and as the JSON keys the model
//! is asked to return, so [`CANONICAL_FIELDS`] is the single place they are
//! spelled out. A [`FieldRecord`] always carries all 15 slots; whatever the
//! model left out stays `None`.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// Number of canonical fields.
pub const FIELD_COUNT: usize = 15;

/// Canonical field names, in column order.
pub const CANONICAL_FIELDS: [&str; FIELD_COUNT] = [
    "Raison sociale",
    "Sigle",
    "Responsabilité légale",
    "Adresse",
    "Téléphone",
    "Portable",
    "E-mail",
    "Site Internet",
    "SIRET",
    "Code NACE",
    "Assurance Travaux",
    "Assurance Civile",
    "Effectif moyen",
    "Chiffre d\u{2019}affaires H.T.",
    "Qualifications professionnelles",
];

/// Field whose entries are `;`-separated and get one line each in the report.
pub const QUALIFICATIONS_FIELD: &str = "Qualifications professionnelles";

/// Position of a field name in [`CANONICAL_FIELDS`].
///
/// Matching ignores surrounding whitespace, letter case and the flavour of
/// apostrophe, since models freely swap `’` for `'`.
pub fn canonical_index(name: &str) -> Option<usize> {
    let wanted = normalise_key(name);
    CANONICAL_FIELDS
        .iter()
        .position(|field| normalise_key(field) == wanted)
}

fn normalise_key(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| match c {
            '\u{2019}' | '\u{2018}' | '`' => '\'',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// One row of the report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRecord {
    values: [Option<String>; FIELD_COUNT],
}

impl FieldRecord {
    /// A record with every field empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from the model's JSON object.
    ///
    /// Unknown keys are dropped; missing ones stay `None`. When two keys
    /// name the same column, an empty value never replaces a present one.
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        let mut record = Self::new();
        for (key, value) in object {
            match canonical_index(key) {
                Some(idx) => {
                    let text = value_to_text(value);
                    if text.is_some() || record.values[idx].is_none() {
                        record.values[idx] = text;
                    }
                }
                None => tracing::debug!("Dropping unexpected field {:?}", key),
            }
        }
        record
    }

    /// Value of a field by name, `None` if unset or the name is unknown.
    pub fn get(&self, field: &str) -> Option<&str> {
        canonical_index(field).and_then(|idx| self.values[idx].as_deref())
    }

    /// Value of a field by column index.
    pub fn get_index(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(|v| v.as_deref())
    }

    /// Set a field by name. Returns `false` when the name is not canonical.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> bool {
        match canonical_index(field) {
            Some(idx) => {
                self.values[idx] = Some(value.into());
                true
            }
            None => false,
        }
    }

    /// `(name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<&str>)> + '_ {
        CANONICAL_FIELDS
            .iter()
            .copied()
            .zip(self.values.iter().map(|v| v.as_deref()))
    }

    /// Number of fields holding a value.
    pub fn populated(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

impl Serialize for FieldRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FIELD_COUNT))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

/// Flatten a JSON value into cell text.
fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_to_text).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(";"))
            }
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("test value is an object")
    }

    #[test]
    fn canonical_fields_are_unique() {
        for (i, a) in CANONICAL_FIELDS.iter().enumerate() {
            assert_eq!(canonical_index(a), Some(i), "{a}");
        }
    }

    #[test]
    fn missing_fields_stay_empty_and_extras_are_dropped() {
        let record = FieldRecord::from_json_object(&object(json!({
            "Raison sociale": "ACME BTP",
            "SIRET": "123 456 789 00012",
            "Commentaire": "not a column"
        })));

        assert_eq!(record.get("Raison sociale"), Some("ACME BTP"));
        assert_eq!(record.get("SIRET"), Some("123 456 789 00012"));
        assert_eq!(record.get("Sigle"), None);
        assert_eq!(record.populated(), 2);
        assert_eq!(record.iter().count(), FIELD_COUNT);
    }

    #[test]
    fn straight_apostrophe_matches_revenue_field() {
        let record = FieldRecord::from_json_object(&object(json!({
            "Chiffre d'affaires H.T.": "1 200 000 €"
        })));
        assert_eq!(record.get_index(13), Some("1 200 000 €"));
    }

    #[test]
    fn null_duplicate_does_not_erase_value() {
        let record = FieldRecord::from_json_object(&object(json!({
            "Chiffre d'affaires H.T.": "1 200 000 €",
            "Chiffre d’affaires H.T.": null
        })));
        assert_eq!(record.get_index(13), Some("1 200 000 €"));

        let record = FieldRecord::from_json_object(&object(json!({
            "Chiffre d'affaires H.T.": null,
            "Chiffre d’affaires H.T.": "1 200 000 €"
        })));
        assert_eq!(record.get_index(13), Some("1 200 000 €"));
    }

    #[test]
    fn non_string_values_are_flattened() {
        let record = FieldRecord::from_json_object(&object(json!({
            "Effectif moyen": 42,
            "Qualifications professionnelles": ["Qualibat 2111", "RGE"],
            "Sigle": null
        })));
        assert_eq!(record.get("Effectif moyen"), Some("42"));
        assert_eq!(
            record.get(QUALIFICATIONS_FIELD),
            Some("Qualibat 2111;RGE")
        );
        assert_eq!(record.get("Sigle"), None);
    }

    #[test]
    fn serialises_all_fields_in_order() {
        let mut record = FieldRecord::new();
        assert!(record.set("Adresse", "1 rue de la Paix, Paris"));
        assert!(!record.set("Couleur", "bleu"));

        let json = serde_json::to_string(&record).expect("serialise");
        let first = json.find("Raison sociale").expect("first key");
        let last = json.find(QUALIFICATIONS_FIELD).expect("last key");
        assert!(first < last);
        assert!(json.contains(r#""Adresse":"1 rue de la Paix, Paris""#));
        assert!(json.contains(r#""Sigle":null"#));
    }
}
