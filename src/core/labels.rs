//! The label table: every detection class the inference server can report,
//! with a human-readable description. The set of valid labels is exactly the
//! key set of this table.

/// `(label, description)` pairs in the order the server documents them.
pub const LABEL_DESCRIPTIONS: &[(&str, &str)] = &[
    ("FEMALE_GENITALIA_COVERED", "Female genitalia covered"),
    ("FACE_FEMALE", "Female face"),
    ("BUTTOCKS_EXPOSED", "Exposed buttocks"),
    ("FEMALE_BREAST_EXPOSED", "Exposed female breasts"),
    ("FEMALE_GENITALIA_EXPOSED", "Exposed female genitalia"),
    ("MALE_BREAST_EXPOSED", "Exposed male breasts"),
    ("ANUS_EXPOSED", "Exposed anus"),
    ("FEET_EXPOSED", "Exposed feet"),
    ("BELLY_COVERED", "Covered belly"),
    ("FEET_COVERED", "Covered feet"),
    ("ARMPITS_COVERED", "Covered armpits"),
    ("ARMPITS_EXPOSED", "Exposed armpits"),
    ("FACE_MALE", "Male face"),
    ("BELLY_EXPOSED", "Exposed belly"),
    ("MALE_GENITALIA_EXPOSED", "Exposed male genitalia"),
    ("ANUS_COVERED", "Covered anus"),
    ("FEMALE_BREAST_COVERED", "Covered female breasts"),
    ("BUTTOCKS_COVERED", "Covered buttocks"),
];

/// Looks up a label case-insensitively.
///
/// Returns the canonical (upper-case, `'static`) label together with its
/// description, or `None` for labels outside of the table.
pub fn description_for(name: &str) -> Option<(&'static str, &'static str)> {
    LABEL_DESCRIPTIONS
        .iter()
        .find(|(label, _)| label.eq_ignore_ascii_case(name.trim()))
        .copied()
}

/// Returns the canonical spelling of a label, if it is known.
pub fn canonical_label(name: &str) -> Option<&'static str> {
    description_for(name).map(|(label, _)| label)
}

pub fn is_valid_label(name: &str) -> bool {
    description_for(name).is_some()
}

/// Iterates over every valid label.
pub fn all_labels() -> impl Iterator<Item = &'static str> {
    LABEL_DESCRIPTIONS.iter().map(|(label, _)| *label)
}
