use super::error::CoreError;
use super::labels;
use serde::Serialize;
use std::fmt;

/// A single detected region of an image, matched to a known label.
///
/// Concerns are immutable once built; [`Concern::new`] is the only way to
/// create one and it enforces the label and score invariants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Concern {
    name: &'static str,
    score: f64,
    location: [i64; 4],
    description: Option<&'static str>,
}

impl Concern {
    /// Builds a concern.
    ///
    /// `name` must be a label from the label table (matched case-insensitively)
    /// and `score` must lie in (0.0, 1.0]. When `description` is `None` it is
    /// taken from the label table.
    pub fn new(
        name: &str,
        score: f64,
        location: [i64; 4],
        description: Option<&'static str>,
    ) -> Result<Self, CoreError> {
        let (label, default_description) = labels::description_for(name)
            .ok_or_else(|| CoreError::InvalidLabel(name.to_string()))?;

        if !(score > 0.0 && score <= 1.0) {
            return Err(CoreError::InvalidScore(score));
        }

        Ok(Self {
            name: label,
            score,
            location,
            description: description.or(Some(default_description)),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Bounding box as `[x1, y1, x2, y2]`.
    pub fn location(&self) -> [i64; 4] {
        self.location
    }

    pub fn description(&self) -> Option<&'static str> {
        self.description
    }

    pub fn score_percentage(&self) -> f64 {
        self.score * 100.0
    }
}

impl fmt::Display for Concern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {:?}", self.name, self.score, self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bounds() {
        assert!(matches!(
            Concern::new("FACE_MALE", 0.0, [0, 0, 1, 1], None),
            Err(CoreError::InvalidScore(_))
        ));
        assert!(Concern::new("FACE_MALE", 1.0, [0, 0, 1, 1], None).is_ok());
        assert!(matches!(
            Concern::new("FACE_MALE", 1.5, [0, 0, 1, 1], None),
            Err(CoreError::InvalidScore(_))
        ));
        assert!(Concern::new("FACE_MALE", f64::NAN, [0, 0, 1, 1], None).is_err());
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        assert!(matches!(
            Concern::new("NSFW", 0.5, [0, 0, 1, 1], None),
            Err(CoreError::InvalidLabel(name)) if name == "NSFW"
        ));
    }

    #[test]
    fn test_description_defaults_from_label_table() {
        let concern = Concern::new("belly_exposed", 0.42, [1, 2, 3, 4], None).unwrap();
        assert_eq!(concern.name(), "BELLY_EXPOSED");
        assert_eq!(concern.description(), Some("Exposed belly"));
        assert!((concern.score_percentage() - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_display() {
        let concern = Concern::new("FACE_MALE", 0.9, [1, 2, 3, 4], None).unwrap();
        insta::assert_snapshot!(concern.to_string(), @"FACE_MALE (0.9) at [1, 2, 3, 4]");
    }
}
