use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AgendaError;

/// Symbolic aliases accepted at the input boundary, mapped to their level.
const ALIASES: &[(&str, u8)] = &[
    ("MIN", 0),
    ("DEFAULT", 0),
    ("LO", 1),
    ("LOW", 1),
    ("MED", 2),
    ("MEDIUM", 2),
    ("HI", 3),
    ("HIGH", 3),
    ("MAX", 3),
];

/// Display label for each level, indexed by level.
const LABELS: [&str; 4] = ["Minimal/Default", "Low", "Medium", "High"];

/// Ordinal priority of an agenda item. Only levels 0..=3 are representable.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Importance(u8);

impl Importance {
    pub const MIN: Self = Self(0);
    pub const LOW: Self = Self(1);
    pub const MEDIUM: Self = Self(2);
    pub const MAX: Self = Self(3);

    pub const ALL: [Self; 4] = [Self::MIN, Self::LOW, Self::MEDIUM, Self::MAX];

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        LABELS[usize::from(self.0)]
    }

    /// Parses user input: either a number in 0..=3 or one of the symbolic
    /// aliases. Input is trimmed and upper-cased before lookup.
    pub fn parse(input: &str) -> Result<Self, AgendaError> {
        let normalized = input.trim().to_ascii_uppercase();

        if let Ok(number) = normalized.parse::<i64>() {
            return u8::try_from(number)
                .ok()
                .and_then(|level| Self::try_from(level).ok())
                .ok_or(AgendaError::InvalidImportance(normalized));
        }

        ALIASES
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, level)| Self(*level))
            .ok_or(AgendaError::InvalidImportance(normalized))
    }

    /// Decodes the stored string form. Stored values are always numeric.
    pub fn from_stored(raw: &str) -> Result<Self, AgendaError> {
        raw.trim()
            .parse::<u8>()
            .ok()
            .and_then(|level| Self::try_from(level).ok())
            .ok_or_else(|| AgendaError::InvalidImportance(raw.to_owned()))
    }

    pub fn to_stored(self) -> String {
        self.0.to_string()
    }
}

impl TryFrom<u8> for Importance {
    type Error = AgendaError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        if level <= Self::MAX.0 {
            Ok(Self(level))
        } else {
            Err(AgendaError::InvalidImportance(level.to_string()))
        }
    }
}

impl From<Importance> for u8 {
    fn from(value: Importance) -> Self {
        value.0
    }
}

impl FromStr for Importance {
    type Err = AgendaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Importance;
    use crate::errors::AgendaError;

    #[test]
    fn accepts_every_numeric_level() {
        for (raw, expected) in [("0", 0), ("1", 1), ("2", 2), ("3", 3)] {
            assert_eq!(Importance::parse(raw).expect("numeric level").level(), expected);
        }
    }

    #[test]
    fn accepts_aliases_regardless_of_case_and_whitespace() {
        assert_eq!(Importance::parse("MIN"), Ok(Importance::MIN));
        assert_eq!(Importance::parse(" default "), Ok(Importance::MIN));
        assert_eq!(Importance::parse("low"), Ok(Importance::LOW));
        assert_eq!(Importance::parse("Lo"), Ok(Importance::LOW));
        assert_eq!(Importance::parse("medium"), Ok(Importance::MEDIUM));
        assert_eq!(Importance::parse("med"), Ok(Importance::MEDIUM));
        assert_eq!(Importance::parse("\tHigh\n"), Ok(Importance::MAX));
        assert_eq!(Importance::parse("hi"), Ok(Importance::MAX));
        assert_eq!(Importance::parse("max"), Ok(Importance::MAX));
    }

    #[test]
    fn rejects_out_of_range_and_unknown_values() {
        for raw in ["4", "-1", "banana", "", "2.5", "256"] {
            assert!(
                matches!(Importance::parse(raw), Err(AgendaError::InvalidImportance(_))),
                "`{raw}` should be rejected"
            );
        }
    }

    #[test]
    fn rejection_reports_normalized_input() {
        let error = Importance::parse(" banana ").expect_err("must fail");
        assert_eq!(error, AgendaError::InvalidImportance("BANANA".to_owned()));
    }

    #[test]
    fn stored_form_is_numeric() {
        assert_eq!(Importance::parse("high").expect("alias").to_stored(), "3");
        assert_eq!(Importance::from_stored("2"), Ok(Importance::MEDIUM));
        assert!(Importance::from_stored("HIGH").is_err());
        assert!(Importance::from_stored("7").is_err());
    }

    #[test]
    fn labels_follow_levels() {
        let labels: Vec<_> = Importance::ALL.iter().map(|level| level.label()).collect();
        assert_eq!(labels, vec!["Minimal/Default", "Low", "Medium", "High"]);
    }
}
