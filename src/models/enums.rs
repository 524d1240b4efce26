use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Classification {
    Normal => "NORMAL",
    Pneumonia => "PNEUMONIA",
});

// Declaration order is severity order (derived Ord).
str_enum!(Priority {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Critical => "CRITICAL",
});

str_enum!(Channel {
    Direct => "direct",
    Alert => "alert",
});

impl Classification {
    /// Case-insensitive parse for values typed by people.
    pub fn parse_loose(s: &str) -> Result<Self, DatabaseError> {
        s.trim().to_uppercase().parse()
    }
}

impl Priority {
    /// Case-insensitive parse that also accepts the Portuguese tier names
    /// still found in older records and operator input.
    pub fn parse_localized(s: &str) -> Result<Self, DatabaseError> {
        let upper = s.trim().to_uppercase();
        let canonical = match upper.as_str() {
            "BAIXA" | "BAIXO" => "LOW",
            "MÉDIA" | "MÉDIO" | "MEDIA" | "MEDIO" => "MEDIUM",
            "ALTA" | "ALTO" => "HIGH",
            "CRÍTICA" | "CRÍTICO" | "CRITICA" | "CRITICO" => "CRITICAL",
            other => other,
        };
        canonical.parse().map_err(|_| DatabaseError::InvalidEnum {
            field: "Priority".into(),
            value: s.into(),
        })
    }

    /// Tiers that also page the care team.
    pub fn requires_team_alert(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn classification_round_trips_canonical_names() {
        for c in Classification::ALL {
            assert_eq!(Classification::from_str(c.as_str()).unwrap(), *c);
        }
    }

    #[test]
    fn classification_rejects_unknown_label() {
        let err = Classification::parse_loose("FLU").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { ref field, .. } if field == "Classification"));
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(Classification::parse_loose(" pneumonia ").unwrap(), Classification::Pneumonia);
    }

    #[test]
    fn priority_accepts_localized_synonyms() {
        assert_eq!(Priority::parse_localized("baixa").unwrap(), Priority::Low);
        assert_eq!(Priority::parse_localized("Média").unwrap(), Priority::Medium);
        assert_eq!(Priority::parse_localized("ALTO").unwrap(), Priority::High);
        assert_eq!(Priority::parse_localized("crítica").unwrap(), Priority::Critical);
        assert_eq!(Priority::parse_localized("critical").unwrap(), Priority::Critical);
    }

    #[test]
    fn priority_rejects_unknown_tier() {
        let err = Priority::parse_localized("URGENT").unwrap_err();
        match err {
            DatabaseError::InvalidEnum { field, value } => {
                assert_eq!(field, "Priority");
                assert_eq!(value, "URGENT");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn priority_order_is_severity_order() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Critical);
    }

    #[test]
    fn serde_uses_canonical_strings() {
        assert_eq!(serde_json::to_string(&Priority::Critical).unwrap(), "\"CRITICAL\"");
        assert_eq!(serde_json::to_string(&Channel::Alert).unwrap(), "\"alert\"");
    }
}
