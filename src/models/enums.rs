use serde::{Deserialize, Serialize};

/// Error for a string that names no variant of a `str_enum!` type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field} value: {value}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
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
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

// Wire values of the prediction contract's `type` field.
str_enum!(RelationshipType {
    Father => "Father",
    Mother => "Mother",
    Sibling => "Sibling",
});

impl RelationshipType {
    /// Emission order in the request payload.
    pub const ALL: [RelationshipType; 3] = [Self::Father, Self::Mother, Self::Sibling];

    /// Prefix of the deterministic relative id (`father-<rootId>`).
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Father => "father",
            Self::Mother => "mother",
            Self::Sibling => "sibling",
        }
    }
}

str_enum!(SiblingKind {
    Brother => "brother",
    Sister => "sister",
});

str_enum!(RiskTier {
    Low => "Low",
    Moderate => "Moderate",
    High => "High",
});

impl RiskTier {
    /// Colour key the frontend maps to its palette.
    pub fn color(&self) -> &'static str {
        match self {
            Self::High => "red",
            Self::Moderate => "yellow",
            Self::Low => "green",
        }
    }
}

str_enum!(Gender {
    Male => "male",
    Female => "female",
    Other => "other",
});

/// Family-history classification result. `Unknown` never reaches the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipCategory {
    Known(RelationshipType),
    Unknown,
}

impl RelationshipCategory {
    pub fn known(&self) -> Option<RelationshipType> {
        match self {
            Self::Known(kind) => Some(*kind),
            Self::Unknown => None,
        }
    }
}

impl From<SiblingKind> for RelationshipType {
    fn from(_: SiblingKind) -> Self {
        RelationshipType::Sibling
    }
}
