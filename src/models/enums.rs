use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
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

str_enum!(Role {
    Admin => "ADMIN",
    Doctor => "DOCTOR",
    Patient => "PATIENT",
});

str_enum!(QuestionType {
    Boolean => "BOOLEAN",
    Text => "TEXT",
    SingleChoice => "SINGLE_CHOICE",
    MultipleChoice => "MULTIPLE_CHOICE",
    Event => "EVENT",
});

impl QuestionType {
    /// Only choice questions carry options; every other type must not.
    pub fn supports_options(&self) -> bool {
        matches!(self, Self::SingleChoice | Self::MultipleChoice)
    }
}

str_enum!(TimelineItemType {
    Box => "box",
    Point => "point",
    Range => "range",
    Background => "background",
});
