use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing an identifier from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to parse {kind} from {raw:?}")]
pub struct ParseIdError {
    kind: &'static str,
    raw: String,
}

fn non_blank(kind: &'static str, raw: &str) -> Result<String, ParseIdError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseIdError {
            kind,
            raw: raw.to_owned(),
        });
    }
    Ok(trimmed.to_owned())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                non_blank(stringify!($name), s).map(Self)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a lesson in the curriculum graph.
    LessonId
);
string_id!(
    /// Identifier of a curriculum module.
    ModuleId
);
string_id!(
    /// Identifier of a static badge definition.
    BadgeId
);
string_id!(
    /// Learner identity as known to the remote service.
    UserId
);

const LOCAL_USER: &str = "local-user";

impl UserId {
    /// Sentinel used when no identity session exists.
    #[must_use]
    pub fn local() -> Self {
        Self::new(LOCAL_USER)
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0 == LOCAL_USER
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_id_display() {
        let id = LessonId::new("email-1");
        assert_eq!(id.to_string(), "email-1");
    }

    #[test]
    fn from_str_trims_input() {
        let id: BadgeId = "  first-steps ".parse().unwrap();
        assert_eq!(id, BadgeId::new("first-steps"));
    }

    #[test]
    fn from_str_rejects_blank() {
        let err = "   ".parse::<ModuleId>().unwrap_err();
        assert!(err.to_string().contains("ModuleId"));
    }

    #[test]
    fn local_user_sentinel() {
        assert!(UserId::local().is_local());
        assert!(UserId::default().is_local());
        assert!(!UserId::new("learner-7").is_local());
    }

    #[test]
    fn ids_convert_from_owned_strings() {
        let module = ModuleId::new("web-search");
        let badge: BadgeId = format!("module-{module}").into();
        assert_eq!(badge.as_str(), "module-web-search");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&LessonId::new("search-2")).unwrap();
        assert_eq!(json, "\"search-2\"");
    }
}
