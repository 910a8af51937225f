use crate::repository::{RemoteCounterField, RemoteSetField, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} out of range: {v}")))
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn parse_set_field(s: &str) -> Result<RemoteSetField, StorageError> {
    match s {
        "lessons_completed" => Ok(RemoteSetField::CompletedLessons),
        "badges" => Ok(RemoteSetField::EarnedBadges),
        _ => Err(StorageError::Serialization(format!("invalid set field: {s}"))),
    }
}

/// Column backing a counter field. Column names cannot be bound as
/// parameters, so this is the only place they are spelled out.
pub(crate) fn counter_column(field: RemoteCounterField) -> &'static str {
    match field {
        RemoteCounterField::TotalPoints => "points",
        RemoteCounterField::Streak => "streak_days",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_field_names_round_trip() {
        for field in [RemoteSetField::CompletedLessons, RemoteSetField::EarnedBadges] {
            assert_eq!(parse_set_field(field.as_str()).unwrap(), field);
        }
        assert!(parse_set_field("scores").is_err());
    }

    #[test]
    fn negative_counters_are_rejected() {
        assert!(u64_from_i64("points", -1).is_err());
        assert_eq!(u32_from_i64("streak_days", 4).unwrap(), 4);
    }
}
