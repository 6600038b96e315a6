//! Stateless per-entity repositories — every method takes `&Connection`.

pub mod conversation;
pub mod event;
pub mod history;
pub mod insight;
pub mod issue;
pub mod subject;

/// Build a `rusqlite` conversion error for an unrecognized stored enum value.
pub(crate) fn invalid_text(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unrecognized stored value: {value}").into(),
    )
}
