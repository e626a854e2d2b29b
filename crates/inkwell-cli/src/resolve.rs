//! Resolve the entry ids typed on the command line
//!
//! Users rarely type a full UUID. Any unambiguous prefix of the id, or a
//! suffix such as the short form printed by `list`, picks an entry.

use std::collections::BTreeSet;

use thiserror::Error;

use inkwell_core::DiaryId;

/// Minimum characters a partial id must have
pub const MIN_QUERY_LEN: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no entry matches '{0}'")]
    NotFound(String),

    #[error("'{query}' matches {count} entries, type more characters")]
    Ambiguous { query: String, count: usize },

    #[error("'{0}' is too short, type at least {min} characters", min = MIN_QUERY_LEN)]
    TooShort(String),
}

/// Pick the single candidate matching `query`
pub fn resolve_diary_id(
    query: &str,
    candidates: impl IntoIterator<Item = DiaryId>,
) -> Result<DiaryId, ResolveError> {
    let candidates: BTreeSet<DiaryId> = candidates.into_iter().collect();

    if let Ok(id) = query.parse::<DiaryId>() {
        return if candidates.contains(&id) {
            Ok(id)
        } else {
            Err(ResolveError::NotFound(query.to_string()))
        };
    }

    let needle: String = query
        .trim()
        .chars()
        .filter(|c| *c != '-')
        .collect::<String>()
        .to_ascii_lowercase();
    if needle.len() < MIN_QUERY_LEN {
        return Err(ResolveError::TooShort(query.to_string()));
    }

    let matches: Vec<DiaryId> = candidates
        .into_iter()
        .filter(|id| {
            let simple = id.to_string().replace('-', "");
            simple.starts_with(&needle) || simple.ends_with(&needle)
        })
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(ResolveError::NotFound(query.to_string())),
        _ => Err(ResolveError::Ambiguous {
            query: query.to_string(),
            count: matches.len(),
        }),
    }
}
