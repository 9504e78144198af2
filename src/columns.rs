use crate::config::ColumnMapping;
use crate::error::{PipelineError, Result};

const DATE_HINT: &str = "date";
const NAME_HINT: &str = "name";
const SESSION_HINT: &str = "group session";

/// Header positions for the three roles the pipeline needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub date: usize,
    pub name: usize,
    pub session: usize,
}

/// Resolves each role from an explicit mapping when given, otherwise the first
/// header containing the role's hint wins. Matching is case-insensitive.
pub fn resolve(headers: &[&str], mapping: &ColumnMapping) -> Result<ResolvedColumns> {
    let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

    let date = find(&lowered, mapping.date.as_deref(), DATE_HINT);
    let name = find(&lowered, mapping.name.as_deref(), NAME_HINT);
    let session = find(&lowered, mapping.session.as_deref(), SESSION_HINT);

    match (date, name, session) {
        (Some(date), Some(name), Some(session)) => Ok(ResolvedColumns {
            date,
            name,
            session,
        }),
        _ => {
            let mut roles = Vec::new();
            if date.is_none() {
                roles.push("date");
            }
            if name.is_none() {
                roles.push("name");
            }
            if session.is_none() {
                roles.push("group session");
            }
            Err(PipelineError::MissingColumn { roles })
        }
    }
}

fn find(lowered: &[String], explicit: Option<&str>, hint: &str) -> Option<usize> {
    match explicit {
        Some(header) => {
            let wanted = header.trim().to_lowercase();
            lowered.iter().position(|h| *h == wanted)
        }
        None => lowered.iter().position(|h| h.contains(hint)),
    }
}
