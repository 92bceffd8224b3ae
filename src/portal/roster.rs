//! Assignee roster parsing.
//!
//! The roster endpoint returns a JSON array (occasionally wrapped in
//! `{"members": [...]}` or `{"data": [...]}`) whose rows use whichever key
//! names the SPA version of the day emits.

use serde_json::Value;

use crate::error::PortalError;
use crate::types::DirectoryEntry;

/// Parse a roster body into directory entries. Rows without an account id
/// are dropped; rows are returned in portal order.
pub fn parse_roster(body: &str) -> Result<Vec<DirectoryEntry>, PortalError> {
    let json: Value = serde_json::from_str(body)?;
    let rows = match &json {
        Value::Array(rows) => rows,
        Value::Object(obj) => ["members", "data", "assignees"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
            .ok_or_else(|| PortalError::Decode("roster object has no row list".to_string()))?,
        _ => return Err(PortalError::Decode("roster is not a list".to_string())),
    };

    Ok(rows.iter().filter_map(parse_row).collect())
}

fn parse_row(row: &Value) -> Option<DirectoryEntry> {
    let account_id = id_field(row, &["id", "memberId", "member_id"])?;
    let name = text_field(row, &["name", "memberName"]).unwrap_or_else(|| {
        let first = text_field(row, &["firstName"]).unwrap_or_default();
        let last = text_field(row, &["lastName"]).unwrap_or_default();
        format!("{} {}", first, last).trim().to_string()
    });
    let email = text_field(row, &["email", "emailAddress"]);
    let phone = text_field(row, &["phone", "phoneNumber", "mobilePhone"]);

    Some(DirectoryEntry::new(
        &account_id,
        &name,
        email.as_deref(),
        phone.as_deref(),
    ))
}

/// First non-empty string among `keys`.
pub(crate) fn text_field(row: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        row.get(*k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

/// Account ids arrive as numbers or numeric strings.
pub(crate) fn id_field(row: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match row.get(*k)? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}
