//! Attendee-search candidate parsing.
//!
//! The search endpoint answers with either a JSON array of people or the
//! HTML fragment the calendar picker renders, where each `<li class="person">`
//! carries its record as JSON in a hidden `<input class="data" value="...">`.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::roster::{id_field, text_field};

/// A person returned by a targeted portal search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCandidate {
    pub account_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Parse a search response body. Unrecognized bodies yield no candidates.
pub fn parse_candidates(body: &str) -> Vec<SearchCandidate> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return parse_json_candidates(trimmed);
    }
    parse_html_candidates(body)
}

fn parse_json_candidates(body: &str) -> Vec<SearchCandidate> {
    let json: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("attendee-search returned undecodable JSON: {}", e);
            return Vec::new();
        }
    };
    let rows = match &json {
        Value::Array(rows) => rows.as_slice(),
        Value::Object(obj) => obj
            .get("results")
            .or_else(|| obj.get("data"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    };
    rows.iter().filter_map(candidate_from_json).collect()
}

fn candidate_from_json(row: &Value) -> Option<SearchCandidate> {
    let account_id = id_field(row, &["id", "memberId", "userId"])?;
    let name = text_field(row, &["name", "fullName"]).unwrap_or_else(|| {
        let first = text_field(row, &["firstName"]).unwrap_or_default();
        let last = text_field(row, &["lastName"]).unwrap_or_default();
        format!("{} {}", first, last).trim().to_string()
    });
    Some(SearchCandidate {
        account_id,
        name,
        email: text_field(row, &["email", "emailAddress"]),
        phone: text_field(row, &["phone", "phoneNumber", "mobilePhone"]),
    })
}

fn person_item_regex() -> &'static Regex {
    static PERSON_RE: OnceLock<Regex> = OnceLock::new();
    PERSON_RE.get_or_init(|| {
        Regex::new(r#"(?is)<li\b([^>]*\bclass\s*=\s*["'][^"']*\bperson\b[^"']*["'][^>]*)>(.*?)</li>"#)
            .expect("person item regex should compile")
    })
}

fn data_input_regex() -> &'static Regex {
    static DATA_RE: OnceLock<Regex> = OnceLock::new();
    DATA_RE.get_or_init(|| {
        Regex::new(r#"(?is)<input\b[^>]*\bclass\s*=\s*["'][^"']*\bdata\b[^"']*["'][^>]*\bvalue\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("data input regex should compile")
    })
}

fn li_id_regex() -> &'static Regex {
    static LI_ID_RE: OnceLock<Regex> = OnceLock::new();
    LI_ID_RE.get_or_init(|| {
        Regex::new(r#"(?i)\bid\s*=\s*["'](\d+)["']"#).expect("li id regex should compile")
    })
}

fn tag_regex() -> &'static Regex {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    TAG_RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex should compile"))
}

fn parse_html_candidates(body: &str) -> Vec<SearchCandidate> {
    let mut out = Vec::new();
    for item in person_item_regex().captures_iter(body) {
        let attrs = item.get(1).map_or("", |m| m.as_str());
        let inner = item.get(2).map_or("", |m| m.as_str());

        let from_data = data_input_regex()
            .captures(inner)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .and_then(|m| serde_json::from_str::<Value>(&decode_entities(m.as_str())).ok())
            .and_then(|v| candidate_from_json(&v));

        if let Some(candidate) = from_data {
            out.push(candidate);
            continue;
        }

        // No embedded record: fall back to the li id and its visible text
        let Some(account_id) = li_id_regex()
            .captures(attrs)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        else {
            continue;
        };
        let visible = decode_entities(&tag_regex().replace_all(inner, " "));
        out.push(SearchCandidate {
            account_id,
            name: visible.split_whitespace().collect::<Vec<_>>().join(" "),
            email: None,
            phone: None,
        });
    }
    out
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
