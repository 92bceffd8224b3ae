//! Portal billing payloads, normalized into one variant type.
//!
//! Observed shapes from `/api/billing/member/{id}/billing_status`:
//! - a bare JSON string (`"Current"`, `"Past Due"`, ...) or the same as plain text
//! - a status object: `status` plus companion amount keys and boolean flags
//! - an agreement graph: `agreements[]`, each with `invoices` either inline or
//!   under an `include` wrapper; a single agreement may also be returned at the
//!   top level
//!
//! `scheduledPayments` are future charges and are never read.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::portal::roster::{id_field, text_field};

/// Longest plain-text body still accepted as a status word.
const MAX_PLAIN_STATUS_LEN: usize = 64;

const STATUS_KEYS: &[&str] = &["status", "paymentStatus", "billingStatus"];
const AMOUNT_DUE_KEYS: &[&str] = &[
    "pastDueAmount",
    "amountPastDue",
    "past_due_amount",
    "balanceDue",
    "amount_due",
];
const SESSIONS_KEYS: &[&str] = &["sessionsRemaining", "remainingSessions", "sessions_remaining"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum BillingSnapshot {
    /// Bare status text, with a companion amount when the portal sent one.
    Status {
        text: String,
        amount_due: Option<f64>,
    },
    Agreements(AccountBilling),
    /// Body present but in no recognized shape.
    Unrecognized { reason: String },
}

/// Structured billing for one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBilling {
    /// Account-level status text, if the payload carried one.
    pub standing: Option<String>,
    /// Account-level `isCurrent`/`current` flag.
    pub current_flag: Option<bool>,
    /// Account-level `isPastDue`/`pastDue` flag.
    pub past_due_flag: Option<bool>,
    /// Largest account-level companion amount (`pastDueAmount`, ...).
    pub amount_due: Option<f64>,
    pub agreements: Vec<Agreement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Agreement {
    pub id: Option<String>,
    pub status: Option<String>,
    pub sessions_remaining: Option<i64>,
    pub invoices: Vec<Invoice>,
}

/// A realized invoice. Amount fields are kept as the portal sent them
/// (numbers, or strings like `"$1,024.50"`) and parsed at classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Option<String>,
    pub status: Option<String>,
    pub invoice_total: Option<Value>,
    pub remaining_total: Option<Value>,
    pub total: Option<Value>,
}

impl BillingSnapshot {
    /// Normalize a raw response body. Never fails: unreadable bodies become
    /// `Unrecognized`.
    pub fn from_body(body: &str) -> Self {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Self::unrecognized("empty body");
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(json) => Self::from_json(&json),
            Err(_) => Self::from_plain_text(trimmed),
        }
    }

    pub fn from_json(json: &Value) -> Self {
        match json {
            Value::String(text) if !text.trim().is_empty() => BillingSnapshot::Status {
                text: text.trim().to_string(),
                amount_due: None,
            },
            Value::Object(obj) => Self::from_object(obj),
            other => Self::unrecognized(&format!("unexpected JSON {}", json_kind(other))),
        }
    }

    fn from_plain_text(text: &str) -> Self {
        if text.len() > MAX_PLAIN_STATUS_LEN || text.contains('<') {
            return Self::unrecognized("non-JSON body");
        }
        BillingSnapshot::Status {
            text: text.trim_matches('"').trim().to_string(),
            amount_due: None,
        }
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        let root = Value::Object(obj.clone());
        let standing = text_field(&root, STATUS_KEYS);
        let current_flag = bool_field(&root, &["isCurrent", "current"]);
        let past_due_flag = bool_field(&root, &["isPastDue", "pastDue"]);
        let amount_due = AMOUNT_DUE_KEYS
            .iter()
            .filter_map(|k| obj.get(*k))
            .map(parse_amount)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

        let agreement_list = ["agreements", "packageAgreements"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array));
        if let Some(list) = agreement_list {
            return BillingSnapshot::Agreements(AccountBilling {
                standing,
                current_flag,
                past_due_flag,
                amount_due,
                agreements: list.iter().filter_map(parse_agreement).collect(),
            });
        }

        if invoice_list(&root).is_some() {
            return BillingSnapshot::Agreements(AccountBilling {
                standing,
                current_flag,
                past_due_flag,
                amount_due,
                agreements: parse_agreement(&root).into_iter().collect(),
            });
        }

        let text = match (past_due_flag, current_flag, standing) {
            (Some(true), _, _) => "Past Due".to_string(),
            (_, _, Some(text)) => text,
            (_, Some(true), None) => "Current".to_string(),
            _ if amount_due.is_some_and(|a| a > 0.0) => "Past Due".to_string(),
            _ => return Self::unrecognized("object without status or agreements"),
        };
        BillingSnapshot::Status { text, amount_due }
    }

    fn unrecognized(reason: &str) -> Self {
        BillingSnapshot::Unrecognized {
            reason: reason.to_string(),
        }
    }
}

fn parse_agreement(value: &Value) -> Option<Agreement> {
    if !value.is_object() {
        return None;
    }
    // V2 agreement payloads put the record fields under `data`
    let record = value.get("data").filter(|d| d.is_object()).unwrap_or(value);

    let invoices = invoice_list(value)
        .or_else(|| invoice_list(record))
        .map(|list| list.iter().filter_map(parse_invoice).collect())
        .unwrap_or_default();

    Some(Agreement {
        id: id_field(record, &["id", "agreementId", "agreement_id"]),
        status: text_field(record, &["status", "agreementStatus"]),
        sessions_remaining: integer_field(record, SESSIONS_KEYS),
        invoices,
    })
}

/// Invoices inline or under `include`; both shapes are equivalent.
fn invoice_list(value: &Value) -> Option<&Vec<Value>> {
    value
        .get("include")
        .and_then(|inc| inc.get("invoices"))
        .and_then(Value::as_array)
        .or_else(|| value.get("invoices").and_then(Value::as_array))
}

fn parse_invoice(value: &Value) -> Option<Invoice> {
    if !value.is_object() {
        return None;
    }
    Some(Invoice {
        id: id_field(value, &["id", "invoiceId"]),
        status: value
            .get("status")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string()),
        invoice_total: value.get("invoice_total").cloned(),
        remaining_total: value.get("remainingTotal").cloned(),
        total: value.get("total").cloned(),
    })
}

/// Parse a portal amount. Numbers pass through; strings lose currency
/// symbols, commas, and whitespace. Anything unparseable, non-finite, or
/// negative is 0.
pub fn parse_amount(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' ' | '\u{a0}'))
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

fn bool_field(value: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| value.get(*k).and_then(Value::as_bool))
}

fn integer_field(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| match value.get(*k)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
