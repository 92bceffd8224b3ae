//! Funding classification of a billing snapshot.
//!
//! Pure and deterministic. An invoice is past due only when its status text
//! is "Delinquent" or "Pay Now" (case-insensitive); "Paid" and anything
//! unrecognized never contribute. A bare "Past Due" string is Unfunded even
//! when no amount came with it, so string-only snapshots never read as Funded.
//! The same holds for an account-level past-due status or flag sent alongside
//! agreements.

use serde::Serialize;

use super::snapshot::{parse_amount, AccountBilling, Agreement, BillingSnapshot, Invoice};
use crate::normalize::title_case;
use crate::types::{DisplayClass, FundingCategory};

const PAST_DUE_INVOICE_STATUSES: &[&str] = &["delinquent", "pay now"];
const GOOD_STANDING: &[&str] = &["current", "active", "in good standing"];

pub const ICON_FUNDED: &str = "fas fa-check-circle";
pub const ICON_UNFUNDED: &str = "fas fa-exclamation-triangle";
pub const ICON_PARTIAL: &str = "fas fa-hourglass-half";
pub const ICON_UNKNOWN: &str = "fas fa-question-circle";

/// Display-ready outcome of classifying one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub amount_owed: f64,
    pub category: FundingCategory,
    pub display_text: String,
    pub display_class: DisplayClass,
    pub display_icon: String,
    pub contributing_invoices: Vec<String>,
}

impl Classification {
    fn funded() -> Self {
        Self {
            amount_owed: 0.0,
            category: FundingCategory::Funded,
            display_text: "Current".to_string(),
            display_class: DisplayClass::Success,
            display_icon: ICON_FUNDED.to_string(),
            contributing_invoices: Vec::new(),
        }
    }

    fn unfunded(amount_owed: f64, contributing_invoices: Vec<String>) -> Self {
        let display_text = if amount_owed > 0.0 {
            format!("Past Due - ${:.2}", amount_owed)
        } else {
            "Past Due".to_string()
        };
        Self {
            amount_owed,
            category: FundingCategory::Unfunded,
            display_text,
            display_class: DisplayClass::Danger,
            display_icon: ICON_UNFUNDED.to_string(),
            contributing_invoices,
        }
    }

    fn partial() -> Self {
        Self {
            amount_owed: 0.0,
            category: FundingCategory::Partial,
            display_text: "Active - No Sessions Remaining".to_string(),
            display_class: DisplayClass::Warning,
            display_icon: ICON_PARTIAL.to_string(),
            contributing_invoices: Vec::new(),
        }
    }

    fn unknown(display_text: String) -> Self {
        Self {
            amount_owed: 0.0,
            category: FundingCategory::Unknown,
            display_text,
            display_class: DisplayClass::Secondary,
            display_icon: ICON_UNKNOWN.to_string(),
            contributing_invoices: Vec::new(),
        }
    }
}

/// Classify a billing snapshot.
pub fn classify(snapshot: &BillingSnapshot) -> Classification {
    match snapshot {
        BillingSnapshot::Status { text, amount_due } => classify_status(text, *amount_due),
        BillingSnapshot::Agreements(billing) => classify_agreements(billing),
        BillingSnapshot::Unrecognized { .. } => Classification::unknown("Status Unknown".to_string()),
    }
}

fn classify_status(text: &str, amount_due: Option<f64>) -> Classification {
    match text.trim().to_lowercase().as_str() {
        "current" => Classification::funded(),
        "past due" => {
            let amount = round_cents(amount_due.unwrap_or(0.0).max(0.0));
            Classification::unfunded(amount, Vec::new())
        }
        "" => Classification::unknown("Status Unknown".to_string()),
        _ => Classification::unknown(title_case(text)),
    }
}

fn classify_agreements(billing: &AccountBilling) -> Classification {
    let (invoice_sum, contributing) = past_due_total(&billing.agreements);
    // Account-level past-due standing outranks any agreement status.
    let account_past_due = billing.past_due_flag == Some(true)
        || billing.standing.as_deref().is_some_and(is_past_due_standing);
    if account_past_due {
        let amount = round_cents(invoice_sum.max(billing.amount_due.unwrap_or(0.0)));
        return Classification::unfunded(amount, contributing);
    }
    if invoice_sum > 0.0 {
        return Classification::unfunded(invoice_sum, contributing);
    }

    let account_current = billing.current_flag == Some(true)
        || billing.standing.as_deref().is_some_and(is_good_standing);
    let active: Vec<&Agreement> = billing
        .agreements
        .iter()
        .filter(|a| a.status.as_deref().is_some_and(is_good_standing))
        .collect();

    if !account_current && active.is_empty() {
        return Classification::unknown("Status Unknown".to_string());
    }

    // Entitlement signal: every active agreement that reports a session
    // count reports zero.
    let considered: Vec<&Agreement> = if active.is_empty() {
        billing.agreements.iter().collect()
    } else {
        active
    };
    let session_counts: Vec<i64> = considered
        .iter()
        .filter_map(|a| a.sessions_remaining)
        .collect();
    if !session_counts.is_empty() && session_counts.iter().all(|n| *n <= 0) {
        return Classification::partial();
    }

    Classification::funded()
}

/// Sum of past-due invoice amounts across all agreements, in cents precision,
/// with the ids of the invoices that contributed.
pub fn past_due_total(agreements: &[Agreement]) -> (f64, Vec<String>) {
    let mut total = 0.0;
    let mut contributing = Vec::new();
    for invoice in agreements.iter().flat_map(|a| a.invoices.iter()) {
        if !is_past_due_invoice(invoice) {
            continue;
        }
        let amount = invoice_amount(invoice);
        if amount <= 0.0 {
            continue;
        }
        total += amount;
        if let Some(id) = &invoice.id {
            contributing.push(id.clone());
        }
    }
    (round_cents(total), contributing)
}

fn is_past_due_invoice(invoice: &Invoice) -> bool {
    invoice
        .status
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .is_some_and(|s| PAST_DUE_INVOICE_STATUSES.contains(&s.as_str()))
}

/// First positive amount among `invoice_total`, `remainingTotal`, `total`.
fn invoice_amount(invoice: &Invoice) -> f64 {
    [&invoice.invoice_total, &invoice.remaining_total, &invoice.total]
        .into_iter()
        .flatten()
        .map(parse_amount)
        .find(|v| *v > 0.0)
        .unwrap_or(0.0)
}

fn is_past_due_standing(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("past due")
}

fn is_good_standing(text: &str) -> bool {
    GOOD_STANDING.contains(&text.trim().to_lowercase().as_str())
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(value: serde_json::Value) -> BillingSnapshot {
        BillingSnapshot::from_json(&value)
    }

    #[test]
    fn test_past_due_sum_mixed_statuses() {
        let snap = snapshot(json!({
            "agreements": [{
                "id": 1,
                "invoices": [
                    {"id": "a", "status": "Delinquent", "invoice_total": "$25.00"},
                    {"id": "b", "status": "Paid", "invoice_total": "100"},
                    {"id": "c", "status": "Pay Now", "remainingTotal": 15}
                ]
            }]
        }));
        let c = classify(&snap);
        assert_eq!(c.amount_owed, 40.0);
        assert_eq!(c.category, FundingCategory::Unfunded);
        assert_eq!(c.display_class, DisplayClass::Danger);
        assert_eq!(c.display_text, "Past Due - $40.00");
        assert_eq!(c.contributing_invoices, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_amount_preference_and_skips() {
        let snap = snapshot(json!({
            "agreements": [
                {"invoices": [
                    {"status": "DELINQUENT", "invoice_total": "0", "remainingTotal": "12.35", "total": 99},
                    {"status": "pay now", "invoice_total": "abc", "total": "$1,000.10"},
                    {"status": "Delinquent", "invoice_total": -4},
                    {"status": "Overdue", "invoice_total": 500},
                    {"invoice_total": 500}
                ]},
                {"invoices": [{"status": " Pay Now ", "total": 7.5}]}
            ]
        }));
        let c = classify(&snap);
        assert_eq!(c.amount_owed, 1019.95);
        assert_eq!(c.category, FundingCategory::Unfunded);
    }

    #[test]
    fn test_scheduled_payments_ignored() {
        let snap = snapshot(json!({
            "status": "Active",
            "agreements": [{
                "status": "Active",
                "invoices": [{"status": "Paid", "total": 40}],
                "scheduledPayments": [{"status": "Pay Now", "total": 40}]
            }]
        }));
        let c = classify(&snap);
        assert_eq!(c.amount_owed, 0.0);
        assert_eq!(c.category, FundingCategory::Funded);
        assert_eq!(c.display_class, DisplayClass::Success);
    }

    #[test]
    fn test_bare_strings() {
        let current = classify(&snapshot(json!("CURRENT")));
        assert_eq!(current.category, FundingCategory::Funded);
        assert_eq!(current.amount_owed, 0.0);

        let past_due = classify(&snapshot(json!("Past Due")));
        assert_eq!(past_due.category, FundingCategory::Unfunded);
        assert_eq!(past_due.amount_owed, 0.0);
        assert_eq!(past_due.display_text, "Past Due");

        let other = classify(&snapshot(json!("on HOLD")));
        assert_eq!(other.category, FundingCategory::Unknown);
        assert_eq!(other.display_text, "On Hold");
        assert_eq!(other.display_class, DisplayClass::Secondary);
    }

    #[test]
    fn test_bare_past_due_with_companion_amount() {
        let c = classify(&snapshot(json!({"status": "past due", "amountPastDue": "42.5"})));
        assert_eq!(c.category, FundingCategory::Unfunded);
        assert_eq!(c.amount_owed, 42.5);
        assert_eq!(c.display_text, "Past Due - $42.50");
    }

    #[test]
    fn test_account_past_due_status_beats_active_agreement() {
        let c = classify(&snapshot(json!({
            "status": "Past Due",
            "agreements": [{"status": "Active", "sessionsRemaining": 4, "invoices": []}]
        })));
        assert_eq!(c.category, FundingCategory::Unfunded);
        assert_eq!(c.display_text, "Past Due");
        assert_eq!(c.display_class, DisplayClass::Danger);
    }

    #[test]
    fn test_account_past_due_flag_uses_larger_amount() {
        let c = classify(&snapshot(json!({
            "isPastDue": true,
            "pastDueAmount": "60.00",
            "agreements": [{"status": "Active", "invoices": [
                {"id": "x", "status": "Delinquent", "invoice_total": 25}
            ]}]
        })));
        assert_eq!(c.category, FundingCategory::Unfunded);
        assert_eq!(c.amount_owed, 60.0);
        assert_eq!(c.display_text, "Past Due - $60.00");
        assert_eq!(c.contributing_invoices, vec!["x".to_string()]);

        let c = classify(&snapshot(json!({
            "isPastDue": true,
            "pastDueAmount": 10,
            "agreements": [{"status": "Active", "invoices": [
                {"status": "Pay Now", "invoice_total": 25}
            ]}]
        })));
        assert_eq!(c.amount_owed, 25.0);
    }

    #[test]
    fn test_zero_sessions_is_partial() {
        let c = classify(&snapshot(json!({
            "agreements": [
                {"status": "Active", "sessionsRemaining": 0, "invoices": []},
                {"status": "Expired", "sessionsRemaining": 12, "invoices": []}
            ]
        })));
        assert_eq!(c.category, FundingCategory::Partial);
        assert_eq!(c.display_class, DisplayClass::Warning);
    }

    #[test]
    fn test_active_with_sessions_is_funded() {
        let c = classify(&snapshot(json!({
            "agreements": [{"status": "Active", "sessionsRemaining": 3, "invoices": []}]
        })));
        assert_eq!(c.category, FundingCategory::Funded);
    }

    #[test]
    fn test_structured_without_standing_is_unknown() {
        let c = classify(&snapshot(json!({
            "agreements": [{"status": "Cancelled", "invoices": [{"status": "Paid", "total": 10}]}]
        })));
        assert_eq!(c.category, FundingCategory::Unknown);
        assert_eq!(c.display_class, DisplayClass::Secondary);

        let c = classify(&snapshot(json!({"agreements": []})));
        assert_eq!(c.category, FundingCategory::Unknown);
    }

    #[test]
    fn test_unrecognized_is_unknown() {
        let c = classify(&BillingSnapshot::from_body("<html>oops</html>"));
        assert_eq!(c.category, FundingCategory::Unknown);
        assert_eq!(c.display_text, "Status Unknown");
    }

    #[test]
    fn test_classification_is_deterministic() {
        let snaps = [
            snapshot(json!("Past Due")),
            snapshot(json!({"agreements": [{"invoices": [
                {"status": "Delinquent", "invoice_total": "0.1"},
                {"status": "Delinquent", "invoice_total": "0.2"}
            ]}]})),
            snapshot(json!({"isCurrent": true, "agreements": []})),
        ];
        for snap in &snaps {
            let first = classify(snap);
            for _ in 0..5 {
                assert_eq!(classify(snap), first);
            }
        }
        assert_eq!(classify(&snaps[1]).amount_owed, 0.3);
    }

    #[test]
    fn test_category_invariants_for_structured() {
        let samples = [
            json!({"agreements": [{"status": "Active", "invoices": [{"status": "Pay Now", "total": 5}]}]}),
            json!({"status": "Current", "agreements": [{"invoices": [{"status": "Paid", "total": 5}]}]}),
            json!({"agreements": [{"invoices": [{"status": "Delinquent"}]}]}),
        ];
        for sample in samples {
            let c = classify(&snapshot(sample));
            assert!(c.amount_owed >= 0.0);
            assert_eq!(c.category == FundingCategory::Unfunded, c.amount_owed > 0.0);
        }
    }
}
