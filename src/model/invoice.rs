use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::items::{Discount, LineItem, Theme, Totals};
use crate::error::{AppError, Result};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Pending,
    Sent,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 5] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Pending,
        InvoiceStatus::Sent,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        InvoiceStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::Validation(format!("unknown invoice status '{}'", s)))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LateFeeKind {
    Fixed,
    Percentage,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct LateFeePolicy {
    pub enabled: bool,
    pub kind: LateFeeKind,
    pub amount: f64,
    /// Days past the due date before a fee becomes chargeable.
    #[serde(default)]
    pub grace_period: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PaymentTerms {
    pub enabled: bool,
    pub due_days: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReminderTiming {
    Before,
    On,
    After,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReminderRule {
    pub days: i64,
    pub timing: ReminderTiming,
}

impl ReminderRule {
    /// Date on which this rule fires for an invoice due on `due_date`.
    pub fn trigger_date(&self, due_date: NaiveDate) -> NaiveDate {
        let days = chrono::Duration::days(self.days.max(0));
        match self.timing {
            ReminderTiming::Before => due_date - days,
            ReminderTiming::On => due_date,
            ReminderTiming::After => due_date + days,
        }
    }
}

impl fmt::Display for ReminderRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timing {
            ReminderTiming::On => f.write_str("on due date"),
            ReminderTiming::Before => write!(f, "{}d before", self.days),
            ReminderTiming::After => write!(f, "{}d after", self.days),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ReminderSettings {
    pub enabled: bool,
    #[serde(default)]
    pub use_system_default: bool,
    #[serde(default)]
    pub rules: Vec<ReminderRule>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Invoice {
    pub number: String,
    pub client_id: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub discount: Discount,
    /// Percent, e.g. `8.875`.
    #[serde(default)]
    pub tax_rate: f64,
    pub totals: Totals,
    pub status: InvoiceStatus,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_terms: Option<PaymentTerms>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_fees: Option<LateFeePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminders: Option<ReminderSettings>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_estimate: Option<String>,
}

impl Invoice {
    pub fn is_draft(&self) -> bool {
        self.status == InvoiceStatus::Draft
    }

    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }

    /// Move to `target`, rejecting transitions that would break the
    /// lifecycle (a draft can't be paid or overdue, a sent invoice can't
    /// return to draft).
    pub fn transition(&mut self, target: InvoiceStatus, on: NaiveDate) -> Result<()> {
        use InvoiceStatus::*;

        let allowed = match (self.status, target) {
            (from, to) if from == to => true,
            (Draft | Pending, Draft | Pending) => true,
            (Draft | Pending | Overdue, Sent) => true,
            (Pending | Sent | Overdue, Paid) => true,
            (Pending | Sent, Overdue) => true,
            (Paid, Sent | Pending) => true,
            _ => false,
        };

        if !allowed {
            return Err(AppError::InvalidTransition {
                kind: "invoice",
                id: self.number.clone(),
                status: self.status.to_string(),
                action: transition_verb(target),
            });
        }

        match target {
            Sent if self.sent_on.is_none() => self.sent_on = Some(on),
            Paid => self.paid_on = Some(on),
            _ => {}
        }
        if self.status == Paid && target != Paid {
            self.paid_on = None;
        }
        self.status = target;
        Ok(())
    }
}

fn transition_verb(target: InvoiceStatus) -> &'static str {
    match target {
        InvoiceStatus::Draft => "revert to draft",
        InvoiceStatus::Pending => "mark pending",
        InvoiceStatus::Sent => "send",
        InvoiceStatus::Paid => "mark paid",
        InvoiceStatus::Overdue => "mark overdue",
    }
}

/// Fields the caller supplies when creating or replacing an invoice.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub client_id: String,
    pub issue_date: NaiveDate,
    /// Falls back to payment terms, then to the business default.
    pub due_date: Option<NaiveDate>,
    pub items: Vec<LineItem>,
    pub discount: Discount,
    pub tax_rate: Option<f64>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub payment_terms: Option<PaymentTerms>,
    pub late_fees: Option<LateFeePolicy>,
    pub reminders: Option<ReminderSettings>,
    pub theme: Option<Theme>,
    pub status: InvoiceStatus,
}

impl InvoiceDraft {
    pub fn new(client_id: impl Into<String>, issue_date: NaiveDate, items: Vec<LineItem>) -> Self {
        Self {
            client_id: client_id.into(),
            issue_date,
            due_date: None,
            items,
            discount: Discount::None,
            tax_rate: None,
            currency: None,
            notes: None,
            payment_terms: None,
            late_fees: None,
            reminders: None,
            theme: None,
            status: InvoiceStatus::Draft,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn invoice(status: InvoiceStatus) -> Invoice {
        Invoice {
            number: "INV20250101-01".into(),
            client_id: "acme".into(),
            issue_date: date(2025, 1, 1),
            due_date: date(2025, 1, 31),
            items: vec![LineItem::new("Work", 1.0, 100.0)],
            discount: Discount::None,
            tax_rate: 0.0,
            totals: Totals { subtotal: 100.0, discount: 0.0, tax: 0.0, total: 100.0 },
            status,
            currency: "USD".into(),
            notes: None,
            payment_terms: None,
            late_fees: None,
            reminders: None,
            theme: Theme::default(),
            sent_on: None,
            paid_on: None,
            source_estimate: None,
        }
    }

    #[test]
    fn draft_cannot_be_paid_or_overdue() {
        let mut inv = invoice(InvoiceStatus::Draft);
        assert!(inv.transition(InvoiceStatus::Paid, date(2025, 2, 1)).is_err());
        assert!(inv.transition(InvoiceStatus::Overdue, date(2025, 2, 1)).is_err());
        assert_eq!(inv.status, InvoiceStatus::Draft);
    }

    #[test]
    fn send_then_pay_then_unpay() {
        let mut inv = invoice(InvoiceStatus::Draft);
        inv.transition(InvoiceStatus::Sent, date(2025, 1, 2)).unwrap();
        assert_eq!(inv.sent_on, Some(date(2025, 1, 2)));

        inv.transition(InvoiceStatus::Paid, date(2025, 1, 20)).unwrap();
        assert_eq!(inv.paid_on, Some(date(2025, 1, 20)));

        inv.transition(InvoiceStatus::Sent, date(2025, 1, 21)).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Sent);
        assert_eq!(inv.paid_on, None);
        assert_eq!(inv.sent_on, Some(date(2025, 1, 2)));
    }

    #[test]
    fn sent_cannot_return_to_draft() {
        let mut inv = invoice(InvoiceStatus::Sent);
        let err = inv.transition(InvoiceStatus::Draft, date(2025, 1, 2)).unwrap_err();
        assert!(err.to_string().contains("revert to draft"));
    }

    #[test]
    fn reminder_rule_trigger_dates() {
        let due = date(2025, 3, 10);
        let before = ReminderRule { days: 3, timing: ReminderTiming::Before };
        let on = ReminderRule { days: 9, timing: ReminderTiming::On };
        let after = ReminderRule { days: 7, timing: ReminderTiming::After };
        assert_eq!(before.trigger_date(due), date(2025, 3, 7));
        assert_eq!(on.trigger_date(due), due);
        assert_eq!(after.trigger_date(due), date(2025, 3, 17));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("PAID".parse::<InvoiceStatus>().unwrap(), InvoiceStatus::Paid);
        assert!("void".parse::<InvoiceStatus>().is_err());
    }
}
