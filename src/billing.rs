//! Monetary and due-date derivations for invoices.
//!
//! Everything here is pure: callers pass `today` explicitly so the same
//! functions back the CLI, the reminder run and the tests.

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{
    Discount, Invoice, InvoiceStatus, LateFeeKind, LateFeePolicy, LineItem, Payment,
    ReminderStatus, Totals,
};
use crate::money::round_cents;

/// Subtotal, discount, tax and grand total for a set of line items.
///
/// A fixed discount never exceeds the subtotal; tax applies to the
/// discounted amount.
pub fn compute_totals(items: &[LineItem], discount: Discount, tax_rate: f64) -> Totals {
    let subtotal = round_cents(items.iter().map(LineItem::amount).sum());
    let discount = match discount {
        Discount::None => 0.0,
        Discount::Percentage(pct) => round_cents(subtotal * pct.clamp(0.0, 100.0) / 100.0),
        Discount::Fixed(amount) => round_cents(amount.clamp(0.0, subtotal)),
    };
    let taxable = subtotal - discount;
    let tax = round_cents(taxable * tax_rate.max(0.0) / 100.0);

    Totals {
        subtotal,
        discount,
        tax,
        total: round_cents(taxable + tax),
    }
}

/// Whole days past the due date. A draft is never overdue.
pub fn overdue_days(invoice: &Invoice, today: NaiveDate) -> i64 {
    if invoice.is_draft() {
        return 0;
    }
    (today - invoice.due_date).num_days().max(0)
}

/// Status as the user should see it: unpaid, non-draft invoices past their
/// due date read as overdue.
pub fn effective_status(invoice: &Invoice, today: NaiveDate) -> InvoiceStatus {
    if matches!(invoice.status, InvoiceStatus::Draft | InvoiceStatus::Paid) {
        invoice.status
    } else if overdue_days(invoice, today) > 0 {
        InvoiceStatus::Overdue
    } else if invoice.status == InvoiceStatus::Overdue {
        // Marked overdue by hand but the due date moved out.
        InvoiceStatus::Sent
    } else {
        invoice.status
    }
}

/// Chargeable late fee for `base` once `overdue_days` exceeds the grace
/// period.
pub fn late_fee(policy: Option<&LateFeePolicy>, base: f64, overdue_days: i64) -> f64 {
    let Some(policy) = policy.filter(|p| p.enabled) else {
        return 0.0;
    };
    if overdue_days - policy.grace_period <= 0 {
        return 0.0;
    }
    match policy.kind {
        LateFeeKind::Fixed => round_cents(policy.amount),
        LateFeeKind::Percentage => round_cents(base * policy.amount / 100.0),
    }
}

pub fn total_paid(payments: &[Payment]) -> f64 {
    round_cents(payments.iter().map(|p| p.amount).sum())
}

pub fn remaining_balance(invoice: &Invoice, paid: f64) -> f64 {
    round_cents((invoice.totals.total - paid).max(0.0))
}

/// Amount a reminder bills against: the remaining balance while a reminder
/// is still scheduled and part of the invoice has been paid, otherwise the
/// full total.
pub fn base_amount(invoice: &Invoice, paid: f64, reminder_status: Option<ReminderStatus>) -> f64 {
    if reminder_status == Some(ReminderStatus::Scheduled) && paid > 0.0 {
        remaining_balance(invoice, paid)
    } else {
        invoice.totals.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Payable {
    pub overdue_days: i64,
    pub base_amount: f64,
    pub late_fee: f64,
    pub total_payable: f64,
}

pub fn payable(
    invoice: &Invoice,
    paid: f64,
    reminder_status: Option<ReminderStatus>,
    today: NaiveDate,
) -> Payable {
    payable_on(invoice, base_amount(invoice, paid, reminder_status), today)
}

/// What the client owes today: the remaining balance plus the late fee on
/// it. Every document and email sent to the client bills this amount.
pub fn balance_due(invoice: &Invoice, paid: f64, today: NaiveDate) -> Payable {
    payable_on(invoice, remaining_balance(invoice, paid), today)
}

fn payable_on(invoice: &Invoice, base: f64, today: NaiveDate) -> Payable {
    let overdue = overdue_days(invoice, today);
    let fee = late_fee(invoice.late_fees.as_ref(), base, overdue);

    Payable {
        overdue_days: overdue,
        base_amount: base,
        late_fee: fee,
        total_payable: round_cents(base + fee),
    }
}

/// Due date from issue date plus payment terms in days.
pub fn due_date_for(issue_date: NaiveDate, terms_days: i64) -> NaiveDate {
    issue_date + chrono::Duration::days(terms_days.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Theme;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn invoice(total: f64, status: InvoiceStatus, due: NaiveDate) -> Invoice {
        let items = vec![LineItem::new("Services", 1.0, total)];
        Invoice {
            number: "INV20250101-01".into(),
            client_id: "acme".into(),
            issue_date: date(2025, 1, 1),
            due_date: due,
            totals: compute_totals(&items, Discount::None, 0.0),
            items,
            discount: Discount::None,
            tax_rate: 0.0,
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

    fn payment(amount: f64) -> Payment {
        Payment {
            id: "P1".into(),
            invoice: "INV20250101-01".into(),
            amount,
            date: date(2025, 1, 15),
            method: "bank".into(),
            reference: None,
        }
    }

    #[test]
    fn totals_apply_discount_before_tax() {
        let items = vec![LineItem::new("A", 2.0, 50.0), LineItem::new("B", 1.0, 100.0)];
        let totals = compute_totals(&items, Discount::Percentage(10.0), 8.0);
        assert_eq!(totals.subtotal, 200.0);
        assert_eq!(totals.discount, 20.0);
        assert_eq!(totals.tax, 14.4);
        assert_eq!(totals.total, 194.4);
    }

    #[test]
    fn fixed_discount_is_clamped_to_subtotal() {
        let items = vec![LineItem::new("A", 1.0, 40.0)];
        let totals = compute_totals(&items, Discount::Fixed(75.0), 10.0);
        assert_eq!(totals.discount, 40.0);
        assert_eq!(totals.total, 0.0);
    }

    #[test]
    fn overdue_days_counts_from_due_date() {
        let inv = invoice(100.0, InvoiceStatus::Sent, date(2025, 3, 1));
        assert_eq!(overdue_days(&inv, date(2025, 3, 11)), 10);
        assert_eq!(overdue_days(&inv, date(2025, 3, 1)), 0);
        assert_eq!(overdue_days(&inv, date(2025, 2, 20)), 0);
    }

    #[test]
    fn draft_is_never_overdue() {
        let inv = invoice(100.0, InvoiceStatus::Draft, date(2024, 1, 1));
        assert_eq!(overdue_days(&inv, date(2025, 1, 1)), 0);
        assert_eq!(effective_status(&inv, date(2025, 1, 1)), InvoiceStatus::Draft);
    }

    #[test]
    fn effective_status_derives_overdue() {
        let inv = invoice(100.0, InvoiceStatus::Sent, date(2025, 3, 1));
        assert_eq!(effective_status(&inv, date(2025, 3, 2)), InvoiceStatus::Overdue);
        assert_eq!(effective_status(&inv, date(2025, 3, 1)), InvoiceStatus::Sent);

        let paid = invoice(100.0, InvoiceStatus::Paid, date(2025, 3, 1));
        assert_eq!(effective_status(&paid, date(2025, 6, 1)), InvoiceStatus::Paid);
    }

    #[test]
    fn percentage_late_fee_after_grace_period() {
        let mut inv = invoice(1000.0, InvoiceStatus::Sent, date(2025, 3, 1));
        inv.late_fees = Some(LateFeePolicy {
            enabled: true,
            kind: LateFeeKind::Percentage,
            amount: 5.0,
            grace_period: 3,
        });

        let result = payable(&inv, 0.0, None, date(2025, 3, 11));
        assert_eq!(result.overdue_days, 10);
        assert_eq!(result.late_fee, 50.0);
        assert_eq!(result.total_payable, 1050.0);
    }

    #[test]
    fn no_fee_within_grace_period() {
        let policy = LateFeePolicy {
            enabled: true,
            kind: LateFeeKind::Fixed,
            amount: 25.0,
            grace_period: 5,
        };
        assert_eq!(late_fee(Some(&policy), 400.0, 5), 0.0);
        assert_eq!(late_fee(Some(&policy), 400.0, 6), 25.0);

        let disabled = LateFeePolicy { enabled: false, ..policy };
        assert_eq!(late_fee(Some(&disabled), 400.0, 60), 0.0);
        assert_eq!(late_fee(None, 400.0, 60), 0.0);
    }

    #[test]
    fn scheduled_reminder_bills_remaining_balance() {
        let inv = invoice(500.0, InvoiceStatus::Sent, date(2025, 3, 1));
        let paid = total_paid(&[payment(200.0)]);

        let result = payable(&inv, paid, Some(ReminderStatus::Scheduled), date(2025, 3, 5));
        assert_eq!(result.base_amount, 300.0);
        assert_eq!(result.late_fee, 0.0);
        assert_eq!(result.total_payable, 300.0);

        let sent = payable(&inv, paid, Some(ReminderStatus::Sent), date(2025, 3, 5));
        assert_eq!(sent.base_amount, 500.0);
    }

    #[test]
    fn remaining_balance_never_negative() {
        let inv = invoice(100.0, InvoiceStatus::Sent, date(2025, 3, 1));
        assert_eq!(remaining_balance(&inv, 150.0), 0.0);
        assert_eq!(remaining_balance(&inv, 40.0), 60.0);
    }

    #[test]
    fn due_date_follows_terms() {
        assert_eq!(due_date_for(date(2025, 1, 1), 30), date(2025, 1, 31));
        assert_eq!(due_date_for(date(2025, 1, 1), -5), date(2025, 1, 1));
    }
}
