//! Property-based tests for the billing arithmetic.
//!
//! # Properties Tested
//!
//! 1. **Overdue**: a non-draft invoice past its due date is late by exactly
//!    the day difference, and never negative.
//! 2. **Late fee**: zero inside the grace period, fixed or percentage after.
//! 3. **Payable**: total payable is base plus late fee, where the base is the
//!    remaining balance only for scheduled reminders with payments on file.
//! 4. **Totals**: discounts never push the total below zero.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use invoice_desk::billing::{self, compute_totals, late_fee, overdue_days, payable};
use invoice_desk::model::{
    Discount, Invoice, InvoiceStatus, LateFeeKind, LateFeePolicy, LineItem, ReminderStatus, Theme,
};
use invoice_desk::money::round_cents;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

fn invoice(
    total: f64,
    status: InvoiceStatus,
    due: NaiveDate,
    late_fees: Option<LateFeePolicy>,
) -> Invoice {
    let items = vec![LineItem::new("Work", 1.0, total)];
    Invoice {
        number: "INV20250101-01".into(),
        client_id: "acme".into(),
        issue_date: base_date(),
        due_date: due,
        totals: compute_totals(&items, Discount::None, 0.0),
        items,
        discount: Discount::None,
        tax_rate: 0.0,
        status,
        currency: "USD".into(),
        notes: None,
        payment_terms: None,
        late_fees,
        reminders: None,
        theme: Theme::default(),
        sent_on: None,
        paid_on: None,
        source_estimate: None,
    }
}

fn non_draft_status() -> impl Strategy<Value = InvoiceStatus> {
    prop_oneof![
        Just(InvoiceStatus::Pending),
        Just(InvoiceStatus::Sent),
        Just(InvoiceStatus::Paid),
        Just(InvoiceStatus::Overdue),
    ]
}

fn policy() -> impl Strategy<Value = LateFeePolicy> {
    (any::<bool>(), 0.0f64..50.0, 0i64..15).prop_map(|(fixed, amount, grace_period)| LateFeePolicy {
        enabled: true,
        kind: if fixed { LateFeeKind::Fixed } else { LateFeeKind::Percentage },
        amount,
        grace_period,
    })
}

proptest! {
    #[test]
    fn prop_overdue_days_match_calendar(
        status in non_draft_status(),
        due_offset in 0i64..400,
        late_by in -60i64..400,
    ) {
        let due = base_date() + Duration::days(due_offset);
        let today = due + Duration::days(late_by);
        let inv = invoice(100.0, status, due, None);

        let days = overdue_days(&inv, today);
        prop_assert!(days >= 0);
        if due < today {
            prop_assert_eq!(days, (today - due).num_days());
        } else {
            prop_assert_eq!(days, 0);
        }
    }

    #[test]
    fn prop_drafts_are_never_overdue(late_by in 0i64..400) {
        let due = base_date();
        let inv = invoice(100.0, InvoiceStatus::Draft, due, None);
        prop_assert_eq!(overdue_days(&inv, due + Duration::days(late_by)), 0);
    }

    #[test]
    fn prop_late_fee_respects_grace(
        policy in policy(),
        base in 0.0f64..100_000.0,
        overdue in 0i64..120,
    ) {
        let fee = late_fee(Some(&policy), base, overdue);
        if overdue <= policy.grace_period {
            prop_assert_eq!(fee, 0.0);
        } else {
            let expected = match policy.kind {
                LateFeeKind::Fixed => round_cents(policy.amount),
                LateFeeKind::Percentage => round_cents(base * policy.amount / 100.0),
            };
            prop_assert_eq!(fee, expected);
        }
    }

    #[test]
    fn prop_disabled_policy_charges_nothing(
        mut policy in policy(),
        base in 0.0f64..100_000.0,
        overdue in 0i64..120,
    ) {
        policy.enabled = false;
        prop_assert_eq!(late_fee(Some(&policy), base, overdue), 0.0);
        prop_assert_eq!(late_fee(None, base, overdue), 0.0);
    }

    #[test]
    fn prop_total_payable_is_base_plus_fee(
        total_cents in 1u32..10_000_000,
        paid_share in 0.0f64..1.0,
        policy in policy(),
        late_by in 0i64..90,
        scheduled in any::<bool>(),
    ) {
        let total = f64::from(total_cents) / 100.0;
        let paid = round_cents(total * paid_share);
        let due = base_date();
        let inv = invoice(total, InvoiceStatus::Sent, due, Some(policy));
        let status = scheduled.then_some(ReminderStatus::Scheduled).or(Some(ReminderStatus::Sent));

        let p = payable(&inv, paid, status, due + Duration::days(late_by));
        let expected_base = if scheduled && paid > 0.0 {
            billing::remaining_balance(&inv, paid)
        } else {
            inv.totals.total
        };
        prop_assert_eq!(p.base_amount, expected_base);
        prop_assert_eq!(p.total_payable, round_cents(p.base_amount + p.late_fee));
    }

    #[test]
    fn prop_discount_never_goes_negative(
        rate in 0.0f64..1_000.0,
        quantity in 0.0f64..50.0,
        fixed in 0.0f64..100_000.0,
        pct in 0.0f64..100.0,
        tax in 0.0f64..30.0,
    ) {
        let items = vec![LineItem::new("Work", quantity, rate)];
        for discount in [Discount::Fixed(fixed), Discount::Percentage(pct)] {
            let totals = compute_totals(&items, discount, tax);
            prop_assert!(totals.discount <= totals.subtotal + 0.005);
            prop_assert!(totals.total >= 0.0);
        }
    }
}
