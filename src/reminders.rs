//! Reminder scheduling and the reminder history view.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::billing::{self, Payable};
use crate::model::{
    Defaults, Invoice, InvoiceStatus, Payment, ReminderHistory, ReminderRule, ReminderStatus,
    ReminderType,
};

/// Tone for a reminder sent `overdue_days` after the due date.
pub fn reminder_type_for(overdue_days: i64) -> ReminderType {
    match overdue_days {
        i64::MIN..=0 => ReminderType::Friendly,
        1..=7 => ReminderType::Polite,
        8..=30 => ReminderType::Firm,
        _ => ReminderType::Urgent,
    }
}

/// Reason recorded on scheduled reminders cancelled because the invoice
/// was paid. They are rescheduled if the invoice becomes unpaid again.
pub const CANCELLED_AS_PAID: &str = "invoice paid";

/// Reason recorded on missed triggers that a later reminder replaced.
pub const SUPERSEDED: &str = "superseded by a later reminder";

/// Whether a history entry closes out its trigger date. Failed attempts are
/// retried and scheduled entries are still waiting to go out.
pub fn is_settled(status: ReminderStatus) -> bool {
    !matches!(status, ReminderStatus::Failed | ReminderStatus::Scheduled)
}

/// Whether an invoice may receive reminders at all.
pub fn accepts_reminders(invoice: &Invoice) -> bool {
    !matches!(invoice.status, InvoiceStatus::Draft | InvoiceStatus::Paid)
}

/// Rules in force for an invoice, or `None` when reminders are off.
pub fn rules_for<'a>(invoice: &'a Invoice, defaults: &'a Defaults) -> Option<&'a [ReminderRule]> {
    let settings = invoice.reminders.as_ref().filter(|r| r.enabled)?;
    if settings.use_system_default || settings.rules.is_empty() {
        Some(&defaults.reminder_rules)
    } else {
        Some(&settings.rules)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingReminder {
    pub invoice: String,
    pub rule: ReminderRule,
    pub trigger_date: NaiveDate,
    pub overdue_days: i64,
    pub reminder_type: ReminderType,
}

/// Reminders whose trigger date has arrived and that have not been settled
/// yet (see [`is_settled`]).
pub fn due_reminders(
    invoices: &[Invoice],
    history: &[ReminderHistory],
    defaults: &Defaults,
    today: NaiveDate,
) -> Vec<PendingReminder> {
    let done: HashSet<(&str, NaiveDate)> = history
        .iter()
        .filter(|h| is_settled(h.reminder_status))
        .filter_map(|h| h.trigger_date.map(|d| (h.invoice.as_str(), d)))
        .collect();

    let mut pending = Vec::new();
    for invoice in invoices.iter().filter(|i| accepts_reminders(i)) {
        let Some(rules) = rules_for(invoice, defaults) else {
            continue;
        };
        let overdue = billing::overdue_days(invoice, today);

        let mut seen = HashSet::new();
        for rule in rules {
            let trigger_date = rule.trigger_date(invoice.due_date);
            if trigger_date > today
                || !seen.insert(trigger_date)
                || done.contains(&(invoice.number.as_str(), trigger_date))
            {
                continue;
            }
            pending.push(PendingReminder {
                invoice: invoice.number.clone(),
                rule: *rule,
                trigger_date,
                overdue_days: overdue,
                reminder_type: reminder_type_for(overdue),
            });
        }
    }

    // One reminder per invoice per run: the latest trigger wins, older
    // missed triggers are folded into it.
    let mut latest: HashMap<String, PendingReminder> = HashMap::new();
    for reminder in pending {
        match latest.get(&reminder.invoice) {
            Some(existing) if existing.trigger_date >= reminder.trigger_date => {}
            _ => {
                latest.insert(reminder.invoice.clone(), reminder);
            }
        }
    }
    let mut result: Vec<PendingReminder> = latest.into_values().collect();
    result.sort_by(|a, b| a.trigger_date.cmp(&b.trigger_date).then(a.invoice.cmp(&b.invoice)));
    result
}

/// Earlier triggers for the same invoice that `reminder` supersedes.
pub fn skipped_triggers(
    invoice: &Invoice,
    defaults: &Defaults,
    history: &[ReminderHistory],
    reminder: &PendingReminder,
) -> Vec<NaiveDate> {
    let recorded: HashSet<NaiveDate> = history
        .iter()
        .filter(|h| h.invoice == invoice.number && is_settled(h.reminder_status))
        .filter_map(|h| h.trigger_date)
        .collect();
    let mut dates: Vec<NaiveDate> = rules_for(invoice, defaults)
        .unwrap_or_default()
        .iter()
        .map(|r| r.trigger_date(invoice.due_date))
        .filter(|d| *d < reminder.trigger_date && !recorded.contains(d))
        .collect();
    dates.sort();
    dates.dedup();
    dates
}

/// Future trigger dates for an invoice with the tone each will use.
pub fn upcoming(
    invoice: &Invoice,
    defaults: &Defaults,
    today: NaiveDate,
) -> Vec<(NaiveDate, ReminderType)> {
    if !accepts_reminders(invoice) {
        return Vec::new();
    }
    let mut dates: Vec<NaiveDate> = rules_for(invoice, defaults)
        .unwrap_or_default()
        .iter()
        .map(|r| r.trigger_date(invoice.due_date))
        .filter(|d| *d > today)
        .collect();
    dates.sort();
    dates.dedup();
    dates
        .into_iter()
        .map(|d| (d, reminder_type_for((d - invoice.due_date).num_days())))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub id: String,
    pub invoice: String,
    pub client_id: String,
    pub currency: String,
    pub reminder_type: ReminderType,
    pub reminder_status: ReminderStatus,
    pub sent_on: NaiveDate,
    pub recipient: Option<String>,
    pub failure_reason: Option<String>,
    pub invoice_total: f64,
    pub total_paid: f64,
    #[serde(flatten)]
    pub payable: Payable,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub reminder_type: Option<ReminderType>,
    pub reminder_status: Option<ReminderStatus>,
    pub invoice: Option<String>,
}

/// Join reminder history with invoices and payments. Rows for drafts and
/// for invoices that no longer exist are dropped. Newest first.
pub fn history_view(
    history: &[ReminderHistory],
    invoices: &[Invoice],
    payments: &HashMap<String, Vec<Payment>>,
    filter: &HistoryFilter,
    today: NaiveDate,
) -> Vec<HistoryRow> {
    let by_number: HashMap<&str, &Invoice> =
        invoices.iter().map(|i| (i.number.as_str(), i)).collect();

    let mut rows: Vec<HistoryRow> = history
        .iter()
        .filter(|h| filter.reminder_type.is_none_or(|t| t == h.reminder_type))
        .filter(|h| filter.reminder_status.is_none_or(|s| s == h.reminder_status))
        .filter(|h| filter.invoice.as_deref().is_none_or(|n| n == h.invoice))
        .filter_map(|h| {
            let invoice = by_number.get(h.invoice.as_str()).filter(|i| !i.is_draft())?;
            let paid = payments
                .get(&invoice.number)
                .map(|p| billing::total_paid(p))
                .unwrap_or(0.0);
            Some(HistoryRow {
                id: h.id.clone(),
                invoice: invoice.number.clone(),
                client_id: invoice.client_id.clone(),
                currency: invoice.currency.clone(),
                reminder_type: h.reminder_type,
                reminder_status: h.reminder_status,
                sent_on: h.sent_on,
                recipient: h.recipient.clone(),
                failure_reason: h.failure_reason.clone(),
                invoice_total: invoice.totals.total,
                total_paid: paid,
                payable: billing::payable(invoice, paid, Some(h.reminder_status), today),
            })
        })
        .collect();

    rows.sort_by(|a, b| b.sent_on.cmp(&a.sent_on).then_with(|| b.id.cmp(&a.id)));
    rows
}
