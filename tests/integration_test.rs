use chrono::NaiveDate;
use std::fs;
use std::io;
use tempfile::TempDir;

use invoice_desk::filter::InvoiceQuery;
use invoice_desk::mailer::{Mailer, MemoryMailer, OutgoingEmail};
use invoice_desk::model::{
    EstimateDraft, EstimateStatus, InvoiceDraft, InvoiceStatus, LineItem, NewClient,
    ReminderSettings, ReminderStatus, ReminderType,
};
use invoice_desk::reminders::HistoryFilter;
use invoice_desk::{AppError, Desk, Result};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn desk(temp: &TempDir) -> Desk<MemoryMailer> {
    Desk::open(temp.path(), Some("https://app.example.com".into()), MemoryMailer::new()).unwrap()
}

fn add_client(desk: &Desk<MemoryMailer>, company: &str, email: Option<&str>) -> String {
    desk.add_client(NewClient {
        name: "Jane Doe".into(),
        company: Some(company.into()),
        email: email.map(Into::into),
        ..Default::default()
    })
    .unwrap()
    .id
}

/// Fails with an I/O error for one recipient and delivers everything else.
struct DiskFullFor {
    recipient: &'static str,
    inner: MemoryMailer,
}

impl Mailer for DiskFullFor {
    fn send(&self, email: &OutgoingEmail) -> Result<String> {
        if email.to == self.recipient {
            return Err(io::Error::other("disk full").into());
        }
        self.inner.send(email)
    }
}

fn draft(client_id: &str, issued: NaiveDate, amount: f64) -> InvoiceDraft {
    let items = vec![LineItem::new("Consulting", 1.0, amount)];
    let mut draft = InvoiceDraft::new(client_id, issued, items);
    draft.reminders = Some(ReminderSettings {
        enabled: true,
        use_system_default: true,
        rules: Vec::new(),
    });
    draft
}

#[test]
fn invoice_lifecycle_with_partial_payments() {
    let temp = TempDir::new().unwrap();
    let desk = desk(&temp);
    let client = add_client(&desk, "Acme Corp", Some("jane@acme.test"));
    assert_eq!(client, "acme-corp");

    let invoice = desk.create_invoice(draft(&client, date(2025, 3, 1), 1000.0)).unwrap();
    assert_eq!(invoice.number, "INV20250301-01");
    assert_eq!(invoice.due_date, date(2025, 3, 31));
    assert_eq!(invoice.status, InvoiceStatus::Draft);

    let sent = desk.send_invoice(&invoice.number, date(2025, 3, 1)).unwrap();
    assert_eq!(sent.recipient, "jane@acme.test");
    assert!(sent.document.html_path.exists());
    assert!(sent.document.typ_path.exists());

    let emails = desk.mailer().sent();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].subject, "Invoice INV20250301-01 from Your Business LLC");
    assert!(emails[0].html.contains("$1,000.00"));

    // Every default rule lies in the future, so all four are scheduled.
    let scheduled = desk.store().reminders_for(&invoice.number).unwrap();
    assert_eq!(scheduled.len(), 4);
    assert!(scheduled.iter().all(|h| h.reminder_status == ReminderStatus::Scheduled));

    let partial = desk
        .record_payment(&invoice.number, 400.0, date(2025, 3, 10), "bank transfer", None)
        .unwrap();
    assert_eq!(partial.remaining, 600.0);
    assert_eq!(partial.status, InvoiceStatus::Sent);
    assert_eq!(partial.payment.id, "INV20250301-01-P1");

    let too_much = desk.record_payment(&invoice.number, 700.0, date(2025, 3, 11), "card", None);
    assert!(matches!(too_much, Err(AppError::Validation(_))));

    let rest = desk
        .record_payment(&invoice.number, 600.0, date(2025, 3, 12), "card", Some("ch_123".into()))
        .unwrap();
    assert_eq!(rest.status, InvoiceStatus::Paid);
    assert_eq!(desk.invoice(&invoice.number).unwrap().paid_on, Some(date(2025, 3, 12)));

    let log = desk.store().reminders_for(&invoice.number).unwrap();
    assert!(log.iter().all(|h| h.reminder_status == ReminderStatus::Cancelled));
    assert!(matches!(
        desk.send_invoice(&invoice.number, date(2025, 3, 13)),
        Err(AppError::InvalidTransition { .. })
    ));
}

#[test]
fn due_reminder_run_sends_latest_trigger_once() {
    let temp = TempDir::new().unwrap();
    let desk = desk(&temp);
    let client = add_client(&desk, "Zen Studio", Some("hello@zen.test"));

    let invoice = desk.create_invoice(draft(&client, date(2025, 1, 1), 500.0)).unwrap();
    desk.send_invoice(&invoice.number, date(2025, 1, 1)).unwrap();

    let due = desk.due_reminders(date(2025, 2, 10)).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].trigger_date, date(2025, 2, 7));

    let results = desk.run_due_reminders(date(2025, 2, 10)).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].reminder_status, ReminderStatus::Sent);
    assert_eq!(results[0].reminder_type, ReminderType::Firm);
    assert_eq!(desk.mailer().sent().len(), 2);

    // The missed earlier triggers are closed out rather than sent late.
    let log = desk.store().reminders_for(&invoice.number).unwrap();
    let cancelled: Vec<_> = log
        .iter()
        .filter(|h| h.reminder_status == ReminderStatus::Cancelled)
        .filter_map(|h| h.trigger_date)
        .collect();
    assert_eq!(cancelled, vec![date(2025, 1, 28), date(2025, 1, 31)]);

    assert!(desk.run_due_reminders(date(2025, 2, 10)).unwrap().is_empty());

    let filter = HistoryFilter {
        reminder_status: Some(ReminderStatus::Sent),
        ..Default::default()
    };
    let rows = desk.reminder_history(&filter, date(2025, 2, 10)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].payable.overdue_days, 10);
    assert_eq!(rows[0].payable.total_payable, 500.0);
}

#[test]
fn failed_reminder_is_recorded_with_reason() {
    let temp = TempDir::new().unwrap();
    let desk = desk(&temp);
    let client = add_client(&desk, "No Mail Inc", None);

    let mut pending = draft(&client, date(2025, 1, 1), 200.0);
    pending.status = InvoiceStatus::Pending;
    let invoice = desk.create_invoice(pending).unwrap();

    let result = desk.send_reminder(&invoice.number, None, date(2025, 2, 15));
    assert!(matches!(result, Err(AppError::Delivery(_))));

    let log = desk.store().reminders_for(&invoice.number).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].reminder_status, ReminderStatus::Failed);
    assert!(log[0].failure_reason.as_deref().unwrap().contains("no email"));
    assert!(desk.mailer().sent().is_empty());
}

#[test]
fn drafts_cannot_be_reminded() {
    let temp = TempDir::new().unwrap();
    let desk = desk(&temp);
    let client = add_client(&desk, "Acme Corp", Some("jane@acme.test"));
    let invoice = desk.create_invoice(draft(&client, date(2025, 1, 1), 100.0)).unwrap();

    assert!(matches!(
        desk.send_reminder(&invoice.number, Some(ReminderType::Urgent), date(2025, 3, 1)),
        Err(AppError::InvalidTransition { .. })
    ));
    assert!(desk.due_reminders(date(2025, 3, 1)).unwrap().is_empty());
    assert!(desk.reminder_history(&HistoryFilter::default(), date(2025, 3, 1)).unwrap().is_empty());
}

#[test]
fn estimate_approve_and_convert() {
    let temp = TempDir::new().unwrap();
    let desk = desk(&temp);
    let client = add_client(&desk, "Acme Corp", Some("jane@acme.test"));

    let items = vec![LineItem::new("Design", 10.0, 85.0)];
    let quote = EstimateDraft::new(&client, date(2025, 4, 1), items);
    let estimate = desk.create_estimate(quote).unwrap();
    assert_eq!(estimate.number, "EST20250401-01");
    assert_eq!(estimate.expiry_date, date(2025, 5, 1));

    // Only sent estimates can be decided on.
    let approved = EstimateStatus::Approved;
    assert!(desk.set_estimate_status(&estimate.number, approved, date(2025, 4, 2)).is_err());

    desk.send_estimate(&estimate.number, date(2025, 4, 1)).unwrap();
    assert_eq!(desk.mailer().sent()[0].subject, "Estimate EST20250401-01 from Your Business LLC");

    desk.set_estimate_status(&estimate.number, EstimateStatus::Approved, date(2025, 4, 3)).unwrap();
    let invoice = desk.convert_estimate(&estimate.number, date(2025, 4, 5)).unwrap();
    assert_eq!(invoice.number, "INV20250405-01");
    assert_eq!(invoice.status, InvoiceStatus::Draft);
    assert_eq!(invoice.totals.total, 850.0);
    assert_eq!(invoice.source_estimate.as_deref(), Some("EST20250401-01"));

    let converted = desk.estimate(&estimate.number).unwrap();
    assert_eq!(converted.status, EstimateStatus::Converted);
    assert_eq!(converted.converted_invoice.as_deref(), Some("INV20250405-01"));
    assert!(matches!(
        desk.convert_estimate(&estimate.number, date(2025, 4, 6)),
        Err(AppError::InvalidTransition { .. })
    ));
}

#[test]
fn sent_estimates_expire() {
    let temp = TempDir::new().unwrap();
    let desk = desk(&temp);
    let client = add_client(&desk, "Acme Corp", Some("jane@acme.test"));
    let items = vec![LineItem::new("Audit", 1.0, 300.0)];
    let quote = EstimateDraft::new(&client, date(2025, 1, 1), items);
    let estimate = desk.create_estimate(quote).unwrap();
    desk.send_estimate(&estimate.number, date(2025, 1, 1)).unwrap();

    assert!(matches!(
        desk.set_estimate_status(&estimate.number, EstimateStatus::Approved, date(2025, 2, 5)),
        Err(AppError::InvalidTransition { .. })
    ));
    assert_eq!(desk.expire_estimates(date(2025, 2, 5)).unwrap(), vec![estimate.number.clone()]);
    assert_eq!(desk.estimate(&estimate.number).unwrap().status, EstimateStatus::Expired);
    assert!(desk.expire_estimates(date(2025, 2, 6)).unwrap().is_empty());
}

#[test]
fn monthly_limit_blocks_creation() {
    let temp = TempDir::new().unwrap();
    let mut desk = desk(&temp);
    let client = add_client(&desk, "Acme Corp", Some("jane@acme.test"));

    let mut settings = desk.settings().clone();
    settings.limits.monthly_invoices = Some(1);
    desk.save_settings(settings).unwrap();

    desk.create_invoice(draft(&client, date(2025, 6, 2), 10.0)).unwrap();
    let blocked = desk.create_invoice(draft(&client, date(2025, 6, 20), 10.0));
    assert!(matches!(blocked, Err(AppError::LimitReached { limit: 1 })));
    desk.create_invoice(draft(&client, date(2025, 7, 1), 10.0)).unwrap();

    // Reopening reads the saved limit back from business.toml.
    let reopened = Desk::open(temp.path(), None, MemoryMailer::new()).unwrap();
    assert_eq!(reopened.settings().limits.monthly_invoices, Some(1));
}

#[test]
fn clients_with_invoices_cannot_be_deleted() {
    let temp = TempDir::new().unwrap();
    let desk = desk(&temp);
    let client = add_client(&desk, "Acme Corp", Some("jane@acme.test"));
    let invoice = desk.create_invoice(draft(&client, date(2025, 1, 1), 10.0)).unwrap();

    assert!(matches!(
        desk.add_client(NewClient {
            name: "Other".into(),
            company: Some("Acme Corp".into()),
            ..Default::default()
        }),
        Err(AppError::AlreadyExists { .. })
    ));
    assert!(matches!(desk.delete_client(&client), Err(AppError::Validation(_))));

    desk.delete_invoice(&invoice.number).unwrap();
    desk.delete_client(&client).unwrap();
    assert!(desk.list_clients().unwrap().is_empty());
}

#[test]
fn list_invoices_filters_by_search_and_status() {
    let temp = TempDir::new().unwrap();
    let desk = desk(&temp);
    let acme = add_client(&desk, "Acme Corp", Some("jane@acme.test"));
    let zen = add_client(&desk, "Zen Studio", Some("hello@zen.test"));

    let first = desk.create_invoice(draft(&acme, date(2025, 1, 1), 100.0)).unwrap();
    desk.create_invoice(draft(&zen, date(2025, 1, 2), 200.0)).unwrap();
    desk.send_invoice(&first.number, date(2025, 1, 1)).unwrap();

    let query = InvoiceQuery { search: Some("zen".into()), ..Default::default() };
    let found = desk.list_invoices(&query, date(2025, 3, 1)).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].client_id, zen);

    let query = InvoiceQuery { status: Some(InvoiceStatus::Overdue), ..Default::default() };
    let overdue = desk.list_invoices(&query, date(2025, 3, 1)).unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].number, first.number);
}

#[test]
fn logo_upload_copies_into_assets() {
    let temp = TempDir::new().unwrap();
    let mut desk = desk(&temp);

    let source = temp.path().join("brand.PNG");
    fs::write(&source, b"\x89PNG fake").unwrap();
    let stored = desk.upload_logo(&source).unwrap();

    assert_eq!(stored, temp.path().join("assets").join("logo.png"));
    assert!(stored.exists());
    assert_eq!(
        desk.settings().business.logo_path.as_deref(),
        Some(stored.to_string_lossy().as_ref())
    );

    let text = temp.path().join("notes.txt");
    fs::write(&text, "hello").unwrap();
    assert!(matches!(desk.upload_logo(&text), Err(AppError::Validation(_))));
}

#[test]
fn summary_reports_paid_and_outstanding() {
    let temp = TempDir::new().unwrap();
    let desk = desk(&temp);
    let client = add_client(&desk, "Acme Corp", Some("jane@acme.test"));

    let invoice = desk.create_invoice(draft(&client, date(2025, 2, 1), 1000.0)).unwrap();
    desk.send_invoice(&invoice.number, date(2025, 2, 1)).unwrap();
    desk.record_payment(&invoice.number, 250.0, date(2025, 2, 10), "card", None).unwrap();

    let summary = desk.summary(2025, date(2025, 2, 15)).unwrap();
    assert_eq!(summary.invoice_count, 1);
    assert_eq!(summary.totals.paid, 250.0);
    assert_eq!(summary.totals.unpaid, 750.0);
    assert_eq!(summary.clients[0].0, "Acme Corp");
}

#[test]
fn reminder_run_continues_past_mailer_io_errors() {
    let temp = TempDir::new().unwrap();
    let mailer = DiskFullFor { recipient: "ap@alpha.test", inner: MemoryMailer::new() };
    let desk = Desk::open(temp.path(), None, mailer).unwrap();

    let mut numbers = Vec::new();
    for (company, email) in [("Alpha Co", "ap@alpha.test"), ("Beta Co", "ap@beta.test")] {
        let client = desk
            .add_client(NewClient {
                name: "Accounts".into(),
                company: Some(company.into()),
                email: Some(email.into()),
                ..Default::default()
            })
            .unwrap()
            .id;
        let mut pending = draft(&client, date(2025, 1, 1), 300.0);
        pending.status = InvoiceStatus::Pending;
        numbers.push(desk.create_invoice(pending).unwrap().number);
    }

    let results = desk.run_due_reminders(date(2025, 2, 10)).unwrap();
    assert_eq!(results.len(), 2);

    let alpha = desk.store().reminders_for(&numbers[0]).unwrap();
    let failed = alpha.iter().find(|h| h.trigger_date == Some(date(2025, 2, 7))).unwrap();
    assert_eq!(failed.reminder_status, ReminderStatus::Failed);
    assert!(failed.failure_reason.as_deref().unwrap().contains("disk full"));

    let beta = desk.store().reminders_for(&numbers[1]).unwrap();
    assert!(beta.iter().any(|h| h.trigger_date == Some(date(2025, 2, 7))
        && h.reminder_status == ReminderStatus::Sent));
    assert_eq!(desk.mailer().inner.sent().len(), 1);
}

#[test]
fn reverting_a_paid_invoice_reschedules_its_reminders() {
    let temp = TempDir::new().unwrap();
    let desk = desk(&temp);
    let client = add_client(&desk, "Zen Studio", Some("hello@zen.test"));
    let invoice = desk.create_invoice(draft(&client, date(2025, 1, 1), 500.0)).unwrap();
    desk.send_invoice(&invoice.number, date(2025, 1, 1)).unwrap();

    desk.set_invoice_status(&invoice.number, InvoiceStatus::Paid, date(2025, 1, 15)).unwrap();
    assert!(desk.due_reminders(date(2025, 2, 10)).unwrap().is_empty());

    // The payment bounced.
    desk.set_invoice_status(&invoice.number, InvoiceStatus::Sent, date(2025, 1, 20)).unwrap();
    let log = desk.store().reminders_for(&invoice.number).unwrap();
    assert_eq!(log.len(), 4);
    assert!(log.iter().all(|h| h.reminder_status == ReminderStatus::Scheduled));
    assert!(log.iter().all(|h| h.failure_reason.is_none()));

    let due = desk.due_reminders(date(2025, 2, 10)).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].trigger_date, date(2025, 2, 7));
    assert_eq!(due[0].reminder_type, ReminderType::Firm);
}

#[test]
fn superseded_failures_keep_their_error() {
    let temp = TempDir::new().unwrap();
    let client = add_client(&desk(&temp), "Acme Corp", Some("jane@acme.test"));
    let failing = Desk::open(temp.path(), None, MemoryMailer::failing("smtp down")).unwrap();
    let mut pending = draft(&client, date(2025, 1, 1), 200.0);
    pending.status = InvoiceStatus::Pending;
    let invoice = failing.create_invoice(pending).unwrap();

    let results = failing.run_due_reminders(date(2025, 1, 28)).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].reminder_status, ReminderStatus::Failed);

    let desk = desk(&temp);
    desk.run_due_reminders(date(2025, 2, 10)).unwrap();
    let log = desk.store().reminders_for(&invoice.number).unwrap();
    let first = log.iter().find(|h| h.trigger_date == Some(date(2025, 1, 28))).unwrap();
    assert_eq!(first.reminder_status, ReminderStatus::Cancelled);
    let reason = first.failure_reason.as_deref().unwrap();
    assert!(reason.contains("smtp down"));
    assert!(reason.ends_with("superseded by a later reminder"));
}

#[test]
fn invoices_can_be_edited_until_sent() {
    let temp = TempDir::new().unwrap();
    let desk = desk(&temp);
    let client = add_client(&desk, "Acme Corp", Some("jane@acme.test"));

    let items = vec![LineItem::new("Design", 1.0, 400.0)];
    let quote = EstimateDraft::new(&client, date(2025, 4, 1), items);
    let estimate = desk.create_estimate(quote).unwrap();
    desk.send_estimate(&estimate.number, date(2025, 4, 1)).unwrap();
    desk.set_estimate_status(&estimate.number, EstimateStatus::Approved, date(2025, 4, 2)).unwrap();
    let invoice = desk.convert_estimate(&estimate.number, date(2025, 4, 3)).unwrap();

    let mut revised = draft(&client, date(2025, 4, 3), 0.0);
    revised.items = vec![LineItem::new("Design", 2.0, 400.0), LineItem::new("Printing", 1.0, 50.0)];
    let updated = desk.update_invoice(&invoice.number, revised).unwrap();
    assert_eq!(updated.number, invoice.number);
    assert_eq!(updated.totals.subtotal, 850.0);
    assert_eq!(updated.totals.total, 850.0);
    assert_eq!(updated.source_estimate.as_deref(), Some(estimate.number.as_str()));
    assert_eq!(desk.invoice(&invoice.number).unwrap().totals.total, 850.0);

    desk.send_invoice(&invoice.number, date(2025, 4, 4)).unwrap();
    let late = desk.update_invoice(&invoice.number, draft(&client, date(2025, 4, 3), 10.0));
    assert!(matches!(late, Err(AppError::InvalidTransition { .. })));
    assert_eq!(desk.invoice(&invoice.number).unwrap().totals.total, 850.0);
}

#[test]
fn estimates_can_be_deleted() {
    let temp = TempDir::new().unwrap();
    let desk = desk(&temp);
    let client = add_client(&desk, "Acme Corp", Some("jane@acme.test"));
    let items = vec![LineItem::new("Audit", 1.0, 90.0)];
    let quote = EstimateDraft::new(&client, date(2025, 4, 1), items);
    let estimate = desk.create_estimate(quote).unwrap();

    desk.delete_estimate(&estimate.number).unwrap();
    assert!(matches!(desk.estimate(&estimate.number), Err(AppError::NotFound { .. })));
    assert!(matches!(desk.delete_estimate(&estimate.number), Err(AppError::NotFound { .. })));
}
