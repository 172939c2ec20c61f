//! Terminal tables and the yearly summary.

use chrono::{Datelike, NaiveDate};
use comfy_table::{Attribute, Cell, Color, Table};
use std::collections::{BTreeMap, HashMap};

use crate::billing;
use crate::model::{Client, Estimate, Invoice, InvoiceStatus, Payment};
use crate::money::{format_money, round_cents};
use crate::reminders::{HistoryRow, PendingReminder};
use crate::render::DATE_FORMAT;

const PAID_COLOR: Color = Color::Rgb { r: 4, g: 120, b: 87 };
const UNPAID_COLOR: Color = Color::Rgb { r: 185, g: 28, b: 28 };
const OVERDUE_COLOR: Color = Color::Rgb { r: 217, g: 119, b: 6 };

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bucket {
    pub paid: f64,
    pub unpaid: f64,
    /// Part of `unpaid` that is past due.
    pub overdue: f64,
}

impl Bucket {
    pub fn total(&self) -> f64 {
        round_cents(self.paid + self.unpaid)
    }

    fn add(&mut self, paid: f64, unpaid: f64, overdue: bool) {
        self.paid = round_cents(self.paid + paid);
        self.unpaid = round_cents(self.unpaid + unpaid);
        if overdue {
            self.overdue = round_cents(self.overdue + unpaid);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub year: i32,
    /// Keyed by month number, January first.
    pub months: BTreeMap<u32, Bucket>,
    /// Sorted by total, largest first.
    pub clients: Vec<(String, Bucket)>,
    pub totals: Bucket,
    pub invoice_count: usize,
}

/// Paid/unpaid/overdue totals for non-draft invoices issued in `year`.
/// Partial payments split an invoice across the paid and unpaid columns.
pub fn summarize(
    invoices: &[Invoice],
    clients: &HashMap<String, Client>,
    payments: &HashMap<String, Vec<Payment>>,
    year: i32,
    today: NaiveDate,
) -> Summary {
    let mut months: BTreeMap<u32, Bucket> = BTreeMap::new();
    let mut by_client: BTreeMap<String, Bucket> = BTreeMap::new();
    let mut totals = Bucket::default();
    let mut invoice_count = 0;

    for invoice in invoices
        .iter()
        .filter(|i| !i.is_draft() && i.issue_date.year() == year)
    {
        let received = payments
            .get(&invoice.number)
            .map(|p| billing::total_paid(p))
            .unwrap_or(0.0);
        let (paid, unpaid) = if invoice.is_paid() {
            (invoice.totals.total, 0.0)
        } else {
            let unpaid = billing::remaining_balance(invoice, received);
            (round_cents(invoice.totals.total - unpaid), unpaid)
        };
        let overdue = billing::effective_status(invoice, today) == InvoiceStatus::Overdue;

        let client = clients
            .get(&invoice.client_id)
            .map(|c| c.display_name().to_string())
            .unwrap_or_else(|| invoice.client_id.clone());

        months.entry(invoice.issue_date.month()).or_default().add(paid, unpaid, overdue);
        by_client.entry(client).or_default().add(paid, unpaid, overdue);
        totals.add(paid, unpaid, overdue);
        invoice_count += 1;
    }

    let mut clients: Vec<(String, Bucket)> = by_client.into_iter().collect();
    clients.sort_by(|a, b| {
        b.1.total()
            .partial_cmp(&a.1.total())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    Summary { year, months, clients, totals, invoice_count }
}

fn money_cell(amount: f64, currency: &str, color: Color) -> Cell {
    let cell = Cell::new(format_money(amount, currency));
    if amount > 0.0 { cell.fg(color) } else { cell }
}

fn bucket_row(label: Cell, bucket: &Bucket, currency: &str) -> Vec<Cell> {
    vec![
        label,
        money_cell(bucket.paid, currency, PAID_COLOR),
        money_cell(bucket.unpaid, currency, UNPAID_COLOR),
        money_cell(bucket.overdue, currency, OVERDUE_COLOR),
        Cell::new(format_money(bucket.total(), currency)),
    ]
}

fn bucket_header(first: &str) -> Vec<Cell> {
    ["Paid", "Unpaid", "Overdue", "Total"]
        .into_iter()
        .fold(vec![Cell::new(first)], |mut row, h| {
            row.push(Cell::new(h));
            row
        })
}

/// Monthly table, most recent month first, with a bold total row.
pub fn monthly_table(summary: &Summary, currency: &str) -> Table {
    let mut table = Table::new();
    table.set_header(bucket_header("Month"));

    for (month, bucket) in summary.months.iter().rev() {
        let label = NaiveDate::from_ymd_opt(summary.year, *month, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|| format!("{}-{:02}", summary.year, month));
        table.add_row(bucket_row(Cell::new(label), bucket, currency));
    }

    let totals = bucket_row(
        Cell::new(format!("Total ({})", summary.year)),
        &summary.totals,
        currency,
    );
    table.add_row(totals.into_iter().map(|c| c.add_attribute(Attribute::Bold)));
    table
}

pub fn client_summary_table(summary: &Summary, currency: &str) -> Table {
    let mut table = Table::new();
    table.set_header(bucket_header("Client"));
    for (client, bucket) in &summary.clients {
        table.add_row(bucket_row(Cell::new(client), bucket, currency));
    }
    table
}

pub fn clients_table(clients: &[Client]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Company", "Email", "Address"]);
    for c in clients {
        table.add_row(vec![
            c.id.clone(),
            c.name.clone(),
            c.company.clone().unwrap_or_default(),
            c.email.clone().unwrap_or_default(),
            c.billing_address.as_ref().map(|a| a.one_line()).unwrap_or_default(),
        ]);
    }
    table
}

fn status_cell(status: InvoiceStatus) -> Cell {
    let cell = Cell::new(status.as_str());
    match status {
        InvoiceStatus::Paid => cell.fg(PAID_COLOR),
        InvoiceStatus::Overdue => cell.fg(UNPAID_COLOR).add_attribute(Attribute::Bold),
        InvoiceStatus::Draft => cell.add_attribute(Attribute::Dim),
        _ => cell,
    }
}

fn client_label(clients: &HashMap<String, Client>, id: &str) -> String {
    clients
        .get(id)
        .map(|c| c.display_name().to_string())
        .unwrap_or_else(|| id.to_string())
}

pub fn invoices_table(
    invoices: &[Invoice],
    clients: &HashMap<String, Client>,
    payments: &HashMap<String, Vec<Payment>>,
    today: NaiveDate,
) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Number", "Client", "Issued", "Due", "Status", "Total", "Balance"]);
    for inv in invoices {
        let paid = payments.get(&inv.number).map(|p| billing::total_paid(p)).unwrap_or(0.0);
        let balance = if inv.is_paid() { 0.0 } else { billing::remaining_balance(inv, paid) };
        table.add_row(vec![
            Cell::new(&inv.number),
            Cell::new(client_label(clients, &inv.client_id)),
            Cell::new(inv.issue_date.format(DATE_FORMAT)),
            Cell::new(inv.due_date.format(DATE_FORMAT)),
            status_cell(billing::effective_status(inv, today)),
            Cell::new(format_money(inv.totals.total, &inv.currency)),
            money_cell(balance, &inv.currency, UNPAID_COLOR),
        ]);
    }
    table
}

pub fn estimates_table(
    estimates: &[Estimate],
    clients: &HashMap<String, Client>,
    today: NaiveDate,
) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Number",
        "Client",
        "Issued",
        "Valid until",
        "Status",
        "Total",
        "Invoice",
    ]);
    for est in estimates {
        table.add_row(vec![
            Cell::new(&est.number),
            Cell::new(client_label(clients, &est.client_id)),
            Cell::new(est.issue_date.format(DATE_FORMAT)),
            Cell::new(est.expiry_date.format(DATE_FORMAT)),
            Cell::new(est.effective_status(today).as_str()),
            Cell::new(format_money(est.totals.total, &est.currency)),
            Cell::new(est.converted_invoice.clone().unwrap_or_default()),
        ]);
    }
    table
}

pub fn payments_table(payments: &[Payment], currency: &str) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Method", "Reference", "Amount"]);
    for p in payments {
        table.add_row(vec![
            Cell::new(&p.id),
            Cell::new(p.date.format(DATE_FORMAT)),
            Cell::new(&p.method),
            Cell::new(p.reference.clone().unwrap_or_default()),
            Cell::new(format_money(p.amount, currency)),
        ]);
    }
    table
}

pub fn history_table(rows: &[HistoryRow]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Invoice", "Type", "Status", "Date", "Overdue", "Base", "Late fee", "Payable", "Note",
    ]);
    for row in rows {
        let status = Cell::new(row.reminder_status.as_str());
        let status = match row.reminder_status {
            crate::model::ReminderStatus::Failed | crate::model::ReminderStatus::Bounced => {
                status.fg(UNPAID_COLOR)
            }
            _ => status,
        };
        table.add_row(vec![
            Cell::new(&row.invoice),
            Cell::new(row.reminder_type.as_str()),
            status,
            Cell::new(row.sent_on.format(DATE_FORMAT)),
            Cell::new(format!("{}d", row.payable.overdue_days)),
            Cell::new(format_money(row.payable.base_amount, &row.currency)),
            money_cell(row.payable.late_fee, &row.currency, UNPAID_COLOR),
            Cell::new(format_money(row.payable.total_payable, &row.currency))
                .add_attribute(Attribute::Bold),
            Cell::new(row.failure_reason.clone().unwrap_or_default()),
        ]);
    }
    table
}

pub fn due_table(pending: &[PendingReminder]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Invoice", "Trigger", "Rule", "Overdue", "Type"]);
    for p in pending {
        table.add_row(vec![
            p.invoice.clone(),
            p.trigger_date.format(DATE_FORMAT).to_string(),
            p.rule.to_string(),
            format!("{}d", p.overdue_days),
            p.reminder_type.to_string(),
        ]);
    }
    table
}
