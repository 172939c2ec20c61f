//! Search, status filter and sort over loaded invoice/estimate lists.

use chrono::NaiveDate;
use clap::ValueEnum;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::billing;
use crate::model::{Client, Estimate, EstimateStatus, Invoice, InvoiceStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortKey {
    #[default]
    Number,
    Issued,
    /// Due date for invoices, expiry date for estimates.
    Due,
    Total,
    Client,
    Status,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceQuery {
    pub search: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub client: Option<String>,
    pub sort: SortKey,
    pub descending: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EstimateQuery {
    pub search: Option<String>,
    pub status: Option<EstimateStatus>,
    pub client: Option<String>,
    pub sort: SortKey,
    pub descending: bool,
}

/// Case-insensitive containment over the given fields. An empty or blank
/// needle matches everything.
fn matches_search(needle: Option<&str>, fields: &[Option<&str>]) -> bool {
    let Some(needle) = needle.map(str::trim).filter(|n| !n.is_empty()) else {
        return true;
    };
    let needle = needle.to_lowercase();
    fields
        .iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}

fn client_fields<'a>(clients: &'a HashMap<String, Client>, id: &str) -> [Option<&'a str>; 3] {
    match clients.get(id) {
        Some(c) => [Some(c.name.as_str()), c.company.as_deref(), c.email.as_deref()],
        None => [None, None, None],
    }
}

fn client_name<'a>(clients: &'a HashMap<String, Client>, id: &'a str) -> &'a str {
    clients.get(id).map(Client::display_name).unwrap_or(id)
}

fn by_amount(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

pub fn filter_invoices<'a>(
    invoices: &'a [Invoice],
    clients: &HashMap<String, Client>,
    query: &InvoiceQuery,
    today: NaiveDate,
) -> Vec<&'a Invoice> {
    let mut rows: Vec<&Invoice> = invoices
        .iter()
        .filter(|inv| query.client.as_deref().is_none_or(|c| c == inv.client_id))
        .filter(|inv| {
            query
                .status
                .is_none_or(|s| billing::effective_status(inv, today) == s)
        })
        .filter(|inv| {
            let [name, company, email] = client_fields(clients, &inv.client_id);
            matches_search(
                query.search.as_deref(),
                &[Some(inv.number.as_str()), name, company, email, inv.notes.as_deref()],
            )
        })
        .collect();

    rows.sort_by(|a, b| {
        let primary = match query.sort {
            SortKey::Number => Ordering::Equal,
            SortKey::Issued => a.issue_date.cmp(&b.issue_date),
            SortKey::Due => a.due_date.cmp(&b.due_date),
            SortKey::Total => by_amount(a.totals.total, b.totals.total),
            SortKey::Client => client_name(clients, &a.client_id)
                .to_lowercase()
                .cmp(&client_name(clients, &b.client_id).to_lowercase()),
            SortKey::Status => billing::effective_status(a, today)
                .as_str()
                .cmp(billing::effective_status(b, today).as_str()),
        };
        let ord = primary.then_with(|| a.number.cmp(&b.number));
        if query.descending { ord.reverse() } else { ord }
    });
    rows
}

pub fn filter_estimates<'a>(
    estimates: &'a [Estimate],
    clients: &HashMap<String, Client>,
    query: &EstimateQuery,
    today: NaiveDate,
) -> Vec<&'a Estimate> {
    let mut rows: Vec<&Estimate> = estimates
        .iter()
        .filter(|est| query.client.as_deref().is_none_or(|c| c == est.client_id))
        .filter(|est| query.status.is_none_or(|s| est.effective_status(today) == s))
        .filter(|est| {
            let [name, company, email] = client_fields(clients, &est.client_id);
            matches_search(
                query.search.as_deref(),
                &[Some(est.number.as_str()), name, company, email, est.notes.as_deref()],
            )
        })
        .collect();

    rows.sort_by(|a, b| {
        let primary = match query.sort {
            SortKey::Number => Ordering::Equal,
            SortKey::Issued => a.issue_date.cmp(&b.issue_date),
            SortKey::Due => a.expiry_date.cmp(&b.expiry_date),
            SortKey::Total => by_amount(a.totals.total, b.totals.total),
            SortKey::Client => client_name(clients, &a.client_id)
                .to_lowercase()
                .cmp(&client_name(clients, &b.client_id).to_lowercase()),
            SortKey::Status => a
                .effective_status(today)
                .as_str()
                .cmp(b.effective_status(today).as_str()),
        };
        let ord = primary.then_with(|| a.number.cmp(&b.number));
        if query.descending { ord.reverse() } else { ord }
    });
    rows
}
