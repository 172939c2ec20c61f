//! File-backed record store.
//!
//! Layout under the data root:
//!
//! ```text
//! data/clients/<client-id>/info.toml
//! data/invoices/<number>.toml
//! data/estimates/<number>.toml
//! data/payments/<invoice-number>.toml
//! data/reminders/<invoice-number>.toml
//! ```

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::model::{
    Client, Estimate, Invoice, Payment, PaymentLedger, ReminderHistory, ReminderLog,
};

pub const INVOICE_PREFIX: &str = "INV";
pub const ESTIMATE_PREFIX: &str = "EST";

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open the store, creating the directory tree if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { root: root.into() };
        for dir in [
            store.clients_dir(),
            store.invoices_dir(),
            store.estimates_dir(),
            store.payments_dir(),
            store.reminders_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    fn clients_dir(&self) -> PathBuf {
        self.data_dir().join("clients")
    }

    fn invoices_dir(&self) -> PathBuf {
        self.data_dir().join("invoices")
    }

    fn estimates_dir(&self) -> PathBuf {
        self.data_dir().join("estimates")
    }

    fn payments_dir(&self) -> PathBuf {
        self.data_dir().join("payments")
    }

    fn reminders_dir(&self) -> PathBuf {
        self.data_dir().join("reminders")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn outbox_dir(&self) -> PathBuf {
        self.root.join("outbox")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    // ---- clients ----

    fn client_path(&self, id: &str) -> PathBuf {
        self.clients_dir().join(id).join("info.toml")
    }

    pub fn client_exists(&self, id: &str) -> bool {
        self.client_path(id).exists()
    }

    pub fn get_client(&self, id: &str) -> Result<Client> {
        let path = self.client_path(id);
        if !path.exists() {
            return Err(AppError::not_found("client", id));
        }
        read_record(&path)
    }

    pub fn list_clients(&self) -> Result<Vec<Client>> {
        let mut clients = Vec::new();
        for entry in fs::read_dir(self.clients_dir())?.flatten() {
            let path = entry.path().join("info.toml");
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) && path.exists() {
                match read_record::<Client>(&path) {
                    Ok(client) => clients.push(client),
                    Err(e) => {
                        tracing::warn!("Skipping unreadable client {}: {}", path.display(), e)
                    }
                }
            }
        }
        clients.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(clients)
    }

    pub fn save_client(&self, client: &Client) -> Result<()> {
        let path = self.client_path(&client.id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_record(&path, client)
    }

    pub fn delete_client(&self, id: &str) -> Result<()> {
        let dir = self.clients_dir().join(id);
        if !dir.exists() {
            return Err(AppError::not_found("client", id));
        }
        fs::remove_dir_all(dir)?;
        Ok(())
    }

    // ---- invoices ----

    fn invoice_path(&self, number: &str) -> PathBuf {
        self.invoices_dir().join(format!("{}.toml", number))
    }

    pub fn get_invoice(&self, number: &str) -> Result<Invoice> {
        let path = self.invoice_path(number);
        if !path.exists() {
            return Err(AppError::not_found("invoice", number));
        }
        read_record(&path)
    }

    pub fn list_invoices(&self) -> Result<Vec<Invoice>> {
        list_records(&self.invoices_dir())
    }

    pub fn save_invoice(&self, invoice: &Invoice) -> Result<()> {
        write_record(&self.invoice_path(&invoice.number), invoice)
    }

    /// Remove an invoice together with its payments and reminder history.
    pub fn delete_invoice(&self, number: &str) -> Result<()> {
        let path = self.invoice_path(number);
        if !path.exists() {
            return Err(AppError::not_found("invoice", number));
        }
        fs::remove_file(path)?;
        for side in [self.payments_path(number), self.reminders_path(number)] {
            if side.exists() {
                fs::remove_file(side)?;
            }
        }
        Ok(())
    }

    // ---- estimates ----

    fn estimate_path(&self, number: &str) -> PathBuf {
        self.estimates_dir().join(format!("{}.toml", number))
    }

    pub fn get_estimate(&self, number: &str) -> Result<Estimate> {
        let path = self.estimate_path(number);
        if !path.exists() {
            return Err(AppError::not_found("estimate", number));
        }
        read_record(&path)
    }

    pub fn list_estimates(&self) -> Result<Vec<Estimate>> {
        list_records(&self.estimates_dir())
    }

    pub fn save_estimate(&self, estimate: &Estimate) -> Result<()> {
        write_record(&self.estimate_path(&estimate.number), estimate)
    }

    pub fn delete_estimate(&self, number: &str) -> Result<()> {
        let path = self.estimate_path(number);
        if !path.exists() {
            return Err(AppError::not_found("estimate", number));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    // ---- payments ----

    fn payments_path(&self, invoice: &str) -> PathBuf {
        self.payments_dir().join(format!("{}.toml", invoice))
    }

    pub fn payments_for(&self, invoice: &str) -> Result<Vec<Payment>> {
        let path = self.payments_path(invoice);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(read_record::<PaymentLedger>(&path)?.payments)
    }

    /// Payments for every invoice, keyed by invoice number.
    pub fn all_payments(&self) -> Result<HashMap<String, Vec<Payment>>> {
        let ledgers: Vec<PaymentLedger> = list_records(&self.payments_dir())?;
        let mut by_invoice: HashMap<String, Vec<Payment>> = HashMap::new();
        for payment in ledgers.into_iter().flat_map(|l| l.payments) {
            by_invoice.entry(payment.invoice.clone()).or_default().push(payment);
        }
        Ok(by_invoice)
    }

    pub fn save_payments(&self, invoice: &str, payments: &[Payment]) -> Result<()> {
        let ledger = PaymentLedger { payments: payments.to_vec() };
        write_record(&self.payments_path(invoice), &ledger)
    }

    // ---- reminders ----

    fn reminders_path(&self, invoice: &str) -> PathBuf {
        self.reminders_dir().join(format!("{}.toml", invoice))
    }

    pub fn reminders_for(&self, invoice: &str) -> Result<Vec<ReminderHistory>> {
        let path = self.reminders_path(invoice);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(read_record::<ReminderLog>(&path)?.reminders)
    }

    pub fn all_reminders(&self) -> Result<Vec<ReminderHistory>> {
        let logs: Vec<ReminderLog> = list_records(&self.reminders_dir())?;
        Ok(logs.into_iter().flat_map(|l| l.reminders).collect())
    }

    pub fn save_reminders(&self, invoice: &str, reminders: &[ReminderHistory]) -> Result<()> {
        let log = ReminderLog { reminders: reminders.to_vec() };
        write_record(&self.reminders_path(invoice), &log)
    }

    // ---- numbering ----

    /// Next document number for `prefix` on `date`, e.g. `INV20251214-03`.
    /// The sequence continues from the highest number already stored for
    /// that prefix and day.
    pub fn next_number(&self, prefix: &str, date: NaiveDate) -> Result<String> {
        let dir = match prefix {
            ESTIMATE_PREFIX => self.estimates_dir(),
            _ => self.invoices_dir(),
        };
        let day_prefix = format!("{}{}", prefix, date.format("%Y%m%d"));
        let pattern = Regex::new(&format!(r"^{}-(\d+)\.toml$", regex::escape(&day_prefix)))
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let mut next_idx = 1;
        for entry in fs::read_dir(dir)?.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(caps) = pattern.captures(&name) {
                if let Ok(idx) = caps[1].parse::<u32>() {
                    if idx >= next_idx {
                        next_idx = idx + 1;
                    }
                }
            }
        }

        Ok(format!("{}-{:02}", day_prefix, next_idx))
    }
}

fn read_record<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

fn write_record<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    fs::write(path, toml::to_string_pretty(record)?)?;
    Ok(())
}

fn list_records<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "toml"))
        .collect();
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match read_record(&path) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!("Skipping unreadable record {}: {}", path.display(), e),
        }
    }
    Ok(records)
}
