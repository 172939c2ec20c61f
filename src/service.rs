//! Business operations over the store: one method per user-facing action.

use chrono::{Datelike, NaiveDate};
use slug::slugify;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::billing;
use crate::config;
use crate::error::{AppError, Result};
use crate::filter::{self, EstimateQuery, InvoiceQuery};
use crate::mailer::{self, Mailer, OutgoingEmail};
use crate::model::{
    BusinessSettings, Client, Estimate, EstimateDraft, EstimateStatus, Invoice, InvoiceDraft,
    InvoiceStatus, LineItem, NewClient, Payment, ReminderHistory, ReminderStatus, ReminderType,
};
use crate::reminders::{self, HistoryFilter, HistoryRow, PendingReminder};
use crate::render::{self, DocumentContext, DocumentOutput, EmailContext, Renderer};
use crate::report::{self, Summary};
use crate::store::{ESTIMATE_PREFIX, INVOICE_PREFIX, Store};

const LOGO_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "svg", "webp"];

#[derive(Debug, Clone, PartialEq)]
pub struct SendReport {
    pub number: String,
    pub recipient: String,
    pub delivery_id: String,
    pub document: DocumentOutput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub total_paid: f64,
    pub remaining: f64,
    pub status: InvoiceStatus,
}

pub struct Desk<M: Mailer> {
    store: Store,
    settings: BusinessSettings,
    renderer: Renderer,
    mailer: M,
    public_url: Option<String>,
}

impl<M: Mailer> Desk<M> {
    /// Open the desk at `root`, seeding `business.toml` if needed.
    pub fn open(root: &Path, public_url: Option<String>, mailer: M) -> Result<Self> {
        let store = Store::open(root)?;
        let settings = config::load_business_settings(root)?;
        let renderer = Renderer::with_overrides(&store.templates_dir())?;
        Ok(Self { store, settings, renderer, mailer, public_url })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    fn public_url(&self) -> Option<&str> {
        self.public_url.as_deref()
    }

    // ==========================================
    // Clients
    // ==========================================

    pub fn add_client(&self, new: NewClient) -> Result<Client> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("client name is required".into()));
        }
        if let Some(email) = new.email.as_deref() {
            mailer::validate_address(email)
                .map_err(|_| AppError::Validation(format!("invalid email '{}'", email)))?;
        }

        let company = new.company.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
        let id = slugify(company.as_deref().unwrap_or(name));
        if id.is_empty() {
            return Err(AppError::Validation(format!("cannot derive an id from '{}'", name)));
        }
        if self.store.client_exists(&id) {
            return Err(AppError::AlreadyExists { kind: "client", id });
        }

        let client = Client {
            id,
            name: name.to_string(),
            company,
            email: new.email,
            phone: new.phone,
            billing_address: new.billing_address,
            notes: new.notes,
        };
        self.store.save_client(&client)?;
        tracing::info!("Created client {}", client.id);
        Ok(client)
    }

    pub fn client(&self, id: &str) -> Result<Client> {
        self.store.get_client(id)
    }

    pub fn list_clients(&self) -> Result<Vec<Client>> {
        self.store.list_clients()
    }

    pub fn clients_by_id(&self) -> Result<HashMap<String, Client>> {
        Ok(self
            .store
            .list_clients()?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect())
    }

    /// Delete a client that has no invoices or estimates.
    pub fn delete_client(&self, id: &str) -> Result<()> {
        let invoices = self.store.list_invoices()?.iter().filter(|i| i.client_id == id).count();
        let estimates = self.store.list_estimates()?.iter().filter(|e| e.client_id == id).count();
        if invoices + estimates > 0 {
            return Err(AppError::Validation(format!(
                "client {} still has {} invoice(s) and {} estimate(s)",
                id, invoices, estimates
            )));
        }
        self.store.delete_client(id)?;
        tracing::info!("Deleted client {}", id);
        Ok(())
    }

    // ==========================================
    // Invoices
    // ==========================================

    fn validate_items(items: &[LineItem]) -> Result<()> {
        if items.is_empty() {
            return Err(AppError::Validation("at least one line item is required".into()));
        }
        for item in items {
            if item.description.trim().is_empty() {
                return Err(AppError::Validation("line item description is empty".into()));
            }
            if !(item.quantity.is_finite() && item.rate.is_finite())
                || item.quantity < 0.0
                || item.rate < 0.0
            {
                return Err(AppError::Validation(format!(
                    "invalid quantity or rate for '{}'",
                    item.description
                )));
            }
        }
        Ok(())
    }

    fn check_monthly_limit(&self, issue_date: NaiveDate) -> Result<()> {
        let Some(limit) = self.settings.limits.monthly_invoices else {
            return Ok(());
        };
        let this_month = self
            .store
            .list_invoices()?
            .iter()
            .filter(|i| {
                i.issue_date.year() == issue_date.year()
                    && i.issue_date.month() == issue_date.month()
            })
            .count();
        if this_month >= limit as usize {
            tracing::warn!("Monthly invoice limit {} reached", limit);
            return Err(AppError::LimitReached { limit });
        }
        Ok(())
    }

    /// Fill defaults into a draft and build the invoice record under `number`.
    fn build_invoice(&self, number: String, draft: InvoiceDraft) -> Result<Invoice> {
        Self::validate_items(&draft.items)?;
        if !matches!(draft.status, InvoiceStatus::Draft | InvoiceStatus::Pending) {
            return Err(AppError::Validation(format!(
                "new invoices start as draft or pending, not {}",
                draft.status
            )));
        }
        self.store.get_client(&draft.client_id)?;

        let defaults = &self.settings.defaults;
        let terms_days = draft
            .payment_terms
            .as_ref()
            .filter(|t| t.enabled)
            .map(|t| t.due_days)
            .unwrap_or(defaults.payment_terms_days);
        let due_date = draft
            .due_date
            .unwrap_or_else(|| billing::due_date_for(draft.issue_date, terms_days));
        if due_date < draft.issue_date {
            return Err(AppError::Validation("due date is before the issue date".into()));
        }

        let tax_rate = draft.tax_rate.unwrap_or(defaults.tax_rate);
        let totals = billing::compute_totals(&draft.items, draft.discount, tax_rate);

        Ok(Invoice {
            number,
            client_id: draft.client_id,
            issue_date: draft.issue_date,
            due_date,
            items: draft.items,
            discount: draft.discount,
            tax_rate,
            totals,
            status: draft.status,
            currency: draft.currency.unwrap_or_else(|| defaults.currency.clone()).to_uppercase(),
            notes: draft.notes,
            payment_terms: draft.payment_terms,
            late_fees: draft
                .late_fees
                .or_else(|| defaults.late_fees.filter(|p| p.enabled)),
            reminders: draft.reminders,
            theme: draft.theme.unwrap_or_else(|| defaults.theme.clone()),
            sent_on: None,
            paid_on: None,
            source_estimate: None,
        })
    }

    pub fn create_invoice(&self, draft: InvoiceDraft) -> Result<Invoice> {
        self.check_monthly_limit(draft.issue_date)?;
        let number = self.store.next_number(INVOICE_PREFIX, draft.issue_date)?;
        let invoice = self.build_invoice(number, draft)?;
        self.store.save_invoice(&invoice)?;
        tracing::info!("Created invoice {} for {}", invoice.number, invoice.client_id);
        Ok(invoice)
    }

    /// Replace the contents of an invoice that hasn't gone out yet.
    pub fn update_invoice(&self, number: &str, draft: InvoiceDraft) -> Result<Invoice> {
        let existing = self.store.get_invoice(number)?;
        if !matches!(existing.status, InvoiceStatus::Draft | InvoiceStatus::Pending) {
            return Err(AppError::InvalidTransition {
                kind: "invoice",
                id: number.to_string(),
                status: existing.status.to_string(),
                action: "edit",
            });
        }
        let mut invoice = self.build_invoice(number.to_string(), draft)?;
        invoice.source_estimate = existing.source_estimate;
        self.store.save_invoice(&invoice)?;
        tracing::info!("Updated invoice {}", number);
        Ok(invoice)
    }

    pub fn invoice(&self, number: &str) -> Result<Invoice> {
        self.store.get_invoice(number)
    }

    pub fn list_invoices(&self, query: &InvoiceQuery, today: NaiveDate) -> Result<Vec<Invoice>> {
        let invoices = self.store.list_invoices()?;
        let clients = self.clients_by_id()?;
        Ok(filter::filter_invoices(&invoices, &clients, query, today)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn delete_invoice(&self, number: &str) -> Result<()> {
        self.store.delete_invoice(number)?;
        tracing::info!("Deleted invoice {}", number);
        Ok(())
    }

    pub fn set_invoice_status(
        &self,
        number: &str,
        status: InvoiceStatus,
        today: NaiveDate,
    ) -> Result<Invoice> {
        let mut invoice = self.store.get_invoice(number)?;
        let was_paid = invoice.is_paid();
        invoice.transition(status, today)?;
        self.store.save_invoice(&invoice)?;
        if invoice.is_paid() {
            self.cancel_scheduled_reminders(number)?;
        } else if was_paid {
            self.reschedule_paid_reminders(number)?;
        }
        tracing::info!("Invoice {} is now {}", number, invoice.status);
        Ok(invoice)
    }

    fn output_dir_for(&self, client_id: &str, issue_date: NaiveDate) -> PathBuf {
        self.store
            .output_dir()
            .join(issue_date.format("%Y").to_string())
            .join(client_id)
    }

    /// Write the HTML preview, typst source and (when possible) PDF.
    pub fn render_invoice(&self, number: &str, today: NaiveDate) -> Result<DocumentOutput> {
        let invoice = self.store.get_invoice(number)?;
        let client = self.store.get_client(&invoice.client_id)?;
        let paid = billing::total_paid(&self.store.payments_for(number)?);
        let (settings, public_url) = (&self.settings, self.public_url());
        let ctx =
            DocumentContext::for_invoice(&invoice, &client, settings, public_url, paid, today);
        render::write_document(
            &self.renderer,
            &ctx,
            &self.output_dir_for(&invoice.client_id, invoice.issue_date),
            &invoice.number,
        )
    }

    fn recipient(client: &Client) -> Result<String> {
        client
            .email
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::Delivery(format!("client {} has no email address", client.id)))
    }

    fn deliver(
        &self,
        to: &str,
        subject: String,
        html: String,
        attachments: Vec<PathBuf>,
    ) -> Result<String> {
        self.mailer.send(&OutgoingEmail {
            from: self.settings.business.email.clone(),
            to: to.to_string(),
            subject,
            html,
            attachments,
        })
    }

    /// Render and email an invoice, then mark it sent. Scheduled reminders
    /// for future trigger dates are recorded at the same time.
    pub fn send_invoice(&self, number: &str, today: NaiveDate) -> Result<SendReport> {
        let mut invoice = self.store.get_invoice(number)?;
        if invoice.is_paid() {
            return Err(AppError::InvalidTransition {
                kind: "invoice",
                id: number.to_string(),
                status: invoice.status.to_string(),
                action: "send",
            });
        }
        let client = self.store.get_client(&invoice.client_id)?;
        let to = Self::recipient(&client)?;
        let paid = billing::total_paid(&self.store.payments_for(number)?);

        let document = self.render_invoice(number, today)?;
        let public_url = self.public_url();
        let ctx =
            EmailContext::for_invoice(&invoice, &client, &self.settings, public_url, paid, today);
        let email = self.renderer.invoice_email(&ctx)?;
        let attachments = document.pdf_path.iter().cloned().collect();
        let delivery_id = self.deliver(&to, email.subject, email.html, attachments)?;

        invoice.transition(InvoiceStatus::Sent, today)?;
        self.store.save_invoice(&invoice)?;
        self.schedule_reminders(&invoice, &to, today)?;
        tracing::info!("Sent invoice {} to {}", number, to);

        Ok(SendReport { number: number.to_string(), recipient: to, delivery_id, document })
    }

    pub fn payments_for(&self, number: &str) -> Result<Vec<Payment>> {
        self.store.payments_for(number)
    }

    /// Record a (possibly partial) payment. The invoice flips to paid once
    /// payments cover its total.
    pub fn record_payment(
        &self,
        number: &str,
        amount: f64,
        date: NaiveDate,
        method: &str,
        reference: Option<String>,
    ) -> Result<PaymentOutcome> {
        let mut invoice = self.store.get_invoice(number)?;
        if invoice.is_draft() || invoice.is_paid() {
            return Err(AppError::InvalidTransition {
                kind: "invoice",
                id: number.to_string(),
                status: invoice.status.to_string(),
                action: "record a payment on",
            });
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::Validation("payment amount must be positive".into()));
        }

        let mut payments = self.store.payments_for(number)?;
        let remaining = billing::remaining_balance(&invoice, billing::total_paid(&payments));
        let amount = crate::money::round_cents(amount);
        if amount > remaining {
            return Err(AppError::Validation(format!(
                "payment of {:.2} exceeds the remaining balance of {:.2}",
                amount, remaining
            )));
        }

        let payment = Payment {
            id: format!("{}-P{}", number, payments.len() + 1),
            invoice: number.to_string(),
            amount,
            date,
            method: method.to_string(),
            reference,
        };
        payments.push(payment.clone());
        self.store.save_payments(number, &payments)?;

        let total_paid = billing::total_paid(&payments);
        let remaining = billing::remaining_balance(&invoice, total_paid);
        if remaining <= 0.0 {
            invoice.transition(InvoiceStatus::Paid, date)?;
            self.store.save_invoice(&invoice)?;
            self.cancel_scheduled_reminders(number)?;
            tracing::info!("Invoice {} paid in full", number);
        } else {
            tracing::info!("Recorded partial payment on {}; {:.2} remaining", number, remaining);
        }

        Ok(PaymentOutcome { payment, total_paid, remaining, status: invoice.status })
    }

    // ==========================================
    // Estimates
    // ==========================================

    pub fn create_estimate(&self, draft: EstimateDraft) -> Result<Estimate> {
        Self::validate_items(&draft.items)?;
        self.store.get_client(&draft.client_id)?;

        let defaults = &self.settings.defaults;
        let expiry_date = draft
            .expiry_date
            .unwrap_or_else(|| {
                billing::due_date_for(draft.issue_date, defaults.estimate_valid_days)
            });
        if expiry_date < draft.issue_date {
            return Err(AppError::Validation("expiry date is before the issue date".into()));
        }
        let tax_rate = draft.tax_rate.unwrap_or(defaults.tax_rate);

        let estimate = Estimate {
            number: self.store.next_number(ESTIMATE_PREFIX, draft.issue_date)?,
            client_id: draft.client_id,
            issue_date: draft.issue_date,
            expiry_date,
            totals: billing::compute_totals(&draft.items, draft.discount, tax_rate),
            items: draft.items,
            discount: draft.discount,
            tax_rate,
            status: EstimateStatus::Draft,
            currency: draft.currency.unwrap_or_else(|| defaults.currency.clone()).to_uppercase(),
            notes: draft.notes,
            theme: draft.theme.unwrap_or_else(|| defaults.theme.clone()),
            sent_on: None,
            decided_on: None,
            converted_invoice: None,
        };
        self.store.save_estimate(&estimate)?;
        tracing::info!("Created estimate {} for {}", estimate.number, estimate.client_id);
        Ok(estimate)
    }

    pub fn estimate(&self, number: &str) -> Result<Estimate> {
        self.store.get_estimate(number)
    }

    pub fn list_estimates(&self, query: &EstimateQuery, today: NaiveDate) -> Result<Vec<Estimate>> {
        let estimates = self.store.list_estimates()?;
        let clients = self.clients_by_id()?;
        Ok(filter::filter_estimates(&estimates, &clients, query, today)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn delete_estimate(&self, number: &str) -> Result<()> {
        self.store.delete_estimate(number)?;
        tracing::info!("Deleted estimate {}", number);
        Ok(())
    }

    pub fn render_estimate(&self, number: &str, today: NaiveDate) -> Result<DocumentOutput> {
        let estimate = self.store.get_estimate(number)?;
        let client = self.store.get_client(&estimate.client_id)?;
        let public_url = self.public_url();
        let ctx =
            DocumentContext::for_estimate(&estimate, &client, &self.settings, public_url, today);
        render::write_document(
            &self.renderer,
            &ctx,
            &self.output_dir_for(&estimate.client_id, estimate.issue_date),
            &estimate.number,
        )
    }

    pub fn send_estimate(&self, number: &str, today: NaiveDate) -> Result<SendReport> {
        let mut estimate = self.store.get_estimate(number)?;
        if estimate.effective_status(today) == EstimateStatus::Expired {
            return Err(AppError::InvalidTransition {
                kind: "estimate",
                id: number.to_string(),
                status: EstimateStatus::Expired.to_string(),
                action: "send",
            });
        }
        // Check the transition before anything goes out.
        estimate.clone().transition(EstimateStatus::Sent, today)?;

        let client = self.store.get_client(&estimate.client_id)?;
        let to = Self::recipient(&client)?;
        let document = self.render_estimate(number, today)?;
        let ctx = EmailContext::for_estimate(&estimate, &client, &self.settings, self.public_url());
        let email = self.renderer.estimate_email(&ctx)?;
        let attachments = document.pdf_path.iter().cloned().collect();
        let delivery_id = self.deliver(&to, email.subject, email.html, attachments)?;

        estimate.transition(EstimateStatus::Sent, today)?;
        self.store.save_estimate(&estimate)?;
        tracing::info!("Sent estimate {} to {}", number, to);

        Ok(SendReport { number: number.to_string(), recipient: to, delivery_id, document })
    }

    /// Approve, reject or expire an estimate.
    pub fn set_estimate_status(
        &self,
        number: &str,
        status: EstimateStatus,
        today: NaiveDate,
    ) -> Result<Estimate> {
        let mut estimate = self.store.get_estimate(number)?;
        if status == EstimateStatus::Converted {
            return Err(AppError::Validation(format!(
                "use convert to turn estimate {} into an invoice",
                number
            )));
        }
        if status == EstimateStatus::Approved
            && estimate.effective_status(today) == EstimateStatus::Expired
        {
            return Err(AppError::InvalidTransition {
                kind: "estimate",
                id: number.to_string(),
                status: EstimateStatus::Expired.to_string(),
                action: "approve",
            });
        }
        estimate.transition(status, today)?;
        self.store.save_estimate(&estimate)?;
        tracing::info!("Estimate {} is now {}", number, estimate.status);
        Ok(estimate)
    }

    /// Persist `expired` on every sent estimate past its expiry date.
    pub fn expire_estimates(&self, today: NaiveDate) -> Result<Vec<String>> {
        let mut expired = Vec::new();
        for mut estimate in self.store.list_estimates()? {
            if estimate.status == EstimateStatus::Sent
                && estimate.effective_status(today) == EstimateStatus::Expired
            {
                estimate.transition(EstimateStatus::Expired, today)?;
                self.store.save_estimate(&estimate)?;
                expired.push(estimate.number);
            }
        }
        if !expired.is_empty() {
            tracing::info!("Expired {} estimate(s)", expired.len());
        }
        Ok(expired)
    }

    /// Turn an approved estimate into a draft invoice dated `today`.
    pub fn convert_estimate(&self, number: &str, today: NaiveDate) -> Result<Invoice> {
        let mut estimate = self.store.get_estimate(number)?;
        estimate.clone().transition(EstimateStatus::Converted, today)?;
        self.check_monthly_limit(today)?;

        let mut draft =
            InvoiceDraft::new(estimate.client_id.clone(), today, estimate.items.clone());
        draft.discount = estimate.discount;
        draft.tax_rate = Some(estimate.tax_rate);
        draft.currency = Some(estimate.currency.clone());
        draft.notes = estimate.notes.clone();
        draft.theme = Some(estimate.theme.clone());

        let invoice_number = self.store.next_number(INVOICE_PREFIX, today)?;
        let mut invoice = self.build_invoice(invoice_number, draft)?;
        invoice.source_estimate = Some(estimate.number.clone());
        self.store.save_invoice(&invoice)?;

        estimate.transition(EstimateStatus::Converted, today)?;
        estimate.converted_invoice = Some(invoice.number.clone());
        self.store.save_estimate(&estimate)?;

        tracing::info!("Converted estimate {} into invoice {}", number, invoice.number);
        Ok(invoice)
    }

    // ==========================================
    // Reminders
    // ==========================================

    fn next_reminder_id(number: &str, log: &[ReminderHistory]) -> String {
        format!("{}-R{}", number, log.len() + 1)
    }

    fn schedule_reminders(
        &self,
        invoice: &Invoice,
        recipient: &str,
        today: NaiveDate,
    ) -> Result<()> {
        let plan = reminders::upcoming(invoice, &self.settings.defaults, today);
        if plan.is_empty() {
            return Ok(());
        }
        let mut log = self.store.reminders_for(&invoice.number)?;
        for (trigger_date, reminder_type) in plan {
            if log.iter().any(|h| h.trigger_date == Some(trigger_date)) {
                continue;
            }
            log.push(ReminderHistory {
                id: Self::next_reminder_id(&invoice.number, &log),
                invoice: invoice.number.clone(),
                reminder_type,
                reminder_status: ReminderStatus::Scheduled,
                overdue_days: (trigger_date - invoice.due_date).num_days().max(0),
                sent_on: today,
                trigger_date: Some(trigger_date),
                recipient: Some(recipient.to_string()),
                failure_reason: None,
            });
        }
        self.store.save_reminders(&invoice.number, &log)
    }

    fn cancel_scheduled_reminders(&self, number: &str) -> Result<()> {
        let mut log = self.store.reminders_for(number)?;
        let mut changed = false;
        for entry in log.iter_mut().filter(|h| h.reminder_status == ReminderStatus::Scheduled) {
            entry.reminder_status = ReminderStatus::Cancelled;
            entry.failure_reason = Some(reminders::CANCELLED_AS_PAID.into());
            changed = true;
        }
        if changed {
            self.store.save_reminders(number, &log)?;
            tracing::info!("Cancelled scheduled reminders for {}", number);
        }
        Ok(())
    }

    /// Undo [`Self::cancel_scheduled_reminders`] once an invoice is unpaid again.
    fn reschedule_paid_reminders(&self, number: &str) -> Result<()> {
        let mut log = self.store.reminders_for(number)?;
        let mut changed = false;
        for entry in log.iter_mut().filter(|h| {
            h.reminder_status == ReminderStatus::Cancelled
                && h.failure_reason.as_deref() == Some(reminders::CANCELLED_AS_PAID)
        }) {
            entry.reminder_status = ReminderStatus::Scheduled;
            entry.failure_reason = None;
            changed = true;
        }
        if changed {
            self.store.save_reminders(number, &log)?;
            tracing::info!("Rescheduled reminders for {}", number);
        }
        Ok(())
    }

    pub fn due_reminders(&self, today: NaiveDate) -> Result<Vec<PendingReminder>> {
        Ok(reminders::due_reminders(
            &self.store.list_invoices()?,
            &self.store.all_reminders()?,
            &self.settings.defaults,
            today,
        ))
    }

    /// Render and deliver one reminder, recording the outcome. Delivery
    /// failures are written to history before the error is returned.
    fn deliver_reminder(
        &self,
        invoice: &Invoice,
        reminder_type: ReminderType,
        trigger_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<ReminderHistory> {
        let client = self.store.get_client(&invoice.client_id)?;
        let paid = billing::total_paid(&self.store.payments_for(&invoice.number)?);
        let overdue = billing::overdue_days(invoice, today);

        let outcome = Self::recipient(&client).and_then(|to| {
            let ctx = EmailContext::for_reminder(
                invoice,
                &client,
                &self.settings,
                self.public_url(),
                paid,
                today,
                reminder_type,
            );
            let email = self.renderer.reminder_email(&ctx)?;
            self.deliver(&to, email.subject, email.html, Vec::new())
                .map_err(|e| match e {
                    AppError::Delivery(_) => e,
                    other => AppError::Delivery(other.to_string()),
                })?;
            Ok(to)
        });

        let mut log = self.store.reminders_for(&invoice.number)?;
        let slot = trigger_date.and_then(|d| {
            log.iter().position(|h| {
                h.trigger_date == Some(d) && h.reminder_status == ReminderStatus::Scheduled
            })
        });
        let entry = ReminderHistory {
            id: match slot {
                Some(i) => log[i].id.clone(),
                None => Self::next_reminder_id(&invoice.number, &log),
            },
            invoice: invoice.number.clone(),
            reminder_type,
            reminder_status: if outcome.is_ok() {
                ReminderStatus::Sent
            } else {
                ReminderStatus::Failed
            },
            overdue_days: overdue,
            sent_on: today,
            trigger_date,
            recipient: outcome.as_ref().ok().cloned().or_else(|| client.email.clone()),
            failure_reason: outcome.as_ref().err().map(|e| e.to_string()),
        };
        match slot {
            Some(i) => log[i] = entry.clone(),
            None => log.push(entry.clone()),
        }
        self.store.save_reminders(&invoice.number, &log)?;

        match outcome {
            Ok(to) => {
                tracing::info!("Sent {} reminder for {} to {}", reminder_type, invoice.number, to);
                Ok(entry)
            }
            Err(e) => {
                tracing::error!("Reminder for {} failed: {}", invoice.number, e);
                Err(e)
            }
        }
    }

    /// Send a reminder now, outside the schedule. The tone follows how late
    /// the invoice is unless `reminder_type` overrides it.
    pub fn send_reminder(
        &self,
        number: &str,
        reminder_type: Option<ReminderType>,
        today: NaiveDate,
    ) -> Result<ReminderHistory> {
        let invoice = self.store.get_invoice(number)?;
        if !reminders::accepts_reminders(&invoice) {
            return Err(AppError::InvalidTransition {
                kind: "invoice",
                id: number.to_string(),
                status: invoice.status.to_string(),
                action: "send a reminder for",
            });
        }
        let overdue = billing::overdue_days(&invoice, today);
        let reminder_type =
            reminder_type.unwrap_or_else(|| reminders::reminder_type_for(overdue));
        self.deliver_reminder(&invoice, reminder_type, None, today)
    }

    /// Deliver every reminder that is due. Failures are recorded and the run
    /// carries on; the returned entries include them.
    pub fn run_due_reminders(&self, today: NaiveDate) -> Result<Vec<ReminderHistory>> {
        let pending = self.due_reminders(today)?;
        let mut results = Vec::with_capacity(pending.len());

        for reminder in pending {
            let invoice = self.store.get_invoice(&reminder.invoice)?;
            let log = self.store.reminders_for(&invoice.number)?;
            let defaults = &self.settings.defaults;
            let skipped = reminders::skipped_triggers(&invoice, defaults, &log, &reminder);
            if !skipped.is_empty() {
                self.cancel_triggers(&invoice, &skipped, today)?;
            }

            let trigger = Some(reminder.trigger_date);
            match self.deliver_reminder(&invoice, reminder.reminder_type, trigger, today) {
                Ok(entry) => results.push(entry),
                Err(AppError::Delivery(_)) => {
                    let log = self.store.reminders_for(&invoice.number)?;
                    if let Some(failed) = log.into_iter().rev().find(|h| {
                        h.trigger_date == Some(reminder.trigger_date)
                            && h.reminder_status == ReminderStatus::Failed
                    }) {
                        results.push(failed);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    /// Close out missed triggers that a later reminder supersedes.
    fn cancel_triggers(
        &self,
        invoice: &Invoice,
        dates: &[NaiveDate],
        today: NaiveDate,
    ) -> Result<()> {
        let mut log = self.store.reminders_for(&invoice.number)?;
        for date in dates {
            match log.iter_mut().find(|h| h.trigger_date == Some(*date)) {
                Some(entry) => {
                    entry.reminder_status = ReminderStatus::Cancelled;
                    entry.failure_reason = Some(match entry.failure_reason.take() {
                        Some(error) => format!("{}; {}", error, reminders::SUPERSEDED),
                        None => reminders::SUPERSEDED.into(),
                    });
                }
                None => {
                    let id = Self::next_reminder_id(&invoice.number, &log);
                    let days_after_due = (*date - invoice.due_date).num_days();
                    log.push(ReminderHistory {
                        id,
                        invoice: invoice.number.clone(),
                        reminder_type: reminders::reminder_type_for(days_after_due),
                        reminder_status: ReminderStatus::Cancelled,
                        overdue_days: days_after_due.max(0),
                        sent_on: today,
                        trigger_date: Some(*date),
                        recipient: None,
                        failure_reason: Some(reminders::SUPERSEDED.into()),
                    });
                }
            }
        }
        self.store.save_reminders(&invoice.number, &log)
    }

    pub fn reminder_history(
        &self,
        filter: &HistoryFilter,
        today: NaiveDate,
    ) -> Result<Vec<HistoryRow>> {
        Ok(reminders::history_view(
            &self.store.all_reminders()?,
            &self.store.list_invoices()?,
            &self.store.all_payments()?,
            filter,
            today,
        ))
    }

    // ==========================================
    // Settings
    // ==========================================

    pub fn settings(&self) -> &BusinessSettings {
        &self.settings
    }

    pub fn save_settings(&mut self, settings: BusinessSettings) -> Result<()> {
        if settings.business.name.trim().is_empty() {
            return Err(AppError::Validation("business name is required".into()));
        }
        mailer::validate_address(&settings.business.email).map_err(|_| {
            AppError::Validation(format!("invalid business email '{}'", settings.business.email))
        })?;
        config::save_business_settings(self.store.root(), &settings)?;
        self.settings = settings;
        tracing::info!("Saved business settings");
        Ok(())
    }

    /// Copy a logo into the data root and point the business profile at it.
    pub fn upload_logo(&mut self, source: &Path) -> Result<PathBuf> {
        let ext = source
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .filter(|e| LOGO_EXTENSIONS.contains(&e.as_str()))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "logo must be one of: {}",
                    LOGO_EXTENSIONS.join(", ")
                ))
            })?;
        if !source.is_file() {
            return Err(AppError::not_found("logo file", source.display().to_string()));
        }

        let assets = self.store.assets_dir();
        fs::create_dir_all(&assets)?;
        let target = assets.join(format!("logo.{}", ext));
        fs::copy(source, &target)?;

        let mut settings = self.settings.clone();
        settings.business.logo_path = Some(target.to_string_lossy().to_string());
        config::save_business_settings(self.store.root(), &settings)?;
        self.settings = settings;
        tracing::info!("Logo stored at {}", target.display());
        Ok(target)
    }

    // ==========================================
    // Dashboard
    // ==========================================

    pub fn summary(&self, year: i32, today: NaiveDate) -> Result<Summary> {
        Ok(report::summarize(
            &self.store.list_invoices()?,
            &self.clients_by_id()?,
            &self.store.all_payments()?,
            year,
            today,
        ))
    }
}
