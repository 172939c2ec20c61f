//! Template selection and rendering.
//!
//! Four document layouts share `document_base.html`; the template id on a
//! record's theme picks one. Emails extend `email_base.html`. PDFs go through
//! a typst source file compiled by the `typst` binary.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tera::{Context, Tera, Value};

use crate::billing;
use crate::error::Result;
use crate::model::{
    BusinessProfile, BusinessSettings, Client, Discount, Estimate, Invoice, LateFeeKind,
    LineItem, ReminderType, Theme,
};
use crate::money::format_money;

pub const DATE_FORMAT: &str = "%m/%d/%Y";

const CLASSIC_PRIMARY: &str = "#111827";
const CLASSIC_ACCENT: &str = "#374151";

/// Embedded at compile time so rendering works without a templates folder.
const EMBEDDED_TEMPLATES: [(&str, &str); 10] = [
    ("document_base.html", include_str!("../templates/document_base.html")),
    ("document_classic.html", include_str!("../templates/document_classic.html")),
    ("document_modern.html", include_str!("../templates/document_modern.html")),
    ("document_minimal.html", include_str!("../templates/document_minimal.html")),
    ("document_bold.html", include_str!("../templates/document_bold.html")),
    ("email_base.html", include_str!("../templates/email_base.html")),
    ("email_invoice.html", include_str!("../templates/email_invoice.html")),
    ("email_estimate.html", include_str!("../templates/email_estimate.html")),
    ("email_reminder.html", include_str!("../templates/email_reminder.html")),
    ("invoice.typ", include_str!("../templates/invoice.typ")),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateId {
    /// Fixed black-and-grey layout; ignores theme colors.
    Classic = 1,
    Modern = 2,
    Minimal = 3,
    Bold = 4,
}

impl TemplateId {
    /// Unknown ids fall back to the classic layout.
    pub fn from_id(id: u8) -> Self {
        match id {
            2 => TemplateId::Modern,
            3 => TemplateId::Minimal,
            4 => TemplateId::Bold,
            _ => TemplateId::Classic,
        }
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            TemplateId::Classic => "document_classic.html",
            TemplateId::Modern => "document_modern.html",
            TemplateId::Minimal => "document_minimal.html",
            TemplateId::Bold => "document_bold.html",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TemplateId::Classic => "Classic",
            TemplateId::Modern => "Modern",
            TemplateId::Minimal => "Minimal",
            TemplateId::Bold => "Bold",
        }
    }

    pub fn uses_theme_colors(&self) -> bool {
        *self != TemplateId::Classic
    }

    /// `(primary, accent)` colors this layout renders with.
    pub fn colors(&self, theme: &Theme) -> (String, String) {
        if self.uses_theme_colors() {
            (theme.primary_color.clone(), theme.accent_color.clone())
        } else {
            (CLASSIC_PRIMARY.to_string(), CLASSIC_ACCENT.to_string())
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentMethodView {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientView {
    pub display_name: String,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl ClientView {
    fn from_client(client: &Client) -> Self {
        Self {
            display_name: client.display_name().to_string(),
            name: client.name.clone(),
            company: client.company.clone(),
            email: client.email.clone(),
            address: client.billing_address.as_ref().map(|a| a.one_line()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    pub description: String,
    pub quantity: String,
    pub rate: String,
    pub amount: String,
}

/// Everything a document layout needs, pre-formatted.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentContext {
    #[serde(skip)]
    pub template: Option<TemplateId>,
    pub kind: &'static str,
    pub number: String,
    pub status: String,
    pub issue_date: String,
    pub due_label: &'static str,
    pub due_date: String,
    pub business: BusinessProfile,
    pub logo: Option<String>,
    pub payment_methods: Vec<PaymentMethodView>,
    pub client: ClientView,
    pub items: Vec<ItemView>,
    pub subtotal: String,
    pub discount: Option<String>,
    pub tax: Option<String>,
    pub tax_rate: String,
    pub total: String,
    pub amount_paid: Option<String>,
    pub late_fee: Option<String>,
    pub balance_due: Option<String>,
    pub is_paid: bool,
    pub notes: Option<String>,
    pub payment_terms: Option<String>,
    pub primary_color: String,
    pub accent_color: String,
    pub view_url: Option<String>,
}

fn payment_method_views(settings: &BusinessSettings) -> Vec<PaymentMethodView> {
    settings
        .payment
        .listed()
        .into_iter()
        .map(|(label, value)| PaymentMethodView {
            label: label.to_string(),
            value: value.to_string(),
        })
        .collect()
}

fn item_views(items: &[LineItem], currency: &str) -> Vec<ItemView> {
    items
        .iter()
        .map(|item| ItemView {
            description: item.description.clone(),
            quantity: format_quantity(item.quantity),
            rate: format_money(item.rate, currency),
            amount: format_money(item.amount(), currency),
        })
        .collect()
}

fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{}", quantity as i64)
    } else {
        format!("{}", quantity)
    }
}

fn format_rate(rate: f64) -> String {
    let s = format!("{:.3}", rate);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn non_zero(amount: f64, currency: &str) -> Option<String> {
    (amount > 0.0).then(|| format_money(amount, currency))
}

pub fn view_url(public_url: Option<&str>, kind: &str, number: &str) -> Option<String> {
    public_url
        .map(|base| base.trim_end_matches('/'))
        .filter(|base| !base.is_empty())
        .map(|base| format!("{}/{}/{}", base, kind, number))
}

impl DocumentContext {
    pub fn for_invoice(
        invoice: &Invoice,
        client: &Client,
        settings: &BusinessSettings,
        public_url: Option<&str>,
        paid: f64,
        today: NaiveDate,
    ) -> Self {
        let template = TemplateId::from_id(invoice.theme.template_id);
        let (primary_color, accent_color) = template.colors(&invoice.theme);
        let currency = invoice.currency.as_str();
        let due = billing::balance_due(invoice, paid, today);

        Self {
            template: Some(template),
            kind: "Invoice",
            number: invoice.number.clone(),
            status: billing::effective_status(invoice, today).to_string(),
            issue_date: invoice.issue_date.format(DATE_FORMAT).to_string(),
            due_label: "Due",
            due_date: invoice.due_date.format(DATE_FORMAT).to_string(),
            business: settings.business.clone(),
            logo: settings.business.logo_path.clone(),
            payment_methods: payment_method_views(settings),
            client: ClientView::from_client(client),
            items: item_views(&invoice.items, currency),
            subtotal: format_money(invoice.totals.subtotal, currency),
            discount: non_zero(invoice.totals.discount, currency),
            tax: non_zero(invoice.totals.tax, currency),
            tax_rate: format_rate(invoice.tax_rate),
            total: format_money(invoice.totals.total, currency),
            amount_paid: non_zero(paid, currency),
            late_fee: non_zero(due.late_fee, currency),
            balance_due: (paid > 0.0 || due.late_fee > 0.0)
                .then(|| format_money(due.total_payable, currency)),
            is_paid: invoice.is_paid(),
            notes: invoice.notes.clone(),
            payment_terms: invoice
                .payment_terms
                .as_ref()
                .filter(|t| t.enabled && !t.description.trim().is_empty())
                .map(|t| t.description.clone()),
            primary_color,
            accent_color,
            view_url: view_url(public_url, "invoices", &invoice.number),
        }
    }

    pub fn for_estimate(
        estimate: &Estimate,
        client: &Client,
        settings: &BusinessSettings,
        public_url: Option<&str>,
        today: NaiveDate,
    ) -> Self {
        let template = TemplateId::from_id(estimate.theme.template_id);
        let (primary_color, accent_color) = template.colors(&estimate.theme);
        let currency = estimate.currency.as_str();

        Self {
            template: Some(template),
            kind: "Estimate",
            number: estimate.number.clone(),
            status: estimate.effective_status(today).to_string(),
            issue_date: estimate.issue_date.format(DATE_FORMAT).to_string(),
            due_label: "Valid until",
            due_date: estimate.expiry_date.format(DATE_FORMAT).to_string(),
            business: settings.business.clone(),
            logo: settings.business.logo_path.clone(),
            payment_methods: Vec::new(),
            client: ClientView::from_client(client),
            items: item_views(&estimate.items, currency),
            subtotal: format_money(estimate.totals.subtotal, currency),
            discount: non_zero(estimate.totals.discount, currency),
            tax: non_zero(estimate.totals.tax, currency),
            tax_rate: format_rate(estimate.tax_rate),
            total: format_money(estimate.totals.total, currency),
            amount_paid: None,
            late_fee: None,
            balance_due: None,
            is_paid: false,
            notes: estimate.notes.clone(),
            payment_terms: None,
            primary_color,
            accent_color,
            view_url: view_url(public_url, "estimates", &estimate.number),
        }
    }
}

/// Context shared by the three email templates.
#[derive(Debug, Clone, Serialize)]
pub struct EmailContext {
    pub subject: String,
    pub kind: &'static str,
    pub number: String,
    pub client_name: String,
    pub business: BusinessProfile,
    pub logo: Option<String>,
    pub payment_methods: Vec<PaymentMethodView>,
    pub primary_color: String,
    pub accent_color: String,
    pub view_url: Option<String>,
    pub issue_date: String,
    pub due_date: String,
    pub total: String,
    pub amount_due: String,
    pub notes: Option<String>,
    pub late_fee_notice: Option<String>,
    pub reminder_type: Option<ReminderType>,
    pub overdue_days: i64,
    pub late_fee: Option<String>,
    pub total_payable: String,
}

fn greeting_name(client: &Client) -> String {
    client.name.split_whitespace().next().unwrap_or(&client.name).to_string()
}

fn late_fee_notice(invoice: &Invoice) -> Option<String> {
    let policy = invoice.late_fees.as_ref().filter(|p| p.enabled)?;
    let fee = match policy.kind {
        LateFeeKind::Fixed => format_money(policy.amount, &invoice.currency),
        LateFeeKind::Percentage => format!("{}%", format_rate(policy.amount)),
    };
    Some(format!(
        "A late fee of {} applies to payments received more than {} day{} after the due date.",
        fee,
        policy.grace_period,
        if policy.grace_period == 1 { "" } else { "s" }
    ))
}

pub fn reminder_subject(
    reminder_type: ReminderType,
    number: &str,
    due: &str,
    overdue_days: i64,
) -> String {
    match reminder_type {
        ReminderType::Friendly => format!("Reminder: invoice {} is due {}", number, due),
        ReminderType::Polite => format!("Invoice {} is past due", number),
        ReminderType::Firm => {
            format!("Second notice: invoice {} is {} days overdue", number, overdue_days)
        }
        ReminderType::Urgent => {
            format!("URGENT: invoice {} is {} days overdue", number, overdue_days)
        }
    }
}

impl EmailContext {
    fn for_invoice_with(
        invoice: &Invoice,
        client: &Client,
        settings: &BusinessSettings,
        public_url: Option<&str>,
        paid: f64,
        today: NaiveDate,
        reminder: Option<ReminderType>,
    ) -> Self {
        let template = TemplateId::from_id(invoice.theme.template_id);
        let (primary_color, accent_color) = template.colors(&invoice.theme);
        let currency = invoice.currency.as_str();
        let payable = billing::balance_due(invoice, paid, today);
        let due_date = invoice.due_date.format(DATE_FORMAT).to_string();

        let subject = match reminder {
            Some(t) => reminder_subject(t, &invoice.number, &due_date, payable.overdue_days),
            None => format!("Invoice {} from {}", invoice.number, settings.business.name),
        };

        Self {
            subject,
            kind: "invoice",
            number: invoice.number.clone(),
            client_name: greeting_name(client),
            business: settings.business.clone(),
            logo: settings.business.logo_path.clone(),
            payment_methods: payment_method_views(settings),
            primary_color,
            accent_color,
            view_url: view_url(public_url, "invoices", &invoice.number),
            issue_date: invoice.issue_date.format(DATE_FORMAT).to_string(),
            due_date,
            total: format_money(invoice.totals.total, currency),
            amount_due: format_money(payable.base_amount, currency),
            notes: invoice.notes.clone(),
            late_fee_notice: late_fee_notice(invoice),
            reminder_type: reminder,
            overdue_days: payable.overdue_days,
            late_fee: non_zero(payable.late_fee, currency),
            total_payable: format_money(payable.total_payable, currency),
        }
    }

    pub fn for_invoice(
        invoice: &Invoice,
        client: &Client,
        settings: &BusinessSettings,
        public_url: Option<&str>,
        paid: f64,
        today: NaiveDate,
    ) -> Self {
        Self::for_invoice_with(invoice, client, settings, public_url, paid, today, None)
    }

    pub fn for_reminder(
        invoice: &Invoice,
        client: &Client,
        settings: &BusinessSettings,
        public_url: Option<&str>,
        paid: f64,
        today: NaiveDate,
        reminder_type: ReminderType,
    ) -> Self {
        let reminder = Some(reminder_type);
        Self::for_invoice_with(invoice, client, settings, public_url, paid, today, reminder)
    }

    pub fn for_estimate(
        estimate: &Estimate,
        client: &Client,
        settings: &BusinessSettings,
        public_url: Option<&str>,
    ) -> Self {
        let template = TemplateId::from_id(estimate.theme.template_id);
        let (primary_color, accent_color) = template.colors(&estimate.theme);
        let currency = estimate.currency.as_str();
        let total = format_money(estimate.totals.total, currency);

        Self {
            subject: format!("Estimate {} from {}", estimate.number, settings.business.name),
            kind: "estimate",
            number: estimate.number.clone(),
            client_name: greeting_name(client),
            business: settings.business.clone(),
            logo: settings.business.logo_path.clone(),
            payment_methods: Vec::new(),
            primary_color,
            accent_color,
            view_url: view_url(public_url, "estimates", &estimate.number),
            issue_date: estimate.issue_date.format(DATE_FORMAT).to_string(),
            due_date: estimate.expiry_date.format(DATE_FORMAT).to_string(),
            amount_due: total.clone(),
            total_payable: total.clone(),
            total,
            notes: estimate.notes.clone(),
            late_fee_notice: None,
            reminder_type: None,
            overdue_days: 0,
            late_fee: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Escape a value for use inside a typst string literal.
fn typst_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    let escaped = raw
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    Ok(Value::String(escaped))
}

pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(EMBEDDED_TEMPLATES.to_vec())?;
        tera.register_filter("typst", typst_filter);
        Ok(Self { tera })
    }

    /// Embedded templates, with any same-named file in `dir` taking
    /// precedence.
    pub fn with_overrides(dir: &Path) -> Result<Self> {
        let mut renderer = Self::new()?;
        if !dir.is_dir() {
            return Ok(renderer);
        }
        for (name, _) in EMBEDDED_TEMPLATES {
            let path = dir.join(name);
            if path.is_file() {
                tracing::info!("Using template override {}", path.display());
                renderer.tera.add_template_file(&path, Some(name))?;
            }
        }
        Ok(renderer)
    }

    pub fn document_html(&self, ctx: &DocumentContext) -> Result<String> {
        let template = ctx.template.unwrap_or(TemplateId::Classic);
        let context = Context::from_serialize(ctx)?;
        Ok(self.tera.render(template.template_name(), &context)?)
    }

    pub fn document_typst(&self, ctx: &DocumentContext) -> Result<String> {
        let context = Context::from_serialize(ctx)?;
        Ok(self.tera.render("invoice.typ", &context)?)
    }

    fn email(&self, template: &str, ctx: &EmailContext) -> Result<RenderedEmail> {
        let context = Context::from_serialize(ctx)?;
        Ok(RenderedEmail {
            subject: ctx.subject.clone(),
            html: self.tera.render(template, &context)?,
        })
    }

    pub fn invoice_email(&self, ctx: &EmailContext) -> Result<RenderedEmail> {
        self.email("email_invoice.html", ctx)
    }

    pub fn estimate_email(&self, ctx: &EmailContext) -> Result<RenderedEmail> {
        self.email("email_estimate.html", ctx)
    }

    pub fn reminder_email(&self, ctx: &EmailContext) -> Result<RenderedEmail> {
        self.email("email_reminder.html", ctx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutput {
    pub html_path: PathBuf,
    pub typ_path: PathBuf,
    /// `None` when typst is unavailable or compilation failed.
    pub pdf_path: Option<PathBuf>,
}

/// Write the HTML preview and typst source for a document into `dir`, then
/// try to compile the PDF.
pub fn write_document(
    renderer: &Renderer,
    ctx: &DocumentContext,
    dir: &Path,
    file_stem: &str,
) -> Result<DocumentOutput> {
    fs::create_dir_all(dir)?;
    let html_path = dir.join(format!("{}.html", file_stem));
    let typ_path = dir.join(format!("{}.typ", file_stem));
    let pdf_path = dir.join(format!("{}.pdf", file_stem));

    fs::write(&html_path, renderer.document_html(ctx)?)?;
    fs::write(&typ_path, renderer.document_typst(ctx)?)?;

    let pdf_path = compile_pdf(&typ_path, &pdf_path).then_some(pdf_path);
    Ok(DocumentOutput { html_path, typ_path, pdf_path })
}

pub fn compile_pdf(typ_path: &Path, pdf_path: &Path) -> bool {
    if Command::new("typst").arg("--version").output().is_err() {
        tracing::warn!("typst is not installed; kept {}", typ_path.display());
        return false;
    }
    match Command::new("typst").arg("compile").arg(typ_path).arg(pdf_path).status() {
        Ok(s) if s.success() => {
            tracing::info!("PDF generated: {}", pdf_path.display());
            true
        }
        _ => {
            tracing::warn!("typst compilation failed for {}", typ_path.display());
            false
        }
    }
}

/// Reveal a generated file in the platform file browser and open it.
pub fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg("-R").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(format!("/select,{}", path.to_string_lossy())).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(path).spawn().ok();
}

/// Short label for a discount: `10%` or `$25.00`.
pub fn discount_label(discount: Discount, currency: &str) -> Option<String> {
    match discount {
        Discount::None => None,
        Discount::Percentage(pct) => Some(format!("{}%", format_rate(pct))),
        Discount::Fixed(amount) => Some(format_money(amount, currency)),
    }
}
