//! Interactive prompts used by the CLI.

use chrono::NaiveDate;
use inquire::{Confirm, CustomType, DateSelect, Select, Text};

use crate::config::{self, AppSettings, DEFAULT_DATA_ROOT};
use crate::error::Result;
use crate::model::{
    Address, BusinessSettings, Client, Discount, EstimateDraft, InvoiceDraft, InvoiceStatus,
    LineItem, NewClient, PaymentTerms, ReminderSettings, Theme,
};
use crate::render::TemplateId;

pub const NEW_CLIENT_OPT: &str = "➕ Add New Client";

fn optional(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Pick an existing client id, or `None` when the user wants a new one.
pub fn select_client(clients: &[Client]) -> Result<Option<String>> {
    if clients.is_empty() {
        println!("No clients yet. Let's add one.");
        return Ok(None);
    }
    let mut options: Vec<String> = clients
        .iter()
        .map(|c| format!("{} ({})", c.display_name(), c.id))
        .collect();
    options.push(NEW_CLIENT_OPT.to_string());

    let choice = Select::new("Select Client:", options).prompt()?;
    if choice == NEW_CLIENT_OPT {
        return Ok(None);
    }
    Ok(clients
        .iter()
        .find(|c| format!("{} ({})", c.display_name(), c.id) == choice)
        .map(|c| c.id.clone()))
}

pub fn client_wizard() -> Result<NewClient> {
    println!("\n--- New Client ---");
    let name = Text::new("Contact name:").prompt()?;
    let company = optional(Text::new("Company (optional):").prompt()?);
    let email = optional(Text::new("Email (needed for sending):").prompt()?);
    let phone = optional(Text::new("Phone (optional):").prompt()?);
    let billing_address = address_wizard(true)?;
    let notes = optional(Text::new("Notes (optional):").prompt()?);

    Ok(NewClient { name, company, email, phone, billing_address, notes })
}

/// Street first, then zip with a city/state lookup to prefill the rest.
pub fn address_wizard(is_optional: bool) -> Result<Option<Address>> {
    let street_prompt = if is_optional {
        "Street (Leave empty to skip):"
    } else {
        "Street (Required):"
    };
    let street = Text::new(street_prompt).prompt()?;
    if is_optional && street.trim().is_empty() {
        return Ok(None);
    }

    let zip = Text::new("Zip Code (Leave empty to skip lookup):").prompt()?;
    let (mut def_city, mut def_state) = (String::new(), String::new());
    if !zip.trim().is_empty() {
        let found = zipcodes::matching(zip.trim(), None)
            .ok()
            .and_then(|r| r.into_iter().next());
        if let Some(info) = found {
            println!("🚀 Found: {}, {}", info.city, info.state);
            def_city = info.city.to_string();
            def_state = info.state.to_string();
        }
    }

    let city = Text::new("City:").with_default(&def_city).prompt()?;
    let state = Text::new("State:").with_default(&def_state).prompt()?;

    Ok(Some(Address { street, city, state, zip }))
}

pub fn line_items_wizard() -> Result<Vec<LineItem>> {
    let mut items = Vec::new();
    println!("\n--- Enter Line Items ---");
    println!("(Leave Description empty to finish)");

    loop {
        let description = Text::new("Description:").prompt()?;
        if description.trim().is_empty() {
            break;
        }
        let quantity = CustomType::<f64>::new("Quantity:")
            .with_default(1.0)
            .with_error_message("Please enter a number")
            .prompt()?;
        let rate = CustomType::<f64>::new("Rate:")
            .with_error_message("Please enter a number")
            .prompt()?;
        items.push(LineItem::new(description, quantity, rate));
    }
    Ok(items)
}

fn discount_wizard() -> Result<Discount> {
    let options = vec!["None", "Percentage", "Fixed amount"];
    Ok(match Select::new("Discount:", options).prompt()? {
        "Percentage" => Discount::Percentage(CustomType::<f64>::new("Discount %:").prompt()?),
        "Fixed amount" => Discount::Fixed(CustomType::<f64>::new("Discount amount:").prompt()?),
        _ => Discount::None,
    })
}

fn template_wizard(default: &Theme) -> Result<Theme> {
    let options: Vec<String> = (1..=4)
        .map(|id| format!("{} {}", id, TemplateId::from_id(id).label()))
        .collect();
    let start = usize::from(default.template_id.clamp(1, 4) - 1);
    let choice = Select::new("Layout:", options).with_starting_cursor(start).prompt()?;
    let template_id = choice
        .split_whitespace()
        .next()
        .and_then(|id| id.parse().ok())
        .unwrap_or(1);
    Ok(Theme { template_id, ..default.clone() })
}

/// Fields shared by invoices and estimates.
struct CommonFields {
    items: Vec<LineItem>,
    issue_date: NaiveDate,
    discount: Discount,
    tax_rate: f64,
    notes: Option<String>,
    theme: Theme,
}

fn common_wizard(settings: &BusinessSettings, today: NaiveDate) -> Result<Option<CommonFields>> {
    let items = line_items_wizard()?;
    if items.is_empty() {
        return Ok(None);
    }
    let issue_date = DateSelect::new("Issue Date:").with_default(today).prompt()?;
    let discount = discount_wizard()?;
    let tax_rate = CustomType::<f64>::new("Tax Rate %:")
        .with_default(settings.defaults.tax_rate)
        .prompt()?;
    let notes = optional(Text::new("Notes (optional):").prompt()?);
    let theme = template_wizard(&settings.defaults.theme)?;
    Ok(Some(CommonFields { items, issue_date, discount, tax_rate, notes, theme }))
}

/// Returns `None` when no line items were entered.
pub fn invoice_wizard(
    client_id: &str,
    settings: &BusinessSettings,
    today: NaiveDate,
) -> Result<Option<InvoiceDraft>> {
    let Some(common) = common_wizard(settings, today)? else {
        return Ok(None);
    };

    let due_days = CustomType::<i64>::new("Payment terms (days):")
        .with_default(settings.defaults.payment_terms_days)
        .prompt()?;
    let reminders = Confirm::new("Send automatic payment reminders?")
        .with_default(true)
        .prompt()?;
    let status = if Confirm::new("Keep as draft?").with_default(true).prompt()? {
        InvoiceStatus::Draft
    } else {
        InvoiceStatus::Pending
    };

    let mut draft = InvoiceDraft::new(client_id, common.issue_date, common.items);
    draft.discount = common.discount;
    draft.tax_rate = Some(common.tax_rate);
    draft.notes = common.notes;
    draft.theme = Some(common.theme);
    draft.payment_terms = Some(PaymentTerms {
        enabled: true,
        due_days,
        description: format!("Net {}", due_days),
    });
    draft.reminders = Some(ReminderSettings {
        enabled: reminders,
        use_system_default: true,
        rules: Vec::new(),
    });
    draft.status = status;
    Ok(Some(draft))
}

pub fn estimate_wizard(
    client_id: &str,
    settings: &BusinessSettings,
    today: NaiveDate,
) -> Result<Option<EstimateDraft>> {
    let Some(common) = common_wizard(settings, today)? else {
        return Ok(None);
    };
    let valid_days = CustomType::<i64>::new("Valid for (days):")
        .with_default(settings.defaults.estimate_valid_days)
        .prompt()?;

    let mut draft = EstimateDraft::new(client_id, common.issue_date, common.items);
    draft.expiry_date = Some(common.issue_date + chrono::Duration::days(valid_days.max(0)));
    draft.discount = common.discount;
    draft.tax_rate = Some(common.tax_rate);
    draft.notes = common.notes;
    draft.theme = Some(common.theme);
    Ok(Some(draft))
}

/// Ask for the data root and public URL, then save `settings.toml`.
pub fn config_wizard() -> Result<AppSettings> {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = config::load_settings().unwrap_or_default();
    let data_root = Text::new("Root Data Directory:")
        .with_default(&current.data_root)
        .with_help_message(&format!("Default: {}", DEFAULT_DATA_ROOT))
        .prompt()?;
    let public_url = optional(
        Text::new("Public URL for email links (optional):")
            .with_default(current.public_url.as_deref().unwrap_or(""))
            .prompt()?,
    );

    let settings = AppSettings { data_root, public_url };
    let path = config::save_settings(&settings)?;
    println!("✅ Settings saved to {}", path.display());
    Ok(settings)
}

/// Edit the business profile and payment methods in place.
pub fn business_wizard(current: &BusinessSettings) -> Result<BusinessSettings> {
    let mut settings = current.clone();
    let b = &mut settings.business;
    b.name = Text::new("Business name:").with_default(&b.name).prompt()?;
    b.email = Text::new("Business email:").with_default(&b.email).prompt()?;
    b.phone = Text::new("Phone:").with_default(&b.phone).prompt()?;
    b.address1 = Text::new("Address line 1:").with_default(&b.address1).prompt()?;
    b.address2 = Text::new("Address line 2:").with_default(&b.address2).prompt()?;
    b.website = Text::new("Website:").with_default(&b.website).prompt()?;
    b.tax_id = Text::new("Tax ID:").with_default(&b.tax_id).prompt()?;

    let p = &mut settings.payment;
    p.bank_transfer = Text::new("Bank transfer details:").with_default(&p.bank_transfer).prompt()?;
    p.paypal = Text::new("PayPal:").with_default(&p.paypal).prompt()?;
    p.payment_link = Text::new("Payment link:").with_default(&p.payment_link).prompt()?;

    let d = &mut settings.defaults;
    d.currency = Text::new("Default currency:").with_default(&d.currency).prompt()?.to_uppercase();
    d.payment_terms_days = CustomType::<i64>::new("Default payment terms (days):")
        .with_default(d.payment_terms_days)
        .prompt()?;
    d.tax_rate = CustomType::<f64>::new("Default tax rate %:")
        .with_default(d.tax_rate)
        .prompt()?;
    Ok(settings)
}
