use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use inquire::Confirm;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invoice_desk::billing;
use invoice_desk::config::{self, AppSettings};
use invoice_desk::filter::{EstimateQuery, InvoiceQuery, SortKey};
use invoice_desk::mailer::OutboxMailer;
use invoice_desk::model::{EstimateStatus, InvoiceStatus, ReminderStatus, ReminderType};
use invoice_desk::money::format_money;
use invoice_desk::reminders::{self, HistoryFilter};
use invoice_desk::render::{self, DATE_FORMAT};
use invoice_desk::store::Store;
use invoice_desk::{report, wizard, AppError, Desk, Result};

type CliDesk = Desk<OutboxMailer>;

#[derive(Parser)]
#[command(name = "invoice-desk", version, about = "Invoices, estimates and payment reminders")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure data directory and public URL
    Config,
    /// Business profile, payment methods and defaults
    Settings {
        #[command(subcommand)]
        action: SettingsCmd,
    },
    /// Manage clients
    Client {
        #[command(subcommand)]
        action: ClientCmd,
    },
    /// Create, send and track invoices
    Invoice {
        #[command(subcommand)]
        action: InvoiceCmd,
    },
    /// Create, send and convert estimates
    Estimate {
        #[command(subcommand)]
        action: EstimateCmd,
    },
    /// Payment reminders
    Reminder {
        #[command(subcommand)]
        action: ReminderCmd,
    },
    /// Show summary of invoices
    Summary {
        /// Year to summarize (defaults to current year)
        year: Option<i32>,
    },
}

#[derive(Subcommand)]
enum SettingsCmd {
    Show,
    /// Edit interactively
    Set,
    /// Copy a logo image into the data directory
    Logo { path: PathBuf },
}

#[derive(Subcommand)]
enum ClientCmd {
    Add,
    List,
    Remove { id: String },
}

#[derive(clap::Args)]
struct ListArgs {
    /// Match number, client name, company, email or notes
    #[arg(short, long)]
    search: Option<String>,
    #[arg(short, long)]
    client: Option<String>,
    #[arg(long, value_enum, default_value_t = SortKey::Number)]
    sort: SortKey,
    #[arg(long)]
    desc: bool,
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum InvoiceCmd {
    /// Create a new invoice
    New,
    List {
        #[command(flatten)]
        list: ListArgs,
        /// draft, pending, sent, paid or overdue
        #[arg(long)]
        status: Option<InvoiceStatus>,
    },
    Show { number: String },
    /// Re-enter the contents of a draft or pending invoice
    Edit { number: String },
    /// Render the PDF and email it to the client
    Send { number: String },
    /// Record a payment (defaults to the remaining balance)
    Pay {
        number: String,
        #[arg(short, long)]
        amount: Option<f64>,
        #[arg(short, long, default_value = "bank transfer")]
        method: String,
        #[arg(short, long)]
        reference: Option<String>,
        /// Payment date, YYYY-MM-DD (defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Set the status directly
    Status { number: String, status: InvoiceStatus },
    Delete {
        number: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Render HTML, typst and PDF output
    Pdf {
        number: String,
        /// Reveal the result in the file browser
        #[arg(long)]
        open: bool,
    },
}

#[derive(Subcommand)]
enum EstimateCmd {
    New,
    List {
        #[command(flatten)]
        list: ListArgs,
        #[arg(long)]
        status: Option<EstimateStatus>,
    },
    Show { number: String },
    Send { number: String },
    Approve { number: String },
    Reject { number: String },
    /// Turn an approved estimate into a draft invoice
    Convert { number: String },
    /// Mark sent estimates past their expiry date as expired
    Expire,
    Delete {
        number: String,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ReminderCmd {
    /// List reminders whose trigger date has arrived
    Due {
        #[arg(long)]
        json: bool,
    },
    /// Send a reminder now
    Send {
        number: String,
        /// friendly, polite, firm or urgent (defaults to how late it is)
        #[arg(short = 't', long = "type")]
        reminder_type: Option<ReminderType>,
    },
    /// Send every due reminder
    Run,
    History {
        #[arg(short = 't', long = "type")]
        reminder_type: Option<ReminderType>,
        #[arg(short, long)]
        status: Option<ReminderStatus>,
        #[arg(short, long)]
        invoice: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "invoice_desk=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::Prompt(_)) => {
            println!("Operation cancelled.");
            ExitCode::FAILURE
        }
        Err(e @ AppError::LimitReached { .. }) => {
            eprintln!("❌ Error: {}", e);
            eprintln!(
                "💡 Upgrade your plan or raise `limits.monthly_invoices` in business.toml."
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    let command = match command {
        Commands::Config => {
            wizard::config_wizard()?;
            return Ok(());
        }
        other => other,
    };

    let settings = match config::load_settings() {
        Some(s) => s,
        None => wizard::config_wizard()?,
    }
    .with_env();
    let mut desk = open_desk(&settings)?;
    let today = Local::now().date_naive();

    match command {
        Commands::Config => Ok(()),
        Commands::Settings { action } => settings_cmd(&mut desk, action),
        Commands::Client { action } => client_cmd(&desk, action),
        Commands::Invoice { action } => invoice_cmd(&desk, action, today),
        Commands::Estimate { action } => estimate_cmd(&desk, action, today),
        Commands::Reminder { action } => reminder_cmd(&desk, action, today),
        Commands::Summary { year } => {
            show_summary(&desk, year.unwrap_or_else(|| today.year()), today)
        }
    }
}

fn open_desk(settings: &AppSettings) -> Result<CliDesk> {
    let root = settings.root();
    tracing::debug!("Using data root {}", root.display());
    let outbox = Store::open(&root)?.outbox_dir();
    Desk::open(&root, settings.public_url.clone(), OutboxMailer::new(outbox))
}

// ==========================================
// Settings & clients
// ==========================================

fn settings_cmd(desk: &mut CliDesk, action: SettingsCmd) -> Result<()> {
    match action {
        SettingsCmd::Show => {
            let s = desk.settings();
            let mut table = Table::new();
            table.set_header(vec!["Setting", "Value"]);
            table.add_row(vec!["Business", s.business.name.as_str()]);
            table.add_row(vec!["Email", s.business.email.as_str()]);
            table.add_row(vec!["Logo", s.business.logo_path.as_deref().unwrap_or("-")]);
            for (label, value) in s.payment.listed() {
                table.add_row(vec![label, value]);
            }
            table.add_row(vec!["Currency".to_string(), s.defaults.currency.clone()]);
            table.add_row(vec![
                "Payment terms".to_string(),
                format!("{} days", s.defaults.payment_terms_days),
            ]);
            table.add_row(vec![
                "Estimates valid".to_string(),
                format!("{} days", s.defaults.estimate_valid_days),
            ]);
            table.add_row(vec!["Tax rate".to_string(), format!("{}%", s.defaults.tax_rate)]);
            table.add_row(vec![
                "Monthly invoice limit".to_string(),
                s.limits.monthly_invoices.map_or("unlimited".to_string(), |l| l.to_string()),
            ]);
            println!("{table}");
        }
        SettingsCmd::Set => {
            let updated = wizard::business_wizard(desk.settings())?;
            desk.save_settings(updated)?;
            println!("✅ Settings saved.");
        }
        SettingsCmd::Logo { path } => {
            let stored = desk.upload_logo(&path)?;
            println!("✅ Logo stored at {}", stored.display());
        }
    }
    Ok(())
}

fn client_cmd(desk: &CliDesk, action: ClientCmd) -> Result<()> {
    match action {
        ClientCmd::Add => {
            let client = desk.add_client(wizard::client_wizard()?)?;
            println!("✅ Client '{}' saved as {}", client.display_name(), client.id);
        }
        ClientCmd::List => {
            let clients = desk.list_clients()?;
            if clients.is_empty() {
                println!("(None found)");
            } else {
                println!("{}", report::clients_table(&clients));
            }
        }
        ClientCmd::Remove { id } => {
            desk.delete_client(&id)?;
            println!("🗑️  Removed client {}", id);
        }
    }
    Ok(())
}

/// Pick a client, creating one on the spot if asked.
fn choose_client(desk: &CliDesk) -> Result<String> {
    match wizard::select_client(&desk.list_clients()?)? {
        Some(id) => Ok(id),
        None => Ok(desk.add_client(wizard::client_wizard()?)?.id),
    }
}

// ==========================================
// Invoices
// ==========================================

fn invoice_cmd(desk: &CliDesk, action: InvoiceCmd, today: NaiveDate) -> Result<()> {
    match action {
        InvoiceCmd::New => {
            let client_id = choose_client(desk)?;
            println!("✅ Selected Client: {}", client_id);
            let Some(draft) = wizard::invoice_wizard(&client_id, desk.settings(), today)? else {
                println!("❌ No items entered. Aborting.");
                return Ok(());
            };
            let invoice = desk.create_invoice(draft)?;
            println!(
                "✅ Created {} for {} ({})",
                invoice.number,
                format_money(invoice.totals.total, &invoice.currency),
                invoice.status
            );
        }
        InvoiceCmd::List { list, status } => {
            let query = InvoiceQuery {
                search: list.search,
                status,
                client: list.client,
                sort: list.sort,
                descending: list.desc,
            };
            let invoices = desk.list_invoices(&query, today)?;
            if list.json {
                return print_json(&invoices);
            }
            if invoices.is_empty() {
                println!("(None found)");
                return Ok(());
            }
            let clients = desk.clients_by_id()?;
            let payments = desk.store().all_payments()?;
            println!("{}", report::invoices_table(&invoices, &clients, &payments, today));
        }
        InvoiceCmd::Show { number } => show_invoice(desk, &number, today)?,
        InvoiceCmd::Edit { number } => {
            let existing = desk.invoice(&number)?;
            let client_id = existing.client_id;
            let Some(draft) = wizard::invoice_wizard(&client_id, desk.settings(), today)? else {
                println!("❌ No items entered. Aborting.");
                return Ok(());
            };
            let invoice = desk.update_invoice(&number, draft)?;
            println!(
                "✅ Updated {}: {}",
                invoice.number,
                format_money(invoice.totals.total, &invoice.currency)
            );
        }
        InvoiceCmd::Send { number } => {
            let sent = desk.send_invoice(&number, today)?;
            println!("📨 Sent {} to {} ({})", sent.number, sent.recipient, sent.delivery_id);
            if sent.document.pdf_path.is_none() {
                println!("⚠️  No PDF attached; see {}", sent.document.html_path.display());
            }
        }
        InvoiceCmd::Pay { number, amount, method, reference, date } => {
            let amount = match amount {
                Some(a) => a,
                None => {
                    let invoice = desk.invoice(&number)?;
                    let paid = billing::total_paid(&desk.payments_for(&number)?);
                    billing::remaining_balance(&invoice, paid)
                }
            };
            let date = date.unwrap_or(today);
            let outcome = desk.record_payment(&number, amount, date, &method, reference)?;
            let currency = desk.invoice(&number)?.currency;
            println!(
                "💰 Recorded {} on {}; {} remaining ({})",
                format_money(outcome.payment.amount, &currency),
                number,
                format_money(outcome.remaining, &currency),
                outcome.status
            );
        }
        InvoiceCmd::Status { number, status } => {
            let invoice = desk.set_invoice_status(&number, status, today)?;
            println!("✅ {} is now {}", invoice.number, invoice.status);
        }
        InvoiceCmd::Delete { number, yes } => {
            let confirmed = yes
                || Confirm::new(&format!("Delete {} and its payments and reminders?", number))
                    .with_default(false)
                    .prompt()?;
            if confirmed {
                desk.delete_invoice(&number)?;
                println!("🗑️  Deleted {}", number);
            }
        }
        InvoiceCmd::Pdf { number, open } => {
            let output = desk.render_invoice(&number, today)?;
            print_output(&output, open);
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_output(output: &render::DocumentOutput, open: bool) {
    println!("📄 HTML: {}", output.html_path.display());
    println!("📄 Typst: {}", output.typ_path.display());
    match &output.pdf_path {
        Some(pdf) => {
            println!("✅ PDF: {}", pdf.display());
            if open {
                render::open_and_reveal(pdf);
            }
        }
        None => {
            println!("⚠️  PDF not generated (is typst installed?)");
            if open {
                render::open_and_reveal(&output.html_path);
            }
        }
    }
}

fn show_invoice(desk: &CliDesk, number: &str, today: NaiveDate) -> Result<()> {
    let invoice = desk.invoice(number)?;
    let client = desk.client(&invoice.client_id)?;
    let payments = desk.payments_for(number)?;
    let paid = billing::total_paid(&payments);
    let payable = billing::balance_due(&invoice, paid, today);
    let currency = invoice.currency.as_str();

    println!("\n--- Invoice {} ---", invoice.number);
    println!(
        "Client:  {} <{}>",
        client.display_name(),
        client.email.as_deref().unwrap_or("no email")
    );
    println!(
        "Issued:  {}   Due: {}   Status: {}",
        invoice.issue_date.format(DATE_FORMAT),
        invoice.due_date.format(DATE_FORMAT),
        billing::effective_status(&invoice, today)
    );
    if let Some(estimate) = &invoice.source_estimate {
        println!("From estimate {}", estimate);
    }

    let mut items = Table::new();
    items.set_header(vec!["Description", "Qty", "Rate", "Amount"]);
    for item in &invoice.items {
        items.add_row(vec![
            item.description.clone(),
            item.quantity.to_string(),
            format_money(item.rate, currency),
            format_money(item.amount(), currency),
        ]);
    }
    println!("{items}");

    println!("Subtotal: {}", format_money(invoice.totals.subtotal, currency));
    if let Some(label) = render::discount_label(invoice.discount, currency) {
        println!("Discount ({}): -{}", label, format_money(invoice.totals.discount, currency));
    }
    if invoice.totals.tax > 0.0 {
        println!("Tax ({}%): {}", invoice.tax_rate, format_money(invoice.totals.tax, currency));
    }
    println!("Total:    {}", format_money(invoice.totals.total, currency));

    if !payments.is_empty() {
        println!("\nPayments:");
        println!("{}", report::payments_table(&payments, currency));
        println!(
            "Remaining: {}",
            format_money(billing::remaining_balance(&invoice, paid), currency)
        );
    }
    if payable.late_fee > 0.0 {
        println!(
            "⚠️  {} days overdue; late fee {}",
            payable.overdue_days,
            format_money(payable.late_fee, currency)
        );
    }

    let upcoming = reminders::upcoming(&invoice, &desk.settings().defaults, today);
    if !upcoming.is_empty() {
        println!("\nUpcoming reminders:");
        for (date, kind) in upcoming {
            println!("  {}  {}", date.format(DATE_FORMAT), kind);
        }
    }
    Ok(())
}

// ==========================================
// Estimates
// ==========================================

fn estimate_cmd(desk: &CliDesk, action: EstimateCmd, today: NaiveDate) -> Result<()> {
    match action {
        EstimateCmd::New => {
            let client_id = choose_client(desk)?;
            let Some(draft) = wizard::estimate_wizard(&client_id, desk.settings(), today)? else {
                println!("❌ No items entered. Aborting.");
                return Ok(());
            };
            let estimate = desk.create_estimate(draft)?;
            println!(
                "✅ Created {} for {}, valid until {}",
                estimate.number,
                format_money(estimate.totals.total, &estimate.currency),
                estimate.expiry_date.format(DATE_FORMAT)
            );
        }
        EstimateCmd::List { list, status } => {
            let query = EstimateQuery {
                search: list.search,
                status,
                client: list.client,
                sort: list.sort,
                descending: list.desc,
            };
            let estimates = desk.list_estimates(&query, today)?;
            if list.json {
                return print_json(&estimates);
            }
            if estimates.is_empty() {
                println!("(None found)");
            } else {
                println!("{}", report::estimates_table(&estimates, &desk.clients_by_id()?, today));
            }
        }
        EstimateCmd::Show { number } => {
            let estimate = desk.estimate(&number)?;
            let clients = desk.clients_by_id()?;
            println!(
                "{}",
                report::estimates_table(std::slice::from_ref(&estimate), &clients, today)
            );
            let output = desk.render_estimate(&number, today)?;
            print_output(&output, false);
        }
        EstimateCmd::Send { number } => {
            let sent = desk.send_estimate(&number, today)?;
            println!("📨 Sent {} to {} ({})", sent.number, sent.recipient, sent.delivery_id);
        }
        EstimateCmd::Approve { number } => {
            let estimate = desk.set_estimate_status(&number, EstimateStatus::Approved, today)?;
            println!("✅ {} approved", estimate.number);
        }
        EstimateCmd::Reject { number } => {
            let estimate = desk.set_estimate_status(&number, EstimateStatus::Rejected, today)?;
            println!("✅ {} rejected", estimate.number);
        }
        EstimateCmd::Convert { number } => {
            let invoice = desk.convert_estimate(&number, today)?;
            println!("✅ {} converted into draft invoice {}", number, invoice.number);
        }
        EstimateCmd::Expire => {
            let expired = desk.expire_estimates(today)?;
            if expired.is_empty() {
                println!("Nothing to expire.");
            } else {
                println!("⌛ Expired: {}", expired.join(", "));
            }
        }
        EstimateCmd::Delete { number, yes } => {
            let confirmed = yes
                || Confirm::new(&format!("Delete {}?", number))
                    .with_default(false)
                    .prompt()?;
            if confirmed {
                desk.delete_estimate(&number)?;
                println!("🗑️  Deleted {}", number);
            }
        }
    }
    Ok(())
}

// ==========================================
// Reminders & summary
// ==========================================

fn reminder_cmd(desk: &CliDesk, action: ReminderCmd, today: NaiveDate) -> Result<()> {
    match action {
        ReminderCmd::Due { json } => {
            let due = desk.due_reminders(today)?;
            if json {
                return print_json(&due);
            }
            if due.is_empty() {
                println!("No reminders due.");
            } else {
                println!("{}", report::due_table(&due));
            }
        }
        ReminderCmd::Send { number, reminder_type } => {
            let entry = desk.send_reminder(&number, reminder_type, today)?;
            println!(
                "📨 Sent {} reminder for {} to {}",
                entry.reminder_type,
                entry.invoice,
                entry.recipient.as_deref().unwrap_or("-")
            );
        }
        ReminderCmd::Run => {
            let results = desk.run_due_reminders(today)?;
            if results.is_empty() {
                println!("No reminders due.");
            }
            for entry in results {
                match entry.reminder_status {
                    ReminderStatus::Failed => println!(
                        "❌ {} ({}): {}",
                        entry.invoice,
                        entry.reminder_type,
                        entry.failure_reason.as_deref().unwrap_or("unknown error")
                    ),
                    _ => println!("📨 {} ({}) sent", entry.invoice, entry.reminder_type),
                }
            }
        }
        ReminderCmd::History { reminder_type, status, invoice, json } => {
            let filter = HistoryFilter { reminder_type, reminder_status: status, invoice };
            let rows = desk.reminder_history(&filter, today)?;
            if json {
                return print_json(&rows);
            }
            if rows.is_empty() {
                println!("(None found)");
            } else {
                println!("{}", report::history_table(&rows));
            }
        }
    }
    Ok(())
}

fn show_summary(desk: &CliDesk, year: i32, today: NaiveDate) -> Result<()> {
    println!("🔍 Summarizing invoices for {}...", year);
    let summary = desk.summary(year, today)?;
    if summary.invoice_count == 0 {
        println!("No invoices found.");
        return Ok(());
    }
    let currency = desk.settings().defaults.currency.as_str();

    println!("\n--- Monthly Invoice Summary ({}) ---", year);
    println!("{}", report::monthly_table(&summary, currency));
    println!("\n--- Client Summary ({}) ---", year);
    println!("{}", report::client_summary_table(&summary, currency));
    Ok(())
}
