use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use account_selfcare::{
    format_phone_number, next_logout, AccountManager, AccountOverview, BillFilter,
    BillingManager, ClientConfig, ClientError, HttpAccountApi, PaymentHistoryQuery, ProfileStore,
    SessionManager, UsageManager,
};

// ============================================================================
// Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "account-selfcare", version, about = "Self-service account client")]
struct Cli {
    /// Mobile number to log in with (8 digits, starting with 8 or 9)
    #[arg(long, global = true)]
    phone: Option<String>,

    /// Label to store with the phone profile
    #[arg(long, global = true)]
    label: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan, balance and usage of the primary line
    Overview,
    /// Payment history of the primary line
    Payments {
        /// How many months back to look
        #[arg(long, default_value_t = 6)]
        months: u32,
        #[arg(long, default_value_t = 20)]
        rows: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// all, paid or pending
        #[arg(long, default_value = "all")]
        status: BillFilter,
    },
    /// Account holder contact and address details
    Account,
    /// Service settings of the primary line
    Settings,
    /// Phone numbers used on this device
    Profiles,
}

// ============================================================================
// Login
// ============================================================================

/// Request an OTP and prompt until it validates. A rejected code keeps the
/// challenge, so the user may retry; an empty line asks for a resend.
async fn login(session: &SessionManager, phone: &str) -> Result<(), Box<dyn std::error::Error>> {
    session.request_otp(phone).await?;
    eprintln!("OTP sent to {}", format_phone_number(phone));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("Enter OTP (blank to resend): ");
        let code = match lines.next_line().await? {
            Some(line) => line.trim().to_string(),
            None => return Err("stdin closed before an OTP was entered".into()),
        };
        if code.is_empty() {
            session.request_otp(phone).await?;
            eprintln!("OTP resent");
            continue;
        }
        match session.validate_otp(&code).await {
            Ok(_) => return Ok(()),
            Err(ClientError::Service { message, .. }) => {
                eprintln!("OTP rejected: {}", message);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn print_overview(overview: &AccountOverview) {
    let plan = &overview.details.current_plan;
    println!("Line:     {}", format_phone_number(&overview.service.mobile_number));
    println!("Plan:     {} ({} to {})", plan.product_name, plan.start_date, plan.end_date);
    if let Some(days) = UsageManager::days_remaining(plan, chrono::Local::now().date_naive()) {
        println!("          {} days remaining", days);
    }
    match overview.main_balance() {
        Some(balance) => println!("Balance:  ${:.2}", balance),
        None => println!("Balance:  {}", overview.details.main_balance),
    }
    println!("Expiry:   {}", overview.details.acct_expiry);
    for usage in &overview.usage {
        if usage.unlimited {
            println!("  {:<10} unlimited", usage.inclusion_type);
            continue;
        }
        match (usage.used, usage.allowance, usage.percentage_used) {
            (Some(used), Some(allowance), Some(pct)) => println!(
                "  {:<10} {:.2}/{:.2} {} ({:.0}%)",
                usage.inclusion_type, used, allowance, usage.units, pct
            ),
            _ => println!(
                "  {:<10} {:?} remaining {}",
                usage.inclusion_type, usage.remaining, usage.units
            ),
        }
    }
}

async fn run_command(
    command: Command,
    session: &SessionManager,
) -> Result<(), Box<dyn std::error::Error>> {
    let usage = UsageManager::new(session.clone());
    let overview = usage.fetch_overview().await?;
    let svc_id = overview.service.svc_id.clone();

    match command {
        Command::Overview => print_overview(&overview),
        Command::Payments {
            months,
            rows,
            offset,
            status,
        } => {
            let billing = BillingManager::new(session.clone());
            let mut query =
                PaymentHistoryQuery::last_months(months, chrono::Local::now().date_naive())
                    .with_rows(rows);
            query.offset = offset;
            let records = billing.payment_history(&svc_id, &query).await?;
            let shown = account_selfcare::filter_payments(&records, status);
            if shown.is_empty() {
                println!("No payments found");
            }
            for record in shown {
                println!(
                    "{:<12} ${:>9.2}  {:<10} {}",
                    record.payment_date,
                    record.amount,
                    record.status.as_deref().unwrap_or("-"),
                    record.payment_method.as_deref().unwrap_or("")
                );
            }
        }
        Command::Account => {
            let account = AccountManager::new(session.clone());
            match account.account_details().await? {
                Some(details) => {
                    let name = [details.first_name.as_deref(), Some(details.last_name.as_str())]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join(" ");
                    println!("Name:    {}", name);
                    println!("Mobile:  {}", format_phone_number(&details.mobile_number));
                    println!("Email:   {}", details.email.as_deref().unwrap_or("Not provided"));
                    println!(
                        "Address: {} {} {} {}",
                        details.block_number.as_deref().unwrap_or(""),
                        details.street_name.as_deref().unwrap_or(""),
                        details.unit_number.as_deref().unwrap_or(""),
                        details.postcode
                    );
                }
                None => println!("No account details on file"),
            }
        }
        Command::Settings => {
            let account = AccountManager::new(session.clone());
            let settings = account.service_settings(&svc_id).await?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        // Listed in main without logging in
        Command::Profiles => {}
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;
    let profiles = ProfileStore::open(&config.data_dir)?;

    if let Command::Profiles = cli.command {
        for profile in profiles.profiles() {
            println!(
                "{}  {}",
                format_phone_number(&profile.phone_number),
                profile.label.as_deref().unwrap_or("")
            );
        }
        return Ok(());
    }

    // Fall back to the most recently used profile
    let phone = match cli.phone {
        Some(phone) => phone,
        None => profiles
            .profiles()
            .first()
            .map(|p| p.phone_number.clone())
            .ok_or("no --phone given and no saved profiles")?,
    };

    let api = Arc::new(HttpAccountApi::new(&config)?);
    let session = SessionManager::new(api, &config);

    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Some(reason) = next_logout(&mut events).await {
            log::info!("Session ended: {:?}", reason);
        }
    });

    login(&session, &phone).await?;
    match cli.label.as_deref() {
        Some(label) => profiles.add_profile(&phone, Some(label))?,
        None => {
            if !profiles.update_last_used(&phone)? {
                profiles.add_profile(&phone, None)?;
            }
        }
    }

    let result = run_command(cli.command, &session).await;
    session.logout();
    result
}
