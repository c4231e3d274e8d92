//! FitManager CLI
//!
//! Terminal front-end for the FitManager client:
//! - Log in, register, log out
//! - Show the dashboard
//! - Add, list, chart and delete weight / hydration / macro entries
//! - View and change the profile (changes ask for the password again)

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fitmanager::aggregate::{DayPoint, MacroPoint};
use fitmanager::config::{self, Config, LoggingConfig};
use fitmanager::dashboard::views::{MacroForm, MetricPage, PageKind};
use fitmanager::dashboard::{DashboardComposer, DashboardSummary};
use fitmanager::metrics::{HydrationEntry, MacroEntry, WeightEntry};
use fitmanager::profile::{ProfileService, ProfileUpdate, Sex, UserProfile};
use fitmanager::session::{
    Credentials, FileTokenSlot, GateError, GateOutcome, Navigator, PendingAction, ReauthGate,
    SessionStore,
};
use fitmanager::{wire, ApiClient, Hydration, Macros, Weight};

#[derive(Parser)]
#[command(name = "fitmanager")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Track weight, hydration and macros against your FitManager account")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API base URL (overrides config)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json, csv)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session token
    Login {
        username: String,
        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account and log in
    Register {
        username: String,
        email: String,
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the session token
    Logout,

    /// Show session status
    Status,

    /// Show the dashboard summary
    Dashboard {
        /// Compose from the metric lists instead of the dashboard endpoint
        #[arg(long)]
        local: bool,
    },

    /// Body weight entries
    Weight {
        #[command(subcommand)]
        action: WeightAction,
    },

    /// Hydration entries
    Hydration {
        #[command(subcommand)]
        action: HydrationAction,
    },

    /// Macro-nutrient entries
    Macros {
        #[command(subcommand)]
        action: MacroAction,
    },

    /// Profile and account
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Print a default config file
    Config {
        /// Write to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum WeightAction {
    /// List entries
    List,
    /// Record a weight (kg)
    Add { value: String },
    /// Delete an entry by id
    Delete { id: String },
    /// Daily series (last reading of each day)
    Chart,
}

#[derive(Subcommand)]
pub enum HydrationAction {
    /// List entries
    List,
    /// Record water intake (ml, default 100)
    Add { amount: Option<String> },
    /// Delete an entry by id
    Delete { id: String },
    /// Delete the most recent entry
    Undo,
    /// Daily totals
    Chart,
    /// Today's total and progress
    Today,
}

#[derive(Subcommand)]
pub enum MacroAction {
    /// List entries
    List,
    /// Record protein, carbs and fats (g); blank or invalid values count as 0
    Add {
        #[arg(long, default_value = "")]
        protein: String,
        #[arg(long, default_value = "")]
        carbs: String,
        #[arg(long, default_value = "")]
        fats: String,
    },
    /// Delete an entry by id
    Delete { id: String },
    /// One point per entry, oldest first
    Chart,
}

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show the profile
    Show,
    /// Change profile fields (asks for the password)
    Update(ProfileArgs),
    /// Delete the account (asks for the password)
    Delete,
}

#[derive(Args)]
pub struct ProfileArgs {
    #[arg(long)]
    username: Option<String>,
    /// Date of birth (YYYY-MM-DD)
    #[arg(long)]
    dob: Option<String>,
    /// M, F or O
    #[arg(long)]
    sex: Option<String>,
    /// Height (cm)
    #[arg(long)]
    height: Option<f64>,
    /// Initial weight (kg)
    #[arg(long)]
    initial_weight: Option<f64>,
    /// Target weight (kg)
    #[arg(long)]
    target_weight: Option<f64>,
    #[arg(long)]
    workouts_per_week: Option<u32>,
}

enum PageAction<F> {
    List,
    Add(F),
    Delete(String),
    Undo,
    Chart,
}

/// Redirect-to-login for a terminal: tell the user what happened
struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn to_login(&self) {
        eprintln!("Session ended. Run `fitmanager login <username>` to sign in again.");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }

    init_logging(&config.logging);
    tracing::debug!("FitManager CLI v{}", env!("CARGO_PKG_VERSION"));

    let session = Arc::new(SessionStore::new(FileTokenSlot::new(config.session.token_path())));
    let navigator: Arc<dyn Navigator> = Arc::new(ConsoleNavigator);
    let client = ApiClient::new(&config.api, Arc::clone(&session), Arc::clone(&navigator))?;
    let zone = config.display.day_zone();

    match cli.command {
        Commands::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt("Password")?,
            };
            client
                .login(&Credentials::new(username.as_str(), password))
                .await
                .context("Login failed")?;
            println!("Logged in as {}", username);
        }

        Commands::Register {
            username,
            email,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt("Password")?,
            };
            client
                .register(&username, &email, &password)
                .await
                .context("Registration failed")?;
            println!("Account {} created, you are logged in", username);
        }

        Commands::Logout => {
            client.logout();
            println!("Logged out");
        }

        Commands::Status => {
            println!("FitManager v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("API:          {}", client.base_url());
            println!("Session file: {:?}", config.session.token_path());
            println!("Day zone:     {}", zone);
            if session.is_authenticated() {
                let profile = ProfileService::new(client.clone()).fetch().await?;
                println!("Logged in as: {}", profile.username);
            } else {
                println!("Not logged in");
            }
        }

        Commands::Dashboard { local } => {
            let composer = DashboardComposer::new(client, zone, config.goals.clone());
            let summary = if local {
                composer.load_from_metrics(Utc::now()).await?
            } else {
                composer.load(Utc::now()).await?
            };
            match cli.format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
                _ => print_dashboard(&summary),
            }
        }

        Commands::Weight { action } => {
            let page = MetricPage::<Weight>::new(client, zone);
            let action = match action {
                WeightAction::List => PageAction::List,
                WeightAction::Add { value } => PageAction::Add(value),
                WeightAction::Delete { id } => PageAction::Delete(id),
                WeightAction::Chart => PageAction::Chart,
            };
            run_page(&page, action, &cli.format).await?;
        }

        Commands::Hydration { action } => {
            let page = MetricPage::<Hydration>::new(client, zone);
            let action = match action {
                HydrationAction::List => PageAction::List,
                HydrationAction::Add { amount } => PageAction::Add(amount.unwrap_or_default()),
                HydrationAction::Delete { id } => PageAction::Delete(id),
                HydrationAction::Undo => PageAction::Undo,
                HydrationAction::Chart => PageAction::Chart,
                HydrationAction::Today => {
                    if !page.refresh().await {
                        bail!("Could not load hydration entries");
                    }
                    let now = Utc::now();
                    let total = page.today_total(now);
                    let progress = page.today_progress(now, config.goals.hydration_page_scale_ml);
                    println!("Today: {} ml", total);
                    println!(
                        "{} of {} ml",
                        bar(progress, 30),
                        config.goals.hydration_page_scale_ml
                    );
                    println!(
                        "It should be at least {} ml",
                        config.goals.hydration_recommended_ml
                    );
                    return Ok(());
                }
            };
            run_page(&page, action, &cli.format).await?;
        }

        Commands::Macros { action } => {
            let page = MetricPage::<Macros>::new(client, zone);
            let action = match action {
                MacroAction::List => PageAction::List,
                MacroAction::Add {
                    protein,
                    carbs,
                    fats,
                } => PageAction::Add(MacroForm::new(protein, carbs, fats)),
                MacroAction::Delete { id } => PageAction::Delete(id),
                MacroAction::Chart => PageAction::Chart,
            };
            run_page(&page, action, &cli.format).await?;
            if let Some(split) = page.latest_split() {
                println!(
                    "Latest split: protein {:.0}% / carbs {:.0}% / fats {:.0}%",
                    split.protein, split.carbs, split.fats
                );
            }
        }

        Commands::Profile { action } => {
            let service = ProfileService::new(client.clone());
            match action {
                ProfileAction::Show => print_profile(&service.fetch().await?),
                ProfileAction::Update(args) => {
                    let current = service.fetch().await?;
                    let update = apply_profile_args(ProfileUpdate::from(&current), args)?;
                    let gate = ReauthGate::new(service, Arc::clone(&session), navigator);
                    gate.request_action(PendingAction::Update(update));
                    confirm(&gate, &current.username).await?;
                }
                ProfileAction::Delete => {
                    let current = service.fetch().await?;
                    let gate = ReauthGate::new(service, Arc::clone(&session), navigator);
                    gate.request_action(PendingAction::Delete);
                    confirm(&gate, &current.username).await?;
                }
            }
        }

        Commands::Config { output } => write_default_config(output.as_ref())?,
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fitmanager={}", config.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn write_default_config(output: Option<&PathBuf>) -> anyhow::Result<()> {
    let content = config::generate_default_config();
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &content)?;
            println!("Config written to {:?}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn prompt(label: &str) -> anyhow::Result<String> {
    eprint!("{}: ", label);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

async fn confirm(gate: &ReauthGate<ProfileService>, username: &str) -> anyhow::Result<()> {
    eprintln!("Confirm with your password to continue.");
    let password = prompt("Password")?;

    match gate.confirm(Credentials::new(username, password)).await {
        Ok(GateOutcome::Updated(profile)) => {
            println!("Profile updated");
            print_profile(&profile);
            Ok(())
        }
        Ok(GateOutcome::Deleted) => {
            println!("Account deleted");
            Ok(())
        }
        Err(GateError::Api(e)) if e.is_auth() => bail!("Invalid credentials, nothing was changed"),
        Err(e) => Err(e.into()),
    }
}

fn apply_profile_args(mut update: ProfileUpdate, args: ProfileArgs) -> anyhow::Result<ProfileUpdate> {
    if let Some(username) = args.username {
        update = update.username(username);
    }
    if let Some(dob) = args.dob {
        let date = wire::parse_date(&dob).with_context(|| format!("Invalid date: {}", dob))?;
        update = update.date_of_birth(date);
    }
    if let Some(sex) = args.sex {
        update = update.sex(sex.parse::<Sex>().map_err(anyhow::Error::msg)?);
    }
    if let Some(height) = args.height {
        update = update.height(height);
    }
    if let Some(kg) = args.initial_weight {
        update = update.initial_weight(kg);
    }
    if let Some(kg) = args.target_weight {
        update = update.target_weight(kg);
    }
    if let Some(count) = args.workouts_per_week {
        update = update.workouts_per_week(count);
    }
    Ok(update)
}

async fn run_page<K>(page: &MetricPage<K>, action: PageAction<K::Form>, format: &str) -> anyhow::Result<()>
where
    K: PageKind,
    K::Entry: TableRow,
    K::Point: TableRow,
{
    match action {
        PageAction::List => {
            if !page.refresh().await {
                bail!("Could not load {} entries", K::NAME);
            }
        }
        PageAction::Add(form) => {
            if !page.submit(form).await {
                let message = page.view().form.error.unwrap_or_default();
                bail!("{}", message);
            }
            println!("Entry added");
        }
        PageAction::Delete(id) => {
            if !page.remove(&id).await {
                bail!("Could not delete entry {}", id);
            }
            println!("Entry {} deleted", id);
        }
        PageAction::Undo => {
            if !page.remove_most_recent().await {
                bail!("Could not delete the most recent entry");
            }
        }
        PageAction::Chart => {
            if !page.refresh().await {
                bail!("Could not load {} entries", K::NAME);
            }
            return print_rows(page.view().chart.points(), format, "No data available");
        }
    }

    let view = page.view();
    if view.unavailable {
        bail!("Change saved, but the {} list could not be reloaded", K::NAME);
    }
    print_rows(&view.entries, format, "No entries yet")
}

/// Fixed-width table output
trait TableRow: Serialize {
    fn header() -> String;
    fn row(&self) -> String;
}

impl TableRow for WeightEntry {
    fn header() -> String {
        format!("{:<26} {:<20} {:>8}", "ID", "Date", "kg")
    }

    fn row(&self) -> String {
        format!(
            "{:<26} {:<20} {:>8.1}",
            self.id,
            self.date.format("%Y-%m-%d %H:%M"),
            self.weight
        )
    }
}

impl TableRow for HydrationEntry {
    fn header() -> String {
        format!("{:<26} {:<20} {:>8}", "ID", "Date", "ml")
    }

    fn row(&self) -> String {
        format!(
            "{:<26} {:<20} {:>8.0}",
            self.id,
            self.date.format("%Y-%m-%d %H:%M"),
            self.amount
        )
    }
}

impl TableRow for MacroEntry {
    fn header() -> String {
        format!(
            "{:<26} {:<20} {:>8} {:>8} {:>8}",
            "ID", "Date", "Protein", "Carbs", "Fats"
        )
    }

    fn row(&self) -> String {
        format!(
            "{:<26} {:<20} {:>8.1} {:>8.1} {:>8.1}",
            self.id,
            self.date.format("%Y-%m-%d %H:%M"),
            self.protein,
            self.carbs,
            self.fats
        )
    }
}

impl TableRow for DayPoint {
    fn header() -> String {
        format!("{:<12} {:>10}", "Date", "Value")
    }

    fn row(&self) -> String {
        format!("{:<12} {:>10.1}", self.day, self.value)
    }
}

impl TableRow for MacroPoint {
    fn header() -> String {
        format!("{:<18} {:>8} {:>8} {:>8}", "Time", "Protein", "Carbs", "Fats")
    }

    fn row(&self) -> String {
        format!(
            "{:<18} {:>8.1} {:>8.1} {:>8.1}",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.protein,
            self.carbs,
            self.fats
        )
    }
}

fn print_rows<T: TableRow>(rows: &[T], format: &str, empty: &str) -> anyhow::Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(rows)?),
        "csv" => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        _ => {
            if rows.is_empty() {
                println!("{}", empty);
                return Ok(());
            }
            let header = T::header();
            println!("{}", header);
            println!("{}", "-".repeat(header.len()));
            for row in rows {
                println!("{}", row.row());
            }
        }
    }
    Ok(())
}

fn bar(fraction: f64, width: usize) -> String {
    let filled = (fraction.clamp(0.0, 1.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

fn or_na<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn print_dashboard(summary: &DashboardSummary) {
    let profile = &summary.profile;
    println!("Welcome, {}", profile.username);
    println!();
    println!(
        "Last weight:  {} kg (target: {} kg)",
        or_na(summary.latest_weight),
        or_na(profile.target_weight)
    );
    println!(
        "Hydration:    {} ml {}",
        summary.today_hydration_ml,
        bar(summary.hydration_progress, 20)
    );
    println!(
        "              It should be at least {} ml",
        summary.hydration_recommended_ml
    );

    match summary.macro_chart() {
        Some(split) => println!(
            "Macros:       protein {:.0}% / carbs {:.0}% / fats {:.0}%",
            split.protein, split.carbs, split.fats
        ),
        None => println!("Macros:       No data available"),
    }
    println!();
    print_profile(profile);
}

fn print_profile(profile: &UserProfile) {
    println!("Username:        {}", profile.username);
    println!("Email:           {}", profile.email);
    println!("Date of birth:   {}", or_na(profile.date_of_birth));
    println!("Sex:             {}", or_na(profile.sex));
    println!("Height:          {} cm", or_na(profile.height));
    println!("Initial weight:  {} kg", or_na(profile.initial_weight));
    println!("Target weight:   {} kg", or_na(profile.target_weight));
    println!("Workouts x week: {}", or_na(profile.workouts_per_week));
}
