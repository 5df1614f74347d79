//! Command-line interface for the Tapakila client.
//!
//! Subcommands mirror the pages of the web client:
//! - `login` / `signup` / `logout` / `whoami` - session management
//! - `events list|show|tickets|latest` - browse the catalogue
//! - `checkout` - reserve and pay for tickets
//! - `reservations list|confirm|cancel` - manage existing reservations

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{
    ApiClient, ApiError, EventFilter, PageRange, PaymentMethod, ReservationGateway, Ticket,
};
use crate::checkout::{CheckoutOrchestrator, TicketSelection};
use crate::config::Config;
use crate::session::SessionStore;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "tapakila")]
#[command(author, version, about = "Command-line client for the Tapakila event-ticketing platform", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "tapakila.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Backend API URL (overrides the config file)
    #[arg(long, env = "TAPAKILA_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Create an account and log in
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Log out and forget the stored session
    Logout,

    /// Show the current session
    Whoami,

    /// Browse events
    #[command(subcommand)]
    Events(EventsCommands),

    /// Reserve and pay for tickets in one step
    Checkout {
        /// Event ID
        #[arg(long)]
        event: i64,
        /// Ticket ID (see `events tickets <id>`)
        #[arg(long)]
        ticket: i64,
        /// Number of tickets
        #[arg(long, default_value = "1")]
        quantity: u32,
        /// Payment method
        #[arg(long, value_enum, default_value_t = PaymentMethod::Card)]
        payment_method: PaymentMethod,
    },

    /// Manage your reservations
    #[command(subcommand)]
    Reservations(ReservationsCommands),
}

/// Events subcommands
#[derive(Subcommand, Debug)]
pub enum EventsCommands {
    /// List published events
    List {
        /// Full-text search
        #[arg(long)]
        search: Option<String>,
        /// Filter by location
        #[arg(long)]
        location: Option<String>,
        /// Filter by category
        #[arg(long)]
        category: Option<String>,
        /// Filter by date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Page number (zero-based)
        #[arg(long, default_value = "0")]
        page: u32,
        /// Events per page
        #[arg(long, default_value = "8")]
        per_page: u32,
    },
    /// Show details for one event
    Show {
        /// Event ID
        event: i64,
    },
    /// List ticket types on sale for an event
    Tickets {
        /// Event ID
        event: i64,
    },
    /// Show the most recent events
    Latest,
}

/// Reservations subcommands
#[derive(Subcommand, Debug)]
pub enum ReservationsCommands {
    /// List your reservations
    List,
    /// Confirm a pending reservation
    Confirm {
        /// Reservation ID
        reservation: i64,
    },
    /// Cancel a reservation
    Cancel {
        /// Reservation ID
        reservation: i64,
    },
}

/// Run a CLI command
pub async fn run_command(cli: &Cli, config: &Config) -> Result<()> {
    let session = Arc::new(SessionStore::new(&config.session.data_dir));
    session.restore();
    let client = Arc::new(ApiClient::new(&config.api, session.clone())?);

    match &cli.command {
        Commands::Login { email, password } => cmd_login(&client, &session, email, password).await,
        Commands::Signup {
            name,
            email,
            password,
        } => cmd_signup(&client, &session, name, email, password).await,
        Commands::Logout => cmd_logout(&session),
        Commands::Whoami => cmd_whoami(&session),
        Commands::Events(EventsCommands::List {
            search,
            location,
            category,
            date,
            page,
            per_page,
        }) => {
            let filter = EventFilter {
                search: search.clone(),
                location: location.clone(),
                category: category.clone(),
                date: date.clone(),
                status: None,
            };
            cmd_events_list(&client, &filter, *page, *per_page).await
        }
        Commands::Events(EventsCommands::Show { event }) => cmd_events_show(&client, *event).await,
        Commands::Events(EventsCommands::Tickets { event }) => {
            cmd_events_tickets(&client, *event).await
        }
        Commands::Events(EventsCommands::Latest) => cmd_events_latest(&client).await,
        Commands::Checkout {
            event,
            ticket,
            quantity,
            payment_method,
        } => {
            cmd_checkout(
                &client,
                &session,
                *event,
                *ticket,
                *quantity,
                *payment_method,
            )
            .await
        }
        Commands::Reservations(ReservationsCommands::List) => {
            cmd_reservations_list(&client).await
        }
        Commands::Reservations(ReservationsCommands::Confirm { reservation }) => {
            client
                .confirm_reservation(*reservation)
                .await
                .map_err(login_hint)?;
            println!("[OK] Reservation {} confirmed.", reservation);
            Ok(())
        }
        Commands::Reservations(ReservationsCommands::Cancel { reservation }) => {
            client
                .cancel_reservation(*reservation)
                .await
                .map_err(login_hint)?;
            println!("[OK] Reservation {} cancelled.", reservation);
            Ok(())
        }
    }
}

async fn cmd_login(
    client: &ApiClient,
    session: &Arc<SessionStore>,
    email: &str,
    password: &str,
) -> Result<()> {
    let token = client
        .login(email, password)
        .await
        .context("Login failed")?;
    let session = session.login(&token).context("Server returned an unusable token")?;

    println!();
    println!("[OK] Logged in as {}", session.email.as_deref().unwrap_or(email));
    println!("Session valid until {}", format_epoch(session.expires_at));
    println!();
    Ok(())
}

async fn cmd_signup(
    client: &ApiClient,
    session: &Arc<SessionStore>,
    name: &str,
    email: &str,
    password: &str,
) -> Result<()> {
    let token = client
        .signup(name, email, password)
        .await
        .context("Signup failed")?;
    let session = session.login(&token).context("Server returned an unusable token")?;

    println!();
    println!("[OK] Account created. Logged in as {}", session.email.as_deref().unwrap_or(email));
    println!();
    Ok(())
}

fn cmd_logout(session: &Arc<SessionStore>) -> Result<()> {
    session.logout();
    println!("Logged out.");
    Ok(())
}

fn cmd_whoami(session: &Arc<SessionStore>) -> Result<()> {
    match session.current() {
        Some(session) => {
            println!();
            println!("User ID:  {}", session.subject_id);
            if let Some(username) = &session.username {
                println!("Username: {}", username);
            }
            if let Some(email) = &session.email {
                println!("Email:    {}", email);
            }
            println!("Expires:  {}", format_epoch(session.expires_at));
            println!();
        }
        None => {
            println!("Not logged in. Use 'tapakila login' to sign in.");
        }
    }
    Ok(())
}

async fn cmd_events_list(
    client: &ApiClient,
    filter: &EventFilter,
    page: u32,
    per_page: u32,
) -> Result<()> {
    let start = page * per_page;
    let range = PageRange(start, start + per_page);
    let listing = client.list_events(filter, range).await?;

    if listing.events.is_empty() {
        println!("No events found.");
        return Ok(());
    }

    println!();
    println!(
        "{:<8}  {:<36}  {:<18}  {:<20}  {:<14}",
        "ID", "TITLE", "DATE", "LOCATION", "CATEGORY"
    );
    println!("{}", "-".repeat(104));

    for event in &listing.events {
        let date = event
            .date
            .map(format_datetime)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8}  {:<36}  {:<18}  {:<20}  {:<14}",
            event.id,
            truncate(&event.title, 36),
            date,
            truncate(event.location.as_deref().unwrap_or("-"), 20),
            truncate(event.category.as_deref().unwrap_or("-"), 14),
        );
    }

    println!();
    println!(
        "Showing {} of {} events (page {}).",
        listing.events.len(),
        listing.total,
        page
    );
    println!();
    Ok(())
}

async fn cmd_events_show(client: &ApiClient, event_id: i64) -> Result<()> {
    let event = client.get_event(event_id).await?;

    println!();
    println!("=== {} ===", event.title);
    println!();
    println!("ID:        {}", event.id);
    if let Some(date) = event.date {
        println!("Date:      {}", format_datetime(date));
    }
    println!("Location:  {}", event.location.as_deref().unwrap_or("-"));
    println!("Category:  {}", event.category.as_deref().unwrap_or("-"));
    if let Some(organizer) = &event.organizer_name {
        println!("Organizer: {}", organizer);
    }
    if let Some(description) = &event.description {
        println!();
        println!("{}", description);
    }
    println!();
    println!("Use 'tapakila events tickets {}' to see ticket types.", event.id);
    println!();
    Ok(())
}

async fn cmd_events_tickets(client: &ApiClient, event_id: i64) -> Result<()> {
    let tickets = client.get_event_tickets(event_id).await?;

    if tickets.is_empty() {
        println!("No tickets on sale for this event.");
        return Ok(());
    }

    println!();
    println!(
        "{:<8}  {:<12}  {:>10}  {:>10}  {:>8}",
        "ID", "TYPE", "PRICE", "AVAILABLE", "LIMIT"
    );
    println!("{}", "-".repeat(56));

    for ticket in &tickets {
        let limit = ticket
            .purchase_limit
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8}  {:<12}  {:>10.2}  {:>10}  {:>8}",
            ticket.id,
            truncate(&ticket.ticket_type, 12),
            ticket.price,
            ticket.available_quantity,
            limit,
        );
    }

    println!();
    Ok(())
}

async fn cmd_events_latest(client: &ApiClient) -> Result<()> {
    let events = client.latest_events().await?;

    if events.is_empty() {
        println!("No upcoming events.");
        return Ok(());
    }

    println!();
    for event in &events {
        let date = event
            .date
            .map(format_datetime)
            .unwrap_or_else(|| "date TBA".to_string());
        println!("  [{}] {} - {}", event.id, event.title, date);
    }
    println!();
    Ok(())
}

async fn cmd_checkout(
    client: &Arc<ApiClient>,
    session: &Arc<SessionStore>,
    event_id: i64,
    ticket_id: i64,
    quantity: u32,
    payment_method: PaymentMethod,
) -> Result<()> {
    let ticket = find_ticket(client, event_id, ticket_id).await?;

    println!(
        "Reserving {} x {} ({:.2} each)...",
        quantity, ticket.ticket_type, ticket.price
    );

    let orchestrator = CheckoutOrchestrator::new(client.clone(), session.clone());
    let selection = TicketSelection {
        event_id,
        ticket_id,
        quantity,
    };
    let outcome = orchestrator
        .checkout(&selection, &ticket, payment_method)
        .await?;

    println!();
    println!("[OK] Payment confirmed!");
    println!();
    println!("Reservation: {}", outcome.reservation.id);
    println!("Reference:   {}", outcome.confirmation_reference());
    if let Some(amount) = outcome.payment.amount {
        println!("Amount:      {:.2}", amount);
    }
    if let Some(qr) = &outcome.payment.qr_code_url {
        println!("QR code:     {}", qr);
    }
    println!();
    println!("Present the QR code at the event entrance.");
    println!();
    Ok(())
}

async fn cmd_reservations_list(client: &ApiClient) -> Result<()> {
    let reservations = client.my_reservations().await.map_err(login_hint)?;

    if reservations.is_empty() {
        println!("No reservations yet.");
        return Ok(());
    }

    println!();
    println!(
        "{:<8}  {:<8}  {:<8}  {:>4}  {:<10}  {:>10}",
        "ID", "EVENT", "TICKET", "QTY", "STATUS", "AMOUNT"
    );
    println!("{}", "-".repeat(60));

    for reservation in &reservations {
        let amount = reservation
            .amount
            .map(|a| format!("{:.2}", a))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8}  {:<8}  {:<8}  {:>4}  {:<10}  {:>10}",
            reservation.id,
            reservation.event_id,
            reservation.ticket_id,
            reservation.quantity,
            reservation.status.as_str(),
            amount,
        );
    }

    println!();
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Find a ticket by id among the event's ticket types.
async fn find_ticket(client: &ApiClient, event_id: i64, ticket_id: i64) -> Result<Ticket> {
    let tickets = client.get_event_tickets(event_id).await?;
    match tickets.into_iter().find(|t| t.id == ticket_id) {
        Some(ticket) => Ok(ticket),
        None => bail!(
            "Ticket {} not found for event {}. Use 'tapakila events tickets {}' to list them.",
            ticket_id,
            event_id,
            event_id
        ),
    }
}

/// Turn a 401 into a friendlier message for commands that need a session.
fn login_hint(err: ApiError) -> anyhow::Error {
    if err.is_auth_error() {
        anyhow::anyhow!("Authentication required. Run 'tapakila login' first.")
    } else {
        err.into()
    }
}

fn format_epoch(epoch_seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(epoch_seconds, 0)
        .map(format_datetime)
        .unwrap_or_else(|| epoch_seconds.to_string())
}

fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

/// Truncate a string to max length with ellipsis.
/// Counts chars, not bytes: titles and locations are routinely accented.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let prefix: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_strings_alone() {
        assert_eq!(truncate("Jazz Night", 20), "Jazz Night");
    }

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate("A very long event title", 10), "A very ...");
    }

    #[test]
    fn truncate_cuts_accented_titles_on_char_boundaries() {
        // A multibyte char sitting right on the cut point must not panic
        let title = format!("{}événement de fin d'année", "a".repeat(32));
        let cut = truncate(&title, 36);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 36);

        assert_eq!(
            truncate("fête de la musique à Antananarivo", 10),
            "fête de..."
        );
    }

    #[test]
    fn format_epoch_is_readable() {
        // 2026-01-01T00:00:00Z
        assert_eq!(format_epoch(1767225600), "2026-01-01 00:00");
    }
}
