use clap::{Args, Parser, Subcommand};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing session token; pass --token or set BOOKING_TOKEN")]
    MissingToken,
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("server returned HTTP {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("invalid role `{0}`; expected resident, staff, or admin")]
    InvalidRole(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "booking-cli", about = "Facility booking administration CLI")]
struct Cli {
    #[arg(long, env = "BOOKING_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "BOOKING_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    base_url: String,
    token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Login(LoginCommand),
    Users(UsersCommand),
    Facilities(FacilitiesCommand),
    Slots(SlotsCommand),
    Bookings(BookingsCommand),
    Dashboard,
    Events(EventsCommand),
}

#[derive(Args, Debug)]
struct LoginCommand {
    #[command(subcommand)]
    command: LoginSubcommand,
}

#[derive(Subcommand, Debug)]
enum LoginSubcommand {
    /// Send an access code to the email address.
    Request { email: String },
    /// Exchange the access code for a session token.
    Verify { email: String, code: String },
}

#[derive(Args, Debug)]
struct UsersCommand {
    #[command(subcommand)]
    command: UsersSubcommand,
}

#[derive(Subcommand, Debug)]
enum UsersSubcommand {
    List,
    Approve { user_id: Uuid },
    Role { user_id: Uuid, role: String },
}

#[derive(Args, Debug)]
struct FacilitiesCommand {
    #[command(subcommand)]
    command: FacilitiesSubcommand,
}

#[derive(Subcommand, Debug)]
enum FacilitiesSubcommand {
    List,
}

#[derive(Args, Debug)]
struct SlotsCommand {
    #[command(subcommand)]
    command: SlotsSubcommand,
}

#[derive(Subcommand, Debug)]
enum SlotsSubcommand {
    List { facility_id: Uuid },
    Add { facility_id: Uuid, start: String, end: String },
    Remove { facility_id: Uuid, start: String, end: String },
}

#[derive(Args, Debug)]
struct BookingsCommand {
    #[command(subcommand)]
    command: BookingsSubcommand,
}

#[derive(Subcommand, Debug)]
enum BookingsSubcommand {
    Pending,
    Approve { booking_id: Uuid },
    Reject { booking_id: Uuid },
}

#[derive(Args, Debug)]
struct EventsCommand {
    #[command(subcommand)]
    command: EventsSubcommand,
}

#[derive(Subcommand, Debug)]
enum EventsSubcommand {
    List {
        #[arg(long)]
        limit: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = CliContext { base_url: cli.base_url, token: cli.token };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Login(login) => run_login(&ctx, login).await,
        Command::Users(users) => run_users(&ctx, users).await,
        Command::Facilities(facilities) => run_facilities(&ctx, facilities).await,
        Command::Slots(slots) => run_slots(&ctx, slots).await,
        Command::Bookings(bookings) => run_bookings(&ctx, bookings).await,
        Command::Dashboard => get_and_print(&ctx, "/api/admin/staff-dashboard").await,
        Command::Events(events) => run_events(&ctx, events).await,
    }
}

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let response = client.get(endpoint(&cli.base_url, "/healthz")).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CliError::ServerError { status: status.as_u16(), body });
    }
    println!("ok");
    Ok(())
}

async fn run_login(cli: &CliContext, login: LoginCommand) -> Result<(), CliError> {
    let (path, body) = match login.command {
        LoginSubcommand::Request { email } => ("/api/auth/request-code", json!({ "email": email })),
        LoginSubcommand::Verify { email, code } => ("/api/auth/verify-code", json!({ "email": email, "code": code })),
    };
    let json = send(cli, None, reqwest::Method::POST, path, Some(body)).await?;
    print_json(&json)
}

async fn run_users(cli: &CliContext, users: UsersCommand) -> Result<(), CliError> {
    match users.command {
        UsersSubcommand::List => get_and_print(cli, "/api/admin/users").await,
        UsersSubcommand::Approve { user_id } => {
            let path = format!("/api/admin/users/{user_id}");
            let json = api_request(cli, reqwest::Method::PATCH, &path, Some(json!({ "is_approved": true }))).await?;
            print_json(&json)
        }
        UsersSubcommand::Role { user_id, role } => {
            let body = role_update_body(&role)?;
            let path = format!("/api/admin/users/{user_id}");
            let json = api_request(cli, reqwest::Method::PATCH, &path, Some(body)).await?;
            print_json(&json)
        }
    }
}

async fn run_facilities(cli: &CliContext, facilities: FacilitiesCommand) -> Result<(), CliError> {
    match facilities.command {
        FacilitiesSubcommand::List => get_and_print(cli, "/api/facilities").await,
    }
}

async fn run_slots(cli: &CliContext, slots: SlotsCommand) -> Result<(), CliError> {
    let (method, facility_id, body) = match slots.command {
        SlotsSubcommand::List { facility_id } => (reqwest::Method::GET, facility_id, None),
        SlotsSubcommand::Add { facility_id, start, end } => {
            (reqwest::Method::POST, facility_id, Some(slot_body(&start, &end)))
        }
        SlotsSubcommand::Remove { facility_id, start, end } => {
            (reqwest::Method::DELETE, facility_id, Some(slot_body(&start, &end)))
        }
    };
    let path = format!("/api/facilities/{facility_id}/timeslots");
    let json = api_request(cli, method, &path, body).await?;
    print_json(&json)
}

async fn run_bookings(cli: &CliContext, bookings: BookingsCommand) -> Result<(), CliError> {
    let path = match bookings.command {
        BookingsSubcommand::Pending => return get_and_print(cli, "/api/admin/bookings?status=pending").await,
        BookingsSubcommand::Approve { booking_id } => format!("/api/admin/bookings/{booking_id}/approve"),
        BookingsSubcommand::Reject { booking_id } => format!("/api/admin/bookings/{booking_id}/reject"),
    };
    let json = api_request(cli, reqwest::Method::POST, &path, None).await?;
    print_json(&json)
}

async fn run_events(cli: &CliContext, events: EventsCommand) -> Result<(), CliError> {
    match events.command {
        EventsSubcommand::List { limit } => {
            let path = match limit {
                Some(limit) => format!("/api/events?limit={limit}"),
                None => "/api/events".to_owned(),
            };
            get_and_print(cli, &path).await
        }
    }
}

async fn get_and_print(cli: &CliContext, path: &str) -> Result<(), CliError> {
    let json = api_request(cli, reqwest::Method::GET, path, None).await?;
    print_json(&json)
}

async fn api_request(
    cli: &CliContext,
    method: reqwest::Method,
    path: &str,
    body: Option<Value>,
) -> Result<Value, CliError> {
    let token = cli.token.as_deref().ok_or(CliError::MissingToken)?;
    send(cli, Some(token), method, path, body).await
}

async fn send(
    cli: &CliContext,
    token: Option<&str>,
    method: reqwest::Method,
    path: &str,
    body: Option<Value>,
) -> Result<Value, CliError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
    }

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .build()?;

    let request = client.request(method, endpoint(&cli.base_url, path));
    let request = if let Some(json) = body { request.json(&json) } else { request };

    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(CliError::ServerError { status: status.as_u16(), body: text });
    }

    Ok(parse_body(&text))
}

/// Empty bodies (204) read as null; non-JSON bodies are kept as text.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

fn slot_body(start: &str, end: &str) -> Value {
    json!({ "start": start, "end": end })
}

fn role_update_body(role: &str) -> Result<Value, CliError> {
    let normalized = role.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "resident" | "staff" | "admin" => Ok(json!({ "role": normalized })),
        _ => Err(CliError::InvalidRole(role.to_owned())),
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    if value.is_null() {
        println!("ok");
        return Ok(());
    }
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_body_handles_empty_json_and_text() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body(" \n"), Value::Null);
        assert_eq!(parse_body(r#"{"ok":true}"#), json!({ "ok": true }));
        assert_eq!(parse_body("Bad Gateway"), Value::String("Bad Gateway".into()));
    }

    #[test]
    fn server_error_shows_raw_body() {
        let err = CliError::ServerError { status: 415, body: "Expected request with `Content-Type: application/json`".into() };
        let rendered = err.to_string();
        assert!(rendered.contains("415"), "{rendered}");
        assert!(rendered.contains("Content-Type: application/json"), "{rendered}");
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(endpoint("http://localhost:3000/", "/healthz"), "http://localhost:3000/healthz");
        assert_eq!(endpoint("http://localhost:3000", "/api/events"), "http://localhost:3000/api/events");
    }

    #[test]
    fn role_body_normalizes_case() {
        assert_eq!(role_update_body(" Staff ").unwrap(), json!({ "role": "staff" }));
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(matches!(role_update_body("owner"), Err(CliError::InvalidRole(r)) if r == "owner"));
    }

    #[test]
    fn slot_body_carries_both_times() {
        assert_eq!(slot_body("09:00", "10:00"), json!({ "start": "09:00", "end": "10:00" }));
    }

    #[test]
    fn cli_parses_slot_add() {
        let id = Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from(["booking-cli", "--token", "abc", "slots", "add", &id, "09:00", "10:00"]).unwrap();
        assert_eq!(cli.token.as_deref(), Some("abc"));
        assert!(matches!(cli.command, Command::Slots(SlotsCommand { command: SlotsSubcommand::Add { .. } })));
    }
}
