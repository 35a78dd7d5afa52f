//! Command handlers for the fitbook CLI.
//!
//! `App` owns the configuration and the session client, runs one command,
//! and afterwards reports session events such as an expired login.

use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use fitbook_core::api::ApiError;
use fitbook_core::models::{
    Booking, BookingRequest, ClassForm, FitnessClass, FitnessPlan, NewUser, PlanRequest,
};
use fitbook_core::utils::{format_class_time, format_optional, progress_bar, truncate_string};
use fitbook_core::{Config, Session, SessionClient, SessionEvent};

use crate::cli::{
    BookingsCommand, ClassArgs, ClassesCommand, Command, PlanArgs, PlansCommand, RegisterArgs,
};

/// Width of the plan progress bar
const PROGRESS_BAR_WIDTH: usize = 20;

/// Maximum description length shown in plan listings
const MAX_DESCRIPTION_LENGTH: usize = 60;

pub struct App {
    config: Config,
    client: SessionClient,
    events: broadcast::Receiver<SessionEvent>,
}

impl App {
    pub fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        debug!(backend = %config.backend_url, storage = ?config.storage, "Config loaded");

        let store = config.open_store().context("Failed to open credential store")?;
        let session = Session::new(store);
        let events = session.subscribe();
        let client = SessionClient::from_config(&config, session)?;

        Ok(Self {
            config,
            client,
            events,
        })
    }

    pub fn backend_url(&self) -> &str {
        &self.config.backend_url
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login { username } => self.login(username).await,
            Command::Register(args) => self.register(args).await,
            Command::Logout => {
                self.client.logout()?;
                println!("Logged out.");
                Ok(())
            }
            Command::Whoami => {
                self.whoami();
                Ok(())
            }
            Command::Classes(cmd) => self.classes(cmd).await,
            Command::Bookings(cmd) => self.bookings(cmd).await,
            Command::Plans(cmd) => self.plans(cmd).await,
        }
    }

    /// Tell the user when the session ended during the command
    pub fn report_session_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(SessionEvent::Expired) => {
                    eprintln!("Your session has expired. Run `fitbook login` to sign in again.");
                }
                Ok(event) => debug!(?event, "Session event"),
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "Missed session events");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    async fn login(&mut self, username: Option<String>) -> Result<()> {
        let username = match username
            .or_else(|| std::env::var("FITBOOK_USERNAME").ok())
            .or_else(|| self.config.last_username.clone())
        {
            Some(u) if !u.trim().is_empty() => u,
            _ => prompt_line("Username: ")?,
        };
        let password = match std::env::var("FITBOOK_PASSWORD") {
            Ok(p) if !p.is_empty() => p,
            _ => rpassword::prompt_password("Password: ")?,
        };

        if username.trim().is_empty() || password.is_empty() {
            return Err(anyhow::anyhow!("Username and password required"));
        }

        match self.client.login(username.trim(), &password).await {
            Ok(user) => {
                self.config.last_username = Some(username.trim().to_string());
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
                let name = user.map(|u| u.username).unwrap_or(username);
                println!("Logged in as {}.", name);
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!(login_error_message(&e))),
        }
    }

    async fn register(&mut self, args: RegisterArgs) -> Result<()> {
        let password = rpassword::prompt_password("Password: ")?;
        let confirm_password = rpassword::prompt_password("Confirm password: ")?;

        let user = NewUser {
            username: args.username,
            email: args.email,
            phone_number: args.phone,
            role: args.role,
            password,
            confirm_password,
        };
        self.client.register(&user).await?;
        println!("Registration successful! Run `fitbook login` to sign in.");
        Ok(())
    }

    fn whoami(&self) {
        let session = self.client.session();
        if !session.is_authenticated() {
            println!("Not logged in.");
            return;
        }
        match session.user() {
            Some(user) => {
                println!("Username: {}", user.username);
                println!("Email:    {}", format_optional(user.email.as_deref(), "-"));
                println!("Role:     {}", format_optional(user.role(), "-"));
            }
            None => println!("Logged in (no profile stored)."),
        }
    }

    // =========================================================================
    // Classes
    // =========================================================================

    async fn classes(&self, cmd: ClassesCommand) -> Result<()> {
        match cmd {
            ClassesCommand::List { available } => {
                let classes = if available {
                    self.client.available_classes(&self.config.timezone).await?
                } else {
                    self.client.list_classes(&self.config.timezone).await?
                };
                if classes.is_empty() {
                    println!("No classes found.");
                }
                for class in &classes {
                    print_class_row(class);
                }
            }
            ClassesCommand::Show { id } => {
                let class = self.client.get_class(id).await?;
                print_class_detail(&class);
            }
            ClassesCommand::Create(args) => {
                let class = self.client.create_class(&class_form(args)?).await?;
                println!("Created class #{}.", class.id);
            }
            ClassesCommand::Update { id, class } => {
                let updated = self.client.update_class(id, &class_form(class)?).await?;
                println!("Updated class #{}.", updated.id);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Bookings
    // =========================================================================

    async fn bookings(&self, cmd: BookingsCommand) -> Result<()> {
        match cmd {
            BookingsCommand::List => {
                let bookings = self.client.list_bookings().await?;
                if bookings.is_empty() {
                    println!("No bookings found. Browse classes with `fitbook classes list --available`.");
                }
                for booking in &bookings {
                    print_booking(booking);
                }
            }
            BookingsCommand::Create { class_id, slots } => {
                self.client
                    .create_booking(&BookingRequest { class_id, slots })
                    .await?;
                println!("Booked {} slot(s) in class #{}.", slots, class_id);
            }
            BookingsCommand::Cancel { id } => {
                self.client.cancel_booking(id).await?;
                println!("Cancelled booking #{}.", id);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Fitness plans
    // =========================================================================

    async fn plans(&self, cmd: PlansCommand) -> Result<()> {
        match cmd {
            PlansCommand::List { details } => {
                let plans = self.client.list_plans().await?;
                if plans.is_empty() {
                    println!("No fitness plans yet. Create one with `fitbook plans generate`.");
                }
                for plan in &plans {
                    print_plan(plan, details);
                }
            }
            PlansCommand::Generate(args) => {
                println!("Generating plan, this can take a moment...");
                let plan = self.client.generate_plan(&plan_request(args)).await?;
                print_plan(&plan, true);
            }
        }
        Ok(())
    }
}

/// Map a login failure to something a user can act on
fn login_error_message(e: &ApiError) -> String {
    match e {
        ApiError::BadRequest { status: 400 | 401, message } => {
            if message.is_empty() {
                "Invalid username or password".to_string()
            } else {
                message.clone()
            }
        }
        ApiError::NetworkError(err) if err.is_timeout() => {
            "Connection timed out. Please try again.".to_string()
        }
        ApiError::NetworkError(_) => {
            "Unable to connect to server. Check your internet connection.".to_string()
        }
        other => format!("Login failed: {}", other),
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Parse an RFC 3339 timestamp, or "YYYY-MM-DDTHH:MM" in local time
fn parse_start_time(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M"))
        .with_context(|| format!("Invalid start time: {}", input))?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| anyhow::anyhow!("Start time does not exist in local time: {}", input))?;
    Ok(local.with_timezone(&Utc))
}

fn class_form(args: ClassArgs) -> Result<ClassForm> {
    Ok(ClassForm {
        name: args.name,
        date_time: parse_start_time(&args.at)?,
        duration: args.duration,
        instructor: args.instructor,
        total_slots: args.slots,
        difficulty: args.difficulty,
        location: args.location,
    })
}

fn plan_request(args: PlanArgs) -> PlanRequest {
    PlanRequest {
        plan_name: args.name,
        description: args.description,
        start_date: args
            .start_date
            .unwrap_or_else(|| Local::now().date_naive().format("%Y-%m-%d").to_string()),
        duration: args.duration,
        budget: args.budget,
        goal: args.goal,
        level: args.level,
    }
}

fn print_class_row(class: &FitnessClass) {
    let slots = match (class.available_slots, class.total_slots) {
        (Some(open), Some(total)) => format!("{}/{} open", open, total),
        (Some(open), None) => format!("{} open", open),
        _ => "-".to_string(),
    };
    println!(
        "#{:<4} {:<16} {:<24} {:<16} {}",
        class.id,
        truncate_string(class.title(), 16),
        format_class_time(class.date_time.as_ref()),
        truncate_string(class.instructor.as_deref().unwrap_or("N/A"), 16),
        slots
    );
}

fn print_class_detail(class: &FitnessClass) {
    println!("Class #{}: {}", class.id, class.title());
    println!("  When:       {}", format_class_time(class.date_time.as_ref()));
    if let Some(duration) = class.duration {
        println!("  Duration:   {} min", duration);
    }
    println!("  Instructor: {}", format_optional(class.instructor.as_deref(), "N/A"));
    println!("  Difficulty: {}", format_optional(class.difficulty.as_deref(), "-"));
    println!("  Location:   {}", format_optional(class.location.as_deref(), "-"));
    if let Some(open) = class.available_slots {
        println!("  Open slots: {}", open);
    }
}

fn print_booking(booking: &Booking) {
    let when = booking
        .fitness_class_details
        .as_ref()
        .and_then(|c| c.date_time.as_ref());
    println!(
        "Booking #{}: {} with {} at {}",
        booking.id,
        booking.class_type(),
        booking.instructor(),
        format_class_time(when)
    );
    if let Some(ref name) = booking.client_name {
        println!(
            "  Booked by {} <{}>",
            name,
            format_optional(booking.client_email.as_deref(), "-")
        );
    }
}

fn print_plan(plan: &FitnessPlan, details: bool) {
    println!("Plan #{}: {}", plan.id, plan.plan_name);
    if let Some(ref description) = plan.description {
        println!("  {}", truncate_string(description, MAX_DESCRIPTION_LENGTH));
    }
    println!(
        "  Starts {} | {} days | {}/{} done {}",
        format_optional(plan.start_date.as_deref(), "-"),
        plan.duration.unwrap_or(plan.plan_details.len() as u32),
        plan.completed_days(),
        plan.plan_details.len(),
        progress_bar(plan.progress_percent(), PROGRESS_BAR_WIDTH)
    );

    if !details {
        return;
    }
    for (index, day) in plan.plan_details.iter().enumerate() {
        let number = day.day.unwrap_or(index as u32 + 1);
        let mark = if day.is_completed() { "x" } else { " " };
        println!("  [{}] Day {} {}", mark, number, day.date.as_deref().unwrap_or(""));
        if let Some(ref exercise) = day.exercise_plan {
            println!("      Exercise: {}", exercise);
        }
        if let Some(ref meals) = day.meal_plan {
            println!("      Meals:    {}", meals);
        }
        for (label, meal) in [
            ("Breakfast", &day.breakfast),
            ("Lunch", &day.lunch),
            ("Dinner", &day.dinner),
        ] {
            if let Some(meal) = meal {
                println!("      {:<9} {}", format!("{}:", label), meal);
            }
        }
        if let Some(calories) = day.calories {
            println!("      {} calories", calories);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_time_rfc3339() {
        let dt = parse_start_time("2030-01-05T06:30:00+05:30").unwrap();
        assert_eq!(dt.to_rfc3339(), "2030-01-05T01:00:00+00:00");
    }

    #[test]
    fn test_parse_start_time_local() {
        let dt = parse_start_time("2030-01-05T06:30").unwrap();
        let local = dt.with_timezone(&Local);
        assert_eq!(local.format("%Y-%m-%d %H:%M").to_string(), "2030-01-05 06:30");

        assert!(parse_start_time("2030-01-05 06:30").is_ok());
        assert!(parse_start_time("tomorrow").is_err());
    }

    #[test]
    fn test_login_error_message() {
        let err = ApiError::BadRequest {
            status: 401,
            message: "Invalid credentials".to_string(),
        };
        assert_eq!(login_error_message(&err), "Invalid credentials");

        let err = ApiError::BadRequest {
            status: 401,
            message: String::new(),
        };
        assert_eq!(login_error_message(&err), "Invalid username or password");

        assert_eq!(
            login_error_message(&ApiError::RateLimited),
            "Login failed: Rate limited - please wait before retrying"
        );
    }

    #[test]
    fn test_plan_request_defaults_start_date_to_today() {
        let args = PlanArgs {
            name: "Summer".to_string(),
            description: String::new(),
            start_date: None,
            duration: 30,
            budget: 2000,
            goal: "lose weight".to_string(),
            level: "Beginner".to_string(),
        };
        let request = plan_request(args);
        assert_eq!(
            request.start_date,
            Local::now().date_naive().format("%Y-%m-%d").to_string()
        );
    }
}
