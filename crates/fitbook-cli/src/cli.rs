//! Command line definitions.

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "fitbook", version, about = "Book fitness classes and track fitness plans")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the session
    Login {
        /// Username (defaults to FITBOOK_USERNAME or the last one used)
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Create a new account
    Register(RegisterArgs),
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Browse and manage classes
    #[command(subcommand)]
    Classes(ClassesCommand),
    /// Manage your bookings
    #[command(subcommand)]
    Bookings(BookingsCommand),
    /// View and generate fitness plans
    #[command(subcommand)]
    Plans(PlansCommand),
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[arg(short, long)]
    pub username: String,
    #[arg(short, long)]
    pub email: String,
    #[arg(short, long)]
    pub phone: String,
    /// Account role, e.g. client or instructor
    #[arg(short, long, default_value = "client")]
    pub role: String,
}

#[derive(Debug, Subcommand)]
pub enum ClassesCommand {
    /// List scheduled classes
    List {
        /// Only classes with open slots
        #[arg(long)]
        available: bool,
    },
    /// Show one class
    Show { id: i64 },
    /// Schedule a new class
    Create(ClassArgs),
    /// Edit an existing class
    Update {
        id: i64,
        #[command(flatten)]
        class: ClassArgs,
    },
}

#[derive(Debug, Args)]
pub struct ClassArgs {
    /// Class type, e.g. Yoga
    #[arg(long)]
    pub name: String,
    /// Start time: RFC 3339, or "YYYY-MM-DDTHH:MM" in local time
    #[arg(long)]
    pub at: String,
    /// Length in minutes
    #[arg(long)]
    pub duration: u32,
    #[arg(long)]
    pub instructor: String,
    #[arg(long)]
    pub slots: u32,
    #[arg(long, default_value = "Beginner")]
    pub difficulty: String,
    #[arg(long)]
    pub location: String,
}

#[derive(Debug, Subcommand)]
pub enum BookingsCommand {
    /// List your bookings
    List,
    /// Book slots in a class
    Create {
        class_id: i64,
        #[arg(long, default_value_t = 1)]
        slots: u32,
    },
    /// Cancel a booking
    Cancel { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum PlansCommand {
    /// List your fitness plans with progress
    List {
        /// Print every day of each plan
        #[arg(long)]
        details: bool,
    },
    /// Generate a new plan with the AI assistant
    Generate(PlanArgs),
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long, default_value = "")]
    pub description: String,
    /// First day of the plan (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub start_date: Option<String>,
    /// Plan length in days
    #[arg(long, default_value_t = 30)]
    pub duration: u32,
    #[arg(long, default_value_t = 2000)]
    pub budget: u32,
    #[arg(long, default_value = "lose weight")]
    pub goal: String,
    #[arg(long, default_value = "Beginner")]
    pub level: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_booking_create_defaults() {
        let cli = Cli::try_parse_from(["fitbook", "bookings", "create", "7"]).unwrap();
        match cli.command {
            Command::Bookings(BookingsCommand::Create { class_id, slots }) => {
                assert_eq!(class_id, 7);
                assert_eq!(slots, 1);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_plan_generate_defaults() {
        let cli = Cli::try_parse_from(["fitbook", "plans", "generate", "--name", "Summer"]).unwrap();
        match cli.command {
            Command::Plans(PlansCommand::Generate(args)) => {
                assert_eq!(args.name, "Summer");
                assert_eq!(args.duration, 30);
                assert_eq!(args.budget, 2000);
                assert_eq!(args.goal, "lose weight");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
