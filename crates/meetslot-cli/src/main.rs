use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "meetslot-cli", version, about = "Meetslot CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule a meeting from a request file
    Schedule(commands::schedule::ScheduleArgs),
    /// Analyze free slots per participant
    Slots(commands::slots::SlotsArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Schedule(args) => commands::schedule::run(args),
        Commands::Slots(args) => commands::slots::run(args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
