use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = err.to_string().to_lowercase();

    if msg.contains("bot token is not set") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Set the token from @BotFather with:");
        eprintln!("  {} export BOT_TOKEN=<token>", "$".dimmed());
    }

    if msg.contains("unauthorized") || msg.contains("(401)") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check that BOT_TOKEN and OPENAI_API_KEY are valid.");
    }

    if msg.contains("config file") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Fix the file or point to another one with:");
        eprintln!("  {} chatrelay --config <path>", "$".dimmed());
    }

    if msg.contains("connection refused") || msg.contains("network") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check your internet connection and try again.");
    }

    std::process::exit(1);
}
