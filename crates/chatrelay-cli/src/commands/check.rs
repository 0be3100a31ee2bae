use anyhow::{Context, Result};
use chatrelay_core::RelayConfig;
use chatrelay_core::channel::{TelegramChannel, TelegramConfig};
use colored::Colorize;

pub async fn run(config: RelayConfig) -> Result<()> {
    let channel = TelegramChannel::new(
        TelegramConfig::new(&config.bot_token)
            .with_polling_timeout(config.polling_timeout_secs)
            .with_api_base(&config.telegram_api_base),
    );

    let bot = channel
        .test_connection()
        .await
        .context("Telegram getMe request failed")?;

    let name = bot
        .username
        .map(|username| format!("@{}", username))
        .or(bot.first_name)
        .unwrap_or_else(|| bot.id.to_string());

    println!("{} Telegram bot {} (id {})", "✓".green(), name.bold(), bot.id);
    println!("  model:          {}", config.model);
    println!("  api base url:   {}", config.base_url);
    println!("  history limit:  {}", config.history_limit);
    println!("  window scope:   {}", config.window_scope);
    println!("  assembly order: {}", config.assembly_order);
    if config.api_key.is_empty() {
        println!("{} OPENAI_API_KEY is not set", "!".yellow());
    }

    Ok(())
}
