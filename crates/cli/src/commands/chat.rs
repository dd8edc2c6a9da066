//! `fixdesk chat`: Interactive troubleshooting session.

use fixdesk_agent::{KnowledgeAvailability, SupportService};
use fixdesk_config::AppConfig;
use fixdesk_core::session::{SessionId, Stage, TurnResult};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early: give a clear error
    if let (false, Some(message)) = config.validate_configuration() {
        eprintln!();
        eprintln!("  ERROR: {message}");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export OPENAI_API_KEY='sk-...'");
        eprintln!("    export FIXDESK_API_KEY='sk-...'   (any OpenAI-compatible provider)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("Configuration invalid. See above for setup instructions.".into());
    }

    let service = SupportService::from_config(config).await?;
    let knowledge = match service.knowledge() {
        KnowledgeAvailability::Available(store) => format!("{} ({})", store.collection(), store.status()),
        KnowledgeAvailability::Unavailable(reason) => format!("unavailable: {reason}"),
    };

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        FixDesk — Device Troubleshooting      ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:      {}", service.config().default_model);
    println!("  Knowledge:  {knowledge}");
    println!("  Devices:");
    for device in service.supported_devices() {
        println!("    - {}", device.display_name());
    }
    println!();
    println!("  Tell me which device you have to get started.");
    println!("  Type 'reset' to start over, 'exit' or Ctrl+C to quit.");
    println!();

    let session_id = SessionId::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "exit" | "quit" => break,
            "reset" => {
                service.reset_session(&session_id).await;
                println!("  Session reset. Which device do you have?");
                println!();
            }
            text => {
                eprint!("  ...");
                let result = service.process_turn(&session_id, text).await;
                eprint!("\r     \r");
                print_turn(&result);

                if result.stage == Stage::Complete && !result.is_error {
                    break;
                }
            }
        }
        prompt()?;
    }

    service.end_session(&session_id).await;
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_turn(result: &TurnResult) {
    println!();
    for notice in &result.notices {
        eprintln!("  [Notice] {notice}");
    }
    if result.is_error {
        eprintln!("  [Error] {}", result.agent_text);
    } else {
        for line in result.agent_text.lines() {
            println!("  FixDesk > {line}");
        }
    }
    if result.awaiting_confirmation {
        println!();
        println!("  Did this step fix the problem? (yes / no)");
    }
    println!();
}
