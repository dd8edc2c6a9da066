//! `fixdesk doctor`: Diagnose configuration and connectivity.

use fixdesk_config::AppConfig;
use fixdesk_knowledge::{KnowledgeStatus, KnowledgeStore};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 FixDesk Doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found");
    } else {
        println!("  ⚠️  No config file, using defaults — run `fixdesk onboard`");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the configuration before running other checks.");
            return Ok(());
        }
    };

    match config.validate_configuration() {
        (true, _) => println!("  ✅ Completion API key configured ({})", config.default_provider),
        (false, message) => {
            println!("  ❌ {}", message.unwrap_or_default());
            issues += 1;
        }
    }

    println!("  ✅ {} supported devices", config.devices.len());

    match fixdesk_providers::build_embedder(&config) {
        None => {
            println!("  ⚠️  No embedding API key — knowledge retrieval disabled");
            issues += 1;
        }
        Some(embedder) => {
            println!("  ✅ Embedding provider configured ({})", config.embedding.provider);
            match KnowledgeStore::from_config(&config, embedder).await {
                Ok(store) if store.status() == KnowledgeStatus::Ready => {
                    println!("  ✅ Knowledge collection '{}' ready", store.collection());
                }
                Ok(store) => {
                    println!(
                        "  ⚠️  Collection '{}' missing — run `fixdesk seed` with create_collection_if_missing = true",
                        store.collection()
                    );
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Vector database: {e}");
                    issues += 1;
                }
            }
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
