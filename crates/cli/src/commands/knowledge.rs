//! `fixdesk search|add|seed|stats`: Knowledge base management.

use fixdesk_config::AppConfig;
use fixdesk_knowledge::KnowledgeStore;

/// Connect to the configured knowledge store. Needs only the embedding
/// and vector database settings, not a completion key.
async fn open_store() -> Result<(AppConfig, KnowledgeStore), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let embedder = fixdesk_providers::build_embedder(&config).ok_or(
        "No embedding API key configured (set VOYAGE_API_KEY or FIXDESK_EMBEDDING_API_KEY)",
    )?;
    let store = KnowledgeStore::from_config(&config, embedder).await?;
    Ok((config, store))
}

fn device_model(config: &AppConfig, device: &str) -> String {
    match config.device(device) {
        Some(known) => known.model.clone(),
        None => {
            tracing::warn!(%device, "Device is not in the configured catalog");
            device.trim().to_string()
        }
    }
}

pub async fn search(device: &str, query: &str, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let (config, store) = open_store().await?;
    let device = device_model(&config, device);

    println!("🔍 Searching {device} solutions for: \"{query}\"");
    println!();

    let results = store.search(&device, query, limit).await?;
    if results.is_empty() {
        println!("  No matching solutions.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!("  {}. [{:.3}] {}", i + 1, result.score, result.problem);
        for line in result.solution.lines() {
            println!("       {line}");
        }
        if let Some(reference) = &result.manual_reference {
            println!("       Manual: {reference}");
        }
        println!();
    }
    Ok(())
}

pub async fn add(
    device: &str,
    problem: &str,
    solution: &str,
    manual_reference: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (config, store) = open_store().await?;
    let device = device_model(&config, device);

    let id = store.upsert_solution(&device, problem, solution, manual_reference).await?;
    println!("✅ Stored solution for {device}: \"{}\"", problem.trim());
    println!("   Record id: {id}");
    Ok(())
}

pub async fn seed(devices: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let (config, store) = open_store().await?;

    let models: Vec<String> = if devices.is_empty() {
        config.devices.iter().map(|d| d.model.clone()).collect()
    } else {
        devices.iter().map(|d| device_model(&config, d)).collect()
    };

    println!("🌱 Seeding sample solutions for: {}", models.join(", "));
    let written = store.seed_samples(models.iter().map(String::as_str)).await?;
    println!("✅ Wrote {written} records to '{}'", store.collection());
    Ok(())
}

pub async fn stats() -> Result<(), Box<dyn std::error::Error>> {
    let (config, store) = open_store().await?;
    let stats = store.stats().await?;

    println!("📚 Knowledge Base");
    println!("=================");
    println!("  Backend:     {}", config.knowledge.backend);
    println!("  Collection:  {}", stats.collection);
    println!("  Status:      {}", stats.status);
    println!("  Records:     {}", stats.points);
    println!("  Dimensions:  {}", stats.vector_size);
    println!("  Embeddings:  {} ({})", config.embedding.model, config.embedding.provider);
    Ok(())
}
