use anyhow::{Context, Result};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::{self, ModelSummary, status::collect_system_status};
use crate::backends::{OllamaClient, OpenAiClient};
use crate::config::{Config, Provider};
use crate::database::VectorStore;
use crate::pipeline::DocumentPipeline;

fn load_config() -> Result<Config> {
    Config::load_default().context("Failed to load configuration")
}

async fn open_store(config: &Config) -> Result<VectorStore> {
    VectorStore::new(
        config,
        config.embedding_model(),
        config.embedding_dimension(),
    )
    .await
    .context("Failed to open vector store")
}

fn spinner(message: String) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Start the HTTP API
#[inline]
pub async fn serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = load_config()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate().context("Invalid server settings")?;

    info!(
        "Starting DocMind API with {} embeddings",
        config.provider
    );
    api::serve(&config).await?;
    Ok(())
}

/// Ingest a PDF from disk, as the upload endpoint would
#[inline]
pub async fn ingest(path: &Path) -> Result<()> {
    let config = load_config()?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} is not a file path", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let pipeline = DocumentPipeline::from_config(&config).await?;

    let bar = spinner(format!("Ingesting {}", filename));
    let result = pipeline.ingest_upload(&filename, &bytes).await;
    bar.finish_and_clear();

    let report = result?;
    println!(
        "✅ {}: {} chunks stored",
        report.filename, report.chunks_count
    );
    if let Some(warning) = report.warning {
        println!("⚠️  {}", warning);
    }

    Ok(())
}

/// Ask a question against the stored documents
#[inline]
pub async fn ask(question: &str, model: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let provider = match model {
        Some(model) => model.parse::<Provider>()?,
        None => Provider::default(),
    };

    let pipeline = DocumentPipeline::from_config(&config).await?;

    let bar = spinner(format!("Asking {}", provider));
    let result = pipeline.answer(question, provider).await;
    bar.finish_and_clear();

    let answer = result?;
    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  • {}", source);
        }
    }

    Ok(())
}

/// Print collection statistics as JSON
#[inline]
pub async fn show_stats() -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;

    let stats = store.stats().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// Print a sample of stored chunks
#[inline]
pub async fn list_documents(limit: usize) -> Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;

    let documents = store.sample(limit).await;
    if documents.is_empty() {
        println!("No documents stored.");
        return Ok(());
    }

    for document in &documents {
        let preview: String = document.content.chars().take(80).collect();
        println!(
            "{}  {}  {}",
            document.id,
            document.metadata.citation(),
            preview.replace('\n', " ")
        );
    }
    println!();
    println!("{} chunk(s) shown", documents.len());
    Ok(())
}

/// Clear the collection, asking first unless `assume_yes`
#[inline]
pub async fn reset_collection(assume_yes: bool) -> Result<()> {
    let config = load_config()?;

    if !assume_yes
        && !Confirm::new()
            .with_prompt(format!(
                "Delete every document in '{}'?",
                config.vector_store.collection
            ))
            .default(false)
            .interact()?
    {
        println!("Reset cancelled.");
        return Ok(());
    }

    let store = open_store(&config).await?;
    store.reset().await.context("Failed to reset database")?;
    println!("✅ Database cleared successfully");
    Ok(())
}

/// Show configuration, backend reachability, collection and host status
#[inline]
pub async fn show_status() -> Result<()> {
    let config = load_config()?;

    println!("📊 DocMind Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Models:");
    println!("   Provider: {}", config.provider);
    println!(
        "   Embeddings: {} ({} dimensions)",
        config.embedding_model(),
        config.embedding_dimension()
    );
    println!("   Chat: {}", config.chat_model(config.provider));

    println!();
    println!("🔌 Backends:");
    let ollama_config = config.clone();
    let ollama = tokio::task::spawn_blocking(move || {
        OllamaClient::new(&ollama_config)?
            .with_timeout(Duration::from_secs(5))
            .health_check(&ollama_config.ollama.chat_model)
    })
    .await?;
    match ollama {
        Ok(()) => println!(
            "   ✅ Ollama: Connected ({}:{})",
            config.ollama.host, config.ollama.port
        ),
        Err(e) => println!("   ❌ Ollama: {:#}", e),
    }

    if config.openai.api_key.is_some() {
        let openai_config = config.clone();
        let openai = tokio::task::spawn_blocking(move || {
            OpenAiClient::new(&openai_config)?
                .with_timeout(Duration::from_secs(5))
                .health_check(&openai_config.openai.chat_model)
        })
        .await?;
        match openai {
            Ok(()) => println!("   ✅ OpenAI: Connected ({})", config.openai.base_url),
            Err(e) => println!("   ❌ OpenAI: {:#}", e),
        }
    } else {
        println!("   ⚠️  OpenAI: No API key configured");
    }

    println!();
    println!("🔍 Vector Store:");
    match open_store(&config).await {
        Ok(store) => {
            let stats = store.stats().await;
            println!("   Location: {}", config.vector_store_uri());
            println!("   Collection: {}", store.table_name());
            println!("   Status: {} ({} chunks)", stats.status, stats.count);
        }
        Err(e) => {
            warn!("Vector store unavailable: {:#}", e);
            println!("   ❌ {:#}", e);
        }
    }

    let models = ModelSummary {
        embedding_model: config.embedding_model().to_string(),
        embedding_dimensions: config.embedding_dimension(),
        llm_provider: config.provider.to_string(),
        llm_model: config.chat_model(config.provider).to_string(),
    };
    let host = tokio::task::spawn_blocking(move || collect_system_status(models)).await?;

    println!();
    println!("🖥️  Host:");
    println!("   OS: {} {}", host.os, host.os_version);
    println!("   CPUs: {} ({}% busy)", host.cpu_count, host.cpu_percent);
    println!(
        "   RAM: {} / {} GB ({}%)",
        host.ram_used_gb, host.ram_total_gb, host.ram_percent
    );

    Ok(())
}
