use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use vedakb_core::config::{Config, Settings};
use vedakb_core::data_processor::DataProcessor;
use vedakb_core::traits::Embedder;
use vedakb_embed::embedder_from_settings;
use vedakb_retrieval::{CollectionResolver, OllamaComposer, Retriever};
use vedakb_vector::connector::is_remote;
use vedakb_vector::CollectionWriter;

const USAGE: &str = "Usage: vedakb <ingest|query|status> [args...]
  ingest [dir] [--limit N]           chunk, embed and write .txt files into every configured collection
  query \"<text>\" [--top-k N] [--compose]
  status                             connect and report per-collection availability";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn flag_value(args: &[String], i: usize, flag: &str) -> anyhow::Result<usize> {
    let raw = args.get(i + 1).with_context(|| format!("{flag} requires a number"))?;
    raw.parse::<usize>().with_context(|| format!("{flag} requires a number, got {raw:?}"))
}

fn load_embedder(settings: &Settings) -> anyhow::Result<Arc<dyn Embedder>> {
    Ok(Arc::from(embedder_from_settings(&settings.embedding)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "ingest" => ingest(&config, &settings, &args).await,
        "query" => query(&settings, &args).await,
        "status" => status(&settings).await,
        "-h" | "--help" | "help" => { println!("{USAGE}"); Ok(()) }
        _ => { eprintln!("Unknown command: {}\n{USAGE}", cmd); std::process::exit(1); }
    }
}

async fn ingest(config: &Config, settings: &Settings, args: &[String]) -> anyhow::Result<()> {
    let mut data_dir = None; let mut limit = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" => { limit = Some(flag_value(args, i, "--limit")?); i += 1; }
            a if !a.starts_with('-') => data_dir = Some(PathBuf::from(a)),
            other => bail!("unknown ingest option {other}"),
        }
        i += 1;
    }
    let data_dir = data_dir.unwrap_or_else(|| {
        let dir: String = config.get("data.raw_txt_dir").unwrap_or_else(|_| "data/txt".to_string()); vedakb_core::config::expand_path(dir)
    });
    let backend = settings.connection.expanded_backend_url();
    if is_remote(&backend) { bail!("ingest writes LanceDB directories only; backend_url {backend} is remote"); }
    let collections = CollectionResolver::new(settings.retrieval.naming_strategy()).resolve(settings.retrieval.instances.as_slice());
    if collections.is_empty() { bail!("no instances configured (set retrieval.instances or APP_RETRIEVAL__INSTANCES)"); }

    println!("Ingesting from {}", data_dir.display());
    let processor = DataProcessor::new();
    let chunks = match limit {
        Some(n) => { println!("Limiting to {} files", n); processor.process_directory_limited(&data_dir, n)? }
        None => processor.process_directory(&data_dir)?,
    };
    if chunks.is_empty() { println!("No .txt files found under {}", data_dir.display()); return Ok(()); }

    let embedder = load_embedder(settings)?;
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts)).await??;
    let dim = embeddings.first().map_or(0, Vec::len);
    let writer = CollectionWriter::open(&backend, dim).await?;
    for c in &collections {
        let written = writer.write(&c.resolved_name, &chunks, &embeddings).await?;
        println!("  {} <- {} chunks", c.resolved_name, written);
    }
    println!("✅ Ingest complete ({} chunks x {} collections)", chunks.len(), collections.len());
    Ok(())
}

async fn query(settings: &Settings, args: &[String]) -> anyhow::Result<()> {
    let mut text = None; let mut top_k = settings.retrieval.top_k; let mut compose = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--top-k" | "-k" => {
                top_k = flag_value(args, i, "--top-k")?;
                if top_k == 0 { bail!("--top-k must be at least 1"); }
                i += 1;
            }
            "--compose" | "-c" => compose = true,
            a if !a.starts_with('-') => text = Some(a.to_string()),
            other => bail!("unknown query option {other}"),
        }
        i += 1;
    }
    let Some(text) = text else { eprintln!("Usage: vedakb query \"<text>\" [--top-k N] [--compose]"); std::process::exit(1) };

    let connection = vedakb_retrieval::connect(settings).await;
    let retriever = Retriever::new(connection, load_embedder(settings)?, &settings.retrieval);
    println!("🔍 {}", text);

    if compose {
        let composer = OllamaComposer::from_settings(&settings.composer)?;
        let answer = retriever.answer_top_k(&text, top_k, &composer).await?;
        println!("\n{}\n", answer.final_text);
        for (n, c) in answer.citations.iter().enumerate() { println!("  [{}] {} :: {}", n + 1, c.source, c.snippet); }
        return Ok(());
    }

    let retrieval = retriever.retrieve_top_k(&text, top_k).await?;
    println!("Found {} passages ({} collections searched)", retrieval.passages.len(), retrieval.searched);
    for (n, p) in retrieval.passages.iter().enumerate() {
        println!("\n  {}. score={:.4}  collection={}  source={}", n + 1, p.score, p.source_collection, p.source());
        println!("     {}", p.text);
    }
    for name in &retrieval.missing { println!("⚠️  missing collection: {}", name); }
    for f in &retrieval.failures { println!("⚠️  {} failed: {}", f.collection, f.cause); }
    Ok(())
}

async fn status(settings: &Settings) -> anyhow::Result<()> {
    let connection = vedakb_retrieval::connect(settings).await;
    println!("backend: {}", settings.connection.expanded_backend_url());
    println!("state:   {}", connection.state());
    let resolver = CollectionResolver::new(settings.retrieval.naming_strategy());
    let refs = resolver.resolve(settings.retrieval.instances.as_slice());
    let Some(store) = connection.handle() else {
        for r in &refs { println!("  {} (unchecked)", r.resolved_name); }
        return Ok(());
    };
    for r in resolver.validate(store.as_ref(), &refs).await {
        println!("  {} {}", if r.exists { "✓" } else { "✗" }, r.resolved_name);
    }
    Ok(())
}
