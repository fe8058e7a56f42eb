//! procuregraph - procurement investigation assistant CLI

mod config;
mod interrupt;
mod utils;

use clap::Parser;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use procure_agent::{
    Gateway, Orchestrator, OrchestratorConfig, OrchestratorEvent, ProviderTransport, TurnRequest,
};
use interrupt::TurnGuard;

/// procuregraph - chat assistant with company procurement investigations
#[derive(Parser, Debug)]
#[command(name = "procuregraph")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (default: gpt-4.1-mini)
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature, 0 to 2
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Run a single turn with this message and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Run a single turn from a JSON request file ("-" reads stdin)
    #[arg(long, value_name = "PATH|-")]
    request: Option<PathBuf>,

    /// Continue an existing conversation thread
    #[arg(long)]
    thread_id: Option<String>,

    /// Per-call deadline in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

fn init_tracing(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if verbose { "procure=debug" } else { "procure=warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Load config file, CLI takes precedence
    let mut cfg = config::Config::load();
    if let Some(ref model) = args.model {
        cfg.model = Some(model.clone());
    }
    if let Some(secs) = args.timeout {
        cfg.call_timeout_secs = Some(secs);
    }

    let api_key = match procure_ai::providers::get_api_key(cfg.api_key.as_deref(), config::ENV_API_KEY) {
        Ok(key) => key,
        Err(_) => {
            eprintln!("Error: No API key found");
            eprintln!();
            eprintln!("Set your API key with: export {}=your-key", config::ENV_API_KEY);
            eprintln!("Or add it to config file: procuregraph --init-config");
            std::process::exit(1);
        }
    };

    let orchestrator = Arc::new(build_orchestrator(&cfg, api_key));
    let progress = std::io::stderr().is_terminal();

    let guard = TurnGuard::new();
    guard.listen();

    if let Some(ref path) = args.request {
        let request = read_request(path)?;
        let request = apply_overrides(request, &args);
        return run_once(&orchestrator, &guard, request, progress).await;
    }

    if let Some(ref command) = args.command {
        let request = apply_overrides(TurnRequest::from_text(command.clone()), &args);
        return run_once(&orchestrator, &guard, request, progress).await;
    }

    run_interactive(&orchestrator, &guard, &args, &cfg, progress).await
}

fn build_orchestrator(cfg: &config::Config, api_key: String) -> Orchestrator {
    let transport =
        Arc::new(ProviderTransport::openai(api_key).with_retry_config(cfg.retry.to_retry_config()));
    let model = procure_ai::models::get_model(cfg.model_id(), cfg.base_url());

    tracing::debug!(
        model = %model.id,
        base_url = %model.base_url,
        knowledge_base = cfg.knowledge_base_id.is_some(),
        "building orchestrator"
    );

    let gateway = Gateway::new(transport, model)
        .with_call_timeout(cfg.call_timeout())
        .with_max_tokens(cfg.max_output_tokens);

    let orchestrator = Orchestrator::new(
        gateway,
        OrchestratorConfig {
            knowledge_base_id: cfg.knowledge_base_id.clone(),
        },
    );
    tracing::debug!(tools = ?orchestrator.tools().names(), "hosted tools enabled");
    orchestrator
}

fn read_request(path: &Path) -> anyhow::Result<TurnRequest> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?
    };
    serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("Invalid request JSON: {}", e))
}

/// Command line flags win over the request body
fn apply_overrides(mut request: TurnRequest, args: &Args) -> TurnRequest {
    if let Some(t) = args.temperature {
        request.temperature = Some(t);
    }
    if let Some(ref id) = args.thread_id {
        request.thread_id = Some(id.clone());
    }
    request
}

/// Print progress events to stderr while a turn runs
fn spawn_progress(orchestrator: &Orchestrator) -> tokio::task::JoinHandle<()> {
    let mut receiver = orchestrator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            match event {
                OrchestratorEvent::RouteDecided { mode, company } => match company {
                    Some(company) => eprintln!("[{}: {}]", mode.as_str(), company),
                    None => eprintln!("[{}]", mode.as_str()),
                },
                OrchestratorEvent::PlanReady { plan_markdown, .. } => {
                    for line in plan_markdown.lines().filter(|l| l.starts_with("- ")) {
                        eprintln!("  {}", utils::truncate_chars(line, 100));
                    }
                    eprintln!("[Investigating...]");
                }
                OrchestratorEvent::TurnEnd { usage, .. } => {
                    eprintln!("[Tokens: {} in, {} out]", usage.input, usage.output);
                }
                _ => {}
            }
        }
    })
}

/// Run a turn and print its answer. Returns the thread id on success.
async fn run_turn(
    orchestrator: &Orchestrator,
    guard: &TurnGuard,
    request: TurnRequest,
    progress: bool,
) -> Result<String, procure_agent::Error> {
    let cancel = guard.begin();
    let events = progress.then(|| spawn_progress(orchestrator));

    let result = orchestrator.invoke(request, cancel).await;

    guard.finish();
    if let Some(handle) = events {
        // Let the last events drain
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();
    }

    let outcome = result?;
    println!("{}", outcome.response_text().trim());
    Ok(outcome.thread_id)
}

async fn run_once(
    orchestrator: &Orchestrator,
    guard: &TurnGuard,
    request: TurnRequest,
    progress: bool,
) -> anyhow::Result<()> {
    match run_turn(orchestrator, guard, request, progress).await {
        Ok(thread_id) => {
            tracing::debug!(thread_id = %thread_id, "turn complete");
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e.public_message());
            std::process::exit(utils::exit_code(&e));
        }
    }
}

async fn run_interactive(
    orchestrator: &Orchestrator,
    guard: &TurnGuard,
    args: &Args,
    cfg: &config::Config,
    progress: bool,
) -> anyhow::Result<()> {
    let mut thread_id = args
        .thread_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // Show minimal startup info (only if TTY)
    if progress {
        eprintln!("procuregraph ({}) thread: {}", cfg.model_id(), utils::short_id(&thread_id));
        eprintln!("Type /new for a fresh thread, /exit or Ctrl-C to quit.");
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/exit" | "/quit" => break,
            "/new" => {
                orchestrator.end_thread(&thread_id);
                thread_id = uuid::Uuid::new_v4().to_string();
                println!("New thread: {}", utils::short_id(&thread_id));
                continue;
            }
            "/thread" => {
                println!("{}", thread_id);
                continue;
            }
            _ => {}
        }

        let mut request = TurnRequest::from_text(input).with_thread_id(thread_id.clone());
        request.temperature = args.temperature;

        match run_turn(orchestrator, guard, request, progress).await {
            Ok(id) => thread_id = id,
            Err(e) => eprintln!("Error: {}", e.public_message()),
        }
        println!();
    }

    Ok(())
}
