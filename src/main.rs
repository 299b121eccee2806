//! Boardtalk - Entry Point
//!
//! Line-oriented chat against a Trello account. Board commands are routed
//! through `NlCommandRouter`; everything else goes to the language model as
//! ordinary chat when one is configured.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use boardtalk::command::{NlCommandRouter, RouteOutcome};
use boardtalk::core::config::RouterConfig;
use boardtalk::core::error::Result;
use boardtalk::core::types::SessionId;
use boardtalk::llm::{LanguageModel, LlmClient};
use boardtalk::service::TrelloClient;
use clap::Parser;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

/// Chat with your Trello boards in plain Portuguese or English
#[derive(Parser, Debug)]
#[command(name = "boardtalk")]
#[command(about = "Natural-language command routing for Trello boards")]
struct Args {
    /// TOML file overriding the router defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session name (defaults to a fresh random id)
    #[arg(long)]
    session: Option<String>,

    /// Disable the language-model tier even if LLM_API_KEY is set
    #[arg(long)]
    no_llm: bool,

    /// Debug logging for boardtalk
    #[arg(long, short = 'v')]
    verbose: bool,
}

const CHAT_SYSTEM_PROMPT: &str = "Você é um assistente simpático que ajuda a organizar projetos no Trello. \
Responda de forma breve, no idioma do usuário. Você não executa ações no Trello nesta resposta; \
se o usuário quiser uma ação, sugira a frase de comando (por exemplo: 'mostrar quadros').";

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "boardtalk=debug"
    } else {
        "boardtalk=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = load_config(&args)?;
    let trello = TrelloClient::from_env()?;

    let llm: Option<Arc<LlmClient>> = if args.no_llm {
        None
    } else {
        match LlmClient::from_env() {
            Ok(client) => Some(Arc::new(client)),
            Err(_) => {
                tracing::warn!("LLM_API_KEY not set - running with pattern commands only");
                None
            }
        }
    };

    let mut router = NlCommandRouter::new(Arc::new(trello), config.clone());
    if let Some(client) = &llm {
        router = router.with_language_model(client.clone());
    }

    let session = args
        .session
        .map(SessionId::named)
        .unwrap_or_else(SessionId::new);
    tracing::info!(session = %session, llm = llm.is_some(), "Boardtalk starting");

    let rt = Runtime::new()?;

    println!("\n=== BOARDTALK ===");
    println!("Converse com seus quadros do Trello. Exemplos:");
    println!("  mostrar quadros");
    println!("  criar quadro chamado Projeto Gama");
    println!("  listar listas do quadro com id abc123");
    println!("  apagar quadro com id abc123");
    println!("Digite 'sair' para encerrar.");
    println!();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "sair" | "quit" | "exit") {
            break;
        }

        match rt.block_on(router.handle(&session, input)) {
            RouteOutcome::Display(display) => println!("{}", display),
            RouteOutcome::ClassificationFailure(reason) => {
                println!("Não consegui interpretar o pedido agora ({}). Tente de novo.", reason);
            }
            RouteOutcome::PassThrough => match &llm {
                Some(client) => {
                    let reply = rt.block_on(async {
                        tokio::time::timeout(
                            config.llm_timeout,
                            client.complete(CHAT_SYSTEM_PROMPT, input),
                        )
                        .await
                    });
                    match reply {
                        Ok(Ok(text)) => println!("{}", text.trim()),
                        Ok(Err(e)) => {
                            tracing::warn!(error = %e, "Chat reply failed");
                            println!("Desculpe, não consegui responder agora.");
                        }
                        Err(_) => println!("Desculpe, a resposta demorou demais."),
                    }
                }
                None => println!(
                    "Não entendi como um comando do Trello. Tente, por exemplo, 'mostrar quadros'."
                ),
            },
        }
        println!();
    }

    println!("Até logo!");
    Ok(())
}

/// Defaults, then the TOML file, then TRELLO_BOARD_ID
fn load_config(args: &Args) -> Result<RouterConfig> {
    let mut config = match &args.config {
        Some(path) => RouterConfig::load_from_toml(path)?,
        None => RouterConfig::default(),
    };

    if let Ok(board_id) = std::env::var("TRELLO_BOARD_ID") {
        if !board_id.trim().is_empty() {
            config.default_board_id = Some(board_id.trim().to_string());
        }
    }

    Ok(config)
}
