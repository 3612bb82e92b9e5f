use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use drekee_kernel::{ClientBuilder, DrekeeClient, SendRequest};
use drekee_protocol::{ChatError, ChatFile, ChatId, ModelMode, PipelineEvent};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
comandos:
  /mode <rapido|raciocinio|pro>  troca o modo do modelo
  /new                           nova conversa
  /chats                         lista as conversas
  /select <id>                   seleciona uma conversa
  /attach <arquivo>              anexa um arquivo à próxima mensagem
  /history                       estatísticas do histórico
  /stats                         estatísticas da memória
  /clear                         apaga a memória
  /status                        chaves de API configuradas
  /quit                          sai";

#[derive(Debug, Parser)]
#[command(name = "drekeed")]
#[command(about = "Drekee terminal chat client")]
struct Cli {
    #[arg(long, env = "DREKEE_ROOT", default_value = ".drekee")]
    root: PathBuf,
    #[arg(long, default_value = "raciocinio")]
    mode: ModelMode,
    /// Skip the thinking-check and follow-up helper calls.
    #[arg(long)]
    no_helpers: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .compact()
        .init();

    let cli = Cli::parse();

    let mut runtime_config = drekee_kernel::RuntimeConfig::default();
    if cli.no_helpers {
        runtime_config = runtime_config.without_helpers();
    }
    let client = ClientBuilder::new(&cli.root)
        .runtime_config(runtime_config)
        .mode(cli.mode)
        .build()
        .await?;

    let status = client.provider_status();
    if !status.groq {
        warn!("GROQ_API_KEY is not set; requests will fail until it is configured");
    }
    info!(root = %cli.root.display(), mode = %client.mode(), "drekeed ready");

    let mut events = client.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            render_event(&event);
        }
    });

    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"Drekee AI. /help para comandos.\n").await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending: Vec<ChatFile> = Vec::new();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            match run_command(&client, command, &mut pending).await {
                Ok(Some(output)) => println!("{output}"),
                Ok(None) => break,
                Err(error) => println!("erro: {error:#}"),
            }
            continue;
        }

        let request = SendRequest::text(line).with_attachments(std::mem::take(&mut pending));
        send_with_interrupt(&client, request).await?;
    }

    event_task.abort();
    if let Err(error) = event_task.await {
        debug!(%error, "event task stopped");
    }
    Ok(())
}

/// Runs one send; Ctrl-C while it is pending cancels it.
async fn send_with_interrupt(client: &DrekeeClient, request: SendRequest) -> Result<()> {
    let mut task = tokio::spawn({
        let client = client.clone();
        async move { client.send(request).await }
    });

    let result = tokio::select! {
        joined = &mut task => joined,
        _ = tokio::signal::ctrl_c() => {
            client.stop();
            task.await
        }
    }
    .context("send task panicked")?;

    match result {
        Ok(outcome) => {
            if let Some(reasoning) = &outcome.reasoning {
                println!("\n[raciocínio]\n{reasoning}\n");
            }
            println!("{}", outcome.response);
            for file in &outcome.attachments {
                println!("  📎 {} ({} caracteres)", file.name, file.content.chars().count());
            }
            if !outcome.follow_ups.is_empty() {
                println!("\nsugestões:");
                for suggestion in &outcome.follow_ups {
                    println!("  • {suggestion}");
                }
            }
        }
        Err(ChatError::Aborted) => println!("⏹️ {}", ChatError::Aborted.user_message()),
        Err(error) => println!("❌ {}", error.user_message()),
    }
    Ok(())
}

/// `Ok(None)` asks the loop to exit.
async fn run_command(
    client: &DrekeeClient,
    command: &str,
    pending: &mut Vec<ChatFile>,
) -> Result<Option<String>> {
    let (name, argument) = match command.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (command, ""),
    };

    let output = match name {
        "quit" | "exit" => return Ok(None),
        "help" => HELP.to_owned(),
        "mode" if argument.is_empty() => format!("modo atual: {}", client.mode()),
        "mode" => {
            let mode: ModelMode = argument.parse().map_err(anyhow::Error::msg)?;
            client.set_mode(mode);
            format!("modo: {mode}")
        }
        "new" => {
            let chat = client.new_chat(None).await?;
            client.clear_history();
            format!("nova conversa {}", chat.id)
        }
        "chats" => {
            let current = client.current_chat().await?.map(|chat| chat.id);
            let chats = client.list_chats().await?;
            if chats.is_empty() {
                "nenhuma conversa".to_owned()
            } else {
                chats
                    .iter()
                    .map(|chat| {
                        let marker = if Some(&chat.id) == current.as_ref() { "*" } else { " " };
                        format!(
                            "{marker} {}  {} ({} mensagens)",
                            chat.id,
                            chat.title,
                            chat.messages.len()
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        "select" => {
            let chat = client.select_chat(&ChatId::from_string(argument)).await?;
            client.clear_history();
            format!("conversa selecionada: {}", chat.title)
        }
        "attach" => {
            let file = read_attachment(Path::new(argument)).await?;
            let name = file.name.clone();
            pending.push(file);
            format!("anexado: {name} ({} pendentes)", pending.len())
        }
        "history" => {
            let stats = client.history_stats();
            format!(
                "histórico: {}/{} (usuário {}, assistente {})",
                stats.total, stats.max, stats.user, stats.assistant
            )
        }
        "stats" => serde_json::to_string_pretty(&client.memory_stats())?,
        "clear" => {
            client.clear_memory().await?;
            "memória apagada".to_owned()
        }
        "status" => serde_json::to_string_pretty(&client.provider_status())?,
        other => format!("comando desconhecido: /{other}"),
    };
    Ok(Some(output))
}

async fn read_attachment(path: &Path) -> Result<ChatFile> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(ChatFile::new(name, content))
}

fn render_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::ThinkingStep { index, text, .. } => println!("  {}. {text}", index + 1),
        PipelineEvent::StageStarted { stage, .. } => debug!(?stage, "stage started"),
        PipelineEvent::FilesGenerated { names, .. } => {
            debug!(files = ?names, "files generated");
        }
        PipelineEvent::Failed {
            message,
            configuration,
            ..
        } => debug!(%message, configuration, "send failed"),
        other => debug!(event = ?other, "pipeline event"),
    }
}
