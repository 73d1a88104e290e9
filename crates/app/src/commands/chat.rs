use crate::context::AppContext;
use anyhow::{bail, Context, Result};
use providers::ChatOptions;
use shared::agent::AgentResponse;
use shared::agent_api::{ChatMessage, StreamChunk};
use shared::settings::AiConfig;
use shared::task::{TaskBlock, TaskMode, TaskStatus};
use shared::ClientError;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Completed exchanges replayed as conversation context.
const HISTORY_TURNS: usize = 10;

#[derive(clap::Args)]
pub struct ChatArgs {
    pub prompt: String,
    /// Ask for a structured edit plan instead of a free-form answer
    #[arg(long)]
    pub agent: bool,
    /// Markdown document to use as context
    #[arg(long)]
    pub doc: Option<PathBuf>,
    /// Document title (defaults to the file name)
    #[arg(long)]
    pub title: Option<String>,
    /// Wait for the whole answer instead of streaming it
    #[arg(long)]
    pub no_stream: bool,
    /// Write agent edits back into --doc
    #[arg(long)]
    pub apply: bool,
}

/// Earlier chat exchanges as alternating user/assistant messages.
fn history_messages(history: &[TaskBlock]) -> Vec<ChatMessage> {
    let completed: Vec<&TaskBlock> = history
        .iter()
        .filter(|t| t.status == TaskStatus::Completed && t.mode != Some(TaskMode::Agent))
        .collect();
    let skip = completed.len().saturating_sub(HISTORY_TURNS);
    completed
        .into_iter()
        .skip(skip)
        .flat_map(|t| {
            [
                ChatMessage::user(t.user_task.clone()),
                ChatMessage::assistant(t.output.clone()),
            ]
        })
        .collect()
}

pub async fn run(ctx: &AppContext, args: ChatArgs) -> Result<()> {
    let config = ctx.ai_store.get_config();
    if !config.is_provider_configured() {
        bail!("No AI provider configured; run `mdassist config set --base-url ... --model ...`");
    }
    config.validate().context("Stored AI config is inconsistent")?;

    let agent_mode = args.agent || config.agent_enabled;
    if args.apply && (!agent_mode || args.doc.is_none()) {
        bail!("--apply needs agent mode and --doc");
    }

    let document = match &args.doc {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None => None,
    };

    let mut options = if agent_mode {
        ChatOptions::agent()
    } else {
        ChatOptions::default()
    };
    if let Some(content) = &document {
        if !config.doc_context_enabled {
            tracing::warn!("document context is disabled; enable it with `config set --doc-context true`");
        }
        let title = args.title.clone().or_else(|| {
            args.doc
                .as_ref()
                .and_then(|p| p.file_stem())
                .map(|s| s.to_string_lossy().into_owned())
        });
        options = options.with_document(title.as_deref(), content);
    }

    let mut messages = if agent_mode {
        Vec::new()
    } else {
        history_messages(&ctx.ai_store.get_chat_history())
    };
    messages.push(ChatMessage::user(args.prompt.clone()));

    let mode = if agent_mode {
        TaskMode::Agent
    } else {
        TaskMode::Chat
    };
    let mut task = TaskBlock::new(args.prompt.clone(), mode);
    task.start();
    ctx.ai_store.record_task(&task)?;

    if args.no_stream {
        complete_once(ctx, &config, &messages, &options, &mut task).await;
    } else {
        complete_streaming(ctx, config.clone(), messages, options, &mut task).await?;
    }
    ctx.ai_store.record_task(&task)?;

    if task.status == TaskStatus::Error {
        bail!("{}", task.output);
    }

    if agent_mode {
        match task.agent_response.clone() {
            Some(response) => {
                report_plan(&response);
                if args.apply {
                    if let (Some(path), Some(doc)) = (&args.doc, &document) {
                        apply_plan(response, doc, path)?;
                    }
                }
            }
            None => tracing::info!("reply did not contain an edit plan"),
        }
    }
    Ok(())
}

async fn complete_once(
    ctx: &AppContext,
    config: &AiConfig,
    messages: &[ChatMessage],
    options: &ChatOptions,
    task: &mut TaskBlock,
) {
    let cancel = CancellationToken::new();
    let result = tokio::select! {
        result = ctx.llm.chat(config, messages, options, &cancel) => result,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            Err(ClientError::Cancelled)
        }
    };
    match result {
        Ok(response) => {
            let content = response.first_content().unwrap_or_default();
            if task.mode != Some(TaskMode::Agent) {
                println!("{}", content);
            }
            task.absorb(&StreamChunk::Content(content.to_string()));
            task.complete();
        }
        Err(e) => task.fail(&e.to_string()),
    }
}

async fn complete_streaming(
    ctx: &AppContext,
    config: AiConfig,
    messages: Vec<ChatMessage>,
    options: ChatOptions,
    task: &mut TaskBlock,
) -> Result<()> {
    let echo = task.mode != Some(TaskMode::Agent);
    let mut stream = ctx.llm.spawn_chat_stream(config, messages, options);
    let mut stdout = io::stdout();

    loop {
        let chunk = tokio::select! {
            chunk = stream.next() => chunk,
            _ = tokio::signal::ctrl_c() => {
                stream.cancel();
                None
            }
        };
        let Some(chunk) = chunk else { break };
        match &chunk {
            StreamChunk::Content(text) if echo => {
                write!(stdout, "{}", text)?;
                stdout.flush()?;
            }
            StreamChunk::Reasoning(text) => eprint!("{}", text),
            _ => {}
        }
        task.absorb(&chunk);
        if chunk.is_terminal() {
            break;
        }
    }
    if echo {
        writeln!(stdout)?;
    }

    if !task.is_finished() {
        task.fail(&ClientError::Cancelled.to_string());
    }
    Ok(())
}

fn report_plan(response: &AgentResponse) {
    for (i, step) in response.plan.iter().enumerate() {
        println!("{}. {}", i + 1, step);
    }
    for change in &response.changes {
        println!("- {:?} at {}", change.change_type, change.position);
    }
    if !response.explanation.is_empty() {
        println!("{}", response.explanation);
    }
}

fn apply_plan(mut response: AgentResponse, doc: &str, path: &Path) -> Result<()> {
    let (edited, failures) = response.apply_all(doc);
    for (index, err) in &failures {
        eprintln!("change {} skipped: {}", index + 1, err);
    }
    if response.applied_count() == 0 {
        bail!("None of the proposed changes could be applied");
    }
    fs::write(path, edited).with_context(|| format!("Failed to write {}", path.display()))?;
    println!(
        "Applied {} of {} changes to {}",
        response.applied_count(),
        response.changes.len(),
        path.display()
    );
    Ok(())
}
