use super::preview;
use crate::context::AppContext;
use anyhow::Result;
use chrono::{Local, TimeZone};
use shared::task::{TaskMode, TaskStatus};

pub fn list(ctx: &AppContext) {
    let history = ctx.ai_store.get_chat_history();
    if history.is_empty() {
        println!("No chat history");
        return;
    }
    for task in &history {
        let when = Local
            .timestamp_millis_opt(task.timestamp)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let mode = match task.mode {
            Some(TaskMode::Agent) => "agent",
            _ => "chat",
        };
        let status = match task.status {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "done",
            TaskStatus::Error => "error",
        };
        let id: String = task.id.chars().take(8).collect();
        println!(
            "{} {} [{}/{}] {}",
            id,
            when,
            mode,
            status,
            preview(&task.user_task, 60)
        );
    }
}

pub fn clear(ctx: &AppContext) -> Result<()> {
    ctx.ai_store.remove_chat_history()?;
    println!("Chat history cleared");
    Ok(())
}
