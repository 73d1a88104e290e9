use super::mask_secret;
use crate::context::AppContext;
use anyhow::{bail, Context, Result};
use clap::Subcommand;
use shared::settings::{AiConfig, SystemPrompt};
use std::fs;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the stored configuration (API key masked)
    Show,
    /// Update individual fields
    Set(SetArgs),
    /// Add or replace a system prompt
    PromptAdd {
        #[arg(long)]
        name: String,
        #[arg(long)]
        content: String,
        /// Defaults to a slug of the name
        #[arg(long)]
        id: Option<String>,
        /// Also make it the current prompt
        #[arg(long)]
        activate: bool,
    },
    /// Make a stored prompt the current one
    PromptUse { id: String },
    /// Write the configuration as an export file
    Export {
        /// Print to stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace the configuration from an export file
    Import { file: PathBuf },
    /// Upload the configuration to the server
    Push,
    /// Download the configuration from the server
    Pull,
}

#[derive(clap::Args, Default)]
pub struct SetArgs {
    #[arg(long)]
    pub base_url: Option<String>,
    #[arg(long)]
    pub api_key: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub system_prompt: Option<bool>,
    #[arg(long)]
    pub agent: Option<bool>,
    #[arg(long)]
    pub doc_context: Option<bool>,
    #[arg(long)]
    pub panel: Option<bool>,
    #[arg(long)]
    pub sync: Option<bool>,
}

impl SetArgs {
    /// Apply the given fields. Returns whether the provider endpoint changed.
    pub fn apply_to(self, config: &mut AiConfig) -> bool {
        let mut endpoint_changed = false;
        if let Some(base_url) = self.base_url {
            endpoint_changed |= config.base_url != base_url;
            config.base_url = base_url;
        }
        if let Some(api_key) = self.api_key {
            endpoint_changed |= config.api_key != api_key;
            config.api_key = api_key;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(v) = self.system_prompt {
            config.system_prompt_enabled = v;
        }
        if let Some(v) = self.agent {
            config.agent_enabled = v;
        }
        if let Some(v) = self.doc_context {
            config.doc_context_enabled = v;
        }
        if let Some(v) = self.panel {
            config.panel_enabled = v;
        }
        if let Some(v) = self.sync {
            config.sync_enabled = v;
        }
        endpoint_changed
    }
}

fn slug(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    slug.trim_matches('-').to_string()
}

pub async fn run(ctx: &AppContext, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show(ctx),
        ConfigAction::Set(args) => {
            let mut config = ctx.ai_store.get_config();
            if args.apply_to(&mut config) {
                ctx.ai_store.remove_models()?;
            }
            save(ctx, &config).await
        }
        ConfigAction::PromptAdd {
            name,
            content,
            id,
            activate,
        } => {
            let id = id.unwrap_or_else(|| slug(&name));
            if id.is_empty() {
                bail!("Prompt id must not be empty");
            }
            let mut config = ctx.ai_store.get_config();
            config.upsert_prompt(SystemPrompt {
                id: id.clone(),
                name,
                content,
                is_active: false,
            });
            if activate {
                config.select_prompt(&id);
            }
            save(ctx, &config.normalized()).await?;
            println!("Saved prompt {}", id);
            Ok(())
        }
        ConfigAction::PromptUse { id } => {
            let mut config = ctx.ai_store.get_config();
            if !config.select_prompt(&id) {
                bail!("No system prompt with id {}", id);
            }
            save(ctx, &config).await
        }
        ConfigAction::Export { output } => {
            let raw = serde_json::to_string_pretty(&ctx.ai_store.export_config())?;
            match output {
                Some(path) => {
                    fs::write(&path, raw)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Exported to {}", path.display());
                }
                None => println!("{}", raw),
            }
            Ok(())
        }
        ConfigAction::Import { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let config = ctx
                .ai_store
                .import_config_json(&raw)
                .context("Import failed")?;
            ctx.ai_store.remove_models()?;
            println!("Imported configuration for model {}", config.model);
            Ok(())
        }
        ConfigAction::Push => {
            ensure_signed_in(ctx)?;
            ctx.remote_config()
                .save(&ctx.ai_store.get_config())
                .await
                .context("Upload failed")?;
            println!("Configuration uploaded");
            Ok(())
        }
        ConfigAction::Pull => {
            ensure_signed_in(ctx)?;
            match ctx
                .remote_config()
                .fetch_full()
                .await
                .context("Download failed")?
            {
                Some(config) => {
                    ctx.ai_store.set_config(&config.normalized())?;
                    ctx.ai_store.remove_models()?;
                    println!("Configuration downloaded");
                }
                None => println!("No configuration stored on the server"),
            }
            Ok(())
        }
    }
}

fn ensure_signed_in(ctx: &AppContext) -> Result<()> {
    if !ctx.tokens.is_signed_in() {
        bail!("Not signed in; run `mdassist login` first");
    }
    Ok(())
}

/// Store locally, and mirror to the server when sync is on.
async fn save(ctx: &AppContext, config: &AiConfig) -> Result<()> {
    config.validate()?;
    ctx.ai_store.set_config(config)?;
    if config.sync_enabled && ctx.tokens.is_signed_in() {
        if let Err(e) = ctx.remote_config().save(config).await {
            tracing::warn!(error = %e, "config saved locally but not synced");
        }
    }
    Ok(())
}

fn show(ctx: &AppContext) -> Result<()> {
    let mut config = ctx.ai_store.get_config();
    config.api_key = mask_secret(&config.api_key);
    println!("{}", serde_json::to_string_pretty(&config)?);
    if let Some(name) = ctx.tokens.name() {
        println!("user: {}", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(slug("  Code Review! "), "code-review");
        assert_eq!(slug("!!!"), "");
    }

    #[test]
    fn test_set_args_reports_endpoint_change() {
        let mut config = AiConfig {
            base_url: "https://a.example.com".into(),
            ..AiConfig::default()
        };
        let args = SetArgs {
            model: Some("gpt-4o".into()),
            agent: Some(true),
            ..SetArgs::default()
        };
        assert!(!args.apply_to(&mut config));
        assert!(config.agent_enabled);

        let args = SetArgs {
            base_url: Some("https://b.example.com".into()),
            ..SetArgs::default()
        };
        assert!(args.apply_to(&mut config));
        assert_eq!(config.model, "gpt-4o");
    }
}
