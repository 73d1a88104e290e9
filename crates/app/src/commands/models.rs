use crate::context::AppContext;
use anyhow::{bail, Context, Result};
use shared::agent_api::ModelInfo;

pub async fn list(ctx: &AppContext, refresh: bool) -> Result<()> {
    let config = ctx.ai_store.get_config();
    let cached = if refresh { None } else { ctx.ai_store.get_models() };

    let models = match cached {
        Some(models) => models,
        None => {
            if config.base_url.trim().is_empty() {
                bail!("No base URL configured; run `mdassist config set --base-url ...`");
            }
            let response = ctx
                .llm
                .list_models(&config.base_url, &config.api_key)
                .await
                .context("Failed to list models")?;
            ctx.ai_store.set_models(&response.data)?;
            response.data
        }
    };

    print_models(&models, &config.model);
    Ok(())
}

fn print_models(models: &[ModelInfo], current: &str) {
    if models.is_empty() {
        println!("The provider returned no models");
        return;
    }
    for model in models {
        let marker = if model.id == current { "*" } else { " " };
        if model.owned_by.is_empty() {
            println!("{} {}", marker, model.id);
        } else {
            println!("{} {} ({})", marker, model.id, model.owned_by);
        }
    }
}

pub async fn check(ctx: &AppContext) -> Result<()> {
    let config = ctx.ai_store.get_config();
    if config.base_url.trim().is_empty() {
        bail!("No base URL configured");
    }
    let result = ctx.llm.check_config(&config.base_url, &config.api_key).await;
    if result.valid {
        println!("{} ({} ms)", result.message, result.latency);
        Ok(())
    } else {
        bail!("{} ({} ms)", result.message, result.latency)
    }
}
