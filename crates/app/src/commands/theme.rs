use crate::context::AppContext;
use anyhow::Result;
use services::ThemeMode;

pub fn show(ctx: &AppContext) {
    let mode = ctx.preferences.theme();
    println!("{} ({})", mode.label(), mode);
}

pub fn cycle(ctx: &AppContext) -> Result<()> {
    let mode = ctx.preferences.cycle_theme()?;
    println!("Theme: {}", mode.label());
    Ok(())
}

pub fn set(ctx: &AppContext, raw: &str) -> Result<()> {
    let mode: ThemeMode = raw.parse()?;
    ctx.preferences.set_theme(mode)?;
    println!("Theme: {}", mode.label());
    Ok(())
}
