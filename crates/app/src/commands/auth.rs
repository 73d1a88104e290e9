use crate::context::AppContext;
use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

pub async fn login(ctx: &AppContext, name: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => {
            eprint!("Password: ");
            io::stderr().flush()?;
            let mut line = String::new();
            io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read password")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    let token = ctx
        .session()
        .sign_in(name, &password)
        .await
        .context("Sign-in failed")?;
    println!("Signed in as {}", token.name);
    Ok(())
}

pub async fn logout(ctx: &AppContext) -> Result<()> {
    if !ctx.tokens.is_signed_in() {
        println!("Not signed in");
        return Ok(());
    }
    if let Err(e) = ctx.session().sign_out().await {
        tracing::warn!(error = %e, "server sign-out failed; local session cleared anyway");
    }
    println!("Signed out");
    Ok(())
}
