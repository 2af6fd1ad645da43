//! Credential prompts and checks.

use anyhow::{Context, Result};
use dialoguer::{Input, Password};
use timebook_auth::{open_store, CredentialStore, Credentials, Session};
use timebook_core::Config;
use timebook_tracker::{ClientOptions, IssueTracker, JiraClient, TrackerUser};

fn store_for(config: &Config) -> Box<dyn CredentialStore> {
    open_store(config.credentials.backend, &config.config_dir)
}

/// Build a client for the configured tracker.
pub fn client_for(config: &Config, credentials: Credentials) -> Result<JiraClient> {
    let session = Session::new(&config.tracker.base_url, credentials)
        .context("Invalid tracker URL or incomplete credentials")?;
    Ok(JiraClient::new(session, ClientOptions::from_config(config))?)
}

/// Ask the server who these credentials belong to. Fails on bad credentials.
///
/// Uses a throwaway client and runtime; connections pooled here die with it.
pub fn verify(config: &Config, credentials: Credentials) -> Result<TrackerUser> {
    let client = client_for(config, credentials)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    let user = runtime
        .block_on(client.myself())
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    Ok(user)
}

/// Prompt for credentials, check them against the server and save them.
pub fn login(config: &mut Config, url: Option<String>, username: Option<String>) -> Result<()> {
    if let Some(url) = url {
        config.tracker.base_url = url;
        let validation = config.validate();
        if !validation.is_valid() {
            anyhow::bail!("{}", validation.error_summary());
        }
        config.save()?;
        println!("Tracker URL set to {}", config.tracker.base_url);
    }

    if !config.tracker.is_configured() {
        anyhow::bail!("Set the tracker URL first: timebook login --url https://jira.example.org");
    }

    let store = store_for(config);
    let saved = store.load().unwrap_or_else(|e| {
        tracing::warn!("Could not read saved credentials: {:#}", e);
        None
    });

    let username = match username {
        Some(name) => name,
        None => {
            let mut prompt = Input::<String>::new().with_prompt("Username");
            if let Some(saved) = &saved {
                prompt = prompt.default(saved.username.clone());
            }
            prompt.interact_text()?
        }
    };
    let secret = Password::new()
        .with_prompt("Password or API token")
        .interact()?;

    let credentials = Credentials::new(username, secret);
    let user = verify(config, credentials.clone())?;

    store.save(&credentials)?;
    println!(
        "Logged in as {} (credentials kept in the {} store)",
        user.display_name.as_deref().unwrap_or(&credentials.username),
        store.name()
    );
    Ok(())
}

pub fn logout(config: &Config) -> Result<()> {
    let store = store_for(config);
    store.clear()?;
    println!("Saved credentials removed from the {} store", store.name());
    Ok(())
}

/// Credentials saved by a previous login.
pub fn saved_credentials(config: &Config) -> Result<Credentials> {
    store_for(config)
        .load()?
        .context("Not logged in. Run 'timebook login' first.")
}
