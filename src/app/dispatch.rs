use crate::cli::commands::{Cli, Commands};
use anyhow::{Context, Result};
use formrestyler::Config;
use formrestyler::form::{FormStructure, FormStructureProvider, GoogleFormScraper};
use formrestyler::gateway::{self, AppState};
use formrestyler::regen::RegenerationRequest;
use std::path::Path;
use tracing::info;

/// Run one regeneration turn from files on disk and write the HTML.
async fn run_generate(
    config: &Config,
    structure_path: &Path,
    prompt: String,
    previous_path: Option<&Path>,
    images: bool,
    out: Option<&Path>,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(structure_path)
        .await
        .with_context(|| format!("failed to read {}", structure_path.display()))?;
    let structure: FormStructure =
        serde_json::from_str(&raw).context("structure file is not a form structure")?;

    let previous_html = match previous_path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => String::new(),
    };

    let state = AppState::from_config(config)?;
    let submit_url = state.submit_url(&structure.form_id);
    let request = RegenerationRequest::new(structure, prompt, submit_url)
        .with_previous_html(previous_html)
        .with_images(images);

    let output = state.regenerator.regenerate(&request).await?;
    info!(
        html_chars = output.html.len(),
        images = output.images.len(),
        image_rounds = output.image_rounds,
        round_limit_hit = output.round_limit_hit,
        "regeneration complete"
    );
    for image in &output.images {
        info!(kind = %image.kind, url = %image.url, "generated image");
    }

    match out {
        Some(path) => tokio::fs::write(path, &output.html)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", output.html),
    }
    Ok(())
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Serve { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            if port == 0 {
                info!("Starting FormRestyler gateway on {host} (random port)");
            } else {
                info!("Starting FormRestyler gateway on {host}:{port}");
            }
            gateway::run_gateway(&host, port, config).await
        }

        Commands::Scrape { url } => {
            let scraper = GoogleFormScraper::new(config.scrape.timeout_secs);
            let structure = scraper.scrape(&url).await?;
            println!("{}", serde_json::to_string_pretty(&structure)?);
            Ok(())
        }

        Commands::Generate {
            structure,
            prompt,
            previous,
            images,
            out,
        } => {
            run_generate(
                &config,
                &structure,
                prompt,
                previous.as_deref(),
                images,
                out.as_deref(),
            )
            .await
        }
    }
}
