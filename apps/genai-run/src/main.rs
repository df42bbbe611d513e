use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use genai_actions::{debug_format_text, generate};
use genai_client::{Client, ClientConfig, Endpoint};
use genai_protocol::Content;
use serde_json::json;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "genai-run")]
#[command(about = "Send a GENERATE action and print the response")]
struct Cli {
    #[arg(long, env = "GENAI_API_KEY", hide_env_values = true)]
    api_key: String,
    #[arg(long, env = "GENAI_ENDPOINT", default_value = "gemini-api")]
    endpoint: Endpoint,
    /// Required with `--endpoint custom`.
    #[arg(long, env = "GENAI_HOST")]
    host: Option<String>,
    #[arg(long, default_value = "gemini-1.5-flash")]
    target: String,
    #[arg(long)]
    connect_timeout_secs: Option<u64>,
    /// Print each response chunk as a JSON line instead of role-tagged text.
    #[arg(long)]
    json: bool,
    prompt: String,
}

impl Cli {
    fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.api_key.clone()).with_endpoint(self.endpoint);
        if let Some(host) = &self.host {
            config = config.with_host(host.clone());
        }
        if let Some(secs) = self.connect_timeout_secs {
            config = config.with_connect_timeout(Duration::from_secs(secs));
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .compact()
        .init();

    let cli = Cli::parse();
    let client = Client::new(&cli.config()).context("invalid client configuration")?;
    info!(address = %client.target().address, target = %cli.target, "running generate");

    let mut responses = client.run(generate(cli.prompt.as_str(), cli.target.as_str()));
    let mut response = Content::new();
    while let Some(chunk) = responses.next().await {
        let chunk = chunk.context("generate failed")?;
        if cli.json {
            let line = json!({
                "mimetype": chunk.mimetype(),
                "role": chunk.role(),
                "text": chunk.as_text(false)?,
                "bytes": chunk.data().len(),
            });
            println!("{line}");
        }
        response.push_chunk(chunk);
    }
    info!(chunks = response.len(), "response complete");

    if !cli.json {
        println!("{}", debug_format_text(&response)?);
    }
    Ok(())
}
