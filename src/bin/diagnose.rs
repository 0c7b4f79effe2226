/// Troubleshooting CLI for image payloads and provider endpoints
///
/// Usage:
///   cargo run --bin diagnose -- validate <file-with-data-url>
///   cargo run --bin diagnose -- probe <url> [METHOD]
///   cargo run --bin diagnose -- self-test

use anyhow::{bail, Context, Result};

use tryon_workflow::core::config::Config;
use tryon_workflow::services::compositing::CompositingEngine;
use tryon_workflow::services::diagnostics;
use tryon_workflow::services::providers::remote::build_http_client;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} validate <file> | probe <url> [METHOD] | self-test", program);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
    }

    let report = match args[1].as_str() {
        "validate" => {
            let path = args.get(2).unwrap_or_else(|| usage(&args[0]));
            let data_url = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path))?;
            serde_json::to_string_pretty(&diagnostics::validate_image_data(&data_url))?
        }
        "probe" => {
            let url = args.get(2).unwrap_or_else(|| usage(&args[0]));
            let method = args.get(3).map(|m| m.to_uppercase()).unwrap_or_else(|| "GET".to_string());
            let method = reqwest::Method::from_bytes(method.as_bytes())
                .with_context(|| format!("Invalid method {}", method))?;

            let config = Config::new()?;
            let http = build_http_client(&config).context("Failed to create HTTP client")?;
            serde_json::to_string_pretty(&diagnostics::probe_endpoint(&http, url, method).await)?
        }
        "self-test" => {
            let engine = CompositingEngine::with_default_backend(None);
            let report = diagnostics::compositing_self_test(&engine).await;
            if !report.success {
                bail!("Self-test failed: {}", report.message);
            }
            serde_json::to_string_pretty(&report)?
        }
        _ => usage(&args[0]),
    };

    println!("{}", report);
    Ok(())
}
