use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Args;
use reqwest::StatusCode;
use reqwest::blocking::{Client, multipart};
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;

#[derive(Args)]
pub struct UploadArgs {
    /// File to upload
    pub file: PathBuf,

    /// Server base URL
    #[arg(long, env = "FILEDROP_URL", default_value = "http://localhost:3000")]
    pub url: String,

    /// Don't verify TLS certificates
    #[arg(long)]
    pub insecure: bool,
}

pub fn run(args: UploadArgs) -> anyhow::Result<()> {
    let client = Client::builder()
        .redirect(Policy::none())
        .danger_accept_invalid_certs(args.insecure)
        .build()
        .context("Failed to build HTTP client")?;

    let form = multipart::Form::new()
        .file("file", &args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let res = client
        .post(&args.url)
        .multipart(form)
        .send()
        .with_context(|| format!("Failed to reach {}", args.url))?;

    let status = res.status();
    if status != StatusCode::SEE_OTHER {
        let body = res.text().unwrap_or_default();
        bail!("upload rejected ({status}): {}", body.trim());
    }

    let location = res
        .headers()
        .get(LOCATION)
        .context("Server did not return a Location header")?
        .to_str()
        .context("Location header is not valid text")?;

    println!("{}", link(&args.url, location));
    Ok(())
}

/// Absolute link for a `Location` relative to the server base URL.
fn link(base: &str, location: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        location.trim_start_matches('/')
    )
}
