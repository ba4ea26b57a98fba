use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "trust-cli")]
#[command(about = "Management CLI for the trust gateway", long_about = None)]
struct Cli {
    #[arg(short, long, env = "TRUST_URL", default_value = "http://localhost:3001")]
    url: String,

    /// Session token from `trust-cli login`
    #[arg(short, long, env = "TRUST_TOKEN", default_value = "")]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print a session token
    Login {
        #[arg(long, env = "ADMIN_PASSWORD")]
        password: String,
    },
    /// Security status overview
    Status,
    /// Most recent request log entries
    Logs {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Block an IP
    Block {
        ip: String,
        /// Block duration in milliseconds
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Lift a block
    Unblock { ip: String },
    /// Attack pattern counts over recent traffic
    Threats,
    /// Analytics snapshot with request stats
    Analytics,
    /// Write the full analytics document to a file
    Export { output: PathBuf },
    /// Replace analytics with a previously exported document
    Import { input: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if !cli.token.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cli.token))?,
        );
    }
    let url = |path: &str| format!("{}{}", cli.url.trim_end_matches('/'), path);

    let res = match cli.command {
        Commands::Login { password } => {
            client
                .post(url("/api/auth/login"))
                .json(&json!({ "password": password }))
                .send()
                .await?
        }
        Commands::Status => {
            client
                .get(url("/api/security/status"))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Logs { limit } => {
            client
                .get(url("/api/security/logs"))
                .query(&[("limit", limit)])
                .headers(headers)
                .send()
                .await?
        }
        Commands::Block { ip, duration } => {
            let mut body = json!({ "ip": ip });
            if let Some(duration) = duration {
                body["duration"] = json!(duration);
            }
            client
                .post(url("/api/security/block"))
                .headers(headers)
                .json(&body)
                .send()
                .await?
        }
        Commands::Unblock { ip } => {
            client
                .post(url("/api/security/unblock"))
                .headers(headers)
                .json(&json!({ "ip": ip }))
                .send()
                .await?
        }
        Commands::Threats => {
            client
                .get(url("/api/security/threats"))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Analytics => {
            client
                .get(url("/api/analytics"))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Export { output } => {
            let res = client
                .get(url("/api/analytics/export"))
                .headers(headers)
                .send()
                .await?;
            // Raw bytes keep the document's key order.
            if let Some(bytes) = read_bytes(res).await? {
                std::fs::write(&output, bytes)?;
                println!("Analytics written to {}", output.display());
            }
            return Ok(());
        }
        Commands::Import { input } => {
            client
                .post(url("/api/analytics/import"))
                .headers(headers)
                .header(CONTENT_TYPE, "application/json")
                .body(std::fs::read(&input)?)
                .send()
                .await?
        }
    };

    if let Some(json) = read_json(res).await? {
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    Ok(())
}

async fn read_json(res: reqwest::Response) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    match read_bytes(res).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

async fn read_bytes(
    res: reqwest::Response,
) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(None);
    }
    Ok(Some(res.bytes().await?.to_vec()))
}
