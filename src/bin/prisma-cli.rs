use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "prisma-cli")]
#[command(about = "Operator CLI for the PRISMA telemetry service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every health check and show the rolled-up status
    Health,
    /// Run a single named health check
    Check { name: String },
    /// Show readiness of the critical checks
    Ready,
    /// Show liveness and uptime
    Live,
    /// Show the APM performance summary
    Summary,
    /// Show a portfolio and its assembled page
    Portfolio { slug: String },
}

impl Commands {
    fn path(&self) -> String {
        match self {
            Commands::Health => "/health".to_string(),
            Commands::Check { name } => format!("/health/{}", name),
            Commands::Ready => "/ready".to_string(),
            Commands::Live => "/live".to_string(),
            Commands::Summary => "/apm/summary".to_string(),
            Commands::Portfolio { slug } => format!("/api/portfolios/{}", slug),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let url = format!("{}{}", cli.url.trim_end_matches('/'), cli.command.path());
    let res = client.get(url).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body = res.text().await?;

    // 503 health responses still carry a JSON report.
    match serde_json::from_str::<Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", body),
    }
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        std::process::exit(1);
    }
    Ok(())
}
