use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Control API client for the API gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Control API secret (sent as x-tyk-authorization)
    #[arg(short, long, env = "GATEWAY_SECRET")]
    secret: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a configuration reload
    Reload {
        /// Wait until the reload has finished
        #[arg(long)]
        block: bool,
    },
    /// Queue a reload for the whole node group
    ReloadGroup,
    /// List loaded API definitions
    Apis,
    /// Show health counters for an API
    Health {
        #[arg(long)]
        api_id: String,
    },
    /// Show a key's session
    Key { key: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = format!("{}/tyk", cli.url.trim_end_matches('/'));

    let mut headers = HeaderMap::new();
    headers.insert("x-tyk-authorization", HeaderValue::from_str(&cli.secret)?);

    let request = match cli.command {
        Commands::Reload { block } => client
            .get(format!("{}/reload/", base))
            .query(&[("block", block)]),
        Commands::ReloadGroup => client.get(format!("{}/reload/group", base)),
        Commands::Apis => client.get(format!("{}/apis", base)),
        Commands::Health { api_id } => client
            .get(format!("{}/health/", base))
            .query(&[("api_id", api_id)]),
        Commands::Key { key } => client.get(format!("{}/keys/{}", base, key)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await?;
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: control API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
