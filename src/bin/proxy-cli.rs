use clap::{Parser, Subcommand};
use reqwest::header::{LOCATION, SET_COOKIE};
use reqwest::redirect::Policy;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Operator CLI for the Planka auth proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3001")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check proxy liveness
    Health,
    /// Run the login bridge for a user and show the cookies it issues
    Login {
        /// Email or username known to the backend
        #[arg(short, long)]
        email: String,

        /// Login trigger path
        #[arg(long, default_value = "/planka-login")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().redirect(Policy::none()).build()?;
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Login { email, path } => {
            let res = client
                .get(format!("{}{}", base, path))
                .query(&[("email", email.as_str())])
                .send()
                .await?;

            let location = match res.headers().get(LOCATION).and_then(|v| v.to_str().ok()) {
                Some(location) if res.status().is_redirection() => location.to_string(),
                _ => {
                    eprintln!("Error: login trigger returned status {}", res.status());
                    if let Ok(text) = res.text().await {
                        eprintln!("Response: {}", text);
                    }
                    return Ok(());
                }
            };

            // Never print the token carried in the redirect.
            let completion = location.split('?').next().unwrap_or(&location);
            println!("Redirected to {}", completion);

            let res = client.get(format!("{}{}", base, location)).send().await?;
            println!("Completion returned {}", res.status());
            for cookie in res.headers().get_all(SET_COOKIE) {
                let cookie = cookie.to_str().unwrap_or("<binary>");
                let name = cookie.split('=').next().unwrap_or(cookie);
                println!("Set-Cookie: {}=<redacted>", name);
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: proxy returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
