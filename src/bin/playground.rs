use clap::Parser;

use gemini_playground::api::Server;
use gemini_playground::error::PlaygroundError;

/// Command line arguments for the playground server
#[derive(Parser)]
#[clap(
    name = "playground",
    about = "Serves the Gemini chat playground browser UI"
)]
struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "127.0.0.1:7860")]
    addr: String,
}

#[tokio::main]
async fn main() -> Result<(), PlaygroundError> {
    gemini_playground::init_logging();

    let args = Args::parse();

    // read once at startup; the UI key field covers per-session overrides
    let env_api_key = std::env::var("GOOGLE_API_KEY").ok();
    if env_api_key.is_none() {
        log::warn!("GOOGLE_API_KEY not set; the UI will ask for a key per session");
    }

    Server::new(env_api_key).run(&args.addr).await
}
