use std::path::PathBuf;

use clap::Parser;
use colored::*;
use spinners::{Spinner, Spinners};

use gemini_playground::controller::resolve_api_key;
use gemini_playground::google::{self, GenerationConfig, GenerativeProvider, Gemini};
use gemini_playground::imaging;
use gemini_playground::secret_store::SecretStore;

/// Prompt sent when none is given: asks the vision model to transcribe the
/// table in the image into a structured form.
const DEFAULT_PROMPT: &str = "\
Please extract the table from the following image and provide it in a structured format.
The output should be structured as follows:
'''{
 'columns': [col1, col2, ...],
 'rows': {
 0: [r00, r01, r02, ...],
 1: [r10, r11, r12, ...],
 ...
 }
}'''
Replace the example table with the data extracted from the image.";

/// Command line arguments for the single-shot table extractor
#[derive(Parser)]
#[clap(
    name = "image2table",
    about = "Sends one image to the Gemini vision model and prints the extracted table"
)]
struct Args {
    /// Google API key (falls back to GOOGLE_API_KEY, then the secret store)
    #[arg(long)]
    api_key: Option<String>,

    /// Path of the image to extract from
    #[arg(long, default_value = "table.jpg")]
    image: PathBuf,

    /// Question or prompt for the image
    #[arg(long, default_value = DEFAULT_PROMPT)]
    prompt: String,

    /// Store the resolved key in the secret store for future runs
    #[arg(long)]
    save_key: bool,
}

/// Resolution order: explicit flag, then environment, then secret store.
fn resolve_key(args: &Args) -> Result<String, Box<dyn std::error::Error>> {
    let env_key = std::env::var("GOOGLE_API_KEY").ok();
    let stored = SecretStore::new()
        .ok()
        .and_then(|store| store.api_key().cloned());
    let api_key = resolve_api_key(
        args.api_key.as_deref(),
        env_key.as_deref().or(stored.as_deref()),
    )?;

    if args.save_key {
        let mut store = SecretStore::new()?;
        store.set_api_key(&api_key)?;
        eprintln!("{}", "API key saved to the secret store".green());
    }

    Ok(api_key)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    gemini_playground::init_logging();

    let args = Args::parse();
    let api_key = resolve_key(&args)?;

    let image = imaging::load(&args.image)?;
    let resized = imaging::preprocess(&image)?;
    let cached = imaging::cache(&resized)?;

    let content = google::vision_content(Some(&args.prompt), &[cached])?;
    let gemini = Gemini::new(api_key, Some(120));

    let mut spinner = Spinner::new(Spinners::Dots, "Waiting for Gemini...".into());
    let result = gemini
        .generate(google::VISION_MODEL, &[content], &GenerationConfig::default())
        .await;
    spinner.stop_with_newline();

    match result {
        Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            Err(e.into())
        }
    }
}
