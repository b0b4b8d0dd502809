use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select};
use nanoagents_core::config::{Config, get_config_path};

const BANNER: &str = r"
    -------------------------------------
      nanoagents: think, act, observe
    -------------------------------------
";

const MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o", "gpt-5-mini", "gpt-5"];

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

fn setup_api_key() -> Result<String> {
    let api_key: String = Input::new()
        .with_prompt("Enter your API key")
        .interact_text()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        return Err(anyhow::anyhow!("API key cannot be empty"));
    }

    Ok(api_key.trim().to_string())
}

fn setup_base_url(default: &str) -> Result<String> {
    Input::new()
        .with_prompt("API base URL (any OpenAI-compatible endpoint)")
        .default(default.to_string())
        .interact_text()
        .context("Failed to read base URL")
}

fn setup_model() -> Result<String> {
    let selection = Select::new()
        .with_prompt("Select your model")
        .items(MODELS)
        .default(0)
        .interact()
        .context("Failed to select model")?;

    Ok(MODELS[selection].to_string())
}

pub fn run_init() -> Result<Config> {
    println!("{}", style(BANNER).cyan().bold());
    println!(
        "  {}",
        style("This wizard writes the configuration used by `nanoagents run`.").dim()
    );

    let defaults = Config::default();

    print_step(1, 3, "API Key Setup");
    let api_key = setup_api_key()?;

    print_step(2, 3, "Endpoint");
    let base_url = setup_base_url(&defaults.base_url)?;

    print_step(3, 3, "Model Selection");
    let model = setup_model()?;

    let config = Config {
        api_key,
        base_url,
        model,
        ..defaults
    };

    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(get_config_path().display()).cyan()
    );
    println!(
        "  {} You can now run: {}",
        style("→").green(),
        style("nanoagents run --task \"What time is it?\"").cyan().bold()
    );
    println!();

    Ok(config)
}
