use anyhow::Result;
use clap::{Parser, Subcommand};
use nanoagents_core::config::{self, Config};
use nanoagents_core::memory::{LAST_ANSWER_KEY, Memory};
use nanoagents_core::{Agent, LlmHandle, RunOutcome, setup_logger};
use std::io::Write;
use std::sync::Arc;

mod llm;
mod onboard;

const HISTORY_KEY: &str = "history";

#[derive(Parser)]
#[command(name = "nanoagents")]
#[command(about = "nanoagents - a minimal think, act, observe agent runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the API key, endpoint and model
    Init,
    /// Run a single task to completion
    Run {
        #[arg(short, long)]
        task: String,
        #[arg(long)]
        max_steps: Option<usize>,
        #[arg(long)]
        no_builtin_tools: bool,
        /// Print every step after the answer
        #[arg(long)]
        trace: bool,
    },
    /// Interactive session; answers accumulate in memory
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or_else(|| {
        if !config::config_exists() {
            Commands::Init
        } else {
            Commands::Chat
        }
    });

    match command {
        Commands::Init => {
            let init_config = onboard::run_init().map_err(|e| {
                eprintln!("❌ Setup failed: {}", e);
                anyhow::anyhow!("Setup failed: {}", e)
            })?;
            config::save_config(&init_config)?;
        }
        Commands::Run {
            task,
            max_steps,
            no_builtin_tools,
            trace,
        } => {
            let mut config = Config::load_or_init()?;
            if let Some(max_steps) = max_steps {
                config.max_steps = max_steps;
            }
            if no_builtin_tools {
                config.include_builtin_tools = false;
            }
            setup_logger(&config.log_level);

            let agent = build_agent(&config, Arc::new(Memory::new()))?;
            println!("\n🤔 Processing...\n");
            match agent.run_async_with_trace(&task).await {
                Ok(outcome) => {
                    println!("{}", outcome.answer);
                    if trace {
                        print_trace(&outcome);
                    }
                }
                Err(e) => {
                    eprintln!("❌ Error: {}", e);
                    anyhow::bail!("Agent run failed: {}", e);
                }
            }
        }
        Commands::Chat => {
            let config = Config::load_or_init()?;
            setup_logger(&config.log_level);

            let memory = Arc::new(Memory::new());
            let agent = build_agent(&config, Arc::clone(&memory))?;
            chat(&agent, &memory).await;
        }
    }

    Ok(())
}

fn build_agent(config: &Config, memory: Arc<Memory>) -> Result<Agent> {
    if config.api_key.is_empty() {
        anyhow::bail!("No API key configured. Run 'nanoagents init' or set NANOAGENTS_API_KEY.");
    }

    if config.include_builtin_tools && !config.workspace_dir.exists() {
        std::fs::create_dir_all(&config.workspace_dir).map_err(|e| {
            anyhow::anyhow!(
                "Could not create workspace at {}: {}",
                config.workspace_dir.display(),
                e
            )
        })?;
    }

    let llm = LlmHandle::from_async(llm::OpenAiLlm::from_config(config));
    let agent = Agent::new(llm, config.agent_config())?.with_memory(memory);
    Ok(agent)
}

fn print_trace(outcome: &RunOutcome) {
    println!("\n--- {} step(s), {:?} ---\n", outcome.steps.len(), outcome.status);
    for step in &outcome.steps {
        print!("{}", step.render());
        println!();
    }
}

async fn chat(agent: &Agent, memory: &Memory) {
    use std::io;

    println!("🤖 nanoagents");
    println!("Type a task (:last shows the previous answer, Ctrl+D to exit):\n");

    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let input = match read_input(&mut stdin.lock()) {
            Ok(Some(input)) => input,
            Ok(None) => {
                println!("\n👋 Goodbye!");
                break;
            }
            Err(e) => {
                eprintln!("❌ Failed to read input: {}", e);
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input == ":last" {
            match memory.get(LAST_ANSWER_KEY) {
                Some(answer) => println!("{}\n", nanoagents_core::stringify_value(&answer)),
                None => println!("(no answer yet)\n"),
            }
            continue;
        }

        println!("\n🤔 Processing...\n");
        match agent.run_async(input).await {
            Ok(answer) => {
                println!("{}", answer);
                memory.append(HISTORY_KEY, answer);
            }
            Err(e) => eprintln!("❌ Error: {}", e),
        }
        println!();
    }
}

/// One line of input, or `None` at end of input.
fn read_input(reader: &mut impl std::io::BufRead) -> std::io::Result<Option<String>> {
    let mut input = String::new();
    match reader.read_line(&mut input)? {
        0 => Ok(None),
        _ => Ok(Some(input)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, BufRead, Cursor, Read};

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("stdin closed"))
        }
    }

    impl BufRead for FailingReader {
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            Err(io::Error::other("stdin closed"))
        }

        fn consume(&mut self, _amt: usize) {}
    }

    #[test]
    fn read_input_returns_lines_then_end() {
        let mut reader = Cursor::new("first task\n");
        assert_eq!(read_input(&mut reader).unwrap().as_deref(), Some("first task\n"));
        assert_eq!(read_input(&mut reader).unwrap(), None);
    }

    #[test]
    fn read_error_is_not_end_of_input() {
        let err = read_input(&mut FailingReader).unwrap_err();
        assert_eq!(err.to_string(), "stdin closed");
    }
}
