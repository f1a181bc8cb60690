//! chatwire - chat with an OpenAI-compatible endpoint from the terminal

use std::io::Write;

use anyhow::{Context, bail};
use chatwire_agent::{Agent, AgentType, Answer};
use chatwire_provider_openai::OpenAi;
use chatwire_types::ResponseFormat;
use clap::{Parser, ValueEnum};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// LM Studio on localhost
    Local,
    /// Hosted OpenAI API
    Openai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Persona {
    Generic,
    Summarizer,
    Planner,
    Json,
}

impl From<Persona> for AgentType {
    fn from(persona: Persona) -> Self {
        match persona {
            Persona::Generic => AgentType::GenericResponder,
            Persona::Summarizer => AgentType::Summarizer,
            Persona::Planner => AgentType::Planner,
            Persona::Json => AgentType::JsonResponder,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "chatwire", version, about = "Chat with an OpenAI-compatible endpoint")]
struct Cli {
    /// Prompt to send. Without one, prompts are read from stdin line by line.
    prompt: Option<String>,

    /// Which endpoint preset to use
    #[arg(long, env = "CHATWIRE_BACKEND", value_enum, default_value = "local")]
    backend: BackendKind,

    /// Override the preset's base URL
    #[arg(long, env = "CHATWIRE_BASE_URL")]
    base_url: Option<String>,

    /// Override the preset's model
    #[arg(long, env = "CHATWIRE_MODEL")]
    model: Option<String>,

    /// API key for the hosted backend
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Print the reply as it arrives
    #[arg(long)]
    stream: bool,

    /// Ask for a JSON object reply
    #[arg(long)]
    json: bool,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.8)]
    temperature: f32,

    /// Built-in persona
    #[arg(long, value_enum, default_value = "generic")]
    agent: Persona,

    /// Replace the persona's system prompt
    #[arg(long)]
    system: Option<String>,

    /// Image file, URL, or base64 data to attach (repeatable)
    #[arg(long = "image")]
    images: Vec<String>,

    /// List the models the endpoint serves and exit
    #[arg(long)]
    list_models: bool,
}

impl Cli {
    fn backend(&self) -> anyhow::Result<OpenAi> {
        let mut backend = match self.backend {
            BackendKind::Local => OpenAi::local(),
            BackendKind::Openai => {
                let Some(key) = self.api_key.as_deref() else {
                    bail!("the openai backend needs an API key (--api-key or OPENAI_API_KEY)");
                };
                OpenAi::new(key)
            }
        };
        if let Some(url) = &self.base_url {
            backend = backend.base_url(url.as_str());
        }
        if let Some(model) = &self.model {
            backend = backend.model(model.as_str());
        }
        Ok(backend)
    }

    fn agent(&self) -> anyhow::Result<Agent<OpenAi>> {
        let mut agent = Agent::new(self.backend()?)
            .agent_type(self.agent.into())
            .temperature(self.temperature)
            .stream(self.stream);
        if self.json {
            agent = agent.format(ResponseFormat::Json);
        }
        if let Some(system) = &self.system {
            agent = agent.custom_system_prompt(system.as_str());
        }
        Ok(agent)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    tracing::debug!(backend = ?cli.backend, stream = cli.stream, "starting");
    if cli.list_models {
        for id in cli.backend()?.models().await? {
            println!("{id}");
        }
        return Ok(());
    }

    let mut agent = cli.agent()?;
    let images: Vec<&str> = cli.images.iter().map(String::as_str).collect();

    match &cli.prompt {
        Some(prompt) => turn(&mut agent, prompt, &images, false).await,
        None => interactive(&mut agent, &images).await,
    }
}

async fn interactive(agent: &mut Agent<OpenAi>, images: &[&str]) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut first = true;
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if matches!(prompt, "exit" | "quit") {
            break;
        }
        // images go with the first turn only
        let attach: &[&str] = if first { images } else { &[] };
        first = false;
        if let Err(e) = turn(agent, prompt, attach, true).await {
            eprintln!("error: {e:#}");
        }
    }
    Ok(())
}

/// Run one turn and print the reply to stdout.
async fn turn(
    agent: &mut Agent<OpenAi>,
    prompt: &str,
    images: &[&str],
    with_history: bool,
) -> anyhow::Result<()> {
    let prior = with_history.then(|| agent.history().entries().to_vec());
    let answer = agent.ask(prompt, images, prior.as_deref()).await?;

    let mut stdout = std::io::stdout();
    match answer {
        Answer::Text(text) => writeln!(stdout, "{text}")?,
        Answer::Stream(mut stream) => {
            while let Some(fragment) = stream.next().await {
                write!(stdout, "{}", fragment?)?;
                stdout.flush()?;
            }
            writeln!(stdout)?;
        }
        Answer::Unsupported(capability) => {
            bail!("the backend does not support {capability}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_and_flags() {
        let cli = Cli::try_parse_from([
            "chatwire",
            "--stream",
            "--json",
            "--temperature",
            "0.3",
            "--image",
            "a.png",
            "--image",
            "https://example.com/b.jpg",
            "What is 1 + 4?",
        ])
        .unwrap();
        assert_eq!(cli.prompt.as_deref(), Some("What is 1 + 4?"));
        assert!(cli.stream);
        assert!(cli.json);
        assert!((cli.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(cli.images, vec!["a.png", "https://example.com/b.jpg"]);
    }

    #[test]
    fn prompt_is_optional() {
        let cli = Cli::try_parse_from(["chatwire"]).unwrap();
        assert!(cli.prompt.is_none());
        assert!(!cli.stream);
        assert_eq!(cli.agent, Persona::Generic);
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["chatwire", "--backend", "bedrock"]).is_err());
    }

    #[test]
    fn openai_backend_needs_a_key() {
        let cli =
            Cli::try_parse_from(["chatwire", "--backend", "openai", "--api-key", "sk-test"])
                .unwrap();
        assert!(cli.backend().is_ok());

        let mut cli = cli;
        cli.api_key = None;
        let err = cli.backend().unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn overrides_apply_to_the_preset() {
        let cli = Cli::try_parse_from([
            "chatwire",
            "--backend",
            "local",
            "--model",
            "llama-3.2-1b",
            "--agent",
            "planner",
            "--system",
            "Answer in French.",
        ])
        .unwrap();
        let agent = cli.agent().unwrap();
        assert_eq!(agent.backend().model_name(), "llama-3.2-1b");
        assert_eq!(agent.config().agent_type, AgentType::Planner);
        assert_eq!(agent.config().system_prompt(), "Answer in French.");
    }
}
