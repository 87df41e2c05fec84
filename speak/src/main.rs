// speak - Read text aloud through the system voice, ElevenLabs, or a custom TTS endpoint

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use speak::config::{FileSettings, ProviderKind, SettingsSource, SpeakConfig};
use speak::provider::{SpeechSynthesizer, SystemSynthesizer};
use speak::{CommandPlayer, SpeakError, Speaker, SplitMode};
use std::io::{IsTerminal, Read};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "speak")]
#[command(about = "Read text aloud through the system voice, ElevenLabs, or a custom TTS endpoint", long_about = None)]
#[command(version)]
struct Args {
    /// Text to speak (reads stdin when omitted)
    text: Vec<String>,

    /// TTS provider to use for this run (system, elevenlabs, custom)
    #[arg(short, long)]
    provider: Option<ProviderKind>,

    /// System voice to use for this run
    #[arg(short, long)]
    voice: Option<String>,

    /// List available system voices
    #[arg(long)]
    list_voices: bool,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Configuration subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set default provider
    SetProvider {
        /// Provider name (system, elevenlabs, custom)
        provider: ProviderKind,
    },
    /// Set default system voice
    SetVoice {
        /// Voice name to use
        voice: String,
    },
    /// Set how text is split before synthesis
    SetSplitting {
        /// Splitting mode (punctuation, newline, none)
        mode: SplitMode,
    },
    /// Convert markdown to SSML for the system voice
    SetMarkup {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
    /// Turn speech on or off
    SetEnabled {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
    /// Set the custom TTS endpoint URL
    SetEndpoint {
        /// Endpoint that answers with an audio URL
        url: String,
    },
    /// Add a request header for the custom TTS endpoint
    SetHeader {
        name: String,
        value: String,
    },
    /// Set ElevenLabs options
    SetElevenlabs {
        /// Model id (e.g., eleven_multilingual_v2)
        #[arg(long)]
        model: Option<String>,
        /// Voice id
        #[arg(long)]
        voice_id: Option<String>,
        /// Environment variable holding the API key
        #[arg(long)]
        api_key_env: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    // Handle config subcommands
    if let Some(Commands::Config { action }) = &args.command {
        return handle_config_command(action);
    }

    let mut config = SpeakConfig::load().context("Failed to load configuration")?;
    let synthesizer = SystemSynthesizer::detect();

    // Handle --list-voices
    if args.list_voices {
        let synthesizer =
            synthesizer.ok_or_else(|| anyhow::anyhow!("No system speech synthesizer found"))?;
        return list_voices(&synthesizer).await;
    }

    let text = read_text(&args.text)?;

    // Command-line overrides apply to this run only
    let overridden = args.provider.is_some() || args.voice.is_some();
    if let Some(provider) = args.provider {
        config.provider = provider;
    }
    if let Some(voice) = &args.voice {
        config.voice = Some(voice.clone());
    }

    let settings: Arc<dyn SettingsSource> = if overridden {
        Arc::new(config.clone())
    } else {
        Arc::new(FileSettings::default_location()?)
    };

    let mut speaker = Speaker::new(settings);
    if let Some(synthesizer) = synthesizer {
        log::debug!("System voice: {}", synthesizer.name());
        speaker = speaker.with_synthesizer(Arc::new(synthesizer));
    }
    if let Some(player) = CommandPlayer::from_settings(&config.player) {
        log::debug!("Audio player: {}", player.program().display());
        speaker = speaker.with_sink(Arc::new(player));
    }
    let speaker = Arc::new(speaker);

    let interrupt = {
        let speaker = Arc::clone(&speaker);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                speaker.cancel();
            }
        })
    };

    let result = speaker.speak(&text).await;
    interrupt.abort();

    match result {
        Ok(()) => Ok(()),
        Err(SpeakError::Cancelled) => {
            eprintln!("Stopped.");
            std::process::exit(130);
        }
        // Already reported through the notifier
        Err(_) => std::process::exit(1),
    }
}

fn read_text(words: &[String]) -> Result<String> {
    if !words.is_empty() {
        return Ok(words.join(" "));
    }

    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        anyhow::bail!("No text given. Pass TEXT or pipe it on stdin");
    }
    let mut text = String::new();
    stdin
        .read_to_string(&mut text)
        .context("Failed to read text from stdin")?;
    Ok(text)
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = SpeakConfig::load()?;
            println!("Configuration file: {:?}", SpeakConfig::config_path()?);
            println!();
            println!("enabled = {}", config.enabled);
            println!("provider = \"{}\"", config.provider);
            if let Some(voice) = &config.voice {
                println!("voice = \"{}\"", voice);
            } else {
                println!("voice = (system default)");
            }
            println!("markup = {}", config.markup);
            println!("splitting = \"{}\"", config.splitting);
            println!("fetch_timeout_secs = {}", config.fetch_timeout_secs);

            println!();
            println!("[elevenlabs]");
            let key_status = if config.elevenlabs.api_key.is_some() {
                "(set)".to_string()
            } else if config.elevenlabs.resolve_api_key().is_some() {
                format!("(from ${})", config.elevenlabs.api_key_env)
            } else {
                "(not set)".to_string()
            };
            println!("api_key = {}", key_status);
            print_optional("model", config.elevenlabs.model.as_deref());
            print_optional("voice_id", config.elevenlabs.voice_id.as_deref());
            println!("base_url = \"{}\"", config.elevenlabs.base_url);

            println!();
            println!("[custom]");
            print_optional("endpoint", config.custom.endpoint.as_deref());
            // Header values often carry credentials
            let header_names: Vec<&str> = config.custom.headers.keys().map(String::as_str).collect();
            println!("headers = {:?}", header_names);
            print_optional("model", config.custom.model.as_deref());
            print_optional("voice", config.custom.voice.as_deref());
            println!("speed = {}", config.custom.speed);

            println!();
            println!("[player]");
            match &config.player.command {
                Some(command) => println!("command = \"{}\" {:?}", command, config.player.args),
                None => println!("command = (detected)"),
            }
        }
        ConfigAction::SetProvider { provider } => {
            let mut config = SpeakConfig::load()?;
            config.provider = *provider;
            config.save()?;
            println!("Default provider set to: {}", provider);
        }
        ConfigAction::SetVoice { voice } => {
            let mut config = SpeakConfig::load()?;
            config.voice = Some(voice.clone());
            config.save()?;
            println!("Default voice set to: {}", voice);
        }
        ConfigAction::SetSplitting { mode } => {
            let mut config = SpeakConfig::load()?;
            config.splitting = *mode;
            config.save()?;
            println!("Splitting mode set to: {}", mode);
        }
        ConfigAction::SetMarkup { enabled } => {
            let mut config = SpeakConfig::load()?;
            config.markup = *enabled;
            config.save()?;
            println!("Markup set to: {}", enabled);
        }
        ConfigAction::SetEnabled { enabled } => {
            let mut config = SpeakConfig::load()?;
            config.enabled = *enabled;
            config.save()?;
            println!("Speech {}", if *enabled { "enabled" } else { "disabled" });
        }
        ConfigAction::SetEndpoint { url } => {
            reqwest::Url::parse(url).with_context(|| format!("Invalid endpoint URL: {}", url))?;
            let mut config = SpeakConfig::load()?;
            config.custom.endpoint = Some(url.clone());
            config.save()?;
            println!("Custom endpoint set to: {}", url);
        }
        ConfigAction::SetHeader { name, value } => {
            let mut config = SpeakConfig::load()?;
            config.custom.headers.insert(name.clone(), value.clone());
            config.save()?;
            println!("Custom header set: {}", name);
        }
        ConfigAction::SetElevenlabs {
            model,
            voice_id,
            api_key_env,
        } => {
            let mut config = SpeakConfig::load()?;
            if let Some(model) = model {
                config.elevenlabs.model = Some(model.clone());
            }
            if let Some(voice_id) = voice_id {
                config.elevenlabs.voice_id = Some(voice_id.clone());
            }
            if let Some(api_key_env) = api_key_env {
                config.elevenlabs.api_key_env = api_key_env.clone();
            }
            config.save()?;
            println!("ElevenLabs settings updated");
        }
    }
    Ok(())
}

fn print_optional(key: &str, value: Option<&str>) {
    match value {
        Some(value) => println!("{} = \"{}\"", key, value),
        None => println!("{} = (not set)", key),
    }
}

async fn list_voices(synthesizer: &dyn SpeechSynthesizer) -> Result<()> {
    let voices = synthesizer.list_voices().await?;

    println!("Available voices for {}:", synthesizer.name());
    println!();

    for voice in voices {
        if let Some(lang) = &voice.language {
            println!("  {} ({})", voice.name, lang);
        } else {
            println!("  {}", voice.name);
        }
    }

    Ok(())
}
