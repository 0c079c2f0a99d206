mod cmd;
mod output;
mod setup;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "diorama",
    about = "Diorama scene orchestrator: narrate, trigger scenes, drive the arm",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (YAML). Defaults apply when omitted.
    #[arg(long, global = true, env = "DIORAMA_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect hardware, serve the control channel, and read turns from stdin
    Run {
        /// Control server port (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Don't start the control server
        #[arg(long)]
        no_server: bool,
    },

    /// Run a single turn and print the narration
    Turn {
        /// What the visitor said
        text: String,
    },

    /// Ask for a story and tell it step by step
    Story {
        /// What the visitor asked for
        text: String,
    },

    /// Execute one scene against the hardware and print the report
    Scene { name: String },

    /// List scenes in the loaded table
    Scenes {
        /// Include aliases
        #[arg(long)]
        all: bool,
    },

    /// List serial ports visible to the OS
    Ports,

    /// Emulate the scene and arm controllers on a pair of serial ports
    Emulate {
        /// Port the scene-controller emulator listens on
        #[arg(long, default_value = "./main_controller_dev")]
        scene_port: String,

        /// Port the arm-controller emulator listens on
        #[arg(long, default_value = "./robotic_arm_dev")]
        arm_port: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } | Commands::Emulate { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Run { port, no_server } => cmd::run::run(config, port, no_server),
        Commands::Turn { text } => cmd::turn::run(config, &text, cli.json),
        Commands::Story { text } => cmd::story::run(config, &text, cli.json),
        Commands::Scene { name } => cmd::scene::run(config, &name, cli.json),
        Commands::Scenes { all } => cmd::scenes::run(config, all, cli.json),
        Commands::Ports => cmd::ports::run(cli.json),
        Commands::Emulate {
            scene_port,
            arm_port,
        } => cmd::emulate::run(config, &scene_port, &arm_port),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
