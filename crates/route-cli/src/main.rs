//! `routeflow`: compila rutas y administra overrides de ejecución contra el
//! backend Postgres.
//!
//! Códigos de salida: 0 ok, 2 uso (clap), 3 entrada JSON inválida,
//! 4 rechazo de dominio (4xx), 5 error de backend (5xx / pool / config).

mod commands;
mod import;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use routeflow::config::{log_filter_from_env, AppConfig};

#[derive(Parser)]
#[command(name = "routeflow")]
#[command(about = "Route execution compiler for the MES backend", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a routing into an executable version (reuses the latest one when nothing changed)
    Compile {
        /// Routing code
        routing: String,
    },

    /// List the versions of a routing, newest first
    Versions { routing: String },

    /// Show one version of a routing
    Version { routing: String, version_no: i32 },

    /// Execution-config overrides
    Configs {
        #[command(subcommand)]
        action: ConfigsCommands,
    },

    /// Load design data (routings, steps, station groups, data specs) from a JSON file
    Import {
        /// JSON file with `routings`, `steps`, `stationGroups` and `dataSpecs` arrays
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigsCommands {
    /// List overrides affecting a routing, most recently updated first
    List { routing: String },

    /// Create a ROUTE or STEP override
    Create {
        routing: String,
        #[command(flatten)]
        payload: Payload,
    },

    /// Partially update an override (omitted fields are untouched, null clears)
    Update {
        routing: String,
        config_id: String,
        #[command(flatten)]
        payload: Payload,
    },
}

/// Cuerpo JSON de la operación: en línea o desde archivo.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct Payload {
    /// Inline JSON body
    #[arg(long)]
    json: Option<String>,

    /// Path to a JSON body
    #[arg(long, short = 'f')]
    file: Option<PathBuf>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_filter_from_env()))
                                                  .unwrap_or_else(|_| EnvFilter::new("info"));
    // El bridge `tracing-log` de `init()` captura los `log::` de las librerías.
    tracing_subscriber::registry().with(filter)
                                  .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                                  .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[routeflow] configuration error: {e}");
            process::exit(5);
        }
    };
    tracing::debug!(min = config.db.min_connections,
                    max = config.db.max_connections,
                    compile_attempts = config.compile_attempts,
                    "configuration loaded");

    let outcome = commands::connect(&config).and_then(|svc| match cli.command {
                                                 Commands::Compile { routing } => commands::compile(&svc, &routing),
                                                 Commands::Versions { routing } => commands::versions(&svc, &routing),
                                                 Commands::Version { routing, version_no } => {
                                                     commands::version(&svc, &routing, version_no)
                                                 }
                                                 Commands::Configs { action } => match action {
                                                     ConfigsCommands::List { routing } => {
                                                         commands::list_configs(&svc, &routing)
                                                     }
                                                     ConfigsCommands::Create { routing, payload } => {
                                                         commands::create_config(&svc, &routing, &payload.read()?)
                                                     }
                                                     ConfigsCommands::Update { routing,
                                                                               config_id,
                                                                               payload, } => {
                                                         commands::update_config(&svc, &routing, &config_id, &payload.read()?)
                                                     }
                                                 },
                                                 Commands::Import { file } => import::run(svc.store(), &file),
                                             });

    match outcome {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("[routeflow] output error: {e}");
                process::exit(5);
            }
        },
        Err(e) => {
            tracing::error!(code = e.code(), "{e}");
            eprintln!("[routeflow] {}: {e}", e.code());
            process::exit(e.exit_code());
        }
    }
}

impl Payload {
    fn read(&self) -> Result<String, commands::CliError> {
        match (&self.json, &self.file) {
            (Some(json), _) => Ok(json.clone()),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| commands::CliError::Input(format!("{}: {e}", path.display()))),
            (None, None) => Err(commands::CliError::Input("either --json or --file is required".into())),
        }
    }
}
