//! Grok CLI entry point.

use clap::{CommandFactory, Parser};

use grok_cli::commands;
use grok_cli::{Cli, Commands, ProfileAction, ProviderAction};
use grok_core::{Engine, FileProfileRepository};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grok_core=info,grok_cli=info".into()),
        )
        .init();

    if let Ok(cwd) = std::env::current_dir() {
        commands::load_dotenv(&cwd);
    }

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help().ok();
        println!();
        return;
    };

    let settings = match commands::load_settings(cli.profiles_dir.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match command {
        Commands::Run(args) => {
            if let Err(response) = commands::run::run(&settings, &args).await {
                let body = serde_json::to_string_pretty(&response)
                    .unwrap_or_else(|_| response.error.clone());
                eprintln!("{}", body);
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Profiles { action } => {
            let repository = FileProfileRepository::new(settings.profiles_dir.clone());
            match action {
                ProfileAction::List => commands::profiles::list(&repository),
                ProfileAction::Show { id } => commands::profiles::show(&repository, &id),
                ProfileAction::Validate { file } => commands::profiles::validate(&file),
            }
        }

        Commands::Providers { action } => match action {
            ProviderAction::Status => {
                let engine = Engine::from_settings(&settings);
                commands::providers::status(&engine).await
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
