//! Config validation CLI tool
//!
//! Validates a hima configuration file and reports any errors.

use hima_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a hima configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match hima_config::load_config(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", hima_config::CURRENT_CONFIG_VERSION);
            println!("  Backend: {}", config.backend.url);
            println!(
                "  Anon key: {}",
                if config.backend.anon_key.is_some() {
                    "set"
                } else {
                    "not set (expects HIMA_ANON_KEY)"
                }
            );
            match config.sync.refresh_interval {
                Some(interval) => println!("  Periodic sweep: every {}s", interval.as_secs()),
                None => println!("  Periodic sweep: disabled"),
            }
            println!("  Change poll: every {}s", config.sync.poll_interval.as_secs());
            println!("  Write-through: {:?}", config.sync.write_through);
            println!("  Locale: {}", config.app.locale);
            println!("  Invite links: {}", config.app.invite_base_url);

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                hima_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                hima_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                hima_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                hima_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        hima_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
