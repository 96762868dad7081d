use std::error::Error;
use std::process::ExitCode;

use authkeys::{KeyPairManager, KeysConfig};
use tracing_subscriber::EnvFilter;

fn run() -> Result<(), Box<dyn Error>> {
    let config = KeysConfig::from_env()?;
    let manager = KeyPairManager::from_config(&config);

    let keys = manager.load_or_generate()?;
    tracing::info!(
        directory = %manager.paths().directory().display(),
        "Key pairs ready"
    );

    println!("{}", keys.jwks.to_json()?);

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
