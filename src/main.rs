use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

use care_onboard::config::WizardConfig;
use care_onboard::error::{ConfigError, Error, WizardError};
use care_onboard::gateway::{Gateway, HttpGateway};
use care_onboard::onboarding::{
    Outcome, WizardCommand, WizardManager, step_fields, step_title,
};

/// Load configuration from the environment and build the HTTP gateway.
fn connect() -> care_onboard::error::Result<(WizardConfig, Arc<dyn Gateway>)> {
    let config = WizardConfig::from_env()?;
    let gateway: Arc<dyn Gateway> = Arc::new(HttpGateway::new(config.gateway.clone())?);
    Ok((config, gateway))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let (config, gateway) = match connect() {
        Ok(setup) => setup,
        Err(e) => {
            eprintln!("Error: {e}");
            if matches!(e, Error::Config(ConfigError::MissingEnvVar(_))) {
                eprintln!("  export CARE_API_BASE_URL=https://api.example.com");
            }
            std::process::exit(1);
        }
    };

    eprintln!("Care Onboard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Flow: {}", config.flow);
    eprintln!("   API:  {}", config.gateway.base_url);
    eprintln!("   Type 'back' to go back, 'resend' for a new code, 'quit' to leave.\n");

    let exited = Arc::new(AtomicBool::new(false));
    let exit_flag = Arc::clone(&exited);
    let manager = WizardManager::new(
        config,
        gateway,
        Arc::new(move || exit_flag.store(true, Ordering::SeqCst)),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if exited.load(Ordering::SeqCst) {
            eprintln!("Left onboarding.");
            return Ok(());
        }

        let snapshot = manager.snapshot().await;
        let Some(step) = snapshot.position.step() else {
            break;
        };

        eprintln!(
            "[{}/{}] {}",
            snapshot.step_number,
            snapshot.total_steps,
            step_title(step)
        );
        if let Some(ref error) = snapshot.error {
            eprintln!("  ! {error}");
        }

        let mut patch = Map::new();
        let mut command = None;
        for field in step_fields(step) {
            let prefill = snapshot
                .answers
                .get(field.key)
                .filter(|_| !field.secret)
                .and_then(Value::as_str)
                .map(str::to_string);
            let hint = match (&prefill, field.required) {
                (Some(value), _) => format!(" [{value}]"),
                (None, false) => " (optional)".to_string(),
                (None, true) => String::new(),
            };
            eprint!("  {}{hint}: ", field.label);

            let Some(line) = lines.next_line().await? else {
                manager.dispatch(WizardCommand::Cancel).await?;
                return Ok(());
            };
            match line.trim() {
                "back" => {
                    command = Some(WizardCommand::Retreat);
                    break;
                }
                "resend" => {
                    command = Some(WizardCommand::ResendCode);
                    break;
                }
                "quit" => {
                    manager.dispatch(WizardCommand::Cancel).await?;
                    eprintln!("Onboarding cancelled.");
                    return Ok(());
                }
                "" => {}
                value => {
                    patch.insert(field.key.to_string(), Value::String(value.to_string()));
                }
            }
        }

        // Fresh input clears the previous attempt's error.
        manager.dispatch(WizardCommand::InputChanged).await?;

        let command = command.unwrap_or(WizardCommand::Advance(patch));
        match manager.dispatch(command).await {
            Ok(Outcome::Completed { organization }) => {
                eprintln!("\nYour organization is ready.");
                println!("{}", serde_json::to_string_pretty(&organization)?);
                break;
            }
            Ok(_) => {}
            // Step-level failures are already recorded on the wizard and shown next round.
            Err(WizardError::Validation(_))
            | Err(WizardError::Remote { .. })
            | Err(WizardError::CodeMismatch) => {}
            Err(e) => eprintln!("  ! {e}"),
        }
        eprintln!();
    }

    let snapshot = manager.snapshot().await;
    tracing::debug!(session = %snapshot.session_id, "Final wizard state");
    Ok(())
}
