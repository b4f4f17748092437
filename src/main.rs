use clap::Parser;
use equipment_engine::config::{Cli, CliCommand, ExportFormat};
use equipment_engine::core::removal::{badge, LossFlag};
use equipment_engine::core::session::Command;
use equipment_engine::utils::error::{EquipmentError, ErrorSeverity};
use equipment_engine::utils::{logger, validation::Validate};
use equipment_engine::{EngineConfig, EquipmentWorkflow, HttpBackend, LocalDraftStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting equipment-engine CLI");
    if cli.verbose {
        tracing::debug!("CLI args: {:?}", cli);
    }

    let config = match EngineConfig::from_file(&cli.config).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    if let Err(e) = cli.command.order().validate() {
        fail(&e);
    }

    if let Err(e) = run(cli.command, config).await {
        fail(&e);
    }
    Ok(())
}

async fn run(command: CliCommand, config: EngineConfig) -> equipment_engine::Result<()> {
    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    let store = LocalDraftStore::new(config.draft_dir());
    let workflow = EquipmentWorkflow::new(
        command.order().to_context(),
        backend.clone(),
        backend.clone(),
        backend,
        store,
        config,
    );

    let summary = workflow.load().await?;
    let edit = match &command {
        CliCommand::Install { slot, unit, .. } => Some(Command::Install {
            slot_id: slot.clone(),
            unit_id: unit.clone(),
        }),
        CliCommand::Remove { unit, .. } => Some(Command::Remove {
            unit_id: unit.clone(),
        }),
        CliCommand::Reuse { unit, slot, .. } => Some(Command::Reuse {
            unit_id: unit.clone(),
            slot_id: slot.clone(),
        }),
        CliCommand::Flag { unit, flag, .. } => Some(Command::ToggleFlag {
            unit_id: unit.clone(),
            flag: *flag,
        }),
        _ => None,
    };

    match command {
        CliCommand::Load(_) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        CliCommand::Export { format, .. } => {
            let bundle = workflow.export().await?;
            match format {
                ExportFormat::Json => println!("{}", bundle.to_json()?),
                ExportFormat::Csv => print!("{}", bundle.to_csv()?),
            }
        }
        CliCommand::Dispatch { kind, .. } => {
            let response = workflow.dispatch_signal(kind).await?;
            println!(
                "✅ Signal accepted: {}",
                response.result.unwrap_or_else(|| "SUCCESS".to_string())
            );
        }
        _ => {
            if let Some(edit) = edit {
                let outcome = workflow.execute(edit).await?;
                tracing::info!("✅ {:?}", outcome);
                println!("✅ {}", describe(&outcome));
            }
        }
    }
    Ok(())
}

fn describe(outcome: &equipment_engine::Outcome) -> String {
    use equipment_engine::core::session::RemoveOutcome;
    use equipment_engine::Outcome;
    match outcome {
        Outcome::Installed(install) => match &install.displaced {
            Some(previous) => format!(
                "{} bound to {} (replaced {})",
                install.binding.unit_id, install.binding.slot_id, previous
            ),
            None => format!(
                "{} bound to {}",
                install.binding.unit_id, install.binding.slot_id
            ),
        },
        Outcome::Removed(RemoveOutcome::ReturnedToStock { unit_id }) => {
            format!("{} returned to stock", unit_id)
        }
        Outcome::Removed(RemoveOutcome::MarkedForRemoval(record)) => {
            format!("{} marked for removal ({})", record.unit_id, badge(record))
        }
        Outcome::FlagToggled { unit_id, flags } => {
            let set: Vec<String> = LossFlag::ALL
                .into_iter()
                .filter(|flag| match flag {
                    LossFlag::EquipmentLost => flags.equipment_lost,
                    LossFlag::AccessoryLost => flags.accessory_lost,
                    LossFlag::RemoteLost => flags.remote_lost,
                    LossFlag::CableLost => flags.cable_lost,
                    LossFlag::CradleLost => flags.cradle_lost,
                })
                .map(|flag| flag.to_string())
                .collect();
            format!("{} loss flags: [{}]", unit_id, set.join(", "))
        }
    }
}

fn fail(e: &EquipmentError) -> ! {
    tracing::error!(
        "❌ Equipment engine failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}
