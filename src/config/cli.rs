use crate::core::removal::LossFlag;
use crate::core::signal::SignalKind;
use crate::domain::model::WorkContext;
use crate::utils::error::Result;
use crate::utils::validation::{validate_non_empty_string, Validate};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "equipment-engine")]
#[command(about = "Equipment composition and lifecycle engine for field work orders")]
pub struct Cli {
    #[arg(long, short, default_value = "equipment.toml")]
    pub config: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Work-order scalars every subcommand needs.
#[derive(Debug, Clone, Args)]
pub struct WorkOrderArgs {
    pub work_id: String,

    #[arg(long)]
    pub customer_id: String,

    #[arg(long)]
    pub contract_id: String,

    #[arg(long, default_value = "01")]
    pub work_code: String,

    #[arg(long, default_value = "")]
    pub product_code: String,

    #[arg(long, default_value = "")]
    pub product_group: String,

    #[arg(long, default_value = "")]
    pub receipt_id: String,

    #[arg(long, default_value = "")]
    pub worker_id: String,

    #[arg(long, default_value = "")]
    pub so_id: String,

    #[arg(long)]
    pub voip_product_code: Option<String>,

    #[arg(long)]
    pub isp_product_code: Option<String>,

    #[arg(long)]
    pub composition_quantity_from: Option<String>,
}

impl WorkOrderArgs {
    pub fn to_context(&self) -> WorkContext {
        WorkContext {
            work_order_id: self.work_id.clone(),
            customer_id: self.customer_id.clone(),
            contract_id: self.contract_id.clone(),
            receipt_id: self.receipt_id.clone(),
            worker_id: self.worker_id.clone(),
            so_id: self.so_id.clone(),
            mst_so_id: self.so_id.clone(),
            work_code: self.work_code.clone(),
            work_detail_code: String::new(),
            product_code: self.product_code.clone(),
            product_group: self.product_group.clone(),
            voip_product_code: self.voip_product_code.clone(),
            isp_product_code: self.isp_product_code.clone(),
            composition_quantity_from: self.composition_quantity_from.clone(),
        }
    }
}

impl Validate for WorkOrderArgs {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("work_id", &self.work_id)?;
        validate_non_empty_string("customer_id", &self.customer_id)?;
        validate_non_empty_string("contract_id", &self.contract_id)?;
        validate_non_empty_string("work_code", &self.work_code)?;
        Ok(())
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch the catalog, reconcile it with the saved draft and print a summary
    Load(WorkOrderArgs),

    /// Bind a stock unit to a contract slot
    Install {
        #[command(flatten)]
        order: WorkOrderArgs,
        #[arg(long)]
        slot: String,
        #[arg(long)]
        unit: String,
    },

    /// Unbind a unit
    Remove {
        #[command(flatten)]
        order: WorkOrderArgs,
        #[arg(long)]
        unit: String,
    },

    /// Bind a unit from the removal pool
    Reuse {
        #[command(flatten)]
        order: WorkOrderArgs,
        #[arg(long)]
        unit: String,
        #[arg(long)]
        slot: String,
    },

    /// Flip a loss flag on a removed unit (equipment, accessory, remote, cable, cradle)
    Flag {
        #[command(flatten)]
        order: WorkOrderArgs,
        #[arg(long)]
        unit: String,
        #[arg(long)]
        flag: LossFlag,
    },

    /// Print the installed and removed lists
    Export {
        #[command(flatten)]
        order: WorkOrderArgs,
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
    },

    /// Send the provisioning signal for the current bindings
    Dispatch {
        #[command(flatten)]
        order: WorkOrderArgs,
        #[arg(long, default_value = "install")]
        kind: SignalKind,
    },
}

impl CliCommand {
    pub fn order(&self) -> &WorkOrderArgs {
        match self {
            CliCommand::Load(order) => order,
            CliCommand::Install { order, .. }
            | CliCommand::Remove { order, .. }
            | CliCommand::Reuse { order, .. }
            | CliCommand::Flag { order, .. }
            | CliCommand::Export { order, .. }
            | CliCommand::Dispatch { order, .. } => order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_install_command() {
        let cli = Cli::try_parse_from([
            "equipment-engine",
            "--verbose",
            "install",
            "W1",
            "--customer-id",
            "C1",
            "--contract-id",
            "K1",
            "--slot",
            "S1",
            "--unit",
            "U1",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, "equipment.toml");
        let order = cli.command.order();
        assert_eq!(order.work_id, "W1");
        assert_eq!(order.to_context().work_code, "01");
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_parse_flag_and_dispatch_kinds() {
        let cli = Cli::try_parse_from([
            "equipment-engine",
            "flag",
            "W1",
            "--customer-id",
            "C1",
            "--contract-id",
            "K1",
            "--unit",
            "U1",
            "--flag",
            "cable",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            CliCommand::Flag {
                flag: LossFlag::CableLost,
                ..
            }
        ));

        let cli = Cli::try_parse_from([
            "equipment-engine",
            "dispatch",
            "W1",
            "--customer-id",
            "C1",
            "--contract-id",
            "K1",
            "--kind",
            "removal",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            CliCommand::Dispatch {
                kind: SignalKind::Removal,
                ..
            }
        ));
    }
}
