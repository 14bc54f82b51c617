//! CLI command definitions and dispatch.

use clap::{Parser, Subcommand};
use serde::Serialize;
use tabled::Tabled;
use tracing::info;

use mailhub_core::config::AppConfig;
use mailhub_core::error::AppError;
use mailhub_core::traits::owner::OwnedObject;
use mailhub_core::types::id::UserId;
use mailhub_core::types::limit::{LimitKind, LimitMax, LimitUsage};
use mailhub_core::types::parameter::{ParameterField, ParameterLevel};
use mailhub_database::DatabasePool;
use mailhub_database::migration::run_migrations;
use mailhub_limits::LIMITS_EXTENSION_ID;

use crate::bootstrap;
use crate::output::{self, OutputFormat};

/// MailHub: administrator resource limits
#[derive(Debug, Parser)]
#[command(name = "mailhub-server", version, about, long_about = None)]
pub struct Cli {
    /// Base configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Environment overlay (`config/<env>.toml`)
    #[arg(short, long, env = "MAILHUB_ENV", default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List registered limit kinds
    Kinds,
    /// Show the limits of one administrator
    Usage {
        /// Administrator account ID
        #[arg(long)]
        owner: UserId,
    },
    /// Change the maximum of one administrator's limit
    SetMax {
        /// Administrator account ID
        #[arg(long)]
        owner: UserId,
        /// Limit kind, e.g. `relay_domains_limit`
        #[arg(long)]
        kind: String,
        /// New maximum (negative = unlimited)
        #[arg(long, allow_negative_numbers = true)]
        max: i64,
    },
    /// Show the administrator an object is counted against
    Owner {
        /// Object as `<type>:<uuid>`, e.g. `relay_domain:<uuid>`
        object: OwnedObject,
    },
    /// Settings form parameters
    Parameters {
        #[command(subcommand)]
        action: ParameterCommands,
    },
    /// Add missing limits to every existing pool
    Backfill,
    /// Run all pending database migrations
    Migrate,
}

/// Parameter subcommands
#[derive(Debug, Subcommand)]
pub enum ParameterCommands {
    /// Show the extra parameters contributed to a settings form
    List {
        /// Application whose form is built
        #[arg(long, default_value = LIMITS_EXTENSION_ID)]
        app: String,
        /// Parameter scope (`A` or `U`)
        #[arg(long, default_value = "A")]
        level: ParameterLevel,
    },
    /// Change and store a default maximum of the limits form
    Set {
        /// Field name, e.g. `deflt_relay_domains_limit`
        name: String,
        /// New value (negative = unlimited)
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },
}

#[derive(Debug, Serialize, Tabled)]
struct KindRow {
    #[tabled(rename = "Kind")]
    name: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Default")]
    default_max: String,
    #[tabled(rename = "Extension")]
    extension: String,
}

#[derive(Debug, Serialize, Tabled)]
struct UsageRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Current")]
    current: u32,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "Status")]
    status: &'static str,
}

impl From<LimitUsage> for UsageRow {
    fn from(usage: LimitUsage) -> Self {
        let status = if usage.is_exceeded() {
            "exceeded"
        } else if usage.admits_one_more() {
            "ok"
        } else {
            "full"
        };
        Self {
            kind: usage.kind.to_string(),
            current: usage.current,
            max: usage.max.to_string(),
            status,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct ParameterRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Initial")]
    initial: i64,
    #[tabled(rename = "Help")]
    help_text: String,
}

impl From<ParameterField> for ParameterRow {
    fn from(field: ParameterField) -> Self {
        Self {
            name: field.name,
            label: field.label,
            initial: field.initial,
            help_text: field.help_text,
        }
    }
}

impl Cli {
    /// Load the configuration selected on the command line
    pub fn load_config(&self) -> Result<AppConfig, AppError> {
        AppConfig::load_from(&self.config, &self.env)
    }

    /// Execute the CLI command
    pub async fn execute(&self, config: &AppConfig) -> Result<(), AppError> {
        if let Commands::Migrate = self.command {
            let database = DatabasePool::connect(&config.database).await?;
            run_migrations(database.pool()).await?;
            database.close().await;
            output::print_success("All migrations applied successfully.");
            return Ok(());
        }

        let runtime = bootstrap::boot(config).await?;
        let accounting = runtime.accounting.clone();

        let result = match &self.command {
            Commands::Kinds => {
                let mut rows = Vec::new();
                for info in accounting.kinds().list_kinds().await {
                    let default_max = accounting.parameters().default_max(&info).await;
                    rows.push(KindRow {
                        name: info.name.to_string(),
                        label: info.label,
                        default_max: default_max.to_string(),
                        extension: info.extension,
                    });
                }
                output::print_list(&rows, self.format);
                Ok(())
            }
            Commands::Usage { owner } => self.usage(&runtime, owner).await,
            Commands::SetMax { owner, kind, max } => accounting
                .set_max(owner, &LimitKind::new(kind.as_str()), LimitMax::from(*max))
                .await
                .map(|usage| {
                    let rows = vec![UsageRow::from(usage)];
                    output::print_list(&rows, self.format);
                }),
            Commands::Owner { object } => accounting.owner_of(object).await.map(|owner| match owner {
                Some(owner) => output::print_success(&format!("{object} is counted against {owner}")),
                None => output::print_warning(&format!("{object} has no recorded owner")),
            }),
            Commands::Parameters {
                action: ParameterCommands::List { app, level },
            } => {
                let fields = runtime
                    .manager
                    .dispatcher()
                    .collect_parameters(app, *level)
                    .await;
                fields.map(|fields| {
                    let rows: Vec<ParameterRow> = fields.into_iter().map(Into::into).collect();
                    output::print_list(&rows, self.format);
                })
            }
            Commands::Parameters {
                action: ParameterCommands::Set { name, value },
            } => accounting
                .parameters()
                .set_parameter(name, *value)
                .await
                .map(|()| output::print_success(&format!("{name} set to {value}"))),
            Commands::Backfill => accounting.backfill().await.map(|created| {
                info!(created = created, "Backfill finished");
                output::print_success(&format!("{created} limit(s) added"));
            }),
            Commands::Migrate => Ok(()),
        };

        runtime.close().await;
        result
    }

    async fn usage(&self, runtime: &bootstrap::Runtime, owner: &UserId) -> Result<(), AppError> {
        let accounting = &runtime.accounting;
        let usages = match accounting.pool_usage(owner).await? {
            Some(usages) => usages,
            None => {
                output::print_warning(&format!(
                    "{owner} has no limit pool; showing defaults"
                ));
                let mut usages = Vec::new();
                for info in accounting.kinds().list_kinds().await {
                    usages.push(accounting.get_usage(owner, &info.name).await?);
                }
                usages
            }
        };

        let rows: Vec<UsageRow> = usages.into_iter().map(Into::into).collect();
        output::print_list(&rows, self.format);
        Ok(())
    }
}
