//! SiteBroker CLI
//!
//! Command-line interface for checking a SiteBroker configuration and
//! issuing single calls against configured sites

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use sitebroker_config_file::{BrokerConfig, CONFIG_PATH_ENV};
use sitebroker_core::ServiceKind;
use sitebroker_egress::{CallOptions, Method, Payload};
use sitebroker_observability::{DispatchMetrics, init_logging};
use sitebroker_registry::RegistryHandle;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sitebroker")]
#[command(about = "SiteBroker - multi-site request broker for WordPress and SaaS APIs", long_about = None)]
struct Cli {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Log level, overriding the configured one
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the configuration, registering every site
    Check {
        /// Skip the reachability probe
        #[arg(long, default_value = "false")]
        no_preflight: bool,
    },
    /// List configured sites, marking the active one
    Sites,
    /// Issue one call and print the result as JSON
    Call {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,

        /// Endpoint path relative to the service's API root
        path: String,

        /// Site id; the configured default site when omitted
        #[arg(long)]
        site: Option<String>,

        /// Service to call (primary, commerce, email_marketing, ...)
        #[arg(long, default_value = "primary")]
        service: String,

        /// JSON payload: query parameters for GET, body otherwise
        #[arg(long)]
        data: Option<String>,

        /// Send the payload as multipart form fields
        #[arg(long, default_value = "false")]
        form: bool,

        /// Attach pagination metadata (GET only)
        #[arg(long, default_value = "false")]
        paginate: bool,

        /// Print status, headers and body
        #[arg(long, default_value = "false")]
        raw: bool,

        /// Per-attempt timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Print Prometheus metrics after the call
        #[arg(long, default_value = "false")]
        metrics: bool,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<BrokerConfig> {
    let mut config = sitebroker_config_file::load(cli.config.as_deref())
        .context("Failed to load configuration")?;

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    init_logging(&config.logging).context("Failed to initialize logging")?;

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Check { no_preflight } => {
            if no_preflight {
                config.preflight = false;
            }
            let handle = RegistryHandle::from_config(config, None).await?;
            let active = handle
                .get_active()
                .map(|id| id.to_string())
                .unwrap_or_default();
            println!(
                "Configuration OK: {} site(s), active site '{}'",
                handle.list_tenants().len(),
                active
            );
        }
        Commands::Sites => {
            config.preflight = false;
            let handle = RegistryHandle::from_config(config, None).await?;
            let active = handle.get_active();

            for id in handle.list_tenants() {
                let marker = if active.as_ref() == Some(&id) { "*" } else { " " };
                let services: Vec<&str> = handle
                    .registry()
                    .services(id.as_str())?
                    .iter()
                    .map(ServiceKind::as_str)
                    .collect();
                let multisite = if handle.is_multisite(id.as_str())? {
                    " (multisite)"
                } else {
                    ""
                };
                println!("{} {}{} [{}]", marker, id, multisite, services.join(", "));
            }
        }
        Commands::Call {
            method,
            path,
            site,
            service,
            data,
            form,
            paginate,
            raw,
            timeout_secs,
            metrics,
        } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("Invalid HTTP method '{}'", method))?;
            let service: ServiceKind = service.parse()?;
            let payload = match data {
                Some(data) => Some(Payload::Json(
                    serde_json::from_str(&data).context("--data must be valid JSON")?,
                )),
                None => None,
            };

            let mut options = CallOptions::new().service(service);
            if let Some(secs) = timeout_secs {
                if secs == 0 {
                    bail!("--timeout-secs must be at least 1");
                }
                options = options.timeout(Duration::from_secs(secs));
            }
            if form {
                options = options.form_data();
            }
            if paginate {
                options = options.paginated();
            }
            if raw {
                options = options.raw_response();
            }

            let dispatch_metrics = if metrics {
                Some(DispatchMetrics::new().context("Failed to create metrics")?)
            } else {
                None
            };

            let handle = RegistryHandle::from_config(config, dispatch_metrics.clone()).await?;
            let result = handle
                .call_tool(site.as_deref(), method, &path, payload.as_ref(), &options)
                .await;

            println!("{}", serde_json::to_string_pretty(&result)?);

            if let Some(metrics) = dispatch_metrics {
                print!("{}", metrics.gather_text()?);
            }

            if result.is_error {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
