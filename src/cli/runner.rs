//! CLI runner - executes commands

use crate::batch::fetch_each;
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::error::{Error, Result};
use crate::loader::{load_source, SourceDefinition};
use crate::pagination::{DrainOptions, StopReason};
use crate::source::Source;
use crate::sources;
use crate::types::ItemPolicy;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::List => self.list_sources(),
            Commands::Validate => self.validate(),
            Commands::Listings => self.listings(),
            Commands::Check { config_json } => self.check(config_json.as_deref()).await,
            Commands::Drain {
                listing,
                config_json,
                max_records,
                page_size,
                params,
            } => {
                let params: BTreeMap<String, String> = params.iter().cloned().collect();
                self.drain(
                    listing,
                    config_json.as_deref(),
                    *max_records,
                    *page_size,
                    &params,
                )
                .await
            }
            Commands::Fetch {
                paths,
                config_json,
                skip_failures,
            } => {
                let policy = if *skip_failures {
                    ItemPolicy::Skip
                } else {
                    ItemPolicy::Abort
                };
                self.fetch(paths, config_json.as_deref(), policy).await
            }
        }
    }

    /// Load source definition
    fn load_definition(&self) -> Result<SourceDefinition> {
        let source = self
            .cli
            .source
            .as_ref()
            .ok_or_else(|| Error::config("Source not specified (use -s flag)"))?;
        load_source(source)
    }

    /// Load configuration
    fn load_config(&self, inline: Option<&str>) -> Result<Value> {
        // Inline config takes precedence
        if let Some(json_str) = inline {
            return serde_json::from_str(json_str)
                .map_err(|e| Error::config(format!("Invalid config JSON: {e}")));
        }

        if let Some(path) = &self.cli.config {
            let content = fs::read_to_string(path)
                .map_err(|e| Error::config(format!("Failed to read config file: {e}")))?;
            return serde_json::from_str(&content)
                .map_err(|e| Error::config(format!("Invalid config JSON: {e}")));
        }

        Ok(json!({}))
    }

    /// Bind the selected source to its config
    fn build_source(&self, config_json: Option<&str>) -> Result<Source> {
        let definition = self.load_definition()?;
        let config = self.load_config(config_json)?;
        Source::from_definition(definition, &config)
    }

    /// List built-in sources
    fn list_sources(&self) -> Result<()> {
        for name in sources::list_builtin() {
            let description = sources::get_builtin(name)
                .and_then(|yaml| crate::loader::load_source_from_str(yaml).ok())
                .and_then(|def| def.description);
            self.output_message(&json!({
                "type": "SOURCE",
                "source": {
                    "name": name,
                    "description": description,
                }
            }));
        }
        Ok(())
    }

    /// Validate source definition
    fn validate(&self) -> Result<()> {
        let def = self.load_definition()?;
        self.output_message(&json!({
            "type": "VALIDATION",
            "validation": {
                "valid": true,
                "name": def.name,
                "version": def.version,
                "auth": def.auth.type_name(),
                "listings": def.listings.len(),
            }
        }));
        Ok(())
    }

    /// List listings with their config requirements
    fn listings(&self) -> Result<()> {
        let def = self.load_definition()?;

        let config: Vec<Value> = def
            .config
            .iter()
            .map(|(name, field)| {
                json!({
                    "name": name,
                    "required": field.required && field.default.is_none(),
                    "secret": field.secret,
                    "description": field.description,
                })
            })
            .collect();

        let listings: Vec<Value> = def
            .listings
            .iter()
            .map(|l| {
                json!({
                    "name": l.name,
                    "description": l.description,
                    "method": l.method.to_string(),
                    "path": l.path,
                    "pagination": crate::pagination::PageStyle::from(&l.pagination).name(),
                    "page_size": l.page_size,
                    "max_page_size": l.max_page_size,
                })
            })
            .collect();

        self.output_message(&json!({
            "type": "LISTINGS",
            "source": def.name,
            "config": config,
            "listings": listings,
        }));
        Ok(())
    }

    /// Check connection
    async fn check(&self, config_json: Option<&str>) -> Result<()> {
        let source = self.build_source(config_json)?;
        let status = source.check().await;

        self.output_message(&json!({
            "type": "CONNECTION_STATUS",
            "connectionStatus": status,
        }));

        if status.ok {
            Ok(())
        } else {
            Err(Error::Other(format!("Connection check failed: {}", status.message)))
        }
    }

    /// Drain a listing, printing records as JSON lines
    async fn drain(
        &self,
        listing: &str,
        config_json: Option<&str>,
        max_records: Option<usize>,
        page_size: Option<u32>,
        params: &BTreeMap<String, String>,
    ) -> Result<()> {
        let source = self.build_source(config_json)?;
        let prepared = source.listing(listing, params, page_size)?;

        let cancel = CancellationToken::new();
        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, stopping after the current page");
                    cancel.cancel();
                }
            }
        });

        let mut options = DrainOptions::new().cancel_on(cancel);
        if let Some(max) = max_records {
            options = options.max_records(max);
        }

        let start = Instant::now();
        let result = prepared.drain(options).await;
        watcher.abort();

        let (drained, error) = match result {
            Ok(drained) => (drained, None),
            Err(e) => (e.partial, Some(e.error)),
        };

        for record in &drained.records {
            self.output_message(&json!({
                "type": "RECORD",
                "record": {
                    "listing": listing,
                    "data": record,
                }
            }));
        }

        let session = &drained.session;
        info!(
            source = %source.name(),
            listing,
            records = drained.records.len(),
            pages = session.pages_fetched,
            "Drain finished"
        );

        self.output_message(&json!({
            "type": "SUMMARY",
            "summary": {
                "listing": listing,
                "records": drained.records.len(),
                "pages": session.pages_fetched,
                "total_expected": session.total_expected,
                "page_size": session.page_size,
                "clamped_from": session.clamped_from,
                "stop": stop_name(drained.stop),
                "duration_ms": u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            }
        }));

        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Fetch single resources
    async fn fetch(
        &self,
        paths: &[String],
        config_json: Option<&str>,
        policy: ItemPolicy,
    ) -> Result<()> {
        let source = self.build_source(config_json)?;
        let outcome = fetch_each(source.client(), paths, policy).await?;

        for (path, item) in &outcome.items {
            self.output_message(&json!({
                "type": "ITEM",
                "item": {"path": path, "data": item},
            }));
        }
        for (path, error) in &outcome.failures {
            self.output_message(&json!({
                "type": "ITEM_FAILURE",
                "failure": {
                    "path": path,
                    "status": error.status(),
                    "message": error.to_string(),
                },
            }));
        }

        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

fn stop_name(stop: StopReason) -> &'static str {
    match stop {
        StopReason::Exhausted => "exhausted",
        StopReason::MaxRecords => "max_records",
        StopReason::Cancelled => "cancelled",
        StopReason::Failed => "failed",
    }
}
