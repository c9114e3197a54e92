//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat, ScopeArgs};
use crate::collector::Collector;
use crate::config::{PipelineConfig, StorageKind};
use crate::error::{Result, ResultExt};
use crate::http::{HttpClient, RateLimiter};
use crate::output::{write_usage_parquet, ParquetWriterConfig};
use crate::pipeline::Pipeline;
use crate::scope::{TaskOptions, TaskScope};
use crate::store::{DomainStore, RawStore};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
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
        let config = self.load_config()?;

        match &self.cli.command {
            Commands::Run { scope, export } => {
                self.run_pipeline(&config, scope, export.as_deref()).await
            }
            Commands::Collect { scope } => self.collect(&config, scope).await,
            Commands::Extract { scope } => self.extract(&config, scope).await,
            Commands::Records { scope } => self.records(&config, scope).await,
            Commands::Validate => self.validate(&config),
        }
    }

    /// Load the config file (or defaults) and apply CLI overrides
    fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.cli.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(token) = &self.cli.token {
            config = config.with_token(token.as_str());
        }
        config.validate()?;
        Ok(config)
    }

    fn open_stores(config: &PipelineConfig) -> Result<(Arc<dyn RawStore>, Arc<dyn DomainStore>)> {
        if config.storage.kind == StorageKind::Memory {
            warn!("Using in-memory storage; nothing is kept after this command");
        }
        config.storage.open()
    }

    fn build_client(config: &PipelineConfig) -> Result<HttpClient> {
        if config.api.token.is_none() {
            warn!("No API token configured; requests will be unauthenticated");
        }
        HttpClient::with_config(config.api.http_client_config())
    }

    async fn run_pipeline(
        &self,
        config: &PipelineConfig,
        args: &ScopeArgs,
        export: Option<&Path>,
    ) -> Result<()> {
        let scope = build_scope(args)?;
        let (raw, domain) = Self::open_stores(config)?;

        let mut pipeline = Pipeline::new(Self::build_client(config)?, raw, domain.clone())
            .with_rate_limit(config.rate_limit.clone())
            .with_collector_config(config.collector.clone());
        let report = pipeline.run(&scope).await?;
        self.output_message(&serde_json::to_value(&report)?);

        if let Some(path) = export {
            let records = domain.list(scope.connection_id, &scope.resource_id).await?;
            let rows = write_usage_parquet(&records, path, &ParquetWriterConfig::default())
                .with_context(|| format!("Export to {} failed", path.display()))?;
            self.output_message(&json!({
                "type": "EXPORT",
                "path": path.display().to_string(),
                "rows": rows,
            }));
        }
        Ok(())
    }

    async fn collect(&self, config: &PipelineConfig, args: &ScopeArgs) -> Result<()> {
        let scope = build_scope(args)?;
        let (raw, _) = Self::open_stores(config)?;

        let collector = Collector::new(
            Self::build_client(config)?,
            RateLimiter::new(&config.rate_limit),
            raw,
        )
        .with_config(config.collector.clone());
        let stats = collector.run(&scope).await?;

        self.output_message(&json!({"type": "COLLECT", "stats": stats}));
        Ok(())
    }

    async fn extract(&self, config: &PipelineConfig, args: &ScopeArgs) -> Result<()> {
        let scope = build_scope(args)?;
        let (raw, domain) = Self::open_stores(config)?;

        let mut pipeline = Pipeline::new(Self::build_client(config)?, raw, domain);
        let report = pipeline.extract_only(&scope).await?;

        self.output_message(&serde_json::to_value(&report)?);
        Ok(())
    }

    async fn records(&self, config: &PipelineConfig, args: &ScopeArgs) -> Result<()> {
        let scope = build_scope(args)?;
        let (_, domain) = Self::open_stores(config)?;

        let records = domain.list(scope.connection_id, &scope.resource_id).await?;
        info!(scope = %scope.fingerprint(), rows = records.len(), "Listing usage rows");
        for record in &records {
            self.output_message(&serde_json::to_value(record)?);
        }
        Ok(())
    }

    fn validate(&self, config: &PipelineConfig) -> Result<()> {
        self.output_message(&json!({
            "status": "valid",
            "endpoint": config.api.endpoint,
            "has_token": config.api.token.is_some(),
            "page_size": config.collector.page_size,
            "fan_out": config.collector.fan_out,
            "storage": config.storage.kind,
        }));
        Ok(())
    }

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

/// Build and validate a task scope from CLI flags
fn build_scope(args: &ScopeArgs) -> Result<TaskScope> {
    TaskScope::from_options(TaskOptions {
        connection_id: args.connection_id,
        organization_name: args.organization_name.clone(),
        enterprise_name: args.enterprise_name.clone(),
        scope_config_id: None,
        since: args.time_after.clone(),
    })
}
