//! CLI route: single route table and run context. Wires the pipeline
//! components by explicit construction and dispatches to them.

use crate::backfill::{BackfillOptions, BatchBackfillScheduler, PriorityTier};
use crate::cli::help::command_name;
use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation::{
    format_backfill_summary_text, format_generation_result_text, format_import_summary,
    format_validation_result_text, to_json,
};
use crate::config::{BenchlineConfig, ConfigLoader};
use crate::generation::{
    GenerationContext, GenerationCoordinator, GenerationService, RequestOrigin,
};
use crate::provider::create_generator;
use crate::report::ChunkedReportBuilder;
use crate::store::{Dataset, EntityStore, SledEntityStore};
use crate::validation::{PrerequisiteValidator, ValidateOptions};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Runtime context for CLI execution: workspace, resolved config, and store.
pub struct RunContext {
    workspace_root: PathBuf,
    config: BenchlineConfig,
    store_path: PathBuf,
    store: Arc<SledEntityStore>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => ConfigLoader::load(&workspace_root)
                .context("Failed to load workspace configuration")?,
        };

        let store_path = config.storage.resolve(&workspace_root);
        std::fs::create_dir_all(&store_path).with_context(|| {
            format!("Failed to create store directory {}", store_path.display())
        })?;
        let store = Arc::new(
            SledEntityStore::open(&store_path)
                .with_context(|| format!("Failed to open store at {}", store_path.display()))?,
        );

        Ok(Self {
            workspace_root,
            config,
            store_path,
            store,
        })
    }

    pub fn config(&self) -> &BenchlineConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    fn entity_store(&self) -> Arc<dyn EntityStore> {
        self.store.clone()
    }

    fn coordinator(&self) -> Result<GenerationCoordinator> {
        let generator =
            create_generator(&self.config.provider).context("Failed to build text generator")?;
        let pipeline = &self.config.pipeline;
        let builder = Arc::new(ChunkedReportBuilder::new(
            self.entity_store(),
            generator,
            pipeline.builder.clone(),
        ));
        let validator =
            PrerequisiteValidator::new(self.entity_store(), pipeline.validator.clone());
        Ok(GenerationCoordinator::new(
            self.entity_store(),
            validator,
            builder,
            pipeline.coordinator.clone(),
        ))
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String> {
        let started = Instant::now();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;

        let result = runtime.block_on(self.execute_inner(command));
        info!(
            command = command_name(command),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        self.store.flush().context("Failed to flush store")?;
        result
    }

    async fn execute_inner(&self, command: &Commands) -> Result<String> {
        match command {
            Commands::Ensure {
                project_id,
                origin,
                strict,
                allow_fallback,
                format,
            } => {
                let origin: RequestOrigin = origin.parse().map_err(|e: String| anyhow!(e))?;
                let context = GenerationContext {
                    strict_validation: *strict,
                    allow_fallback: *allow_fallback || origin == RequestOrigin::Backfill,
                    requested_by: Some("cli".to_string()),
                    ..GenerationContext::new(origin)
                };
                let coordinator = self.coordinator()?;
                let result = coordinator.ensure_initial_report(project_id, &context).await;
                let output = match format {
                    OutputFormat::Json => to_json(&result)?,
                    OutputFormat::Text => format_generation_result_text(&result),
                };
                if result.success {
                    Ok(output)
                } else {
                    Err(anyhow!(
                        "{}\n\nInitial report generation failed for {}",
                        output,
                        project_id
                    ))
                }
            }
            Commands::Validate {
                project_id,
                strict,
                allow_fallback,
                format,
            } => {
                let validator = PrerequisiteValidator::new(
                    self.entity_store(),
                    self.config.pipeline.validator.clone(),
                );
                let options = ValidateOptions {
                    strict: *strict,
                    allow_fallback: *allow_fallback,
                };
                let result = validator.validate(project_id, &options).await;
                Ok(match format {
                    OutputFormat::Json => to_json(&result)?,
                    OutputFormat::Text => format_validation_result_text(&result),
                })
            }
            Commands::Backfill {
                dry_run,
                tier,
                batch_size,
                max_concurrent,
                max_projects,
                min_age_days,
                max_age_days,
                stop_on_error,
                output,
                format,
            } => {
                let backfill_config = self.config.pipeline.backfill.clone();
                let mut options = BackfillOptions::from_config(&backfill_config);
                options.dry_run = *dry_run;
                options.priority_filter = tier
                    .as_deref()
                    .map(str::parse::<PriorityTier>)
                    .transpose()
                    .map_err(|e| anyhow!(e))?;
                options.batch_size = batch_size.unwrap_or(options.batch_size);
                options.max_concurrent_projects =
                    max_concurrent.unwrap_or(options.max_concurrent_projects);
                options.max_projects = *max_projects;
                options.min_age_days = min_age_days.unwrap_or(options.min_age_days);
                options.max_age_days = max_age_days.or(options.max_age_days);
                options.continue_on_error = options.continue_on_error && !*stop_on_error;
                let output_dir = output.clone().unwrap_or(backfill_config.output_dir.clone());
                options.output_dir = Some(if output_dir.is_absolute() {
                    output_dir
                } else {
                    self.workspace_root.join(output_dir)
                });

                let service: Arc<dyn GenerationService> = Arc::new(self.coordinator()?);
                let scheduler =
                    BatchBackfillScheduler::new(self.entity_store(), service, backfill_config);
                let summary = scheduler.run(&options).await.context("Backfill run failed")?;
                Ok(match format {
                    OutputFormat::Json => to_json(&summary)?,
                    OutputFormat::Text => format_backfill_summary_text(&summary),
                })
            }
            Commands::Import { file } => {
                let raw = std::fs::read_to_string(file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let dataset: Dataset = serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid dataset in {}", file.display()))?;
                let records = self.store.import(&dataset).context("Import failed")?;
                Ok(format_import_summary(records, file, &self.store_path))
            }
        }
    }
}
