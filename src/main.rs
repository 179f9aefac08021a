use anyhow::{Context, Result};
use bias_pipeline::cli::commands::{
    BackendArg, FetchCommand, FindModelCommand, JobCommand, RenderConfigCommand, RunCommand,
    UploadCommand, ValidateCommand,
};
use bias_pipeline::cli::output::*;
use bias_pipeline::cli::{Cli, Command};
use bias_pipeline::cloud::{
    ObjectStorage, PipelineService, ProcessingService, SimulatedPipelineService,
    SimulatedProcessingService,
};
use bias_pipeline::core::config::WorkflowConfig;
use bias_pipeline::core::{
    summarize_analysis, ContentType, DatasetLocation, JobHandle, JobName, PipelineExecution, S3Uri,
};
use bias_pipeline::execution::{
    BiasJobConfigurator, BiasJobRunner, Workflow, WorkflowEvent, WorkflowOutcome,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_workflow(&cli, cmd).await?,
        Command::Upload(cmd) => upload_dataset(&cli, cmd).await?,
        Command::FindModel(cmd) => find_model(&cli, cmd).await?,
        Command::RenderConfig(cmd) => render_config(cmd)?,
        Command::Status(cmd) => show_status(&cli, cmd).await?,
        Command::Wait(cmd) => wait_for_job(&cli, cmd).await?,
        Command::Fetch(cmd) => fetch_report(&cli, cmd).await?,
        Command::Validate(cmd) => validate_config(cmd)?,
    }

    Ok(())
}

/// Services a command talks to
struct Backend {
    storage: ObjectStorage,
    pipelines: Arc<dyn PipelineService>,
    processing: Arc<dyn ProcessingService>,
}

async fn connect(cli: &Cli, bucket: &str, region: Option<&str>) -> Result<Backend> {
    match cli.backend {
        BackendArg::Simulated => {
            let storage = ObjectStorage::local(bucket, &cli.sim_root)
                .context("Failed to open simulated bucket")?;
            let pipelines = load_recorded_pipelines(&cli.sim_root.join("pipelines"))?;
            let processing = SimulatedProcessingService::new(storage.clone())
                .with_jobs_dir(cli.sim_root.join("jobs"));
            Ok(Backend {
                storage,
                pipelines: Arc::new(pipelines),
                processing: Arc::new(processing),
            })
        }
        BackendArg::Sagemaker => sagemaker_backend(Some(bucket), region).await,
    }
}

#[cfg(feature = "sagemaker")]
async fn sagemaker_backend(bucket: Option<&str>, region: Option<&str>) -> Result<Backend> {
    let client = Arc::new(bias_pipeline::cloud::SageMakerClient::from_env(region).await);
    // Following a job needs no bucket access
    let storage = match bucket {
        Some(bucket) => ObjectStorage::s3(bucket, region).context("Failed to configure S3 access")?,
        None => ObjectStorage::in_memory("unused"),
    };
    Ok(Backend {
        storage,
        pipelines: client.clone(),
        processing: client,
    })
}

#[cfg(not(feature = "sagemaker"))]
async fn sagemaker_backend(_bucket: Option<&str>, _region: Option<&str>) -> Result<Backend> {
    anyhow::bail!("This build has no SageMaker support; rebuild with `--features sagemaker`")
}

/// Recorded pipeline runs, one `<pipeline name>.json` per pipeline
fn load_recorded_pipelines(dir: &Path) -> Result<SimulatedPipelineService> {
    let mut service = SimulatedPipelineService::new();
    if !dir.is_dir() {
        return Ok(service);
    }

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let Some(pipeline) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let execution: PipelineExecution = serde_json::from_str(&content)
            .with_context(|| format!("Invalid recorded execution {}", path.display()))?;
        service = service.with_recorded(pipeline, execution);
    }
    Ok(service)
}

fn load_config(path: &Path) -> Result<WorkflowConfig> {
    WorkflowConfig::from_file(path)
        .with_context(|| format!("Failed to load workflow config {}", path.display()))
}

async fn workflow_for(cli: &Cli, config: WorkflowConfig) -> Result<Workflow> {
    let bucket = config.dataset.destination.bucket().to_string();
    let backend = connect(cli, &bucket, config.region.as_deref()).await?;
    Ok(Workflow::new(
        config,
        backend.storage,
        backend.pipelines,
        backend.processing,
    ))
}

/// Runner for commands that follow an already submitted job
///
/// Simulated jobs are read back from `<sim-root>/jobs`, which also names
/// the bucket their artifacts go to.
async fn job_runner(cli: &Cli, job: &JobName, region: Option<&str>) -> Result<BiasJobRunner> {
    let (storage, processing): (ObjectStorage, Arc<dyn ProcessingService>) = match cli.backend {
        BackendArg::Simulated => {
            let jobs_dir = cli.sim_root.join("jobs");
            let record = SimulatedProcessingService::stored_record(&jobs_dir, job)
                .await?
                .with_context(|| {
                    format!("No simulated job {} under {}", job, jobs_dir.display())
                })?;
            let storage = ObjectStorage::local(record.manifest.output.bucket(), &cli.sim_root)
                .context("Failed to open simulated bucket")?;
            let processing =
                SimulatedProcessingService::new(storage.clone()).with_jobs_dir(jobs_dir);
            (storage, Arc::new(processing))
        }
        BackendArg::Sagemaker => {
            let backend = sagemaker_backend(None, region).await?;
            (backend.storage, backend.processing)
        }
    };
    Ok(BiasJobRunner::new(processing, storage, ""))
}

fn parse_job_name(name: &str) -> Result<JobName> {
    JobName::parse(name).map_err(anyhow::Error::msg)
}

async fn run_workflow(cli: &Cli, cmd: &RunCommand) -> Result<()> {
    let mut config = load_config(&cmd.file)?;
    cmd.apply(&mut config);

    println!("{} Loaded workflow: {}", INFO, style(&config.name).bold());
    let name = config.name.clone();
    let mut workflow = workflow_for(cli, config).await?;

    // Status polls update the spinner, everything else gets its own line
    let spinner = create_spinner("Starting");
    let progress = spinner.clone();
    workflow.add_event_handler(move |event| match &event {
        WorkflowEvent::PipelinePolled { .. } | WorkflowEvent::JobPolled { .. } => {
            progress.set_message(format_workflow_event(&event))
        }
        _ => progress.println(format_workflow_event(&event)),
    });

    let result = workflow.run().await;
    spinner.finish_and_clear();

    match result {
        Ok(outcome) => {
            if let WorkflowOutcome::Completed { report, .. } = &outcome {
                println!("\n{} Report artifacts:", INFO);
                println!("{}", format_artifacts(report));
                if let Some(path) = report.analysis_path() {
                    print_metrics(path);
                }
            }
            println!("\n{}", format_outcome(&outcome));
            Ok(())
        }
        Err(e) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&name).bold(),
                style("failed").red()
            );
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn print_metrics(analysis: &Path) {
    let summary = std::fs::read_to_string(analysis)
        .map_err(anyhow::Error::from)
        .and_then(|json| summarize_analysis(&json).map_err(anyhow::Error::from));
    match summary {
        Ok(metrics) => {
            println!("\n{} Bias metrics:", INFO);
            println!("{}", format_metric_table(&metrics));
        }
        Err(e) => warn!("Could not summarize {}: {}", analysis.display(), e),
    }
}

async fn upload_dataset(cli: &Cli, cmd: &UploadCommand) -> Result<()> {
    let config = load_config(&cmd.file)?;
    let workflow = workflow_for(cli, config).await?;
    let dataset = workflow.publish_dataset().await?;
    println!("{} Dataset published to {}", CHECK, style(&dataset.uri).cyan());
    Ok(())
}

async fn find_model(cli: &Cli, cmd: &FindModelCommand) -> Result<()> {
    let config = load_config(&cmd.file)?;
    let pipeline = config
        .pipeline
        .as_ref()
        .map(|p| p.name.clone())
        .context("The workflow config names no pipeline")?;

    let workflow = workflow_for(cli, config).await?;
    let spinner = create_spinner(format!("Waiting for the latest run of {}", pipeline));
    let model = workflow.inspector().find_model(&pipeline).await;
    spinner.finish_and_clear();

    match model? {
        Some(model) => {
            println!("{} Model: {}", CHECK, style(model.name()).bold());
            println!("  ARN: {}", style(&model.arn).dim());
        }
        None => println!("{} The latest run of {} created no model", WARN, style(&pipeline).bold()),
    }
    Ok(())
}

fn render_config(cmd: &RenderConfigCommand) -> Result<()> {
    let config = load_config(&cmd.file)?;
    let uri = match &cmd.dataset_uri {
        Some(uri) => uri.parse::<S3Uri>().map_err(anyhow::Error::msg)?,
        None => {
            let file_name = config
                .dataset
                .local_path
                .file_name()
                .and_then(|name| name.to_str())
                .context("dataset.local_path does not name a file")?;
            config.dataset.destination.join(file_name)
        }
    };
    let dataset = DatasetLocation {
        uri,
        content_type: config.dataset.content_type,
    };

    let descriptors = BiasJobConfigurator::new(&config).configure(&dataset, &cmd.model_name)?;
    println!("{}", descriptors.analysis.to_json()?);
    Ok(())
}

async fn show_status(cli: &Cli, cmd: &JobCommand) -> Result<()> {
    let job = parse_job_name(&cmd.job)?;
    let runner = job_runner(cli, &job, cmd.region.as_deref()).await?;
    let record = runner.status(&job).await?;
    println!("{} Job status", INFO);
    println!("{}", format_job_record(&record));
    Ok(())
}

async fn wait_for_job(cli: &Cli, cmd: &JobCommand) -> Result<()> {
    let job = parse_job_name(&cmd.job)?;
    let runner = job_runner(cli, &job, cmd.region.as_deref()).await?;
    let record = runner.status(&job).await?;
    let handle = JobHandle::from(&record);

    let spinner = create_spinner(format!("Waiting for {}", handle.name));
    let progress = spinner.clone();
    let result = runner
        .wait_with(&handle, |record| {
            progress.set_message(format!("{} is {}", record.name, format_job_status(record.status)))
        })
        .await;
    spinner.finish_and_clear();

    let record = result?;
    println!("{} Job finished", CHECK);
    println!("{}", format_job_record(&record));
    Ok(())
}

async fn fetch_report(cli: &Cli, cmd: &FetchCommand) -> Result<()> {
    let config = load_config(&cmd.file)?;
    let output = match &cmd.job {
        Some(job) => {
            let job = parse_job_name(job)?;
            let runner = job_runner(cli, &job, config.region.as_deref()).await?;
            runner.status(&job).await?.manifest.output
        }
        None => config.job.output.clone(),
    };
    let local_dir = cmd
        .output_dir
        .clone()
        .unwrap_or_else(|| config.report.local_dir.clone());

    let workflow = workflow_for(cli, config).await?;
    let report = workflow.retriever().download(&output, &local_dir).await?;

    println!("{} Downloaded {} to {}", CHECK, style(&output).cyan(), style(local_dir.display()).bold());
    println!("{}", format_artifacts(&report));
    if let Some(path) = report.analysis_path() {
        print_metrics(path);
    }
    Ok(())
}

fn validate_config(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating workflow...", INFO);

    match WorkflowConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Workflow configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            match (&config.model.name, &config.pipeline) {
                (Some(model), _) => println!("  Model: {}", style(model).cyan()),
                (None, Some(pipeline)) => println!(
                    "  Model: from step {} of {}",
                    style(&pipeline.model_step).cyan(),
                    style(&pipeline.name).cyan()
                ),
                (None, None) => {}
            }
            println!("  Facet: {}", style(&config.bias.facet).cyan());
            println!("  Output: {}", style(&config.job.output).cyan());
            if config.dataset.content_type != ContentType::JsonLines {
                println!("  Dataset type: {}", style(config.dataset.content_type).cyan());
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}
