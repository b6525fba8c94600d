use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use infraflow::assembly::App;
use infraflow::config::AppConfig;
use infraflow::errors::PipelineValidationError;
use infraflow::observability::{init_logging, LogFormat, LoggingTracingEmitter};
use infraflow::pipeline::ExecutionPlan;
use infraflow::reference;
use std::sync::Arc;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "infraflow")]
#[command(version = VERSION)]
#[command(about = "Synthesize delivery pipelines for disposable test infrastructure")]
struct Cli {
    /// JSON configuration file; INFRAFLOW_* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log line format: plain or json
    #[arg(long, global = true, default_value = "plain")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write every stack template and a manifest
    Synth {
        /// Output directory
        #[arg(long, default_value = "cdk.out")]
        out: PathBuf,
    },
    /// Compose and validate without writing anything
    Validate,
    /// Print the stage and run-order layout
    Plan {
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::default(),
    }
    .with_env_overrides();

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn build_app(config: &AppConfig) -> Result<App> {
    let app = reference::app(config).context("Pipeline composition failed")?;
    Ok(app.with_emitter(Arc::new(LoggingTracingEmitter)))
}

fn synth(config: &AppConfig, out: &Path) -> Result<String> {
    let manifest = build_app(config)?
        .synth(out)
        .with_context(|| format!("Synthesis into {} failed", out.display()))?;

    let mut lines = Vec::with_capacity(manifest.stacks.len());
    for (name, entry) in &manifest.stacks {
        lines.push(format!("{name}\t{}\t{}", entry.template_file, entry.digest));
    }
    Ok(lines.join("\n"))
}

fn validate(config: &AppConfig) -> Result<String> {
    let assembly = build_app(config)?
        .synthesize()
        .context("Synthesis failed")?;
    Ok(format!("{} stacks valid", assembly.stacks.len()))
}

fn plan(config: &AppConfig, json: bool) -> Result<String> {
    let app = build_app(config)?;
    let mut rendered = Vec::new();

    for (stack, pipeline) in app.pipelines() {
        let plan = ExecutionPlan::from_pipeline(pipeline);
        if json {
            rendered.push(serde_json::to_string_pretty(&plan).context("Failed to render plan")?);
        } else {
            rendered.push(format!("{stack} ({})\n{plan}", pipeline.name()));
        }
    }
    Ok(rendered.join("\n"))
}

fn run(cli: &Cli) -> Result<String> {
    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(pipeline = %config.pipeline_name, command = ?cli.command, "Running command");

    match &cli.command {
        Commands::Synth { out } => synth(&config, out),
        Commands::Validate => validate(&config),
        Commands::Plan { json } => plan(&config, *json),
    }
}

/// Formats a failure for the terminal, surfacing the contract code and fix
/// hint of any validation error in the cause chain.
fn render_error(err: &anyhow::Error, format: LogFormat) -> String {
    let validation = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<PipelineValidationError>());

    match format {
        LogFormat::Json => serde_json::json!({
            "error": format!("{err:#}"),
            "validation": validation,
            "hint": validation.and_then(PipelineValidationError::hint),
        })
        .to_string(),
        LogFormat::Plain => {
            let mut lines = vec![format!("Error: {err:#}")];
            if let Some(validation) = validation {
                if let Some(code) = validation.code() {
                    lines.push(format!("  code: {code}"));
                }
                if let Some(hint) = validation.hint() {
                    lines.push(format!("  hint: {hint}"));
                }
            }
            lines.join("\n")
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", render_error(&err, cli.log_format));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infraflow::errors::{ContractSuggestions, MALFORMED_ID};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("infraflow").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = parse(&["plan", "--log-format", "json", "--config", "app.json"]);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("app.json")));
        assert!(matches!(cli.command, Commands::Plan { json: false }));
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        assert!(Cli::try_parse_from(["infraflow", "--log-format", "xml", "validate"]).is_err());
    }

    #[test]
    fn test_synth_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let cli = parse(&["synth", "--out", out.to_str().unwrap()]);

        let summary = run(&cli).unwrap();
        assert!(summary.contains("TestPipelineStack\tTestPipelineStack.template.json"));
        assert!(out.join("manifest.json").exists());
        assert!(out.join("TestResourcesStack.template.json").exists());
    }

    #[test]
    fn test_plan_lists_waves() {
        let text = run(&parse(&["plan"])).unwrap();
        assert!(text.contains("3. Test"));
        assert!(text.contains("[1] CreateTestResources"));
    }

    #[test]
    fn test_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        std::fs::write(&path, r#"{"require_approval_before_delete": true}"#).unwrap();

        let cli = parse(&["plan", "--config", path.to_str().unwrap()]);
        let text = run(&cli).unwrap();
        assert!(text.contains("[3] ApproveDelete"));
    }

    fn invalid_config_run(format: &str) -> String {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        std::fs::write(&path, r#"{"environment": {"account": "123", "region": "ap-south-1"}}"#)
            .unwrap();

        let cli = parse(&["validate", "--log-format", format, "--config", path.to_str().unwrap()]);
        let err = run(&cli).unwrap_err();
        render_error(&err, cli.log_format)
    }

    #[test]
    fn test_validation_error_shows_code_and_hint() {
        let text = invalid_config_run("plain");
        assert!(text.starts_with("Error: Invalid configuration"));
        assert!(text.contains("  code: CONTRACT-005-MALFORMED_ID"));
        assert!(text.contains(&format!(
            "  hint: {}",
            ContractSuggestions::get(MALFORMED_ID).unwrap()
        )));
    }

    #[test]
    fn test_validation_error_as_json() {
        let rendered: serde_json::Value =
            serde_json::from_str(&invalid_config_run("json")).unwrap();
        assert_eq!(rendered["validation"]["error_info"]["code"], MALFORMED_ID);
        assert_eq!(rendered["validation"]["error_info"]["context"]["kind"], "account");
        assert_eq!(rendered["hint"], ContractSuggestions::get(MALFORMED_ID).unwrap());
    }

    #[test]
    fn test_other_errors_have_no_hint() {
        let err = anyhow::anyhow!("disk full").context("Synthesis into out failed");
        assert_eq!(
            render_error(&err, LogFormat::Plain),
            "Error: Synthesis into out failed: disk full"
        );
    }

    #[test]
    fn test_missing_config_file() {
        let cli = parse(&["validate", "--config", "/nonexistent/infraflow.json"]);
        let err = run(&cli).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }
}
