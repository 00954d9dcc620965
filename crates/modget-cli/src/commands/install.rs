//! `modget install` command implementation.

use miette::{IntoDiagnostic, Result};
use modget_core::{
    build_plan, install_plan, HostModuleSpec, InstallConfig, InstalledModule, ModuleSpec, Plan,
    ProgressSink, RegistryClient,
};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Parsed `install` arguments.
#[derive(Debug, Clone)]
pub struct InstallArgs {
    pub specs: Vec<String>,
    pub source: Option<String>,
    pub destination: Option<PathBuf>,
    pub cache: Option<PathBuf>,
    pub prerelease: bool,
    pub update: bool,
    pub plan_only: bool,
}

/// One planned module for JSON output.
#[derive(Serialize)]
struct PlannedModuleInfo {
    #[serde(flatten)]
    spec: HostModuleSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    download_uri: Option<String>,
}

/// One installed module for JSON output.
#[derive(Serialize)]
struct InstalledModuleInfo {
    name: String,
    version: String,
    from_cache: bool,
    path: String,
}

/// Install result for JSON output (locked format: `{ ok, planned, ... }`).
#[derive(Serialize, Default)]
struct InstallCommandResult {
    ok: bool,
    planned: Vec<PlannedModuleInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    satisfied_locally: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    installed: Vec<InstalledModuleInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Progress sink printing one line per lifecycle event in text mode.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn resolved(&self, spec: &ModuleSpec) {
        println!("  plan      {spec}");
    }

    fn downloaded(&self, spec: &ModuleSpec, from_cache: bool) {
        let verb = if from_cache { "cached" } else { "fetched" };
        println!("  {verb:<9} {spec}");
    }

    fn extracted(&self, spec: &ModuleSpec) {
        println!("  installed {spec}");
    }
}

/// Run the install command.
pub fn run(args: InstallArgs, json: bool) -> Result<()> {
    // Normalise user input before touching the network.
    let mut requests = Vec::with_capacity(args.specs.len());
    for raw in &args.specs {
        match ModuleSpec::parse(raw) {
            Ok(spec) => requests.push(spec),
            Err(e) => {
                emit_failure(json, format!("invalid module spec '{raw}': {e}"));
                std::process::exit(2);
            }
        }
    }

    let mut config = InstallConfig::default()
        .with_prerelease(args.prerelease)
        .with_update(args.update);
    if let Some(source) = args.source {
        config = config.with_source(source);
    }
    if let Some(destination) = args.destination {
        config = config.with_destination(destination);
    }
    if let Some(cache) = args.cache {
        config = config.with_cache_dir(cache);
    }

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let outcome = runtime.block_on(run_async(requests, config, args.plan_only, json));

    match outcome {
        Ok(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result).unwrap());
            }
            Ok(())
        }
        Err(message) => {
            emit_failure(json, message);
            std::process::exit(1);
        }
    }
}

async fn run_async(
    requests: Vec<ModuleSpec>,
    config: InstallConfig,
    plan_only: bool,
    json: bool,
) -> std::result::Result<InstallCommandResult, String> {
    let registry = RegistryClient::new(&config.source).map_err(|e| e.to_string())?;

    // One token for the whole resolve+install run; Ctrl-C trips it.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    let console = ConsoleProgress;
    let silent = modget_core::NoProgress;
    let progress: &dyn ProgressSink = if json { &silent } else { &console };

    info!(source = %config.source, "resolving {} module spec(s)", requests.len());
    let plan = build_plan(&registry, &requests, &config, &cancel, progress)
        .await
        .map_err(|e| e.to_string())?;

    if !json {
        print_plan_summary(&plan);
    }

    let installed = if plan_only {
        Vec::new()
    } else {
        install_plan(&registry, &plan.modules, &config, &cancel, progress)
            .await
            .map_err(|e| e.to_string())?
    };

    Ok(to_result(&plan, &installed))
}

fn print_plan_summary(plan: &Plan) {
    for spec in &plan.satisfied_locally {
        println!("  local     {spec}");
    }
    if plan.modules.is_empty() {
        println!("Nothing to install");
    } else {
        println!(
            "Installing {} module(s)",
            plan.modules.len()
        );
    }
}

fn to_result(plan: &Plan, installed: &[InstalledModule]) -> InstallCommandResult {
    InstallCommandResult {
        ok: true,
        planned: plan
            .modules
            .iter()
            .map(|spec| PlannedModuleInfo {
                spec: spec.to_host_spec(),
                download_uri: spec.download_uri().map(ToString::to_string),
            })
            .collect(),
        satisfied_locally: plan
            .satisfied_locally
            .iter()
            .map(ModuleSpec::canonical)
            .collect(),
        installed: installed
            .iter()
            .map(|module| InstalledModuleInfo {
                name: module.spec.name().to_string(),
                version: module
                    .spec
                    .required_version()
                    .map(modget_core::version::folder_name)
                    .unwrap_or_default(),
                from_cache: module.from_cache,
                path: module.destination.display().to_string(),
            })
            .collect(),
        error: None,
    }
}

fn emit_failure(json: bool, message: String) {
    if json {
        let result = InstallCommandResult {
            ok: false,
            error: Some(message),
            ..InstallCommandResult::default()
        };
        println!("{}", serde_json::to_string_pretty(&result).unwrap());
    } else {
        eprintln!("error: {message}");
    }
}
