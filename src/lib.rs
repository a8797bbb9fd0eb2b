// src/lib.rs

//! Declarative, idempotent system provisioning.
//!
//! Describe units of system state as [`Resource`]s, register them in a
//! [`ResourceGraph`], gate them on each other's [`Signal`]s, and
//! materialize the graph: every resource runs as soon as its requirements
//! are observed, and the first failure cancels the rest.

pub mod cli;
pub mod config;
pub mod context;
pub mod dag;
pub mod errors;
pub mod logging;
pub mod resource;
pub mod resources;
pub mod signal;
mod sync;
pub mod types;

use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::resources::{CmdResource, DirectoryResource, FileResource};

pub use crate::context::Context;
pub use crate::dag::{DependencySetter, MaterializeOptions, ResourceGraph};
pub use crate::errors::StatecraftError;
pub use crate::resource::{BoxFuture, Resource, SkipCheck, SkippingWrapper};
pub use crate::signal::Signal;
pub use crate::types::ResourceId;

const APP_CONFIG: &str = "[server]\nlisten = \"127.0.0.1:8080\"\nworkers = 4\n";

/// High-level entry point used by `main.rs`.
///
/// Builds the provisioning graph under `args.root` and materializes it with
/// the options from `cfg`. Ctrl-C cancels the run.
pub async fn run(args: CliArgs, cfg: ConfigFile) -> Result<()> {
    let graph = provisioning_graph(&args.root);
    let options = cfg.materialize_options();

    if args.dry_run {
        graph.validate_with(&options)?;
        print_dry_run(&graph, &options);
        return Ok(());
    }

    let ctx = Context::background();
    {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("interrupt received; canceling materialization");
            ctx.cancel();
        });
    }

    info!(root = %args.root.display(), "provisioning");
    graph.materialize_with(&ctx, &options).await?;
    Ok(())
}

/// A small application layout under `root`.
///
/// - `layout`: the root directory, then `conf/` and `data/` once it is in
///   place.
/// - `config`: `conf/app.toml`, plus a reload marker that is only touched
///   when the file actually changed.
/// - `report`: lists `conf/` after the config graph finished, whatever
///   happened to it.
pub fn provisioning_graph(root: &Path) -> ResourceGraph {
    let conf_dir = root.join("conf");

    let mut layout = ResourceGraph::new();
    let base = layout.register("root", DirectoryResource::new(root));
    let mut under_base = layout.when(base, &[Signal::Evaluated]);
    under_base.do_("conf", DirectoryResource::new(&conf_dir));
    under_base.do_("data", DirectoryResource::new(root.join("data")).mode(0o700));

    let mut config = ResourceGraph::new();
    let app = config.register(
        "app.toml",
        FileResource::new(conf_dir.join("app.toml"), APP_CONFIG),
    );
    config.when(app, &[Signal::Materialized]).do_(
        "reload",
        CmdResource::new("touch").arg(conf_dir.join(".reloaded").display().to_string()),
    );

    let mut graph = ResourceGraph::new();
    let layout = graph.register("layout", layout);
    let config = graph
        .when(layout, &[Signal::Evaluated])
        .do_("config", config);
    graph.when(config, &[]).do_(
        "report",
        CmdResource::new("ls").arg("-la").arg(conf_dir.display().to_string()),
    );

    debug!(resources = graph.len(), "built provisioning graph");
    graph
}

fn print_dry_run(graph: &ResourceGraph, options: &MaterializeOptions) {
    println!("statecraft dry-run");
    println!(
        "  materialize.reject_duplicate_names = {}",
        options.reject_duplicate_names
    );
    println!("  materialize.detect_cycles = {}", options.detect_cycles);
    if let Some(timeout) = options.timeout {
        println!("  materialize.timeout = {timeout:?}");
    }
    println!();

    println!("resources ({}):", graph.len());
    for id in graph.resources() {
        println!("  - {}", graph.describe(id));
        for upstream in graph.dependencies_of(id) {
            let signals = graph
                .signals_between(upstream, id)
                .map(signal::join_signals)
                .unwrap_or_default();
            println!("      after {}: {signals}", graph.describe(upstream));
        }
    }
    println!();
    println!("{graph}");

    debug!("dry-run complete (nothing materialized)");
}
