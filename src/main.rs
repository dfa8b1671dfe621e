//! Entry point for the RuEns application.
//! Parses the CLI, opens the store and runs one incremental ensemble pass.

use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use ru_ens::cli::Args;
use ru_ens::config::RunConfig;
use ru_ens::orchestrator::{Orchestrator, RunOutcome};
use ru_ens::parallel::get_parallel_info;
use ru_ens::plot::SvgHovmollerRenderer;
use ru_ens::processor::NetcdfEnsembleProcessor;
use ru_ens::store::LocalRepository;
use ru_ens::time_window::DISPLAY_FORMAT;
use ru_ens::variables::default_variables;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    if args.list_variables {
        let (var3d, var2d) = default_variables();
        println!("3D variables: {}", var3d.join(", "));
        println!("2D variables: {}", var2d.join(", "));
        return Ok(());
    }

    if args.history {
        return print_history(&args).await;
    }

    let config = RunConfig::from_args(&args).context("invalid run configuration")?;

    println!("Processing data from {}", config.window);
    println!("3D variables: {:?}", config.variables.var3d());
    println!("2D variables: {:?}", config.variables.var2d());
    if args.verbose {
        get_parallel_info().print_info();
    }

    let store = LocalRepository::open_or_create(&config.store_path)
        .await
        .with_context(|| format!("opening store {}", config.store_path.display()))?;
    let processor = NetcdfEnsembleProcessor::new(&config.data_root);
    let renderer = SvgHovmollerRenderer::new(&config.plot_dir).with_level(config.plot_level);
    println!("Store: {}", store.path().display());
    println!("Ensemble data: {}\n", processor.data_root().display());

    let progress = |line: &str| println!("{line}");
    let outcome = Orchestrator::new(&store, &processor, &renderer)
        .with_progress(&progress)
        .run(&config.plan())
        .await
        .context("ensemble run failed")?;

    match outcome {
        RunOutcome::NothingNew { skipped } => {
            tracing::debug!(skipped, "store already up to date");
        }
        RunOutcome::Committed {
            commit,
            new_timestamps,
            plots,
        } => {
            println!(
                "\n✅ Saved {new_timestamps} new timestamps as snapshot {}: {}",
                commit.id.short(),
                commit.message
            );
            for plot in &plots {
                println!("   📈 {}", plot.display());
            }
            println!("\nDone! Plots saved in {}", renderer.plot_dir().display());
        }
    }

    Ok(())
}

async fn print_history(args: &Args) -> anyhow::Result<()> {
    let store = LocalRepository::open(&args.store)
        .await
        .with_context(|| format!("opening store {}", args.store.display()))?;

    let mut ancestry = store.ancestry();
    while let Some(record) = ancestry.next().await {
        let record = record?;
        println!(
            "{}  {}  {}",
            record.id.short(),
            record.written_at.naive_utc().format(DISPLAY_FORMAT),
            record.message
        );
    }
    Ok(())
}
