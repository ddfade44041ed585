// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use std::env;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use charges_dashboard::{Dashboard, DashboardConfig, DashboardView, FileSource};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() > 1 && args[1] == "summary" {
        init_tracing(true);
        run_summary()?;
    } else {
        // The alternate screen owns the terminal; errors go to the status bar
        init_tracing(false);
        run_ui_mode()?;
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "off" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_dashboard() -> Result<(Dashboard, FileSource)> {
    let config = DashboardConfig::default();
    let source = FileSource::new(config.dataset_path.clone());

    let mut dashboard = Dashboard::new(config);
    dashboard
        .refresh(&source)
        .with_context(|| format!("Failed to build dashboard from {}", source.path().display()))?;

    Ok((dashboard, source))
}

fn print_view(view: &DashboardView) {
    println!("\n📊 Metrics");
    println!("   {}", view.metrics.summary());

    println!("\n🗺️  Mean charges by region");
    for group in &view.groups {
        println!("   {:<12} {:>12.2}  ({} records)", group.key, group.mean_value, group.count);
    }

    println!("\n📈 Mean charges by age");
    for bin in &view.age_bins.bins {
        println!("   {:<8} {:>12.2}  ({} records)", bin.label(), bin.mean_value, bin.count);
    }
    if view.age_bins.excluded > 0 {
        println!("   {} records outside every age band", view.age_bins.excluded);
    }

    if !view.snapshot.warnings.is_empty() {
        println!("\n⚠️  {} field warnings", view.snapshot.warnings.len());
        for warning in &view.snapshot.warnings {
            println!("   {}", warning.describe());
        }
    }
}

fn run_summary() -> Result<()> {
    println!("🩺 Insurance Charges Dashboard - Summary");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let (dashboard, source) = load_dashboard()?;
    let view = dashboard
        .view()
        .context("Dashboard has no view after a successful refresh")?;

    println!("✓ Loaded {} records from {}", view.metrics.total_count, source.path().display());
    print_view(view);

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{}", serde_json::to_string_pretty(&view.metrics)?);

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode() -> Result<()> {
    println!("🖥️  Loading Insurance Charges Dashboard...\n");

    let (dashboard, source) = load_dashboard()?;

    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(dashboard, source);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode() -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use web UI: cargo run --bin charges-server --features server");
    std::process::exit(1);
}
