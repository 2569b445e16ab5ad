use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use picture_cut::{CancelToken, Cli, Session, SessionEvent};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut session = Session::new();

    // Load the reference template
    session
        .select_template(&cli.template)
        .with_context(|| format!("Failed to load template: {:?}", cli.template))?;

    // Fit the cut line to the template
    let (start, end) = cli.line;
    let state = session
        .draw_line(start, end)
        .context("Failed to set cut line")?;
    if let Some(fitted) = state.line() {
        let line = fitted.line();
        match fitted.orientation() {
            Some(orientation) => eprintln!(
                "Cut line snapped {:?}: ({:.1}, {:.1}) -> ({:.1}, {:.1})",
                orientation, line.p1.x, line.p1.y, line.p2.x, line.p2.y
            ),
            None => eprintln!(
                "Cut line too short to snap, using it as drawn: ({:.1}, {:.1}) -> ({:.1}, {:.1})",
                line.p1.x, line.p1.y, line.p2.x, line.p2.y
            ),
        }
    }

    // Resolve the side to keep
    let event = match (cli.keep.keep_point, cli.keep.side) {
        (Some(point), _) => SessionEvent::SidePicked(point),
        (None, Some(side)) => SessionEvent::SideChosen(side.into()),
        (None, None) => anyhow::bail!("Either --keep-point or --side is required"),
    };
    let state = session.handle(event).context("Failed to select side")?;
    if let Some(spec) = state.cut_spec() {
        eprintln!("Keeping the {} side", spec.keep_side);
    }

    // Cut every image under the root
    let result = session
        .run_batch(&cli.root, cli.batch_options(), CancelToken::new())
        .with_context(|| format!("Failed to process folder: {:?}", cli.root))?;

    eprintln!();
    eprintln!("{}", result);
    if cli.dry_run {
        eprintln!("Dry run: no files were modified");
    }

    Ok(())
}
