mod app;
mod braille;
mod classify;
mod config;
mod data;
mod logging;
mod map;
mod site;
mod style;
mod ui;

use anyhow::{Context, Result};
use app::App;
use classify::classify;
use clap::{Args, Parser, Subcommand};
use config::Config;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use data::{load_counties, LookupSource, LookupTable};
use ratatui::DefaultTerminal;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use style::YearStyle;

#[derive(Parser)]
#[command(name = "snap-map", version, about = "County-level SNAP participation choropleth")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive terminal map (default)
    View(DataArgs),
    /// Print the classification for a year
    Classify(DataArgs),
    /// Write the map fill layer, filter, paint and legend for a year as JSON
    Style {
        #[command(flatten)]
        data: DataArgs,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render the static HTML pages and per-year style files
    Build,
}

#[derive(Args, Clone, Default)]
struct DataArgs {
    /// Fiscal year (defaults to the latest in the lookup table)
    #[arg(long)]
    year: Option<i32>,
    /// Lookup table URL or path
    #[arg(long)]
    lookup: Option<String>,
    /// County GeoJSON path
    #[arg(long)]
    counties: Option<PathBuf>,
}

impl DataArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(lookup) = &self.lookup {
            config.lookup_url = lookup.clone();
        }
        if let Some(counties) = &self.counties {
            config.counties_path = counties.clone();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::View(DataArgs::default()));

    let (mut config, issue) = Config::load(cli.config.as_deref())?;

    // The viewer owns the terminal, so it logs to a file
    let _guard = match &command {
        Command::View(_) => Some(logging::init_file(&config.log_dir())?),
        _ => {
            logging::init_stderr()?;
            None
        }
    };
    if let Some(issue) = issue {
        issue.log();
    }

    match command {
        Command::View(args) => {
            args.apply(&mut config);
            view(&config, args.year)
        }
        Command::Classify(args) => {
            args.apply(&mut config);
            classify_report(&config, args.year)
        }
        Command::Style { data, output } => {
            data.apply(&mut config);
            export_style(&config, data.year, output)
        }
        Command::Build => {
            let written = site::build(&config)?;
            tracing::info!(files = written.len(), "site build complete");
            Ok(())
        }
    }
}

/// Load the lookup table and resolve the year to show
fn load_year(config: &Config, year: Option<i32>) -> Result<(LookupTable, Option<i32>)> {
    let source = LookupSource::parse(&config.lookup_url);
    let lookup = LookupTable::load(&source)
        .with_context(|| format!("failed to load county lookup from {source}"))?;
    let year = year.or_else(|| lookup.latest_year());
    Ok((lookup, year))
}

fn classify_report(config: &Config, year: Option<i32>) -> Result<()> {
    let (lookup, year) = load_year(config, year)?;
    write_report(&mut std::io::stdout().lock(), config, &lookup, year)
}

fn write_report(
    out: &mut impl Write,
    config: &Config,
    lookup: &LookupTable,
    year: Option<i32>,
) -> Result<()> {
    let years: Vec<String> = lookup.years().iter().map(i32::to_string).collect();
    writeln!(out, "years: {}", years.join(", "))?;
    let Some(year) = year else {
        writeln!(out, "no data")?;
        return Ok(());
    };

    let style = YearStyle::build(&config.style, year, lookup.records(year))?;
    writeln!(out, "FY{year}: {} counties", style.county_count())?;
    let Some(classification) = &style.classification else {
        writeln!(out, "no data")?;
        return Ok(());
    };

    writeln!(
        out,
        "log10 range: {:.2} .. {:.2}",
        classification.scale.min, classification.scale.max
    )?;
    let values: Vec<f64> = lookup.records(year).iter().map(|r| r.value).collect();
    let (stops, labels) = classify(&values, &config.style.colors)?;
    for (i, ((stop, label), count)) in stops
        .iter()
        .zip(&labels)
        .zip(classification.bucket_counts())
        .enumerate()
    {
        writeln!(
            out,
            "  {i}  {}  >={:>6.2}  {label:<20} {count:>6}",
            stop.color, stop.threshold
        )?;
    }
    Ok(())
}

fn export_style(config: &Config, year: Option<i32>, output: Option<PathBuf>) -> Result<()> {
    let (lookup, year) = load_year(config, year)?;
    let year = year.context("lookup table has no years")?;

    let style = YearStyle::build(&config.style, year, lookup.records(year))?;
    let json = simd_json::to_string_pretty(&style.export(&config.style))?;

    match output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(year, path = %path.display(), "wrote year style");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn view(config: &Config, year: Option<i32>) -> Result<()> {
    // Fatal when the lookup cannot be fetched; nothing to draw without it
    let (lookup, year) = load_year(config, year)?;

    let counties = if config.counties_path.exists() {
        load_counties(&config.counties_path)?
    } else {
        tracing::warn!(path = %config.counties_path.display(), "county geometry not found");
        Vec::new()
    };

    let mut terminal = ratatui::init();
    terminal.clear()?;
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, config, lookup, counties, year);

    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

/// Handle mouse events for year selection, panning and zooming
fn handle_mouse(app: &mut App, mouse: MouseEvent) -> Result<()> {
    app.set_mouse_pos(mouse.column, mouse.row);

    match mouse.kind {
        MouseEventKind::ScrollUp => app.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.zoom_out_at(mouse.column, mouse.row),
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),
        MouseEventKind::Down(MouseButton::Left) if mouse.row == 0 => {
            if let Some(year) = ui::year_at(&app.years, mouse.column) {
                app.select_year(year)?;
            }
        }
        MouseEventKind::Down(MouseButton::Left) => {
            app.last_mouse = Some((mouse.column, mouse.row));
        }
        MouseEventKind::Drag(MouseButton::Left) => app.handle_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.end_drag(),
        _ => {}
    }
    Ok(())
}

fn run(
    terminal: &mut DefaultTerminal,
    config: &Config,
    lookup: LookupTable,
    counties: Vec<data::County>,
    year: Option<i32>,
) -> Result<()> {
    let size = terminal.size()?;
    let mut app = App::new(
        size.width as usize,
        size.height as usize,
        lookup,
        counties,
        config.style.clone(),
    );
    if let Some(year) = year {
        app.select_year(year)?;
    }
    tracing::info!(year = ?app.active_year(), "map ready");

    loop {
        terminal.draw(|frame| ui::render(frame, &app))?;

        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),

                    // Year controls
                    KeyCode::Right | KeyCode::Char(']') => app.next_year()?,
                    KeyCode::Left | KeyCode::Char('[') => app.prev_year()?,
                    KeyCode::Char(c @ '1'..='9') => {
                        app.select_index(c as usize - '1' as usize)?;
                    }

                    // Pan with hjkl
                    KeyCode::Char('h') => app.pan(-10, 0),
                    KeyCode::Char('l') => app.pan(10, 0),
                    KeyCode::Up | KeyCode::Char('k') => app.pan(0, -6),
                    KeyCode::Down | KeyCode::Char('j') => app.pan(0, 6),

                    KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
                    KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

                    KeyCode::Char('b') | KeyCode::Char('B') => app.renderer.toggle_outlines(),
                    KeyCode::Char('f') | KeyCode::Char('F') => app.renderer.toggle_fill(),
                    KeyCode::Char('r') | KeyCode::Char('0') => app.reset_view(),

                    _ => {}
                },
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse)?,
                Event::Resize(width, height) => app.resize(width as usize, height as usize),
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup() -> LookupTable {
        let mut json = br#"{"2023": {}, "2024": {"6037": 100000, "1001": 10, "36061": 1000}}"#.to_vec();
        LookupTable::from_slice(&mut json).unwrap()
    }

    fn report(year: Option<i32>) -> String {
        let mut out = Vec::new();
        write_report(&mut out, &Config::default(), &lookup(), year).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_report_lists_buckets() {
        let text = report(Some(2024));
        assert!(text.starts_with("years: 2023, 2024\nFY2024: 3 counties\n"));
        assert!(text.contains("log10 range: 1.00 .. 5.00"));
        let buckets: Vec<&str> = text.lines().filter(|l| l.starts_with("  ")).collect();
        assert_eq!(buckets.len(), 5);
        assert!(buckets[0].contains("#e0938d") && buckets[0].contains("10–100"));
        assert!(buckets[0].ends_with(" 1"));
        assert!(buckets[4].contains(">100,000") && buckets[4].ends_with(" 1"));
    }

    #[test]
    fn test_report_empty_year() {
        assert!(report(Some(2023)).ends_with("FY2023: 0 counties\nno data\n"));
        assert!(report(None).ends_with("no data\n"));
    }
}
