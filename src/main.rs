use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    Terminal,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use weatherwatch::{
    events, ui, App, ArchiveSource, FetchCoordinator, Settings, SubscriptionManager, TcpFeed,
    TimeSpanController, TimeSpanKey,
};

#[derive(Parser, Debug)]
#[command(name = "weatherwatch")]
#[command(about = "Live weather-station dashboard for the terminal")]
struct Args {
    /// Directory holding `<measurement>.json` packet archives
    #[arg(short, long, default_value = "archive")]
    archive: PathBuf,

    /// Connect to a TCP endpoint for live packets (host:port)
    #[arg(short, long)]
    connect: Option<String>,

    /// Settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initially selected time span (recent, day, week, month, year)
    #[arg(short, long, default_value = "recent")]
    span: TimeSpanKey,

    /// Width of the recent window in minutes (overrides the settings file)
    #[arg(short, long)]
    detail: Option<u32>,

    /// UI refresh interval in milliseconds
    #[arg(short, long, default_value = "250")]
    refresh: u64,

    /// Write logs to this file (the dashboard owns the terminal)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Export the selected span to a JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref(), args.export.is_some())?;

    let mut settings = Settings::load(args.config.as_deref())
        .context("Failed to load settings")?;
    if let Some(detail) = args.detail {
        settings.recent.detail_minutes = detail;
    }

    // Fetches and live feeds run on the runtime while the UI loop owns
    // the main thread
    let rt = tokio::runtime::Runtime::new()?;
    let _guard = rt.enter();

    let mut app = build_app(&args, settings)?;

    if let Some(export_path) = args.export {
        return export_to_file(&rt, &mut app, &export_path);
    }

    run_tui(app, Duration::from_millis(args.refresh))
}

fn init_logging(log_file: Option<&Path>, to_stderr: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None if to_stderr => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
    Ok(())
}

/// Wire the archive, the live feed and the controller together.
fn build_app(args: &Args, settings: Settings) -> Result<App> {
    let archive = Arc::new(ArchiveSource::new(&args.archive, Local));
    // Without a live feed every span, `recent` included, is refetched once
    // its configured max age passes
    let subscriptions = match &args.connect {
        Some(addr) => SubscriptionManager::new(Arc::new(TcpFeed::new(addr))),
        None => SubscriptionManager::offline(),
    };
    info!(
        "Starting with {} and {}",
        archive.description(),
        subscriptions.description()
    );

    let fetch = TimeSpanKey::ALL.into_iter().fold(
        FetchCoordinator::new(archive.clone(), archive),
        |fetch, key| fetch.with_freshness(key, settings.freshness(key)),
    );
    let controller = TimeSpanController::new(fetch, subscriptions, args.span);
    let store = settings.build_store(Utc::now().timestamp_millis());

    let theme = if args.export.is_some() {
        ui::Theme::dark()
    } else {
        ui::Theme::auto_detect()
    };
    Ok(App::new(settings, store, controller, theme))
}

/// Run the TUI until the user quits
fn run_tui(mut app: App, refresh_interval: Duration) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    app.activate();

    let result = run_app(&mut terminal, &mut app, refresh_interval);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    refresh_interval: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 80;
    const MIN_HEIGHT: u16 = 20;

    while app.running {
        let now_ms = Utc::now().timestamp_millis();

        terminal.draw(|frame| {
            let area = frame.area();

            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                let msg = format!(
                    "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                );
                let paragraph = ratatui::widgets::Paragraph::new(msg)
                    .alignment(ratatui::layout::Alignment::Center)
                    .style(ratatui::style::Style::default().fg(ratatui::style::Color::Yellow));
                let centered = ratatui::layout::Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5.min(area.height));
                frame.render_widget(paragraph, centered);
                return;
            }

            let chunks = Layout::vertical([
                Constraint::Length(1), // Header bar
                Constraint::Length(1), // Tabs
                Constraint::Min(12),   // Content
                Constraint::Length(1), // Status bar
            ])
            .split(area);

            ui::common::render_header(frame, app, chunks[0]);
            ui::common::render_tabs(frame, app, chunks[1]);
            ui::render_content(frame, app, chunks[2], now_ms);
            ui::common::render_status_bar(frame, app, chunks[3]);

            if app.show_help {
                ui::common::render_help(frame, app, area);
            }
        })?;

        // Poll for events with a short timeout
        if let Some(event) = events::poll_event(Duration::from_millis(50))? {
            if let Event::Key(key) = event {
                events::handle_key_event(app, key);
            }
        }

        if last_tick.elapsed() >= refresh_interval {
            app.tick();
            last_tick = Instant::now();
        }
    }

    Ok(())
}

/// Activate, wait for the initial fetches, and write the selected span as JSON
fn export_to_file(rt: &tokio::runtime::Runtime, app: &mut App, export_path: &Path) -> Result<()> {
    app.activate();
    rt.block_on(app.settle());

    let now_ms = Utc::now().timestamp_millis();
    app.export_state(export_path, now_ms)
        .with_context(|| format!("Failed to export to {}", export_path.display()))?;
    app.quit();

    println!("Exported {} to {}", app.selection(), export_path.display());
    Ok(())
}
