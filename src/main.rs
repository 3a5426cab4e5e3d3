mod app;
mod config;
mod debounce;
mod event;
mod executor;
mod filter;
mod logging;
mod scheduler;
mod sink;
mod ui;
mod watcher;

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self as ct_event, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, info};

use crate::app::App;
use crate::config::{Cli, Config};
use crate::event::AppEvent;
use crate::executor::Executor;
use crate::filter::EventFilter;
use crate::scheduler::{Scheduler, Trigger};
use crate::sink::{ChannelSink, PlainSink};
use crate::watcher::WatchHandle;

/// How often the status bar refreshes when nothing else happens.
const REDRAW_INTERVAL: Duration = Duration::from_secs(1);

fn main() {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::try_from(cli).context("configuring")?;
    let _log_guard = logging::init(config.log_file.as_deref(), config.plain)?;

    let handle = watcher::spawn(&config.watch, config.recursive, config.respect_gitignore)?;
    info!(
        paths = ?config.watch,
        suffixes = ?config.suffixes,
        min_wait = ?config.min_wait,
        "watching"
    );

    let filter = EventFilter::new(config.suffixes.clone(), config.ops.clone());
    let executor = Executor::new(config.command.clone(), config.args.clone());

    if config.plain {
        let WatchHandle {
            watcher: _watcher,
            events,
            errors,
        } = handle;
        let sink = PlainSink::new(io::stdout());
        Scheduler::new(filter, config.min_wait, executor, sink).run(events, errors);
        return Ok(());
    }

    // ── Terminal setup ──────────────────────────────────────────
    enable_raw_mode().context("setting up terminal UI")?;
    let mut terminal = or_restore(enter_terminal(), || {
        let _ = disable_raw_mode();
    })?;

    // Panic hook: restore terminal before printing the panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));

    // ── Run ─────────────────────────────────────────────────────
    let result = run(&mut terminal, &config, filter, executor, handle);

    // ── Terminal teardown ───────────────────────────────────────
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    result
}

fn enter_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("setting up terminal UI")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("setting up terminal UI")
}

/// Run `restore` if `res` failed, so setup errors don't leave the terminal
/// in raw mode.
fn or_restore<T>(res: Result<T>, restore: impl FnOnce()) -> Result<T> {
    if res.is_err() {
        restore();
    }
    res
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: &Config,
    filter: EventFilter,
    executor: Executor,
    handle: WatchHandle,
) -> Result<()> {
    let mut app = App::new(executor.command_line());
    let (tx, rx) = mpsc::channel::<AppEvent>();

    // ── Keyboard + resize thread ────────────────────────────────
    let key_tx = tx.clone();
    thread::spawn(move || loop {
        match ct_event::read() {
            Ok(Event::Key(key)) => {
                if key_tx.send(AppEvent::Key(key)).is_err() {
                    break;
                }
            }
            Ok(Event::Resize(_, _)) => {
                if key_tx.send(AppEvent::Resize).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(_) => break,
        }
    });

    // ── Scheduler thread ────────────────────────────────────────
    // The watcher stays owned here; dropping it on return closes the
    // scheduler's channels. A command still running at that point is not
    // killed, the process simply exits.
    let WatchHandle {
        watcher: _watcher,
        events,
        errors,
    } = handle;
    let scheduler = Scheduler::new(filter, config.min_wait, executor, ChannelSink::new(tx));
    let trigger = scheduler.trigger();
    thread::Builder::new()
        .name("scheduler".into())
        .spawn(move || scheduler.run(events, errors))
        .context("spawning scheduler thread")?;

    // ── Main event loop ─────────────────────────────────────────
    terminal.draw(|frame| ui::draw(frame, &mut app))?;

    loop {
        match rx.recv_timeout(REDRAW_INTERVAL) {
            Ok(event) => handle_event(&mut app, event, &trigger),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if app.should_quit {
            break;
        }

        terminal.draw(|frame| ui::draw(frame, &mut app))?;
    }

    Ok(())
}

fn handle_event(app: &mut App, event: AppEvent, trigger: &Trigger) {
    match event {
        AppEvent::Key(key) => handle_key(app, key, trigger),
        AppEvent::Resize => {}
        AppEvent::RunStarted => app.run_started(),
        AppEvent::RunFinished { output, status } => app.run_finished(&output, status),
        AppEvent::WatchError(message) => app.watch_error(message),
    }
}

fn handle_key(app: &mut App, key: KeyEvent, trigger: &Trigger) {
    match (key.code, key.modifiers) {
        // Quit
        (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
            app.should_quit = true;
        }
        // Force a run
        (KeyCode::Char('r'), _) => {
            if !trigger.fire() {
                debug!("run already pending");
            }
        }
        // Basic scroll
        (KeyCode::Char('j') | KeyCode::Down, _) => app.scroll_down(1),
        (KeyCode::Char('k') | KeyCode::Up, _) => app.scroll_up(1),
        (KeyCode::Char('g'), _) => app.scroll_to_top(),
        (KeyCode::Char('G'), _) => app.scroll_to_bottom(),
        // Half-page scroll
        (KeyCode::Char('d'), KeyModifiers::CONTROL) => app.scroll_half_down(),
        (KeyCode::Char('u'), KeyModifiers::CONTROL) => app.scroll_half_up(),
        // Full-page scroll
        (KeyCode::Char('f'), KeyModifiers::CONTROL) | (KeyCode::PageDown, _) => {
            app.scroll_down(app.viewport_height)
        }
        (KeyCode::Char('b'), KeyModifiers::CONTROL) | (KeyCode::PageUp, _) => {
            app.scroll_up(app.viewport_height)
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RunStatus;

    /// The scheduler must outlive the trigger or every request fails.
    fn fixture() -> (Scheduler<ChannelSink>, Trigger) {
        let (tx, _rx) = mpsc::channel();
        let scheduler = Scheduler::new(
            EventFilter::new(vec![], vec![]),
            Duration::from_millis(100),
            Executor::new("true".into(), vec![]),
            ChannelSink::new(tx),
        );
        let trigger = scheduler.trigger();
        (scheduler, trigger)
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn failed_setup_restores_terminal() {
        let mut restored = false;
        let res: Result<()> = or_restore(Err(anyhow::anyhow!("no tty")), || restored = true);
        assert!(res.is_err());
        assert!(restored);

        let mut restored = false;
        let res = or_restore(Ok(7), || restored = true);
        assert_eq!(res.unwrap(), 7);
        assert!(!restored);
    }

    #[test]
    fn q_and_ctrl_c_quit() {
        let (_scheduler, trigger) = fixture();
        let mut app = App::new("make".into());
        handle_event(&mut app, key(KeyCode::Char('q'), KeyModifiers::NONE), &trigger);
        assert!(app.should_quit);

        let mut app = App::new("make".into());
        handle_event(&mut app, key(KeyCode::Char('c'), KeyModifiers::CONTROL), &trigger);
        assert!(app.should_quit);
    }

    #[test]
    fn trigger_accepts_first_request() {
        let (_scheduler, trigger) = fixture();
        assert!(trigger.fire());
        assert!(!trigger.fire());
    }

    #[test]
    fn r_requests_a_single_pending_run() {
        let (_scheduler, trigger) = fixture();
        let mut app = App::new("make".into());
        handle_event(&mut app, key(KeyCode::Char('r'), KeyModifiers::NONE), &trigger);
        // The first request is still pending, so another one folds into it.
        assert!(!trigger.fire());
        assert!(!app.should_quit);
    }

    #[test]
    fn sink_events_update_app() {
        let (_scheduler, trigger) = fixture();
        let mut app = App::new("make".into());
        handle_event(&mut app, AppEvent::RunStarted, &trigger);
        handle_event(
            &mut app,
            AppEvent::RunFinished {
                output: "a\nb\n".into(),
                status: RunStatus::Success,
            },
            &trigger,
        );
        handle_event(&mut app, AppEvent::WatchError("overflow".into()), &trigger);

        assert_eq!(app.output, vec!["a", "b"]);
        assert_eq!(app.runs, 1);
        assert_eq!(app.last_error.as_deref(), Some("overflow"));
    }

    #[test]
    fn paging_keys_scroll() {
        let (_scheduler, trigger) = fixture();
        let mut app = App::new("make".into());
        let text: String = (0..50).map(|i| format!("{i}\n")).collect();
        app.run_finished(&text, RunStatus::Success);
        app.viewport_height = 10;

        handle_event(&mut app, key(KeyCode::PageDown, KeyModifiers::NONE), &trigger);
        assert_eq!(app.scroll, 10);
        handle_event(&mut app, key(KeyCode::Char('G'), KeyModifiers::SHIFT), &trigger);
        assert_eq!(app.scroll, 40);
        handle_event(&mut app, key(KeyCode::Char('u'), KeyModifiers::CONTROL), &trigger);
        assert_eq!(app.scroll, 35);
    }
}
