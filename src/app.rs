use std::time::Instant;

use crate::executor::RunStatus;

/// Where the command is in its lifecycle, for the status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Nothing has run yet.
    Waiting,
    Running { since: Instant },
    Finished { status: RunStatus, at: Instant },
}

/// Central application state, owned exclusively by the main thread.
pub struct App {
    /// Whether the app should exit on the next loop iteration.
    pub should_quit: bool,
    /// Display form of the watched command.
    pub command_line: String,
    pub run_state: RunState,
    /// Output of the most recent finished run, split into lines.
    pub output: Vec<String>,
    /// Number of completed runs since startup.
    pub runs: u32,
    /// Most recent watcher error, if any.
    pub last_error: Option<String>,
    /// Vertical scroll offset (in lines) into the output.
    pub scroll: u16,
    /// Height of the output viewport in terminal rows (set each render).
    pub viewport_height: u16,
}

impl App {
    pub fn new(command_line: String) -> Self {
        Self {
            should_quit: false,
            command_line,
            run_state: RunState::Waiting,
            output: Vec::new(),
            runs: 0,
            last_error: None,
            scroll: 0,
            viewport_height: 0,
        }
    }

    pub fn run_started(&mut self) {
        self.run_state = RunState::Running {
            since: Instant::now(),
        };
    }

    /// Replace the previous run's output entirely.
    pub fn run_finished(&mut self, output: &str, status: RunStatus) {
        self.output = output.lines().map(String::from).collect();
        self.run_state = RunState::Finished {
            status,
            at: Instant::now(),
        };
        self.runs += 1;
        self.scroll = 0;
    }

    pub fn watch_error(&mut self, message: String) {
        self.last_error = Some(message);
    }

    pub fn line_count(&self) -> u16 {
        u16::try_from(self.output.len()).unwrap_or(u16::MAX)
    }

    /// Scroll down by `n` lines, clamped to content bounds.
    pub fn scroll_down(&mut self, n: u16) {
        let max = self.max_scroll();
        self.scroll = self.scroll.saturating_add(n).min(max);
    }

    /// Scroll up by `n` lines, clamped to 0.
    pub fn scroll_up(&mut self, n: u16) {
        self.scroll = self.scroll.saturating_sub(n);
    }

    pub fn scroll_half_down(&mut self) {
        self.scroll_down((self.viewport_height / 2).max(1));
    }

    pub fn scroll_half_up(&mut self) {
        self.scroll_up((self.viewport_height / 2).max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
    }

    /// Clamp scroll after the viewport shrank or the output got shorter.
    pub fn clamp_scroll(&mut self) {
        self.scroll = self.scroll.min(self.max_scroll());
    }

    fn max_scroll(&self) -> u16 {
        self.line_count().saturating_sub(self.viewport_height)
    }
}
