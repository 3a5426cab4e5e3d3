use crossterm::event::KeyEvent;

use crate::executor::RunStatus;

/// All events funnelled through the main loop's mpsc channel.
pub enum AppEvent {
    /// A keypress from the keyboard-reading thread.
    Key(KeyEvent),
    /// The terminal was resized; triggers a re-render.
    Resize,
    /// The scheduler cleared the output and started the command.
    RunStarted,
    /// The command finished; `output` replaces whatever was shown before.
    RunFinished { output: String, status: RunStatus },
    /// The filesystem watcher reported an error. Watching continues.
    WatchError(String),
}
