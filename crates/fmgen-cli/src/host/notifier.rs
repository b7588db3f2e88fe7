//! Notices printed to the terminal.

use colored::Colorize;

use fmgen_core::{Notice, NoticeLevel, Notifier};

/// Prints notices to stderr, coloured by level.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn render(notice: &Notice) -> String {
        let label = match notice.level {
            NoticeLevel::Info => "Info:".cyan().bold(),
            NoticeLevel::Warning => "Warning:".yellow().bold(),
            NoticeLevel::Error => "Error:".red().bold(),
        };
        format!("{label} {notice}")
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        eprintln!("{}", Self::render(&notice));
    }
}
