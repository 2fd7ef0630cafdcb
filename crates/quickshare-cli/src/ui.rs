//! Terminal output helpers.

use quickshare_core::manifest::{Item, ItemStatus};
use quickshare_core::protocol::PeerFile;

const MIN_INNER_WIDTH: usize = 29;

/// A framed room code, digits grouped in threes.
pub struct CodeBox<'a> {
    code: &'a str,
    caption: Option<&'a str>,
}

impl<'a> CodeBox<'a> {
    /// Frame `code`.
    #[must_use]
    pub const fn new(code: &'a str) -> Self {
        Self {
            code,
            caption: None,
        }
    }

    /// Add a hint under the code.
    #[must_use]
    pub const fn with_caption(mut self, caption: &'a str) -> Self {
        self.caption = Some(caption);
        self
    }

    /// The framed lines, without indentation.
    pub fn lines(&self) -> Vec<String> {
        let mut body = vec![format!("Room  {}", group_digits(self.code))];
        body.extend(self.caption.map(str::to_string));

        let inner = body
            .iter()
            .map(|line| line.chars().count() + 4)
            .max()
            .unwrap_or(0)
            .max(MIN_INNER_WIDTH);

        let mut out = Vec::with_capacity(body.len() * 2 + 3);
        out.push(format!("╭{}╮", "─".repeat(inner)));
        for line in &body {
            out.push(format!("│{:inner$}│", ""));
            out.push(format!("│{line:^inner$}│"));
        }
        out.push(format!("│{:inner$}│", ""));
        out.push(format!("╰{}╯", "─".repeat(inner)));
        out
    }

    /// Print the box to stdout.
    pub fn display(&self) {
        for line in self.lines() {
            println!("  {line}");
        }
    }
}

/// `"482910"` becomes `"482 910"`.
fn group_digits(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    chars
        .chunks(3)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// One-character marker for an item status.
pub const fn status_symbol(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Pending => "·",
        ItemStatus::InProgress => "↑",
        ItemStatus::Done => "✓",
        ItemStatus::Failed => "✗",
    }
}

/// Print the manifest, or the empty-state text.
pub fn print_items(items: &[Item], empty_state_text: &str) {
    if items.is_empty() {
        println!("  {empty_state_text}");
        return;
    }
    for item in items {
        let icon = if item.is_folder { "[dir]" } else { "     " };
        println!(
            "  {} {} {:<32} {:>10}  {:>3}%  {}",
            status_symbol(item.status),
            icon,
            item.name,
            item.size_display,
            item.progress_percent,
            item.status_label
        );
    }
}

/// Print a remote cloud listing.
pub fn print_peer_files(files: &[PeerFile]) {
    for file in files {
        println!("  {:<40} {:>10}", file.name, file.size_display);
    }
}
