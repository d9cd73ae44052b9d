//! CLI output formatting and display helpers.

use audiobook_core::api::{DownloadRecord, DownloadsPage};
use audiobook_core::{Notice, QueueItem, QueueReconciler, SearchResult};

/// Message when `add` got neither arguments nor piped input.
pub const NO_INPUT_GUIDANCE: &str = "No URLs provided. Pipe book page links via stdin or pass them as arguments.";

/// Example for passing URLs as arguments.
pub const INPUT_ARG_EXAMPLE: &str = "Example: audiobook-dl add https://hdaudiobooks.net/dune/";

/// Returns terminal width from COLUMNS, or 80 if unset/invalid.
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|width| *width >= 20)
        .unwrap_or(80)
}

/// Truncates text to at most `width` chars, appending ellipsis if truncated.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    let text_len = text.chars().count();
    if text_len <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    if width == 1 {
        return "…".to_string();
    }

    let mut output: String = text.chars().take(width - 1).collect();
    output.push('…');
    output
}

/// One numbered search hit: `  3. Title - Author [site]`.
pub fn render_search_row(number: usize, result: &SearchResult, width: usize) -> String {
    let mut line = format!("{number:>3}. {}", result.title);
    if let Some(author) = result.author.as_deref().filter(|a| !a.is_empty()) {
        line.push_str(" - ");
        line.push_str(author);
    }
    line.push_str(&format!(" [{}]", result.site));
    truncate_to_width(&line, width)
}

/// One queue line: id, status with progress, title and subtitle, ETA or error.
///
/// Optimistic edits not yet confirmed by the server are tagged
/// `(unconfirmed)`; rows with an action in flight end in ` *`.
pub fn render_queue_row(
    item: &QueueItem,
    pending_action: bool,
    unconfirmed: bool,
    width: usize,
) -> String {
    let status = if item.status.is_active() && item.total_chapters > 0 {
        format!(
            "{} {:>3}% {}/{}",
            item.status,
            item.progress_percent(),
            item.current_chapter,
            item.total_chapters
        )
    } else {
        item.status.to_string()
    };
    let mut line = format!(
        "#{:<5} {:<24} {} ({})",
        item.id,
        status,
        item.display_title(),
        item.subtitle()
    );
    if let Some(error) = item.error_message.as_deref() {
        line.push_str(&format!(": {error}"));
    } else if let Some(eta) = item.eta_text() {
        line.push_str(&format!(", {eta}"));
    }
    if unconfirmed {
        line.push_str(" (unconfirmed)");
    }
    if pending_action {
        line.push_str(" *");
    }
    truncate_to_width(&line, width)
}

/// The grouped queue view plus an optional action notice.
pub fn render_queue(queue: &QueueReconciler, notice: Option<&Notice>, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(notice) = notice {
        let prefix = if notice.is_error() { "error" } else { "ok" };
        lines.push(format!("[{prefix}] {}", notice.message()));
    }
    if queue.is_empty() {
        lines.push("Queue is empty.".to_string());
        return lines;
    }

    let groups = queue.groups();
    for (label, items) in [
        ("Active", &groups.active),
        ("Failed", &groups.failed),
        ("Completed", &groups.completed),
    ] {
        if items.is_empty() {
            continue;
        }
        lines.push(format!("{label} ({})", items.len()));
        for item in items {
            lines.push(format!(
                "  {}",
                render_queue_row(
                    item,
                    queue.is_action_pending(item.id),
                    queue.is_unconfirmed(item.id),
                    width.saturating_sub(2)
                )
            ));
        }
    }
    lines
}

/// One history line.
pub fn render_history_row(record: &DownloadRecord, width: usize) -> String {
    let mut line = format!("#{:<5} {}", record.id, record.title);
    if let Some(author) = record.author.as_deref().filter(|a| !a.is_empty()) {
        line.push_str(&format!(" - {author}"));
    }
    line.push_str(&format!(" ({} chapters", record.chapters_total));
    if let Some(completed) = record.completed_at.as_deref() {
        line.push_str(&format!(", {completed}"));
    }
    line.push(')');
    truncate_to_width(&line, width)
}

/// Footer for a history page: `Page 2 of 5 (93 downloads)`.
pub fn history_footer(page: &DownloadsPage) -> String {
    format!(
        "Page {} of {} ({} downloads)",
        page.page,
        page.page_count().max(1),
        page.total
    )
}
