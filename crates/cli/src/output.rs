//! Event and stats rendering

use fswatch::{Event, EventType, Stats, WatchError};
use owo_colors::OwoColorize;

/// Render one event for the terminal
pub fn format_event(event: &Event) -> String {
    let time = event.timestamp().format("%H:%M:%S%.3f").to_string();
    let kind = format!("{:<6}", event.event_type().as_str());
    let kind = match event.event_type() {
        EventType::Create => kind.green().to_string(),
        EventType::Write => kind.yellow().to_string(),
        EventType::Remove => kind.red().to_string(),
        EventType::Rename => kind.magenta().to_string(),
        EventType::Chmod => kind.cyan().to_string(),
    };

    match event.old_path() {
        Some(old) => format!(
            "{} {} {} -> {}",
            time.dimmed(),
            kind,
            old.display(),
            event.path().display()
        ),
        None => format!("{} {} {}", time.dimmed(), kind, event.path().display()),
    }
}

/// Print one delivered batch
pub fn print_events(events: &[Event], json: bool) {
    if events.len() > 1 && !json {
        println!("{}", format!("batch of {}", events.len()).dimmed());
    }
    for event in events {
        if json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "failed to encode event"),
            }
        } else {
            println!("{}", format_event(event));
        }
    }
}

pub fn print_error(err: &WatchError) {
    eprintln!("{} [{}] {}", "error".red().bold(), err.code(), err);
}

pub fn print_stats(stats: &Stats, json: bool) {
    if json {
        match serde_json::to_string(stats) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to encode stats"),
        }
        return;
    }

    println!();
    println!("{}", "Summary".bold());
    println!("  events:    {}", stats.total_events);
    println!("  delivered: {}", stats.delivered_events);
    println!("  dropped:   {}", stats.dropped_events);
    if stats.debounced_events > 0 {
        println!("  debounced: {}", stats.debounced_events);
    }
    if stats.batched_events > 0 {
        println!("  batched:   {}", stats.batched_events);
    }
    if stats.errors > 0 {
        println!("  errors:    {}", stats.errors.red());
    }
    println!(
        "  watching:  {} dirs, {} files",
        stats.dirs_watched, stats.files_watched
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rename_shows_both_paths() {
        let event = Event::renamed("/w/old.txt", "/w/new.txt");
        let line = format_event(&event);
        assert!(line.contains("RENAME"));
        assert!(line.contains("/w/old.txt -> /w/new.txt"));
    }

    #[test]
    fn test_format_plain_event() {
        let event = Event::new(EventType::Write, "/w/a.txt");
        let line = format_event(&event);
        assert!(line.contains("WRITE"));
        assert!(line.ends_with("/w/a.txt"));
    }
}
