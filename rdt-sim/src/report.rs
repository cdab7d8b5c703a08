//! Report display and formatting

use crate::channel::ChannelStats;
use crate::simulation::SimReport;
use std::time::Duration;

/// Byte count scaled to the largest binary unit it reaches, two decimals
/// above 1 KB
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

/// Format virtual duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    let millis = duration.subsec_millis();

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else if seconds > 0 {
        format!("{}.{:03}s", seconds, millis)
    } else {
        format!("{}ms", millis)
    }
}

/// Format goodput in human-readable form
pub fn format_goodput(bytes: u64, elapsed: Duration) -> String {
    let micros = elapsed.as_micros();
    if micros == 0 {
        return "N/A".to_string();
    }
    let bps = (bytes as u128 * 8 * 1_000_000 / micros) as u64;

    const KBPS: u64 = 1000;
    const MBPS: u64 = KBPS * 1000;

    if bps >= MBPS {
        format!("{:.2} Mbps", bps as f64 / MBPS as f64)
    } else if bps >= KBPS {
        format!("{:.2} Kbps", bps as f64 / KBPS as f64)
    } else {
        format!("{} bps", bps)
    }
}

/// Share of `part` in `whole` as a percentage string
fn percent(part: u64, whole: u64) -> String {
    if whole == 0 {
        "0.0%".to_string()
    } else {
        format!("{:.1}%", part as f64 * 100.0 / whole as f64)
    }
}

/// Display the outcome of a run
pub fn display_report(report: &SimReport) {
    let elapsed = report.finished_at.since_start();
    let sender = &report.sender;
    let receiver = &report.receiver;

    println!("\n┌─────────────────────────────────────────────────────────────┐");
    println!("│ SIMULATION SUMMARY                                          │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!(
        "│ Messages:  {} submitted / {} delivered",
        report.submitted.len(),
        report.delivered.len()
    );
    println!(
        "│ Bytes:     {} submitted / {} delivered",
        format_bytes(report.submitted_bytes()),
        format_bytes(report.delivered_bytes())
    );
    println!("│ Elapsed:   {} (virtual)", format_duration(elapsed));
    println!(
        "│ Goodput:   {}",
        format_goodput(report.delivered_bytes(), elapsed)
    );
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ SENDER                                                      │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!(
        "│ Packets:   {} sent / {} retransmitted ({})",
        sender.packets_sent,
        sender.packets_retransmitted,
        percent(sender.packets_retransmitted, sender.packets_sent)
    );
    println!(
        "│ Acks:      {} valid / {} corrupted / {} duplicate",
        sender.acks_received, sender.acks_corrupted, sender.acks_duplicate
    );
    println!(
        "│ Timeouts:  {} | Peak in flight: {}",
        sender.timeouts, report.max_in_flight
    );
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ RECEIVER                                                    │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!(
        "│ Packets:   {} received / {} corrupted / {} duplicate",
        receiver.packets_received, receiver.packets_corrupted, receiver.packets_duplicate
    );
    println!(
        "│ Reorder:   {} buffered / {} outside window",
        receiver.packets_buffered, receiver.packets_out_of_window
    );
    println!("│ Acks sent: {}", receiver.acks_sent);
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ CHANNEL                                                     │");
    println!("├───────────┬──────────┬──────────┬──────────┬──────────┬─────┤");
    println!("│ Direction │ In       │ Dropped  │ Corrupt  │ Dup      │ Late│");
    println!("├───────────┼──────────┼──────────┼──────────┼──────────┼─────┤");
    display_channel_row("forward", &report.forward);
    display_channel_row("reverse", &report.reverse);
    println!("└───────────┴──────────┴──────────┴──────────┴──────────┴─────┘");
}

fn display_channel_row(direction: &str, stats: &ChannelStats) {
    println!(
        "│ {:9} │ {:8} │ {:8} │ {:8} │ {:8} │ {:3} │",
        direction, stats.packets_in, stats.dropped, stats.corrupted, stats.duplicated, stats.reordered
    );
}
