//! /stats command - aggregates over the stored sessions

use tchat_core::StoreStats;

pub struct StatsCommand;

impl StatsCommand {
    pub fn format(stats: &StoreStats) -> String {
        let mut output = String::from("Usage Statistics\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');

        output.push_str(&format!("Sessions:      {}\n", format_number(stats.total_sessions)));
        output.push_str(&format!("Models used:   {}\n", stats.unique_models));
        output.push_str(&format!("Turns:         {}\n", format_number(stats.total_turns)));

        if stats.total_turns == 0 {
            output.push_str("\nNo completed turns yet");
            return output;
        }

        output.push('\n');
        output.push_str("Response time:\n");
        output.push_str(&format!("  Average:   {:>10}\n", format_ms(stats.avg_duration_ms)));
        output.push_str(&format!(
            "  Fastest:   {:>10}\n",
            format_ms(stats.min_duration_ms as f64)
        ));
        output.push_str(&format!(
            "  Slowest:   {:>10}\n",
            format_ms(stats.max_duration_ms as f64)
        ));
        output.push('\n');
        output.push_str(&format!(
            "Avg input:     {:.0} chars\n",
            stats.avg_input_length
        ));
        output.push_str(&format!(
            "Avg output:    {:.0} chars",
            stats.avg_output_length
        ));

        output
    }
}

fn format_number(n: usize) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

fn format_ms(ms: f64) -> String {
    if ms >= 1_000.0 {
        format!("{:.2}s", ms / 1_000.0)
    } else {
        format!("{:.0}ms", ms)
    }
}
