//! Statistics reporting.

use console::style;

use crate::pipeline::RunResult;

/// Print the summary of one run.
pub fn print_run_stats(result: &RunResult) {
    let elapsed = chrono::Utc::now() - result.started_at;

    println!();
    println!("{}", style("═".repeat(50)).dim());
    println!(
        "{}",
        style(format!("Run for {}:", result.profile.display_name)).bold()
    );
    println!("  Listed:     {}", result.listed);
    println!("  Downloaded: {}", style(result.downloaded).green());
    println!("  Skipped:    {} (already present)", result.skipped);
    if result.reused > 0 {
        println!("  Reused:     {} (staged earlier)", result.reused);
    }
    if result.failed > 0 {
        println!(
            "  Failed:     {} {:?}",
            style(result.failed).red(),
            result.failed_ids
        );
    }
    println!(
        "  Extracted:  {} file(s) from {} archive(s)",
        result.extracted_files.len(),
        result.archives_extracted
    );
    if result.extraction_failures > 0 {
        println!(
            "  Bad archives: {}",
            style(result.extraction_failures).red()
        );
    }
    if result.decoded > 0 || result.decode_failures > 0 {
        println!(
            "  Decoded:    {} ({} failed)",
            result.decoded, result.decode_failures
        );
    }
    if let Some(dir) = &result.staging_dir {
        println!(
            "  {} staging kept at {}",
            style("Cancelled:").yellow(),
            dir.display()
        );
    }
    println!("  Elapsed:    {}s", elapsed.num_seconds());
    println!("{}", style("═".repeat(50)).dim());
}
