// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CLI output reporter with colored formatting

use crate::output::ScriptOutputPath;
use crate::runner::ExecutionResult;
use colored::*;
use std::path::PathBuf;
use std::time::Duration;

/// CLI reporter for formatted output
pub struct Reporter;

impl Reporter {
    /// Report a finished run: status, messages, warnings and errors
    pub fn report_run(file: &str, result: &ExecutionResult) {
        println!("\n{}", "━".repeat(80).bright_black());
        println!("{} {}", "Script:".bold(), file.cyan());
        println!("{}", "━".repeat(80).bright_black());

        if result.is_success() {
            println!("{} {}", "✅".green(), "Run succeeded".green().bold());
        } else {
            println!("{} {}", "❌".red(), "Run failed".red().bold());
        }

        if !result.messages.is_empty() {
            println!("\n{}", "Messages:".bold());
            for message in &result.messages {
                println!("  {message}");
            }
        }
        if !result.warnings.is_empty() {
            println!("\n{}", "Warnings:".yellow().bold());
            for warning in &result.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }
        if !result.errors.is_empty() {
            println!("\n{}", "Errors:".red().bold());
            for error in &result.errors {
                println!("  {} {}", "✗".red(), error);
                if let Some(code) = &error.code {
                    println!("    {}", code.lines().next().unwrap_or_default().bright_black());
                }
            }
        }

        println!("\n{}", "Summary:".bold());
        println!(
            "  {} {}",
            "Shapes:".bright_black(),
            result.info.shape_count.to_string().cyan()
        );
        if let Some(bbox) = result.info.bbox {
            let size = bbox.size();
            println!(
                "  {} {:.2} × {:.2} × {:.2}",
                "Size:".bright_black(),
                size.x,
                size.y,
                size.z
            );
        }
        println!(
            "  {} {}",
            "Outputs:".bright_black(),
            result.outputs.len().to_string().cyan()
        );
        println!(
            "  {} {}",
            "Time:".bright_black(),
            Self::format_duration(Duration::from_millis(result.duration_ms)).yellow()
        );
        println!("{}", "━".repeat(80).bright_black());
    }

    /// List files written for a run
    pub fn report_written(files: &[PathBuf]) {
        for file in files {
            println!("  {} {}", "→".bright_black(), file.display().to_string().cyan());
        }
    }

    /// Report resolved output paths and resolution warnings
    pub fn report_resolution(requested: &str, resolved: &[ScriptOutputPath], warnings: &[String]) {
        println!("{} {}", "Request:".bold(), requested.cyan());
        if resolved.is_empty() {
            println!("  {}", "(nothing resolved)".bright_black());
        }
        for path in resolved {
            println!("  {} {}", "→".bright_black(), path.to_string().green());
        }
        for warning in warnings {
            println!("  {} {}", "⚠".yellow(), warning.yellow());
        }
    }

    /// Report error
    pub fn report_error(message: &str) {
        eprintln!("\n{} {}", "❌ Error:".red().bold(), message);
    }

    /// Report info
    pub fn report_info(message: &str) {
        println!("{} {}", "ℹ️".bright_blue(), message);
    }

    /// Format duration for display
    fn format_duration(duration: Duration) -> String {
        let micros = duration.as_micros();

        if micros < 1_000 {
            format!("{}µs", micros)
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1_000.0)
        } else {
            format!("{:.2}s", micros as f64 / 1_000_000.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(
            Reporter::format_duration(Duration::from_micros(500)),
            "500µs"
        );
        assert_eq!(
            Reporter::format_duration(Duration::from_millis(5)),
            "5.00ms"
        );
        assert_eq!(Reporter::format_duration(Duration::from_secs(2)), "2.00s");
    }
}
