//! Terminal output: dimmed step lines, warnings on stderr, the final
//! success line.

use console::style;
use std::fmt::Display;

/// `[2/5] Rendering pages...`, only with `--verbose`.
pub fn step(verbose: bool, n: usize, total: usize, msg: impl Display) {
    if verbose {
        println!("{} {}", style(format!("[{}/{}]", n, total)).dim(), msg);
    }
}

/// Indented per-item line under a step, only with `--verbose`.
pub fn detail(verbose: bool, label: &str, msg: impl Display) {
    if verbose {
        println!("  {} {}", style(label).dim(), msg);
    }
}

pub fn warn(msg: impl Display) {
    eprintln!("{} {}", style("warning").yellow().bold(), msg);
}

pub fn success(msg: impl Display) {
    println!("{} {}", style("success").cyan(), msg);
}

pub fn failure(msg: impl Display) {
    eprintln!("{} {}", style("error").red().bold(), msg);
}
