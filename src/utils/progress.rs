/// Human-readable progress lines printed at each phase transition

use colored::Colorize;

/// A phase is starting
pub fn step(message: impl AsRef<str>) {
    println!("{} {}", "→".cyan(), message.as_ref());
}

/// A phase finished successfully
pub fn done(message: impl AsRef<str>) {
    println!("{} {}", "✓".green(), message.as_ref());
}

/// A phase failed; the run is about to abort
pub fn fail(message: impl AsRef<str>) {
    println!("{} {}", "✗".red(), message.as_ref());
}

/// Non-fatal problem worth showing to the operator
pub fn warn(message: impl AsRef<str>) {
    println!("{} {}", "⚠".yellow(), message.as_ref());
}
