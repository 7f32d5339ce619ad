//! Output formatting utilities for the CLI

use tabled::{settings::Style, Table, Tabled};

use devlink_core::types::AppInfo;

/// Format the installed-app list as an ASCII table
pub fn format_apps(apps: &[AppInfo]) -> String {
    if apps.is_empty() {
        return "No third-party apps installed".to_string();
    }

    #[derive(Tabled)]
    struct AppRow {
        #[tabled(rename = "PACKAGE")]
        package: String,
        #[tabled(rename = "VERSION")]
        version: String,
        #[tabled(rename = "CODE")]
        code: String,
    }

    let rows: Vec<AppRow> = apps
        .iter()
        .map(|app| AppRow {
            package: app.package_name.clone(),
            version: app.version_name.clone(),
            code: app.version_code.clone(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
