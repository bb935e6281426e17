use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use parcel_core::{
    PackageInfo, RefreshStatus, TransactionEvent, TransactionObserver, TransactionStatus,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
    Json,
}

pub(crate) fn current_output_style(json: bool) -> OutputStyle {
    if json {
        OutputStyle::Json
    } else if std::io::stdout().is_terminal() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

/// Prints transaction events as they arrive. Percentages drive a progress
/// bar in rich mode and are dropped in plain mode.
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl TerminalRenderer {
    pub(crate) fn new(style: OutputStyle) -> Self {
        Self {
            style,
            progress_bar: None,
            started_at: Instant::now(),
        }
    }

    pub(crate) fn finish(&mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }

    fn set_progress(&mut self, value: u8) {
        if self.style != OutputStyle::Rich {
            return;
        }
        let progress_bar = self.progress_bar.get_or_insert_with(new_progress_bar);
        progress_bar.set_position(u64::from(value));
        if value >= 100 {
            self.finish();
        }
    }

    fn print(&self, line: &str) {
        match &self.progress_bar {
            Some(progress_bar) => progress_bar.println(line),
            None => println!("{line}"),
        }
    }
}

impl TransactionObserver for TerminalRenderer {
    fn emit(&mut self, event: TransactionEvent) {
        if let TransactionEvent::Percentage { value } = event {
            self.set_progress(value);
        }
        let line = match (&event, self.style) {
            (
                TransactionEvent::Status {
                    status: TransactionStatus::Finished,
                },
                OutputStyle::Plain | OutputStyle::Rich,
            ) => Some(render_status_line(
                self.style,
                "finished",
                &format!("in {}", format_elapsed(self.started_at.elapsed())),
            )),
            _ => render_event_line(self.style, &event),
        };
        if let Some(line) = line {
            self.print(&line);
        }
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        self.finish();
    }
}

fn new_progress_bar() -> ProgressBar {
    let progress_bar = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.cyan.bold} [{bar:24.cyan/blue}] {pos:>3}% {elapsed_precise}",
    ) {
        progress_bar.set_style(style.progress_chars("=>-"));
    }
    progress_bar.enable_steady_tick(Duration::from_millis(80));
    progress_bar
}

/// The line printed for `event`, if any.
pub(crate) fn render_event_line(style: OutputStyle, event: &TransactionEvent) -> Option<String> {
    if style == OutputStyle::Json {
        return serde_json::to_string(event).ok();
    }
    match event {
        TransactionEvent::Status { status } => {
            Some(render_status_line(style, "status", status_label(*status)))
        }
        TransactionEvent::Percentage { .. } => None,
        TransactionEvent::Package {
            info,
            package_id,
            summary,
        } => {
            let message = if summary.is_empty() {
                package_id.clone()
            } else {
                format!("{package_id} - {summary}")
            };
            Some(render_status_line(style, package_info_label(*info), &message))
        }
        TransactionEvent::Files { package_id, path } => Some(render_status_line(
            style,
            "fetched",
            &format!("{package_id} -> {}", path.display()),
        )),
        TransactionEvent::Details {
            package_id,
            license,
            description,
            homepage,
            size,
        } => {
            let mut message = package_id.clone();
            if !description.is_empty() {
                message.push_str(&format!(" - {description}"));
            }
            message.push_str(&format!(
                "\n{:>11} license: {}",
                "",
                license.as_deref().unwrap_or("unknown")
            ));
            if let Some(homepage) = homepage {
                message.push_str(&format!("\n{:>11} homepage: {homepage}", ""));
            }
            if let Some(size) = size {
                message.push_str(&format!("\n{:>11} size: {size} bytes", ""));
            }
            Some(render_status_line(style, "details", &message))
        }
        TransactionEvent::RepositoryDetail {
            repository,
            trusted,
        } => {
            let message = if *trusted {
                format!("{repository} (signed)")
            } else {
                repository.clone()
            };
            Some(render_status_line(style, "repository", &message))
        }
        TransactionEvent::LicenseRequired {
            license,
            package_id,
            vendor,
            text,
        } => {
            let vendor = if vendor.is_empty() {
                "unknown vendor"
            } else {
                vendor.as_str()
            };
            Some(format!(
                "{}\n{text}\nre-run with --accept-license {license} to accept it",
                render_status_line(
                    style,
                    "license",
                    &format!("{license} is required by {package_id} ({vendor})"),
                )
            ))
        }
        TransactionEvent::RepositoryRefreshed {
            repository,
            status,
            error,
        } => {
            let message = match (status, error) {
                (Some(RefreshStatus::Updated), _) => format!("{repository}: updated"),
                (Some(RefreshStatus::UpToDate), _) => format!("{repository}: up to date"),
                (None, Some(error)) => format!("{repository}: failed ({error})"),
                (None, None) => format!("{repository}: failed"),
            };
            Some(render_status_line(style, "refresh", &message))
        }
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Rich => format!(
            "{} {message}",
            colorize(status_style(status), &format!("{status:>11}"))
        ),
        OutputStyle::Plain | OutputStyle::Json => format!("{status:>11} {message}"),
    }
}

fn status_label(status: TransactionStatus) -> &'static str {
    match status {
        TransactionStatus::Running => "running",
        TransactionStatus::DepResolve => "resolving dependencies",
        TransactionStatus::Download => "downloading",
        TransactionStatus::Install => "installing",
        TransactionStatus::Remove => "removing",
        TransactionStatus::Refresh => "refreshing repositories",
        TransactionStatus::Info => "querying",
        TransactionStatus::Finished => "finished",
    }
}

fn package_info_label(info: PackageInfo) -> &'static str {
    match info {
        PackageInfo::Downloading => "download",
        PackageInfo::Installing => "install",
        PackageInfo::Removing => "remove",
        PackageInfo::Installed => "installed",
        PackageInfo::Available => "available",
    }
}

fn status_style(status: &str) -> Style {
    let color = match status {
        "license" => AnsiColor::BrightYellow,
        "remove" => AnsiColor::BrightRed,
        "installed" | "finished" => AnsiColor::BrightGreen,
        _ => AnsiColor::BrightCyan,
    };
    Style::new()
        .fg_color(Some(color.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}
