use std::{
    env,
    io::Write,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::logger::{GroupEvent, get_group_event};
use crate::prelude::*;
use console::{Style, style};
use indicatif::{ProgressBar, ProgressStyle};
use lazy_static::lazy_static;
use log::Log;
use simplelog::{CombinedLogger, SharedLogger};

pub const LOG_LEVEL_ENV: &str = "ROOFLINE_LOG";
pub const ROOFLINE_U8_COLOR_CODE: u8 = 37; // #00AFAF

lazy_static! {
    pub static ref SPINNER: Arc<Mutex<Option<ProgressBar>>> = Arc::new(Mutex::new(None));
    pub static ref IS_TTY: bool = std::io::IsTerminal::is_terminal(&std::io::stdout());
}

/// Level requested through `ROOFLINE_LOG`, `info` when unset or unparsable.
pub fn log_level_from_env() -> log::LevelFilter {
    env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|log_level| log_level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info)
}

/// Hide the spinner temporarily, execute `f`, then redraw the spinner.
///
/// If the output is not a TTY, `f` will be executed without hiding anything.
pub fn suspend_progress_bar<F: FnOnce() -> R, R>(f: F) -> R {
    if *IS_TTY {
        if let Ok(mut spinner) = SPINNER.lock() {
            if let Some(spinner) = spinner.as_mut() {
                return spinner.suspend(f);
            }
        }
    }

    f()
}

fn start_spinner(name: &str) {
    let template = format!(
        "  {{spinner:>.{ROOFLINE_U8_COLOR_CODE}}} {{wide_msg:.{ROOFLINE_U8_COLOR_CODE}.bold}}"
    );
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::with_template(&template) {
        spinner.set_style(spinner_style);
    }
    spinner.set_message(format!("{name}..."));
    spinner.enable_steady_tick(Duration::from_millis(100));
    if let Ok(mut current) = SPINNER.lock() {
        if let Some(previous) = current.replace(spinner) {
            previous.finish_and_clear();
        }
    }
}

pub struct LocalLogger {
    log_level: log::LevelFilter,
}

impl LocalLogger {
    pub fn new() -> Self {
        LocalLogger {
            log_level: log_level_from_env(),
        }
    }
}

impl Default for LocalLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for LocalLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.log_level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if let Some(group_event) = get_group_event(record) {
            match group_event {
                GroupEvent::Start(name) | GroupEvent::StartOpened(name) => {
                    suspend_progress_bar(|| {
                        println!(
                            "\n{}",
                            style(format!("►►► {name} "))
                                .bold()
                                .color256(ROOFLINE_U8_COLOR_CODE)
                        )
                    });

                    if *IS_TTY {
                        start_spinner(&name);
                    } else {
                        println!("{name}...");
                    }
                }
                GroupEvent::End => clean_logger(),
            }

            return;
        }

        suspend_progress_bar(|| print_record(record));
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

/// Print a log record to the console with the appropriate style
fn print_record(record: &log::Record) {
    let error_style = Style::new().red();
    let info_style = Style::new().white();
    let warn_style = Style::new().yellow();
    let debug_style = Style::new().blue().dim();
    let trace_style = Style::new().black().dim();

    match record.level() {
        log::Level::Error => eprintln!("{}", error_style.apply_to(record.args())),
        log::Level::Warn => eprintln!("{}", warn_style.apply_to(record.args())),
        log::Level::Info => println!("{}", info_style.apply_to(record.args())),
        log::Level::Debug => println!(
            "{}",
            debug_style.apply_to(format!("[DEBUG::{}] {}", record.target(), record.args())),
        ),
        log::Level::Trace => println!(
            "{}",
            trace_style.apply_to(format!("[TRACE::{}] {}", record.target(), record.args()))
        ),
    }
}

impl SharedLogger for LocalLogger {
    fn level(&self) -> log::LevelFilter {
        self.log_level
    }

    fn config(&self) -> Option<&simplelog::Config> {
        None
    }

    fn as_log(self: Box<Self>) -> Box<dyn Log> {
        Box::new(*self)
    }
}

pub fn init_local_logger() -> Result<()> {
    let logger: Box<dyn SharedLogger> = Box::new(LocalLogger::new());
    CombinedLogger::init(vec![logger]).context("Failed to init logger")?;
    Ok(())
}

/// Stop the spinner of the current group, if any.
pub fn clean_logger() {
    if let Ok(mut spinner) = SPINNER.lock() {
        if let Some(spinner) = spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_env() {
        temp_env::with_var(LOG_LEVEL_ENV, Some("trace"), || {
            assert_eq!(log_level_from_env(), log::LevelFilter::Trace);
        });
        temp_env::with_var(LOG_LEVEL_ENV, Some("loud"), || {
            assert_eq!(log_level_from_env(), log::LevelFilter::Info);
        });
        temp_env::with_var_unset(LOG_LEVEL_ENV, || {
            assert_eq!(log_level_from_env(), log::LevelFilter::Info);
        });
    }
}
