use crate::prelude::*;
use cap_std::fs::Dir;

/// env var used to override the log filter. eg: `JOKOSHARE_LOG=jokoshare=debug,info`
pub const LOG_ENV_VAR: &str = "JOKOSHARE_LOG";
const DEFAULT_LOG_FILTER: &str = "info,ureq=warn";

pub fn install_tracing(data_dir: &Dir) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};
    // get the log level
    let filter_layer = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .into_diagnostic()
        .wrap_err("failed to create log filter")?;
    // create log file in the data dir. This will also serve as a check that the directory is "writeable" by us
    let writer = std::io::BufWriter::new(
        data_dir
            .create("jokoshare.log")
            .into_diagnostic()
            .wrap_err("failed to create jokoshare.log file")?,
    );
    let (nb, guard) = tracing_appender::non_blocking(writer);
    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(nb);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .into_diagnostic()
        .wrap_err("failed to install tracing subscriber")?;
    Ok(guard)
}

/// panics inside the tracker thread would otherwise only go to stderr, which the host usually swallows.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info.payload();
        let message = if let Some(msg) = payload.downcast_ref::<&str>() {
            msg.to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "Something went wrong".to_string()
        };
        let thread = std::thread::current();
        let thread = thread.name().unwrap_or("<unnamed>");
        match panic_info.location() {
            Some(loc) => error!(
                thread,
                "panicked at {}:{}:{}: {message}",
                loc.file(),
                loc.line(),
                loc.column()
            ),
            None => error!(thread, "panicked: {message}"),
        }
        eprintln!("thread '{thread}' panicked: {message}");
    }));
}
