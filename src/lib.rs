use std::io;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod client;
pub mod coordinator;
pub mod env;
pub mod errors;
pub mod legality;
pub mod planner;
pub mod protocol;
pub mod snapshot;
pub mod transport;
pub mod types;

pub use client::GameClient;
pub use errors::{ClientError, ClientResult};

pub struct LoggerManager {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

impl LoggerManager {
    pub fn setup(settings: &env::Settings) -> Self {
        let file_appender = RollingFileAppender::new(
            Rotation::DAILY,
            &settings.logging.directory,
            &settings.logging.filename,
        );
        let (non_blocking_file_writer, guard) = tracing_appender::non_blocking(file_appender);

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&settings.logging.log_level));

        let console_layer = fmt::layer()
            .with_writer(io::stdout)
            .with_ansi(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .pretty();

        let file_layer = fmt::layer()
            .with_writer(non_blocking_file_writer)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .pretty();

        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        Self { _guard: guard }
    }
}
