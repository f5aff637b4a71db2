//! Eurostat indicator loading for EU member states: JSON-stat decoding, a
//! local-file fallback, year-over-year anomaly correction and fixed display
//! scales.

pub mod anomaly;
pub mod config;
pub mod dataset;
pub mod decode;
pub mod entity;
pub mod error;
pub mod export;
pub mod fetch;
pub mod indicator;
pub mod local;
pub mod logging;
pub mod scale;
pub mod table;

pub use config::Config;
pub use dataset::{Dataset, Session, Source};
pub use entity::Entity;
pub use error::LoadError;
pub use indicator::Indicator;
pub use table::{ObservationTable, Year};

#[cfg(test)]
pub(crate) fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,eustat=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
