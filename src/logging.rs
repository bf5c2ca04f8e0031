use crate::errors::Error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Install a console subscriber filtered by `RUST_LOG`. Output goes to stderr
/// so query results on stdout stay machine readable.
pub fn setup_tracing() -> Result<(), Error> {
    let console_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env());

    let subscriber = Registry::default().with(console_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
