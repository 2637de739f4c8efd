use thiserror::Error;
use tracing::{debug, subscriber::SetGlobalDefaultError};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt};

#[derive(Debug, Error)]
pub enum TracerError {
    #[error("Tracing subscriber already installed: {0}")]
    AlreadyInstalled(#[from] SetGlobalDefaultError),
}

/// This object initialises the stdout tracer.
pub struct TracerEngine {
    service_name: String,
}

impl TracerEngine {
    /// Initialises the stdout tracer for the crate
    /// #Arguments
    /// * `service_name` - The name of the binary the tracer belongs to.
    /// * `module_name` - The name of the current module.
    /// #Returns
    /// An instance of TracerEngine, or an error if a global subscriber already exists.
    pub fn new(service_name: &str, module_name: &str) -> Result<Self, TracerError> {
        let stdout_tracer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

        // This filter is applied to the stdout tracer
        let log_filter = EnvFilter::from_default_env();

        let subscriber =
            tracing_subscriber::Registry::default().with(stdout_tracer.with_filter(log_filter));

        tracing::subscriber::set_global_default(subscriber)?;
        debug!("Tracer initialised for {service_name} in {module_name}");

        Ok(Self {
            service_name: service_name.to_owned(),
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}
