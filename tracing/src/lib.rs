use tracing::Level;
use tracing_subscriber::{
    filter::{Directive, ParseError},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Target of the events emitted for every write into a salted hash.
pub const HASH_DEBUG_TARGET: &str = "actionid::hash";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid RUST_LOG: {0}")]
    Filter(#[from] ParseError),
}

pub struct TracingBuilder {
    level: Level,
    hash_debug: bool,
}

impl Default for TracingBuilder {
    fn default() -> Self {
        TracingBuilder {
            level: Level::INFO,
            hash_debug: false,
        }
    }
}

impl TracingBuilder {
    /// Set the log level of the stderr layer. RUST_LOG still has a higher
    /// priority over this value.
    pub fn level(mut self, level: Level) -> TracingBuilder {
        self.level = level;
        self
    }

    /// Always show the hash debug events, regardless of the configured
    /// level.
    pub fn enable_hash_debug(mut self) -> TracingBuilder {
        self.hash_debug = true;
        self
    }

    /// Builds the filter applied to the stderr layer, from the configured
    /// level and the given RUST_LOG value.
    pub fn filter(&self, rust_log: Option<&str>) -> Result<EnvFilter, Error> {
        let mut filter = EnvFilter::builder()
            .with_default_directive(self.level.into())
            .parse(rust_log.unwrap_or_default())?;

        if self.hash_debug {
            let directive: Directive = format!("{}=debug", HASH_DEBUG_TARGET).parse()?;
            filter = filter.add_directive(directive);
        }

        Ok(filter)
    }

    /// This will setup tracing based on the configuration passed in.
    /// It will setup a compact stderr writer output layer and a EnvFilter
    /// based on the provided log level (RUST_LOG still has a higher priority
    /// over the configured value).
    ///
    /// Fails if a global subscriber was already installed.
    pub fn build(self) -> Result<(), Error> {
        let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();

        tracing_subscriber::registry()
            .with(self.filter(rust_log.as_deref())?)
            .with(
                tracing_subscriber::fmt::Layer::new()
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()?;

        Ok(())
    }
}
