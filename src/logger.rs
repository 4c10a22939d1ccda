//!
//! A tracing subscriber whose time column shows the simulation clock.
//!

use crate::runtime::SimError;
use crate::time::Clock;
use nu_ansi_term::Style;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

struct SimClockTimer {
    clock: Clock,
    ansi: bool,
}

impl FormatTime for SimClockTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = self.clock.now();
        if self.ansi {
            write!(w, "{}", Style::new().dimmed().paint(format!("[ {now:^9} ]")))
        } else {
            write!(w, "[ {now:^9} ]")
        }
    }
}

///
/// An opt-in logger setup that stamps every record with the simulation
/// time of the owning simulator instead of the wall clock.
///
/// # Examples
///
/// ```ignore
/// SimLogger::new(sim.clock())
///     .with_filter("descore=debug")
///     .try_init()?;
/// ```
///
#[must_use]
#[derive(Debug)]
pub struct SimLogger {
    clock: Clock,
    filter: Option<String>,
    ansi: bool,
}

impl SimLogger {
    /// Creates a logger setup reading time from the given clock.
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            filter: None,
            ansi: true,
        }
    }

    ///
    /// Sets the filter directives. Without this, `RUST_LOG` applies, and
    /// `info` when that is unset as well.
    ///
    pub fn with_filter(mut self, directives: impl Into<String>) -> Self {
        self.filter = Some(directives.into());
        self
    }

    /// Toggles ANSI colors in the output.
    pub fn ansi(mut self, on: bool) -> Self {
        self.ansi = on;
        self
    }

    ///
    /// Installs the global tracing subscriber.
    ///
    /// # Errors
    ///
    /// Fails with [`SimError::LoggerInstall`] if a global subscriber is
    /// already set.
    ///
    pub fn try_init(self) -> Result<(), SimError> {
        let filter = match self.filter {
            Some(directives) => EnvFilter::new(directives),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        };
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(self.ansi)
            .with_timer(SimClockTimer {
                clock: self.clock,
                ansi: self.ansi,
            })
            .try_init()
            .map_err(SimError::LoggerInstall)
    }
}
