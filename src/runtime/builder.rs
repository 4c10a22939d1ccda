use super::{ErrorStrategy, Model, Simulator};
use rand::rngs::{OsRng, StdRng};
use rand::SeedableRng;

///
/// A builder for a simulator instance.
///
/// # Examples
///
/// ```ignore
/// let sim = Builder::seeded(42)
///     .error_strategy(ErrorStrategy::LogAndContinue)
///     .quiet()
///     .build(model);
/// ```
///
#[must_use]
pub struct Builder {
    pub(super) rng: Option<StdRng>,
    pub(super) strategy: ErrorStrategy,
    pub(super) quiet: bool,
}

impl Builder {
    /// Creates a new unconfigured builder. The RNG is drawn from the OS and
    /// the run is NOT reproducible; use [`Builder::seeded`] for that.
    pub fn new() -> Builder {
        Builder {
            rng: None,
            strategy: ErrorStrategy::default(),
            quiet: false,
        }
    }

    /// Creates a `Builder` with a statically seeded RNG for reproducible
    /// runs.
    pub fn seeded(seed: u64) -> Builder {
        Builder {
            rng: Some(StdRng::seed_from_u64(seed)),
            ..Builder::new()
        }
    }

    ///
    /// Sets the strategy applied to faults raised by event actions.
    /// Defaults to [`ErrorStrategy::WarnAndPause`].
    ///
    pub fn error_strategy(mut self, strategy: ErrorStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    ///
    /// Suppresses the startup banner of the simulation kernel.
    ///
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    ///
    /// Builds a simulator around the given model.
    ///
    /// # Panics
    ///
    /// Panics if no RNG can be created from the OS-RNG.
    ///
    pub fn build<M: Model>(self, model: M) -> Simulator<M> {
        let seeded = self.rng.is_some();
        let rng = self
            .rng
            .unwrap_or_else(|| StdRng::from_rng(OsRng).expect("failed to create RNG"));

        if !self.quiet {
            println!("\u{23A1}");
            println!(
                "\u{23A2} descore v{} simulation kernel",
                env!("CARGO_PKG_VERSION")
            );
            println!(
                "\u{23A2}  error strategy := {:?} seeded [{}]",
                self.strategy,
                if seeded { '\u{2713}' } else { '\u{02df}' }
            );
            println!("\u{23A3}");
        }

        Simulator::assemble(model, rng, self.strategy)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("seeded", &self.rng.is_some())
            .field("strategy", &self.strategy)
            .field("quiet", &self.quiet)
            .finish()
    }
}
