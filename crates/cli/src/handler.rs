use eyre::{Chain, EyreHandler};
use itertools::Itertools;
use std::{error::Error, fmt};

/// Reports errors as their deduplicated cause chain.
#[derive(Default)]
pub struct Handler {
    /// Takes over `{:?}` formatting when `ANTE_DEBUG` is set.
    verbose: Option<Box<dyn EyreHandler>>,
}

impl Handler {
    /// Delegates debug formatting to `verbose`, usually the `color-eyre` hook.
    pub fn verbose(verbose: Box<dyn EyreHandler>) -> Self {
        Self { verbose: Some(verbose) }
    }
}

impl EyreHandler for Handler {
    fn display(&self, error: &(dyn Error + 'static), f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Display;
        dedup_chain(error).into_iter().format("; ").fmt(f)
    }

    fn debug(&self, error: &(dyn Error + 'static), f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(verbose) = &self.verbose {
            return verbose.debug(error, f);
        }
        if f.alternate() {
            return fmt::Debug::fmt(error, f);
        }

        let mut causes = dedup_chain(error).into_iter();
        if let Some(head) = causes.next() {
            f.write_str(&head)?;
        }
        for (n, cause) in causes.enumerate() {
            if n == 0 {
                f.write_str("\n\nCaused by:")?;
            }
            write!(f, "\n  {n}: {cause}")?;
        }
        Ok(())
    }

    fn track_caller(&mut self, location: &'static std::panic::Location<'static>) {
        if let Some(verbose) = &mut self.verbose {
            verbose.track_caller(location);
        }
    }
}

/// Collects the messages of `error` and its sources, dropping any message already contained in
/// the one before it.
///
/// `HarnessError`s embed their source in their own message, so without this every cause would
/// be printed twice.
pub fn dedup_chain(error: &(dyn Error + 'static)) -> Vec<String> {
    let mut causes: Vec<String> =
        Chain::new(error).map(|cause| cause.to_string().trim().to_string()).collect();
    causes.dedup_by(|b, a| a.contains(b.as_str()));
    causes
}

/// Installs the Ante [`eyre`] and [`panic`](mod@std::panic) hooks as the global ones.
///
/// # Details
///
/// By default a simple user-centric handler is installed, unless `ANTE_DEBUG` is set in the
/// environment, in which case a more verbose debug-centric handler is installed.
///
/// Panics are always caught by the more debug-centric handler.
pub fn install() {
    let (panic_hook, debug_hook) = color_eyre::config::HookBuilder::default()
        .panic_section("This is a bug in ante.")
        .into_hooks();
    panic_hook.install();
    let debug_hook = debug_hook.into_eyre_hook();
    let debug = std::env::var_os("ANTE_DEBUG").is_some();
    if let Err(e) = eyre::set_hook(Box::new(move |e| {
        Box::new(if debug { Handler::verbose(debug_hook(e)) } else { Handler::default() })
    })) {
        debug!("failed to install eyre error hook: {e}");
    }
}
