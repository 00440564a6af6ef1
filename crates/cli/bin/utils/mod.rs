use edb_storage::StorageError;
use eyre::{EyreHandler, Result};
use std::{error::Error, future::Future};
use tracing_error::ErrorLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yansi::Paint;

/// Renders reports as the error, its causes, and a hint on fixing the input when the root
/// cause is a storage error.
#[derive(Debug)]
struct Handler;

impl EyreHandler for Handler {
    fn debug(
        &self,
        error: &(dyn Error + 'static),
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        if f.alternate() {
            return core::fmt::Debug::fmt(error, f);
        }
        writeln!(f)?;
        write!(f, "{}", error.red())?;

        let causes: Vec<_> = std::iter::successors(error.source(), |e| (*e).source()).collect();
        if !causes.is_empty() {
            write!(f, "\n\nCaused by:")?;
            for (n, cause) in causes.iter().enumerate() {
                writeln!(f)?;
                if causes.len() > 1 {
                    write!(f, "  {n}: {cause}")?;
                } else {
                    write!(f, "  {cause}")?;
                }
            }
        }

        if let Some(hint) = hint(error) {
            write!(f, "\n\n{} {hint}", "hint:".cyan().bold())?;
        }

        Ok(())
    }
}

fn hint(error: &(dyn Error + 'static)) -> Option<&'static str> {
    let storage_error = std::iter::successors(Some(error), |e| (*e).source())
        .find_map(|e| e.downcast_ref::<StorageError>())?;
    match storage_error {
        StorageError::UnresolvedContract(_) => {
            Some("check `--contract` and that `--ast` covers the contract and all of its bases")
        }
        StorageError::UnknownVariable { .. } => {
            Some("run `edb-storage layout` to list the state variables of the contract")
        }
        StorageError::InvalidAst(_) => {
            Some("pass solc standard-JSON output, a `SourceUnit` node, or an array of them")
        }
        StorageError::MalformedStorageKey(_) | StorageError::MalformedStorageValue { .. } => {
            Some("snapshot keys and values must be hex strings of at most 32 bytes")
        }
        StorageError::InvalidConfig(_) => Some(
            "supported keys are `string-encoding`, `max-array-elements` and `max-bytes-length`",
        ),
        _ => None,
    }
}

/// Installs the eyre hook as the global error report hook.
///
/// # Details
///
/// By default a simple user-centric handler is installed, unless
/// `EDB_DEBUG` is set in the environment, in which case a more
/// verbose debug-centric handler is installed.
///
/// Panics are always caught by the more debug-centric handler.
pub fn install_error_handler() {
    // If the user has not explicitly overridden "RUST_BACKTRACE", then produce full backtraces.
    if std::env::var_os("RUST_BACKTRACE").is_none() {
        std::env::set_var("RUST_BACKTRACE", "full");
    }

    let debug_enabled = std::env::var("EDB_DEBUG").is_ok();
    if debug_enabled {
        if let Err(e) = color_eyre::install() {
            warn!("failed to install color eyre error hook: {e}");
        }
    } else {
        let (panic_hook, _) = color_eyre::config::HookBuilder::default()
            .panic_section(
                "This is a bug. Consider reporting it at https://github.com/MEDGA-eth/EDB",
            )
            .into_hooks();
        panic_hook.install();
        if let Err(e) = eyre::set_hook(Box::new(move |_| Box::new(Handler))) {
            warn!("failed to install eyre error hook: {e}");
        }
    }
}

/// Initializes a tracing Subscriber for logging
pub fn subscriber() {
    tracing_subscriber::Registry::default()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(ErrorLayer::default())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init()
}

/// Sets the default [`yansi`] color output condition.
pub fn enable_paint() {
    let enable = yansi::Condition::os_support() && yansi::Condition::tty_and_color_live();
    yansi::whenever(yansi::Condition::cached(enable));
}

/// Runs the command `future` to completion in a new [`tokio::runtime::Runtime`]
pub fn block_on<F: Future<Output = Result<()>>>(future: F) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_for_wrapped_storage_errors() {
        let unknown = eyre::Report::new(StorageError::UnknownVariable {
            contract: "Token".into(),
            name: "supply".into(),
        })
        .wrap_err("failed to decode");
        assert!(hint(unknown.as_ref()).is_some_and(|hint| hint.contains("edb-storage layout")));

        let other = StorageError::EnumOutOfRange { name: "E".into(), ordinal: Default::default() };
        assert!(hint(&other).is_none());
    }
}
