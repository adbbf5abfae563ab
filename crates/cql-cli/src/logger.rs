//! Logging setup (spec SPEC_FULL.md ambient stack): `tracing` +
//! `tracing-subscriber` with an env filter, the same combination
//! `cql-lib`/`cql-json`/`cql-queryplan` instrument with `tracing::*!` calls.
//! `CQL_LOG` controls verbosity; off by default so a plain invocation stays
//! quiet on stderr.

pub(crate) fn init() {
    let filter = std::env::var("CQL_LOG").unwrap_or_else(|_| "off".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .try_init();
}
