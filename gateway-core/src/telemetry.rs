//! Tracing initialization (§1.1). `RUST_LOG` (or `GATEWAY_LOG`) selects the
//! filter; defaults to `info`.

use tracing_subscriber::{prelude::*, EnvFilter, Registry};

pub fn init() {
    let logger = tracing_subscriber::fmt::layer().compact();
    let env_filter = EnvFilter::try_from_env("GATEWAY_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    let collector = Registry::default().with(logger).with(env_filter);
    tracing::subscriber::set_global_default(collector).unwrap();
}
