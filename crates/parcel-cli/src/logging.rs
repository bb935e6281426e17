/// Default filter for a `-v` count: 0=warn, 1=info, 2=debug, 3+=trace.
pub(crate) fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "parcel=warn",
        1 => "parcel=info",
        2 => "parcel=debug",
        _ => "parcel=trace",
    }
}

/// `RUST_LOG` takes precedence over the verbosity-derived filter.
pub(crate) fn setup_logger(verbose: u8) {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter(verbose)),
    )
    .format_timestamp(None)
    .format_module_path(false)
    .format_target(false)
    .init();
}
