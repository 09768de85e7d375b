use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Install the default fmt subscriber.
///
/// Honours `RUST_LOG` and adds `finkit=debug` on top. Calling it twice is
/// harmless; the second installation is ignored.
pub fn init() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "finkit=debug".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    if let Ok(directive) = "reqwest=warn".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}
