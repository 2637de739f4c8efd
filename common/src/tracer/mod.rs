mod tracer_engine;

pub use tracer_engine::{TracerEngine, TracerError};

/// Should be called at the start of each component.
/// Installs the stdout subscriber, filtered by the `RUST_LOG` environment variable.
/// If a subscriber has already been installed a warning is emitted and the existing one is kept.
#[macro_export]
macro_rules! init_tracer {
    () => {{
        let tracer = TracerEngine::new(env!("CARGO_BIN_NAME"), module_path!());
        // This is called here (in the macro) rather than as part of `TracerEngine::new`
        // to ensure the warning is emitted in the correct module.
        if let Err(e) = &tracer {
            warn!("{e}");
        }
        tracer.ok()
    }};
}
