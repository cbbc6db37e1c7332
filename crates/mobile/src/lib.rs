pub mod animation;
pub mod host;
mod logging;

use animated_tile_core::config::AnimationConfig;

use crate::animation::AnimationOptions;

uniffi::setup_scaffolding!();

/// Initialize the library with proper panic handling
/// Call this once at startup from Kotlin/Swift
#[uniffi::export]
pub fn init_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        eprintln!("=== RUST PANIC ===");
        eprintln!("{panic_info}");
        eprintln!("Backtrace:\n{backtrace}");
        eprintln!("=== END PANIC ===");
    }));
}

/// Route library logs to logcat (Android) or stderr. Safe to call repeatedly.
#[uniffi::export]
pub fn init_logging() {
    logging::setup_logging();
}

#[uniffi::export]
pub fn default_animation_options() -> AnimationOptions {
    AnimationConfig::default().into()
}
