use crate::position::Position;

/// Thin formatting helpers around the `log` crate's macros, used by the
/// scanner and parse driver to report progress at `trace`/`debug` level
/// without scattering `format!` calls through the hot path.
pub(crate) fn log_token(pattern_name: &str, text: &str, position: Position) {
    log::trace!("matched {} \"{}\" at {}", pattern_name, text, position);
}

pub(crate) fn log_production_enter(name: &str, position: Position) {
    log::debug!("entering {} at {}", name, position);
}

pub(crate) fn log_production_exit(name: &str) {
    log::debug!("exiting {}", name);
}

pub(crate) fn log_recovery(position: Position, skipped: usize) {
    log::warn!("recovered at {} after skipping {} token(s)", position, skipped);
}
