//! Pipeline progress reporting.
//!
//! The builder announces phase transitions ("Discovering files",
//! "Chunking files", ...) through an optional callback. Messages are
//! advisory: nothing downstream may depend on their content. The CLI
//! installs the stderr reporter so stdout stays parseable; library users
//! pass their own callback or none.

use std::io::Write;
use std::sync::Arc;

/// Progress callback. Invoked with a short human-readable phase message.
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Reporter writing one line per phase to stderr.
pub fn stderr_reporter() -> ProgressFn {
    Arc::new(|message: &str| {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", message);
        let _ = stderr.flush();
    })
}

/// Whether progress should be on by default: only when stderr is a TTY.
pub fn default_enabled() -> bool {
    atty::is(atty::Stream::Stderr)
}

/// Emit through an optional callback.
pub fn emit(progress: &Option<ProgressFn>, message: &str) {
    if let Some(callback) = progress {
        callback(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn emit_invokes_callback() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: Option<ProgressFn> =
            Some(Arc::new(move |m: &str| sink.lock().unwrap().push(m.to_string())));

        emit(&progress, "Discovering files");
        emit(&progress, "Found 3 files");
        emit(&None, "dropped");

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec!["Discovering files", "Found 3 files"]);
    }
}
