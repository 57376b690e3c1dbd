//! Terminal feedback for the `batch` subcommand.
//!
//! [`batch::run`](crate::batch::run) only talks to [`ProgressCallback`];
//! `main` hands it an [`IndicatifProgress`] and the tests hand it
//! [`NullProgress`].

use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Sink for line counts reported while a batch is formatted.
pub trait ProgressCallback: Send + Sync {
    /// Number of addresses the batch will attempt.
    fn set_total(&self, total: u64);

    /// Records `delta` more addresses as handled, formatted or not.
    fn inc(&self, delta: u64);

    /// Called once after the last line with a summary such as
    /// `"3 formatted, 1 failed"`.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn finish(&self, _msg: String) {}
}

/// Address counter drawn with `indicatif`.
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Applied when the line count arrives.
    counted_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Adds a bar to `multi` labelled with `message`.
    ///
    /// It spins while the input is being read and shows `pos/len` once the
    /// batch knows how many lines it has.
    #[must_use]
    pub fn batch_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let counted_style =
            ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len} addresses ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ");

        Arc::new(Self { bar, counted_style })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.counted_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Sets up logging for the binary and returns the shared [`MultiProgress`].
///
/// Records go to `pretty_env_logger`, filtered by `RUST_LOG`. The
/// `indicatif-log-bridge` wrapper hides any bar added to the returned
/// handle while a record is printed.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // A second call (e.g. from another test) keeps the first logger.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
