#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal glue for `crime_forecast_train`.
//!
//! The incident loader reports how far it has read through the CSV via
//! [`ProgressCallback`]; [`IndicatifProgress`] draws that as a byte bar.
//! Training stages log through [`init_logger`], which routes records past
//! the bar so they print above it.

use std::sync::Arc;
use std::time::Duration;

use crime_forecast_ingest::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// Terminal progress for reading an incident file.
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Applied once the file size is known.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Spinner labelled `message` until the loader reports the CSV size,
    /// then bytes read out of that size.
    #[must_use]
    pub fn bytes_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "  {msg} {wide_bar:.cyan/dim} {bytes}/{total_bytes} {percent}% [{eta}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn set_position(&self, pos: u64) {
        self.bar.set_position(pos);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs `pretty_env_logger` behind the returned [`MultiProgress`].
/// Stage summaries log at `info`, which is shown unless `RUST_LOG`
/// narrows it. Load bars must be added to the returned handle.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .build();
    let level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(level);
    }

    multi
}
