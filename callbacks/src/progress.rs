//! Progress display driven by [`crate::BaseLogger`].
use indicatif::{ProgressBar, ProgressStyle};

/// Receives progress updates during an epoch.
pub trait ProgressDisplay {
    /// Reports that `current` samples have been processed, together with the
    /// labelled metric values to show next to the bar.
    fn update(&mut self, current: usize, values: &[(&str, f64)]);
}

/// Terminal progress bar over the samples of one epoch.
///
/// At verbosity 1 the bar is redrawn on every update; at higher levels the
/// bar stays hidden and a single summary line is printed once the target is
/// reached.
#[derive(Debug)]
pub struct Progbar {
    bar: ProgressBar,
    target: usize,
    verbose: u8,
}

impl Progbar {
    pub fn new(target: usize, verbose: u8) -> Self {
        let bar = if verbose == 1 {
            ProgressBar::new(target as u64)
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(create_progress_style(
            "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
        ));
        Self {
            bar,
            target,
            verbose,
        }
    }
}

impl ProgressDisplay for Progbar {
    fn update(&mut self, current: usize, values: &[(&str, f64)]) {
        let message = format_values(values);
        self.bar.set_position(current as u64);
        self.bar.set_message(message.clone());

        if current >= self.target {
            self.bar.finish();
            if self.verbose > 1 {
                println!("{current}/{} - {message}", self.target);
            }
        }
    }
}

/// Creates a progress bar style with the specified template.
///
/// Falls back to the default bar if the template does not parse.
fn create_progress_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// Formats labelled values as `loss: 0.1234 - acc.: 0.9000`.
pub(crate) fn format_values(values: &[(&str, f64)]) -> String {
    values
        .iter()
        .map(|(label, value)| format!("{label}: {value:.4}"))
        .collect::<Vec<_>>()
        .join(" - ")
}
