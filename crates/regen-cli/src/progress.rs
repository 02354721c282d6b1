use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use regen_core::reconstruct::{ProgressReporter, ReconstructStage};

/// Progress reporter that draws one terminal bar per reconstruction stage.
pub struct IndicatifReporter {
    bar: Mutex<ProgressBar>,
    job: Mutex<String>,
}

impl IndicatifReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(ProgressBar::hidden()),
            job: Mutex::new(String::new()),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{msg:28} [{bar:40}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }
}

impl ProgressReporter for IndicatifReporter {
    fn begin_job(&self, name: &str) {
        if let Ok(mut job) = self.job.lock() {
            *job = name.to_string();
        }
    }

    fn begin_stage(&self, stage: ReconstructStage, total_items: Option<usize>) {
        let pb = match total_items {
            Some(total) => ProgressBar::new(total as u64),
            None => ProgressBar::new_spinner(),
        };
        pb.set_style(Self::style());
        let job = self.job.lock().map(|j| j.clone()).unwrap_or_default();
        if job.is_empty() {
            pb.set_message(stage.to_string());
        } else {
            pb.set_message(format!("{job}: {stage}"));
        }

        if let Ok(mut bar) = self.bar.lock() {
            bar.finish_and_clear();
            *bar = pb;
        }
    }

    fn advance(&self, items_done: usize) {
        if let Ok(bar) = self.bar.lock() {
            bar.set_position(items_done as u64);
        }
    }

    fn finish_stage(&self) {
        if let Ok(bar) = self.bar.lock() {
            bar.finish();
        }
    }
}
