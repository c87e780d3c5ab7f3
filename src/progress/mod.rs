use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

pub struct ProgressManager {
    multi_progress: MultiProgress,
    disabled: bool,
}

impl ProgressManager {
    pub fn new(disabled: bool) -> Self {
        ProgressManager {
            multi_progress: MultiProgress::new(),
            disabled,
        }
    }

    fn add(&self, bar: ProgressBar) -> ProgressBar {
        if self.disabled {
            ProgressBar::hidden()
        } else {
            let bar = self.multi_progress.add(bar);
            bar.enable_steady_tick(std::time::Duration::from_millis(100));
            bar
        }
    }

    pub fn create_query_bar(&self, total: usize) -> ProgressBar {
        let style = ProgressStyle::with_template(
            "{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}",
        )
        .unwrap()
        .progress_chars("=> ");

        let bar = self.add(ProgressBar::new(total as u64));
        bar.set_style(style);
        bar.set_prefix("Properties");

        bar
    }

    pub fn create_source_bars(&self, source_names: &[String]) -> Vec<ProgressBar> {
        let style = ProgressStyle::with_template(
            "{prefix:.bold.dim} [{bar:30.green/white}] {spinner} {wide_msg}",
        )
        .unwrap()
        .progress_chars("=> ")
        .with_key(
            "spinner",
            |state: &indicatif::ProgressState, w: &mut dyn std::fmt::Write| {
                write!(
                    w,
                    "{}",
                    ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"][state.pos() as usize % 10]
                )
                .unwrap();
            },
        );

        source_names
            .iter()
            .map(|name| {
                let bar = self.add(ProgressBar::new(100));
                bar.set_style(style.clone());
                bar.set_prefix(format!("{:<10}", name));
                bar
            })
            .collect()
    }

    pub fn create_filter_bar(&self) -> ProgressBar {
        let style =
            ProgressStyle::with_template("{prefix:.bold.dim} [{bar:40.yellow/white}] {wide_msg}")
                .unwrap()
                .progress_chars("=> ");

        let bar = self.add(ProgressBar::new(100));
        bar.set_style(style);
        bar.set_prefix("Filtering");

        bar
    }

    pub fn create_scoring_bar(&self, total: usize) -> ProgressBar {
        let style = ProgressStyle::with_template(
            "{prefix:.bold.dim} [{bar:40.magenta/white}] {pos}/{len} {wide_msg}",
        )
        .unwrap()
        .progress_chars("=> ");

        let bar = self.add(ProgressBar::new(total as u64));
        bar.set_style(style);
        bar.set_prefix("Scoring");

        bar
    }
}
