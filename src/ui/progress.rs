use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

use crate::driver::{ProgressUpdate, RunPhase, RunReport};
use crate::models::ContentKind;
use crate::progress::ProgressSnapshot;
use crate::ui::icons::{BLOG, CHECK, CROSS, LOCATION, SERVICE, SPARKLE, STOP, WARN};

/// Terminal UI for a generation run, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Run bar: run-level checkpoint (company, services, locations, titles, bodies)
/// - Items bar: settled work items out of the total, with per-status counts
pub struct GenerationUI {
    multi: MultiProgress,
    run_bar: ProgressBar,
    items_bar: ProgressBar,
    verbose: bool,
    phase: Mutex<Option<RunPhase>>,
}

impl GenerationUI {
    /// Create the UI for a run expected to produce `total_items` items.
    pub fn new(total_items: u64, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let run_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");
        let run_bar = multi.add(ProgressBar::new(100));
        run_bar.set_style(run_style);
        run_bar.set_prefix("  Run");

        let items_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} {spinner} {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string");
        let items_bar = multi.add(ProgressBar::new(total_items));
        items_bar.set_style(items_style);
        items_bar.set_prefix("Items");
        items_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            run_bar,
            items_bar,
            verbose,
            phase: Mutex::new(None),
        }
    }

    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Render one driver report.
    pub fn update(&self, update: &ProgressUpdate) {
        self.run_bar.set_position(u64::from(update.checkpoint));
        self.run_bar.set_message(phase_label(update.phase));
        self.show_snapshot(&update.snapshot);

        let mut last = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        if *last != Some(update.phase) {
            *last = Some(update.phase);
            if self.verbose {
                self.print_line(format!(
                    "    {} {}",
                    style("→").dim(),
                    style(phase_label(update.phase)).dim()
                ));
            }
        }
    }

    /// Render item counts, e.g. after a reconciliation reload.
    pub fn show_snapshot(&self, snapshot: &ProgressSnapshot) {
        self.items_bar.set_length(snapshot.total as u64);
        self.items_bar
            .set_position((snapshot.generated + snapshot.error) as u64);
        self.items_bar.set_message(format!(
            "{} generated, {} pending, {} failed",
            style(snapshot.generated).green(),
            snapshot.pending,
            style(snapshot.error).red()
        ));
    }

    pub fn finish_success(&self, report: &RunReport) {
        self.run_bar.finish_with_message(format!("{}done", CHECK));
        self.items_bar.finish();
        self.print_line(format!(
            "{}Generated {}/{} items ({}%) in {:.1}s",
            SPARKLE,
            report.snapshot.generated,
            report.snapshot.total,
            report.snapshot.percent_complete,
            report.duration.as_secs_f64()
        ));
        if report.snapshot.error > 0 {
            self.print_line(format!(
                "{}{} item(s) failed and were marked 'error'",
                WARN,
                style(report.snapshot.error).red()
            ));
        }
        if report.template_titles > 0 {
            self.print_line(format!(
                "    {} title(s) came from templates",
                report.template_titles
            ));
        }
    }

    pub fn finish_cancelled(&self, report: &RunReport) {
        self.run_bar.abandon_with_message(format!("{}cancelled", STOP));
        self.items_bar.abandon();
        self.print_line(format!(
            "{}Run cancelled: {} generated, {} still pending",
            STOP, report.snapshot.generated, report.snapshot.pending
        ));
    }

    pub fn finish_error(&self, error: &str) {
        self.run_bar
            .abandon_with_message(format!("{}{}", CROSS, style("failed").red()));
        self.items_bar.abandon();
        self.print_line(format!("{}{}", CROSS, style(error).red()));
    }
}

fn phase_label(phase: RunPhase) -> &'static str {
    match phase {
        RunPhase::Company => "saving company",
        RunPhase::Services => "replacing services",
        RunPhase::Locations => "replacing locations",
        RunPhase::Titles => "titles ready",
        RunPhase::Bodies => "writing content",
        RunPhase::Finished => "finished",
    }
}

/// Icon for a content kind, used in item listings.
pub fn kind_icon(kind: ContentKind) -> String {
    match kind {
        ContentKind::Service => SERVICE.to_string(),
        ContentKind::Location => LOCATION.to_string(),
        ContentKind::Blog => BLOG.to_string(),
    }
}
