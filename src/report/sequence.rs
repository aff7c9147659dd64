use rand::Rng;

use crate::models::{ComparisonTable, HourOfDay};
use crate::processors::{daily_mean, diurnal_cycle, monthly_mean};
use crate::report::ChartMode;

/// Which derived table a report page draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportView {
    /// The full hourly table
    Full,
    /// `len` consecutive hourly rows starting at `start`
    Window { start: usize, len: usize },
    Diurnal,
    Daily,
    Monthly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartRequest {
    pub title: String,
    pub mode: ChartMode,
    pub view: ReportView,
}

impl ChartRequest {
    fn new(title: String, mode: ChartMode, view: ReportView) -> Self {
        Self { title, mode, view }
    }
}

/// Every table a report draws, derived once from the hourly comparison
#[derive(Debug, Clone)]
pub struct ReportViews {
    pub hourly: ComparisonTable,
    pub diurnal: ComparisonTable<HourOfDay>,
    pub daily: ComparisonTable,
    pub monthly: ComparisonTable,
}

impl ReportViews {
    /// The monthly table is resampled from the daily one, so each month is
    /// a mean of daily means.
    pub fn from_hourly(hourly: ComparisonTable) -> Self {
        let diurnal = diurnal_cycle(&hourly);
        let daily = daily_mean(&hourly);
        let monthly = monthly_mean(&daily);
        Self {
            hourly,
            diurnal,
            daily,
            monthly,
        }
    }
}

/// Random start for a window of `len` rows in a table of `total` rows.
///
/// A table no longer than the window is used whole.
pub fn sample_window_start<R: Rng + ?Sized>(total: usize, len: usize, rng: &mut R) -> usize {
    if total <= len {
        return 0;
    }
    rng.gen_range(0..=total - len)
}

/// The ordered chart pages of a validation report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPlan {
    pages: Vec<ChartRequest>,
}

impl ReportPlan {
    pub fn build<R: Rng + ?Sized>(
        station: &str,
        hourly_rows: usize,
        window_count: usize,
        window_steps: usize,
        rng: &mut R,
    ) -> Self {
        let mut pages = vec![
            ChartRequest::new(
                format!("{}, Difference to Measurements", station),
                ChartMode::Delta,
                ReportView::Full,
            ),
            ChartRequest::new(station.to_string(), ChartMode::Absolute, ReportView::Full),
        ];

        let window_title = window_title(station, window_steps);
        for _ in 0..window_count {
            let start = sample_window_start(hourly_rows, window_steps, rng);
            pages.push(ChartRequest::new(
                window_title.clone(),
                ChartMode::Absolute,
                ReportView::Window {
                    start,
                    len: window_steps,
                },
            ));
        }

        pages.extend([
            ChartRequest::new(
                format!("{}, Average Diurnal Cycle", station),
                ChartMode::Absolute,
                ReportView::Diurnal,
            ),
            ChartRequest::new(
                format!("{} - Daily mean, delta to measurements", station),
                ChartMode::Delta,
                ReportView::Daily,
            ),
            ChartRequest::new(
                format!("{} - Daily mean", station),
                ChartMode::Absolute,
                ReportView::Daily,
            ),
            ChartRequest::new(
                format!("{} - Monthly mean", station),
                ChartMode::Absolute,
                ReportView::Monthly,
            ),
        ]);

        Self { pages }
    }

    pub fn pages(&self) -> &[ChartRequest] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

fn window_title(station: &str, steps: usize) -> String {
    if steps > 0 && steps % 24 == 0 {
        format!("{}, {} Day Period", station, steps / 24)
    } else {
        format!("{}, {} Step Period", station, steps)
    }
}
