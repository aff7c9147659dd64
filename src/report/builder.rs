use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::report::{
    render_comparison, ChartRequest, ReportDocument, ReportPlan, ReportView, ReportViews,
    SpatialContext,
};
use crate::utils::unique_file_name;

/// Renders a report plan into chart images and one PDF
pub struct ReportBuilder<'a> {
    output_dir: &'a Path,
    chart_size: (u32, u32),
}

impl<'a> ReportBuilder<'a> {
    pub fn new(output_dir: &'a Path, chart_size: (u32, u32)) -> Self {
        Self {
            output_dir,
            chart_size,
        }
    }

    /// Draw one chart per page into uniquely named PNGs in the output directory
    pub fn render_charts(
        &self,
        plan: &ReportPlan,
        views: &ReportViews,
        context: &SpatialContext,
    ) -> Result<Vec<PathBuf>> {
        plan.pages()
            .iter()
            .map(|request| self.render_page(request, views, context))
            .collect()
    }

    fn render_page(
        &self,
        request: &ChartRequest,
        views: &ReportViews,
        context: &SpatialContext,
    ) -> Result<PathBuf> {
        let path = self.output_dir.join(unique_file_name("png"));
        let size = self.chart_size;

        match request.view {
            ReportView::Full => {
                render_comparison(&views.hourly, &request.title, request.mode, context, size, &path)?
            }
            ReportView::Window { start, len } => {
                let window = views.hourly.window(start, len);
                render_comparison(&window, &request.title, request.mode, context, size, &path)?
            }
            ReportView::Diurnal => {
                render_comparison(&views.diurnal, &request.title, request.mode, context, size, &path)?
            }
            ReportView::Daily => {
                render_comparison(&views.daily, &request.title, request.mode, context, size, &path)?
            }
            ReportView::Monthly => {
                render_comparison(&views.monthly, &request.title, request.mode, context, size, &path)?
            }
        }

        Ok(path)
    }

    /// Render every chart and assemble them, in plan order, into `pdf_path`
    pub fn build(
        &self,
        title: &str,
        plan: &ReportPlan,
        views: &ReportViews,
        context: &SpatialContext,
        pdf_path: &Path,
    ) -> Result<Vec<PathBuf>> {
        let charts = self.render_charts(plan, views, context)?;

        let mut document = ReportDocument::new(title);
        for chart in &charts {
            document.add_image_page(chart);
        }
        document.save(pdf_path)?;

        Ok(charts)
    }
}
