//! Ratatui-based interactive plot window.
//!
//! Shows simulated trial curves, their mean and the experimental amplitudes for
//! the current parameters. The parameter panel can be nudged live; every change
//! re-simulates and re-scores all three cohorts.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};

use crate::domain::{Cohort, Evaluation, FacParams, FitConfig};
use crate::error::AppError;
use crate::fit::{NONZERO_DELTA, Objective, OptimizerOptions, SimSettings, ZERO_DELTA, fit_params};
use crate::io::ExperimentData;
use crate::sim::{TimeGrid, TrialBatch};

mod plotters_chart;

use plotters_chart::FacPlottersChart;

/// Start the interactive view on already loaded data.
pub fn run(config: FitConfig, data: ExperimentData) -> Result<(), AppError> {
    let mut app = App::new(config, data)?;

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct App {
    config: FitConfig,
    data: ExperimentData,
    settings: SimSettings,
    params: FacParams,
    selected_field: usize,
    status: String,
    eval: Option<Evaluation>,
    batch: Option<TrialBatch>,
}

impl App {
    fn new(config: FitConfig, data: ExperimentData) -> Result<Self, AppError> {
        let settings = crate::app::pipeline::sim_settings(&config)?;
        let mut app = Self {
            params: config.initial,
            config,
            data,
            settings,
            selected_field: 0,
            status: String::new(),
            eval: None,
            batch: None,
        };
        app.recompute()?;
        app.status = "Ready.".to_string();
        Ok(app)
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code)? {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool, AppError> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Up => {
                self.selected_field = self.selected_field.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.selected_field + 1 < FacParams::LEN {
                    self.selected_field += 1;
                }
            }
            KeyCode::Left => self.adjust_field(-1)?,
            KeyCode::Right => self.adjust_field(1)?,
            KeyCode::Char('r') => {
                self.settings.seed = self.settings.seed.wrapping_add(1);
                self.config.seed = self.settings.seed;
                self.recompute()?;
                self.status = format!("Reseeded: seed={}", self.settings.seed);
            }
            KeyCode::Char('0') => {
                self.params = self.config.initial;
                self.recompute()?;
                self.status = "Reset to initial parameters.".to_string();
            }
            KeyCode::Char('f') => self.run_fit()?,
            KeyCode::Char('d') => {
                let Some(eval) = &self.eval else {
                    self.status = "Nothing evaluated yet.".to_string();
                    return Ok(false);
                };
                match crate::debug::write_debug_bundle(&self.data, eval, &[], &self.config) {
                    Ok(path) => {
                        self.status = format!("Wrote debug bundle: {}", path.display());
                    }
                    Err(err) => {
                        self.status = format!("Debug write failed: {err}");
                    }
                }
            }
            _ => {}
        }

        Ok(false)
    }

    fn adjust_field(&mut self, delta: i32) -> Result<(), AppError> {
        let mut values = self.params.to_vec();
        let Some(v) = values.get_mut(self.selected_field) else {
            return Ok(());
        };
        *v = nudge(*v, delta);
        self.params = FacParams::from_slice(&values).map_err(|e| AppError::new(4, e))?;
        self.recompute()?;
        self.status = format!(
            "{} = {:.6}",
            FacParams::NAMES[self.selected_field],
            values[self.selected_field]
        );
        Ok(())
    }

    /// Re-simulate and re-score the current parameters.
    fn recompute(&mut self) -> Result<(), AppError> {
        let objective = Objective::new(&self.data, self.settings.clone());
        let (eval, batch) = objective.evaluate_with_batch(&self.params)?;
        self.batch = batch;
        self.eval = Some(eval);
        Ok(())
    }

    /// Minimize from the current parameters and jump to the result.
    fn run_fit(&mut self) -> Result<(), AppError> {
        let best = {
            let objective = Objective::new(&self.data, self.settings.clone());
            let opts = OptimizerOptions {
                max_iters: self.config.max_iters,
                sd_tolerance: self.config.sd_tolerance,
            };
            fit_params(&objective, &self.params, &opts)?
        };
        self.params = best.best;
        self.recompute()?;
        self.status = format!(
            "Fit done: {} iterations, {} evaluations ({})",
            best.summary.iterations, best.summary.evaluations, best.summary.termination
        );
        Ok(())
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("fac", Style::default().fg(Color::Cyan)),
            Span::raw(" - MEP facilitation curves"),
        ]));

        let n: Vec<String> = self
            .data
            .cohorts
            .iter()
            .map(|c| format!("{}: n={}", c.cohort.label(), c.stats.n))
            .collect();
        lines.push(Line::from(Span::styled(
            format!(
                "n_rep: {} | seed: {} | nbins: {} | {}",
                self.settings.n_rep,
                self.settings.seed,
                self.settings.nbins,
                n.join(" | ")
            ),
            Style::default().fg(Color::Gray),
        )));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(38)])
            .split(area);

        self.draw_chart(frame, chunks[0]);

        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(FacParams::LEN as u16 + 2), Constraint::Min(0)])
            .split(chunks[1]);
        self.draw_params(frame, side[0]);
        self.draw_scores(frame, side[1]);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Facilitation").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(batch) = &self.batch else {
            let msg = Paragraph::new("Parameters outside model domain.")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default());
            frame.render_widget(msg, inner);
            return;
        };

        let series = chart_series(batch, &self.settings.grid, &self.data, self.config.plot_curves);

        let (chart_rect, insets) = chart_layout(inner);
        let widget = FacPlottersChart {
            trials: &series.trials,
            mean: &series.mean,
            points: &series.points,
            x_bounds: series.x_bounds,
            y_bounds: series.y_bounds,
            x_label: "time to target (s)",
            y_label: "facilitation",
            fmt_x: fmt_axis_x,
            fmt_y: fmt_axis_y,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, series.x_bounds, series.y_bounds);
        }
    }

    fn draw_params(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = FacParams::NAMES
            .iter()
            .zip(self.params.to_vec())
            .map(|(name, v)| ListItem::new(format!("{name:<11} {v:>12.6}")))
            .collect();

        let list = List::new(items)
            .block(Block::default().title("Parameters").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ratatui::widgets::ListState::default();
        state.select(Some(self.selected_field));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_scores(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        match &self.eval {
            Some(eval) if !eval.scores.is_empty() => {
                for cohort in Cohort::ALL {
                    if let Some(s) = eval.score(cohort) {
                        lines.push(Line::from(format!(
                            "X2_{:<4} {:>12.4}  p={:.3}",
                            cohort.ms(),
                            s.statistic,
                            s.p_value
                        )));
                    }
                }
                lines.push(Line::from(Span::styled(
                    format!("summed  {:>12.4}", eval.total),
                    Style::default().add_modifier(Modifier::BOLD),
                )));
            }
            Some(eval) => {
                lines.push(Line::from(Span::styled(
                    format!("X2 summed = {}", eval.total),
                    Style::default().fg(Color::Yellow),
                )));
            }
            None => lines.push(Line::from("-")),
        }

        let p = Paragraph::new(Text::from(lines)).block(Block::default().title("Chi-square").borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ select  ←/→ nudge 5%  f fit  r reseed  0 reset  d debug  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Scale a parameter by the simplex step (or step off zero).
fn nudge(value: f64, delta: i32) -> f64 {
    if value == 0.0 {
        return ZERO_DELTA * delta.signum() as f64;
    }
    let factor = if delta >= 0 { 1.0 + NONZERO_DELTA } else { 1.0 - NONZERO_DELTA };
    value * factor
}

struct ChartSeries {
    trials: Vec<Vec<(f64, f64)>>,
    mean: Vec<(f64, f64)>,
    points: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

/// Build chart series for Plotters.
fn chart_series(batch: &TrialBatch, grid: &TimeGrid, data: &ExperimentData, n_curves: usize) -> ChartSeries {
    let times = grid.times();
    let trials: Vec<Vec<(f64, f64)>> = (0..n_curves.min(batch.n_trials()))
        .map(|i| times.iter().copied().zip(batch.trial(i)).collect())
        .collect();
    let mean: Vec<(f64, f64)> = times.iter().copied().zip(batch.mean_curve()).collect();
    let points: Vec<(f64, f64)> = data
        .cohorts
        .iter()
        .flat_map(|c| c.values.iter().map(move |&v| (c.cohort.probe_time(), v)))
        .collect();

    let (t0, t1) = (grid.first(), grid.last());
    let x_bounds = if t1 > t0 { [t0, t1] } else { [t0 - 0.05, t0 + 0.05] };

    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(_, y) in trials.iter().flatten().chain(&mean).chain(&points) {
        if y.is_finite() {
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }
    if !y_min.is_finite() || !y_max.is_finite() || y_max <= y_min {
        y_min = 0.0;
        y_max = 1.0;
    }
    let pad = ((y_max - y_min).abs() * 0.05).max(1e-12);

    ChartSeries {
        trials,
        mean,
        points,
        x_bounds,
        y_bounds: [y_min - pad, y_max + pad],
    }
}

fn fmt_axis_x(v: f64) -> String {
    format!("{v:.2}")
}

fn fmt_axis_y(v: f64) -> String {
    format!("{v:.2}")
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 8,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let x_val = x_bounds[0] + u * (x_bounds[1] - x_bounds[0]);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = format!("{x_val:.2}");
        let label_len = label.len() as u16;
        let start = x.saturating_sub((label.len() / 2) as u16);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y_val = y_bounds[0] + u * (y_bounds[1] - y_bounds[0]);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = format!("{y_val:.2}");
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label.len() as u16);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new("time to target (s)")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new("fac")
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DEFAULT_GRID, DEFAULT_INITIAL};
    use crate::sim::simulate_trials;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn nudge_scales_by_simplex_step() {
        assert!((nudge(2.0, 1) - 2.1).abs() < 1e-12);
        assert!((nudge(2.0, -1) - 1.9).abs() < 1e-12);
        assert_eq!(nudge(0.0, 1), ZERO_DELTA);
        assert_eq!(nudge(0.0, -1), -ZERO_DELTA);
    }

    #[test]
    fn chart_series_spans_grid_and_data() {
        let grid = TimeGrid::new(&DEFAULT_GRID).unwrap();
        let batch = simulate_trials(&DEFAULT_INITIAL, &grid, 10, &mut StdRng::seed_from_u64(1)).unwrap();
        let data = ExperimentData { cohorts: Vec::new() };
        let series = chart_series(&batch, &grid, &data, 3);
        assert_eq!(series.trials.len(), 3);
        assert_eq!(series.mean.len(), grid.len());
        assert_eq!(series.x_bounds[0], -0.4);
        assert!(series.y_bounds[0] < 0.0 && series.y_bounds[1] > 0.0);
    }
}
