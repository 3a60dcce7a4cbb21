use std::env;
use std::error::Error;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Duration as StdDuration, Instant};

use chrono::{Datelike, Duration, NaiveDate};
use crossterm::event::{
	self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyCode, KeyEvent, KeyEventKind,
	KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::style::Print;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use log::info;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};

use crate::analytics::{FunnelMemo, RangeAnalytics};
use crate::binder::DayBuckets;
use crate::config::CalendarConfig;
use crate::detail::{
	Clipboard, CompanyCount, CopyState, CopyFeedback, DetailScope, DetailView, QuickAddForm,
	ScoreHistogram, SCORE_BUCKET_LABELS, Sparkline, cycle_status, export_csv, summary_text,
	toggle_chip,
};
use crate::domain::{ApplicationStatus, DateRange, StatusFilter, today};
use crate::error::CalendarError;
use crate::grid::{ViewMode, build_grid, first_day_of_month, month_range, shift_month};
use crate::ics::{ExportScope, export_scope};
use crate::prefs::{DensityMode, PreferenceStore, ViewPreferences};
use crate::selection::{ArrowKey, InputEvent, QueuedInputPort, RangeChange, SelectionSession};
use crate::storage::Tracker;
use crate::visual::{CellContext, CellVisual, RangeMark, StatusTone, describe_cell};

const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);
const RANGE_BACKGROUND_COLOR: Color = Color::Rgb(38, 52, 78);
const HEAT_BACKGROUND_COLORS: [Color; 4] = [
	Color::Rgb(22, 38, 30),
	Color::Rgb(28, 60, 42),
	Color::Rgb(34, 84, 54),
	Color::Rgb(40, 110, 66),
];
const SPARK_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub fn run_dashboard(
	tracker: &mut Tracker,
	config: &CalendarConfig,
	prefs: PreferenceStore,
) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let export_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
	let mut dashboard = Dashboard::new(tracker, config, prefs, Box::new(Osc52Clipboard), export_dir, today());
	let result = run_event_loop(&mut terminal, &mut dashboard);
	dashboard.close();

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	dashboard: &mut Dashboard<'_>,
) -> Result<(), Box<dyn Error>> {
	let mut hits: Vec<CellHit> = Vec::new();

	loop {
		let now = Instant::now();
		let today = today();
		dashboard.app.copy_feedback.tick(now);
		let view = dashboard.build_view(today);
		dashboard.app.clamp_detail_index(&view);
		let app = &dashboard.app;
		terminal.draw(|frame| hits = draw_dashboard(frame, app, &view, now))?;

		if event::poll(StdDuration::from_millis(250))? {
			let should_quit = match event::read()? {
				CEvent::Key(key) if key.kind == KeyEventKind::Press => dashboard.handle_key(key, &view),
				CEvent::Mouse(mouse) => {
					dashboard.handle_mouse(mouse, &hits);
					false
				}
				_ => false,
			};
			dashboard.pump(today);

			if should_quit {
				break;
			}
		}
	}

	Ok(())
}

/// Writes to the system clipboard with an OSC 52 escape sequence.
struct Osc52Clipboard;

impl Clipboard for Osc52Clipboard {
	fn write_text(&mut self, text: &str) -> Result<(), CalendarError> {
		let mut stdout = io::stdout();
		execute!(stdout, Print(osc52_sequence(text))).map_err(|err| CalendarError::Clipboard(err.to_string()))
	}
}

fn osc52_sequence(text: &str) -> String {
	use base64::engine::general_purpose::STANDARD;
	use base64::Engine as _;

	let encoded = STANDARD.encode(text.as_bytes());
	format!("\x1b]52;c;{encoded}\x1b\\")
}

struct Dashboard<'a> {
	app: App,
	tracker: &'a mut Tracker,
	config: &'a CalendarConfig,
	prefs: PreferenceStore,
	port: QueuedInputPort,
	session: SelectionSession,
	memo: FunnelMemo,
	clipboard: Box<dyn Clipboard>,
	export_dir: PathBuf,
}

impl<'a> Dashboard<'a> {
	fn new(
		tracker: &'a mut Tracker,
		config: &'a CalendarConfig,
		prefs: PreferenceStore,
		clipboard: Box<dyn Clipboard>,
		export_dir: PathBuf,
		today: NaiveDate,
	) -> Self {
		let mut port = QueuedInputPort::new();
		let (session, restored) = SelectionSession::attach(&mut port, &prefs);
		let mut app = App::new(today, prefs.view_preferences(), prefs.detail_filters());
		if let Some(RangeChange::Selected(range)) = restored {
			app.cursor = range.start;
			app.focal_month = first_day_of_month(range.start);
			app.status = format!("Restored range {} to {}", range.start, range.end);
		}

		Self {
			app,
			tracker,
			config,
			prefs,
			port,
			session,
			memo: FunnelMemo::new(),
			clipboard,
			export_dir,
		}
	}

	fn close(&mut self) {
		self.session.detach(&mut self.port);
	}

	fn range(&self) -> Option<DateRange> {
		self.session.selection().range()
	}

	/// The completed range, or the cursor day when no range is active.
	fn detail_scope(&self) -> DetailScope {
		match self.range() {
			Some(range) => DetailScope::Range(range),
			None => DetailScope::Day(self.app.cursor),
		}
	}

	fn build_view(&mut self, today: NaiveDate) -> ViewModel {
		let range = self.range();
		let events = self.tracker.events();
		let cells = build_grid(
			self.app.focal_month,
			self.app.cursor,
			self.app.view_prefs.view_mode,
			self.config.week_start,
		);
		let buckets = DayBuckets::bind(&events, &self.app.grid_filter);
		let context = CellContext {
			today,
			selected: Some(self.app.cursor),
			range,
			anchor: if range.is_none() {
				self.session.selection().anchor()
			} else {
				None
			},
			max_count: buckets.max_count_over(&cells),
			max_visible: self.config.max_visible_events_per_day,
			prefs: self.app.view_prefs,
		};
		let cells = cells
			.iter()
			.map(|cell| describe_cell(cell, buckets.get(cell.date), &context))
			.collect();

		let funnel_scope = range.unwrap_or_else(|| month_range(self.app.focal_month));
		let analytics = self
			.memo
			.get(&self.tracker.applications, funnel_scope, &self.app.grid_filter)
			.clone();

		let scope = self.detail_scope();
		let detail = DetailView::compute(scope, &self.tracker.applications, &self.app.chips);

		ViewModel {
			cells,
			weekday_labels: self.config.week_start.weekday_labels(),
			funnel_scope,
			analytics,
			detail: DetailPanel::from_view(&detail),
		}
	}

	fn handle_key(&mut self, key: KeyEvent, view: &ViewModel) -> bool {
		match &self.app.mode {
			InputMode::Prompt(_) => {
				self.handle_prompt_key(key.code);
				false
			}
			InputMode::Select(_) => {
				self.handle_select_key(key.code);
				false
			}
			InputMode::Normal => self.handle_normal_key(key, view),
		}
	}

	fn handle_normal_key(&mut self, key: KeyEvent, view: &ViewModel) -> bool {
		let shift = key.modifiers.contains(KeyModifiers::SHIFT);
		match key.code {
			KeyCode::Char('q') => return true,
			KeyCode::Esc => {
				self.session.selection_mut().clear();
				self.app.status = "Range cleared".to_string();
			}
			KeyCode::Tab | KeyCode::BackTab => self.app.focus = self.app.focus.toggled(),
			KeyCode::Left | KeyCode::Right | KeyCode::Up | KeyCode::Down => {
				if let Some(arrow) = arrow_key(key.code) {
					self.handle_arrow(arrow, shift);
				}
			}
			KeyCode::Char('h') => self.handle_arrow(ArrowKey::Left, false),
			KeyCode::Char('l') => self.handle_arrow(ArrowKey::Right, false),
			KeyCode::Char('k') => self.handle_arrow(ArrowKey::Up, false),
			KeyCode::Char('j') => self.handle_arrow(ArrowKey::Down, false),
			KeyCode::Char('H') => self.handle_arrow(ArrowKey::Left, true),
			KeyCode::Char('L') => self.handle_arrow(ArrowKey::Right, true),
			KeyCode::Char('K') => self.handle_arrow(ArrowKey::Up, true),
			KeyCode::Char('J') => self.handle_arrow(ArrowKey::Down, true),
			KeyCode::Enter | KeyCode::Char(' ') => self.port.dispatch(InputEvent::Click(self.app.cursor)),
			KeyCode::Char('n') => self.app.shift_month(1),
			KeyCode::Char('p') => self.app.shift_month(-1),
			KeyCode::Char('t') => self.app.jump_to(today()),
			KeyCode::Char('w') => {
				self.app.view_prefs.view_mode = match self.app.view_prefs.view_mode {
					ViewMode::Month => ViewMode::Week,
					ViewMode::Week => ViewMode::Month,
				};
				self.save_view_preferences();
			}
			KeyCode::Char('d') => {
				self.app.view_prefs.density_mode = self.app.view_prefs.density_mode.toggled();
				self.save_view_preferences();
			}
			KeyCode::Char('c') => {
				self.app.view_prefs.focus_contrast = !self.app.view_prefs.focus_contrast;
				self.save_view_preferences();
			}
			KeyCode::Char(digit @ '1'..='6') => {
				let index = digit as usize - '1' as usize;
				let status = ApplicationStatus::ALL[index];
				toggle_chip(&mut self.app.chips, status, &mut self.prefs);
				self.app.detail_index = 0;
				self.app.status = format!("Detail filter: {}", filter_label(&self.app.chips));
			}
			KeyCode::Char('0') => {
				self.app.chips.clear();
				self.prefs.save_detail_filters(&self.app.chips);
				self.app.status = "Detail filter cleared".to_string();
			}
			KeyCode::Char('f') => self.app.mode = InputMode::Select(build_grid_filter_select(&self.app.grid_filter)),
			KeyCode::Char('a') => {
				self.app.quick_add = QuickAddForm::default();
				self.app.quick_add_scope = Some(self.detail_scope());
				self.app.mode = InputMode::Prompt(PromptState::new("Job title", PromptKind::QuickAddTitle));
			}
			KeyCode::Char('s') => self.cycle_selected_status(view),
			KeyCode::Char('e') => self.export_calendar(),
			KeyCode::Char('x') => self.export_detail_csv(),
			KeyCode::Char('y') => self.copy_summary(),
			_ => {}
		}

		false
	}

	fn handle_arrow(&mut self, arrow: ArrowKey, shift: bool) {
		if shift {
			// Anchor on the cursor rather than on today when nothing is selected yet.
			if self.session.selection().anchor().is_none() {
				self.port.dispatch(InputEvent::Click(self.app.cursor));
			}
			self.port.dispatch(InputEvent::Arrow { key: arrow, shift: true });
			self.app.move_cursor(arrow.day_delta());
			return;
		}

		match self.app.focus {
			FocusPane::Calendar => self.app.move_cursor(arrow.day_delta()),
			FocusPane::Detail => match arrow {
				ArrowKey::Up => self.app.detail_index = self.app.detail_index.saturating_sub(1),
				ArrowKey::Down => self.app.detail_index += 1,
				ArrowKey::Left | ArrowKey::Right => self.app.move_cursor(arrow.day_delta()),
			},
		}
	}

	fn handle_mouse(&mut self, mouse: MouseEvent, hits: &[CellHit]) {
		let target = hit_test(hits, mouse.column, mouse.row);
		match mouse.kind {
			MouseEventKind::Down(MouseButton::Left) => {
				if let Some(date) = target {
					self.app.cursor = date;
					self.app.focus = FocusPane::Calendar;
					self.port.dispatch(InputEvent::PointerDown(date));
				}
			}
			MouseEventKind::Drag(MouseButton::Left) => {
				if let Some(date) = target {
					self.port.dispatch(InputEvent::PointerEnter(date));
				}
			}
			MouseEventKind::Up(MouseButton::Left) => self.port.dispatch(InputEvent::PointerUp),
			_ => {}
		}
	}

	fn pump(&mut self, today: NaiveDate) {
		for change in self.session.pump(&mut self.port, today, &mut self.prefs) {
			match change {
				RangeChange::Selected(range) => {
					self.app.detail_index = 0;
					self.app.status = format!(
						"Range {} to {} ({} days)",
						range.start,
						range.end,
						range.len_days()
					);
				}
				RangeChange::Cleared => {
					if let Some(anchor) = self.session.selection().anchor() {
						self.app.status = format!("Range starts {anchor}; pick the end day");
					}
				}
			}
		}
	}

	fn handle_prompt_key(&mut self, code: KeyCode) {
		match code {
			KeyCode::Esc => {
				self.app.mode = InputMode::Normal;
				self.app.status = "Input cancelled".to_string();
			}
			KeyCode::Backspace => {
				if let InputMode::Prompt(prompt) = &mut self.app.mode {
					prompt.input.pop();
				}
			}
			KeyCode::Char(value) => {
				if let InputMode::Prompt(prompt) = &mut self.app.mode {
					prompt.input.push(value);
				}
			}
			KeyCode::Enter => {
				let prompt = match std::mem::replace(&mut self.app.mode, InputMode::Normal) {
					InputMode::Prompt(prompt) => prompt,
					InputMode::Normal | InputMode::Select(_) => return,
				};

				match self.submit_prompt(prompt.clone()) {
					Ok(PromptOutcome::NextPrompt(next_prompt)) => self.app.mode = InputMode::Prompt(next_prompt),
					Ok(PromptOutcome::Select(select)) => self.app.mode = InputMode::Select(select),
					Err(err) => {
						self.app.mode = InputMode::Prompt(prompt);
						self.app.status = format!("error: {err}");
					}
				}
			}
			_ => {}
		}
	}

	fn handle_select_key(&mut self, code: KeyCode) {
		match code {
			KeyCode::Esc => {
				self.app.mode = InputMode::Normal;
				self.app.status = "Selection cancelled".to_string();
			}
			KeyCode::Up | KeyCode::Char('k') => {
				if let InputMode::Select(select) = &mut self.app.mode {
					select.move_selection(-1);
				}
			}
			KeyCode::Down | KeyCode::Char('j') => {
				if let InputMode::Select(select) = &mut self.app.mode {
					select.move_selection(1);
				}
			}
			KeyCode::Enter => {
				let select = match std::mem::replace(&mut self.app.mode, InputMode::Normal) {
					InputMode::Select(select) => select,
					_ => return,
				};

				match self.submit_select(select.clone()) {
					Ok(message) => self.app.status = message,
					Err(err) => {
						self.app.mode = InputMode::Select(select);
						self.app.status = format!("error: {err}");
					}
				}
			}
			_ => {}
		}
	}

	fn submit_prompt(&mut self, prompt: PromptState) -> Result<PromptOutcome, String> {
		match prompt.kind {
			PromptKind::QuickAddTitle => {
				self.app.quick_add.job_title = required_text(&prompt.input, "job title")?;
				Ok(PromptOutcome::NextPrompt(PromptState::new("Company", PromptKind::QuickAddCompany)))
			}
			PromptKind::QuickAddCompany => {
				self.app.quick_add.company = required_text(&prompt.input, "company")?;
				Ok(PromptOutcome::Select(build_status_select()))
			}
		}
	}

	fn submit_select(&mut self, select: SelectState) -> Result<String, String> {
		let selected_value = select
			.selected_option()
			.map(|option| option.value.clone())
			.ok_or_else(|| "no option selected".to_string())?;

		match select.kind {
			SelectKind::QuickAddStatus => {
				let status = selected_value
					.as_deref()
					.and_then(ApplicationStatus::parse)
					.unwrap_or(ApplicationStatus::Pending);
				self.app.quick_add.status = status;
				let scope = self.app.quick_add_scope.unwrap_or_else(|| self.detail_scope());
				let created = self
					.app
					.quick_add
					.submit(scope, &mut *self.tracker)
					.map_err(|err| err.to_string())?
					.ok_or_else(|| "job title and company are required".to_string())?;
				self.memo.invalidate();
				Ok(format!(
					"Added {} @ {} on {}",
					created.job_title,
					created.company,
					created.applied_date.format("%Y-%m-%d")
				))
			}
			SelectKind::GridFilter => {
				match selected_value.as_deref().and_then(ApplicationStatus::parse) {
					Some(status) => self.app.grid_filter.toggle(status),
					None => self.app.grid_filter.clear(),
				}
				Ok(format!("Calendar filter: {}", filter_label(&self.app.grid_filter)))
			}
		}
	}

	fn cycle_selected_status(&mut self, view: &ViewModel) {
		let Some(row) = view.detail.rows.get(self.app.detail_index) else {
			self.app.status = "No application selected".to_string();
			return;
		};
		let Some(record) = self.tracker.find(&row.id).cloned() else {
			self.app.status = format!("error: application {} is gone", row.id);
			return;
		};

		self.app.status = match cycle_status(&record, &mut *self.tracker) {
			Ok(next) => {
				self.memo.invalidate();
				format!("{} is now {next}", record.job_title)
			}
			Err(err) => format!("error: {err}"),
		};
	}

	fn export_calendar(&mut self) {
		let events = self.tracker.events();
		let scope = ExportScope::pick(self.app.focal_month, self.range());
		let (file_name, body) = export_scope(
			&events,
			scope,
			&self.app.grid_filter,
			&self.config.export_prefix,
			&self.config.ics_options(),
		);
		let path = self.export_dir.join(file_name);
		self.app.status = match fs::write(&path, body) {
			Ok(()) => format!("Calendar exported to {}", path.display()),
			Err(err) => format!("error: {err}"),
		};
	}

	fn export_detail_csv(&mut self) {
		let scope = self.detail_scope();
		let detail = DetailView::compute(scope, &self.tracker.applications, &self.app.chips);
		let path = self.export_dir.join(scope.csv_file_name(&self.config.export_prefix));
		let result = export_csv(detail.applications.iter().copied())
			.and_then(|body| fs::write(&path, body).map_err(CalendarError::from));
		self.app.status = match result {
			Ok(()) => {
				info!("event=csv_written path={}", path.display());
				format!("CSV exported to {}", path.display())
			}
			Err(err) => format!("error: {err}"),
		};
	}

	fn copy_summary(&mut self) {
		let text = {
			let detail = DetailView::compute(self.detail_scope(), &self.tracker.applications, &self.app.chips);
			summary_text(&detail)
		};
		self.app
			.copy_feedback
			.copy(self.clipboard.as_mut(), &text, Instant::now());
	}

	fn save_view_preferences(&mut self) {
		self.prefs.save_view_preferences(&self.app.view_prefs);
		self.app.status = format!(
			"View: {} | {} | contrast {}",
			match self.app.view_prefs.view_mode {
				ViewMode::Month => "month",
				ViewMode::Week => "week",
			},
			match self.app.view_prefs.density_mode {
				DensityMode::Full => "full",
				DensityMode::Compact => "compact",
			},
			if self.app.view_prefs.focus_contrast { "on" } else { "off" }
		);
	}
}

fn arrow_key(code: KeyCode) -> Option<ArrowKey> {
	match code {
		KeyCode::Left => Some(ArrowKey::Left),
		KeyCode::Right => Some(ArrowKey::Right),
		KeyCode::Up => Some(ArrowKey::Up),
		KeyCode::Down => Some(ArrowKey::Down),
		_ => None,
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellHit {
	area: Rect,
	date: NaiveDate,
}

fn hit_test(hits: &[CellHit], column: u16, row: u16) -> Option<NaiveDate> {
	hits.iter()
		.find(|hit| {
			column >= hit.area.x
				&& column < hit.area.x + hit.area.width
				&& row >= hit.area.y
				&& row < hit.area.y + hit.area.height
		})
		.map(|hit| hit.date)
}

fn draw_dashboard(frame: &mut Frame, app: &App, view: &ViewModel, now: Instant) -> Vec<CellHit> {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Min(12), Constraint::Length(5)])
		.split(frame.area());

	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
		.split(layout[0]);

	let right = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Min(12), Constraint::Length(8)])
		.split(body[1]);

	let hits = render_calendar_panel(frame, body[0], app, view);
	render_detail_panel(frame, right[0], app, &view.detail);
	render_funnel_panel(frame, right[1], view);
	render_footer(frame, layout[1], app, now);

	if let InputMode::Select(select) = &app.mode {
		render_select_popup(frame, select);
	}

	hits
}

fn render_calendar_panel(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) -> Vec<CellHit> {
	let month = app.focal_month;
	let mode = match app.view_prefs.view_mode {
		ViewMode::Month => "month",
		ViewMode::Week => "week",
	};
	let block = Block::default()
		.borders(Borders::ALL)
		.title(format!("{} {} ({mode})", month.format("%B"), month.year()))
		.border_style(border_style(app.focus == FocusPane::Calendar));
	let inner = block.inner(area);
	frame.render_widget(block, area);

	let week_rows = (view.cells.len() / 7).max(1);
	let mut constraints = vec![Constraint::Length(1)];
	constraints.extend((0..week_rows).map(|_| Constraint::Ratio(1, week_rows as u32)));
	let rows = Layout::default()
		.direction(Direction::Vertical)
		.constraints(constraints)
		.split(inner);

	let header = week_columns(rows[0]);
	for (label, rect) in view.weekday_labels.iter().zip(header.iter()) {
		frame.render_widget(
			Paragraph::new(*label).style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)),
			*rect,
		);
	}

	let mut hits = Vec::with_capacity(view.cells.len());
	for (week, row) in view.cells.chunks(7).zip(rows.iter().skip(1)) {
		let columns = week_columns(*row);
		for (cell, rect) in week.iter().zip(columns.iter()) {
			render_cell(frame, *rect, cell);
			hits.push(CellHit {
				area: *rect,
				date: cell.date,
			});
		}
	}
	hits
}

fn week_columns(area: Rect) -> Vec<Rect> {
	Layout::default()
		.direction(Direction::Horizontal)
		.constraints([Constraint::Ratio(1, 7); 7])
		.split(area)
		.to_vec()
}

fn render_cell(frame: &mut Frame, area: Rect, cell: &CellVisual) {
	let width = area.width.saturating_sub(1) as usize;

	let mut number_style = Style::default().add_modifier(Modifier::BOLD);
	if cell.is_selected {
		number_style = number_style.fg(Color::Black).bg(Color::Yellow);
	} else if cell.is_today {
		number_style = number_style.fg(Color::LightYellow).add_modifier(Modifier::UNDERLINED);
	}
	if cell.is_anchor || matches!(cell.range, RangeMark::Start | RangeMark::End | RangeMark::Single) {
		number_style = number_style.add_modifier(Modifier::REVERSED);
	}

	let mut header = vec![Span::styled(format!("{:>2}", cell.day_number), number_style)];
	if cell.count > 0 {
		header.push(Span::styled(format!(" ({})", cell.count), Style::default().fg(Color::Gray)));
	}

	let mut lines = vec![Line::from(header)];
	for chip in &cell.chips {
		lines.push(Line::from(Span::styled(
			truncate(&chip.label, width),
			Style::default().fg(tone_color(chip.tone)),
		)));
	}
	if let Some(overflow) = cell.overflow_label() {
		lines.push(Line::from(Span::styled(overflow, Style::default().fg(Color::DarkGray))));
	}

	let mut style = Style::default();
	if cell.heat_level > 0 {
		style = style.bg(HEAT_BACKGROUND_COLORS[usize::from(cell.heat_level - 1).min(3)]);
	}
	if cell.range.in_range() {
		style = style.bg(RANGE_BACKGROUND_COLOR);
	}
	if cell.dimmed {
		style = style.fg(Color::DarkGray).add_modifier(Modifier::DIM);
	}

	frame.render_widget(Paragraph::new(lines).style(style), area);
}

fn render_detail_panel(frame: &mut Frame, area: Rect, app: &App, detail: &DetailPanel) {
	let block = Block::default()
		.borders(Borders::ALL)
		.title(detail.scope.label())
		.border_style(border_style(app.focus == FocusPane::Detail));
	let inner = block.inner(area);
	frame.render_widget(block, area);

	let sections = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(2), Constraint::Min(3), Constraint::Length(9)])
		.split(inner);

	let mut chip_spans = Vec::new();
	for (index, (status, count)) in detail.chip_counts.iter().enumerate() {
		let active = !app.chips.is_active() || app.chips.contains(*status);
		let mut style = Style::default().fg(tone_color(StatusTone::for_label(Some(status.as_str()))));
		if app.chips.contains(*status) {
			style = style.add_modifier(Modifier::REVERSED);
		} else if !active {
			style = style.add_modifier(Modifier::DIM);
		}
		chip_spans.push(Span::styled(format!("{}:{} {}", index + 1, status, count), style));
		chip_spans.push(Span::raw(" "));
	}
	frame.render_widget(
		Paragraph::new(vec![
			Line::from(chip_spans),
			Line::from(format!("{} applications", detail.rows.len())),
		]),
		sections[0],
	);

	let items = if detail.rows.is_empty() {
		vec![ListItem::new("(no applications)")]
	} else {
		detail
			.rows
			.iter()
			.map(|row| {
				let score = row
					.match_score
					.map(|score| format!(" {score:.0}%"))
					.unwrap_or_default();
				ListItem::new(Line::from(vec![
					Span::styled(
						format!("{:<9} ", row.status.as_str()),
						Style::default().fg(tone_color(StatusTone::for_label(Some(row.status.as_str())))),
					),
					Span::raw(format!("{} @ {}{score}", row.job_title, row.company)),
				]))
			})
			.collect::<Vec<_>>()
	};
	let mut state = ListState::default();
	if !detail.rows.is_empty() && app.focus == FocusPane::Detail {
		state.select(Some(app.detail_index.min(detail.rows.len() - 1)));
	}
	let list = List::new(items)
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));
	frame.render_stateful_widget(list, sections[1], &mut state);

	let mut lines = Vec::new();
	lines.push(Line::from(format!("Interviews: {}", detail.interviews.len())));
	for interview in detail.interviews.iter().take(2) {
		lines.push(Line::from(Span::styled(format!("  {interview}"), Style::default().fg(Color::Cyan))));
	}
	lines.push(Line::from(format!("Top: {}", companies_label(&detail.companies))));
	lines.push(Line::from(format!("Trend {}", spark_glyphs(&detail.sparkline))));
	let percentages = detail.histogram.percentages();
	for (label, (count, percentage)) in SCORE_BUCKET_LABELS
		.iter()
		.zip(detail.histogram.buckets.iter().zip(percentages))
	{
		let bar = "#".repeat((percentage / 10.0).round() as usize);
		lines.push(Line::from(format!("{label:>6} {bar:<10} {count}")));
	}
	frame.render_widget(Paragraph::new(lines), sections[2]);
}

fn render_funnel_panel(frame: &mut Frame, area: Rect, view: &ViewModel) {
	let funnel = &view.analytics.funnel;
	let lines = vec![
		Line::from(format!(
			"{} to {}",
			view.funnel_scope.start.format("%d %b"),
			view.funnel_scope.end.format("%d %b %Y")
		)),
		Line::from(vec![
			Span::styled(format!("Applied {} ", funnel.applied), Style::default().fg(Color::Green)),
			Span::styled(format!("Interview {} ", funnel.interview), Style::default().fg(Color::Cyan)),
			Span::styled(format!("Offer {} ", funnel.offer), Style::default().fg(Color::Rgb(255, 215, 0))),
			Span::styled(format!("Rejected {}", funnel.rejection), Style::default().fg(Color::Red)),
		]),
		Line::from(format!("Applied -> Interview {}", percent(funnel.applied_to_interview))),
		Line::from(format!("Interview -> Offer   {}", percent(funnel.interview_to_offer))),
		Line::from(format!("Applied -> Offer     {}", percent(funnel.applied_to_offer))),
		Line::from(format!("Total in scope: {}", view.analytics.counts.total())),
	];
	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Funnel"));
	frame.render_widget(panel, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App, now: Instant) {
	let feedback = match app.copy_feedback.state(now) {
		CopyState::Idle => String::new(),
		CopyState::Copied => " | summary copied".to_string(),
		CopyState::Failed => " | copy failed".to_string(),
	};
	let footer_lines = match &app.mode {
		InputMode::Normal => vec![
			Line::from("arrows/hjkl move | shift+arrows or HJKL extend range | Enter/space mark range | mouse drag selects | Esc clear | Tab pane | q quit"),
			Line::from("n/p month | t today | w week/month | d density | c contrast | 1-6 chips | 0 clear chips | f calendar filter"),
			Line::from("a quick add | s cycle status | e export .ics | x export .csv | y copy summary"),
			Line::from(format!("{}{feedback}", app.status)),
		],
		InputMode::Prompt(prompt) => vec![
			Line::from(prompt.title.clone()),
			Line::from(format!("> {}", prompt.input)),
			Line::from("Enter submit | Esc cancel"),
			Line::from(app.status.clone()),
		],
		InputMode::Select(select) => vec![
			Line::from(select.title.clone()),
			Line::from(format!(
				"Selected: {}",
				select
					.selected_option()
					.map(|option| option.label.as_str())
					.unwrap_or("(none)")
			)),
			Line::from("j/k or arrows move | Enter choose | Esc cancel"),
			Line::from(app.status.clone()),
		],
	};

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn render_select_popup(frame: &mut Frame, select: &SelectState) {
	let area = centered_rect(50, 50, frame.area());
	frame.render_widget(Clear, area);

	let items = select
		.options
		.iter()
		.map(|option| ListItem::new(option.label.clone()).style(option.style))
		.collect::<Vec<_>>();

	let list = List::new(items)
		.block(
			Block::default()
				.borders(Borders::ALL)
				.title(format!("{} ({}/{})", select.title, select.selected + 1, select.options.len())),
		)
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

	let mut state = ListState::default();
	if !select.options.is_empty() {
		state.select(Some(select.selected.min(select.options.len() - 1)));
	}
	frame.render_stateful_widget(list, area, &mut state);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
	let popup_layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([
			Constraint::Percentage((100 - percent_y) / 2),
			Constraint::Percentage(percent_y),
			Constraint::Percentage((100 - percent_y) / 2),
		])
		.split(area);
	Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage((100 - percent_x) / 2),
			Constraint::Percentage(percent_x),
			Constraint::Percentage((100 - percent_x) / 2),
		])
		.split(popup_layout[1])[1]
}

fn build_status_select() -> SelectState {
	let options = ApplicationStatus::ALL
		.iter()
		.map(|status| {
			SelectOption::new(
				status.as_str(),
				Some(status.as_str().to_string()),
				Style::default().fg(tone_color(StatusTone::for_label(Some(status.as_str())))),
			)
		})
		.collect();
	SelectState::new("Status", SelectKind::QuickAddStatus, options)
}

fn build_grid_filter_select(filter: &StatusFilter) -> SelectState {
	let mut options = vec![SelectOption::new("Show all statuses", None, Style::default())];
	for status in ApplicationStatus::ALL {
		let mark = if filter.contains(status) { "[x]" } else { "[ ]" };
		options.push(SelectOption::new(
			format!("{mark} {status}"),
			Some(status.as_str().to_string()),
			Style::default().fg(tone_color(StatusTone::for_label(Some(status.as_str())))),
		));
	}
	SelectState::new("Calendar filter", SelectKind::GridFilter, options)
}

fn required_text(input: &str, field_name: &str) -> Result<String, String> {
	let trimmed = input.trim();
	if trimmed.is_empty() {
		Err(format!("{field_name} is required"))
	} else {
		Ok(trimmed.to_string())
	}
}

fn filter_label(filter: &StatusFilter) -> String {
	if !filter.is_active() {
		return "all".to_string();
	}
	filter
		.statuses()
		.map(|status| status.as_str())
		.collect::<Vec<_>>()
		.join(", ")
}

fn companies_label(companies: &[CompanyCount]) -> String {
	if companies.is_empty() {
		return "-".to_string();
	}
	companies
		.iter()
		.map(|entry| format!("{} ({})", entry.company, entry.count))
		.collect::<Vec<_>>()
		.join(", ")
}

fn spark_glyphs(sparkline: &Sparkline) -> String {
	sparkline
		.points
		.iter()
		.map(|point| {
			let height = (100.0 - point.y) / 100.0;
			let index = (height * (SPARK_GLYPHS.len() - 1) as f64).round() as usize;
			SPARK_GLYPHS[index.min(SPARK_GLYPHS.len() - 1)]
		})
		.collect()
}

fn percent(ratio: f64) -> String {
	format!("{:.1}%", ratio * 100.0)
}

fn truncate(text: &str, width: usize) -> String {
	if text.chars().count() <= width {
		return text.to_string();
	}
	let mut out = text.chars().take(width.saturating_sub(1)).collect::<String>();
	out.push('~');
	out
}

fn tone_color(tone: StatusTone) -> Color {
	match tone {
		StatusTone::Grey => Color::Rgb(136, 136, 136),
		StatusTone::Green => Color::Green,
		StatusTone::Cyan => Color::Cyan,
		StatusTone::Gold => Color::Rgb(255, 215, 0),
		StatusTone::Red => Color::Red,
		StatusTone::LightGrey => Color::Rgb(170, 170, 170),
		StatusTone::Dim => Color::DarkGray,
	}
}

fn border_style(focused: bool) -> Style {
	if focused {
		Style::default().fg(FOCUSED_PANEL_BORDER_COLOR)
	} else {
		Style::default().fg(INACTIVE_PANEL_BORDER_COLOR)
	}
}

#[derive(Debug, Clone)]
enum PromptOutcome {
	NextPrompt(PromptState),
	Select(SelectState),
}

#[derive(Debug, Clone)]
struct PromptState {
	title: String,
	input: String,
	kind: PromptKind,
}

impl PromptState {
	fn new(title: impl Into<String>, kind: PromptKind) -> Self {
		Self {
			title: title.into(),
			input: String::new(),
			kind,
		}
	}
}

#[derive(Debug, Clone)]
struct SelectState {
	title: String,
	options: Vec<SelectOption>,
	selected: usize,
	kind: SelectKind,
}

impl SelectState {
	fn new(title: impl Into<String>, kind: SelectKind, options: Vec<SelectOption>) -> Self {
		Self {
			title: title.into(),
			options,
			selected: 0,
			kind,
		}
	}

	fn move_selection(&mut self, delta: i32) {
		if self.options.is_empty() {
			self.selected = 0;
			return;
		}

		if delta > 0 {
			self.selected = (self.selected + delta as usize).min(self.options.len() - 1);
		} else {
			self.selected = self.selected.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn selected_option(&self) -> Option<&SelectOption> {
		self.options.get(self.selected)
	}
}

#[derive(Debug, Clone)]
struct SelectOption {
	label: String,
	value: Option<String>,
	style: Style,
}

impl SelectOption {
	fn new(label: impl Into<String>, value: Option<String>, style: Style) -> Self {
		Self {
			label: label.into(),
			value,
			style,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
	QuickAddTitle,
	QuickAddCompany,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectKind {
	QuickAddStatus,
	GridFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusPane {
	Calendar,
	Detail,
}

impl FocusPane {
	fn toggled(self) -> Self {
		match self {
			FocusPane::Calendar => FocusPane::Detail,
			FocusPane::Detail => FocusPane::Calendar,
		}
	}
}

#[derive(Debug, Clone)]
enum InputMode {
	Normal,
	Prompt(PromptState),
	Select(SelectState),
}

struct App {
	focus: FocusPane,
	cursor: NaiveDate,
	focal_month: NaiveDate,
	view_prefs: ViewPreferences,
	grid_filter: StatusFilter,
	chips: StatusFilter,
	detail_index: usize,
	quick_add: QuickAddForm,
	quick_add_scope: Option<DetailScope>,
	copy_feedback: CopyFeedback,
	mode: InputMode,
	status: String,
}

impl App {
	fn new(today: NaiveDate, view_prefs: ViewPreferences, chips: StatusFilter) -> Self {
		Self {
			focus: FocusPane::Calendar,
			cursor: today,
			focal_month: first_day_of_month(today),
			view_prefs,
			grid_filter: StatusFilter::all(),
			chips,
			detail_index: 0,
			quick_add: QuickAddForm::default(),
			quick_add_scope: None,
			copy_feedback: CopyFeedback::default(),
			mode: InputMode::Normal,
			status: "Ready".to_string(),
		}
	}

	fn clamp_detail_index(&mut self, view: &ViewModel) {
		self.detail_index = self.detail_index.min(view.detail.rows.len().saturating_sub(1));
	}

	fn move_cursor(&mut self, delta_days: i64) {
		self.jump_to(self.cursor + Duration::days(delta_days));
	}

	fn shift_month(&mut self, delta_months: i32) {
		self.jump_to(shift_month(self.cursor, delta_months));
	}

	fn jump_to(&mut self, day: NaiveDate) {
		self.cursor = day;
		self.focal_month = first_day_of_month(day);
		self.detail_index = 0;
	}
}

struct ViewModel {
	cells: Vec<CellVisual>,
	weekday_labels: [&'static str; 7],
	funnel_scope: DateRange,
	analytics: RangeAnalytics,
	detail: DetailPanel,
}

struct DetailPanel {
	scope: DetailScope,
	chip_counts: Vec<(ApplicationStatus, usize)>,
	rows: Vec<DetailRow>,
	interviews: Vec<String>,
	companies: Vec<CompanyCount>,
	sparkline: Sparkline,
	histogram: ScoreHistogram,
}

impl DetailPanel {
	fn from_view(view: &DetailView<'_>) -> Self {
		Self {
			scope: view.scope,
			chip_counts: ApplicationStatus::ALL
				.iter()
				.map(|status| (*status, view.status_counts.get(*status)))
				.collect(),
			rows: view
				.applications
				.iter()
				.map(|application| DetailRow {
					id: application.id.clone(),
					job_title: application.job_title.clone(),
					company: application.company.clone(),
					status: application.status,
					match_score: application.match_score,
				})
				.collect(),
			interviews: view
				.interviews
				.iter()
				.filter_map(|application| {
					application.interview_date.map(|date| {
						format!(
							"{} {} @ {}",
							date.format("%d %b %H:%M"),
							application.job_title,
							application.company
						)
					})
				})
				.collect(),
			companies: view.top_companies.clone(),
			sparkline: view.sparkline.clone(),
			histogram: view.histogram,
		}
	}
}

struct DetailRow {
	id: String,
	job_title: String,
	company: String,
	status: ApplicationStatus,
	match_score: Option<f64>,
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::rc::Rc;

	use chrono::NaiveDate;
	use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
	use ratatui::layout::Rect;

	use super::{CellHit, Dashboard, hit_test, osc52_sequence, spark_glyphs, truncate};
	use crate::config::CalendarConfig;
	use crate::detail::{Clipboard, CopyState, DetailScope, Sparkline};
	use crate::domain::{ApplicationStatus, DateRange};
	use crate::error::CalendarError;
	use crate::prefs::PreferenceStore;
	use crate::storage::Tracker;

	fn day(y: i32, m: u32, d: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
	}

	#[derive(Clone, Default)]
	struct SharedClipboard(Rc<RefCell<Vec<String>>>);

	impl Clipboard for SharedClipboard {
		fn write_text(&mut self, text: &str) -> Result<(), CalendarError> {
			self.0.borrow_mut().push(text.to_string());
			Ok(())
		}
	}

	fn key(code: KeyCode) -> KeyEvent {
		KeyEvent::new(code, KeyModifiers::NONE)
	}

	fn press(dashboard: &mut Dashboard<'_>, code: KeyCode, today: NaiveDate) {
		let view = dashboard.build_view(today);
		dashboard.handle_key(key(code), &view);
		dashboard.pump(today);
	}

	fn type_text(dashboard: &mut Dashboard<'_>, text: &str, today: NaiveDate) {
		for ch in text.chars() {
			press(dashboard, KeyCode::Char(ch), today);
		}
	}

	#[test]
	fn enter_twice_selects_a_range_and_persists_it() {
		let mut tracker = Tracker::in_memory(Vec::new());
		let config = CalendarConfig::default();
		let export_dir = tempfile::tempdir().expect("temp dir should be created");
		let today = day(2024, 3, 5);
		let mut dashboard = Dashboard::new(
			&mut tracker,
			&config,
			PreferenceStore::in_memory(),
			Box::new(SharedClipboard::default()),
			export_dir.path().to_path_buf(),
			today,
		);

		press(&mut dashboard, KeyCode::Enter, today);
		press(&mut dashboard, KeyCode::Right, today);
		press(&mut dashboard, KeyCode::Right, today);
		press(&mut dashboard, KeyCode::Enter, today);

		let range = DateRange::new(day(2024, 3, 5), day(2024, 3, 7));
		assert_eq!(dashboard.range(), Some(range));
		assert_eq!(dashboard.prefs.last_range(), Some(range));
		assert_eq!(dashboard.detail_scope(), DetailScope::Range(range));

		press(&mut dashboard, KeyCode::Esc, today);
		assert_eq!(dashboard.range(), None);
	}

	#[test]
	fn mouse_drag_selects_cells_under_the_pointer() {
		let mut tracker = Tracker::in_memory(Vec::new());
		let config = CalendarConfig::default();
		let export_dir = tempfile::tempdir().expect("temp dir should be created");
		let today = day(2024, 3, 5);
		let mut dashboard = Dashboard::new(
			&mut tracker,
			&config,
			PreferenceStore::in_memory(),
			Box::new(SharedClipboard::default()),
			export_dir.path().to_path_buf(),
			today,
		);
		let hits = vec![
			CellHit {
				area: Rect::new(0, 0, 10, 4),
				date: day(2024, 3, 10),
			},
			CellHit {
				area: Rect::new(10, 0, 10, 4),
				date: day(2024, 3, 11),
			},
		];

		let mouse = |kind, column| MouseEvent {
			kind,
			column,
			row: 1,
			modifiers: KeyModifiers::NONE,
		};
		dashboard.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 15), &hits);
		dashboard.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 3), &hits);
		dashboard.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 3), &hits);
		dashboard.pump(today);

		assert_eq!(
			dashboard.range(),
			Some(DateRange::new(day(2024, 3, 10), day(2024, 3, 11)))
		);
		assert!(!dashboard.session.selection().is_dragging());
	}

	#[test]
	fn quick_add_flow_creates_and_copy_reports_success() {
		let mut tracker = Tracker::in_memory(Vec::new());
		let config = CalendarConfig::default();
		let export_dir = tempfile::tempdir().expect("temp dir should be created");
		let clipboard = SharedClipboard::default();
		let copied = clipboard.0.clone();
		let today = day(2024, 3, 5);
		{
			let mut dashboard = Dashboard::new(
				&mut tracker,
				&config,
				PreferenceStore::in_memory(),
				Box::new(clipboard),
				export_dir.path().to_path_buf(),
				today,
			);

			press(&mut dashboard, KeyCode::Char('a'), today);
			type_text(&mut dashboard, "Engineer", today);
			press(&mut dashboard, KeyCode::Enter, today);
			type_text(&mut dashboard, "Acme", today);
			press(&mut dashboard, KeyCode::Enter, today);
			press(&mut dashboard, KeyCode::Down, today);
			press(&mut dashboard, KeyCode::Enter, today);
			assert!(dashboard.app.status.starts_with("Added Engineer @ Acme"));

			press(&mut dashboard, KeyCode::Char('y'), today);
			assert_eq!(
				dashboard.app.copy_feedback.state(std::time::Instant::now()),
				CopyState::Copied
			);

			dashboard.app.focus = super::FocusPane::Detail;
			press(&mut dashboard, KeyCode::Char('s'), today);
			dashboard.close();
		}

		assert_eq!(tracker.applications.len(), 1);
		assert_eq!(tracker.applications[0].status, ApplicationStatus::Interview);
		assert_eq!(tracker.applications[0].applied_date.date_naive(), day(2024, 3, 5));
		assert!(copied.borrow()[0].contains("Engineer @ Acme [Applied]"));
	}

	#[test]
	fn exports_write_into_the_export_dir() {
		let mut tracker = Tracker::in_memory(Vec::new());
		let config = CalendarConfig::default();
		let export_dir = tempfile::tempdir().expect("temp dir should be created");
		let today = day(2024, 3, 5);
		let mut dashboard = Dashboard::new(
			&mut tracker,
			&config,
			PreferenceStore::in_memory(),
			Box::new(SharedClipboard::default()),
			export_dir.path().to_path_buf(),
			today,
		);

		press(&mut dashboard, KeyCode::Char('e'), today);
		press(&mut dashboard, KeyCode::Char('x'), today);

		assert!(export_dir.path().join("applications-2024-03-month.ics").exists());
		assert!(export_dir.path().join("applications-2024-03-05.csv").exists());
	}

	#[test]
	fn helpers_render_plain_text() {
		let hits = vec![CellHit {
			area: Rect::new(2, 2, 3, 3),
			date: day(2024, 3, 1),
		}];
		assert_eq!(hit_test(&hits, 4, 4), Some(day(2024, 3, 1)));
		assert_eq!(hit_test(&hits, 5, 4), None);
		assert_eq!(truncate("Engineering Manager", 6), "Engin~");
		assert_eq!(osc52_sequence("hi"), "\x1b]52;c;aGk=\x1b\\");

		let empty: Vec<crate::domain::ApplicationRecord> = Vec::new();
		let sparkline = Sparkline::build(DetailScope::Day(day(2024, 3, 1)), &empty);
		assert_eq!(spark_glyphs(&sparkline), "▁▁▁▁▁▁▁");
	}
}
