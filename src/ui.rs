use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use fisio_clinic::auth::AuthState;
use fisio_clinic::entities::{
    Appointment, AppointmentPatch, AppointmentStatus, ClinicalRecord, Patient, PatientStatus,
    Transaction,
};
use fisio_clinic::finance::{categories_in_use, filter_by_category, format_brl, summarize};
use fisio_clinic::forms::format_date;
use fisio_clinic::store::ClinicStore;
use fisio_clinic::views::{
    dashboard, day_schedule, records_for_patient, search_patients, search_patients_clinical,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    Patients,
    Records,
    Agenda,
    Finance,
}

impl Page {
    pub const ALL: [Page; 5] = [
        Page::Dashboard,
        Page::Patients,
        Page::Records,
        Page::Agenda,
        Page::Finance,
    ];

    pub fn next(&self) -> Self {
        match self {
            Page::Dashboard => Page::Patients,
            Page::Patients => Page::Records,
            Page::Records => Page::Agenda,
            Page::Agenda => Page::Finance,
            Page::Finance => Page::Dashboard,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Dashboard => Page::Finance,
            Page::Patients => Page::Dashboard,
            Page::Records => Page::Patients,
            Page::Agenda => Page::Records,
            Page::Finance => Page::Agenda,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Dashboard => "Dashboard",
            Page::Patients => "Pacientes",
            Page::Records => "Prontuários",
            Page::Agenda => "Agenda",
            Page::Finance => "Financeiro",
        }
    }

    fn searchable(&self) -> bool {
        matches!(self, Page::Patients | Page::Records)
    }
}

/// Credentials typed on the login screen
#[derive(Debug, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub editing_password: bool,
    pub error: Option<String>,
}

pub struct App {
    pub store: ClinicStore,
    pub auth: AuthState,
    pub login: LoginForm,
    pub today: NaiveDate,
    pub current_page: Page,
    pub search: String,
    pub search_mode: bool,
    pub show_records: bool,
    pub agenda_date: NaiveDate,
    pub category_filter: Option<String>,
    pub message: Option<String>,
    pub patients_state: TableState,
    pub records_state: TableState,
    pub agenda_state: TableState,
    pub finance_state: TableState,
}

impl App {
    pub fn new(store: ClinicStore, auth: AuthState, today: NaiveDate) -> Self {
        let mut app = Self {
            store,
            auth,
            login: LoginForm::default(),
            today,
            current_page: Page::Dashboard,
            search: String::new(),
            search_mode: false,
            show_records: false,
            agenda_date: today,
            category_filter: None,
            message: None,
            patients_state: TableState::default(),
            records_state: TableState::default(),
            agenda_state: TableState::default(),
            finance_state: TableState::default(),
        };
        app.agenda_state.select(Some(0));
        app.reset_selection();
        app
    }

    // ------------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------------

    /// Clinic pages stay hidden behind the login screen until a session exists
    pub fn is_locked(&self) -> bool {
        !self.auth.is_authenticated()
    }

    fn login_field(&mut self) -> &mut String {
        if self.login.editing_password {
            &mut self.login.password
        } else {
            &mut self.login.email
        }
    }

    pub fn login_push_char(&mut self, c: char) {
        self.login_field().push(c);
    }

    pub fn login_pop_char(&mut self) {
        self.login_field().pop();
    }

    pub fn login_switch_field(&mut self) {
        self.login.editing_password = !self.login.editing_password;
    }

    pub fn submit_login(&mut self) -> Result<bool> {
        let ok = self.auth.login(self.login.email.trim(), &self.login.password)?;
        self.login.password.clear();
        if ok {
            self.login = LoginForm::default();
            self.message = self
                .auth
                .current_user()
                .map(|u| format!("Bem-vindo, {}", u.name));
        } else {
            self.login.error = Some("Login ou senha inválidos".to_string());
        }
        Ok(ok)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.auth.logout()?;
        self.current_page = Page::Dashboard;
        self.message = None;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    pub fn next_page(&mut self) {
        self.switch_page(self.current_page.next());
    }

    pub fn previous_page(&mut self) {
        self.switch_page(self.current_page.previous());
    }

    fn switch_page(&mut self, page: Page) {
        self.current_page = page;
        self.search.clear();
        self.search_mode = false;
        self.show_records = false;
        self.message = None;
        self.reset_selection();
    }

    /// Rows on the current page's table
    fn row_count(&self) -> usize {
        match self.current_page {
            Page::Dashboard => 0,
            Page::Patients | Page::Records => self.visible_patients().len(),
            Page::Agenda => day_schedule(self.store.appointments(), self.agenda_date).len(),
            Page::Finance => self.visible_transactions().len(),
        }
    }

    fn table_state(&mut self) -> Option<&mut TableState> {
        match self.current_page {
            Page::Dashboard => None,
            Page::Patients => Some(&mut self.patients_state),
            Page::Records => Some(&mut self.records_state),
            Page::Agenda => Some(&mut self.agenda_state),
            Page::Finance => Some(&mut self.finance_state),
        }
    }

    /// Select the first row, or nothing when the table is empty
    fn reset_selection(&mut self) {
        let len = self.row_count();
        if let Some(state) = self.table_state() {
            state.select(if len == 0 { None } else { Some(0) });
        }
    }

    /// Keep the selection inside the table after a row disappears
    fn clamp_selection(&mut self) {
        let len = self.row_count();
        if let Some(state) = self.table_state() {
            match state.selected() {
                _ if len == 0 => state.select(None),
                Some(i) if i >= len => state.select(Some(len - 1)),
                None => state.select(Some(0)),
                _ => {}
            }
        }
    }

    pub fn next(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        if let Some(state) = self.table_state() {
            let i = match state.selected() {
                Some(i) if i + 1 < len => i + 1,
                _ => 0,
            };
            state.select(Some(i));
        }
    }

    pub fn previous(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        if let Some(state) = self.table_state() {
            let i = match state.selected() {
                Some(0) | None => len - 1,
                Some(i) => i - 1,
            };
            state.select(Some(i));
        }
    }

    pub fn first(&mut self) {
        self.reset_selection();
    }

    pub fn last(&mut self) {
        let len = self.row_count();
        if let Some(state) = self.table_state() {
            state.select(len.checked_sub(1));
        }
    }

    // ------------------------------------------------------------------------
    // Search (Patients / Records)
    // ------------------------------------------------------------------------

    pub fn start_search(&mut self) {
        if self.current_page.searchable() {
            self.search_mode = true;
            self.show_records = false;
        }
    }

    pub fn end_search(&mut self) {
        self.search_mode = false;
    }

    pub fn push_search_char(&mut self, c: char) {
        self.search.push(c);
        self.reset_selection();
    }

    pub fn pop_search_char(&mut self) {
        self.search.pop();
        self.reset_selection();
    }

    /// Patients page matches names; the records page also matches pathology
    pub fn visible_patients(&self) -> Vec<&Patient> {
        match self.current_page {
            Page::Records => search_patients_clinical(self.store.patients(), &self.search),
            _ => search_patients(self.store.patients(), &self.search),
        }
    }

    pub fn selected_patient(&self) -> Option<&Patient> {
        let state = match self.current_page {
            Page::Records => &self.records_state,
            _ => &self.patients_state,
        };
        state
            .selected()
            .and_then(|i| self.visible_patients().get(i).copied())
    }

    pub fn toggle_records(&mut self) {
        if self.current_page == Page::Records && self.selected_patient().is_some() {
            self.show_records = !self.show_records;
        }
    }

    pub fn selected_records(&self) -> Vec<&ClinicalRecord> {
        match self.selected_patient() {
            Some(patient) => records_for_patient(self.store.records(), &patient.name),
            None => Vec::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Agenda
    // ------------------------------------------------------------------------

    pub fn next_day(&mut self) {
        self.agenda_date += Duration::days(1);
    }

    pub fn previous_day(&mut self) {
        self.agenda_date -= Duration::days(1);
    }

    pub fn go_today(&mut self) {
        self.agenda_date = self.today;
    }

    pub fn selected_appointment(&self) -> Option<&Appointment> {
        let i = self.agenda_state.selected()?;
        day_schedule(self.store.appointments(), self.agenda_date)
            .get(i)
            .and_then(|slot| slot.appointment)
    }

    /// Confirmado → Pendente → Cancelado → Confirmado
    pub fn cycle_status(&mut self) -> Result<()> {
        let Some(appt) = self.selected_appointment() else {
            return Ok(());
        };
        let id = appt.id.clone();
        let status = appt.status.next();

        self.store.update_appointment(
            &id,
            AppointmentPatch {
                status: Some(status),
                ..Default::default()
            },
        )?;
        self.message = Some(format!("Status: {}", status.as_str()));
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Finance
    // ------------------------------------------------------------------------

    pub fn visible_transactions(&self) -> Vec<&Transaction> {
        filter_by_category(self.store.transactions(), self.category_filter.as_deref())
    }

    /// All → each category in use → All
    pub fn cycle_category_filter(&mut self) {
        let categories = categories_in_use(self.store.transactions());
        self.category_filter = match &self.category_filter {
            None => categories.first().cloned(),
            Some(current) => categories
                .iter()
                .position(|c| c == current)
                .and_then(|i| categories.get(i + 1))
                .cloned(),
        };
        self.reset_selection();
    }

    pub fn selected_transaction(&self) -> Option<&Transaction> {
        self.finance_state
            .selected()
            .and_then(|i| self.visible_transactions().get(i).copied())
    }

    // ------------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------------

    /// Remove the selected appointment (Agenda) or transaction (Finance)
    pub fn delete_selected(&mut self) -> Result<()> {
        match self.current_page {
            Page::Agenda => {
                if let Some(id) = self.selected_appointment().map(|a| a.id.clone()) {
                    let removed = self.store.delete_appointment(&id)?;
                    self.message = Some(format!("Agendamento removido: {}", removed.patient));
                }
            }
            Page::Finance => {
                if let Some(id) = self.selected_transaction().map(|t| t.id.clone()) {
                    let removed = self.store.delete_transaction(&id)?;
                    self.message = Some(format!("Lançamento removido: {}", removed.description));
                    if self.visible_transactions().is_empty() {
                        self.category_filter = None;
                    }
                }
            }
            _ => {}
        }
        self.clamp_selection();
        Ok(())
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if app.is_locked() {
            let result = match key.code {
                KeyCode::Esc => return Ok(()),
                KeyCode::Tab | KeyCode::BackTab => {
                    app.login_switch_field();
                    Ok(())
                }
                KeyCode::Enter => app.submit_login().map(|_| ()),
                KeyCode::Backspace => {
                    app.login_pop_char();
                    Ok(())
                }
                KeyCode::Char(c) => {
                    app.login_push_char(c);
                    Ok(())
                }
                _ => Ok(()),
            };
            if let Err(err) = result {
                app.login.error = Some(format!("Erro: {}", err));
            }
            continue;
        }

        if app.search_mode {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => app.end_search(),
                KeyCode::Backspace => app.pop_search_char(),
                KeyCode::Char(c) => app.push_search_char(c),
                _ => {}
            }
            continue;
        }

        let result = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    app.previous_page();
                } else {
                    app.next_page();
                }
                Ok(())
            }
            KeyCode::BackTab => {
                app.previous_page();
                Ok(())
            }
            KeyCode::Char('/') => {
                app.start_search();
                Ok(())
            }
            KeyCode::Enter => {
                app.toggle_records();
                Ok(())
            }
            KeyCode::Left if app.current_page == Page::Agenda => {
                app.previous_day();
                Ok(())
            }
            KeyCode::Right if app.current_page == Page::Agenda => {
                app.next_day();
                Ok(())
            }
            KeyCode::Char('t') if app.current_page == Page::Agenda => {
                app.go_today();
                Ok(())
            }
            KeyCode::Char('s') if app.current_page == Page::Agenda => app.cycle_status(),
            KeyCode::Char('f') if app.current_page == Page::Finance => {
                app.cycle_category_filter();
                Ok(())
            }
            KeyCode::Char('d') => app.delete_selected(),
            KeyCode::Char('x') => app.logout(),
            KeyCode::Down | KeyCode::Char('j') => {
                app.next();
                Ok(())
            }
            KeyCode::Up | KeyCode::Char('k') => {
                app.previous();
                Ok(())
            }
            KeyCode::Home => {
                app.first();
                Ok(())
            }
            KeyCode::End => {
                app.last();
                Ok(())
            }
            _ => Ok(()),
        };

        if let Err(err) = result {
            app.message = Some(format!("Erro: {}", err));
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    if app.is_locked() {
        render_login(f, f.size(), app);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Dashboard => render_dashboard(f, chunks[1], app),
        Page::Patients => render_patients(f, chunks[1], app),
        Page::Records => {
            if app.show_records {
                let content_chunks = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([
                        Constraint::Percentage(40), // Patient list
                        Constraint::Percentage(60), // Records panel
                    ])
                    .split(chunks[1]);

                render_record_patients(f, content_chunks[0], app);
                render_records_panel(f, content_chunks[1], app);
            } else {
                render_record_patients(f, chunks[1], app);
            }
        }
        Page::Agenda => render_agenda(f, chunks[1], app),
        Page::Finance => render_finance(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_login(f: &mut Frame, area: Rect, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Length(9),
            Constraint::Min(0),
        ])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(40),
            Constraint::Percentage(30),
        ])
        .split(rows[1]);

    let field_style = |active: bool| {
        if active {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        }
    };
    let masked = "•".repeat(app.login.password.chars().count());

    let mut content = vec![
        Line::from(""),
        Line::from(vec![
            label("Login"),
            Span::styled(app.login.email.clone(), field_style(!app.login.editing_password)),
        ]),
        Line::from(vec![
            label("Senha"),
            Span::styled(masked, field_style(app.login.editing_password)),
        ]),
        Line::from(""),
    ];
    match &app.login.error {
        Some(error) => content.push(Line::from(Span::styled(
            format!("  {}", error),
            Style::default().fg(Color::Red),
        ))),
        None => content.push(Line::from(Span::styled(
            "  Tab: campo | Enter: entrar | Esc: sair",
            Style::default().fg(Color::DarkGray),
        ))),
    }

    let panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" FisioClinic - Entrar "),
    );
    f.render_widget(panel, columns[1]);
}

fn header_cell(title: &'static str) -> Cell<'static> {
    Cell::from(title).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    Row::new(titles.iter().copied().map(header_cell))
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

fn highlight() -> Style {
    Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD)
}

fn bordered(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(title)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in Page::ALL.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Hoje: {}", format_date(app.today)),
        Style::default().fg(Color::White),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" FisioClinic "),
    );

    f.render_widget(header, area);
}

// ============================================================================
// DASHBOARD
// ============================================================================

fn card(title: &str, value: String, color: Color) -> Paragraph<'static> {
    Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            value,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(format!(" {} ", title)),
    )
}

fn balance_color(value: f64) -> Color {
    if value < 0.0 {
        Color::Red
    } else {
        Color::Green
    }
}

fn status_color(status: AppointmentStatus) -> Color {
    match status {
        AppointmentStatus::Confirmed => Color::Green,
        AppointmentStatus::Pending => Color::Yellow,
        AppointmentStatus::Cancelled => Color::Red,
    }
}

fn render_dashboard(f: &mut Frame, area: Rect, app: &App) {
    let summary = dashboard(&app.store, app.today);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(area);

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25); 4])
        .split(chunks[0]);

    f.render_widget(
        card("Pacientes Ativos", summary.active_patients.to_string(), Color::Cyan),
        cards[0],
    );
    f.render_widget(
        card(
            "Sessões Hoje",
            format!("{} / {}", summary.sessions_today, summary.scheduled_sessions),
            Color::Magenta,
        ),
        cards[1],
    );
    f.render_widget(
        card("Prontuários", summary.total_records.to_string(), Color::Blue),
        cards[2],
    );
    f.render_widget(
        card(
            "Saldo",
            format_brl(summary.finance.balance),
            balance_color(summary.finance.balance),
        ),
        cards[3],
    );

    let rows: Vec<Row> = summary
        .upcoming
        .iter()
        .map(|a| {
            Row::new(vec![
                Cell::from(format_date(a.date)),
                Cell::from(a.time_label()),
                Cell::from(truncate(&a.patient, 28)),
                Cell::from(a.session_type.as_str().to_string()),
                Cell::from(a.status.as_str().to_string())
                    .style(Style::default().fg(status_color(a.status))),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(7),
            Constraint::Length(30),
            Constraint::Length(20),
            Constraint::Length(12),
        ],
    )
    .header(header_row(&["Data", "Hora", "Paciente", "Sessão", "Status"]))
    .block(bordered(" Próximos Atendimentos ".to_string()));

    f.render_widget(table, chunks[1]);
}

// ============================================================================
// PATIENTS
// ============================================================================

fn search_title(base: &str, app: &App) -> String {
    if app.search_mode {
        format!(" {} - /{}_ ", base, app.search)
    } else if app.search.is_empty() {
        format!(" {} ", base)
    } else {
        format!(" {} - \"{}\" ", base, app.search)
    }
}

fn render_patients(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = app
        .visible_patients()
        .iter()
        .map(|p| {
            let status_style = match p.status {
                PatientStatus::Active => Style::default().fg(Color::Green),
                PatientStatus::Inactive => Style::default().fg(Color::DarkGray),
            };
            Row::new(vec![
                Cell::from(truncate(&p.name, 28)),
                Cell::from(p.age.to_string()),
                Cell::from(p.phone.clone()),
                Cell::from(p.status.as_str().to_string()).style(status_style),
                Cell::from(format_date(p.last_visit)),
                Cell::from(truncate(&p.pathology, 28)),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(30),
            Constraint::Length(6),
            Constraint::Length(17),
            Constraint::Length(9),
            Constraint::Length(12),
            Constraint::Min(20),
        ],
    )
    .header(header_row(&["Nome", "Idade", "Telefone", "Status", "Última Visita", "Patologia"]))
    .block(bordered(search_title("Pacientes", app)))
    .highlight_style(highlight())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.patients_state);
}

// ============================================================================
// RECORDS
// ============================================================================

fn render_record_patients(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = app
        .visible_patients()
        .iter()
        .map(|p| {
            let count = records_for_patient(app.store.records(), &p.name).len();
            Row::new(vec![
                Cell::from(truncate(&p.name, 24)),
                Cell::from(truncate(&p.pathology, 24)),
                Cell::from(count.to_string()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(26),
            Constraint::Min(16),
            Constraint::Length(5),
        ],
    )
    .header(header_row(&["Paciente", "Patologia", "Reg."]))
    .block(bordered(search_title("Prontuários", app)))
    .highlight_style(highlight())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.records_state);
}

fn label(text: &str) -> Span<'static> {
    Span::styled(
        format!("  {}: ", text),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )
}

fn render_records_panel(f: &mut Frame, area: Rect, app: &App) {
    let Some(patient) = app.selected_patient() else {
        let empty = Paragraph::new("Nenhum paciente selecionado")
            .block(bordered(" Histórico ".to_string()));
        f.render_widget(empty, area);
        return;
    };

    let records = app.selected_records();
    let mut content = vec![Line::from("")];

    if records.is_empty() {
        content.push(Line::from(Span::styled(
            "  Nenhum registro para este paciente",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    for record in records {
        content.push(Line::from(vec![
            Span::styled(
                format!("  {}  ", format_date(record.date)),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                record.kind.as_str().to_string(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            ),
            Span::styled(
                format!("  {}", record.author),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        content.push(Line::from(format!("  {}", record.summary)));

        if let Some(assessment) = record.assessment.as_ref().filter(|_| record.has_assessment()) {
            for (name, value) in assessment.fields() {
                if let Some(value) = value {
                    content.push(Line::from(vec![label(name), Span::raw(value.to_string())]));
                }
            }
        }

        content.push(Line::from(""));
        content.push(Line::from("  ─────────────────────────────────────"));
        content.push(Line::from(""));
    }

    content.push(Line::from(Span::styled(
        "  Press Enter to close",
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    )));

    let panel = Paragraph::new(content)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(format!(" Histórico - {} ", patient.name)),
        );

    f.render_widget(panel, area);
}

// ============================================================================
// AGENDA
// ============================================================================

fn weekday_pt(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "segunda-feira",
        Weekday::Tue => "terça-feira",
        Weekday::Wed => "quarta-feira",
        Weekday::Thu => "quinta-feira",
        Weekday::Fri => "sexta-feira",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    }
}

fn render_agenda(f: &mut Frame, area: Rect, app: &mut App) {
    let rows: Vec<Row> = day_schedule(app.store.appointments(), app.agenda_date)
        .iter()
        .map(|slot| {
            let time = Cell::from(slot.time.format("%H:%M").to_string());
            match slot.appointment {
                Some(a) => Row::new(vec![
                    time,
                    Cell::from(truncate(&a.patient, 28)),
                    Cell::from(a.session_type.as_str().to_string()),
                    Cell::from(a.status.as_str().to_string())
                        .style(Style::default().fg(status_color(a.status))),
                ]),
                None => Row::new(vec![
                    time,
                    Cell::from("Livre").style(
                        Style::default()
                            .fg(Color::DarkGray)
                            .add_modifier(Modifier::ITALIC),
                    ),
                    Cell::from(""),
                    Cell::from(""),
                ]),
            }
        })
        .collect();

    let title = format!(
        " Agenda - {} ({}){} ",
        format_date(app.agenda_date),
        weekday_pt(app.agenda_date.weekday()),
        if app.agenda_date == app.today { " - hoje" } else { "" }
    );

    let table = Table::new(
        rows,
        [
            Constraint::Length(7),
            Constraint::Length(30),
            Constraint::Length(20),
            Constraint::Length(12),
        ],
    )
    .header(header_row(&["Hora", "Paciente", "Sessão", "Status"]))
    .block(bordered(title))
    .highlight_style(highlight())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.agenda_state);
}

// ============================================================================
// FINANCE
// ============================================================================

fn render_finance(f: &mut Frame, area: Rect, app: &mut App) {
    let summary = summarize(app.store.transactions());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(area);

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3); 3])
        .split(chunks[0]);

    f.render_widget(card("Entradas", format_brl(summary.income), Color::Green), cards[0]);
    f.render_widget(card("Saídas", format_brl(summary.expenses), Color::Red), cards[1]);
    f.render_widget(
        card("Saldo", format_brl(summary.balance), balance_color(summary.balance)),
        cards[2],
    );

    let rows: Vec<Row> = app
        .visible_transactions()
        .iter()
        .map(|tx| {
            let color = if tx.is_inflow() { Color::Green } else { Color::Red };
            Row::new(vec![
                Cell::from(format_date(tx.date)),
                Cell::from(truncate(&tx.description, 30)),
                Cell::from(truncate(&tx.category, 20)),
                Cell::from(tx.method.as_str().to_string()),
                Cell::from(format_brl(tx.signed_amount())).style(Style::default().fg(color)),
            ])
            .height(1)
        })
        .collect();

    let title = match &app.category_filter {
        Some(category) => format!(" Lançamentos - {} ", category),
        None => " Lançamentos ".to_string(),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(32),
            Constraint::Length(22),
            Constraint::Length(19),
            Constraint::Length(16),
        ],
    )
    .header(header_row(&["Data", "Descrição", "Categoria", "Pagamento", "Valor"]))
    .block(bordered(title))
    .highlight_style(highlight())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[1], &mut app.finance_state);
}

// ============================================================================
// STATUS BAR
// ============================================================================

fn key_hint(spans: &mut Vec<Span<'static>>, key: &'static str, action: &'static str) {
    spans.push(Span::raw(" | "));
    spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
    spans.push(Span::raw(action));
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = match app.current_page {
        Page::Dashboard => None,
        Page::Patients => app.patients_state.selected(),
        Page::Records => app.records_state.selected(),
        Page::Agenda => app.agenda_state.selected(),
        Page::Finance => app.finance_state.selected(),
    };

    let mut status_spans = vec![Span::styled(
        format!(
            " Row: {}/{} ",
            selected.map(|i| i + 1).unwrap_or(0),
            app.row_count()
        ),
        Style::default().fg(Color::Cyan),
    )];

    if app.search_mode {
        key_hint(&mut status_spans, "Enter", " Done");
        key_hint(&mut status_spans, "Backspace", " Erase");
    } else {
        match app.current_page {
            Page::Patients => key_hint(&mut status_spans, "/", " Search"),
            Page::Records => {
                key_hint(&mut status_spans, "/", " Search");
                key_hint(&mut status_spans, "Enter", " History");
            }
            Page::Agenda => {
                key_hint(&mut status_spans, "←/→", " Day");
                key_hint(&mut status_spans, "t", " Today");
                key_hint(&mut status_spans, "s", " Status");
                key_hint(&mut status_spans, "d", " Delete");
            }
            Page::Finance => {
                key_hint(&mut status_spans, "f", " Category");
                key_hint(&mut status_spans, "d", " Delete");
            }
            Page::Dashboard => {}
        }
        key_hint(&mut status_spans, "Tab", " Page");
        key_hint(&mut status_spans, "x", " Logout");
        key_hint(&mut status_spans, "↑/↓", " Nav");
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
        status_spans.push(Span::raw(" Quit"));
    }

    if let Some(message) = &app.message {
        status_spans.push(Span::raw("  "));
        status_spans.push(Span::styled(
            message.clone(),
            Style::default().fg(Color::Green),
        ));
    }

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

/// Cut to `max_len` characters, ending in `...` when shortened
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fisio_clinic::storage::KvStorage;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn locked_app() -> App {
        let storage = KvStorage::open_in_memory().unwrap();
        let store = ClinicStore::load(storage.clone(), today()).unwrap();
        let auth = AuthState::load(storage).unwrap();
        App::new(store, auth, today())
    }

    fn create_test_app() -> App {
        let mut app = locked_app();
        assert!(app.auth.login("admin", "123").unwrap());
        app
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.login_push_char(c);
        }
    }

    #[test]
    fn test_login_screen_gates_clinic_pages() {
        let mut app = locked_app();
        assert!(app.is_locked());

        type_text(&mut app, "admin");
        app.login_switch_field();
        type_text(&mut app, "12");
        assert!(!app.submit_login().unwrap());
        assert!(app.is_locked());
        assert!(app.login.error.is_some());
        assert!(app.login.password.is_empty());
        assert_eq!(app.login.email, "admin");

        type_text(&mut app, "123");
        assert!(app.submit_login().unwrap());
        assert!(!app.is_locked());
        assert_eq!(app.message.as_deref(), Some("Bem-vindo, Gerson Bruno"));

        app.current_page = Page::Finance;
        app.logout().unwrap();
        assert!(app.is_locked());
        assert_eq!(app.current_page, Page::Dashboard);
    }

    #[test]
    fn test_login_backspace_edits_active_field() {
        let mut app = locked_app();
        type_text(&mut app, "adminx");
        app.login_pop_char();
        app.login_switch_field();
        type_text(&mut app, "1");
        assert_eq!(app.login.email, "admin");
        assert_eq!(app.login.password, "1");
    }

    #[test]
    fn test_page_cycle() {
        let mut app = create_test_app();
        for _ in 0..5 {
            app.next_page();
        }
        assert_eq!(app.current_page, Page::Dashboard);
        app.previous_page();
        assert_eq!(app.current_page, Page::Finance);
    }

    #[test]
    fn test_search_filters_patients() {
        let mut app = create_test_app();
        app.next_page();
        assert_eq!(app.current_page, Page::Patients);

        app.start_search();
        for c in "carl".chars() {
            app.push_search_char(c);
        }
        app.end_search();

        let visible = app.visible_patients();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "Carlos Mendes");
        assert_eq!(app.selected_patient().unwrap().name, "Carlos Mendes");
    }

    #[test]
    fn test_records_page_searches_pathology() {
        let mut app = create_test_app();
        app.current_page = Page::Records;
        app.search = "lombalgia".to_string();
        app.reset_selection();

        assert_eq!(app.selected_patient().unwrap().name, "Ana Silva");
        app.toggle_records();
        assert!(app.show_records);
        assert_eq!(app.selected_records().len(), 1);
    }

    #[test]
    fn test_agenda_status_cycle_and_delete() {
        let mut app = create_test_app();
        app.current_page = Page::Agenda;
        app.agenda_state.select(Some(1)); // 09:00

        assert_eq!(app.selected_appointment().unwrap().status, AppointmentStatus::Confirmed);
        app.cycle_status().unwrap();
        assert_eq!(app.selected_appointment().unwrap().status, AppointmentStatus::Pending);

        app.delete_selected().unwrap();
        assert!(app.selected_appointment().is_none());
        assert!(app.store.appointments().is_empty());
    }

    #[test]
    fn test_agenda_day_navigation() {
        let mut app = create_test_app();
        app.current_page = Page::Agenda;
        app.agenda_state.select(Some(1));

        app.next_day();
        assert!(app.selected_appointment().is_none());
        app.go_today();
        assert!(app.selected_appointment().is_some());
    }

    #[test]
    fn test_finance_category_filter_cycle() {
        let mut app = create_test_app();
        app.current_page = Page::Finance;

        app.cycle_category_filter();
        assert_eq!(app.category_filter.as_deref(), Some("Receita"));
        assert_eq!(app.visible_transactions().len(), 1);

        app.cycle_category_filter();
        assert_eq!(app.category_filter.as_deref(), Some("Despesa Fixa"));

        app.cycle_category_filter();
        assert!(app.category_filter.is_none());
        assert_eq!(app.visible_transactions().len(), 2);
    }

    #[test]
    fn test_delete_transaction_keeps_selection_in_range() {
        let mut app = create_test_app();
        app.current_page = Page::Finance;
        app.finance_state.select(Some(1));

        app.delete_selected().unwrap();
        assert_eq!(app.store.transactions().len(), 1);
        assert_eq!(app.finance_state.selected(), Some(0));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("Sessão", 10), "Sessão");
        assert_eq!(truncate("Avaliação Inicial", 8), "Avali...");
    }
}
