//! "Summary" screen: totals, per-location progress, and what is left.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::session::Session;

pub(crate) struct SummaryScreen {
    scroll: u16,
}

/// Plain-text summary of the session, one entry per line.
fn summary_lines(session: &Session) -> Vec<String> {
    let items = session.items();
    if items.is_empty() {
        return vec!["No cards loaded".into()];
    }
    let counts = session.tracker.counts(items);

    let mut lines = vec![
        format!("Picklist:   {}", session.path.display()),
        format!(
            "Generated:  {}",
            session.picklist.generated_at.format("%Y-%m-%d %H:%M UTC")
        ),
        format!("Filter:     {}", session.picklist.filter),
        String::new(),
        format!("Total cards: {}", counts.total),
        format!("Grabbed:     {}", counts.grabbed),
        format!("Remaining:   {}", counts.remaining),
        String::new(),
        "BY LOCATION".into(),
        "-".repeat(30),
    ];
    for p in session.tracker.location_progress(items) {
        let pct = if p.total == 0 {
            0.0
        } else {
            p.grabbed as f64 / p.total as f64 * 100.0
        };
        lines.push(format!("{}: {}/{} ({pct:.1}%)", p.location, p.grabbed, p.total));
    }

    lines.push(String::new());
    lines.push("REMAINING CARDS".into());
    lines.push("-".repeat(30));
    for (i, item) in items.iter().enumerate() {
        if !session.is_grabbed(i) {
            lines.push(format!(
                "• {}x {} [{}] - {}",
                item.quantity, item.name, item.set_code, item.location
            ));
        }
    }
    lines
}

impl SummaryScreen {
    pub(crate) fn new() -> Self {
        Self { scroll: 0 }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, session: &Session) {
        let text: Vec<Line> = summary_lines(session).into_iter().map(Line::from).collect();
        let summary = Paragraph::new(text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Picklist Summary "),
            )
            .scroll((self.scroll, 0));
        f.render_widget(summary, area);
    }

    pub(crate) fn handle_key(
        &mut self,
        code: KeyCode,
        _modifiers: KeyModifiers,
        session: &mut Session,
    ) -> Option<String> {
        match code {
            KeyCode::Up | KeyCode::Char('k') => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.scroll = self.scroll.saturating_add(1),
            KeyCode::Home => self.scroll = 0,
            KeyCode::Char('w') => {
                return Some(match session.save_progress() {
                    Ok(path) => format!("Progress saved to {}", path.display()),
                    Err(e) => format!("Could not save progress: {e}"),
                });
            }
            _ => {}
        }
        None
    }
}
