//! "Picklist" screen: the cards to grab, with filters, sorting, and grouping.

use cardpick_core::progress::{ItemFilter, group_by_location, locations_of};
use cardpick_core::sorter::{SortDirection, SortSpec, ordered_indices};
use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::session::Session;
use crate::widgets::progress_gauge;

const PAGE: usize = 10;

/// One line of the list: a location header or an item index.
#[derive(Debug, Clone, PartialEq)]
enum Row {
    Header {
        location: String,
        grabbed: usize,
        total: usize,
    },
    Item(usize),
}

pub(crate) struct PicklistScreen {
    filter: ItemFilter,
    sort: SortSpec,
    grouped: bool,
    /// Position within the visible items, not the rows.
    selected: usize,
    editing_search: bool,
}

impl PicklistScreen {
    pub(crate) fn new() -> Self {
        Self {
            filter: ItemFilter::default(),
            sort: SortSpec::default(),
            grouped: true,
            selected: 0,
            editing_search: false,
        }
    }

    pub(crate) fn is_editing(&self) -> bool {
        self.editing_search
    }

    /// Item indices that pass the filter, in display order. When grouped,
    /// members of a location are contiguous so the cursor never jumps groups.
    fn visible(&self, session: &Session) -> Vec<usize> {
        let items = session.items();
        let order = ordered_indices(items, &self.sort);
        let visible = self.filter.visible(items, &order, &session.tracker);
        if !self.grouped {
            return visible;
        }
        group_by_location(items, &visible)
            .into_iter()
            .flat_map(|(_, members)| members)
            .collect()
    }

    fn rows(&self, session: &Session, visible: &[usize]) -> Vec<Row> {
        if !self.grouped {
            return visible.iter().map(|&i| Row::Item(i)).collect();
        }
        let mut rows = Vec::new();
        for (location, members) in group_by_location(session.items(), visible) {
            rows.push(Row::Header {
                grabbed: members.iter().filter(|&&i| session.is_grabbed(i)).count(),
                total: members.len(),
                location,
            });
            rows.extend(members.into_iter().map(Row::Item));
        }
        rows
    }

    fn selected_item(&self, visible: &[usize]) -> Option<usize> {
        visible.get(self.selected.min(visible.len().saturating_sub(1))).copied()
    }

    pub(crate) fn tick(&mut self, session: &mut Session) {
        if !session.lookups_enabled() {
            return;
        }
        let visible = self.visible(session);
        if let Some(index) = self.selected_item(&visible) {
            session.request_image(index);
        }
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, session: &Session) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Filters
                Constraint::Min(1),    // List + details
                Constraint::Length(1), // Progress
            ])
            .split(area);

        self.draw_filters(f, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(chunks[1]);

        let visible = self.visible(session);
        let selected = self.selected_item(&visible);
        self.draw_list(f, body[0], session, &visible, selected);
        draw_details(f, body[1], session, selected);

        let counts = session.tracker.counts(session.items());
        let pending = session.pending_lookups();
        let label = if pending > 0 {
            format!(
                "{}/{} grabbed · {pending} lookups pending",
                counts.grabbed, counts.total
            )
        } else {
            format!("{}/{} grabbed", counts.grabbed, counts.total)
        };
        f.render_widget(progress_gauge(counts.grabbed, counts.total, label), chunks[2]);
    }

    fn draw_filters(&self, f: &mut Frame, area: Rect) {
        let border = if self.editing_search {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let cursor = if self.editing_search { "▏" } else { "" };
        let primary = self.sort.levels()[0];
        let arrow = match primary.direction {
            SortDirection::Ascending => "↑",
            SortDirection::Descending => "↓",
        };

        let line = Line::from(vec![
            Span::styled("Search: ", Style::default().fg(Color::DarkGray)),
            Span::raw(format!("{}{cursor}", self.filter.search)),
            Span::styled("  Location: ", Style::default().fg(Color::DarkGray)),
            Span::raw(self.filter.location.as_deref().unwrap_or("All").to_string()),
            Span::styled("  Show: ", Style::default().fg(Color::DarkGray)),
            Span::raw(self.filter.status.label()),
            Span::styled("  Sort: ", Style::default().fg(Color::DarkGray)),
            Span::raw(format!("{} {arrow}", primary.key.label())),
            Span::styled(
                if self.grouped { "  [grouped]" } else { "" },
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        let bar = Paragraph::new(line).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Filters ")
                .border_style(border),
        );
        f.render_widget(bar, area);
    }

    fn draw_list(
        &self,
        f: &mut Frame,
        area: Rect,
        session: &Session,
        visible: &[usize],
        selected: Option<usize>,
    ) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" Cards ({}/{}) ", visible.len(), session.items().len()));

        if visible.is_empty() {
            let empty = Paragraph::new("No cards match the current filters.\n\nPress 'c' to clear them.")
                .alignment(Alignment::Center)
                .block(block);
            f.render_widget(empty, area);
            return;
        }

        let rows = self.rows(session, visible);
        let mut cursor = None;
        let entries: Vec<ListItem> = rows
            .iter()
            .enumerate()
            .map(|(pos, row)| match row {
                Row::Header {
                    location,
                    grabbed,
                    total,
                } => ListItem::new(format!(
                    "{location} ({grabbed}/{total} - {:.1}%)",
                    percent(*grabbed, *total)
                ))
                .style(
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Row::Item(i) => {
                    let is_selected = Some(*i) == selected;
                    if is_selected {
                        cursor = Some(pos);
                    }
                    item_line(session, *i, is_selected)
                }
            })
            .collect();

        let list = List::new(entries).block(block);
        let mut state = ListState::default().with_selected(cursor);
        f.render_stateful_widget(list, area, &mut state);
    }

    // -----------------------------------------------------------------------
    // Keys
    // -----------------------------------------------------------------------

    pub(crate) fn handle_key(
        &mut self,
        code: KeyCode,
        _modifiers: KeyModifiers,
        session: &mut Session,
    ) -> Option<String> {
        if self.editing_search {
            match code {
                KeyCode::Esc | KeyCode::Enter => self.editing_search = false,
                KeyCode::Backspace => {
                    self.filter.search.pop();
                    self.selected = 0;
                }
                KeyCode::Char(c) => {
                    self.filter.search.push(c);
                    self.selected = 0;
                }
                _ => {}
            }
            return None;
        }

        let visible = self.visible(session);
        match code {
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < visible.len() {
                    self.selected += 1;
                }
            }
            KeyCode::PageUp => self.selected = self.selected.saturating_sub(PAGE),
            KeyCode::PageDown => {
                self.selected = (self.selected + PAGE).min(visible.len().saturating_sub(1));
            }
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = visible.len().saturating_sub(1),
            KeyCode::Char(' ') | KeyCode::Enter => {
                let index = self.selected_item(&visible)?;
                let grabbed = session.toggle(index)?;
                let name = &session.items()[index].name;
                return Some(if grabbed {
                    format!("Grabbed {name}")
                } else {
                    format!("Put back {name}")
                });
            }
            KeyCode::Char('/') => self.editing_search = true,
            KeyCode::Char('l') => {
                self.filter.location = next_location(
                    &locations_of(session.items()),
                    self.filter.location.as_deref(),
                );
                self.selected = 0;
                return Some(format!(
                    "Location: {}",
                    self.filter.location.as_deref().unwrap_or("All")
                ));
            }
            KeyCode::Char('f') => {
                self.filter.status = self.filter.status.next();
                self.selected = 0;
                return Some(format!("Showing: {}", self.filter.status.label()));
            }
            KeyCode::Char('s') => {
                let key = self.sort.levels()[0].key.next();
                self.sort = self.sort.clone().with_primary(key);
                return Some(format!("Sorted by {}", key.label()));
            }
            KeyCode::Char('d') => self.sort = self.sort.clone().flip_primary(),
            KeyCode::Char('g') => self.grouped = !self.grouped,
            KeyCode::Char('c') => {
                self.filter = ItemFilter::default();
                self.sort = SortSpec::default();
                self.selected = 0;
                return Some("Filters cleared".into());
            }
            KeyCode::Char('w') => {
                return Some(match session.save_progress() {
                    Ok(path) => format!("Progress saved to {}", path.display()),
                    Err(e) => format!("Could not save progress: {e}"),
                });
            }
            KeyCode::Char('o') => {
                return Some(match session.load_progress() {
                    Ok(applied) => format!("Progress loaded ({applied} cards)"),
                    Err(e) => format!("Could not load progress: {e}"),
                });
            }
            KeyCode::Char('p') => {
                if !session.lookups_enabled() {
                    return Some("Lookups are off (started with --offline)".into());
                }
                let queued = session.request_prices(&visible);
                return Some(format!("Fetching {queued} prices..."));
            }
            _ => {}
        }
        None
    }
}

/// Cycle All → first location → ... → last location → All.
fn next_location(locations: &[String], current: Option<&str>) -> Option<String> {
    let next = match current {
        None => 0,
        Some(loc) => locations.iter().position(|l| l == loc).map_or(0, |i| i + 1),
    };
    locations.get(next).cloned()
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn item_line(session: &Session, index: usize, selected: bool) -> ListItem<'static> {
    let item = &session.items()[index];
    let grabbed = session.is_grabbed(index);
    let prefix = if selected { "▸ " } else { "  " };
    let mark = if grabbed { "[x]" } else { "[ ]" };
    let price = session.price_text(index);

    let style = if selected {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else if grabbed {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    ListItem::new(format!(
        "{prefix}{mark} {}x {}  [{} #{}]  {} {}  {price}",
        item.quantity,
        item.name,
        item.set_code,
        item.collector_number,
        item.condition,
        item.finish
    ))
    .style(style)
}

fn draw_details(f: &mut Frame, area: Rect, session: &Session, selected: Option<usize>) {
    let block = Block::default().borders(Borders::ALL).title(" Card ");
    let Some(index) = selected else {
        f.render_widget(Paragraph::new("").block(block), area);
        return;
    };
    let item = &session.items()[index];
    let dim = Style::default().fg(Color::DarkGray);
    let field = |label: &'static str, value: String| {
        Line::from(vec![Span::styled(format!("{label:10}"), dim), Span::raw(value)])
    };

    let mut lines = vec![
        Line::from(item.name.clone()).style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
        field("Set", format!("{} #{}", item.set_code, item.collector_number)),
        field("Condition", format!("{} {}", item.condition, item.finish)),
        field("Quantity", item.quantity.to_string()),
        field("Location", item.location.clone()),
        field("Order", item.order_label.clone()),
        field("Sold at", format!("${:.2}", item.unit_price)),
        field("Market", session.price_text(index)),
    ];
    if let Some(rarity) = &item.rarity {
        lines.push(field("Rarity", rarity.clone()));
    }
    if let Some(type_line) = &item.type_line {
        lines.push(field("Type", type_line.clone()));
    }
    if !item.colors.is_empty() {
        lines.push(field("Colors", item.colors.join("")));
    }
    lines.push(Line::from(""));
    lines.push(field("Image", session.image_text(index)));
    if session.is_grabbed(index) {
        lines.push(Line::from(""));
        lines.push(Line::from("✓ Grabbed").style(Style::default().fg(Color::Green)));
    }

    let details = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    f.render_widget(details, area);
}
