//! Detail screen rendering
//!
//! Summary card on top, the action bar under it, then one horizontal strip
//! per related row. Popups (resume, tracks, versions, confirmations, more
//! options) are drawn centered over everything.

use ratatui::{
    prelude::*,
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, Paragraph, Wrap},
};

use crate::app::{Focus, Screen};
use crate::detail::{ActionBar, ActionKind, Popup};
use crate::rows::Row;
use crate::ui::Theme;

/// Columns reserved per row item
const ITEM_WIDTH: u16 = 24;

/// Height of one row strip (borders + one line)
const ROW_HEIGHT: u16 = 3;

/// Render the detail screen for `screen`
pub fn render_detail(frame: &mut Frame, area: Rect, screen: &Screen) {
    let controller = &screen.controller;
    let Some(summary) = controller.summary() else {
        render_loading(frame, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(9), // Summary card
            Constraint::Length(3), // Actions
            Constraint::Min(1),    // Rows
        ])
        .split(area);

    // Summary card
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Theme::border())
        .title(Span::styled(format!(" {} ", summary.title), Theme::title()));
    let mut lines = Vec::new();
    let info: Vec<Span> = summary
        .info
        .iter()
        .enumerate()
        .flat_map(|(i, item)| {
            let sep = if i > 0 { " │ " } else { "" };
            [
                Span::styled(sep, Theme::dimmed()),
                Span::styled(format!("{}: ", item.label), Theme::dimmed()),
                Span::styled(item.value.clone(), Theme::secondary()),
            ]
        })
        .collect();
    if !info.is_empty() {
        lines.push(Line::from(info));
        lines.push(Line::from(""));
    }
    for line in summary.overview.lines() {
        lines.push(Line::from(Span::styled(line.to_string(), Theme::text())));
    }
    let card = Paragraph::new(lines).wrap(Wrap { trim: true }).block(block);
    frame.render_widget(card, chunks[0]);

    render_actions(frame, chunks[1], controller.actions(), screen.focus == Focus::Actions);
    render_rows(frame, chunks[2], screen);

    if let Some(popup) = controller.popup() {
        render_popup(frame, area, popup, screen.popup_selected);
    }
}

fn render_loading(frame: &mut Frame, area: Rect) {
    let loading = Paragraph::new("⟳ Loading...")
        .style(Theme::loading())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Theme::border()),
        );
    frame.render_widget(loading, area);
}

/// Visible buttons as spans; the focused one is highlighted when the bar has focus
pub fn action_spans(bar: &ActionBar, focused: bool) -> Vec<Span<'static>> {
    let focus = bar.focused();
    let mut spans = Vec::new();
    for button in bar.visible() {
        let marker = if button.activated { "● " } else { "" };
        let style = if focused && focus == Some(button.kind) {
            Theme::highlighted()
        } else if button.activated
            && matches!(button.kind, ActionKind::Record | ActionKind::RecordSeries)
        {
            Theme::recording()
        } else if button.activated {
            Theme::accent()
        } else {
            Theme::text()
        };
        spans.push(Span::styled(format!(" {}{} ", marker, button.label), style));
        spans.push(Span::raw(" "));
    }
    spans
}

fn render_actions(frame: &mut Frame, area: Rect, bar: &ActionBar, focused: bool) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(if focused {
            Theme::border_focused()
        } else {
            Theme::border()
        });
    frame.render_widget(Paragraph::new(Line::from(action_spans(bar, focused))).block(block), area);
}

/// Range of item indices to draw so that `selected` stays visible
pub fn visible_window(selected: usize, len: usize, capacity: usize) -> (usize, usize) {
    if capacity == 0 || len == 0 {
        return (0, 0);
    }
    let start = selected.min(len - 1).saturating_sub(capacity - 1);
    (start, (start + capacity).min(len))
}

fn render_rows(frame: &mut Frame, area: Rect, screen: &Screen) {
    let rows = screen.controller.rows();
    let fit = (area.height / ROW_HEIGHT).max(1) as usize;
    let focused = match screen.focus {
        Focus::Row(p) => Some(p),
        Focus::Actions => None,
    };
    let (first, last) = visible_window(focused.unwrap_or(0), rows.len(), fit);

    let constraints: Vec<Constraint> = (first..last).map(|_| Constraint::Length(ROW_HEIGHT)).collect();
    let slots = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    for (slot, position) in (first..last).enumerate() {
        if let Some(row) = rows.at(position) {
            let selected = (focused == Some(position)).then(|| screen.selection(row.id));
            render_row(frame, slots[slot], row, selected);
        }
    }
}

fn render_row(frame: &mut Frame, area: Rect, row: &Row, selected: Option<usize>) {
    let items = row.items();
    let count = match row.adapter() {
        Some(adapter) if adapter.total_items() > 0 => format!(" {}/{}", items.len(), adapter.total_items()),
        _ => format!(" {}", items.len()),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(if selected.is_some() {
            Theme::border_focused()
        } else {
            Theme::border()
        })
        .title(Line::from(vec![
            Span::styled(format!(" {}", row.header.title), Theme::title()),
            Span::styled(format!("{} ", count), Theme::dimmed()),
        ]));

    let capacity = (area.width.saturating_sub(2) / ITEM_WIDTH).max(1) as usize;
    let (start, end) = visible_window(selected.unwrap_or(0), items.len(), capacity);
    let mut spans = Vec::new();
    for (index, item) in items.iter().enumerate().take(end).skip(start) {
        let mut label = item.label();
        if label.chars().count() > ITEM_WIDTH as usize - 2 {
            label = label.chars().take(ITEM_WIDTH as usize - 3).collect::<String>() + "…";
        }
        let style = if selected == Some(index) {
            Theme::list_item_selected()
        } else {
            Theme::list_item()
        };
        spans.push(Span::styled(
            format!("{:<width$}", label, width = ITEM_WIDTH as usize - 1),
            style,
        ));
        spans.push(Span::raw(" "));
    }
    if items.is_empty() {
        let loading = row.adapter().map(|a| a.is_retrieving()).unwrap_or(false);
        spans.push(Span::styled(if loading { "⟳ Loading..." } else { "—" }, Theme::dimmed()));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_popup(frame: &mut Frame, area: Rect, popup: &Popup, selected: usize) {
    let width = 50.min(area.width.saturating_sub(4));
    let height = (popup.options.len() as u16 + 2).min(area.height.saturating_sub(2));
    let popup_area = Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    };
    frame.render_widget(Clear, popup_area);

    let items: Vec<ListItem> = popup
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let check = match popup.checked {
                Some(c) if c == i => "✓ ",
                Some(_) => "  ",
                None => "",
            };
            let marker = if i == selected { "▸ " } else { "  " };
            let style = if i == selected {
                Theme::list_item_selected()
            } else {
                Theme::list_item()
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Theme::accent()),
                Span::styled(format!("{}{}", check, option), style),
            ]))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Double)
            .border_style(Theme::border_focused())
            .title(Span::styled(format!(" {} ", popup.title), Theme::title()))
            .style(Style::default().bg(Theme::BACKGROUND)),
    );
    frame.render_widget(list, popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_window_keeps_selection() {
        assert_eq!(visible_window(0, 10, 4), (0, 4));
        assert_eq!(visible_window(3, 10, 4), (0, 4));
        assert_eq!(visible_window(4, 10, 4), (1, 5));
        assert_eq!(visible_window(9, 10, 4), (6, 10));
        assert_eq!(visible_window(2, 3, 5), (0, 3));
        assert_eq!(visible_window(0, 0, 5), (0, 0));
    }

    #[test]
    fn test_action_spans_skip_hidden_buttons() {
        let mut bar = ActionBar::new();
        assert!(action_spans(&bar, true).is_empty());

        bar = crate::detail::ActionBar::build(&crate::detail::ActionContext {
            subject: &crate::models::BaseItem {
                kind: crate::models::ItemKind::Movie,
                ..Default::default()
            },
            program: None,
            series_timer: None,
            preferences: &crate::config::Preferences::default(),
            can_manage_recordings: false,
            watchlist: None,
            now: chrono::Utc::now(),
        });
        let text: String = action_spans(&bar, false)
            .iter()
            .map(|s| s.content.to_string())
            .collect();
        assert!(text.contains("Play"));
        assert!(!bar.is_visible(ActionKind::Resume));
        assert!(!text.contains("Resume"));
    }
}
