//! UI rendering for the TUI

use crate::config::Theme;
use crate::screen::{display_path, Screen};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use retype_core::{
    HighlightKind, MemoryDocument, PlaybackControl, PlaybackState, Position, Surface,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const TAB: &str = "    ";

/// Cut `text` to at most `max` display columns, marking the cut with `…`
fn fit_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

/// Main drawing function
pub fn draw(frame: &mut Frame, screen: &mut Screen, control: &PlaybackControl, theme: &Theme) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Document
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    draw_document(frame, screen, theme, chunks[0]);
    draw_status_bar(frame, screen, control, theme, chunks[1]);

    if screen.popup.is_some() {
        draw_popup(frame, screen, theme);
    }
}

fn draw_document(frame: &mut Frame, screen: &mut Screen, theme: &Theme, area: Rect) {
    screen.viewport_height = area.height.saturating_sub(2) as usize;

    let active = screen
        .surface
        .active()
        .and_then(|id| screen.surface.document(&id));
    let Some(doc) = active else {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.muted));
        let hint = Paragraph::new(Line::from(Span::styled(
            "Waiting for the first file…",
            Style::default().fg(theme.muted),
        )))
        .block(block);
        frame.render_widget(hint, area);
        return;
    };

    let top = screen.top_line(doc.id());
    let height = screen.viewport_height;
    let gutter = doc.lines().len().to_string().len().max(3);

    let lines: Vec<Line> = (top..doc.lines().len())
        .take(height)
        .map(|line| render_line(doc, line, gutter, theme))
        .collect();

    let title = format!(" {} ", display_path(doc.id().path()));
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.accent))
        .title(Span::styled(title, Style::default().fg(theme.accent)));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Highlight kind shown for a character, strongest first
fn kind_at(doc: &MemoryDocument, at: Position) -> Option<HighlightKind> {
    [
        HighlightKind::Addition,
        HighlightKind::Modification,
        HighlightKind::Deletion,
    ]
    .into_iter()
    .find(|&kind| {
        doc.highlights(kind)
            .iter()
            .any(|range| range.start <= at && at < range.end)
    })
}

fn kind_color(kind: HighlightKind, theme: &Theme) -> Color {
    match kind {
        HighlightKind::Addition => theme.addition,
        HighlightKind::Deletion => theme.deletion,
        HighlightKind::Modification => theme.modification,
        HighlightKind::Cursor => theme.cursor,
    }
}

/// Gutter marker for lines touched by a region, even once they are empty
fn line_marker(doc: &MemoryDocument, line: usize, theme: &Theme) -> Span<'static> {
    let marked = [
        (HighlightKind::Addition, "+"),
        (HighlightKind::Modification, "~"),
        (HighlightKind::Deletion, "-"),
    ]
    .into_iter()
    .find(|(kind, _)| doc.highlights(*kind).iter().any(|r| r.contains_line(line)));
    match marked {
        Some((kind, sign)) => Span::styled(sign, Style::default().fg(kind_color(kind, theme))),
        None => Span::raw(" "),
    }
}

fn render_line(doc: &MemoryDocument, line: usize, gutter: usize, theme: &Theme) -> Line<'static> {
    let text = &doc.lines()[line];
    let cursor = doc
        .highlights(HighlightKind::Cursor)
        .first()
        .map(|range| range.start)
        .filter(|pos| pos.line == line);

    let mut spans = vec![
        Span::styled(
            format!("{:>width$} ", line + 1, width = gutter),
            Style::default().fg(theme.muted),
        ),
        line_marker(doc, line, theme),
        Span::raw(" "),
    ];

    let mut run = String::new();
    let mut run_style = Style::default();
    let mut column = 0;
    for ch in text.chars() {
        let mut style = match kind_at(doc, Position::new(line, column)) {
            Some(kind) => Style::default().fg(kind_color(kind, theme)),
            None => Style::default(),
        };
        if cursor.is_some_and(|pos| pos.column == column) {
            style = style.add_modifier(Modifier::REVERSED);
        }
        if style != run_style && !run.is_empty() {
            spans.push(Span::styled(std::mem::take(&mut run), run_style));
        }
        run_style = style;
        if ch == '\t' {
            run.push_str(TAB);
        } else {
            run.push(ch);
        }
        column += 1;
    }
    if !run.is_empty() {
        spans.push(Span::styled(run, run_style));
    }
    if cursor.is_some_and(|pos| pos.column >= column) {
        spans.push(Span::styled("▏", Style::default().fg(theme.cursor)));
    }

    Line::from(spans)
}

/// Status line badge for the playback state
fn state_tag(state: PlaybackState, theme: &Theme) -> (&'static str, Color) {
    match state {
        PlaybackState::Idle => (" IDLE ", theme.muted),
        PlaybackState::Playing => (" PLAYING ", theme.addition),
        PlaybackState::Paused => (" PAUSED ", theme.modification),
        PlaybackState::Skipped => (" SKIPPING ", theme.accent),
        PlaybackState::Stopped => (" STOPPING ", theme.deletion),
    }
}

fn draw_status_bar(
    frame: &mut Frame,
    screen: &Screen,
    control: &PlaybackControl,
    theme: &Theme,
    area: Rect,
) {
    let (tag, tag_color) = state_tag(control.state(), theme);

    let right = {
        let docs = screen.surface.documents().count();
        let position = screen
            .surface
            .active()
            .and_then(|id| screen.surface.documents().position(|d| d.id() == &id))
            .map(|idx| idx + 1)
            .unwrap_or(0);
        if docs > 1 {
            format!(" doc {position}/{docs}  ? c ")
        } else {
            " ? c ".to_string()
        }
    };

    let middle = screen
        .surface
        .controls()
        .map(|view| view.title())
        .or_else(|| screen.message.clone())
        .unwrap_or_default();

    let available = (area.width as usize)
        .saturating_sub(tag.width())
        .saturating_sub(right.width())
        .saturating_sub(2);
    let middle = fit_width(&middle, available);
    let padding = available.saturating_sub(middle.width());

    let line = Line::from(vec![
        Span::styled(
            tag,
            Style::default()
                .fg(Color::Black)
                .bg(tag_color)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::raw(middle),
        Span::raw(" ".repeat(padding + 1)),
        Span::styled(right, Style::default().fg(theme.muted)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

/// Rows `text` needs when wrapped to `width` columns
fn wrapped_rows(text: &str, width: usize) -> usize {
    let width = width.max(1);
    text.lines()
        .map(|line| line.width().div_ceil(width).max(1))
        .sum::<usize>()
        .max(1)
}

fn draw_popup(frame: &mut Frame, screen: &Screen, theme: &Theme) {
    let Some(popup) = screen.popup.as_ref() else {
        return;
    };
    let area = frame.area();

    let popup_width = 72u16.min(area.width.saturating_sub(4));
    let inner_width = popup_width.saturating_sub(4) as usize;
    let title_rows = u16::try_from(wrapped_rows(&popup.title, inner_width)).unwrap_or(u16::MAX);
    let option_rows = u16::try_from(popup.options.len()).unwrap_or(u16::MAX);
    let wanted = title_rows.saturating_add(option_rows).saturating_add(3);
    let popup_height = wanted.min(area.height.saturating_sub(2));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.accent));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(title_rows.min(inner.height.saturating_sub(2))),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);

    let title = Paragraph::new(popup.title.as_str())
        .style(Style::default().add_modifier(Modifier::BOLD))
        .wrap(Wrap { trim: true });
    frame.render_widget(title, chunks[0]);

    let items: Vec<ListItem> = popup
        .options
        .iter()
        .enumerate()
        .map(|(idx, option)| {
            let key = if idx < 9 {
                format!(" {} ", idx + 1)
            } else {
                "   ".to_string()
            };
            ListItem::new(Line::from(vec![
                Span::styled(key, Style::default().fg(theme.muted)),
                Span::raw(fit_width(option, inner_width.saturating_sub(4))),
            ]))
        })
        .collect();
    let list = List::new(items).highlight_style(
        Style::default()
            .fg(theme.accent)
            .add_modifier(Modifier::REVERSED),
    );
    let mut state = ListState::default().with_selected(Some(popup.selected));
    frame.render_stateful_widget(list, chunks[2], &mut state);
}
