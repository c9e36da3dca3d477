use crate::inventory::DashboardStats;
use crate::ui::view::ShortcutInfo;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// What the header knows about the dashboard counters
pub enum StatsDisplay<'a> {
  Loading,
  Ready {
    stats: &'a DashboardStats,
    refreshing: bool,
  },
  Failed,
}

/// Draw the two-line header: context and counters, then shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  api_url: &str,
  stats: StatsDisplay,
  shortcuts: &[ShortcutInfo],
) {
  let sep = Span::styled("│", Style::default().fg(Color::DarkGray));

  let mut context = vec![
    Span::styled(format!(" {} ", title), Style::default().fg(Color::Cyan).bold()),
    sep.clone(),
    Span::styled(
      format!(" {} ", extract_domain(api_url)),
      Style::default().fg(Color::White),
    ),
    sep,
    Span::raw(" "),
  ];
  context.extend(stats_spans(&stats));

  let mut shortcut_spans = vec![Span::raw(" ")];
  let mut sorted: Vec<&ShortcutInfo> = shortcuts.iter().collect();
  sorted.sort_by_key(|s| s.priority);
  for (i, shortcut) in sorted.into_iter().enumerate() {
    if i > 0 {
      shortcut_spans.push(Span::raw("   "));
    }
    shortcut_spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    shortcut_spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(vec![Line::from(context), Line::from(shortcut_spans)])
    .style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

fn stats_spans(stats: &StatsDisplay) -> Vec<Span<'static>> {
  let dim = Style::default().fg(Color::DarkGray);
  match stats {
    StatsDisplay::Loading => vec![Span::styled("loading stats...", dim)],
    StatsDisplay::Failed => vec![Span::styled("stats unavailable", Style::default().fg(Color::Red))],
    StatsDisplay::Ready { stats, refreshing } => {
      let low_style = if stats.low_stock_items > 0 {
        Style::default().fg(Color::Red).bold()
      } else {
        Style::default().fg(Color::Green)
      };
      let mut spans = vec![
        Span::styled("items ", dim),
        Span::raw(stats.total_items.to_string()),
        Span::styled("  low stock ", dim),
        Span::styled(stats.low_stock_items.to_string(), low_style),
        Span::styled("  categories ", dim),
        Span::raw(stats.total_categories.to_string()),
        Span::styled("  suppliers ", dim),
        Span::raw(stats.total_suppliers.to_string()),
        Span::styled("  pending PRs ", dim),
        Span::styled(
          stats.pending_requisitions.to_string(),
          Style::default().fg(Color::Yellow),
        ),
      ];
      if *refreshing {
        spans.push(Span::styled(" ↻", dim));
      }
      spans
    }
  }
}

/// Host (and port) of the API URL
fn extract_domain(url: &str) -> &str {
  let rest = url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url);
  rest.split('/').next().unwrap_or(rest)
}
