use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use std::time::Duration;
use tracing::warn;

use super::ERROR_REPLY;
use crate::api::types::{unchecked_count, GroceryItem, GroceryList, Role};
use crate::api::GroceryClient;
use crate::mutation::Mutation;
use crate::store::GroceryStore;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::theme::Theme;
use crate::ui::view::{Notice, ShortcutInfo, View, ViewAction};

const UPDATED_NOTICE: &str = "Item updated successfully";
const UPDATED_NOTICE_TTL: Duration = Duration::from_secs(2);

/// One visible line of the accordion
#[derive(Debug, Clone, PartialEq, Eq)]
enum Row {
  Aisle {
    name: String,
    unchecked: usize,
    expanded: bool,
  },
  Item {
    aisle: String,
    item: GroceryItem,
  },
}

/// Flatten the list into rows; only the expanded aisle shows its items
fn build_rows(list: &GroceryList, expanded: Option<&str>) -> Vec<Row> {
  let mut rows = Vec::new();
  for (aisle, items) in list {
    let is_expanded = expanded == Some(aisle.as_str());
    rows.push(Row::Aisle {
      name: aisle.clone(),
      unchecked: unchecked_count(items),
      expanded: is_expanded,
    });
    if is_expanded {
      rows.extend(items.iter().map(|item| Row::Item {
        aisle: aisle.clone(),
        item: item.clone(),
      }));
    }
  }
  rows
}

type UpdateInput = (String, String, bool);
type RemoveInput = (String, String);

/// Aisle-grouped list with check and remove actions
pub struct GroceryListView {
  list_state: ListState,
  expanded: Option<String>,
  update: Mutation<UpdateInput, GroceryList>,
  remove: Mutation<RemoveInput, GroceryList>,
}

impl GroceryListView {
  pub fn new(client: GroceryClient) -> Self {
    let update_client = client.clone();
    let update = Mutation::new(move |(aisle, item_id, checked): UpdateInput| {
      let client = update_client.clone();
      async move {
        client
          .update_item(&aisle, &item_id, checked)
          .await
          .map_err(|e| e.to_string())
      }
    });

    let remove = Mutation::new(move |(aisle, item_id): RemoveInput| {
      let client = client.clone();
      async move {
        client
          .remove_item(&aisle, &item_id)
          .await
          .map_err(|e| e.to_string())
      }
    });

    Self {
      list_state: ListState::default(),
      expanded: None,
      update,
      remove,
    }
  }

  fn rows(&self, store: &GroceryStore) -> Vec<Row> {
    build_rows(store.items(), self.expanded.as_deref())
  }

  fn selected_row(&self, store: &GroceryStore) -> Option<Row> {
    let idx = self.list_state.selected()?;
    self.rows(store).into_iter().nth(idx)
  }

  /// Expand an aisle (collapsing any other) or collapse it if already open
  fn toggle_aisle(&mut self, store: &GroceryStore, aisle: &str) {
    if self.expanded.as_deref() == Some(aisle) {
      self.expanded = None;
    } else {
      self.expanded = Some(aisle.to_string());
    }

    // Keep the cursor on the aisle header; its row index may have moved
    let idx = self
      .rows(store)
      .iter()
      .position(|row| matches!(row, Row::Aisle { name, .. } if name == aisle));
    self.list_state.select(idx);
  }

  /// Apply a server-confirmed list, or report the failure in the transcript
  fn settle(
    store: &mut GroceryStore,
    outcome: Result<GroceryList, String>,
    action: &str,
  ) -> Result<(), Notice> {
    match outcome {
      Ok(list) => {
        store.set_items(list);
        Ok(())
      }
      Err(e) => {
        warn!(error = %e, action, "grocery list action failed");
        store.add_message(Role::Assistant, ERROR_REPLY);
        Err(Notice::error(format!("Failed to {} item: {}", action, e)))
      }
    }
  }

  fn render_empty(&self, frame: &mut Frame, area: Rect, block: Block, theme: &Theme) {
    let text = vec![
      Line::from(""),
      Line::from("Your grocery list is empty."),
      Line::from("Start by adding some items!"),
    ];
    let paragraph = Paragraph::new(text)
      .block(block)
      .alignment(Alignment::Center)
      .wrap(Wrap { trim: true })
      .style(Style::default().fg(theme.muted));
    frame.render_widget(paragraph, area);
  }

  fn row_line(row: &Row, theme: &Theme, width: usize) -> Line<'static> {
    match row {
      Row::Aisle {
        name,
        unchecked,
        expanded,
      } => {
        let marker = if *expanded { "▾" } else { "▸" };
        let mut spans = vec![
          Span::styled(format!("{} ", marker), Style::default().fg(theme.muted)),
          Span::styled(
            truncate(name, width.saturating_sub(8)),
            Style::default().fg(theme.text).bold(),
          ),
        ];
        if *unchecked > 0 {
          spans.push(Span::raw(" "));
          spans.push(Span::styled(
            format!(" {} ", unchecked),
            Style::default().bg(theme.primary).fg(theme.paper),
          ));
        }
        Line::from(spans)
      }
      Row::Item { item, .. } => {
        let (checkbox, style) = if item.checked {
          (
            "[x]",
            Style::default()
              .fg(theme.muted)
              .add_modifier(Modifier::CROSSED_OUT),
          )
        } else {
          ("[ ]", Style::default().fg(theme.text))
        };
        let label = match item.quantity_label() {
          Some(quantity) => format!("{} {}", item.name, quantity),
          None => item.name.clone(),
        };
        Line::from(vec![
          Span::styled(format!("  {} ", checkbox), Style::default().fg(theme.secondary)),
          Span::styled(truncate(&label, width.saturating_sub(8)), style),
        ])
      }
    }
  }
}

impl View for GroceryListView {
  fn handle_key(&mut self, key: KeyEvent, store: &mut GroceryStore) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
      }
      KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('d') | KeyCode::Delete => {
        let Some(row) = self.selected_row(store) else {
          return ViewAction::None;
        };
        match (key.code, row) {
          (KeyCode::Char(' '), Row::Item { aisle, item }) => {
            self.update.mutate((aisle, item.id, !item.checked));
          }
          (KeyCode::Char('d') | KeyCode::Delete, Row::Item { aisle, item }) => {
            self.remove.mutate((aisle, item.id));
          }
          (KeyCode::Enter | KeyCode::Char(' '), Row::Aisle { name, .. }) => {
            self.toggle_aisle(store, &name);
          }
          (KeyCode::Enter, Row::Item { aisle, .. }) => {
            self.toggle_aisle(store, &aisle);
          }
          _ => {}
        }
      }
      _ => return ViewAction::NotHandled,
    }
    ViewAction::None
  }

  fn render(
    &mut self,
    frame: &mut Frame,
    area: Rect,
    store: &GroceryStore,
    theme: &Theme,
    focused: bool,
  ) {
    let total = store.unchecked_count();
    let mut title = vec![Span::styled(" Grocery List ", Style::default().fg(theme.text).bold())];
    if total > 0 {
      title.push(Span::styled(
        format!(" {} ", total),
        Style::default().bg(theme.primary).fg(theme.paper),
      ));
      title.push(Span::raw(" "));
    }
    if self.update.is_pending() || self.remove.is_pending() {
      title.push(Span::styled("(saving...) ", Style::default().fg(theme.muted)));
    }

    let border = if focused { theme.primary } else { theme.muted };
    let block = Block::default()
      .title(Line::from(title))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border))
      .style(Style::default().bg(theme.paper));

    let rows = self.rows(store);
    if store.items().is_empty() {
      self.render_empty(frame, area, block, theme);
      return;
    }

    ensure_valid_selection(&mut self.list_state, rows.len());

    let width = area.width.saturating_sub(2) as usize;
    let items: Vec<ListItem> = rows
      .iter()
      .map(|row| ListItem::new(Self::row_line(row, theme, width)))
      .collect();

    let highlight = if focused {
      Style::default().bg(theme.background).add_modifier(Modifier::BOLD)
    } else {
      Style::default()
    };
    let list = List::new(items)
      .block(block)
      .highlight_style(highlight)
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn title(&self) -> &'static str {
    "List"
  }

  fn tick(&mut self, store: &mut GroceryStore) -> Option<Notice> {
    let mut notice = None;

    if let Some(outcome) = self.update.poll() {
      notice = Some(match Self::settle(store, outcome, "update") {
        Ok(()) => Notice::success(UPDATED_NOTICE, UPDATED_NOTICE_TTL),
        Err(error) => error,
      });
    }

    if let Some(outcome) = self.remove.poll() {
      if let Err(error) = Self::settle(store, outcome, "remove") {
        notice = Some(error);
      }
    }

    notice
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("j/k", "move").with_priority(10),
      ShortcutInfo::new("enter", "expand").with_priority(20),
      ShortcutInfo::new("space", "check").with_priority(30),
      ShortcutInfo::new("d", "remove").with_priority(40),
    ]
  }
}
