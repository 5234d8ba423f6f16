//! Virtualized table model over a resolved list.
//!
//! Cells are computed on every read from the message or header at that row; nothing
//! is cached per cell, so tag edits show up immediately.

use ratatui::style::Color;
use std::path::Path;

use crate::model::types::{ConversationKey, Message};
use crate::search::query::{DisplayItem, ResolvedList};
use crate::search::worker::GenerationCounter;
use crate::store::MessageStore;
use crate::ui::colors::RowColorPolicy;
use crate::ui::components::theme::{ThemeProvider, names};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Time,
    Sender,
    Receiver,
    Message,
    Content,
    Tags,
    Source,
    Ip,
    Port,
    Line,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::Time,
        Column::Sender,
        Column::Receiver,
        Column::Message,
        Column::Content,
        Column::Tags,
        Column::Source,
        Column::Ip,
        Column::Port,
        Column::Line,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Time => "Time",
            Self::Sender => "Sender",
            Self::Receiver => "Receiver",
            Self::Message => "Message",
            Self::Content => "Content",
            Self::Tags => "Tags",
            Self::Source => "Source",
            Self::Ip => "IP",
            Self::Port => "Port",
            Self::Line => "Line",
        }
    }
}

/// What a cell read is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRole {
    Display,
    Background,
    Tooltip,
    /// The row's message id; used by tag/note actions.
    Identity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Color(Color),
}

impl CellValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Color(_) => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Self::Color(c) => Some(*c),
            Self::Text(_) => None,
        }
    }
}

pub struct DisplayModel {
    list: ResolvedList,
    generations: GenerationCounter,
    /// Generation of the list currently shown.
    shown: u64,
    policy: RowColorPolicy,
}

impl DisplayModel {
    pub fn new(generations: GenerationCounter, policy: RowColorPolicy) -> Self {
        Self {
            list: ResolvedList::empty(),
            generations,
            shown: 0,
            policy,
        }
    }

    /// Accept `list` only if `generation` is the latest token issued. Returns whether
    /// it was applied.
    pub fn apply(&mut self, generation: u64, list: ResolvedList) -> bool {
        if !self.generations.is_latest(generation) {
            tracing::debug!(
                generation,
                latest = self.generations.latest(),
                "display_model_rejected_stale"
            );
            return false;
        }
        self.list = list;
        self.shown = generation;
        true
    }

    /// Show `list` under a freshly issued generation, superseding anything in flight.
    pub fn replace(&mut self, list: ResolvedList) -> u64 {
        let generation = self.generations.next();
        self.list = list;
        self.shown = generation;
        generation
    }

    pub fn generation(&self) -> u64 {
        self.shown
    }

    pub fn list(&self) -> &ResolvedList {
        &self.list
    }

    pub fn policy(&self) -> &RowColorPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: RowColorPolicy) {
        self.policy = policy;
    }

    pub fn row_count(&self) -> usize {
        self.list.len()
    }

    pub fn column_count(&self) -> usize {
        Column::ALL.len()
    }

    /// Number of message rows (headers excluded).
    pub fn message_count(&self) -> usize {
        self.list.count()
    }

    pub fn item(&self, row: usize) -> Option<&DisplayItem> {
        self.list.items().get(row)
    }

    pub fn is_selectable(&self, row: usize) -> bool {
        matches!(self.item(row), Some(DisplayItem::Message { .. }))
    }

    pub fn message_at<'s>(
        &self,
        store: &'s MessageStore,
        row: usize,
    ) -> Option<(ConversationKey, &'s Message)> {
        match self.item(row)? {
            DisplayItem::Message { key, index } => {
                store.message(key, *index).map(|m| (key.clone(), m))
            }
            DisplayItem::Header { .. } => None,
        }
    }

    /// Nearest selectable row at or after `row`, scanning forward or backward.
    pub fn next_selectable(&self, row: usize, forward: bool) -> Option<usize> {
        let mut row = row as isize;
        let len = self.row_count() as isize;
        while (0..len).contains(&row) {
            if self.is_selectable(row as usize) {
                return Some(row as usize);
            }
            row += if forward { 1 } else { -1 };
        }
        None
    }

    pub fn cell(
        &self,
        store: &MessageStore,
        theme: &dyn ThemeProvider,
        row: usize,
        col: usize,
        role: CellRole,
    ) -> Option<CellValue> {
        let column = Column::from_index(col)?;
        match self.item(row)? {
            DisplayItem::Header { label, .. } => match role {
                CellRole::Display if column == Column::Time => Some(CellValue::Text(label.clone())),
                CellRole::Display => Some(CellValue::Text(String::new())),
                CellRole::Background => theme.color(names::HEADER).map(CellValue::Color),
                CellRole::Tooltip | CellRole::Identity => None,
            },
            DisplayItem::Message { key, index } => {
                let message = store.message(key, *index)?;
                match role {
                    CellRole::Display => Some(CellValue::Text(display_text(message, column))),
                    CellRole::Background => self
                        .policy
                        .background(theme, key, message, row)
                        .map(CellValue::Color),
                    CellRole::Tooltip => tooltip(store, message, column).map(CellValue::Text),
                    CellRole::Identity => Some(CellValue::Text(message.msg_id.clone())),
                }
            }
        }
    }

    /// Display text for a whole row, in column order.
    pub fn row_text(&self, store: &MessageStore, theme: &dyn ThemeProvider, row: usize) -> Vec<String> {
        (0..self.column_count())
            .map(|col| {
                self.cell(store, theme, row, col, CellRole::Display)
                    .and_then(|v| v.as_text().map(str::to_string))
                    .unwrap_or_default()
            })
            .collect()
    }
}

fn display_text(message: &Message, column: Column) -> String {
    match column {
        Column::Time => message.formatted_timestamp(),
        Column::Sender => message.sender.clone(),
        Column::Receiver => message.receiver.clone(),
        Column::Message => message.body.replace(['\r', '\n'], " "),
        Column::Content => message.content_id.clone(),
        Column::Tags => message.tag_list(),
        Column::Source => message.source.clone(),
        Column::Ip => message.ip.clone(),
        Column::Port => message.port.clone(),
        Column::Line => message
            .line_number
            .map(|n| n.to_string())
            .unwrap_or_default(),
    }
}

fn tooltip(store: &MessageStore, message: &Message, column: Column) -> Option<String> {
    match column {
        Column::Message if !message.body.is_empty() => Some(message.body.clone()),
        Column::Content => store
            .media_path(&message.content_id)
            .map(Path::display)
            .map(|p| p.to_string()),
        _ => None,
    }
}
