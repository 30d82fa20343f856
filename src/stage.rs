// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fmt;

use tokio::sync::watch;

use crate::pattern::STRINGS;

/// What the presentation layer shows: whether a performance is running, and which string,
/// if any, is sounding right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct StageView {
    pub performing: bool,
    pub active_string: Option<usize>,
}

impl StageView {
    /// Whether the given string is highlighted.
    pub fn is_highlighted(&self, string_index: usize) -> bool {
        self.active_string == Some(string_index)
    }
}

impl fmt::Display for StageView {
    /// Draws the strings on one line, the sounding string in brackets.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, string) in STRINGS.iter().enumerate() {
            if self.is_highlighted(i) {
                write!(f, "[{}]", string.label)?;
            } else {
                write!(f, " {} ", string.label)?;
            }
        }
        f.write_str(if self.performing {
            "  playing"
        } else {
            "  idle   "
        })
    }
}

/// Marks the performance as started.
pub(crate) fn start(sender: &watch::Sender<StageView>) {
    sender.send_modify(|view| view.performing = true);
}

/// Highlights a string, replacing any previous highlight.
pub(crate) fn highlight(sender: &watch::Sender<StageView>, string_index: usize) {
    sender.send_modify(|view| view.active_string = Some(string_index));
}

/// Clears the highlight, but only if it still shows the given string. A later note may have
/// moved it on already. Returns whether anything changed.
pub(crate) fn release_highlight(sender: &watch::Sender<StageView>, string_index: usize) -> bool {
    sender.send_if_modified(|view| {
        if view.is_highlighted(string_index) {
            view.active_string = None;
            true
        } else {
            false
        }
    })
}

/// Returns the view to idle.
pub(crate) fn reset(sender: &watch::Sender<StageView>) {
    sender.send_if_modified(|view| {
        let changed = *view != StageView::default();
        *view = StageView::default();
        changed
    });
}
