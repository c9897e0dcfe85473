//! Pointer-driven reorder gesture.
//!
//! The controller never touches a rendering surface. Hosts inject a
//! [`HitTester`] that answers "which card is under this point, and where is
//! it". A failed lookup simply means no drop target.

use crate::filter::SortMode;
use crate::ordering::Direction;
use storage::models::{CardId, GroupKey};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn mid_x(&self) -> f64 {
        self.left + self.width / 2.0
    }
}

/// A card element found under the pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct HitTarget {
    pub card_id: CardId,
    pub group_key: GroupKey,
    pub bounds: Rect,
}

pub trait HitTester {
    fn card_at(&self, point: Point) -> Option<HitTarget>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Before,
    After,
}

/// Where the insertion marker should be drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropIndicator {
    pub card_id: CardId,
    pub edge: Edge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Dragging {
        card_id: CardId,
        group_key: GroupKey,
        target: Option<DropIndicator>,
    },
}

/// A completed gesture, ready for `ordering::move_card`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveIntent {
    pub group_key: GroupKey,
    pub dragged: CardId,
    pub target: CardId,
    pub place_before: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub alt: bool,
    pub ctrl: bool,
    pub shift: bool,
}

#[derive(Debug, Clone)]
pub struct ReorderController {
    enabled: bool,
    state: DragState,
}

impl Default for ReorderController {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ReorderController {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            state: DragState::Idle,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Turning reorder mode off abandons any gesture in flight.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.state = DragState::Idle;
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn indicator(&self) -> Option<&DropIndicator> {
        match &self.state {
            DragState::Dragging { target, .. } => target.as_ref(),
            DragState::Idle => None,
        }
    }

    /// Starts a drag on a card's handle. Returns whether a gesture began.
    pub fn pointer_down(
        &mut self,
        card_id: &CardId,
        group_key: &GroupKey,
        button: PointerButton,
        sort: SortMode,
    ) -> bool {
        if button != PointerButton::Primary || !self.enabled || !sort.is_manual() {
            return false;
        }
        self.state = DragState::Dragging {
            card_id: card_id.clone(),
            group_key: group_key.clone(),
            target: None,
        };
        true
    }

    /// Recomputes the drop target under `point`. Cards in other groups, the
    /// dragged card itself and failed lookups all clear the indicator.
    pub fn pointer_move(&mut self, point: Point, hits: &dyn HitTester) -> Option<DropIndicator> {
        let DragState::Dragging {
            card_id,
            group_key,
            target,
        } = &mut self.state
        else {
            return None;
        };

        *target = hits
            .card_at(point)
            .filter(|hit| hit.group_key == *group_key && hit.card_id != *card_id)
            .map(|hit| DropIndicator {
                edge: if point.x < hit.bounds.mid_x() {
                    Edge::Before
                } else {
                    Edge::After
                },
                card_id: hit.card_id,
            });
        target.clone()
    }

    /// Ends the gesture. Yields a move only when a valid target was pending.
    pub fn pointer_up(&mut self) -> Option<MoveIntent> {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Dragging {
                card_id,
                group_key,
                target: Some(indicator),
            } if indicator.card_id != card_id => Some(MoveIntent {
                group_key,
                dragged: card_id,
                place_before: indicator.edge == Edge::Before,
                target: indicator.card_id,
            }),
            _ => None,
        }
    }

    pub fn pointer_cancel(&mut self) {
        self.state = DragState::Idle;
    }

    /// Maps Alt+Arrow on a focused card to a one-step move. Needs the same
    /// preconditions as a drag.
    pub fn key_direction(&self, key: Key, modifiers: Modifiers, sort: SortMode) -> Option<Direction> {
        if !self.enabled || !sort.is_manual() || !modifiers.alt {
            return None;
        }
        match key {
            Key::ArrowLeft | Key::ArrowUp => Some(Direction::Earlier),
            Key::ArrowRight | Key::ArrowDown => Some(Direction::Later),
            Key::Other => None,
        }
    }
}
