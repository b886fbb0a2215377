//! Border regions of the local display.
//!
//! Clients registered here learn when the local cursor moves into, along,
//! or out of the strip at a display border where the pointer would cross
//! over to a neighbouring device.

use std::collections::BTreeSet;
use std::sync::Arc;

use cooperate_adapters::ClientNotifier;
use cooperate_types::{Coordinate, DisplayGeometry, HotArea, Notification, Pid};
use tracing::{debug, trace};

/// Depth of a border strip in pixels.
pub const HOT_AREA_WIDTH: i32 = 100;

/// Corner margin excluded from every strip.
pub const HOT_AREA_MARGIN: i32 = 200;

pub struct HotAreaWatcher {
    notifier: Arc<dyn ClientNotifier>,
    listeners: BTreeSet<Pid>,
    display: DisplayGeometry,
    current: HotArea,
}

impl HotAreaWatcher {
    #[must_use]
    pub fn new(notifier: Arc<dyn ClientNotifier>) -> Self {
        Self {
            notifier,
            listeners: BTreeSet::new(),
            display: DisplayGeometry::default(),
            current: HotArea::None,
        }
    }

    pub fn add_listener(&mut self, pid: Pid) {
        if self.listeners.insert(pid) {
            debug!(%pid, "hot area listener added");
        }
    }

    pub fn remove_listener(&mut self, pid: Pid) {
        if self.listeners.remove(&pid) {
            debug!(%pid, "hot area listener removed");
        }
    }

    pub fn listeners(&self) -> impl Iterator<Item = &Pid> {
        self.listeners.iter()
    }

    #[must_use]
    pub fn current(&self) -> HotArea {
        self.current
    }

    /// Take the display geometry in use and tell listeners where the
    /// cursor is now.
    pub fn enable(&mut self, display: DisplayGeometry, cursor: Coordinate) {
        self.display = display;
        self.current = classify(display, cursor);
        debug!(width = self.display.width, height = self.display.height, area = %self.current, "hot area enabled");
        self.notify(cursor, self.current);
    }

    /// Classify a local pointer position. Listeners hear about every
    /// position inside an area and about the move that leaves one.
    pub fn on_pointer(&mut self, pos: Coordinate) -> HotArea {
        let area = classify(self.display, pos);
        let previous = std::mem::replace(&mut self.current, area);
        if area != HotArea::None || previous != HotArea::None {
            trace!(%pos, %area, "hot area");
            self.notify(pos, area);
        }
        area
    }

    fn notify(&self, position: Coordinate, area: HotArea) {
        let is_edge = is_edge(self.display, position, area);
        for pid in &self.listeners {
            self.notifier.notify(
                *pid,
                Notification::HotArea {
                    position,
                    area,
                    is_edge,
                },
            );
        }
    }
}

fn extent(pixels: u32) -> i32 {
    i32::try_from(pixels).unwrap_or(i32::MAX)
}

/// Border strip containing `pos`, if any.
#[must_use]
pub fn classify(display: DisplayGeometry, pos: Coordinate) -> HotArea {
    let width = extent(display.width);
    let height = extent(display.height);
    let along_side = pos.y > HOT_AREA_MARGIN && pos.y < height.saturating_sub(HOT_AREA_MARGIN);
    let along_top = pos.x > HOT_AREA_MARGIN && pos.x < width.saturating_sub(HOT_AREA_MARGIN);

    if along_side && pos.x <= HOT_AREA_WIDTH {
        HotArea::Left
    } else if along_side && pos.x >= width.saturating_sub(HOT_AREA_WIDTH) {
        HotArea::Right
    } else if along_top && pos.y <= HOT_AREA_WIDTH {
        HotArea::Top
    } else if along_top && pos.y >= height.saturating_sub(HOT_AREA_WIDTH) {
        HotArea::Bottom
    } else {
        HotArea::None
    }
}

/// Whether `pos` touches the display border of `area`.
fn is_edge(display: DisplayGeometry, pos: Coordinate, area: HotArea) -> bool {
    match area {
        HotArea::Left => pos.x <= 0,
        HotArea::Right => pos.x >= extent(display.width).saturating_sub(1),
        HotArea::Top => pos.y <= 0,
        HotArea::Bottom => pos.y >= extent(display.height).saturating_sub(1),
        HotArea::None => false,
    }
}
