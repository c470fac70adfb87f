//! Loading progress shared by every asset load of the scene.

/// What changed after an item started or ended.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadEvent {
    /// The first item was registered.
    Started,
    Progress {
        url: String,
        loaded: usize,
        total: usize,
        percent: u8,
    },
    /// The last outstanding item ended; the loading screen hides.
    Finished,
}

/// Counts registered and ended items and derives the loading percentage.
///
/// Items may be registered at any time, so the total can grow while loading is
/// in progress. The percentage never decreases and only reaches 100 once every
/// registered item has ended. Failed items count as ended.
#[derive(Debug, Default)]
pub struct LoadingManager {
    total: usize,
    loaded: usize,
    failed: usize,
    percent: u8,
    hidden: bool,
}

impl LoadingManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item_start(&mut self, url: &str) -> Option<LoadEvent> {
        self.total += 1;
        log::debug!("queued {url} ({} items)", self.total);
        (self.total == 1).then_some(LoadEvent::Started)
    }

    /// Marks an item as ended. Returns the progress event and, for the last
    /// outstanding item, [`LoadEvent::Finished`] exactly once.
    pub fn item_end(&mut self, url: &str, ok: bool) -> Vec<LoadEvent> {
        if self.loaded >= self.total {
            log::warn!("{url} ended but was never registered");
            return Vec::new();
        }
        self.loaded += 1;
        if !ok {
            self.failed += 1;
        }

        let raw = (100 * self.loaded / self.total) as u8;
        let capped = if self.loaded < self.total { raw.min(99) } else { raw };
        self.percent = self.percent.max(capped);

        let mut events = vec![LoadEvent::Progress {
            url: url.to_string(),
            loaded: self.loaded,
            total: self.total,
            percent: self.percent,
        }];
        if self.loaded == self.total && !self.hidden {
            self.hidden = true;
            events.push(LoadEvent::Finished);
        }
        events
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Text of the loading screen, `None` once it is hidden.
    pub fn screen_text(&self) -> Option<String> {
        (!self.hidden).then(|| format!("Loading {}%", self.percent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_floored() {
        let mut manager = LoadingManager::new();
        for url in ["a", "b", "c"] {
            manager.item_start(url);
        }
        manager.item_end("a", true);
        assert_eq!(manager.percent(), 33);
        manager.item_end("b", true);
        assert_eq!(manager.percent(), 66);
        assert_eq!(manager.screen_text().as_deref(), Some("Loading 66%"));
    }

    #[test]
    fn late_registration_does_not_lower_the_percentage() {
        let mut manager = LoadingManager::new();
        manager.item_start("a");
        manager.item_start("b");
        manager.item_end("a", true);
        assert_eq!(manager.percent(), 50);
        manager.item_start("c");
        manager.item_start("d");
        assert_eq!(manager.percent(), 50);
        manager.item_end("b", true);
        assert_eq!(manager.percent(), 50);
        manager.item_end("c", true);
        assert_eq!(manager.percent(), 75);
    }

    #[test]
    fn never_reports_100_before_the_last_item() {
        let mut manager = LoadingManager::new();
        for idx in 0..201 {
            manager.item_start(&idx.to_string());
        }
        for idx in 0..200 {
            manager.item_end(&idx.to_string(), true);
            assert!(manager.percent() < 100);
        }
        let events = manager.item_end("200", true);
        assert_eq!(manager.percent(), 100);
        assert_eq!(events.last(), Some(&LoadEvent::Finished));
    }

    #[test]
    fn hides_once_and_counts_failures() {
        let mut manager = LoadingManager::new();
        assert_eq!(manager.item_start("a"), Some(LoadEvent::Started));
        assert_eq!(manager.item_start("b"), None);
        manager.item_end("a", false);
        let events = manager.item_end("b", true);
        assert!(events.contains(&LoadEvent::Finished));
        assert!(manager.is_hidden());
        assert_eq!(manager.failed(), 1);

        manager.item_start("late");
        let events = manager.item_end("late", true);
        assert!(!events.contains(&LoadEvent::Finished));
        assert!(manager.item_end("unknown", true).is_empty());
    }
}
