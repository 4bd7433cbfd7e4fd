pub mod feed;
pub mod preferences;
pub mod storage;

use std::collections::BTreeMap;

use feed::FeedService;
use preferences::PreferenceService;
use storage::StorageService;

#[derive(Debug, Clone, Default)]
pub struct AppServices {
    feed: FeedService,
    preferences: PreferenceService,
    storage: StorageService,
}

impl AppServices {
    pub fn health_report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        report.insert(self.feed.name().to_string(), self.feed.status().to_string());
        report.insert(
            self.preferences.name().to_string(),
            self.preferences.status().to_string(),
        );
        report.insert(
            self.storage.name().to_string(),
            self.storage.status().to_string(),
        );
        report
    }
}
