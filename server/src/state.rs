use std::sync::Arc;

use annotation::SessionStore;
use segmentation::{
    AvalancheTypeClassifier, BrightnessSpamClassifier, RegionGrowSegmenter,
    SnowlineAvalancheClassifier, SpamClassifier,
};

/// Shared state handed to every handler: the session store plus the two
/// stateless classifiers.
pub struct AppState {
    pub sessions: SessionStore,
    pub spam: Arc<dyn SpamClassifier>,
    pub avalanche: Arc<dyn AvalancheTypeClassifier>,
}

impl AppState {
    pub fn new(
        sessions: SessionStore,
        spam: Arc<dyn SpamClassifier>,
        avalanche: Arc<dyn AvalancheTypeClassifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions,
            spam,
            avalanche,
        })
    }

    /// State wired with the built-in baseline models; learned backends
    /// plug in through [`AppState::new`] behind the same traits.
    pub fn baseline(spam_threshold: f32) -> Arc<Self> {
        Self::new(
            SessionStore::new(|| Box::new(RegionGrowSegmenter::default())),
            Arc::new(BrightnessSpamClassifier {
                min_mean_luma: spam_threshold,
            }),
            Arc::new(SnowlineAvalancheClassifier),
        )
    }
}
