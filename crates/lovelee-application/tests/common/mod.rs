#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use lovelee_application::Lovelee;
use lovelee_core::clock::ManualClock;
use lovelee_core::config::LoveleeConfig;
use lovelee_core::couple::Couple;
use lovelee_core::user::{NewProfile, UserProfile};
use lovelee_infrastructure::InMemoryDocumentStore;

pub struct Harness {
    pub app: Lovelee,
    pub store: InMemoryDocumentStore,
    pub clock: Arc<ManualClock>,
}

pub fn harness() -> Harness {
    harness_with(LoveleeConfig::default())
}

pub fn harness_with(config: LoveleeConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap(),
    ));
    let store = InMemoryDocumentStore::new(clock.clone());
    let app = Lovelee::new(Arc::new(store.clone()), clock.clone(), config);
    Harness { app, store, clock }
}

pub fn new_profile(name: &str) -> NewProfile {
    NewProfile {
        email: format!("{}@example.com", name.to_lowercase()),
        display_name: name.to_string(),
        photo_url: None,
    }
}

impl Harness {
    pub async fn register(&self, id: &str, name: &str) -> UserProfile {
        self.app
            .profiles
            .create_profile(id, new_profile(name))
            .await
            .unwrap()
    }

    pub async fn profile(&self, id: &str) -> UserProfile {
        self.app.profiles.get_profile(id).await.unwrap().unwrap()
    }

    /// Registers "a" and "b" and pairs them.
    pub async fn couple(&self) -> Couple {
        let a = self.register("a", "Alice").await;
        self.register("b", "Bob").await;
        self.app
            .pairing
            .connect_with_partner("b", &a.invite_code)
            .await
            .unwrap()
    }
}
