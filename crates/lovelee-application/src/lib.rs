//! Application services of the Lovelee couple core.
//!
//! Each service is a thin, cloneable handle over a shared [`CoreContext`].
//! [`Lovelee`] wires them all together over one store.
//!
//! # Example
//!
//! ```no_run
//! use lovelee_application::Lovelee;
//! use lovelee_core::config::LoveleeConfig;
//! use lovelee_core::user::NewProfile;
//!
//! # async fn demo() -> lovelee_core::Result<()> {
//! let app = Lovelee::in_memory(LoveleeConfig::default());
//! let alice = app
//!     .profiles
//!     .create_profile(
//!         "alice",
//!         NewProfile {
//!             email: "alice@example.com".into(),
//!             display_name: "Alice".into(),
//!             photo_url: None,
//!         },
//!     )
//!     .await?;
//! println!("share this code: {}", alice.invite_code);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod context;
pub mod gifts;
pub mod ledger;
pub mod love_zone;
pub mod moods;
pub mod notes;
pub mod notifications;
pub mod pairing;
pub mod pet;
pub mod profile;
pub mod special_dates;
pub mod telemetry;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lovelee_core::clock::{Clock, SystemClock};
use lovelee_core::config::LoveleeConfig;
use lovelee_core::error::Result;
use lovelee_core::store::DocumentStore;
use lovelee_infrastructure::{ConfigService, InMemoryDocumentStore, LoveleePaths};

pub use cache::StateCache;
pub use context::CoreContext;
pub use gifts::GiftService;
pub use ledger::HeartsLedger;
pub use love_zone::LoveZoneService;
pub use moods::MoodService;
pub use notes::{NoteFilter, NoteService};
pub use notifications::NotificationService;
pub use pairing::PairingService;
pub use pet::PetService;
pub use profile::ProfileStore;
pub use special_dates::SpecialDateService;

/// Every service of the couple core over one store.
#[derive(Clone)]
pub struct Lovelee {
    pub context: CoreContext,
    pub profiles: ProfileStore,
    pub ledger: HeartsLedger,
    pub pairing: PairingService,
    pub notes: NoteService,
    pub moods: MoodService,
    pub gifts: GiftService,
    pub special_dates: SpecialDateService,
    pub pet: PetService,
    pub love_zone: LoveZoneService,
    pub notifications: NotificationService,
}

impl Lovelee {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, config: LoveleeConfig) -> Self {
        let context = CoreContext::new(store, clock, config);
        let notifications = NotificationService::new(context.clone());
        let profiles = ProfileStore::new(context.clone());

        Self {
            ledger: HeartsLedger::new(context.clone()),
            pairing: PairingService::new(context.clone(), profiles.clone(), notifications.clone()),
            notes: NoteService::new(context.clone(), notifications.clone()),
            moods: MoodService::new(context.clone(), notifications.clone()),
            gifts: GiftService::new(context.clone(), notifications.clone()),
            special_dates: SpecialDateService::new(context.clone(), notifications.clone()),
            pet: PetService::new(context.clone(), notifications.clone()),
            love_zone: LoveZoneService::new(context.clone()),
            profiles,
            notifications,
            context,
        }
    }

    /// Non-persistent instance on the wall clock.
    pub fn in_memory(config: LoveleeConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = InMemoryDocumentStore::new(clock.clone());
        Self::new(Arc::new(store), clock, config)
    }

    /// Instance backed by the configured snapshot file, or by `default_snapshot`
    /// when the configuration names none.
    pub async fn open(config: LoveleeConfig, default_snapshot: PathBuf) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let path = config
            .storage
            .snapshot_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or(default_snapshot);
        let store = InMemoryDocumentStore::open(path, clock.clone()).await?;
        Ok(Self::new(Arc::new(store), clock, config))
    }

    /// Opens the persisted instance found under `base`, or under the platform
    /// directories when `base` is `None`.
    ///
    /// Gift transactions a previous run left pending are rolled back before
    /// the instance is returned.
    pub async fn bootstrap(base: Option<&Path>) -> Result<Self> {
        let paths = LoveleePaths::new(base)?;
        let config = ConfigService::from_paths(&paths).get_config()?;
        let app = Self::open(config, paths.snapshot_file()).await?;

        let recovered = app.gifts.recover_pending(app.context.clock.now()).await?;
        tracing::info!(
            data_dir = ?paths.data_dir(),
            recovered,
            "Lovelee core ready"
        );
        Ok(app)
    }
}
