pub mod clock;
pub mod dialogue;
pub mod domain;
pub mod keys;
pub mod persistence;
pub mod ports;
pub mod remote;
pub mod resilience;
pub mod review;
pub mod testing;

pub use clock::SystemClock;
pub use dialogue::{DialogueError, DialogueRuntime, LessonStart, RuntimeState};
pub use domain::{
    Attempt, CatalogEntry, DialogueNode, ErrorCategory, FeedbackKind, LessonDefinition,
    LessonSummary, Notification, ReviewItem, SessionSnapshot, UiFields};
pub use persistence::{PersistenceConfig, PersistenceError, SaveOutcome, SaveTrigger, SessionPersistence};
pub use ports::{ Clock, ErrorReporter, LessonContentProvider, Notifier, PortError, PortResult, ReviewStore,
    SlotStore, Transport, UiStateAccessor};
pub use resilience::{Connectivity, HandleOutcome, ReportedError, ResilienceConfig, ResilienceLayer};
pub use review::{ReviewConfig, ReviewError, ReviewScheduler, ReviewStep};
