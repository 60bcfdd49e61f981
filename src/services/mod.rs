//! Application services for the activation core.

pub mod activation_router;
pub mod bot_lifecycle_manager;
pub mod cooldown_guard;
pub mod event_bus;
pub mod heartbeat_monitor;
pub mod intent_matcher;
pub mod pulse_runner;
pub mod retry;

pub use activation_router::ActivationRouter;
pub use bot_lifecycle_manager::BotLifecycleManager;
pub use cooldown_guard::CooldownGuard;
pub use event_bus::{EventBus, Subscription};
pub use heartbeat_monitor::HeartbeatMonitor;
pub use intent_matcher::{glob_match, IntentMatch, IntentMatcher};
pub use pulse_runner::{in_active_hours, NoUsers, PulseHandler, PulseRunner, UserIdSource};
