pub mod action;
pub mod hooks;
pub mod metrics;
pub mod tick_loop;

pub use action::{Action, BotSpawnPattern, ConsoleCommand};
pub use hooks::{NullPersistenceSink, NullScriptHook, PersistenceSink, ScriptHook};
pub use metrics::{Metrics, MetricsSnapshot};
pub use tick_loop::{NewConnection, TickLoop, TickLoopHandle};
