/// A collaborator notified of gameplay events, standing in for whatever scripting engine a
/// deployment wires in. The tick loop never depends on a particular scripting engine; it only
/// calls through this trait, and only from the tick task, so a fresh `Box<dyn ScriptHook>` can be
/// swapped in by the `reload-scripts` console command without any locking.
///
/// Player ids are passed as decimal strings rather than `PlayerId` because some script runtimes
/// cannot represent the full 64-bit integer range.
pub trait ScriptHook: Send {
    fn on_player_joined(&mut self, player_id: &str) {
        let _ = player_id;
    }

    fn on_player_moved(&mut self, player_id: &str, x: i16, y: i16, facing: gridward_shared::Direction) {
        let _ = (player_id, x, y, facing);
    }

    fn on_interact(&mut self, player_id: &str) {
        let _ = player_id;
    }

    fn on_attack(&mut self, player_id: &str) {
        let _ = player_id;
    }
}

/// The default hook: does nothing. Used when no scripting layer is configured, and restored by
/// `reload-scripts` until a real engine is wired in.
pub struct NullScriptHook;

impl ScriptHook for NullScriptHook {}

/// A collaborator that persists world state, standing in for whatever storage layer a deployment
/// wires in. Calls are fire-and-forget; durability is the sink's concern, not the tick loop's.
pub trait PersistenceSink: Send {
    fn save_player_position(&mut self, player_id: gridward_shared::PlayerId, x: i16, y: i16) {
        let _ = (player_id, x, y);
    }

    fn save_player_stats(&mut self, player_id: gridward_shared::PlayerId) {
        let _ = player_id;
    }
}

/// The default sink: discards everything. Used when no persistence layer is configured.
pub struct NullPersistenceSink;

impl PersistenceSink for NullPersistenceSink {}
