use gridward_shared::{Direction, PlayerId};

/// A unit of gameplay work the tick loop applies. Movement/turn/interact/attack actions are
/// capped per tick (`Config::max_actions_per_tick`); connect/disconnect and console commands are
/// applied immediately as they're the bookkeeping that keeps the rest of the loop coherent, not
/// gameplay throughput that needs shedding.
#[derive(Debug)]
pub enum Action {
    Move {
        player_id: PlayerId,
        dir: Direction,
        facing: Direction,
    },
    Turn {
        player_id: PlayerId,
        facing: Direction,
    },
    Interact {
        player_id: PlayerId,
    },
    Attack {
        player_id: PlayerId,
    },
    Console(ConsoleCommand),
}

#[derive(Debug)]
pub enum ConsoleCommand {
    Stop,
    ReloadScripts,
    Stats,
    SpawnBots {
        count: usize,
        pattern: BotSpawnPattern,
    },
    RemoveBots,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotSpawnPattern {
    Spread,
    Clustered,
}

