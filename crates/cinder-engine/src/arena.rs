//! Demo dungeon for the headless runner.

use cinder_common::TileCoord;
use cinder_gameplay::{Door, DungeonGrid, GridResult, Room, SkillEffect};

/// Three rooms joined by doors; the player starts on the center door.
const LAYOUT: [&str; 14] = [
    "########################",
    "#.........#............#",
    "#.........#............#",
    "#.........#............#",
    "#......................#",
    "#.........#............#",
    "#.........#............#",
    "#####.######.###########",
    "#......................#",
    "#......................#",
    "#......................#",
    "#......................#",
    "#......................#",
    "########################",
];

/// Enemy spawns as `(archetype, x, y)`.
pub const SPAWNS: [(&str, i32, i32); 9] = [
    ("heavy", 4, 2),
    ("random", 7, 5),
    ("fast", 16, 2),
    ("normal", 18, 5),
    ("marksman", 20, 3),
    ("normal", 3, 10),
    ("fast", 8, 11),
    ("marksman", 20, 11),
    ("boss", 16, 10),
];

/// Player patrol route through every room, door to door.
pub const TOUR: [(i32, i32); 7] = [(12, 10), (12, 7), (16, 3), (10, 4), (5, 3), (5, 7), (5, 9)];

/// Builds the demo grid with its rooms and doors.
pub fn build() -> GridResult<DungeonGrid> {
    let rooms = vec![
        Room::new(0, 1, 1, 9, 6),
        Room::new(1, 11, 1, 12, 6),
        Room::new(2, 1, 8, 22, 5),
    ];
    let doors = vec![
        Door {
            tile: TileCoord::new(10, 4),
            room_id: 0,
        },
        Door {
            tile: TileCoord::new(5, 7),
            room_id: 2,
        },
        Door {
            tile: TileCoord::new(12, 7),
            room_id: 1,
        },
    ];
    Ok(DungeonGrid::from_ascii(&LAYOUT)?.with_rooms(rooms).with_doors(doors))
}

/// Items picked up before the run starts.
pub fn loadout() -> Vec<SkillEffect> {
    vec![
        SkillEffect::new("damage", 5.0),
        SkillEffect::new("projectileCount", 2.0),
        SkillEffect::new("pierce", 1.0),
        SkillEffect::new("explosion", 0.2),
        SkillEffect::new("chainExplosion", 0.5),
        SkillEffect::new("homing", 0.0),
        SkillEffect::new("grenade", 0.0),
        SkillEffect::new("fireTrail", 0.0).with_interval(600.0),
        SkillEffect::new("deflect", 0.1).with_defense_penalty(0.1),
    ]
}
