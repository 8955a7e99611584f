use std::collections::{BTreeMap, HashMap};
use std::ops::{Add, Mul, Sub};

use crate::conversation::NpcController;
use crate::interaction::Electrifiable;

use super::input::InputSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn with_y(self, y: f32) -> Self {
        Self { y, ..self }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(self, other: Vec3) -> f32 {
        (self - other).length()
    }

    /// Distance measured on the ground plane when `ignore_y` is set.
    pub fn distance_with(self, other: Vec3, ignore_y: bool) -> f32 {
        if ignore_y {
            self.with_y(0.0).distance(other.with_y(0.0))
        } else {
            self.distance(other)
        }
    }

    pub fn normalized_or_zero(self) -> Vec3 {
        let length = self.length();
        if length <= f32::EPSILON || !length.is_finite() {
            return Vec3::ZERO;
        }
        self * (1.0 / length)
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Transform {
    pub position: Vec3,
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self { position }
    }
}

/// Marks an entity as something the player can equip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Item {
    /// Core items live in the radial inventory and are never dropped.
    pub core: bool,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub transform: Transform,
    pub label: String,
    pub item: Option<Item>,
    pub pushable: bool,
    pub interact_radius: Option<f32>,
    applied_spawn_order: u64,
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Entity registry for one scene.
///
/// Cross-entity relations (who talks to whom, what is held) are stored as
/// [`EntityId`]s by their owners and resolved here, so a despawned target
/// simply stops resolving.
#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    next_applied_spawn_order: u64,
    npcs: BTreeMap<EntityId, NpcController>,
    receivers: HashMap<EntityId, Box<dyn Electrifiable>>,
}

impl SceneWorld {
    pub fn spawn(&mut self, transform: Transform, label: impl Into<String>) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            transform,
            label: label.into(),
            item: None,
            pushable: false,
            interact_radius: None,
            applied_spawn_order: 0,
        });
        id
    }

    pub fn spawn_item(
        &mut self,
        transform: Transform,
        label: impl Into<String>,
        item: Item,
    ) -> EntityId {
        let id = self.spawn(transform, label);
        if let Some(entity) = self.pending_spawns.last_mut() {
            entity.item = Some(item);
        }
        id
    }

    pub fn spawn_pushable(&mut self, transform: Transform, label: impl Into<String>) -> EntityId {
        let id = self.spawn(transform, label);
        if let Some(entity) = self.pending_spawns.last_mut() {
            entity.pushable = true;
        }
        id
    }

    /// Spawns an NPC that can be talked to from within `interact_radius`.
    pub fn spawn_npc(
        &mut self,
        transform: Transform,
        label: impl Into<String>,
        interact_radius: f32,
        npc: NpcController,
    ) -> EntityId {
        let id = self.spawn(transform, label);
        if let Some(entity) = self.pending_spawns.last_mut() {
            entity.interact_radius = Some(interact_radius);
        }
        self.npcs.insert(id, npc);
        id
    }

    pub fn attach_receiver(&mut self, id: EntityId, receiver: Box<dyn Electrifiable>) -> bool {
        if !self.is_live_or_pending(id) {
            return false;
        }
        self.receivers.insert(id, receiver);
        true
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        if !self.is_live_or_pending(id) {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort_by_key(|id| id.0);
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.entities.retain(|entity| {
                pending
                    .binary_search_by_key(&entity.id.0, |id| id.0)
                    .is_err()
            });
            self.pending_spawns.retain(|entity| {
                pending
                    .binary_search_by_key(&entity.id.0, |id| id.0)
                    .is_err()
            });
            for id in self.pending_despawns.drain(..) {
                self.npcs.remove(&id);
                self.receivers.remove(&id);
            }
        }

        if !self.pending_spawns.is_empty() {
            for mut entity in self.pending_spawns.drain(..) {
                entity.applied_spawn_order = self.next_applied_spawn_order;
                self.next_applied_spawn_order = self.next_applied_spawn_order.saturating_add(1);
                self.entities.push(entity);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.next_applied_spawn_order = 0;
        self.npcs.clear();
        self.receivers.clear();
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn position_of(&self, id: EntityId) -> Option<Vec3> {
        self.find_entity(id).map(|entity| entity.transform.position)
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec3) -> bool {
        match self.find_entity_mut(id) {
            Some(entity) => {
                entity.transform.position = position;
                true
            }
            None => false,
        }
    }

    pub fn item(&self, id: EntityId) -> Option<Item> {
        self.find_entity(id).and_then(|entity| entity.item)
    }

    pub fn npc(&self, id: EntityId) -> Option<&NpcController> {
        self.npcs.get(&id)
    }

    pub fn npc_mut(&mut self, id: EntityId) -> Option<&mut NpcController> {
        self.npcs.get_mut(&id)
    }

    pub fn has_receiver(&self, id: EntityId) -> bool {
        self.receivers.contains_key(&id)
    }

    pub fn receiver(&self, id: EntityId) -> Option<&dyn Electrifiable> {
        self.receivers.get(&id).map(|r| r.as_ref())
    }

    /// Closest item within `radius` of `point`, skipping `exclude`.
    pub fn closest_item_within(
        &self,
        point: Vec3,
        radius: f32,
        ignore_y: bool,
        exclude: Option<EntityId>,
    ) -> Option<EntityId> {
        self.closest_matching(point, ignore_y, |entity| {
            entity.item.is_some() && Some(entity.id) != exclude
        })
        .filter(|(_, distance)| *distance <= radius)
        .map(|(id, _)| id)
    }

    pub fn closest_pushable_within(
        &self,
        point: Vec3,
        radius: f32,
        ignore_y: bool,
    ) -> Option<EntityId> {
        self.closest_matching(point, ignore_y, |entity| entity.pushable)
            .filter(|(_, distance)| *distance <= radius)
            .map(|(id, _)| id)
    }

    /// Closest entity whose own interaction radius covers `point`.
    pub fn closest_interactable_at(&self, point: Vec3) -> Option<EntityId> {
        let mut best: Option<(f32, u64, EntityId)> = None;
        for entity in &self.entities {
            let Some(radius) = entity.interact_radius else {
                continue;
            };
            let distance = entity.transform.position.distance(point);
            if distance > radius {
                continue;
            }
            match best {
                Some((best_distance, order, _))
                    if best_distance < distance
                        || (best_distance == distance && order >= entity.applied_spawn_order) => {}
                _ => best = Some((distance, entity.applied_spawn_order, entity.id)),
            }
        }
        best.map(|(_, _, id)| id)
    }

    /// Delivers a signal to one receiver; `false` when nothing listens there.
    pub fn electrify(&mut self, target: EntityId, source: EntityId) -> bool {
        match self.receivers.get_mut(&target) {
            Some(receiver) => {
                receiver.electrify(source);
                true
            }
            None => false,
        }
    }

    /// Delivers a signal to every receiver within `radius`, in id order.
    pub fn electrify_all_within(
        &mut self,
        point: Vec3,
        radius: f32,
        source: EntityId,
    ) -> Vec<EntityId> {
        let mut hits = self
            .entities
            .iter()
            .filter(|entity| entity.id != source)
            .filter(|entity| self.receivers.contains_key(&entity.id))
            .filter(|entity| entity.transform.position.distance(point) <= radius)
            .map(|entity| entity.id)
            .collect::<Vec<_>>();
        hits.sort();
        for id in &hits {
            if let Some(receiver) = self.receivers.get_mut(id) {
                receiver.electrify(source);
            }
        }
        hits
    }

    pub fn interact_receiver(&mut self, target: EntityId, source: EntityId) -> bool {
        self.receivers
            .get_mut(&target)
            .is_some_and(|receiver| receiver.interact(source))
    }

    fn is_live_or_pending(&self, id: EntityId) -> bool {
        self.entities.iter().any(|entity| entity.id == id)
            || self.pending_spawns.iter().any(|entity| entity.id == id)
    }

    fn closest_matching(
        &self,
        point: Vec3,
        ignore_y: bool,
        filter: impl Fn(&Entity) -> bool,
    ) -> Option<(EntityId, f32)> {
        let mut best: Option<(EntityId, f32)> = None;
        for entity in self.entities.iter().filter(|entity| filter(entity)) {
            let distance = entity.transform.position.distance_with(point, ignore_y);
            match best {
                Some((_, best_distance)) if best_distance <= distance => {}
                _ => best = Some((entity.id, distance)),
            }
        }
        best
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    /// Variable-rate update, once per rendered frame.
    fn frame_update(&mut self, _frame_dt_seconds: f32, _world: &mut SceneWorld) {}
    fn fixed_update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
}
