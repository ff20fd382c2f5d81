//! In-memory holding area for photos waiting on their debounce flush.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::{PendingPhoto, UserId};

/// Which sub-buffer a photo sits in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BufferSlot {
    Single,
    Group(String),
}

impl BufferSlot {
    pub fn for_photo(photo: &PendingPhoto) -> Self {
        match &photo.group_id {
            Some(group_id) => BufferSlot::Group(group_id.clone()),
            None => BufferSlot::Single,
        }
    }
}

#[derive(Debug, Default)]
struct UserBuffer {
    single: Vec<PendingPhoto>,
    groups: HashMap<String, Vec<PendingPhoto>>,
}

impl UserBuffer {
    fn slot_mut(&mut self, slot: &BufferSlot) -> &mut Vec<PendingPhoto> {
        match slot {
            BufferSlot::Single => &mut self.single,
            BufferSlot::Group(id) => self.groups.entry(id.clone()).or_default(),
        }
    }

    fn take(&mut self, slot: &BufferSlot) -> Vec<PendingPhoto> {
        match slot {
            BufferSlot::Single => std::mem::take(&mut self.single),
            BufferSlot::Group(id) => self.groups.remove(id).unwrap_or_default(),
        }
    }

    fn len(&self) -> usize {
        self.single.len() + self.groups.values().map(Vec::len).sum::<usize>()
    }

    fn is_empty(&self) -> bool {
        self.single.is_empty() && self.groups.is_empty()
    }
}

/// Per-user single and grouped sub-buffers.
///
/// Every operation runs under one short critical section, so a drain is
/// atomic: no caller ever sees a partially drained slot.
#[derive(Debug, Default)]
pub struct PhotoIngestionBuffer {
    users: Mutex<HashMap<UserId, UserBuffer>>,
}

impl PhotoIngestionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, UserBuffer>> {
        self.users.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a photo to the slot named by its group id. Returns that slot.
    pub fn append(&self, user_id: UserId, photo: PendingPhoto) -> BufferSlot {
        let slot = BufferSlot::for_photo(&photo);
        self.users()
            .entry(user_id)
            .or_default()
            .slot_mut(&slot)
            .push(photo);
        slot
    }

    pub fn drain_single(&self, user_id: UserId) -> Vec<PendingPhoto> {
        self.drain(user_id, &BufferSlot::Single)
    }

    pub fn drain_group(&self, user_id: UserId, group_id: &str) -> Vec<PendingPhoto> {
        self.drain(user_id, &BufferSlot::Group(group_id.to_string()))
    }

    /// Destructively take everything in one slot, in arrival order.
    pub fn drain(&self, user_id: UserId, slot: &BufferSlot) -> Vec<PendingPhoto> {
        let mut users = self.users();
        let Some(buffer) = users.get_mut(&user_id) else {
            return Vec::new();
        };
        let photos = buffer.take(slot);
        if buffer.is_empty() {
            users.remove(&user_id);
        }
        photos
    }

    /// Put photos back at the front of a slot, ahead of anything that
    /// arrived while they were out.
    pub fn requeue(&self, user_id: UserId, slot: &BufferSlot, photos: Vec<PendingPhoto>) {
        if photos.is_empty() {
            return;
        }
        let mut users = self.users();
        let target = users.entry(user_id).or_default().slot_mut(slot);
        let newer = std::mem::replace(target, photos);
        target.extend(newer);
    }

    /// Drop everything buffered for the user.
    pub fn discard(&self, user_id: UserId) -> usize {
        self.users().remove(&user_id).map(|b| b.len()).unwrap_or(0)
    }

    pub fn pending_count(&self, user_id: UserId) -> usize {
        self.users().get(&user_id).map(UserBuffer::len).unwrap_or(0)
    }
}
