//! Thread-safe typed payload storage.

use crate::errors::{BoxError, PayloadError};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// A thread-safe bag holding at most one payload per type.
///
/// Payloads are identified by their runtime [`TypeId`] and stored type-erased;
/// the concrete type is recovered by downcasting at the read site. Payloads
/// are additive: once present, a value is only replaced through
/// [`PayloadBag::add_or_update`].
#[derive(Default)]
pub struct PayloadBag {
    slots: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl std::fmt::Debug for PayloadBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadBag").field("len", &self.len()).finish()
    }
}

impl PayloadBag {
    /// Creates a new empty payload bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether a payload of type `P` is present.
    #[must_use]
    pub fn has<P: Any + Send + Sync>(&self) -> bool {
        self.has_id(TypeId::of::<P>())
    }

    /// Checks whether a payload with the given type identifier is present.
    #[must_use]
    pub fn has_id(&self, id: TypeId) -> bool {
        self.slots.read().contains_key(&id)
    }

    /// Returns the payload of type `P`, if present.
    #[must_use]
    pub fn try_get<P: Any + Send + Sync>(&self) -> Option<Arc<P>> {
        self.slots
            .read()
            .get(&TypeId::of::<P>())
            .cloned()
            .and_then(|slot| slot.downcast::<P>().ok())
    }

    /// Returns the payload of type `P`, creating it with `factory` if absent.
    ///
    /// The factory runs at most once per type per bag: a read probe is
    /// followed by a re-check under the write lock before the factory is
    /// invoked.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Factory`] wrapping the cause when the factory
    /// fails. The slot stays empty so a later call may try again.
    pub fn get_or_add<P, F>(&self, factory: F) -> Result<Arc<P>, PayloadError>
    where
        P: Any + Send + Sync,
        F: FnOnce() -> Result<P, BoxError>,
    {
        if let Some(existing) = self.try_get::<P>() {
            return Ok(existing);
        }

        let mut slots = self.slots.write();
        if let Some(existing) = slots.get(&TypeId::of::<P>()) {
            if let Ok(existing) = existing.clone().downcast::<P>() {
                return Ok(existing);
            }
        }

        let value = factory().map_err(|cause| PayloadError::Factory {
            type_name: std::any::type_name::<P>(),
            cause: cause.into(),
        })?;
        let payload = Arc::new(value);
        slots.insert(TypeId::of::<P>(), payload.clone());
        Ok(payload)
    }

    /// Adds a payload of type `P`, or updates the existing one.
    ///
    /// This is the only operation that replaces a stored payload. `add` runs
    /// when no payload of type `P` exists; `update` receives the current
    /// value and produces its replacement.
    pub fn add_or_update<P, A, U>(&self, add: A, update: U) -> Arc<P>
    where
        P: Any + Send + Sync,
        A: FnOnce() -> P,
        U: FnOnce(&P) -> P,
    {
        let mut slots = self.slots.write();
        let current = slots
            .get(&TypeId::of::<P>())
            .cloned()
            .and_then(|slot| slot.downcast::<P>().ok());

        let next = Arc::new(match current {
            Some(existing) => update(&existing),
            None => add(),
        });
        slots.insert(TypeId::of::<P>(), next.clone());
        next
    }

    /// Returns the number of stored payloads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Returns true if no payloads are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}
