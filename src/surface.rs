//! Surface registry and destroy subscriptions.
//!
//! Surfaces are owned by the protocol layer; the router only keeps a side
//! table from surface identity to the state it needs (committed size, protocol
//! role, destroy listeners). Focus fields hold bare [`SurfaceId`]s, so nothing
//! here ever extends a surface's lifetime.

use indexmap::IndexMap;

use crate::state::RouterState;

/// Opaque surface identity. Ids are never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRole {
    /// Client surface forwarded from the nested window-system bridge.
    Bridge,
    /// Cursor image surface.
    Cursor,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("surface {0:?} is not registered")]
    UnknownSurface(SurfaceId),
    #[error("surface {surface:?} already has role {existing:?}, cannot assign {requested:?}")]
    RoleConflict {
        surface: SurfaceId,
        existing: SurfaceRole,
        requested: SurfaceRole,
    },
}

/// Subscription handle returned by [`SurfaceMap::subscribe_destroy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token(u64);

/// State a destroy listener may touch. Keeping this narrow means listeners
/// cannot re-enter the registry while it is mid-removal.
pub struct LifecycleCtx<'a> {
    pub router: &'a mut RouterState,
    pub destroyed: &'a mut Vec<SurfaceId>,
}

type DestroyCallback = Box<dyn FnMut(&mut LifecycleCtx<'_>, SurfaceId) + Send>;

pub(crate) struct SurfaceEntry {
    size: (i32, i32),
    role: Option<SurfaceRole>,
    listeners: Vec<(Token, DestroyCallback)>,
    guard: Option<Token>,
}

impl SurfaceEntry {
    /// Run destroy listeners in subscription order. The entry has already
    /// been detached from the registry at this point, so the subscriptions
    /// die with it.
    pub(crate) fn fire_destroy(&mut self, ctx: &mut LifecycleCtx<'_>, id: SurfaceId) {
        for (_, callback) in &mut self.listeners {
            callback(ctx, id);
        }
    }
}

#[derive(Default)]
pub struct SurfaceMap {
    entries: IndexMap<SurfaceId, SurfaceEntry>,
    next_id: u64,
    next_token: u64,
}

impl SurfaceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new surface. It has no committed buffer yet, so its size
    /// starts at zero.
    pub fn create(&mut self) -> SurfaceId {
        self.next_id += 1;
        let id = SurfaceId(self.next_id);
        self.entries.insert(
            id,
            SurfaceEntry {
                size: (0, 0),
                role: None,
                listeners: Vec::new(),
                guard: None,
            },
        );
        id
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Record a committed buffer size.
    pub fn commit(&mut self, id: SurfaceId, width: i32, height: i32) -> Result<(), SurfaceError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(SurfaceError::UnknownSurface(id))?;
        entry.size = (width, height);
        Ok(())
    }

    /// Current committed size, `None` for unregistered surfaces.
    pub fn size(&self, id: SurfaceId) -> Option<(i32, i32)> {
        self.entries.get(&id).map(|entry| entry.size)
    }

    pub fn role(&self, id: SurfaceId) -> Option<SurfaceRole> {
        self.entries.get(&id).and_then(|entry| entry.role)
    }

    /// Assign a protocol role. Re-assigning the same role is allowed; a
    /// different existing role is a hard conflict for this registration only.
    pub fn set_role(&mut self, id: SurfaceId, role: SurfaceRole) -> Result<(), SurfaceError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(SurfaceError::UnknownSurface(id))?;
        match entry.role {
            None => {
                entry.role = Some(role);
                Ok(())
            }
            Some(existing) if existing == role => Ok(()),
            Some(existing) => Err(SurfaceError::RoleConflict {
                surface: id,
                existing,
                requested: role,
            }),
        }
    }

    /// Subscribe to the surface's destruction. The callback fires exactly
    /// once, when the protocol layer reports the destroy, unless the token is
    /// unsubscribed first.
    pub fn subscribe_destroy<F>(&mut self, id: SurfaceId, callback: F) -> Result<Token, SurfaceError>
    where
        F: FnMut(&mut LifecycleCtx<'_>, SurfaceId) + Send + 'static,
    {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(SurfaceError::UnknownSurface(id))?;
        self.next_token += 1;
        let token = Token(self.next_token);
        entry.listeners.push((token, Box::new(callback)));
        Ok(token)
    }

    /// Drop a destroy subscription. Idempotent: unknown or already-fired
    /// tokens are ignored.
    pub fn unsubscribe_destroy(&mut self, token: Token) {
        for entry in self.entries.values_mut() {
            entry.listeners.retain(|(t, _)| *t != token);
        }
    }

    pub(crate) fn guard_token(&self, id: SurfaceId) -> Option<Token> {
        self.entries.get(&id).and_then(|entry| entry.guard)
    }

    pub(crate) fn set_guard_token(&mut self, id: SurfaceId, token: Token) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.guard = Some(token);
        }
    }

    /// Detach an entry so its destroy listeners can run without the registry
    /// borrowed.
    pub(crate) fn take(&mut self, id: SurfaceId) -> Option<SurfaceEntry> {
        self.entries.shift_remove(&id)
    }
}
