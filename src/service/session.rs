//! Configuration sessions: debounced regeneration and stale-result guards.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use uuid::Uuid;
use crate::domain::aggregates::{EditorCommand, GenerationMode, ProductVariation, VariationDefaults, VariationEditor, VariationSelection};
use crate::domain::events::DomainEvent;
use crate::{CatalogError, Result};

/// Hands out tickets that go stale once the session is closed or reloaded.
#[derive(Clone, Debug, Default)]
pub struct SessionGuard {
    epoch: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

#[derive(Clone, Debug)]
pub struct SessionTicket {
    epoch: u64,
    guard: SessionGuard,
}

impl SessionGuard {
    pub fn new() -> Self { Self::default() }
    pub fn ticket(&self) -> SessionTicket { SessionTicket { epoch: self.epoch.load(Ordering::SeqCst), guard: self.clone() } }
    /// Invalidates outstanding tickets without closing.
    pub fn invalidate(&self) { self.epoch.fetch_add(1, Ordering::SeqCst); }
    pub fn close(&self) { self.closed.store(true, Ordering::SeqCst); self.invalidate(); }
    pub fn is_closed(&self) -> bool { self.closed.load(Ordering::SeqCst) }
}

impl SessionTicket {
    pub fn is_current(&self) -> bool {
        !self.guard.is_closed() && self.guard.epoch.load(Ordering::SeqCst) == self.epoch
    }

    pub fn check(&self) -> Result<()> {
        if self.is_current() { Ok(()) } else { Err(CatalogError::Stale) }
    }
}

/// Trailing-edge debounce: of overlapping `settle` calls only the latest returns true.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    generation: AtomicU64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self { Self { delay, generation: AtomicU64::new(0) } }

    pub async fn settle(&self) -> bool {
        let mine = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        self.generation.load(Ordering::SeqCst) == mine
    }
}

/// Snapshot of a session returned to clients.
#[derive(Clone, Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub store_id: Uuid,
    pub product_id: Option<Uuid>,
    pub mode: GenerationMode,
    pub defaults: VariationDefaults,
    pub selection: VariationSelection,
    pub variations: Vec<ProductVariation>,
    pub pending_deletes: usize,
}

/// One operator's configuration session over a product's variations.
#[derive(Debug)]
pub struct EditorSession {
    id: Uuid,
    store_id: Uuid,
    editor: Mutex<VariationEditor>,
    debouncer: Debouncer,
    guard: SessionGuard,
}

impl EditorSession {
    pub fn new(store_id: Uuid, mut editor: VariationEditor, debounce: Duration) -> Self {
        editor.defer_regeneration(true);
        Self { id: Uuid::new_v4(), store_id, editor: Mutex::new(editor), debouncer: Debouncer::new(debounce), guard: SessionGuard::new() }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn store_id(&self) -> Uuid { self.store_id }
    pub fn ticket(&self) -> SessionTicket { self.guard.ticket() }
    pub fn close(&self) { self.guard.close(); }
    pub fn is_closed(&self) -> bool { self.guard.is_closed() }

    pub async fn editor(&self) -> MutexGuard<'_, VariationEditor> { self.editor.lock().await }

    /// Swaps in a freshly loaded editor, keeping mode and defaults. Tickets taken before are invalidated.
    pub async fn replace_editor(&self, mut fresh: VariationEditor) -> Result<()> {
        let mut editor = self.editor.lock().await;
        fresh.defer_regeneration(true);
        fresh.set_defaults(editor.defaults());
        fresh.set_mode(editor.mode())?;
        fresh.take_events();
        *editor = fresh;
        self.guard.invalidate();
        Ok(())
    }

    /// Applies a command. In automatic mode, selection changes regenerate once the burst settles;
    /// superseded calls return without regenerating.
    pub async fn apply(&self, command: EditorCommand) -> Result<Vec<DomainEvent>> {
        let regenerate = command.triggers_regeneration();
        self.update(regenerate, |editor| Ok(editor.apply(command)?)).await
    }

    /// Runs `change` on the editor, then regenerates the way `apply` does when `regenerate` is set.
    pub async fn update<F>(&self, regenerate: bool, change: F) -> Result<Vec<DomainEvent>>
    where
        F: FnOnce(&mut VariationEditor) -> Result<Vec<DomainEvent>>,
    {
        let ticket = self.guard.ticket();
        let (mut events, automatic) = {
            let mut editor = self.editor.lock().await;
            (change(&mut *editor)?, editor.mode() == GenerationMode::Automatic)
        };
        if regenerate && automatic && self.debouncer.settle().await && ticket.is_current() {
            let mut editor = self.editor.lock().await;
            editor.regenerate()?;
            events.extend(editor.take_events());
        }
        Ok(events)
    }

    pub async fn view(&self) -> SessionView {
        let editor = self.editor.lock().await;
        SessionView {
            id: self.id,
            store_id: self.store_id,
            product_id: editor.product_id(),
            mode: editor.mode(),
            defaults: editor.defaults(),
            selection: editor.selection().clone(),
            variations: editor.variations().to_vec(),
            pending_deletes: editor.detached().len(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<EditorSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self { Self::default() }

    pub async fn insert(&self, session: EditorSession) -> Arc<EditorSession> {
        let session = Arc::new(session);
        self.sessions.write().await.insert(session.id(), session.clone());
        session
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<EditorSession>> {
        self.sessions.read().await.get(&id).cloned().ok_or_else(|| CatalogError::NotFound(format!("Session {id}")))
    }

    /// Closes and forgets a session; in-flight work on it is discarded.
    pub async fn close(&self, id: Uuid) -> Result<()> {
        let session = self.sessions.write().await.remove(&id).ok_or_else(|| CatalogError::NotFound(format!("Session {id}")))?;
        session.close();
        Ok(())
    }
}
