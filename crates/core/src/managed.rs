//! Epoch context lifecycle
//!
//! Building a context costs hundreds of milliseconds and tens of megabytes,
//! so one context per epoch is shared between threads. An [`EpochCache`]
//! holds the most recently requested context; each worker keeps its own
//! [`LocalContext`] reference and only takes the lock when it needs a
//! different epoch.

use std::cell::RefCell;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::epoch::{EpochContext, create_epoch_context, create_epoch_context_full};
use crate::error::Error;

/// Context builder used by an [`EpochCache`]
pub type BuildFn = fn(u32) -> Result<EpochContext, Error>;

/// Worker-private reference to the last context it used
#[derive(Debug, Default, Clone)]
pub struct LocalContext(Option<Arc<EpochContext>>);

impl LocalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The held context, if any
    pub fn get(&self) -> Option<&Arc<EpochContext>> {
        self.0.as_ref()
    }

    fn matching(&self, epoch_number: u32) -> Option<Arc<EpochContext>> {
        self.0
            .as_ref()
            .filter(|ctx| ctx.epoch_number() == epoch_number)
            .cloned()
    }
}

/// Shared slot holding the current context for one context kind
pub struct EpochCache {
    slot: Mutex<Option<Arc<EpochContext>>>,
    build: BuildFn,
}

impl EpochCache {
    pub const fn new(build: BuildFn) -> Self {
        Self {
            slot: Mutex::new(None),
            build,
        }
    }

    /// Slot for light contexts
    pub const fn light() -> Self {
        Self::new(create_epoch_context)
    }

    /// Slot for full contexts
    pub const fn full() -> Self {
        Self::new(create_epoch_context_full)
    }

    /// Context for `epoch_number`, reusing the worker's or the shared one
    ///
    /// The shared slot is rebuilt only when it is empty or holds another
    /// epoch. The previous shared context is released before the new one is
    /// built, so two large contexts are not alive at once on behalf of the
    /// slot. On a build failure the slot stays empty and `local` is unchanged.
    pub fn get(
        &self,
        epoch_number: u32,
        local: &mut LocalContext,
    ) -> Result<Arc<EpochContext>, Error> {
        if let Some(ctx) = local.matching(epoch_number) {
            return Ok(ctx);
        }

        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let ctx = match slot.as_ref().filter(|ctx| ctx.epoch_number() == epoch_number) {
            Some(ctx) => Arc::clone(ctx),
            None => {
                debug!(
                    epoch = epoch_number,
                    previous = slot.as_ref().map(|ctx| ctx.epoch_number()),
                    "rebuilding shared epoch context"
                );
                *slot = None;
                let ctx = Arc::new((self.build)(epoch_number)?);
                *slot = Some(Arc::clone(&ctx));
                ctx
            }
        };
        drop(slot);

        local.0 = Some(Arc::clone(&ctx));
        Ok(ctx)
    }

    /// Epoch currently held by the shared slot
    pub fn current_epoch(&self) -> Option<u32> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|ctx| ctx.epoch_number())
    }
}

static GLOBAL_LIGHT: EpochCache = EpochCache::light();
static GLOBAL_FULL: EpochCache = EpochCache::full();

thread_local! {
    static LOCAL_LIGHT: RefCell<LocalContext> = RefCell::new(LocalContext::new());
    static LOCAL_FULL: RefCell<LocalContext> = RefCell::new(LocalContext::new());
}

/// Process-wide light context for `epoch_number`
pub fn get_global_epoch_context(epoch_number: u32) -> Result<Arc<EpochContext>, Error> {
    LOCAL_LIGHT.with(|local| GLOBAL_LIGHT.get(epoch_number, &mut local.borrow_mut()))
}

/// Process-wide full context for `epoch_number`
pub fn get_global_epoch_context_full(epoch_number: u32) -> Result<Arc<EpochContext>, Error> {
    LOCAL_FULL.with(|local| GLOBAL_FULL.get(epoch_number, &mut local.borrow_mut()))
}
