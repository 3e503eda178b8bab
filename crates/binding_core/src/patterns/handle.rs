//! Shared and relinkable handles to observable objects.
//!
//! A [`Handle`] points at a shared *link*, and the link points at the target.
//! Every clone of a handle shares the link, so when a [`RelinkableHandle`]
//! repoints it, all holders see the new target and all observers of the
//! handle are notified. Code that kept a raw `Rc<T>` to the old target keeps
//! the old target.
//!
//! The link is itself an observer of its target (unless told otherwise), so
//! a change in the target reaches whoever observes the handle.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::observable::{Observable, Observed};
use super::observer::{Observer, Registrations};
use crate::types::BindingError;

/// The shared indirection behind every clone of a handle.
struct Link<T: ?Sized> {
    registrations: Registrations,
    observable: Rc<Observable>,
    target: RefCell<Option<Rc<T>>>,
    is_observer: Cell<bool>,
}

impl<T: ?Sized + Observed + 'static> Link<T> {
    fn new(target: Option<Rc<T>>, register_as_observer: bool) -> Rc<Self> {
        let link = Rc::new_cyclic(|weak: &Weak<Link<T>>| {
            let this: Weak<dyn Observer> = weak.clone();
            Link {
                registrations: Registrations::new(this),
                observable: Observable::new(),
                target: RefCell::new(None),
                is_observer: Cell::new(register_as_observer),
            }
        });
        if let Some(target) = target {
            if register_as_observer {
                link.registrations.register_with(target.observable());
            }
            *link.target.borrow_mut() = Some(target);
        }
        link
    }

    fn points_to(&self, candidate: &Option<Rc<T>>) -> bool {
        match (&*self.target.borrow(), candidate) {
            (Some(current), Some(candidate)) => Rc::ptr_eq(current, candidate),
            (None, None) => true,
            _ => false,
        }
    }

    fn link_to(&self, target: Option<Rc<T>>, register_as_observer: bool) -> Result<(), BindingError> {
        if self.points_to(&target) && self.is_observer.get() == register_as_observer {
            return Ok(());
        }

        let previous = self.target.replace(None);
        if let Some(previous) = &previous {
            if self.is_observer.get() {
                self.registrations.unregister_with(previous.observable());
            }
        }

        self.is_observer.set(register_as_observer);
        if let Some(target) = &target {
            if register_as_observer {
                self.registrations.register_with(target.observable());
            }
        }
        *self.target.borrow_mut() = target;

        debug!(handle = %self.observable.id(), empty = self.target.borrow().is_none(), "relinked");
        self.observable.notify_observers()
    }
}

impl<T: ?Sized + Observed + 'static> Observer for Link<T> {
    fn update(&self) -> Result<(), BindingError> {
        self.observable.notify_observers()
    }
}

/// Shared reference to an observable target.
///
/// Observers register with the handle (through [`Observed`]) rather than with
/// the target, so relinking reaches them.
pub struct Handle<T: ?Sized> {
    link: Rc<Link<T>>,
}

impl<T: ?Sized> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            link: Rc::clone(&self.link),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("observable", &self.link.observable.id())
            .field("empty", &self.link.target.borrow().is_none())
            .field("is_observer", &self.link.is_observer.get())
            .finish()
    }
}

impl<T: ?Sized + Observed + 'static> Handle<T> {
    /// Handle to `target`, forwarding its notifications.
    pub fn new(target: Rc<T>) -> Self {
        Self::with_options(Some(target), true)
    }

    /// Handle pointing at nothing.
    pub fn empty() -> Self {
        Self::with_options(None, true)
    }

    /// Handle to an optional target. When `register_as_observer` is false,
    /// changes in the target are not forwarded to observers of the handle.
    pub fn with_options(target: Option<Rc<T>>, register_as_observer: bool) -> Self {
        Self {
            link: Link::new(target, register_as_observer),
        }
    }

    /// The current target.
    ///
    /// # Errors
    ///
    /// [`BindingError::EmptyHandle`] when the handle points at nothing.
    pub fn current_link(&self) -> Result<Rc<T>, BindingError> {
        self.link
            .target
            .borrow()
            .as_ref()
            .map(Rc::clone)
            .ok_or(BindingError::EmptyHandle)
    }

    /// Whether the handle points at nothing.
    pub fn is_empty(&self) -> bool {
        self.link.target.borrow().is_none()
    }

    /// Whether the handle forwards its target's notifications.
    pub fn is_observer(&self) -> bool {
        self.link.is_observer.get()
    }

    /// Whether both handles currently point at the same target.
    pub fn same_target(&self, other: &Handle<T>) -> bool {
        self.link.points_to(&other.link.target.borrow())
    }

    /// Whether both handles share one link (and thus relink together).
    pub fn shares_link(&self, other: &Handle<T>) -> bool {
        Rc::ptr_eq(&self.link, &other.link)
    }
}

impl<T: ?Sized> Observed for Handle<T> {
    fn observable(&self) -> &Rc<Observable> {
        &self.link.observable
    }
}

/// A handle whose target can be repointed.
///
/// Hand out [`handle`](RelinkableHandle::handle) clones to dependents; keep
/// the relinkable handle to drive relinking.
pub struct RelinkableHandle<T: ?Sized> {
    handle: Handle<T>,
}

impl<T: ?Sized> Clone for RelinkableHandle<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for RelinkableHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RelinkableHandle").field(&self.handle).finish()
    }
}

impl<T: ?Sized + Observed + 'static> RelinkableHandle<T> {
    /// Relinkable handle to an optional target.
    pub fn new(target: Option<Rc<T>>) -> Self {
        Self {
            handle: Handle::with_options(target, true),
        }
    }

    /// A plain handle sharing this handle's link.
    pub fn handle(&self) -> Handle<T> {
        self.handle.clone()
    }

    /// Point every clone at `target` and notify observers of the handle.
    ///
    /// # Errors
    ///
    /// Propagates observer failures. The relink itself always happens.
    pub fn link_to(&self, target: Option<Rc<T>>) -> Result<(), BindingError> {
        self.link_to_with(target, true)
    }

    /// Like [`link_to`](Self::link_to), choosing whether the new target's
    /// notifications are forwarded.
    ///
    /// # Errors
    ///
    /// Propagates observer failures.
    pub fn link_to_with(
        &self,
        target: Option<Rc<T>>,
        register_as_observer: bool,
    ) -> Result<(), BindingError> {
        self.handle.link.link_to(target, register_as_observer)
    }

    /// Point at nothing.
    ///
    /// # Errors
    ///
    /// Propagates observer failures.
    pub fn reset(&self) -> Result<(), BindingError> {
        self.link_to(None)
    }
}

impl<T: ?Sized> Deref for RelinkableHandle<T> {
    type Target = Handle<T>;

    fn deref(&self) -> &Handle<T> {
        &self.handle
    }
}

impl<T: ?Sized> Observed for RelinkableHandle<T> {
    fn observable(&self) -> &Rc<Observable> {
        self.handle.observable()
    }
}
