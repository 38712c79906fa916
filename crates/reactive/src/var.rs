//! Live scalar values.
//!
//! A `Var` is a single mutable value exposed as a producer. Reassigning it
//! replaces the backing content identity, so subscribers observe
//! `Reconnecting` with the fresh value rather than an incremental delta.
//! (Derived scalar nodes that want `Connected`-mode increments drive a
//! `ProducerCore<Scalar<T>>` directly with `ScalarDelta` patches.)

use crate::content::Scalar;
use crate::observer::Observer;
use crate::producer::ProducerCore;
use sluice_core::{Clock, Result};
use std::sync::Arc;

/// A live, reassignable value.
pub struct Var<T: Clone + Send + Sync + 'static> {
    core: Arc<ProducerCore<Scalar<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Clone for Var<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Var<T> {
    /// Creates a live value.
    pub fn new(clock: Arc<Clock>, label: impl Into<String>, initial: T) -> Self {
        Self {
            core: ProducerCore::new(clock, label, Scalar(initial)),
        }
    }

    /// The producer half, for subscribing and composite locking.
    #[inline]
    pub fn core(&self) -> &Arc<ProducerCore<Scalar<T>>> {
        &self.core
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.core.snapshot().0.clone()
    }

    /// Reassigns the value; subscribers observe `Reconnecting`.
    pub fn set(&self, value: T) -> Result<()> {
        self.core.replace(Scalar(value))?;
        Ok(())
    }

    /// Completes the value; no further assignments are accepted.
    pub fn complete(&self) -> Result<()> {
        self.core.complete(None)?;
        Ok(())
    }

    /// Subscribes a new observer.
    pub fn observe<F: Fn() + Send + Sync + 'static>(&self, on_changed: F) -> Observer<Scalar<T>> {
        self.core.create_observer(on_changed)
    }

    /// Binds a `Var` to an external notifying property.
    ///
    /// The returned binding's `refresh` is the one upcall the external
    /// object drives whenever its property changes; no name-based lookup is
    /// involved.
    pub fn bound<P>(
        clock: Arc<Clock>,
        label: impl Into<String>,
        source: Arc<P>,
    ) -> (Self, PropertyBinding)
    where
        P: PropertySource<T> + 'static,
    {
        let var = Var::new(clock, label, source.current());
        let sink = var.clone();
        let binding = PropertyBinding {
            refresh: Box::new(move || {
                if let Err(error) = sink.set(source.current()) {
                    tracing::error!(%error, "property refresh failed");
                }
            }),
        };
        (var, binding)
    }
}

/// Adapter implemented by a type that exposes one observable property.
pub trait PropertySource<T>: Send + Sync {
    /// The property's current value.
    fn current(&self) -> T;
}

/// The explicit refresh handle tying an external property to a `Var`.
pub struct PropertyBinding {
    refresh: Box<dyn Fn() + Send + Sync>,
}

impl PropertyBinding {
    /// Pulls the property's current value into the bound `Var`.
    pub fn refresh(&self) {
        (self.refresh)();
    }
}
