//! Listener traits and weak handles

use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use serde::de::DeserializeOwned;

use crate::codec::{Codec, CodecResult};

/// Callback-capable object informed when the object stored for an
/// identifier changes
pub trait ObjectListener: Send + Sync + 'static {
    /// Type the stored payload is decoded into before delivery
    type Object: DeserializeOwned;

    fn object_changed(&self, identifier: &str, object: Self::Object);
}

/// Type-erased listener as held by the registry.
///
/// Lets listeners expecting different object types share one registry.
pub trait ErasedListener: Send + Sync {
    /// Decode the payload and invoke the listener
    fn deliver(&self, identifier: &str, payload: &[u8], codec: Codec) -> CodecResult<()>;
}

impl<L: ObjectListener> ErasedListener for L {
    fn deliver(&self, identifier: &str, payload: &[u8], codec: Codec) -> CodecResult<()> {
        let object = codec.decode::<L::Object>(payload)?;
        self.object_changed(identifier, object);
        Ok(())
    }
}

/// Listener built from a closure
pub struct FnListener<T, F> {
    callback: F,
    _object: PhantomData<fn() -> T>,
}

impl<T, F> ObjectListener for FnListener<T, F>
where
    T: DeserializeOwned + 'static,
    F: Fn(&str, T) + Send + Sync + 'static,
{
    type Object = T;

    fn object_changed(&self, identifier: &str, object: T) {
        (self.callback)(identifier, object)
    }
}

/// Wrap a closure as a listener. The caller owns the returned `Arc`; the
/// registry only holds it weakly.
pub fn listener_fn<T, F>(callback: F) -> Arc<FnListener<T, F>>
where
    T: DeserializeOwned + 'static,
    F: Fn(&str, T) + Send + Sync + 'static,
{
    Arc::new(FnListener {
        callback,
        _object: PhantomData,
    })
}

/// Non-owning reference to a registered listener
#[derive(Clone)]
pub struct ListenerHandle {
    listener: Weak<dyn ErasedListener>,
    address: usize,
}

impl ListenerHandle {
    pub fn new<L: ObjectListener>(listener: &Arc<L>) -> Self {
        let erased: Arc<dyn ErasedListener> = listener.clone();
        Self {
            listener: Arc::downgrade(&erased),
            address: address_of(listener),
        }
    }

    pub fn upgrade(&self) -> Option<Arc<dyn ErasedListener>> {
        self.listener.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.listener.strong_count() > 0
    }

    /// Whether this handle refers to the given live listener
    pub fn refers_to(&self, address: usize) -> bool {
        self.address == address && self.is_alive()
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("address", &format_args!("{:#x}", self.address))
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Identity of a listener: the address of its allocation
pub fn address_of<L>(listener: &Arc<L>) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}
