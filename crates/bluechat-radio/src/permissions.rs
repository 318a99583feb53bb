//! Fixed permission capability.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::Permissions;

/// Permission capability with a settable answer.
///
/// Desktop stacks have no runtime permission prompt, so the CLI uses
/// `StaticPermissions::granted()`. Tests use the other constructors to
/// exercise the denied path and the request-then-grant path.
#[derive(Debug, Default)]
pub struct StaticPermissions {
    granted: AtomicBool,
    grant_on_request: AtomicBool,
    requests: AtomicUsize,
}

impl StaticPermissions {
    /// All permissions granted.
    pub fn granted() -> Self {
        Self {
            granted: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Permissions missing, and requests are refused.
    pub fn denied() -> Self {
        Self::default()
    }

    /// Permissions missing until the first request, which grants them.
    pub fn granted_on_request() -> Self {
        Self {
            grant_on_request: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Number of times `request_permissions` was called.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Permissions for StaticPermissions {
    fn has_required_permissions(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    async fn request_permissions(&self) -> bool {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.grant_on_request.load(Ordering::SeqCst) {
            self.granted.store(true, Ordering::SeqCst);
        }
        self.granted.load(Ordering::SeqCst)
    }
}
