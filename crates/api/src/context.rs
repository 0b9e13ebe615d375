use resellsync_core::PrincipalId;

/// The admin a request acts on behalf of.
///
/// Inserted by [`crate::middleware::admin_principal_middleware`]; every
/// protected route can rely on it being present.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AdminContext {
    principal_id: PrincipalId,
}

impl AdminContext {
    pub fn new(principal_id: PrincipalId) -> Self {
        Self { principal_id }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }
}
