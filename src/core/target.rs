/// Well-known identifier of the shared-platform deployment.
pub const SHARE_SERVICE_TARGET: &str = "share-service";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    SharedPlatform,
    Tenant(String),
}

impl Target {
    /// Exact string comparison; `Share-Service` is a tenant.
    pub fn classify(target_id: &str) -> Self {
        if target_id == SHARE_SERVICE_TARGET {
            Target::SharedPlatform
        } else {
            Target::Tenant(target_id.to_string())
        }
    }

    /// Classifies the identifier as given, then lower-cases tenant ids so that
    /// `Cust-001` and `cust-001` name the same stack.
    pub fn normalized(target_id: &str) -> Self {
        match Self::classify(target_id) {
            Target::SharedPlatform => Target::SharedPlatform,
            Target::Tenant(id) => Target::Tenant(id.to_lowercase()),
        }
    }

    pub fn is_shared_platform(&self) -> bool {
        matches!(self, Target::SharedPlatform)
    }

    /// The shared-platform name carries no environment, so an account and
    /// region host a single environment's shared stack.
    pub fn stack_name(&self) -> String {
        match self {
            Target::SharedPlatform => format!("{}-stack", SHARE_SERVICE_TARGET),
            Target::Tenant(id) => format!("{}-tenant-stack", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_is_exact_equality() {
        assert_eq!(Target::classify("share-service"), Target::SharedPlatform);
        assert!(!Target::classify("Share-Service").is_shared_platform());
        assert!(!Target::classify("share-service ").is_shared_platform());
        assert_eq!(
            Target::classify("cust-001").stack_name(),
            "cust-001-tenant-stack"
        );
        assert_eq!(Target::SharedPlatform.stack_name(), "share-service-stack");
    }

    #[test]
    fn normalized_lowercases_tenants_only() {
        assert_eq!(Target::normalized("Cust-001"), Target::Tenant("cust-001".into()));
        assert_eq!(Target::normalized("share-service"), Target::SharedPlatform);
        assert_eq!(
            Target::normalized("Share-Service"),
            Target::Tenant("share-service".into())
        );
    }
}
