/// Physical names derived from the `<tenantId>-<environment>` namespace prefix.
#[derive(Debug, Clone, Copy)]
pub struct ResourceNames<'a> {
    tenant_id: &'a str,
    environment: &'a str,
    account_id: &'a str,
}

/// Bucket purposes a stack may create; used to validate name lengths up front.
pub const BUCKET_PURPOSES: [&str; 3] = ["ingest", "data", "frontend"];

impl<'a> ResourceNames<'a> {
    pub fn new(tenant_id: &'a str, environment: &'a str, account_id: &'a str) -> Self {
        Self {
            tenant_id,
            environment,
            account_id,
        }
    }

    pub fn tenant_id(&self) -> &str {
        self.tenant_id
    }

    pub fn prefix(&self) -> String {
        format!("{}-{}", self.tenant_id, self.environment)
    }

    pub fn name(&self, suffix: &str) -> String {
        format!("{}-{}", self.prefix(), suffix)
    }

    /// Bucket names are global, so the account id is folded in.
    pub fn bucket(&self, purpose: &str) -> String {
        format!("{}-{}-{}", self.prefix(), self.account_id, purpose)
    }

    pub fn key_alias(&self, purpose: &str) -> String {
        format!("alias/{}", self.name(purpose))
    }

    pub fn bucket_names(&self) -> Vec<String> {
        BUCKET_PURPOSES.iter().map(|p| self.bucket(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_share_the_prefix() {
        let names = ResourceNames::new("cust-001", "prod", "111111111111");
        assert_eq!(names.prefix(), "cust-001-prod");
        assert_eq!(names.name("api"), "cust-001-prod-api");
        assert_eq!(names.bucket("data"), "cust-001-prod-111111111111-data");
        assert_eq!(names.key_alias("key"), "alias/cust-001-prod-key");
    }
}
