//! Resource naming conventions.
//!
//! These names are shared with resources created by earlier tooling and must
//! not change.

/// Hosting app stack: `{app}-amplify-app`.
#[must_use]
pub fn app_stack_name(app_name: &str) -> String {
    format!("{app_name}-amplify-app")
}

/// Branch stack: `{app}-amplify-branch-{branch}`.
#[must_use]
pub fn branch_stack_name(app_name: &str, branch: &str) -> String {
    format!("{app_name}-amplify-branch-{branch}")
}

/// Backend root stack: `{app}-amplify-backend-{env}`.
#[must_use]
pub fn backend_stack_name(app_name: &str, environment: &str) -> String {
    format!("{app_name}-amplify-backend-{environment}")
}

/// Domain stack: `{app}-amplify-domain-{domain}` with every character
/// outside `[A-Za-z0-9]` stripped from the domain.
#[must_use]
pub fn domain_stack_name(app_name: &str, domain: &str) -> String {
    let normalized: String = domain.chars().filter(char::is_ascii_alphanumeric).collect();
    format!("{app_name}-amplify-domain-{normalized}")
}

/// Deployment bucket: `{app}-bucket-deployment-{env}`.
#[must_use]
pub fn deployment_bucket_name(app_name: &str, environment: &str) -> String {
    format!("{app_name}-bucket-deployment-{environment}")
}

/// Authenticated role: `{app}-role-auth-{env}`.
#[must_use]
pub fn auth_role_name(app_name: &str, environment: &str) -> String {
    format!("{app_name}-role-auth-{environment}")
}

/// Unauthenticated role: `{app}-role-unauth-{env}`.
#[must_use]
pub fn unauth_role_name(app_name: &str, environment: &str) -> String {
    format!("{app_name}-role-unauth-{environment}")
}

/// Public URL of an environment: `https://{env}.{domain}`.
#[must_use]
pub fn app_url(environment: &str, domain: &str) -> String {
    format!("https://{environment}.{domain}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_names() {
        assert_eq!(app_stack_name("acme"), "acme-amplify-app");
        assert_eq!(branch_stack_name("acme", "develop"), "acme-amplify-branch-develop");
        assert_eq!(backend_stack_name("acme", "dev"), "acme-amplify-backend-dev");
        assert_eq!(domain_stack_name("acme", "acme.io"), "acme-amplify-domain-acmeio");
    }

    #[test]
    fn test_domain_normalization_strips_underscores_and_dashes() {
        assert_eq!(
            domain_stack_name("acme", "my_shop-eu.acme.co.uk"),
            "acme-amplify-domain-myshopeuacmecouk"
        );
    }

    #[test]
    fn test_backend_resource_names() {
        assert_eq!(deployment_bucket_name("acme", "dev"), "acme-bucket-deployment-dev");
        assert_eq!(auth_role_name("acme", "dev"), "acme-role-auth-dev");
        assert_eq!(unauth_role_name("acme", "prod"), "acme-role-unauth-prod");
        assert_eq!(app_url("dev", "acme.io"), "https://dev.acme.io");
    }
}
