//! Static registry of per-user resources that can be fetched in bulk.

use graphbulk_engine::{RequestDescriptor, ResolutionError, ResourceResolver};

/// One fetchable per-user resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSpec {
    /// Path below `/users/{id}/`.
    pub path: &'static str,
    /// Short alias accepted on the command line.
    pub alias: Option<&'static str>,
    pub description: &'static str,
}

/// Every resource the registry can resolve.
pub const RESOURCES: &[ResourceSpec] = &[
    ResourceSpec {
        path: "authentication/methods",
        alias: Some("authenticate"),
        description: "All registered authentication methods",
    },
    ResourceSpec {
        path: "authentication/phoneMethods",
        alias: None,
        description: "Phone authentication methods",
    },
    ResourceSpec {
        path: "authentication/emailMethods",
        alias: None,
        description: "Email authentication methods",
    },
    ResourceSpec {
        path: "authentication/fido2Methods",
        alias: None,
        description: "FIDO2 security keys",
    },
    ResourceSpec {
        path: "authentication/microsoftAuthenticatorMethods",
        alias: None,
        description: "Microsoft Authenticator registrations",
    },
    ResourceSpec {
        path: "memberOf",
        alias: None,
        description: "Direct group and role memberships",
    },
    ResourceSpec {
        path: "transitiveMemberOf",
        alias: None,
        description: "Direct and nested memberships",
    },
    ResourceSpec {
        path: "licenseDetails",
        alias: None,
        description: "Assigned license details",
    },
    ResourceSpec {
        path: "ownedDevices",
        alias: None,
        description: "Devices owned by the user",
    },
    ResourceSpec {
        path: "registeredDevices",
        alias: None,
        description: "Devices registered by the user",
    },
    ResourceSpec {
        path: "appRoleAssignments",
        alias: None,
        description: "App role assignments",
    },
];

/// Checks that an identifier can be placed in a URL path segment.
pub fn validate_identifier(identifier: &str) -> Result<(), ResolutionError> {
    let invalid = |reason: &str| ResolutionError::InvalidIdentifier {
        identifier: identifier.to_string(),
        reason: reason.to_string(),
    };

    if identifier.is_empty() {
        return Err(invalid("identifier is empty"));
    }
    if identifier.contains(['/', '?', '#']) {
        return Err(invalid("identifier contains a reserved URL character"));
    }
    if identifier.chars().any(char::is_whitespace) {
        return Err(invalid("identifier contains whitespace"));
    }
    Ok(())
}

/// Table-driven [`ResourceResolver`] for per-user Graph resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceRegistry;

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    pub fn entries(&self) -> &'static [ResourceSpec] {
        RESOURCES
    }

    /// Finds a resource by path or alias.
    pub fn lookup(&self, name: &str) -> Option<&'static ResourceSpec> {
        RESOURCES
            .iter()
            .find(|spec| spec.path == name || spec.alias == Some(name))
    }

    /// Maps a path or alias to the canonical resource path.
    pub fn canonical(&self, name: &str) -> Result<&'static str, ResolutionError> {
        self.lookup(name)
            .map(|spec| spec.path)
            .ok_or_else(|| ResolutionError::UnknownResource(name.to_string()))
    }
}

impl ResourceResolver for ResourceRegistry {
    fn validate(&self, resource_path: &str) -> Result<(), ResolutionError> {
        self.canonical(resource_path).map(|_| ())
    }

    fn resolve(
        &self,
        resource_path: &str,
        identifier: &str,
    ) -> Result<RequestDescriptor, ResolutionError> {
        let path = self.canonical(resource_path)?;
        validate_identifier(identifier)?;
        Ok(RequestDescriptor::get(format!("/users/{identifier}/{path}")))
    }
}
