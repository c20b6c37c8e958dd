//! Static service registry
//!
//! Maps `(service, resource_type)` pairs, as derived from ARNs by the router,
//! to the resource kind whose handler tears them down.

use tagsweep_common::ResourceKind;

/// Handlers grouped under one service namespace
#[derive(Debug)]
pub struct ServiceDescriptor {
    pub service_type: &'static str,
    pub resources: &'static [(&'static str, ResourceKind)],
}

static SERVICES: &[ServiceDescriptor] = &[
    ServiceDescriptor {
        service_type: "ec2",
        resources: &[
            ("instance", ResourceKind::Ec2Instance),
            ("security-group", ResourceKind::Ec2SecurityGroup),
            ("volume", ResourceKind::Ec2Volume),
        ],
    },
    ServiceDescriptor {
        service_type: "iam",
        resources: &[
            ("user", ResourceKind::IamUser),
            ("role", ResourceKind::IamRole),
            ("policy", ResourceKind::IamPolicy),
        ],
    },
    ServiceDescriptor {
        service_type: "apigateway",
        resources: &[
            ("restapis", ResourceKind::ApiGatewayRestApi),
            ("usageplans", ResourceKind::ApiGatewayUsagePlan),
            ("stages", ResourceKind::ApiGatewayStage),
            ("apikeys", ResourceKind::ApiGatewayApiKey),
        ],
    },
    ServiceDescriptor {
        service_type: "kms",
        resources: &[("key", ResourceKind::KmsKey)],
    },
    ServiceDescriptor {
        service_type: "lambda",
        resources: &[("function", ResourceKind::LambdaFunction)],
    },
    ServiceDescriptor {
        service_type: "s3",
        resources: &[("bucket", ResourceKind::S3Bucket)],
    },
    ServiceDescriptor {
        service_type: "ssm",
        resources: &[("parameter", ResourceKind::SsmParameter)],
    },
];

/// Every registered service
pub fn services() -> &'static [ServiceDescriptor] {
    SERVICES
}

/// Resolve a `(service, resource_type)` pair, falling back to
/// [`ResourceKind::Unsupported`] when either part is unknown.
pub fn lookup(service: &str, resource_type: &str) -> ResourceKind {
    SERVICES
        .iter()
        .find(|s| s.service_type == service)
        .and_then(|s| {
            s.resources
                .iter()
                .find(|(rt, _)| *rt == resource_type)
                .map(|(_, kind)| *kind)
        })
        .unwrap_or(ResourceKind::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_supported_kind_registered_once() {
        for kind in ResourceKind::SUPPORTED {
            let entries: Vec<_> = SERVICES
                .iter()
                .flat_map(|s| s.resources.iter().map(move |(rt, k)| (s.service_type, *rt, *k)))
                .filter(|(_, _, k)| *k == kind)
                .collect();
            assert_eq!(entries.len(), 1, "{kind} registered {} times", entries.len());

            let (service, resource_type, _) = entries[0];
            assert_eq!(service, kind.service());
            assert_eq!(resource_type, kind.resource_type());
        }
    }

    #[test]
    fn lookup_hits_and_misses() {
        assert_eq!(lookup("ec2", "volume"), ResourceKind::Ec2Volume);
        assert_eq!(lookup("apigateway", "stages"), ResourceKind::ApiGatewayStage);
        assert_eq!(lookup("ec2", "vpc"), ResourceKind::Unsupported);
        assert_eq!(lookup("dynamodb", "table"), ResourceKind::Unsupported);
        assert_eq!(lookup("", ""), ResourceKind::Unsupported);
    }

    #[test]
    fn unsupported_is_not_registered() {
        assert!(
            SERVICES
                .iter()
                .flat_map(|s| s.resources)
                .all(|(_, k)| *k != ResourceKind::Unsupported)
        );
    }
}
