//! Static website
//!
//! Bucket origin behind a distribution. With a domain name the site also
//! gets a certificate and an alias record in the hosted zone. With a
//! content path the content is uploaded and the distribution cache is
//! invalidated once both exist.
//!
//! The hosted zone is resolved before anything is registered, so a failed
//! lookup leaves no partial sub-graph behind.

use crate::zone::{HostedZone, HostedZoneLookup};
use serde_json::json;
use tessera_constructs::{BucketProps, RemovalPolicy, SecureBucket};
use tessera_core::{
    Construct, ConstructError, ConstructId, ConstructState, Pattern, ResourceKind, ResourceRef,
    ResourceSpec, Result, Stack,
};

#[derive(Debug, Clone)]
pub struct WebsiteProps {
    pub content_path: Option<String>,
    pub domain_name: Option<String>,
    pub hosted_zone_id: Option<String>,
    pub hosted_zone_name: Option<String>,
    pub index_document: String,
    pub error_document: String,
}

impl Default for WebsiteProps {
    fn default() -> Self {
        Self {
            content_path: None,
            domain_name: None,
            hosted_zone_id: None,
            hosted_zone_name: None,
            index_document: "index.html".to_string(),
            error_document: "error.html".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StaticWebsite {
    pattern: Pattern,
    bucket: SecureBucket,
    distribution: ResourceRef,
    certificate: Option<ResourceRef>,
    record: Option<ResourceRef>,
    deployment: Option<ResourceRef>,
}

impl StaticWebsite {
    pub fn new(
        stack: &mut Stack,
        parent: ConstructId,
        id: &str,
        props: WebsiteProps,
        zones: &dyn HostedZoneLookup,
    ) -> Result<Self> {
        let site = match &props.domain_name {
            Some(domain) => Some((domain.clone(), resolve_zone(domain, &props, zones)?)),
            None => None,
        };

        let mut pattern = Pattern::declare(stack, parent, id, "static-website")?;

        let bucket = SecureBucket::new(
            stack,
            pattern.id(),
            "WebsiteBucket",
            BucketProps {
                versioned: Some(true),
                removal_policy: Some(RemovalPolicy::Destroy),
                auto_delete_objects: Some(true),
                ..Default::default()
            },
        )?;
        pattern.adopt(&bucket);
        let origin = bucket.bucket()?;

        let certificate = match &site {
            Some((domain, zone)) => Some(pattern.composite_mut().create(
                stack,
                "Certificate",
                ResourceSpec::new(ResourceKind::Certificate)
                    .option("domain_name", domain.as_str())
                    .option("validation_method", "dns")
                    .option("hosted_zone", serde_json::to_value(zone)?),
            )?),
            None => None,
        };

        let domain_names: Vec<&str> = site.iter().map(|(domain, _)| domain.as_str()).collect();
        let distribution = pattern.composite_mut().create(
            stack,
            "Distribution",
            ResourceSpec::new(ResourceKind::Distribution)
                .reference("origin", origin)
                .option("viewer_protocol_policy", "redirect-to-https")
                .option("cache_policy", "caching-optimized")
                .option("default_root_object", props.index_document.as_str())
                .option(
                    "error_responses",
                    json!([{
                        "http_status": 404,
                        "response_http_status": 200,
                        "response_page_path": format!("/{}", props.error_document),
                    }]),
                )
                .maybe_reference("certificate", certificate)
                .option("domain_names", domain_names),
        )?;

        let record = match &site {
            Some((domain, zone)) => Some(pattern.composite_mut().create(
                stack,
                "AliasRecord",
                ResourceSpec::new(ResourceKind::DnsRecord)
                    .option("zone", serde_json::to_value(zone)?)
                    .option("record_name", domain.as_str())
                    .option("record_type", "A")
                    .reference("target", distribution),
            )?),
            None => None,
        };
        pattern.composite_mut().advance(ConstructState::BaseCreated)?;

        let deployment = match &props.content_path {
            Some(content) => Some(pattern.composite_mut().create(
                stack,
                "DeployWebsite",
                ResourceSpec::new(ResourceKind::BucketDeployment)
                    .option("sources", vec![content.as_str()])
                    .reference("destination_bucket", origin)
                    .reference("distribution", distribution)
                    .option("distribution_paths", vec!["/*"]),
            )?),
            None => None,
        };

        let bucket_name = bucket.bucket_name()?.to_string();
        let node = stack.resource(distribution)?;
        let domain_name = node.output("domain_name").unwrap_or_default().to_string();
        let distribution_id = node.output("id").unwrap_or_default().to_string();

        let composite = pattern.composite_mut();
        composite.expose_value("bucket_name", bucket_name);
        composite.expose_value("distribution_domain_name", domain_name);
        composite.expose_value("distribution_id", distribution_id);
        composite.expose_resource("distribution", distribution);
        composite.finish()?;

        Ok(Self {
            pattern,
            bucket,
            distribution,
            certificate,
            record,
            deployment,
        })
    }

    pub fn bucket(&self) -> &SecureBucket {
        &self.bucket
    }

    pub fn distribution(&self) -> ResourceRef {
        self.distribution
    }

    pub fn certificate(&self) -> Option<ResourceRef> {
        self.certificate
    }

    pub fn record(&self) -> Option<ResourceRef> {
        self.record
    }

    pub fn deployment(&self) -> Option<ResourceRef> {
        self.deployment
    }

    pub fn bucket_name(&self) -> Result<&str> {
        self.pattern.composite().value_output("bucket_name")
    }

    pub fn distribution_domain_name(&self) -> Result<&str> {
        self.pattern.composite().value_output("distribution_domain_name")
    }

    pub fn distribution_id(&self) -> Result<&str> {
        self.pattern.composite().value_output("distribution_id")
    }
}

impl Construct for StaticWebsite {
    fn composite(&self) -> &tessera_core::Composite {
        self.pattern.composite()
    }
}

/// Zone by attributes when an id is given, otherwise by lookup
fn resolve_zone(
    domain: &str,
    props: &WebsiteProps,
    zones: &dyn HostedZoneLookup,
) -> Result<HostedZone> {
    match (&props.hosted_zone_id, &props.hosted_zone_name) {
        (Some(id), name) => {
            let name = name
                .clone()
                .unwrap_or_else(|| parent_domain(domain).to_string());
            Ok(HostedZone::new(id.as_str(), name))
        }
        (None, Some(name)) => zones
            .lookup(name)
            .map_err(|source| ConstructError::HostedZoneLookup {
                name: name.clone(),
                source,
            }),
        (None, None) => Err(ConstructError::MissingHostedZone {
            domain: domain.to_string(),
        }),
    }
}

fn parent_domain(domain: &str) -> &str {
    domain.split_once('.').map_or(domain, |(_, rest)| rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::StaticHostedZones;

    #[test]
    fn test_parent_domain() {
        assert_eq!(parent_domain("www.example.com"), "example.com");
        assert_eq!(parent_domain("localhost"), "localhost");
    }

    #[test]
    fn test_minimal_site() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        let zones = StaticHostedZones::new();
        let site = StaticWebsite::new(&mut stack, root, "Site", WebsiteProps::default(), &zones)
            .unwrap();

        assert!(site.certificate().is_none());
        assert!(site.record().is_none());
        assert!(site.deployment().is_none());

        let distribution = stack.resource(site.distribution()).unwrap();
        assert_eq!(distribution.option("domain_names"), Some(&json!([])));
        assert_eq!(
            distribution.option("error_responses").unwrap()[0]["response_page_path"],
            json!("/error.html")
        );
        assert_eq!(site.distribution_id().unwrap(), "${S/Site/Distribution.id}");
    }

    #[test]
    fn test_zone_from_attributes() {
        let props = WebsiteProps {
            domain_name: Some("www.example.com".to_string()),
            hosted_zone_id: Some("Z1".to_string()),
            ..Default::default()
        };
        let zone = resolve_zone("www.example.com", &props, &StaticHostedZones::new()).unwrap();
        assert_eq!(zone, HostedZone::new("Z1", "example.com"));
    }

    #[test]
    fn test_missing_hosted_zone() {
        let mut stack = Stack::new("S").unwrap();
        let root = stack.root();
        let props = WebsiteProps {
            domain_name: Some("www.example.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            StaticWebsite::new(&mut stack, root, "Site", props, &StaticHostedZones::new()),
            Err(ConstructError::MissingHostedZone { domain }) if domain == "www.example.com"
        ));
        assert_eq!(stack.tree().len(), 1);
    }
}
