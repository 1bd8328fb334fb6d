//! Domain stack template generation.

use serde_json::{Value, json};

use crate::mirror::SubDomain;

/// Builds the domain template binding each branch to its prefix.
///
/// The template takes `AppId` and `DomainName` as parameters.
#[must_use]
pub fn build_domain_template(subdomains: &[SubDomain]) -> Value {
    let settings: Vec<Value> = subdomains
        .iter()
        .map(|s| json!({ "BranchName": s.branch_name, "Prefix": s.prefix }))
        .collect();

    json!({
        "AWSTemplateFormatVersion": "2010-09-09",
        "Description": "Custom domain for the Amplify app",
        "Parameters": {
            "AppId": { "Type": "String" },
            "DomainName": { "Type": "String" }
        },
        "Resources": {
            "AmplifyDomain": {
                "Type": "AWS::Amplify::Domain",
                "Properties": {
                    "AppId": { "Ref": "AppId" },
                    "DomainName": { "Ref": "DomainName" },
                    "SubDomainSettings": settings
                }
            }
        },
        "Outputs": {
            "DomainArn": { "Value": { "Ref": "AmplifyDomain" } }
        }
    })
}
