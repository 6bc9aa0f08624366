//! Built-in Schema Catalogue
//!
//! This module contains the schemas that ship with NodeStage. They describe the
//! Kubernetes resource shapes the diagram editor can place out of the box and
//! double as fixtures for the resolver tests.
//!
//! ## Built-in Schemas
//!
//! - **kubernetesMetadata** - name, namespace, labels
//! - **kubernetesSelector** - label selector
//! - **kubernetesContainer** - container definition with repeated ports
//! - **kubernetesContainerPort** - a single container port
//! - **kubernetesPodSpec** - pull secrets and repeated containers
//! - **kubernetesPodTemplateSpec** - metadata plus pod spec
//! - **kubernetesLoadBalancerStatus** - repeated ingress entries
//! - **kubernetesDeploymentEntity** - the placeable deployment entity
//!
//! ## Usage
//!
//! Call `get_core_schemas()` for all of them, or `builtin_schema()` for one.

use crate::models::schema::{NumberKind, Property, Schema};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type names of the built-in catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuiltinType {
    KubernetesMetadata,
    KubernetesSelector,
    KubernetesContainer,
    KubernetesContainerPort,
    KubernetesPodSpec,
    KubernetesPodTemplateSpec,
    KubernetesLoadBalancerStatus,
    KubernetesDeploymentEntity,
}

impl BuiltinType {
    pub const ALL: [BuiltinType; 8] = [
        BuiltinType::KubernetesMetadata,
        BuiltinType::KubernetesSelector,
        BuiltinType::KubernetesContainer,
        BuiltinType::KubernetesContainerPort,
        BuiltinType::KubernetesPodSpec,
        BuiltinType::KubernetesPodTemplateSpec,
        BuiltinType::KubernetesLoadBalancerStatus,
        BuiltinType::KubernetesDeploymentEntity,
    ];

    /// Registered type name
    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinType::KubernetesMetadata => "kubernetesMetadata",
            BuiltinType::KubernetesSelector => "kubernetesSelector",
            BuiltinType::KubernetesContainer => "kubernetesContainer",
            BuiltinType::KubernetesContainerPort => "kubernetesContainerPort",
            BuiltinType::KubernetesPodSpec => "kubernetesPodSpec",
            BuiltinType::KubernetesPodTemplateSpec => "kubernetesPodTemplateSpec",
            BuiltinType::KubernetesLoadBalancerStatus => "kubernetesLoadBalancerStatus",
            BuiltinType::KubernetesDeploymentEntity => "kubernetesDeploymentEntity",
        }
    }
}

impl fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn kubernetes(builtin: BuiltinType, display_type_name: &str) -> Schema {
    Schema::new(builtin.as_str(), display_type_name).with_service("kubernetes")
}

/// Get the schema of one built-in type
pub fn builtin_schema(builtin: BuiltinType) -> Schema {
    match builtin {
        BuiltinType::KubernetesMetadata => kubernetes(builtin, "Kubernetes Meta Data")
            .with_property(Property::text("name", "Name").required())
            .with_property(Property::text("namespace", "Namespace").required())
            .with_property(Property::map("labels", "Labels")),

        BuiltinType::KubernetesSelector => kubernetes(builtin, "Kubernetes Label Selector")
            .with_property(Property::map("matchLabels", "Match Labels")),

        BuiltinType::KubernetesContainer => {
            kubernetes(builtin, "Kubernetes Container Definition")
                .with_property(Property::text("name", "Name"))
                .with_property(Property::text("image", "Image"))
                .with_property(
                    Property::link(
                        "ports",
                        "Ports",
                        BuiltinType::KubernetesContainerPort.as_str(),
                    )
                    .repeated(),
                )
        }

        BuiltinType::KubernetesContainerPort => {
            kubernetes(builtin, "Kubernetes Container Port Definition")
                .with_property(Property::number(
                    "containerPort",
                    "Container Port",
                    NumberKind::Int32,
                ))
                .with_property(Property::text("hostIp", "Host IP").hidden())
                .with_property(Property::text("name", "Name").hidden())
                .with_property(Property::text("protocol", "Protocol"))
        }

        BuiltinType::KubernetesPodSpec => kubernetes(builtin, "Kubernetes Pod Spec")
            .with_property(
                Property::object(
                    "imagePullSecrets",
                    "Image Pull Secrets",
                    vec![Property::text("name", "name")],
                )
                .repeated(),
            )
            .with_property(
                Property::link(
                    "containers",
                    "Containers",
                    BuiltinType::KubernetesContainer.as_str(),
                )
                .repeated(),
            ),

        BuiltinType::KubernetesPodTemplateSpec => {
            kubernetes(builtin, "Kubernetes Pod Template Spec")
                .with_property(Property::link(
                    "metadata",
                    "Meta Data",
                    BuiltinType::KubernetesMetadata.as_str(),
                ))
                .with_property(Property::link(
                    "spec",
                    "Pod Spec",
                    BuiltinType::KubernetesPodSpec.as_str(),
                ))
        }

        BuiltinType::KubernetesLoadBalancerStatus => {
            kubernetes(builtin, "Kubernetes Load Balancer Status").with_property(
                Property::object(
                    "ingress",
                    "Load Balancer Ingress",
                    vec![
                        Property::text("hostname", "Hostname"),
                        Property::text("ip", "IP"),
                    ],
                )
                .repeated(),
            )
        }

        BuiltinType::KubernetesDeploymentEntity => {
            kubernetes(builtin, "Kubernetes Deployment Object")
                .with_property(Property::text("name", "Name").required())
                .with_property(Property::text("description", "Description"))
                .with_property(Property::object(
                    "kubernetesObject",
                    "Kubernetes Object",
                    vec![
                        Property::text("apiVersion", "API Version").required(),
                        Property::text("kind", "Kind").required(),
                        Property::link(
                            "metadata",
                            "Meta Data",
                            BuiltinType::KubernetesMetadata.as_str(),
                        ),
                        Property::object(
                            "spec",
                            "Deployment Spec",
                            vec![
                                Property::number("replicas", "Replicas", NumberKind::Int32),
                                Property::enumeration(
                                    "strategy",
                                    "Strategy",
                                    vec!["RollingUpdate".to_string(), "Recreate".to_string()],
                                ),
                                Property::link(
                                    "selector",
                                    "Selector",
                                    BuiltinType::KubernetesSelector.as_str(),
                                ),
                                Property::link(
                                    "template",
                                    "Pod Template Spec",
                                    BuiltinType::KubernetesPodTemplateSpec.as_str(),
                                ),
                            ],
                        ),
                    ],
                ))
                .with_property(Property::code(
                    "kubernetesObjectYaml",
                    "Kubernetes Object YAML",
                    Some("yaml".to_string()),
                ))
        }
    }
}

/// Get all built-in schemas
pub fn get_core_schemas() -> Vec<Schema> {
    BuiltinType::ALL.iter().map(|b| builtin_schema(*b)).collect()
}
