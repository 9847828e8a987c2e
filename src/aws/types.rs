//! Wire types for the JSON printed by the AWS CLI.
//!
//! ECS output is camelCase while EC2 output is PascalCase; both are mapped
//! onto the provider-neutral types in [`crate::cloud`].

use serde::Deserialize;

use crate::cloud::{Attachment, AttachmentDetail, NetworkInterface, Task};

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(super) struct ListTasksOutput {
    #[serde(default)]
    pub(super) task_arns: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(super) struct DescribeTasksOutput {
    #[serde(default)]
    pub(super) tasks: Vec<EcsTask>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(super) struct EcsTask {
    #[serde(default)]
    task_arn: String,
    last_status: Option<String>,
    #[serde(default)]
    attachments: Vec<EcsAttachment>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub(super) struct EcsAttachment {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    status: Option<String>,
    #[serde(default)]
    details: Vec<EcsKeyValue>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub(super) struct EcsKeyValue {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

impl From<EcsTask> for Task {
    fn from(value: EcsTask) -> Self {
        Self {
            arn: value.task_arn,
            last_status: value.last_status,
            attachments: value.attachments.into_iter().map(Attachment::from).collect(),
        }
    }
}

impl From<EcsAttachment> for Attachment {
    fn from(value: EcsAttachment) -> Self {
        Self {
            id: value.id,
            kind: value.kind,
            status: value.status,
            details: value
                .details
                .into_iter()
                .map(|kv| AttachmentDetail::new(kv.name, kv.value))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct DescribeNetworkInterfacesOutput {
    #[serde(default)]
    pub(super) network_interfaces: Vec<Ec2NetworkInterface>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct Ec2NetworkInterface {
    #[serde(default)]
    network_interface_id: String,
    association: Option<Ec2Association>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct Ec2Association {
    public_ip: Option<String>,
}

impl From<Ec2NetworkInterface> for NetworkInterface {
    fn from(value: Ec2NetworkInterface) -> Self {
        Self {
            id: value.network_interface_id,
            public_ip: value.association.and_then(|assoc| assoc.public_ip),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct DescribeAvailabilityZonesOutput {
    #[serde(default)]
    pub(super) availability_zones: Vec<Ec2AvailabilityZone>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct Ec2AvailabilityZone {
    pub(super) zone_name: String,
    pub(super) state: Option<String>,
}
