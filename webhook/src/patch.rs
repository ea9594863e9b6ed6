// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! JSON patch (RFC 6902) operations returned by the mutating webhook.
//!
//! Arrays in pod specs are optional: adding to an absent or empty array must create it with a
//! single element, while adding to a populated one appends with the `-` index.

use k8s_openapi::api::core::v1::{Container, EnvVar, Volume, VolumeMount};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;

pub const ANNOTATIONS_PATH: &str = "/metadata/annotations";
pub const CONTAINERS_PATH: &str = "/spec/containers";
pub const VOLUMES_PATH: &str = "/spec/volumes";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Add,
    Replace,
}

/// A single patch operation. Serializes as `{"op":..,"path":..,"value":..}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PatchOp {
    pub op: Op,
    pub path: String,
    pub value: Value,
}

impl PatchOp {
    pub fn add<T: Serialize>(
        path: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            op: Op::Add,
            path: path.into(),
            value: serde_json::to_value(value)?,
        })
    }

    pub fn replace<T: Serialize>(
        path: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            op: Op::Replace,
            path: path.into(),
            value: serde_json::to_value(value)?,
        })
    }
}

impl Display for PatchOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{json}"),
            Err(_) => Err(std::fmt::Error),
        }
    }
}

/// Add `items` to the array at `base`, which currently holds `current_len` elements.
pub fn array_add<T: Serialize>(
    base: &str,
    current_len: usize,
    items: &[T],
) -> Result<Vec<PatchOp>, serde_json::Error> {
    let mut empty = current_len == 0;
    let mut ops = Vec::with_capacity(items.len());
    for item in items {
        if empty {
            empty = false;
            ops.push(PatchOp::add(base, &[item])?);
        } else {
            ops.push(PatchOp::add(format!("{base}/-"), item)?);
        }
    }
    Ok(ops)
}

/// Env var additions for the container at `base` (e.g. `/spec/containers/0/env`).
pub fn env_patches(
    target: Option<&Vec<EnvVar>>,
    vars: &[EnvVar],
    base: &str,
) -> Result<Vec<PatchOp>, serde_json::Error> {
    array_add(base, target.map_or(0, Vec::len), vars)
}

pub fn volume_patch(
    target: Option<&Vec<Volume>>,
    volume: &Volume,
) -> Result<PatchOp, serde_json::Error> {
    single(array_add(VOLUMES_PATH, target.map_or(0, Vec::len), &[volume])?)
}

pub fn volume_mount_patch(
    target: Option<&Vec<VolumeMount>>,
    base: &str,
    mount: &VolumeMount,
) -> Result<PatchOp, serde_json::Error> {
    single(array_add(base, target.map_or(0, Vec::len), &[mount])?)
}

/// Pods always have containers, so a new one is appended.
pub fn container_patch(container: &Container) -> Result<PatchOp, serde_json::Error> {
    PatchOp::add(format!("{CONTAINERS_PATH}/-"), container)
}

pub fn annotations_patch(
    annotations: &BTreeMap<String, String>,
) -> Result<PatchOp, serde_json::Error> {
    PatchOp::replace(ANNOTATIONS_PATH, annotations)
}

fn single(mut ops: Vec<PatchOp>) -> Result<PatchOp, serde_json::Error> {
    ops.pop()
        .ok_or_else(|| <serde_json::Error as serde::ser::Error>::custom("no patch generated"))
}

/// Convert to the patch type carried by admission responses.
pub fn to_json_patch(ops: &[PatchOp]) -> Result<json_patch::Patch, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(ops)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, SecretVolumeSource};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn env(name: &str, value: &str) -> EnvVar {
        EnvVar {
            name: name.to_string(),
            value: Some(value.to_string()),
            ..Default::default()
        }
    }

    fn proxy_envs() -> Vec<EnvVar> {
        vec![
            env("HTTP_PROXY", "http://192.168.0.1:3128"),
            env("HTTPS_PROXY", "http://192.168.0.1:3128"),
            env("NO_PROXY", "127.0.0.1,0.0.0.0,10.0.0.0/8"),
        ]
    }

    fn ca_volume() -> Volume {
        Volume {
            name: "additional-ca-volume".to_string(),
            secret: Some(SecretVolumeSource {
                default_mode: Some(400),
                secret_name: Some("harvester-additional-ca".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn values(ops: &[PatchOp]) -> Vec<Value> {
        ops.iter().map(|op| serde_json::to_value(op).unwrap()).collect()
    }

    #[test]
    fn test_env_patches_append() {
        let existing = vec![env("foo", "bar")];
        let ops = env_patches(Some(&existing), &proxy_envs(), "/spec/containers/0/env").unwrap();
        assert_eq!(
            values(&ops),
            vec![
                json!({"op": "add", "path": "/spec/containers/0/env/-", "value": {"name": "HTTP_PROXY", "value": "http://192.168.0.1:3128"}}),
                json!({"op": "add", "path": "/spec/containers/0/env/-", "value": {"name": "HTTPS_PROXY", "value": "http://192.168.0.1:3128"}}),
                json!({"op": "add", "path": "/spec/containers/0/env/-", "value": {"name": "NO_PROXY", "value": "127.0.0.1,0.0.0.0,10.0.0.0/8"}}),
            ]
        );
    }

    #[test]
    fn test_env_patches_empty_target() {
        for target in [None, Some(&vec![])] {
            let ops = env_patches(target, &proxy_envs(), "/spec/containers/0/env").unwrap();
            assert_eq!(
                values(&ops),
                vec![
                    json!({"op": "add", "path": "/spec/containers/0/env", "value": [{"name": "HTTP_PROXY", "value": "http://192.168.0.1:3128"}]}),
                    json!({"op": "add", "path": "/spec/containers/0/env/-", "value": {"name": "HTTPS_PROXY", "value": "http://192.168.0.1:3128"}}),
                    json!({"op": "add", "path": "/spec/containers/0/env/-", "value": {"name": "NO_PROXY", "value": "127.0.0.1,0.0.0.0,10.0.0.0/8"}}),
                ]
            );
        }
    }

    #[test]
    fn test_volume_patch() {
        let existing = vec![Volume {
            name: "foo".to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        }];
        let expected_volume = json!({"name": "additional-ca-volume", "secret": {"secretName": "harvester-additional-ca", "defaultMode": 400}});

        let op = volume_patch(Some(&existing), &ca_volume()).unwrap();
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"op": "add", "path": "/spec/volumes/-", "value": expected_volume})
        );

        let op = volume_patch(None, &ca_volume()).unwrap();
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"op": "add", "path": "/spec/volumes", "value": [expected_volume]})
        );
    }

    #[test]
    fn test_volume_mount_patch() {
        let mount = VolumeMount {
            name: "additional-ca-volume".to_string(),
            mount_path: "/etc/ssl/certs/additional-ca.pem".to_string(),
            sub_path: Some("additional-ca.pem".to_string()),
            read_only: Some(true),
            ..Default::default()
        };
        let expected_mount = json!({"name": "additional-ca-volume", "readOnly": true, "mountPath": "/etc/ssl/certs/additional-ca.pem", "subPath": "additional-ca.pem"});
        let existing = vec![VolumeMount {
            name: "foo".to_string(),
            mount_path: "/bar".to_string(),
            ..Default::default()
        }];

        let op = volume_mount_patch(Some(&existing), "/spec/containers/0/volumeMounts", &mount)
            .unwrap();
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"op": "add", "path": "/spec/containers/0/volumeMounts/-", "value": expected_mount})
        );
        let op = volume_mount_patch(None, "/spec/containers/0/volumeMounts", &mount).unwrap();
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"op": "add", "path": "/spec/containers/0/volumeMounts", "value": [expected_mount]})
        );
    }

    #[test]
    fn test_display_is_compact_and_ordered() {
        let op = PatchOp::add("/spec/containers/-", &json!({"name": "helper"})).unwrap();
        assert_eq!(
            op.to_string(),
            r#"{"op":"add","path":"/spec/containers/-","value":{"name":"helper"}}"#
        );
        let mut annotations = BTreeMap::new();
        annotations.insert("a".to_string(), "b".to_string());
        assert_eq!(
            annotations_patch(&annotations).unwrap().to_string(),
            r#"{"op":"replace","path":"/metadata/annotations","value":{"a":"b"}}"#
        );
    }

    #[test]
    fn test_to_json_patch() {
        let ops = vec![
            PatchOp::add("/spec/volumes", &json!([{"name": "x"}])).unwrap(),
            PatchOp::replace("/metadata/annotations", &json!({"a": "b"})).unwrap(),
        ];
        let patch = to_json_patch(&ops).unwrap();
        assert_eq!(patch.0.len(), 2);

        let mut doc = json!({"metadata": {"annotations": {}}, "spec": {}});
        json_patch::patch(&mut doc, &patch.0).unwrap();
        assert_eq!(
            doc,
            json!({"metadata": {"annotations": {"a": "b"}}, "spec": {"volumes": [{"name": "x"}]}})
        );
    }
}
