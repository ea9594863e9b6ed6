// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! HTTP proxy and trusted CA injection for platform pods.

use k8s_intf::SettingStore;
use k8s_intf::settings::{ADDITIONAL_CA_SETTING, HTTP_PROXY_SETTING, HttpProxyConfig};
use k8s_openapi::api::core::v1::{Container, EnvVar, Pod, SecretVolumeSource, Volume, VolumeMount};
use tracing::debug;

use crate::error::WebhookError;
use crate::patch::{PatchOp, env_patches, volume_mount_patch, volume_patch};

pub const HTTP_PROXY_ENV: &str = "HTTP_PROXY";
pub const HTTPS_PROXY_ENV: &str = "HTTPS_PROXY";
pub const NO_PROXY_ENV: &str = "NO_PROXY";

/// Destinations inside the cluster that must never go through the proxy.
pub const BUILTIN_NO_PROXY: &[&str] = &[
    "localhost",
    "127.0.0.1",
    "0.0.0.0",
    "10.0.0.0/8",
    "longhorn-system",
    "cattle-system",
    "cattle-system.svc",
    "harvester-system",
    ".svc",
    ".cluster.local",
];

pub const ADDITIONAL_CA_VOLUME: &str = "additional-ca-volume";
pub const ADDITIONAL_CA_SECRET: &str = "harvester-additional-ca";
pub const ADDITIONAL_CA_FILE: &str = "additional-ca.pem";
pub const ADDITIONAL_CA_DIR: &str = "/etc/ssl/certs";
pub const ADDITIONAL_CA_MODE: i32 = 400;

/// Append the built-in entries missing from a `NO_PROXY` value.
#[must_use]
pub fn add_builtin_no_proxy(no_proxy: &str) -> String {
    let mut entries: Vec<&str> = no_proxy
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();
    for builtin in BUILTIN_NO_PROXY {
        if !entries.contains(builtin) {
            entries.push(builtin);
        }
    }
    entries.join(",")
}

fn env(name: &str, value: String) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value),
        ..Default::default()
    }
}

fn containers(pod: &Pod) -> &[Container] {
    pod.spec
        .as_ref()
        .map(|spec| spec.containers.as_slice())
        .unwrap_or_default()
}

/// A setting value, `None` if it is missing or empty.
async fn setting(
    settings: &dyn SettingStore,
    name: &str,
) -> Result<Option<String>, WebhookError> {
    Ok(settings.get(name).await?.filter(|value| !value.is_empty()))
}

pub async fn http_proxy_patches(
    settings: &dyn SettingStore,
    pod: &Pod,
) -> Result<Vec<PatchOp>, WebhookError> {
    let Some(value) = setting(settings, HTTP_PROXY_SETTING).await? else {
        return Ok(vec![]);
    };
    let config: HttpProxyConfig = serde_json::from_str(&value)?;
    if config.is_empty() {
        debug!("Setting {HTTP_PROXY_SETTING} is empty");
        return Ok(vec![]);
    }
    let envs = [
        env(HTTP_PROXY_ENV, config.http_proxy),
        env(HTTPS_PROXY_ENV, config.https_proxy),
        env(NO_PROXY_ENV, add_builtin_no_proxy(&config.no_proxy)),
    ];
    let mut ops = vec![];
    for (index, container) in containers(pod).iter().enumerate() {
        ops.extend(env_patches(
            container.env.as_ref(),
            &envs,
            &format!("/spec/containers/{index}/env"),
        )?);
    }
    Ok(ops)
}

pub async fn additional_ca_patches(
    settings: &dyn SettingStore,
    pod: &Pod,
) -> Result<Vec<PatchOp>, WebhookError> {
    if setting(settings, ADDITIONAL_CA_SETTING).await?.is_none() {
        return Ok(vec![]);
    }
    let volume = Volume {
        name: ADDITIONAL_CA_VOLUME.to_string(),
        secret: Some(SecretVolumeSource {
            default_mode: Some(ADDITIONAL_CA_MODE),
            secret_name: Some(ADDITIONAL_CA_SECRET.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    };
    let mount = VolumeMount {
        name: ADDITIONAL_CA_VOLUME.to_string(),
        mount_path: format!("{ADDITIONAL_CA_DIR}/{ADDITIONAL_CA_FILE}"),
        sub_path: Some(ADDITIONAL_CA_FILE.to_string()),
        read_only: Some(true),
        ..Default::default()
    };

    let volumes = pod.spec.as_ref().and_then(|spec| spec.volumes.as_ref());
    let mut ops = vec![volume_patch(volumes, &volume)?];
    for (index, container) in containers(pod).iter().enumerate() {
        ops.push(volume_mount_patch(
            container.volume_mounts.as_ref(),
            &format!("/spec/containers/{index}/volumeMounts"),
            &mount,
        )?);
    }
    Ok(ops)
}
